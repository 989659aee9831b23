//! Native GeoTIFF reading/writing built on the `tiff` crate
//!
//! Single-band rasters only. Georeferencing travels in the standard GeoTIFF
//! tags (ModelPixelScale 33550, ModelTiepoint 33922, GeoKeyDirectory 34735)
//! and the no-data value in the GDAL_NODATA tag (42113), so files written
//! here open with the usual GIS tooling.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement, SampleKind};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{
    ColorType, Gray16, Gray32, Gray32Float, Gray64Float, Gray8, GrayI16, GrayI32, GrayI8,
};
use tiff::encoder::compression::{
    Compression as TiffCompression, Deflate, Lzw, Uncompressed,
};
use tiff::encoder::{TiffEncoder, TiffValue};
use tiff::tags::Tag;
use tracing::debug;

const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GEOGRAPHIC_TYPE: u16 = 2048;
const PROJECTED_CS_TYPE: u16 = 3072;

/// Lossless compression applied to written rasters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    None,
    #[default]
    Lzw,
    Deflate,
}

impl std::str::FromStr for Compression {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Compression::None),
            "lzw" => Ok(Compression::Lzw),
            "deflate" | "zip" => Ok(Compression::Deflate),
            other => Err(Error::invalid(
                "compression",
                other,
                "expected none, lzw or deflate",
            )),
        }
    }
}

/// Options for writing GeoTIFF files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoTiffOptions {
    /// Compression codec
    pub compression: Compression,
    /// Rows per block; written rasters are stored in row blocks of this height
    pub block_size: u32,
}

impl Default for GeoTiffOptions {
    fn default() -> Self {
        Self {
            compression: Compression::Lzw,
            block_size: 256,
        }
    }
}

/// Read a single-band GeoTIFF file into a Raster
///
/// Fails with an I/O error when the file cannot be opened or decoded, or
/// when the image has zero area.
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    debug!("reading raster {}", path.display());
    let file = File::open(path)?;
    decode_geotiff(file)
}

/// Read a GeoTIFF from an in-memory buffer into a Raster
pub fn read_geotiff_from_buffer<T>(data: &[u8]) -> Result<Raster<T>>
where
    T: RasterElement,
{
    decode_geotiff(Cursor::new(data))
}

fn cast_samples<S, T>(buf: Vec<S>) -> Vec<T>
where
    S: num_traits::NumCast + Copy,
    T: RasterElement,
{
    buf.into_iter()
        .map(|v| num_traits::cast(v).unwrap_or_else(T::default_nodata))
        .collect()
}

/// Internal: decode a GeoTIFF from any `Read + Seek` source
fn decode_geotiff<T, R>(reader: R) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut decoder = Decoder::new(reader).map_err(|e| Error::Decode(e.to_string()))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Decode(format!("cannot read dimensions: {}", e)))?;

    let rows = height as usize;
    let cols = width as usize;
    if rows == 0 || cols == 0 {
        return Err(Error::Decode(format!("raster has zero area ({}x{})", cols, rows)));
    }

    let result = decoder
        .read_image()
        .map_err(|e| Error::Decode(format!("cannot read image data: {}", e)))?;

    let data: Vec<T> = match result {
        DecodingResult::U8(buf) => cast_samples(buf),
        DecodingResult::U16(buf) => cast_samples(buf),
        DecodingResult::U32(buf) => cast_samples(buf),
        DecodingResult::I8(buf) => cast_samples(buf),
        DecodingResult::I16(buf) => cast_samples(buf),
        DecodingResult::I32(buf) => cast_samples(buf),
        DecodingResult::F32(buf) => cast_samples(buf),
        DecodingResult::F64(buf) => cast_samples(buf),
        _ => {
            return Err(Error::UnsupportedDataType(
                "unsupported TIFF pixel format".to_string(),
            ))
        }
    };

    // Multi-band (chunky) images decode to rows * cols * bands samples
    if data.len() != rows * cols {
        return Err(Error::UnsupportedDataType(format!(
            "expected a single band, got {} samples for {}x{} pixels",
            data.len(),
            cols,
            rows
        )));
    }

    let mut raster = Raster::from_vec(data, rows, cols)?;

    if let Some(transform) = read_geotransform(&mut decoder)? {
        raster.set_transform(transform);
    }
    raster.set_crs(read_crs(&mut decoder)?);
    raster.set_nodata(read_nodata::<T, R>(&mut decoder)?);

    debug!(
        "decoded {}x{} raster, nodata={:?}, crs={:?}",
        cols,
        rows,
        raster.nodata(),
        raster.crs().map(|c| c.identifier())
    );

    Ok(raster)
}

fn tag_error(tag: Tag, e: tiff::TiffError) -> Error {
    Error::Decode(format!("{:?}: {}", tag, e))
}

/// Read the north-up transform from ModelPixelScale + ModelTiepoint
///
/// `None` when either tag is absent.
fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Option<GeoTransform>> {
    let scale = match decoder.find_tag(Tag::ModelPixelScaleTag) {
        Ok(Some(value)) => value
            .into_f64_vec()
            .map_err(|e| tag_error(Tag::ModelPixelScaleTag, e))?,
        Ok(None) => return Ok(None),
        Err(e) => return Err(tag_error(Tag::ModelPixelScaleTag, e)),
    };
    let tiepoint = match decoder.find_tag(Tag::ModelTiepointTag) {
        Ok(Some(value)) => value
            .into_f64_vec()
            .map_err(|e| tag_error(Tag::ModelTiepointTag, e))?,
        Ok(None) => return Ok(None),
        Err(e) => return Err(tag_error(Tag::ModelTiepointTag, e)),
    };

    if scale.len() < 2 || tiepoint.len() < 6 {
        return Err(Error::Decode(format!(
            "malformed georeference: {} scale values, {} tiepoint values",
            scale.len(),
            tiepoint.len()
        )));
    }

    // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
    let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
    let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
    Ok(Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1])))
}

/// Read an EPSG code from the GeoKey directory
fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Option<CRS>> {
    let keys = match decoder.find_tag(Tag::GeoKeyDirectoryTag) {
        Ok(Some(value)) => value
            .into_u16_vec()
            .map_err(|e| tag_error(Tag::GeoKeyDirectoryTag, e))?,
        Ok(None) => return Ok(None),
        Err(e) => return Err(tag_error(Tag::GeoKeyDirectoryTag, e)),
    };
    if keys.len() < 4 {
        return Err(Error::Decode(format!("GeoKey directory too short: {} values", keys.len())));
    }
    let count = keys[3] as usize;

    // Entries: [key_id, tag_location, count, value]; location 0 means inline
    Ok(keys[4..]
        .chunks_exact(4)
        .take(count)
        .find(|entry| {
            (entry[0] == PROJECTED_CS_TYPE || entry[0] == GEOGRAPHIC_TYPE)
                && entry[1] == 0
                && entry[3] != 0
                && entry[3] != 32767
        })
        .map(|entry| CRS::from_epsg(entry[3] as u32)))
}

fn read_nodata<T: RasterElement, R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Option<T>> {
    let text = match decoder.find_tag(Tag::GdalNodata) {
        Ok(Some(value)) => value.into_string().map_err(|e| tag_error(Tag::GdalNodata, e))?,
        Ok(None) => return Ok(None),
        Err(e) => return Err(tag_error(Tag::GdalNodata, e)),
    };
    let text = text.trim_matches(char::from(0)).trim();
    let value: f64 = text
        .parse()
        .map_err(|_| Error::Decode(format!("invalid GDAL_NODATA value: {:?}", text)))?;
    // a nodata outside the element range cannot occur in the data
    Ok(num_traits::cast(value))
}

/// Write a Raster to a GeoTIFF file
///
/// Samples keep the raster's element type, so integer rasters round-trip
/// exactly and f32/f64 rasters round-trip bit for bit.
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P, options: Option<GeoTiffOptions>) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let options = options.unwrap_or_default();
    debug!(
        "writing {}x{} raster to {} ({:?})",
        raster.cols(),
        raster.rows(),
        path.display(),
        options.compression
    );
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    encode_geotiff(raster, &mut writer, &options)?;
    writer.flush()?;
    Ok(())
}

/// Write a Raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T>(raster: &Raster<T>, options: Option<GeoTiffOptions>) -> Result<Vec<u8>>
where
    T: RasterElement,
{
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf), &options.unwrap_or_default())?;
    Ok(buf)
}

/// GeoTIFF metadata tags attached to every written image
struct GeoTags {
    scale: [f64; 3],
    tiepoint: [f64; 6],
    geokeys: Vec<u16>,
    nodata: Option<String>,
}

impl GeoTags {
    fn for_raster<T: RasterElement>(raster: &Raster<T>) -> Self {
        let gt = raster.transform();
        let epsg = raster.crs().and_then(|c| c.epsg()).filter(|&code| code <= u16::MAX as u32);
        let geographic = raster.crs().map_or(false, |c| c.is_geographic());

        // GTModelType: 1 = projected, 2 = geographic; GTRasterType 1 = PixelIsArea
        let mut geokeys: Vec<u16> = vec![
            1, 1, 0, 2,
            GT_MODEL_TYPE, 0, 1, if geographic { 2 } else { 1 },
            GT_RASTER_TYPE, 0, 1, 1,
        ];
        if let Some(code) = epsg {
            let key = if geographic { GEOGRAPHIC_TYPE } else { PROJECTED_CS_TYPE };
            geokeys.extend_from_slice(&[key, 0, 1, code as u16]);
            geokeys[3] = 3;
        }

        let nodata = raster.nodata().and_then(|nd| nd.to_f64()).map(|nd| {
            if nd.is_nan() {
                "nan".to_string()
            } else {
                format!("{}", nd)
            }
        });

        Self {
            scale: [gt.pixel_width, gt.pixel_height.abs(), 0.0],
            tiepoint: [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0],
            geokeys,
            nodata,
        }
    }
}

/// Typed sample storage matching the raster's element type
enum SampleBuffer {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl SampleBuffer {
    fn from_raster<T: RasterElement>(raster: &Raster<T>) -> Self {
        fn collect<T: RasterElement, S: num_traits::NumCast + Default>(raster: &Raster<T>) -> Vec<S> {
            raster
                .data()
                .iter()
                .map(|&v| num_traits::cast(v).unwrap_or_default())
                .collect()
        }

        match T::SAMPLE_KIND {
            SampleKind::U8 => SampleBuffer::U8(collect(raster)),
            SampleKind::U16 => SampleBuffer::U16(collect(raster)),
            SampleKind::U32 => SampleBuffer::U32(collect(raster)),
            SampleKind::I8 => SampleBuffer::I8(collect(raster)),
            SampleKind::I16 => SampleBuffer::I16(collect(raster)),
            SampleKind::I32 => SampleBuffer::I32(collect(raster)),
            SampleKind::F32 => SampleBuffer::F32(
                raster
                    .data()
                    .iter()
                    .map(|&v| num_traits::cast(v).unwrap_or(f32::NAN))
                    .collect(),
            ),
            SampleKind::F64 => SampleBuffer::F64(
                raster
                    .data()
                    .iter()
                    .map(|&v| v.to_f64().unwrap_or(f64::NAN))
                    .collect(),
            ),
        }
    }
}

/// Internal: encode a Raster as GeoTIFF into any `Write + Seek` sink
fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W, options: &GeoTiffOptions) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let (rows, cols) = raster.shape();
    if rows == 0 || cols == 0 {
        return Err(Error::Encode(format!("raster has zero area ({}x{})", cols, rows)));
    }

    let mut encoder = TiffEncoder::new(writer).map_err(|e| Error::Encode(e.to_string()))?;
    let tags = GeoTags::for_raster(raster);
    let image = ImageSpec {
        rows: rows as u32,
        cols: cols as u32,
        block_rows: options.block_size.max(1).min(rows as u32),
        tags: &tags,
    };

    match SampleBuffer::from_raster(raster) {
        SampleBuffer::U8(s) => image.encode::<_, Gray8>(&mut encoder, options.compression, &s),
        SampleBuffer::U16(s) => image.encode::<_, Gray16>(&mut encoder, options.compression, &s),
        SampleBuffer::U32(s) => image.encode::<_, Gray32>(&mut encoder, options.compression, &s),
        SampleBuffer::I8(s) => image.encode::<_, GrayI8>(&mut encoder, options.compression, &s),
        SampleBuffer::I16(s) => image.encode::<_, GrayI16>(&mut encoder, options.compression, &s),
        SampleBuffer::I32(s) => image.encode::<_, GrayI32>(&mut encoder, options.compression, &s),
        SampleBuffer::F32(s) => {
            image.encode::<_, Gray32Float>(&mut encoder, options.compression, &s)
        }
        SampleBuffer::F64(s) => {
            image.encode::<_, Gray64Float>(&mut encoder, options.compression, &s)
        }
    }
}

struct ImageSpec<'a> {
    rows: u32,
    cols: u32,
    block_rows: u32,
    tags: &'a GeoTags,
}

impl ImageSpec<'_> {
    fn encode<W, C>(
        &self,
        encoder: &mut TiffEncoder<W>,
        compression: Compression,
        samples: &[C::Inner],
    ) -> Result<()>
    where
        W: Write + Seek,
        C: ColorType,
        [C::Inner]: TiffValue,
    {
        match compression {
            Compression::None => self.encode_with::<W, C, _>(encoder, Uncompressed, samples),
            Compression::Lzw => self.encode_with::<W, C, _>(encoder, Lzw, samples),
            Compression::Deflate => self.encode_with::<W, C, _>(encoder, Deflate::default(), samples),
        }
    }

    fn encode_with<W, C, D>(
        &self,
        encoder: &mut TiffEncoder<W>,
        compression: D,
        samples: &[C::Inner],
    ) -> Result<()>
    where
        W: Write + Seek,
        C: ColorType,
        D: TiffCompression,
        [C::Inner]: TiffValue,
    {
        let enc = |e: tiff::TiffError| Error::Encode(e.to_string());

        let mut image = encoder
            .new_image_with_compression::<C, D>(self.cols, self.rows, compression)
            .map_err(enc)?;
        image.rows_per_strip(self.block_rows).map_err(enc)?;

        let dir = image.encoder();
        dir.write_tag(Tag::ModelPixelScaleTag, &self.tags.scale[..])
            .map_err(enc)?;
        dir.write_tag(Tag::ModelTiepointTag, &self.tags.tiepoint[..])
            .map_err(enc)?;
        dir.write_tag(Tag::GeoKeyDirectoryTag, &self.tags.geokeys[..])
            .map_err(enc)?;
        if let Some(nodata) = &self.tags.nodata {
            dir.write_tag(Tag::GdalNodata, nodata.as_str())
                .map_err(enc)?;
        }

        image.write_data(samples).map_err(enc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_dem() -> Raster<f64> {
        let values: Vec<f64> = (0..12).map(|v| 800.0 + v as f64 * 1.25).collect();
        let mut dem = Raster::from_vec(values, 3, 4)
            .unwrap()
            .with_transform(GeoTransform::new(440_000.0, 3_130_000.0, 30.0, -30.0))
            .with_crs(Some(CRS::from_epsg(32645)))
            .with_nodata(Some(-9999.0));
        dem.set(1, 2, -9999.0).unwrap();
        dem
    }

    #[test]
    fn test_buffer_roundtrip_f64() {
        let dem = sample_dem();
        let bytes = write_geotiff_to_buffer(&dem, None).unwrap();
        let back: Raster<f64> = read_geotiff_from_buffer(&bytes).unwrap();

        assert_eq!(back.shape(), dem.shape());
        assert_eq!(back.data(), dem.data());
        assert_eq!(back.nodata(), Some(-9999.0));
        assert_eq!(back.transform(), dem.transform());
        assert_eq!(back.crs().and_then(|c| c.epsg()), Some(32645));
        assert!(back.is_nodata_at(1, 2).unwrap());
    }

    #[test]
    fn test_buffer_roundtrip_u8_all_codecs() {
        let classes = Raster::from_vec(vec![0u8, 1, 2, 3, 4, 5], 2, 3)
            .unwrap()
            .with_nodata(Some(0));
        for compression in [Compression::None, Compression::Lzw, Compression::Deflate] {
            let options = GeoTiffOptions {
                compression,
                block_size: 1,
            };
            let bytes = write_geotiff_to_buffer(&classes, Some(options)).unwrap();
            let back: Raster<u8> = read_geotiff_from_buffer(&bytes).unwrap();
            assert_eq!(back.data(), classes.data(), "{:?}", compression);
            assert_eq!(back.nodata(), Some(0));
        }
    }

    #[test]
    fn test_nan_nodata_roundtrip() {
        let grid = Raster::from_vec(vec![0.25f32, f32::NAN, 0.75, 1.0], 2, 2)
            .unwrap()
            .with_nodata(Some(f32::NAN));
        let bytes = write_geotiff_to_buffer(&grid, None).unwrap();
        let back: Raster<f32> = read_geotiff_from_buffer(&bytes).unwrap();
        assert!(back.get(0, 1).unwrap().is_nan());
        assert!(back.nodata().unwrap().is_nan());
        assert_eq!(back.get(1, 0).unwrap(), 0.75);
    }

    #[test]
    fn test_file_roundtrip() {
        let dem = sample_dem();
        let tmp = tempfile::NamedTempFile::with_suffix(".tif").unwrap();
        write_geotiff(&dem, tmp.path(), None).unwrap();
        let back: Raster<f64> = read_geotiff(tmp.path()).unwrap();
        assert_eq!(back.data(), dem.data());
        assert_eq!(back.transform(), dem.transform());
        assert_eq!(back.nodata(), Some(-9999.0));
        assert!(back.crs().unwrap().is_equivalent(dem.crs().unwrap()));
    }

    #[test]
    fn test_geographic_crs_roundtrip() {
        let grid = Raster::filled(4, 5, 1.5f32)
            .with_transform(GeoTransform::new(-71.5, -33.0, 0.001, -0.001))
            .with_crs(Some(CRS::from_epsg(4326)));
        let bytes = write_geotiff_to_buffer(&grid, None).unwrap();
        let back: Raster<f32> = read_geotiff_from_buffer(&bytes).unwrap();
        let crs = back.crs().unwrap();
        assert_eq!(crs.epsg(), Some(4326));
        assert!(crs.is_geographic());
        assert_eq!(back.transform(), grid.transform());
        assert_eq!(back.nodata(), None);
    }

    #[test]
    fn test_plain_tiff_has_no_georeference() {
        let mut buf = Vec::new();
        {
            let mut encoder = TiffEncoder::new(Cursor::new(&mut buf)).unwrap();
            encoder
                .write_image::<Gray8>(3, 2, &[1u8, 2, 3, 4, 5, 6])
                .unwrap();
        }
        let back: Raster<u8> = read_geotiff_from_buffer(&buf).unwrap();
        assert_eq!(back.shape(), (2, 3));
        assert!(back.crs().is_none());
        assert_eq!(back.nodata(), None);
        assert_eq!(back.transform(), &GeoTransform::default());
    }

    #[test]
    fn test_read_missing_file() {
        let err = read_geotiff::<f64, _>("/nonexistent/dem.tif").unwrap_err();
        assert!(err.is_io());
    }

    #[test]
    fn test_read_garbage() {
        let err = read_geotiff_from_buffer::<f64>(b"not a tiff").unwrap_err();
        assert!(err.is_io());
    }

    #[test]
    fn test_compression_from_str() {
        assert_eq!("LZW".parse::<Compression>().unwrap(), Compression::Lzw);
        assert!("jpeg".parse::<Compression>().is_err());
    }
}
