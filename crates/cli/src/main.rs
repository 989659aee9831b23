//! HazMap CLI - multi-hazard raster processing

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use hazmap_algorithms::classification::{classify, ClassificationScheme};
use hazmap_algorithms::fusion::{combine, normalize, HazardLayer, LayerRole, NormalizationMethod, WeightSet};
use hazmap_algorithms::exposure::risk_index;
use hazmap_algorithms::landslide::{training_samples, FeatureStack, LogisticModel};
use hazmap_algorithms::pipeline::{run_exposure, run_flood, run_landslide, run_multi_hazard, HazardZones};
use hazmap_algorithms::segmentation::ThresholdMode;
use hazmap_algorithms::terrain::{aspect, curvature, slope, CurvatureParams, SlopeParams, SlopeUnits, TerrainDerivatives};
use hazmap_algorithms::vectorize::{vectorize, LabelNames};
use hazmap_core::align::align;
use hazmap_core::io::{read_geotiff, write_geotiff, Compression, GeoTiffOptions};
use hazmap_core::vector::FeatureCollection;
use hazmap_core::{HazardConfig, Raster, RasterElement};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "hazmap")]
#[command(author, version, about = "Multi-hazard raster processing", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON configuration file (defaults are used when absent)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output compression: none, lzw, deflate (overrides the configuration)
    #[arg(long, global = true)]
    compression: Option<Compression>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Terrain derivatives from a DEM
    Terrain {
        #[command(subcommand)]
        algorithm: TerrainCommands,
    },
    /// Detect flooded areas from SAR backscatter
    Flood {
        /// Backscatter raster in dB
        sar: PathBuf,
        /// Elevation raster
        dem: PathBuf,
        /// Output directory
        output_dir: PathBuf,
        /// Manual threshold in dB (disables Otsu)
        #[arg(short, long)]
        threshold: Option<f64>,
    },
    /// Rescale a raster to [0, 1]
    Normalize {
        /// Input raster file
        input: PathBuf,
        /// Output file
        output: PathBuf,
        /// Method: min_max, z_score (default from configuration)
        #[arg(short, long)]
        method: Option<NormalizationMethod>,
    },
    /// Weighted combination of role-tagged layers
    Combine {
        /// Output file
        output: PathBuf,
        /// Layer as role=path, e.g. landslide=ls.tif (repeatable)
        #[arg(short, long = "layer", required = true)]
        layers: Vec<String>,
        /// Normalization applied to each layer first: min_max, z_score (default from configuration)
        #[arg(short, long)]
        method: Option<NormalizationMethod>,
    },
    /// Classify a continuous raster into five hazard classes
    Classify {
        /// Input raster file
        input: PathBuf,
        /// Output class raster (1-5, 0 = nodata)
        output: PathBuf,
        /// Threshold set: landslide, exposure, multi-hazard
        #[arg(long, default_value = "multi-hazard")]
        scheme: String,
    },
    /// Convert a class raster to GeoJSON polygons
    Vectorize {
        /// Input class raster
        input: PathBuf,
        /// Output GeoJSON file
        output: PathBuf,
        /// Label classes as a flood mask (1 = flood) instead of hazard levels
        #[arg(long)]
        flood: bool,
    },
    /// Landslide susceptibility zones
    Landslide {
        /// Elevation raster
        dem: PathBuf,
        /// Output directory
        output_dir: PathBuf,
        /// Land cover raster (extra feature)
        #[arg(long)]
        landcover: Option<PathBuf>,
        /// Rainfall raster (extra feature)
        #[arg(long)]
        rainfall: Option<PathBuf>,
        /// Inventory of landslide points (GeoJSON); writes training samples
        #[arg(long)]
        inventory: Option<PathBuf>,
        /// Probability raster from an external model
        #[arg(long, conflicts_with = "coefficients")]
        probability: Option<PathBuf>,
        /// Logistic model coefficients, one per feature, comma separated
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        coefficients: Option<Vec<f64>>,
        /// Logistic model intercept
        #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
        intercept: f64,
    },
    /// Exposure density from hazard, buildings and population
    Exposure {
        /// Hazard raster
        hazard: PathBuf,
        /// Building density raster
        buildings: PathBuf,
        /// Output directory
        output_dir: PathBuf,
        /// Population density raster
        #[arg(long)]
        population: Option<PathBuf>,
        /// Landslide raster; with --flood also writes a risk index
        #[arg(long, requires = "flood")]
        landslide: Option<PathBuf>,
        /// Flood raster; with --landslide also writes a risk index
        #[arg(long, requires = "landslide")]
        flood: Option<PathBuf>,
    },
    /// Composite multi-hazard risk
    MultiHazard {
        /// Landslide susceptibility raster
        landslide: PathBuf,
        /// Flood extent raster
        flood: PathBuf,
        /// Output directory
        output_dir: PathBuf,
        /// Exposure raster
        #[arg(long)]
        exposure: Option<PathBuf>,
    },
    /// Print the active configuration as JSON
    Config {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

// ─── Terrain subcommands ────────────────────────────────────────────────

#[derive(Subcommand)]
enum TerrainCommands {
    /// Calculate slope from DEM
    Slope {
        /// Input DEM file
        input: PathBuf,
        /// Output file
        output: PathBuf,
        /// Output units: degrees, percent, radians
        #[arg(short, long, default_value = "degrees")]
        units: String,
        /// Cell size in metres (defaults to the raster's)
        #[arg(long)]
        cell_size: Option<f64>,
    },
    /// Calculate aspect from DEM
    Aspect {
        /// Input DEM file
        input: PathBuf,
        /// Output file
        output: PathBuf,
    },
    /// Calculate surface curvature from DEM
    Curvature {
        /// Input DEM file
        input: PathBuf,
        /// Output file
        output: PathBuf,
        /// Cell size in metres (defaults to the raster's)
        #[arg(long)]
        cell_size: Option<f64>,
    },
    /// Slope, aspect and curvature in one pass
    All {
        /// Input DEM file
        input: PathBuf,
        /// Output directory
        output_dir: PathBuf,
        /// Cell size in metres (defaults to the raster's)
        #[arg(long)]
        cell_size: Option<f64>,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn load_config(path: Option<&Path>) -> Result<HazardConfig> {
    let config = match path {
        Some(p) => HazardConfig::from_json_file(p)
            .with_context(|| format!("Failed to load configuration {}", p.display()))?,
        None => HazardConfig::default(),
    };
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn read_raster<T: RasterElement>(path: &Path) -> Result<Raster<T>> {
    let pb = spinner("Reading raster...");
    let raster: Raster<T> =
        read_geotiff(path).with_context(|| format!("Failed to read raster {}", path.display()))?;
    pb.finish_and_clear();
    info!("Input: {} ({} x {})", path.display(), raster.cols(), raster.rows());
    Ok(raster)
}

/// Flood layers are 0/1 masks where 0 means dry, even when tagged nodata
fn read_flood(path: &Path) -> Result<Raster<f64>> {
    let mut raster = read_raster::<f64>(path)?;
    if raster.nodata() == Some(0.0) {
        raster.set_nodata(None);
    }
    Ok(raster)
}

fn write_raster<T: RasterElement>(raster: &Raster<T>, path: &Path, options: &GeoTiffOptions) -> Result<()> {
    let pb = spinner("Writing output...");
    write_geotiff(raster, path, Some(options.clone()))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    pb.finish_and_clear();
    Ok(())
}

fn write_features(features: &FeatureCollection, path: &Path) -> Result<()> {
    let pb = spinner("Writing GeoJSON...");
    features
        .write_geojson(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    pb.finish_and_clear();
    Ok(())
}

fn write_zones(zones: &HazardZones, dir: &Path, stem: &str, options: &GeoTiffOptions) -> Result<()> {
    write_raster(&zones.values, &dir.join(format!("{}.tif", stem)), options)?;
    write_raster(&zones.classified, &dir.join(format!("{}_classified.tif", stem)), options)?;
    write_features(&zones.features, &dir.join(format!("{}_zones.geojson", stem)))?;
    println!("  {} zone polygons", zones.features.len());
    Ok(())
}

fn create_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

/// Resample `others` onto the grid of `reference`
fn align_to(reference: Raster<f64>, others: Vec<Raster<f64>>) -> Result<Vec<Raster<f64>>> {
    let mut all = Vec::with_capacity(others.len() + 1);
    all.push(reference);
    all.extend(others);
    if all.iter().skip(1).any(|r| r.shape() != all[0].shape() || r.transform() != all[0].transform()) {
        info!("Aligning {} inputs to the first grid", all.len());
    }
    align(&all, 0).context("Failed to align inputs")
}

fn cell_size_of(dem: &Raster<f64>, explicit: Option<f64>) -> f64 {
    explicit.unwrap_or_else(|| dem.cell_size())
}

fn parse_units(units: &str) -> Result<SlopeUnits> {
    match units.to_lowercase().as_str() {
        "degrees" | "deg" | "d" => Ok(SlopeUnits::Degrees),
        "percent" | "pct" | "%" => Ok(SlopeUnits::Percent),
        "radians" | "rad" | "r" => Ok(SlopeUnits::Radians),
        _ => anyhow::bail!("Unknown units: {}. Use degrees, percent, or radians.", units),
    }
}

fn parse_layer(arg: &str) -> Result<(LayerRole, PathBuf)> {
    let (role, path) = arg
        .split_once('=')
        .with_context(|| format!("Layer must be 'role=path', got: {}", arg))?;
    let role: LayerRole = role.trim().parse().context("Invalid layer role")?;
    Ok((role, PathBuf::from(path.trim())))
}

/// Read role-tagged layers, align them to the first, and combine them
///
/// Without an explicit method the configured multi-hazard normalization
/// applies. Weights come from the multi-hazard set, with the exposure
/// components added.
fn combine_layers(
    layers: &[String],
    method: Option<NormalizationMethod>,
    config: &HazardConfig,
) -> Result<Raster<f64>> {
    let specs = layers
        .iter()
        .map(|s| parse_layer(s))
        .collect::<Result<Vec<_>>>()?;
    let mut roles = Vec::with_capacity(specs.len());
    let mut grids = Vec::with_capacity(specs.len());
    for (role, path) in specs {
        let grid = if role == LayerRole::Flood {
            read_flood(&path)?
        } else {
            read_raster::<f64>(&path)?
        };
        roles.push(role);
        grids.push(grid);
    }
    let mut grids = grids.into_iter();
    let reference = grids.next().context("No layers given")?;
    let aligned = align_to(reference, grids.collect())?;
    let layers: Vec<HazardLayer> = roles
        .into_iter()
        .zip(aligned)
        .map(|(role, grid)| HazardLayer::new(role, grid))
        .collect();

    let mut weights = WeightSet::from(&config.multi_hazard.weights);
    for (role, w) in WeightSet::from(&config.exposure.weights).iter() {
        weights.insert(role, w);
    }

    let method = method.unwrap_or(config.multi_hazard.normalization_method);
    combine(&layers, &weights, Some(method)).context("Combination failed")
}

fn scheme_for(name: &str, config: &HazardConfig) -> Result<ClassificationScheme> {
    let thresholds = match name.to_lowercase().replace('_', "-").as_str() {
        "landslide" => &config.landslide.classification_thresholds,
        "exposure" => &config.exposure.classification_thresholds,
        "multi-hazard" | "multihazard" | "risk" => &config.multi_hazard.classification_thresholds,
        _ => anyhow::bail!("Unknown scheme: {}. Use landslide, exposure, or multi-hazard.", name),
    };
    Ok(ClassificationScheme::from_thresholds(thresholds)?)
}

/// Point coordinates of every Point/MultiPoint feature in a GeoJSON file
fn read_inventory(path: &Path) -> Result<Vec<(f64, f64)>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read inventory {}", path.display()))?;
    let geojson: geojson::GeoJson = text.parse().context("Inventory is not valid GeoJSON")?;
    let collection = geojson::FeatureCollection::try_from(geojson)
        .context("Inventory must be a FeatureCollection")?;

    let mut points = Vec::new();
    for feature in collection.features {
        match feature.geometry.map(|g| g.value) {
            Some(geojson::Value::Point(p)) if p.len() >= 2 => points.push((p[0], p[1])),
            Some(geojson::Value::MultiPoint(ps)) => {
                points.extend(ps.iter().filter(|p| p.len() >= 2).map(|p| (p[0], p[1])))
            }
            _ => warn!("Skipping inventory feature without point geometry"),
        }
    }
    info!("Inventory: {} points", points.len());
    Ok(points)
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    let config = load_config(cli.config.as_deref())?;
    let mut options = config.raster.geotiff_options();
    if let Some(c) = cli.compression {
        options.compression = c;
    }

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            let raster = read_raster::<f64>(&input)?;
            let (rows, cols) = raster.shape();
            let bounds = raster.bounds();
            let stats = raster.statistics();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
            println!("Cell size: {}", raster.cell_size());
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                bounds.0, bounds.1, bounds.2, bounds.3
            );
            if let Some(crs) = raster.crs() {
                println!("CRS: {}", crs.identifier());
            }
            if let Some(nodata) = raster.nodata() {
                println!("NoData: {}", nodata);
            }
            println!("\nStatistics:");
            if let Some(min) = stats.min {
                println!("  Min: {:.4}", min);
            }
            if let Some(max) = stats.max {
                println!("  Max: {:.4}", max);
            }
            if let Some(mean) = stats.mean {
                println!("  Mean: {:.4}", mean);
            }
            println!(
                "  Valid cells: {} ({:.1}%)",
                stats.valid_count,
                100.0 * stats.valid_count as f64 / raster.len().max(1) as f64
            );
        }

        // ── Terrain ──────────────────────────────────────────────────
        Commands::Terrain { algorithm } => match algorithm {
            TerrainCommands::Slope {
                input,
                output,
                units,
                cell_size,
            } => {
                let dem = read_raster::<f64>(&input)?;
                let start = Instant::now();
                let params = SlopeParams {
                    cell_size: cell_size_of(&dem, cell_size),
                    units: parse_units(&units)?,
                };
                let result = slope(&dem, params).context("Failed to calculate slope")?;
                let elapsed = start.elapsed();
                write_raster(&result, &output, &options)?;
                done("Slope", &output, elapsed);
            }

            TerrainCommands::Aspect { input, output } => {
                let dem = read_raster::<f64>(&input)?;
                let start = Instant::now();
                let result = aspect(&dem).context("Failed to calculate aspect")?;
                let elapsed = start.elapsed();
                write_raster(&result, &output, &options)?;
                done("Aspect", &output, elapsed);
            }

            TerrainCommands::Curvature {
                input,
                output,
                cell_size,
            } => {
                let dem = read_raster::<f64>(&input)?;
                let start = Instant::now();
                let params = CurvatureParams {
                    cell_size: cell_size_of(&dem, cell_size),
                };
                let result = curvature(&dem, params).context("Failed to calculate curvature")?;
                let elapsed = start.elapsed();
                write_raster(&result, &output, &options)?;
                done("Curvature", &output, elapsed);
            }

            TerrainCommands::All {
                input,
                output_dir,
                cell_size,
            } => {
                let dem = read_raster::<f64>(&input)?;
                create_dir(&output_dir)?;
                let start = Instant::now();
                let terrain = TerrainDerivatives::compute(&dem, cell_size_of(&dem, cell_size))
                    .context("Failed to calculate terrain derivatives")?;
                let elapsed = start.elapsed();
                write_raster(&terrain.slope, &output_dir.join("slope.tif"), &options)?;
                write_raster(&terrain.aspect, &output_dir.join("aspect.tif"), &options)?;
                write_raster(&terrain.curvature, &output_dir.join("curvature.tif"), &options)?;
                done("Terrain derivatives", &output_dir, elapsed);
            }
        },

        // ── Flood ────────────────────────────────────────────────────
        Commands::Flood {
            sar,
            dem,
            output_dir,
            threshold,
        } => {
            let mut config = config;
            if let Some(t) = threshold {
                config.flood.sar_threshold = t;
                config.flood.use_otsu = false;
            }
            let sar = read_raster::<f64>(&sar)?;
            let dem = read_raster::<f64>(&dem)?;
            let mut grids = align_to(sar, vec![dem])?.into_iter();
            let (sar, dem) = match (grids.next(), grids.next()) {
                (Some(s), Some(d)) => (s, d),
                _ => anyhow::bail!("Alignment returned too few grids"),
            };

            create_dir(&output_dir)?;
            let start = Instant::now();
            let out = run_flood(&sar, &dem, &config).context("Flood detection failed")?;
            let elapsed = start.elapsed();

            let mode = if config.flood.use_otsu {
                ThresholdMode::Otsu
            } else {
                ThresholdMode::Manual(config.flood.sar_threshold)
            };
            println!("Threshold: {:.2} dB ({:?})", out.result.threshold, mode);

            let mut mask = out.result.mask.clone();
            mask.set_nodata(Some(0));
            write_raster(&mask, &output_dir.join("flood_extent.tif"), &options)?;
            write_features(&out.features, &output_dir.join("flood_extent.geojson"))?;

            let stats_path = output_dir.join("flood_statistics.json");
            let json = serde_json::to_string_pretty(&out.result.statistics)?;
            std::fs::write(&stats_path, json)
                .with_context(|| format!("Failed to write {}", stats_path.display()))?;

            let s = &out.result.statistics;
            println!(
                "Flooded: {} pixels, {:.3} km² ({:.2}% of valid)",
                s.flood_pixels, s.flood_area_km2, s.flood_percentage
            );
            done("Flood extent", &output_dir, elapsed);
        }

        // ── Normalize ────────────────────────────────────────────────
        Commands::Normalize {
            input,
            output,
            method,
        } => {
            let raster = read_raster::<f64>(&input)?;
            let method = method.unwrap_or(config.multi_hazard.normalization_method);
            let start = Instant::now();
            let result = normalize(&raster, method).context("Normalization failed")?;
            let elapsed = start.elapsed();
            write_raster(&result, &output, &options)?;
            done("Normalized raster", &output, elapsed);
        }

        // ── Combine ──────────────────────────────────────────────────
        Commands::Combine {
            output,
            layers,
            method,
        } => {
            let start = Instant::now();
            let result = combine_layers(&layers, method, &config)?;
            let elapsed = start.elapsed();
            write_raster(&result, &output, &options)?;
            done("Combined raster", &output, elapsed);
        }

        // ── Classify ─────────────────────────────────────────────────
        Commands::Classify {
            input,
            output,
            scheme,
        } => {
            let raster = read_raster::<f64>(&input)?;
            let scheme = scheme_for(&scheme, &config)?;
            let start = Instant::now();
            let result = classify(&raster, &scheme).context("Classification failed")?;
            let elapsed = start.elapsed();
            write_raster(&result, &output, &options)?;
            done("Classes", &output, elapsed);
        }

        // ── Vectorize ────────────────────────────────────────────────
        Commands::Vectorize {
            input,
            output,
            flood,
        } => {
            let mut raster = read_raster::<u8>(&input)?;
            let names = if flood {
                // dry cells never become polygons
                raster.set_nodata(Some(0));
                LabelNames::flood()
            } else {
                ClassificationScheme::default().label_names()
            };
            let start = Instant::now();
            let features = vectorize(&raster, &names).context("Vectorization failed")?;
            let elapsed = start.elapsed();
            write_features(&features, &output)?;
            println!("  {} polygons", features.len());
            done("Polygons", &output, elapsed);
        }

        // ── Landslide ────────────────────────────────────────────────
        Commands::Landslide {
            dem,
            output_dir,
            landcover,
            rainfall,
            inventory,
            probability,
            coefficients,
            intercept,
        } => {
            let dem = read_raster::<f64>(&dem)?;
            let cell_size = config.raster.pixel_size;
            create_dir(&output_dir)?;
            let start = Instant::now();

            let extras: Vec<(&str, PathBuf)> = [("landcover", landcover), ("rainfall", rainfall)]
                .into_iter()
                .filter_map(|(name, p)| p.map(|p| (name, p)))
                .collect();
            let extra_grids = extras
                .iter()
                .map(|(_, p)| read_raster::<f64>(p))
                .collect::<Result<Vec<_>>>()?;
            let aligned = align_to(dem, extra_grids)?;

            let mut stack = FeatureStack::from_dem(&aligned[0], cell_size)
                .context("Failed to build feature stack")?;
            for ((name, _), grid) in extras.iter().zip(&aligned[1..]) {
                stack.push(*name, grid)?;
            }
            info!("Features: {}", stack.names().join(", "));

            if let Some(path) = inventory {
                let points = read_inventory(&path)?;
                let training = training_samples(&stack, Some(&points))
                    .context("Failed to assemble training samples")?;
                let json = serde_json::json!({
                    "features": stack.names(),
                    "samples": training.samples,
                    "labels": training.labels,
                });
                let out = output_dir.join("training_samples.json");
                std::fs::write(&out, serde_json::to_string_pretty(&json)?)
                    .with_context(|| format!("Failed to write {}", out.display()))?;
                println!(
                    "Training samples: {} positive, {} negative -> {}",
                    training.positives(),
                    training.negatives(),
                    out.display()
                );
            }

            let zones = match (probability, coefficients) {
                (Some(path), _) => {
                    let prob = read_raster::<f64>(&path)?;
                    let mut prob = align_to(stack.template()?.clone(), vec![prob])?;
                    let model_input = FeatureStack::new().with_layer("probability", &prob.remove(1))?;
                    run_landslide(&model_input, &|s: &[f64]| s[0].clamp(0.0, 1.0), &config)?
                }
                (None, Some(coefficients)) => {
                    let model = LogisticModel::new(coefficients, intercept);
                    run_landslide(&stack, &model, &config)?
                }
                (None, None) => {
                    println!("No --probability or --coefficients given; skipping prediction");
                    return Ok(());
                }
            };
            let elapsed = start.elapsed();
            write_zones(&zones, &output_dir, "landslide_susceptibility", &options)?;
            done("Landslide susceptibility", &output_dir, elapsed);
        }

        // ── Exposure ─────────────────────────────────────────────────
        Commands::Exposure {
            hazard,
            buildings,
            output_dir,
            population,
            landslide,
            flood,
        } => {
            let hazard = read_raster::<f64>(&hazard)?;
            let mut others = vec![read_raster::<f64>(&buildings)?];
            if let Some(p) = &population {
                others.push(read_raster::<f64>(p)?);
            }
            let aligned = align_to(hazard, others)?;
            create_dir(&output_dir)?;

            let start = Instant::now();
            let zones = run_exposure(&aligned[0], &aligned[1], aligned.get(2), &config)
                .context("Exposure analysis failed")?;
            write_zones(&zones, &output_dir, "exposure_density", &options)?;

            if let (Some(ls), Some(fl)) = (landslide, flood) {
                let grids = align_to(
                    zones.values.clone(),
                    vec![read_raster::<f64>(&ls)?, read_flood(&fl)?],
                )?;
                let risk = risk_index(&grids[1], &grids[2], &grids[0], &config.exposure)
                    .context("Risk index failed")?;
                write_raster(&risk, &output_dir.join("risk_index.tif"), &options)?;
            }
            done("Exposure", &output_dir, start.elapsed());
        }

        // ── Multi-hazard ─────────────────────────────────────────────
        Commands::MultiHazard {
            landslide,
            flood,
            output_dir,
            exposure,
        } => {
            let landslide = read_raster::<f64>(&landslide)?;
            let mut others = vec![read_flood(&flood)?];
            if let Some(e) = &exposure {
                others.push(read_raster::<f64>(e)?);
            }
            let aligned = align_to(landslide, others)?;
            create_dir(&output_dir)?;

            let start = Instant::now();
            let out = run_multi_hazard(&aligned[0], &aligned[1], aligned.get(2), &config)
                .context("Multi-hazard integration failed")?;
            let elapsed = start.elapsed();

            write_raster(&out.values, &output_dir.join("multi_hazard_risk.tif"), &options)?;
            write_raster(
                &out.classified,
                &output_dir.join("multi_hazard_risk_classified.tif"),
                &options,
            )?;
            write_features(&out.features, &output_dir.join("multi_hazard_risk.geojson"))?;
            println!("  {} risk polygons", out.features.len());
            done("Multi-hazard risk", &output_dir, elapsed);
        }

        // ── Config ───────────────────────────────────────────────────
        Commands::Config { output } => {
            let json = config.to_json_string().context("Failed to serialize configuration")?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("Configuration saved to: {}", path.display());
                }
                None => println!("{}", json),
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use hazmap_core::GeoTransform;

    fn write_layer(dir: &Path, name: &str, values: Vec<f64>) -> PathBuf {
        let raster = Raster::from_vec(values, 2, 2)
            .unwrap()
            .with_transform(GeoTransform::new(0.0, 60.0, 30.0, -30.0));
        let path = dir.join(name);
        write_geotiff(&raster, &path, None).unwrap();
        path
    }

    #[test]
    fn test_combine_normalizes_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let landslide = write_layer(dir.path(), "ls.tif", vec![0.0, 1.0, 2.0, 3.0]);
        let exposure = write_layer(dir.path(), "exp.tif", vec![0.0, 1000.0, 2000.0, 3000.0]);
        let layers = vec![
            format!("landslide={}", landslide.display()),
            format!("exposure={}", exposure.display()),
        ];

        let result = combine_layers(&layers, None, &HazardConfig::default()).unwrap();
        // both layers rescale to 0, 1/3, 2/3, 1 before weighting
        assert_relative_eq!(result.get(0, 0).unwrap(), 0.0);
        assert_relative_eq!(result.get(0, 1).unwrap(), 1.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(result.get(1, 1).unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_combine_rejects_bad_layer_argument() {
        assert!(combine_layers(&["landslide".to_string()], None, &HazardConfig::default()).is_err());
    }

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_units("Percent").unwrap(), SlopeUnits::Percent);
        assert_eq!(parse_units("rad").unwrap(), SlopeUnits::Radians);
        assert!(parse_units("gradians").is_err());
    }
}
