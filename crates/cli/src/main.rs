//! ndvizone CLI - NDVI zonal statistics for polygon features

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use ndvizone_algorithms::engine::{compute_with, EngineParams, ScratchMode, ZonalOutput};
use ndvizone_algorithms::imagery::{ndvi, NormalizedDifferenceParams};
use ndvizone_algorithms::statistics::{ZonalParams, ZonalStatistic};
use ndvizone_algorithms::vector::reproject_collection;
use ndvizone_core::io::{read_geotiff, write_geojson, write_geotiff};
use ndvizone_core::{FeatureCollection, Raster, CRS};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "ndvizone")]
#[command(author, version, about = "NDVI zonal statistics for polygon features", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

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
    /// Compute the NDVI raster from red and NIR bands
    Ndvi {
        /// Red band file
        #[arg(long)]
        red: PathBuf,
        /// Near-infrared band file
        #[arg(long)]
        nir: PathBuf,
        /// Output GeoTIFF
        output: PathBuf,
    },
    /// Aggregate NDVI over the polygons of a GeoJSON file
    Zonal {
        /// Input GeoJSON with polygon features
        vector: PathBuf,
        /// Red band file
        #[arg(long)]
        red: PathBuf,
        /// Near-infrared band file
        #[arg(long)]
        nir: PathBuf,
        /// Output GeoJSON with statistics attached
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Include every pixel touched by a polygon, not only pixels whose center is inside
        #[arg(long)]
        all_touched: bool,
        /// Persist the NDVI raster to a temporary GeoTIFF before aggregating
        #[arg(long)]
        scratch_file: bool,
        /// Directory for the scratch GeoTIFF (implies --scratch-file)
        #[arg(long)]
        scratch_dir: Option<PathBuf>,
        /// Statistics to attach: mean, count, sum, min, max
        #[arg(long, value_delimiter = ',', default_value = "mean")]
        stats: Vec<ZonalStatistic>,
        /// Write the output in EPSG:4326 instead of the raster CRS
        #[arg(long)]
        to_wgs84: bool,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_band(path: &PathBuf) -> Result<Raster<f64>> {
    let pb = spinner("Reading raster...");
    let raster: Raster<f64> = read_geotiff(path, None)
        .with_context(|| format!("Failed to read raster {}", path.display()))?;
    pb.finish_and_clear();
    info!("Input: {} x {}", raster.cols(), raster.rows());
    Ok(raster)
}

fn write_result(raster: &Raster<f64>, path: &PathBuf) -> Result<()> {
    let pb = spinner("Writing output...");
    write_geotiff(raster, path).context("Failed to write output")?;
    pb.finish_and_clear();
    Ok(())
}

fn write_features(features: &FeatureCollection, path: &PathBuf) -> Result<()> {
    let pb = spinner("Writing output...");
    write_geojson(features, path).context("Failed to write output")?;
    pb.finish_and_clear();
    Ok(())
}

fn done(name: &str, path: &PathBuf, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn print_table(output: &ZonalOutput, stats: &[ZonalStatistic]) {
    let header: Vec<String> = std::iter::once("id".to_string())
        .chain(stats.iter().map(|s| s.attribute_name().to_string()))
        .collect();
    println!("{}", header.join("\t"));

    for (i, feature) in output.features.iter().enumerate() {
        let id = feature
            .display_id()
            .map_or_else(|| i.to_string(), |id| id.to_string());
        let row: Vec<String> = std::iter::once(id)
            .chain(stats.iter().map(|s| {
                feature
                    .get_property(s.attribute_name())
                    .map_or_else(|| "null".to_string(), |v| v.to_string())
            }))
            .collect();
        println!("{}", row.join("\t"));
    }
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            let raster = read_band(&input)?;
            let (rows, cols) = raster.shape();
            let bounds = raster.bounds();
            let stats = raster.statistics();
            let gt = raster.transform();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
            println!("Pixel size: {} x {}", gt.pixel_width, gt.pixel_height.abs());
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                bounds.0, bounds.1, bounds.2, bounds.3
            );
            match raster.crs() {
                Some(crs) => println!("CRS: {}", crs),
                None => println!("CRS: none"),
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
                100.0 * stats.valid_count as f64 / raster.len() as f64
            );
        }

        // ── NDVI ─────────────────────────────────────────────────────
        Commands::Ndvi { red, nir, output } => {
            let red = read_band(&red)?;
            let nir = read_band(&nir)?;
            let start = Instant::now();
            let result = ndvi(&red, &nir, NormalizedDifferenceParams::default())
                .context("Failed to calculate NDVI")?;
            let elapsed = start.elapsed();
            write_result(&result, &output)?;
            done("NDVI", &output, elapsed);
        }

        // ── Zonal ────────────────────────────────────────────────────
        Commands::Zonal {
            vector,
            red,
            nir,
            output,
            all_touched,
            scratch_file,
            scratch_dir,
            stats,
            to_wgs84,
        } => {
            let params = EngineParams {
                zonal: ZonalParams {
                    all_touched,
                    stats: stats.clone(),
                },
                scratch: if scratch_file || scratch_dir.is_some() {
                    ScratchMode::TempFile
                } else {
                    ScratchMode::InMemory
                },
                scratch_dir,
                ..Default::default()
            };

            let pb = spinner("Computing NDVI zonal statistics...");
            let start = Instant::now();
            let result = compute_with(&vector, &red, &nir, &params)
                .context("Failed to compute zonal statistics");
            let elapsed = start.elapsed();
            pb.finish_and_clear();
            let result = result?;

            for warning in &result.warnings {
                warn!("{}", warning);
            }
            if result.reprojected {
                info!("Features reprojected to {}", result.features.crs);
            }

            print_table(&result, &stats);

            let summary = &result.index_summary;
            if let (Some(min), Some(max)) = (summary.min, summary.max) {
                println!("\nNDVI range: {:.4} to {:.4}", min, max);
            }
            let (min_x, min_y, max_x, max_y) = result.raster_bounds;
            println!(
                "Raster bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                min_x, min_y, max_x, max_y
            );

            match output {
                Some(path) => {
                    let features = if to_wgs84 {
                        reproject_collection(&result.features, &CRS::wgs84())
                            .context("Failed to reproject output to EPSG:4326")?
                    } else {
                        result.features
                    };
                    write_features(&features, &path)?;
                    done("Zonal statistics", &path, elapsed);
                }
                None => println!("  Processing time: {:.2?}", elapsed),
            }
        }
    }

    Ok(())
}
