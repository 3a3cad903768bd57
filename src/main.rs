use std::path::Path;

use anyhow::Result;
use clap::Parser;
use floorplan_vectorizer::DetectionParams;

#[derive(Parser, Debug)]
#[command(
    name = "floorplan-vectorizer",
    version,
    about = "Turn floorplan rasters into wall line SVGs with length estimates"
)]
struct Cli {
    /// Run the HTTP server (optionally on ADDR; default from settings)
    #[arg(long = "server", num_args = 0..=1, default_missing_value = "")]
    server: Option<String>,

    /// Image file to vectorize
    #[arg(short = 'd', long = "data")]
    data: Option<String>,

    /// Image URL to fetch and vectorize
    #[arg(short = 'u', long = "url")]
    url: Option<String>,

    /// Pixels per foot (default from settings, 12.0)
    #[arg(short = 'p', long = "px-per-ft")]
    px_per_ft: Option<f64>,

    /// Write the SVG document to this path
    #[arg(long = "svg")]
    svg: Option<String>,

    /// Write the detected walls as DXF lines to this path
    #[arg(long = "dxf")]
    dxf: Option<String>,

    /// Write a PNG preview of the SVG to this path
    #[arg(long = "png")]
    png: Option<String>,

    /// Canny low threshold (default 60)
    #[arg(long = "canny-low")]
    canny_low: Option<f32>,

    /// Canny high threshold (default 180)
    #[arg(long = "canny-high")]
    canny_high: Option<f32>,

    /// Hough votes needed before a line is traced (default 120)
    #[arg(long = "hough-threshold")]
    hough_threshold: Option<i32>,

    /// Shortest accepted segment in pixels (default 50)
    #[arg(long = "min-line-length")]
    min_line_length: Option<i32>,

    /// Longest gap bridged along a segment in pixels (default 8)
    #[arg(long = "max-line-gap")]
    max_line_gap: Option<i32>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    floorplan_vectorizer::logging::init(cli.verbose || cli.server.is_some())?;

    if let Some(addr) = cli.server {
        let settings = floorplan_vectorizer::settings::load_settings(
            cli.read_settings.as_deref().map(Path::new),
        )?;
        let addr = if addr.trim().is_empty() {
            settings.server_addr.clone()
        } else {
            addr.trim().to_string()
        };
        return floorplan_vectorizer::server::run_server(settings, addr).await;
    }

    let params = detection_params(&cli);
    let output = floorplan_vectorizer::run(floorplan_vectorizer::Config {
        data: cli.data,
        url: cli.url,
        px_per_ft: cli.px_per_ft,
        svg_path: cli.svg,
        dxf_path: cli.dxf,
        png_path: cli.png,
        settings_path: cli.read_settings,
        params,
    })
    .await?;

    println!("{}", output);
    Ok(())
}

fn detection_params(cli: &Cli) -> DetectionParams {
    let mut params = DetectionParams::default();
    if let Some(value) = cli.canny_low {
        params.canny_low = value;
    }
    if let Some(value) = cli.canny_high {
        params.canny_high = value;
    }
    if let Some(value) = cli.hough_threshold {
        params.segments.threshold = value;
    }
    if let Some(value) = cli.min_line_length {
        params.segments.min_line_length = value;
    }
    if let Some(value) = cli.max_line_gap {
        params.segments.max_line_gap = value;
    }
    params
}
