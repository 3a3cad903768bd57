use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

pub mod document;
pub mod error;
pub mod export;
pub mod fetch;
pub mod ingest;
pub mod logging;
pub mod metrics;
pub mod server;
pub mod settings;
pub mod vectorize;

pub use document::{StrokeStyle, VectorDocument};
pub use error::VectorizeError;
pub use metrics::Metrics;
pub use server::VectorizeResponse;
pub use vectorize::{vectorize, DetectionParams, Segment, Vectorization};

/// Decodes an uploaded raster and runs the full pipeline on it.
pub fn vectorize_bytes(bytes: &[u8], px_per_ft: f64) -> Result<Vectorization, VectorizeError> {
    vectorize_bytes_with(bytes, px_per_ft, &DetectionParams::default())
}

pub fn vectorize_bytes_with(
    bytes: &[u8],
    px_per_ft: f64,
    params: &DetectionParams,
) -> Result<Vectorization, VectorizeError> {
    let raster = ingest::decode_raster(bytes)?;
    Ok(vectorize::vectorize_with(&raster, px_per_ft, params))
}

/// Fetches a remote raster and runs the full pipeline on it.
pub async fn vectorize_url(
    client: &reqwest::Client,
    url: &str,
    px_per_ft: f64,
    params: &DetectionParams,
    settings: &settings::Settings,
) -> Result<Vectorization, VectorizeError> {
    let bytes = fetch::fetch_image(
        client,
        url,
        settings.fetch_timeout,
        settings.body_limit_bytes(),
    )
    .await?;
    vectorize_bytes_with(&bytes, px_per_ft, params)
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub data: Option<String>,
    pub url: Option<String>,
    pub px_per_ft: Option<f64>,
    pub svg_path: Option<String>,
    pub dxf_path: Option<String>,
    pub png_path: Option<String>,
    pub settings_path: Option<String>,
    pub params: DetectionParams,
}

/// Vectorizes one input for the command line and returns the JSON envelope
/// the HTTP API would answer with.
pub async fn run(config: Config) -> Result<String> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;
    let px_per_ft = config.px_per_ft.unwrap_or(settings.px_per_ft);

    let vectorization = match (config.data.as_deref(), config.url.as_deref()) {
        (Some(_), Some(_)) => return Err(anyhow!("use either --data or --url, not both")),
        (Some(path), None) => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("failed to read image: {}", path))?;
            vectorize_bytes_with(&bytes, px_per_ft, &config.params)?
        }
        (None, Some(url)) => {
            let client = reqwest::Client::new();
            vectorize_url(&client, url, px_per_ft, &config.params, &settings).await?
        }
        (None, None) => return Err(anyhow!("no input given; pass --data <PATH> or --url <URL>")),
    };

    write_outputs(&config, &vectorization.document)?;

    let response = VectorizeResponse::from(&vectorization);
    serde_json::to_string_pretty(&response).with_context(|| "failed to serialize response")
}

fn write_outputs(config: &Config, document: &VectorDocument) -> Result<()> {
    if let Some(path) = output_path(config.svg_path.as_deref()) {
        export::write_svg(document, &path)?;
    }
    if let Some(path) = output_path(config.dxf_path.as_deref()) {
        export::write_dxf(document, &path)?;
    }
    if let Some(path) = output_path(config.png_path.as_deref()) {
        export::write_png(document, &path)?;
    }
    Ok(())
}

fn output_path(raw: Option<&str>) -> Option<PathBuf> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use tempfile::tempdir;

    fn step_edge_png() -> Vec<u8> {
        let raster = RgbImage::from_fn(200, 100, |_, y| {
            if y < 50 { Rgb([0, 0, 0]) } else { Rgb([255, 255, 255]) }
        });
        let mut bytes = Vec::new();
        raster
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .expect("encode png");
        bytes
    }

    #[test]
    fn vectorize_bytes_rejects_non_images() {
        let err = vectorize_bytes(b"%PDF? no, just text", 12.0).expect_err("text");
        assert!(err.is_decode());
    }

    #[tokio::test]
    async fn run_writes_every_requested_output() {
        let dir = tempdir().expect("tempdir");
        let input = dir.path().join("plan.png");
        std::fs::write(&input, step_edge_png()).expect("write input");
        let svg = dir.path().join("plan.svg");
        let dxf = dir.path().join("plan.dxf");
        let png = dir.path().join("preview.png");

        let output = run(Config {
            data: Some(input.display().to_string()),
            px_per_ft: Some(24.0),
            svg_path: Some(svg.display().to_string()),
            dxf_path: Some(dxf.display().to_string()),
            png_path: Some(png.display().to_string()),
            ..Config::default()
        })
        .await
        .expect("run");

        let response: VectorizeResponse = serde_json::from_str(&output).expect("json");
        assert_eq!(response.metrics.line_count, 1);
        assert_eq!(response.metrics.walls_len_ft, 8.3);
        assert!(std::fs::read_to_string(&svg).expect("svg").contains("<line "));
        assert!(dxf.exists());
        assert!(png.exists());
    }

    #[tokio::test]
    async fn run_requires_exactly_one_input() {
        let err = run(Config::default()).await.expect_err("no input");
        assert!(err.to_string().contains("--data"));

        let err = run(Config {
            data: Some("a.png".to_string()),
            url: Some("http://localhost/a.png".to_string()),
            ..Config::default()
        })
        .await
        .expect_err("both inputs");
        assert!(err.to_string().contains("not both"));
    }

    #[tokio::test]
    async fn run_applies_detection_params() {
        let dir = tempdir().expect("tempdir");
        let input = dir.path().join("plan.png");
        std::fs::write(&input, step_edge_png()).expect("write input");

        let mut params = DetectionParams::default();
        params.segments.min_line_length = 250;
        let output = run(Config {
            data: Some(input.display().to_string()),
            params,
            ..Config::default()
        })
        .await
        .expect("run");

        let response: VectorizeResponse = serde_json::from_str(&output).expect("json");
        assert_eq!(response.metrics.line_count, 0);
        assert_eq!(response.confidence, 0.2);
    }

    #[tokio::test]
    async fn missing_file_has_context() {
        let err = run(Config {
            data: Some("/definitely/not/here.png".to_string()),
            ..Config::default()
        })
        .await
        .expect_err("missing");
        assert!(err.to_string().contains("failed to read image"));
    }
}
