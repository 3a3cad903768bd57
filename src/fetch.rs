use std::time::Duration;

use tracing::{debug, warn};

use crate::error::VectorizeError;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// Downloads the image at `url` with a single GET attempt.
///
/// The timeout covers connecting, the response head and the body. Any
/// non-2xx status is a failure; the body of such a response is discarded.
/// Bodies larger than `max_bytes` are rejected, by their declared length
/// when present and otherwise while streaming.
pub async fn fetch_image(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
    max_bytes: usize,
) -> Result<Vec<u8>, VectorizeError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(VectorizeError::Fetch("image_url is empty".to_string()));
    }
    debug!("fetching image: {}", url);

    let mut response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(|err| describe(err, timeout))?;

    let status = response.status();
    if !status.is_success() {
        warn!("image fetch rejected ({}): {}", status, url);
        return Err(VectorizeError::Fetch(format!(
            "upstream returned HTTP {}",
            status
        )));
    }

    if let Some(declared) = response.content_length() {
        if declared > max_bytes as u64 {
            return Err(too_large(max_bytes));
        }
    }

    let mut body = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|err| describe(err, timeout))?
    {
        if body.len() + chunk.len() > max_bytes {
            return Err(too_large(max_bytes));
        }
        body.extend_from_slice(&chunk);
    }
    debug!("fetched {} bytes", body.len());
    Ok(body)
}

fn too_large(max_bytes: usize) -> VectorizeError {
    warn!("image fetch exceeded {} bytes", max_bytes);
    VectorizeError::Fetch(format!("image is larger than {} bytes", max_bytes))
}

fn describe(err: reqwest::Error, timeout: Duration) -> VectorizeError {
    let message = if err.is_timeout() {
        format!("request timed out after {}s", timeout.as_secs_f32())
    } else if err.is_builder() {
        format!("invalid url: {}", err)
    } else if err.is_connect() {
        format!("connection failed: {}", err)
    } else {
        err.to_string()
    };
    warn!("image fetch failed: {}", message);
    VectorizeError::Fetch(message)
}
