use axum::http::StatusCode;
use tracing::warn;

use crate::error::VectorizeError;

use super::models::VectorizeResponse;
use super::state::ServerState;

#[derive(Debug)]
pub(crate) struct ServerError {
    pub(crate) status: StatusCode,
    pub(crate) message: String,
}

impl ServerError {
    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<VectorizeError> for ServerError {
    fn from(err: VectorizeError) -> Self {
        let status = match err {
            VectorizeError::Decode(_) => StatusCode::BAD_REQUEST,
            VectorizeError::Fetch(_) => StatusCode::BAD_GATEWAY,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

/// Parses the optional `px_per_ft` form value, falling back to `default`.
pub(crate) fn parse_scale(raw: Option<&str>, default: f64) -> Result<f64, ServerError> {
    let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(default);
    };
    raw.parse::<f64>()
        .map_err(|_| ServerError::bad_request(format!("px_per_ft must be a number, got '{}'", raw)))
}

/// Decodes and vectorizes `bytes` on the blocking pool.
pub(crate) async fn vectorize_upload(
    bytes: Vec<u8>,
    px_per_ft: f64,
) -> Result<VectorizeResponse, ServerError> {
    let result = tokio::task::spawn_blocking(move || crate::vectorize_bytes(&bytes, px_per_ft))
        .await
        .map_err(|err| ServerError::internal(format!("server task failed: {}", err)))?;
    match result {
        Ok(vectorization) => Ok(VectorizeResponse::from(&vectorization)),
        Err(err) => {
            warn!("rejected upload: {}", err);
            Err(err.into())
        }
    }
}

pub(crate) async fn vectorize_remote(
    state: &ServerState,
    image_url: &str,
    px_per_ft: f64,
) -> Result<VectorizeResponse, ServerError> {
    let bytes = crate::fetch::fetch_image(
        &state.client,
        image_url,
        state.settings.fetch_timeout,
        state.settings.body_limit_bytes(),
    )
    .await?;
    vectorize_upload(bytes, px_per_ft).await
}
