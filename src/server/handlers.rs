use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue, Method, Response, StatusCode};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use std::sync::Arc;
use tracing::info;

use crate::settings;

use super::models::{ErrorResponse, UrlForm, VectorizeResponse};
use super::state::ServerState;
use super::vectorize::{parse_scale, vectorize_remote, vectorize_upload, ServerError};

type HandlerResult = Result<Json<VectorizeResponse>, (StatusCode, Json<ErrorResponse>)>;

pub async fn run_server(settings: settings::Settings, addr: String) -> Result<()> {
    let app = router(settings);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind server address: {}", addr))?;
    info!("listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn router(settings: settings::Settings) -> Router {
    let body_limit = settings.body_limit_bytes();
    let state = Arc::new(ServerState::new(settings));
    Router::new()
        .route("/health", get(health))
        .route("/vectorize_file", post(vectorize_file))
        .route("/vectorize_url", post(vectorize_url))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum::middleware::from_fn(cors_middleware))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn cors_middleware(req: Request<Body>, next: Next) -> Result<Response<Body>, StatusCode> {
    if req.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return Ok(response);
    }
    let mut response = next.run(req).await;
    apply_cors_headers(response.headers_mut());
    Ok(response)
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET,POST,OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("*"),
    );
}

/// Keeps the status multer reports, so an oversized body answers 413.
fn multipart_error(err: MultipartError) -> ServerError {
    ServerError {
        status: err.status(),
        message: err.body_text(),
    }
}

fn reject(err: ServerError) -> (StatusCode, Json<ErrorResponse>) {
    (err.status, Json(ErrorResponse { error: err.message }))
}

async fn vectorize_file(
    State(state): State<Arc<ServerState>>,
    mut multipart: Multipart,
) -> HandlerResult {
    let mut file = None;
    let mut scale = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| reject(multipart_error(err)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| reject(multipart_error(err)))?;
                file = Some(bytes.to_vec());
            }
            "px_per_ft" => {
                let text = field
                    .text()
                    .await
                    .map_err(|err| reject(multipart_error(err)))?;
                scale = Some(text);
            }
            _ => {}
        }
    }

    let Some(bytes) = file else {
        return Err(reject(ServerError::bad_request("file is required")));
    };
    let px_per_ft = parse_scale(scale.as_deref(), state.settings.px_per_ft).map_err(reject)?;
    info!("vectorize_file: {} bytes, px_per_ft={}", bytes.len(), px_per_ft);
    vectorize_upload(bytes, px_per_ft)
        .await
        .map(Json)
        .map_err(reject)
}

async fn vectorize_url(State(state): State<Arc<ServerState>>, request: Request) -> HandlerResult {
    let form = read_url_form(request).await.map_err(reject)?;
    let Some(image_url) = form.image_url.filter(|url| !url.trim().is_empty()) else {
        return Err(reject(ServerError::bad_request("image_url is required")));
    };
    let px_per_ft =
        parse_scale(form.px_per_ft.as_deref(), state.settings.px_per_ft).map_err(reject)?;
    info!("vectorize_url: {}, px_per_ft={}", image_url, px_per_ft);
    vectorize_remote(state.as_ref(), &image_url, px_per_ft)
        .await
        .map(Json)
        .map_err(reject)
}

/// Accepts the URL form either urlencoded or as multipart fields.
async fn read_url_form(request: Request) -> Result<UrlForm, ServerError> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("multipart/form-data"))
        .unwrap_or(false);

    if !is_multipart {
        let Form(form) = Form::<UrlForm>::from_request(request, &())
            .await
            .map_err(|err| ServerError::bad_request(err.body_text()))?;
        return Ok(form);
    }

    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|err| ServerError::bad_request(err.body_text()))?;
    let mut form = UrlForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(multipart_error)?
    {
        let name = field.name().unwrap_or_default().to_string();
        let text = field.text().await.map_err(multipart_error)?;
        match name.as_str() {
            "image_url" => form.image_url = Some(text),
            "px_per_ft" => form.px_per_ft = Some(text),
            _ => {}
        }
    }
    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    const BOUNDARY: &str = "floorplan-test-boundary";

    async fn spawn(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{}", addr)
    }

    fn png_bytes(image: RgbImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .expect("encode");
        bytes
    }

    fn step_png() -> Vec<u8> {
        png_bytes(RgbImage::from_fn(200, 100, |_, y| {
            if y < 50 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        }))
    }

    fn multipart_body(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, filename, data) in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match filename {
                Some(filename) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                        name, filename
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                        .as_bytes(),
                ),
            }
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    async fn post_multipart(url: &str, body: Vec<u8>) -> reqwest::Response {
        reqwest::Client::new()
            .post(url)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(body)
            .send()
            .await
            .expect("send")
    }

    #[tokio::test]
    async fn file_upload_returns_svg_and_metrics() {
        let base = spawn(router(settings::Settings::default())).await;
        let png = step_png();
        let body = multipart_body(&[
            ("file", Some("plan.png"), png.as_slice()),
            ("px_per_ft", None, b"24".as_slice()),
        ]);
        let response = post_multipart(&format!("{}/vectorize_file", base), body).await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some("*")
        );

        let payload: VectorizeResponse = response.json().await.expect("json");
        assert_eq!(payload.metrics.line_count, 1);
        assert_eq!(payload.metrics.walls_len_ft, 8.3);
        let svg = String::from_utf8(BASE64.decode(&payload.svg).expect("base64")).expect("utf8");
        assert_eq!(svg.matches("<line ").count(), payload.metrics.line_count);
    }

    #[tokio::test]
    async fn file_upload_defaults_scale() {
        let base = spawn(router(settings::Settings::default())).await;
        let png = step_png();
        let body = multipart_body(&[("file", Some("plan.png"), png.as_slice())]);
        let response = post_multipart(&format!("{}/vectorize_file", base), body).await;
        let payload: VectorizeResponse = response.json().await.expect("json");
        assert_eq!(payload.metrics.walls_len_ft, 16.6);
    }

    #[tokio::test]
    async fn text_upload_is_a_client_error() {
        let base = spawn(router(settings::Settings::default())).await;
        let body = multipart_body(&[("file", Some("notes.txt"), b"just some notes".as_slice())]);
        let response = post_multipart(&format!("{}/vectorize_file", base), body).await;
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        let payload: ErrorResponse = response.json().await.expect("json");
        assert!(payload.error.contains("decode"));
    }

    #[tokio::test]
    async fn missing_file_field_is_a_client_error() {
        let base = spawn(router(settings::Settings::default())).await;
        let body = multipart_body(&[("px_per_ft", None, b"12".as_slice())]);
        let response = post_multipart(&format!("{}/vectorize_file", base), body).await;
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn url_entry_fetches_and_vectorizes() {
        let png = step_png();
        let upstream = spawn(Router::new().route(
            "/plan.png",
            get(move || {
                let png = png.clone();
                async move { png }
            }),
        ))
        .await;
        let base = spawn(router(settings::Settings::default())).await;

        let response = reqwest::Client::new()
            .post(format!("{}/vectorize_url", base))
            .header("content-type", "application/x-www-form-urlencoded")
            .body(format!("image_url={}/plan.png&px_per_ft=12", upstream))
            .send()
            .await
            .expect("send");
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let payload: VectorizeResponse = response.json().await.expect("json");
        assert_eq!(payload.metrics.line_count, 1);
        assert_eq!(payload.confidence, 0.2 + 1.0 / 250.0);
    }

    #[tokio::test]
    async fn url_entry_accepts_multipart_fields() {
        let upstream = spawn(Router::new().route(
            "/blank.png",
            get(|| async { png_bytes(RgbImage::from_pixel(40, 30, Rgb([255, 255, 255]))) }),
        ))
        .await;
        let base = spawn(router(settings::Settings::default())).await;
        let url = format!("{}/blank.png", upstream);
        let body = multipart_body(&[("image_url", None, url.as_bytes())]);
        let response = post_multipart(&format!("{}/vectorize_url", base), body).await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let payload: VectorizeResponse = response.json().await.expect("json");
        assert_eq!(payload.metrics.line_count, 0);
        assert_eq!(payload.confidence, 0.2);
    }

    #[tokio::test]
    async fn upstream_failure_is_a_gateway_error() {
        let upstream = spawn(Router::new()).await;
        let base = spawn(router(settings::Settings::default())).await;
        let response = reqwest::Client::new()
            .post(format!("{}/vectorize_url", base))
            .header("content-type", "application/x-www-form-urlencoded")
            .body(format!("image_url={}/nowhere.png", upstream))
            .send()
            .await
            .expect("send");
        assert_eq!(response.status(), reqwest::StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn missing_image_url_is_a_client_error() {
        let base = spawn(router(settings::Settings::default())).await;
        let response = reqwest::Client::new()
            .post(format!("{}/vectorize_url", base))
            .header("content-type", "application/x-www-form-urlencoded")
            .body("px_per_ft=12")
            .send()
            .await
            .expect("send");
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn preflight_is_answered_with_cors_headers() {
        let base = spawn(router(settings::Settings::default())).await;
        let response = reqwest::Client::new()
            .request(reqwest::Method::OPTIONS, format!("{}/vectorize_file", base))
            .send()
            .await
            .expect("send");
        assert_eq!(response.status(), reqwest::StatusCode::NO_CONTENT);
        assert!(response.headers().contains_key("access-control-allow-methods"));
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let base = spawn(router(settings::Settings::default())).await;
        let response = reqwest::get(format!("{}/health", base)).await.expect("send");
        assert_eq!(response.status(), reqwest::StatusCode::OK);
    }

    fn limited_settings() -> settings::Settings {
        settings::Settings {
            body_limit_mb: 1,
            ..settings::Settings::default()
        }
    }

    #[tokio::test]
    async fn upload_over_the_body_limit_is_rejected() {
        let settings = limited_settings();
        let oversized = vec![0u8; settings.body_limit_bytes() + 4096];
        let base = spawn(router(settings)).await;
        let body = multipart_body(&[("file", Some("plan.png"), oversized.as_slice())]);
        let response = post_multipart(&format!("{}/vectorize_file", base), body).await;
        assert_eq!(response.status(), reqwest::StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn upstream_body_over_the_limit_is_a_gateway_error() {
        let settings = limited_settings();
        let oversized = vec![0u8; settings.body_limit_bytes() + 1];
        let upstream = spawn(Router::new().route(
            "/huge.png",
            get(move || {
                let oversized = oversized.clone();
                async move { oversized }
            }),
        ))
        .await;
        let base = spawn(router(settings)).await;
        let response = reqwest::Client::new()
            .post(format!("{}/vectorize_url", base))
            .header("content-type", "application/x-www-form-urlencoded")
            .body(format!("image_url={}/huge.png", upstream))
            .send()
            .await
            .expect("send");
        assert_eq!(response.status(), reqwest::StatusCode::BAD_GATEWAY);
        let payload: ErrorResponse = response.json().await.expect("json");
        assert!(payload.error.contains("larger than"));
    }
}
