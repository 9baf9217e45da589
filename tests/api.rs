//! Drives the HTTP routes in-process against stub caption models.

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use image::{DynamicImage, GrayImage, ImageFormat, Luma, RgbImage, RgbaImage};
use infernum_caption::{
    CaptionConfig, CaptionEngine, CaptionModel, Device, DominantColorModel, FixedCaptionModel,
    server,
};
use serde_json::{Value, json};
use std::{
    convert::Infallible,
    io::Cursor,
    sync::{Arc, Mutex},
};
use tower::util::ServiceExt; // for `oneshot`

const BOUNDARY: &str = "infernum-caption-test-boundary";

fn app_with<M: CaptionModel + Send + 'static>(model: M) -> Router {
    let config = CaptionConfig::new(Device::Cpu);
    server::router(Arc::new(CaptionEngine::new(model)), &config)
}

fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

fn multipart_request(field: &str, bytes: &[u8]) -> Request<Body> {
    form_request(
        &format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"frame.png\"\r\n\
             Content-Type: application/octet-stream"
        ),
        bytes,
    )
}

fn form_request(part_headers: &str, bytes: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(format!("{part_headers}\r\n\r\n").as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/generate-caption")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

/// Records the shape of every image the model receives.
#[derive(Clone, Default)]
struct RecordingModel {
    seen: Arc<Mutex<Vec<(u32, u32, usize)>>>,
}

impl CaptionModel for RecordingModel {
    type Error = Infallible;

    fn generate_caption(&mut self, image: &RgbImage) -> Result<String, Self::Error> {
        self.seen
            .lock()
            .unwrap()
            .push((image.width(), image.height(), image.as_raw().len()));
        Ok("recorded".to_string())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("CUDA out of memory")]
struct OutOfMemory;

struct FailingModel;

impl CaptionModel for FailingModel {
    type Error = OutOfMemory;

    fn generate_caption(&mut self, _image: &RgbImage) -> Result<String, Self::Error> {
        Err(OutOfMemory)
    }
}

#[tokio::test]
async fn captions_black_rgba_png() {
    let app = app_with(FixedCaptionModel::new("a black square"));
    let png = encode(
        DynamicImage::ImageRgba8(RgbaImage::new(10, 10)),
        ImageFormat::Png,
    );

    let (status, body) = send(&app, multipart_request("image", &png)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "caption": "a black square" }));
}

#[tokio::test]
async fn default_model_describes_black_square() {
    let app = app_with(DominantColorModel::new(&CaptionConfig::new(Device::Cpu)));
    let png = encode(
        DynamicImage::ImageRgba8(RgbaImage::new(10, 10)),
        ImageFormat::Png,
    );

    let (status, body) = send(&app, multipart_request("image", &png)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["caption"], "a black square");
}

#[tokio::test]
async fn model_always_receives_three_channels() {
    let model = RecordingModel::default();
    let seen = model.seen.clone();
    let app = app_with(model);

    let uploads = [
        encode(
            DynamicImage::ImageRgba8(RgbaImage::new(4, 2)),
            ImageFormat::Png,
        ),
        encode(
            DynamicImage::ImageLuma8(GrayImage::from_pixel(3, 3, Luma([90]))),
            ImageFormat::Png,
        ),
        encode(
            DynamicImage::ImageRgb8(RgbImage::new(5, 1)),
            ImageFormat::Jpeg,
        ),
    ];
    for upload in &uploads {
        let (status, body) = send(&app, multipart_request("image", upload)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["caption"], "recorded");
    }

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen, vec![(4, 2, 4 * 2 * 3), (3, 3, 3 * 3 * 3), (5, 1, 5 * 3)]);
}

#[tokio::test]
async fn missing_image_field_is_bad_request() {
    let app = app_with(FixedCaptionModel::new("unused"));
    let png = encode(DynamicImage::ImageRgb8(RgbImage::new(2, 2)), ImageFormat::Png);

    let (status, body) = send(&app, multipart_request("file", &png)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({ "success": false, "error": "No image file provided" })
    );
}

#[tokio::test]
async fn text_field_named_image_is_bad_request() {
    let app = app_with(FixedCaptionModel::new("unused"));
    let request = form_request("Content-Disposition: form-data; name=\"image\"", b"hello");

    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({ "success": false, "error": "No image file provided" })
    );
}

#[tokio::test]
async fn non_multipart_body_is_bad_request() {
    let app = app_with(FixedCaptionModel::new("unused"));
    let request = Request::builder()
        .method(Method::POST)
        .uri("/generate-caption")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"image": "abc"}"#))
        .unwrap();

    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No image file provided");
}

#[tokio::test]
async fn undecodable_image_is_server_error() {
    let app = app_with(FixedCaptionModel::new("unused"));

    let (status, body) = send(&app, multipart_request("image", b"plain text, not pixels")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().is_some_and(|msg| !msg.is_empty()));
    assert!(body.get("caption").is_none());
}

#[tokio::test]
async fn model_failure_is_server_error() {
    let app = app_with(FailingModel);
    let png = encode(DynamicImage::ImageRgb8(RgbImage::new(2, 2)), ImageFormat::Png);

    let (status, body) = send(&app, multipart_request("image", &png)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "success": false, "error": "CUDA out of memory" }));
}

#[tokio::test]
async fn oversized_upload_is_server_error() {
    let mut config = CaptionConfig::new(Device::Cpu);
    config.max_upload_bytes = 256;
    let app = server::router(
        Arc::new(CaptionEngine::new(FixedCaptionModel::new("unused"))),
        &config,
    );
    let png = encode(
        DynamicImage::ImageRgb8(RgbImage::from_fn(64, 64, |x, y| {
            image::Rgb([x as u8 * 4, y as u8 * 4, (x ^ y) as u8])
        })),
        ImageFormat::Png,
    );
    assert!(png.len() > 256);

    let (status, body) = send(&app, multipart_request("image", &png)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn health_is_stateless() {
    let app = app_with(FailingModel);
    let health = || {
        Request::builder()
            .method(Method::GET)
            .uri("/health")
            .body(Body::empty())
            .unwrap()
    };

    let (status, body) = send(&app, health()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "healthy" }));

    let png = encode(DynamicImage::ImageRgb8(RgbImage::new(2, 2)), ImageFormat::Png);
    let (status, _) = send(&app, multipart_request("image", &png)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let (status, _) = send(&app, multipart_request("image", b"junk")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, body) = send(&app, health()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "healthy" }));
}

#[tokio::test]
async fn any_origin_is_allowed() {
    let app = app_with(FixedCaptionModel::new("unused"));
    let request = Request::builder()
        .method(Method::GET)
        .uri("/health")
        .header(header::ORIGIN, "http://127.0.0.1:8080")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}

#[tokio::test]
async fn health_rejects_post() {
    let app = app_with(FixedCaptionModel::new("unused"));
    let request = Request::builder()
        .method(Method::POST)
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
