#![cfg(feature = "web")]

use axum::Router;
use axum::http::{Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use image_opening::fetcher::{DEFAULT_FETCH_TIMEOUT, DEFAULT_LOOKUP_TIMEOUT, HttpImageSource, ImageSource};
use tokio::net::TcpListener;

const PNG_BODY: &[u8] = b"\x89PNG fake body";

/// Answers GET only, like CDNs that refuse HEAD
async fn get_only(method: Method) -> Response {
    if method == Method::HEAD {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }
    ([(header::CONTENT_TYPE, "IMAGE/PNG")], PNG_BODY).into_response()
}

async fn html() -> Response {
    ([(header::CONTENT_TYPE, "Text/HTML; Charset=UTF-8")], "<p>not a picture</p>").into_response()
}

async fn missing() -> Response {
    (StatusCode::NOT_FOUND, "gone").into_response()
}

/// Local server on a random port; returns its base URL
async fn serve() -> String {
    let app = Router::new()
        .route("/photo.png", get(get_only))
        .route("/page", get(html))
        .route("/missing.jpg", get(missing));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn source() -> HttpImageSource {
    HttpImageSource::new(DEFAULT_LOOKUP_TIMEOUT, DEFAULT_FETCH_TIMEOUT).unwrap()
}

#[tokio::test]
async fn rejected_head_falls_back_to_get() {
    let base = serve().await;
    let ct = source().content_type(&format!("{}/photo.png", base)).await;
    assert_eq!(ct.as_deref(), Some("image/png"));
}

#[tokio::test]
async fn content_type_is_lower_cased() {
    let base = serve().await;
    let ct = source().content_type(&format!("{}/page", base)).await;
    assert_eq!(ct.as_deref(), Some("text/html; charset=utf-8"));
}

#[tokio::test]
async fn missing_page_has_no_content_type() {
    let base = serve().await;
    assert_eq!(source().content_type(&format!("{}/missing.jpg", base)).await, None);
}

#[tokio::test]
async fn fetch_returns_body_and_fails_on_error_status() {
    let base = serve().await;
    let src = source();

    let body = src.fetch(&format!("{}/photo.png", base)).await.unwrap();
    assert_eq!(body, PNG_BODY);

    assert!(src.fetch(&format!("{}/missing.jpg", base)).await.is_err());
}

#[tokio::test]
async fn unreachable_host_has_no_content_type() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let url = format!("http://{}/a.png", addr);
    assert_eq!(source().content_type(&url).await, None);
    assert!(source().fetch(&url).await.is_err());
}
