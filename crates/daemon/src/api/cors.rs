// CORS for the annotator page, which may be opened from any origin
// (including `file://`).

use axum::http::{header::CONTENT_TYPE, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Any origin, `POST`/`OPTIONS`, and the `Content-Type` request header.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
}
