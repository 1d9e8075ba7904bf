// HTTP surface: one POST route per operation, plus static files from the
// plots directory for everything else.

pub mod cors;
pub mod error;

use std::path::Path;

use annotator_common::protocol::{ErrorResponse, Operation};
use axum::{
    body::{Body, Bytes},
    extract::{rejection::BytesRejection, DefaultBodyLimit},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get_service, post, MethodRouter},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::service::{AnnotatorService, ServiceError};
use crate::store::Slot;

pub use cors::cors_layer;
pub use error::{ApiError, ErrorKind};

pub const DEFAULT_MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Build the full application router.
pub fn router(service: AnnotatorService, static_root: &Path, max_body_bytes: usize) -> Router {
    let mut router = Router::new();
    for operation in Operation::ALL {
        let service = service.clone();
        let handler =
            move |body: Result<Bytes, BytesRejection>| dispatch(service, operation, body);
        let route: MethodRouter = post(handler).options(preflight).fallback(not_found);
        router = router.route(operation.path(), route);
    }

    let static_files: MethodRouter = get_service(ServeDir::new(static_root))
        .options(preflight)
        .fallback(not_found);

    apply_middleware(router.fallback_service(static_files), max_body_bytes)
}

fn apply_middleware(router: Router, max_body_bytes: usize) -> Router {
    router
        .layer(middleware::from_fn(panic_handler))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
}

/// Run one operation on the blocking pool and render its outcome.
async fn dispatch(
    service: AnnotatorService,
    operation: Operation,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => return ApiError::from_rejection(operation, rejection).into_response(),
    };

    let outcome =
        tokio::task::spawn_blocking(move || run_operation(&service, operation, &body)).await;

    match outcome {
        Ok(Ok(response)) => response,
        Ok(Err(error)) => ApiError::from_service(operation, error).into_response(),
        Err(join_error) => {
            error!(%operation, ?join_error, "operation task failed");
            ApiError::new(operation, ErrorKind::Internal, "internal server error").into_response()
        }
    }
}

fn run_operation(
    service: &AnnotatorService,
    operation: Operation,
    body: &[u8],
) -> Result<Response, ServiceError> {
    match operation {
        Operation::SaveAnnotations => service.save_annotations(body).map(ok_json),
        Operation::SaveResultImage => service.save_image(Slot::Annotated, body).map(ok_json),
        Operation::SaveBackgroundImage => service.save_image(Slot::Background, body).map(ok_json),
        Operation::LocateScript => service.locate_script(parse_json(body)?).map(ok_json),
        Operation::RefreshFromKnownSource => service.refresh_from_known_source().map(ok_json),
        Operation::RefreshByFilename => {
            service.refresh_by_filename(parse_json_or_default(body)?).map(ok_json)
        }
        Operation::SetSourcePath => {
            service.set_source_path(parse_json_or_default(body)?).map(ok_json)
        }
    }
}

fn ok_json<T: Serialize>(payload: T) -> Response {
    Json(payload).into_response()
}

fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ServiceError> {
    serde_json::from_slice(body)
        .map_err(|error| ServiceError::InvalidInput(format!("invalid JSON body: {error}")))
}

/// Like [`parse_json`], but an empty body means "no fields".
fn parse_json_or_default<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, ServiceError> {
    if body.trim_ascii().is_empty() {
        return Ok(T::default());
    }
    parse_json(body)
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn panic_handler(request: Request<Body>, next: Next) -> Response {
    match tokio::spawn(async move { next.run(request).await }).await {
        Ok(response) => response,
        Err(join_error) => {
            error!(?join_error, "request handling panicked");
            let body = ErrorResponse { error: "internal server error".to_string() };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}
