//! In-process collaborator used by the HTTP client tests: an axum router
//! fronting a `LocalService`, bound to a random local port.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Multipart, Path, Query, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get};
use axum::{Json, Router};
use lightbox_core::StoredAsset;
use lightbox_service::{LocalService, MediaService, ServiceError};
use lightbox_store::ExternalBlob;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;

type ApiError = (StatusCode, Json<Value>);

#[derive(Clone)]
struct AppState {
    service: Arc<LocalService>,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct FilenameQuery {
    filename: String,
}

pub struct TestServer {
    pub base_url: String,
    _handle: tokio::task::JoinHandle<()>,
}

pub async fn spawn_test_server() -> TestServer {
    spawn(None).await
}

pub async fn spawn_test_server_with_key(key: &str) -> TestServer {
    spawn(Some(key.to_string())).await
}

async fn spawn(api_key: Option<String>) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{addr}");
    let app = build_router(AppState {
        service: Arc::new(LocalService::new()),
        api_key,
    });
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    TestServer {
        base_url,
        _handle: handle,
    }
}

fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route(
            "/api/images",
            get(list_images)
                .post(add_image)
                .put(set_images)
                .delete(clear_images),
        )
        .route("/api/images/{index}", delete(remove_image))
        .route("/api/images/{index}/content", get(image_content))
        .route(
            "/api/document",
            get(get_document).put(set_document).delete(clear_document),
        )
        .route("/api/document/content", get(document_content))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_key));

    Router::new()
        .route("/api/health", get(|| async { Json(json!({ "status": "ok" })) }))
        .merge(protected)
        .with_state(state)
}

async fn require_key(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if let Some(key) = &state.api_key {
        let expected = format!("Bearer {key}");
        let presented = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        if presented != Some(expected.as_str()) {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "missing or invalid api key" })),
            )
                .into_response();
        }
    }
    next.run(req).await
}

fn to_error(e: ServiceError) -> ApiError {
    let status = match e {
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        ServiceError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": e.to_string() })))
}

async fn list_images(State(state): State<AppState>) -> Result<Json<Vec<StoredAsset>>, ApiError> {
    let records = state.service.list_images().await.map_err(to_error)?;
    let listing = records
        .into_iter()
        .enumerate()
        .map(|(i, r)| StoredAsset {
            filename: r.filename,
            uploaded_at: r.uploaded_at,
            locator: format!("/api/images/{i}/content"),
        })
        .collect();
    Ok(Json(listing))
}

async fn add_image(
    State(state): State<AppState>,
    Query(q): Query<FilenameQuery>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    state
        .service
        .add_image(ExternalBlob::from_bytes(body), &q.filename)
        .await
        .map_err(to_error)?;
    Ok(StatusCode::CREATED)
}

async fn set_images(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<StatusCode, ApiError> {
    let mut blobs = Vec::new();
    let mut filenames = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(bad_request)?;
        blobs.push(ExternalBlob::from_bytes(bytes));
        filenames.push(filename);
    }
    state
        .service
        .set_images(blobs, filenames)
        .await
        .map_err(to_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn remove_image(
    State(state): State<AppState>,
    Path(index): Path<u64>,
) -> Result<StatusCode, ApiError> {
    state.service.remove_image(index).await.map_err(to_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn clear_images(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.service.clear_images().await.map_err(to_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn image_content(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> Result<Bytes, ApiError> {
    let records = state.service.list_images().await.map_err(to_error)?;
    let record = records
        .get(index)
        .ok_or_else(|| to_error(ServiceError::NotFound(format!("image {index}"))))?;
    record
        .blob
        .get_bytes()
        .await
        .map_err(|e| to_error(e.into()))
}

async fn set_document(
    State(state): State<AppState>,
    Query(q): Query<FilenameQuery>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    state
        .service
        .set_document(ExternalBlob::from_bytes(body), &q.filename)
        .await
        .map_err(to_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_document(
    State(state): State<AppState>,
) -> Result<Json<Option<StoredAsset>>, ApiError> {
    let record = state.service.get_document().await.map_err(to_error)?;
    Ok(Json(record.map(|r| StoredAsset {
        filename: r.filename,
        uploaded_at: r.uploaded_at,
        locator: "api/document/content".into(),
    })))
}

async fn clear_document(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.service.clear_document().await.map_err(to_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn document_content(State(state): State<AppState>) -> Result<Bytes, ApiError> {
    let record = state
        .service
        .get_document()
        .await
        .map_err(to_error)?
        .ok_or_else(|| to_error(ServiceError::NotFound("document".into())))?;
    record
        .blob
        .get_bytes()
        .await
        .map_err(|e| to_error(e.into()))
}

fn bad_request(e: impl std::fmt::Display) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": e.to_string() })))
}
