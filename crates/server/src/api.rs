use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use splitbill_core::Vnd;
use splitbill_ocr::{decode_image_payload, image_extension, ContentHash, ReceiptItem, ReceiptPipeline, ReceiptSource};
use splitbill_storage::{DbPool, NewReceipt, ReceiptRecord};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

const MISSING_IMAGE: &str = "Vui lòng chọn ảnh hóa đơn";
const INVALID_IMAGE: &str = "Ảnh hóa đơn không hợp lệ";
const PARSE_FAILED: &str = "Đã xảy ra lỗi khi phân tích hóa đơn";
const PARSE_SUCCEEDED: &str = "Đã phân tích hóa đơn thành công!";
const LOAD_FAILED: &str = "Không thể tải hóa đơn";

const DEFAULT_LIST_LIMIT: u32 = 20;
const MAX_LIST_LIMIT: u32 = 100;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub pipeline: Arc<ReceiptPipeline>,
    /// Root of the content-addressed image store, served under `/attachments`.
    pub attachments_dir: PathBuf,
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    BadRequest(&'static str),
    NotFound(String),
    /// Logged in full; the client only sees `message`.
    Internal { message: &'static str, source: anyhow::Error },
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.to_string()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal { message, source } => {
                tracing::error!("{message}: {source:#}");
                (StatusCode::INTERNAL_SERVER_ERROR, message.to_string())
            }
        };
        (status, Json(ErrorBody { detail })).into_response()
    }
}

fn parse_failed(source: impl Into<anyhow::Error>) -> ApiError {
    ApiError::Internal { message: PARSE_FAILED, source: source.into() }
}

// ── Payloads ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseRequest {
    #[serde(default)]
    pub image_base64: String,
    pub uploaded_by: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub uploaded_by: String,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseResponse {
    pub receipt_id: String,
    pub image_url: String,
    pub items: Vec<ReceiptItem>,
    pub total: Vnd,
    pub message: &'static str,
    pub source: ReceiptSource,
}

// ── Router ────────────────────────────────────────────────────────────────────

pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    let attachments = ServeDir::new(&state.attachments_dir);
    Router::new()
        .route("/health", get(health))
        .route("/api/receipts", get(list_receipts))
        .route("/api/receipts/parse", post(parse_receipt))
        .route("/api/receipts/{id}", get(get_receipt))
        .nest_service("/attachments", attachments)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn parse_receipt(
    State(state): State<AppState>,
    Json(request): Json<ParseRequest>,
) -> Result<Json<ParseResponse>, ApiError> {
    if request.image_base64.trim().is_empty() {
        return Err(ApiError::BadRequest(MISSING_IMAGE));
    }
    let image = decode_image_payload(&request.image_base64).map_err(|e| {
        tracing::info!("Rejected receipt upload: {e}");
        ApiError::BadRequest(INVALID_IMAGE)
    })?;

    // Content-addressed store: identical photos share one file.
    let hash = ContentHash::of(&image);
    let ext = image_extension(&image);
    let dest = hash.attachment_path(&state.attachments_dir, ext);
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(parse_failed)?;
    }
    tokio::fs::write(&dest, &image).await.map_err(parse_failed)?;

    // OCR is CPU bound; keep it off the async workers.
    let pipeline = state.pipeline.clone();
    let outcome = tokio::task::spawn_blocking(move || pipeline.parse_image_bytes(&image))
        .await
        .map_err(parse_failed)?;

    let hash_hex = hash.to_hex();
    let image_path = dest.to_string_lossy();
    let record = splitbill_storage::insert_receipt(
        &state.db,
        NewReceipt {
            image_path: &image_path,
            image_hash: &hash_hex,
            receipt: &outcome.receipt,
            source: outcome.source,
            uploaded_by: request.uploaded_by.as_deref(),
        },
    )
    .await
    .map_err(parse_failed)?;

    tracing::info!(
        receipt_id = %record.id,
        source = %outcome.source,
        items = outcome.receipt.items().len(),
        "Receipt parsed"
    );

    let (items, total) = outcome.receipt.into_parts();
    Ok(Json(ParseResponse {
        receipt_id: record.id,
        image_url: format!("/attachments/{}/{}.{}", &hash_hex[..2], hash_hex, ext),
        items,
        total,
        message: PARSE_SUCCEEDED,
        source: outcome.source,
    }))
}

async fn get_receipt(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ReceiptRecord>, ApiError> {
    splitbill_storage::get_receipt_by_id(&state.db, &id)
        .await
        .map_err(|e| ApiError::Internal { message: LOAD_FAILED, source: e.into() })?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Không tìm thấy hóa đơn {id}")))
}

/// Newest receipts of one uploader; `limit` defaults to 20 and is capped at 100.
async fn list_receipts(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ReceiptRecord>>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).min(MAX_LIST_LIMIT);
    splitbill_storage::list_receipts_by_uploader(&state.db, &query.uploaded_by, limit)
        .await
        .map(Json)
        .map_err(|e| ApiError::Internal { message: LOAD_FAILED, source: e.into() })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
    use splitbill_ocr::{FallbackReason, MockRecognizer, OcrEngine, ParserConfig};
    use std::io::Cursor;
    use tower::ServiceExt;

    fn tiny_png() -> Vec<u8> {
        let img: GrayImage = ImageBuffer::from_fn(4, 4, |_, _| Luma([200u8]));
        let mut buf = Vec::new();
        DynamicImage::ImageLuma8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    async fn test_app(engine: OcrEngine, attachments: &std::path::Path) -> (Router, DbPool) {
        let db = splitbill_storage::create_in_memory_db().await.unwrap();
        let state = AppState {
            db: db.clone(),
            pipeline: Arc::new(ReceiptPipeline::new(engine, ParserConfig::default())),
            attachments_dir: attachments.to_path_buf(),
        };
        (router(state, 1024 * 1024), db)
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn parse_returns_extracted_items_and_stores_image() {
        let dir = tempfile::tempdir().unwrap();
        let engine = OcrEngine::ready(MockRecognizer::new([
            "Phở bò tái x2 90,000đ",
            "Trà đá 5.000",
            "Tổng cộng: 95,000",
        ]));
        let (app, db) = test_app(engine, dir.path()).await;
        let payload = format!("data:image/png;base64,{}", BASE64.encode(tiny_png()));

        let response = app
            .oneshot(post_json(
                "/api/receipts/parse",
                serde_json::json!({ "imageBase64": payload, "uploadedBy": "user-1" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["total"], 95000);
        assert_eq!(body["items"][0]["name"], "Phở bò tái");
        assert_eq!(body["items"][0]["quantity"], 2);
        assert_eq!(body["items"][1]["price"], 5000);
        assert_eq!(body["message"], PARSE_SUCCEEDED);
        assert_eq!(body["source"]["kind"], "extracted");

        let image_url = body["imageUrl"].as_str().unwrap();
        let stored = dir.path().join(image_url.trim_start_matches("/attachments/"));
        assert_eq!(std::fs::read(stored).unwrap(), tiny_png());

        let id = body["receiptId"].as_str().unwrap();
        let record = splitbill_storage::get_receipt_by_id(&db, id).await.unwrap().unwrap();
        assert_eq!(record.uploaded_by.as_deref(), Some("user-1"));
        assert_eq!(record.parsed.items().len(), 2);
    }

    #[tokio::test]
    async fn parse_without_engine_returns_synthetic_receipt() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _db) = test_app(OcrEngine::unavailable(), dir.path()).await;

        let response = app
            .oneshot(post_json(
                "/api/receipts/parse",
                serde_json::json!({ "imageBase64": BASE64.encode(tiny_png()) }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        let items = body["items"].as_array().unwrap();
        assert!((2..=4).contains(&items.len()));
        let sum: u64 = items
            .iter()
            .map(|i| i["price"].as_u64().unwrap() * i["quantity"].as_u64().unwrap())
            .sum();
        assert_eq!(body["total"].as_u64().unwrap(), sum);
        assert_eq!(body["source"]["kind"], "synthetic");
        assert_eq!(
            body["source"]["reason"],
            serde_json::to_value(FallbackReason::EngineUnavailable).unwrap()
        );
    }

    #[tokio::test]
    async fn parse_rejects_missing_image() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _db) = test_app(OcrEngine::unavailable(), dir.path()).await;

        let response = app
            .oneshot(post_json("/api/receipts/parse", serde_json::json!({ "imageBase64": "  " })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["detail"], MISSING_IMAGE);
    }

    #[tokio::test]
    async fn parse_rejects_invalid_base64() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _db) = test_app(OcrEngine::unavailable(), dir.path()).await;

        let response = app
            .oneshot(post_json(
                "/api/receipts/parse",
                serde_json::json!({ "imageBase64": "data:image/png;base64,@@@" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["detail"], INVALID_IMAGE);
    }

    #[tokio::test]
    async fn get_receipt_roundtrip_and_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _db) = test_app(
            OcrEngine::ready(MockRecognizer::new(["Bánh mì thịt 20.000"])),
            dir.path(),
        )
        .await;

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/receipts/parse",
                serde_json::json!({ "imageBase64": BASE64.encode(tiny_png()) }),
            ))
            .await
            .unwrap();
        let id = json_body(response).await["receiptId"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(Request::get(format!("/api/receipts/{id}")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["parsed"]["total"], 20000);

        let response = app
            .oneshot(Request::get("/api/receipts/unknown").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_receipts_by_uploader_applies_limit() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _db) = test_app(
            OcrEngine::ready(MockRecognizer::new(["Bánh mì thịt 20.000"])),
            dir.path(),
        )
        .await;

        for uploader in ["alice", "alice", "alice", "bob"] {
            let response = app
                .clone()
                .oneshot(post_json(
                    "/api/receipts/parse",
                    serde_json::json!({
                        "imageBase64": BASE64.encode(tiny_png()),
                        "uploadedBy": uploader,
                    }),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let list = |uri: &'static str| {
            let app = app.clone();
            async move {
                let response =
                    app.oneshot(Request::get(uri).body(Body::empty()).unwrap()).await.unwrap();
                assert_eq!(response.status(), StatusCode::OK);
                json_body(response).await.as_array().unwrap().clone()
            }
        };

        let alice = list("/api/receipts?uploadedBy=alice").await;
        assert_eq!(alice.len(), 3);
        assert!(alice.iter().all(|r| r["uploaded_by"] == "alice"));
        assert_eq!(list("/api/receipts?uploadedBy=alice&limit=2").await.len(), 2);
        assert_eq!(list("/api/receipts?uploadedBy=bob").await.len(), 1);
        assert!(list("/api/receipts?uploadedBy=carol").await.is_empty());
    }

    #[tokio::test]
    async fn list_receipts_requires_uploader() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _db) = test_app(OcrEngine::unavailable(), dir.path()).await;
        let response = app
            .oneshot(Request::get("/api/receipts").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn health_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _db) = test_app(OcrEngine::unavailable(), dir.path()).await;
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
