//! The HTTP API of the dashboard.
//!
//! Every request loads the spreadsheets again, on the blocking pool, and
//! computes its answer from scratch. Nothing is shared between requests
//! except the settings.

use std::any::Any;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{error, info, warn};
use serde::Serialize;
use serde_json::json;
use serde_json::Value as JSValue;
use snafu::ResultExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};

use retro_trends::*;

use crate::retro::config_reader::Settings;
use crate::retro::io_common::{is_spreadsheet_upload, simplify_file_name, store_upload};
use crate::retro::io_csv::trends_to_csv;
use crate::retro::io_xlsx::{load_dataset, LoadedData};
use crate::retro::json_output::*;
use crate::retro::slides::{export_all, export_single, ExportRequest};
use crate::retro::{RetroError, RetroResult, StartingServerSnafu};

const PPTX_MIME: &str = "application/vnd.openxmlformats-officedocument.presentationml.presentation";
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// API error response (always JSON).
#[derive(Debug, Clone, Serialize)]
struct ApiError {
    error: String,
    code: String,
}

impl ApiError {
    fn response(status: StatusCode, code: &str, msg: impl Into<String>) -> Response {
        (
            status,
            Json(ApiError {
                error: msg.into(),
                code: code.to_string(),
            }),
        )
            .into_response()
    }

    fn bad_request(msg: impl Into<String>) -> Response {
        ApiError::response(StatusCode::BAD_REQUEST, "bad_request", msg)
    }

    fn not_found(msg: impl Into<String>) -> Response {
        ApiError::response(StatusCode::NOT_FOUND, "not_found", msg)
    }

    fn internal(msg: impl Into<String>) -> Response {
        ApiError::response(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
    }

    fn from_retro(e: &RetroError) -> Response {
        match e {
            RetroError::NoSourceFiles { .. } | RetroError::NoUsableFiles { .. } => {
                ApiError::not_found(e.to_string())
            }
            RetroError::NoTrendData { .. } | RetroError::MissingField { .. } => {
                ApiError::bad_request(e.to_string())
            }
            _ => {
                error!("request failed: {:?}", e);
                ApiError::internal(e.to_string())
            }
        }
    }
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let details = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    error!("handler panicked: {}", details);
    ApiError::internal("Internal server error")
}

/// Runs a computation on the blocking pool and maps its error to a response.
async fn blocking<T, F>(f: F) -> Result<T, Response>
where
    F: FnOnce() -> RetroResult<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(Ok(x)) => Ok(x),
        Ok(Err(e)) => Err(ApiError::from_retro(&e)),
        Err(e) => {
            error!("blocking task failed: {}", e);
            Err(ApiError::internal("Internal server error"))
        }
    }
}

async fn load(settings: &Arc<Settings>) -> Result<LoadedData, Response> {
    let s = settings.clone();
    let loaded = blocking(move || load_dataset(&s)).await?;
    for f in loaded.failures.iter() {
        warn!("load: could not read {}: {}", f.file, f.error);
    }
    Ok(loaded)
}

fn attachment_name(question: &str) -> String {
    let base: String = question
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .take(60)
        .collect();
    format!("{}.pptx", base.trim_matches('_'))
}

fn deck_response(bytes: Vec<u8>, file_name: &str) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, PPTX_MIME.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        bytes,
    )
        .into_response()
}

pub fn router(settings: Settings) -> Router {
    let state = Arc::new(settings);
    Router::new()
        .route("/health", get(api_health))
        .route("/data", get(api_data))
        .route("/trends/{question}", get(api_trends))
        .route("/trends/{question}/csv", get(api_trends_csv))
        .route("/response-counts", get(api_response_counts))
        .route("/summary", get(api_summary))
        .route("/questions", get(api_questions))
        .route("/releases", get(api_releases))
        .route("/director-analysis/{question}", get(api_director_analysis))
        .route("/export-all-ppt", post(api_export_all))
        .route("/export-ppt", post(api_export_single))
        .route("/upload", post(api_upload))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(
            CorsLayer::new()
                .allow_origin(AnyOrigin)
                .allow_methods(AnyOrigin)
                .allow_headers(AnyOrigin),
        )
}

pub async fn serve(settings: Settings) -> RetroResult<()> {
    let address = format!("{}:{}", settings.host, settings.port);
    info!("serve: data directory: {:?}", settings.data_directory);
    let app = router(settings);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .context(StartingServerSnafu {
            address: address.clone(),
        })?;
    info!("Dashboard API listening on http://{}", address);
    axum::serve(listener, app)
        .await
        .context(StartingServerSnafu { address })?;
    Ok(())
}

/// GET /health
async fn api_health() -> Json<JSValue> {
    Json(json!({
        "status": "healthy",
        "message": "Retrospective dashboard API is running",
    }))
}

/// GET /data - Summary, questions and their grouping.
async fn api_data(State(settings): State<Arc<Settings>>) -> Result<Json<JSValue>, Response> {
    let loaded = load(&settings).await?;
    Ok(Json(data_json(&loaded, &settings)))
}

async fn trend_report(settings: &Arc<Settings>, question: &str) -> Result<TrendReport, Response> {
    let loaded = load(settings).await?;
    let report = aggregate_trends(
        &loaded.dataset,
        question,
        &settings.trend_resolver(),
        &settings.period_order,
    );
    if !report.has_data() {
        return Err(ApiError::not_found(format!(
            "No trend data available for question {:?}",
            question
        )));
    }
    Ok(report)
}

/// GET /trends/{question}
async fn api_trends(
    State(settings): State<Arc<Settings>>,
    Path(question): Path<String>,
) -> Result<Json<JSValue>, Response> {
    info!("api_trends: question: {:?}", question);
    let report = trend_report(&settings, &question).await?;
    Ok(Json(trends_json(&report)))
}

/// GET /trends/{question}/csv
async fn api_trends_csv(
    State(settings): State<Arc<Settings>>,
    Path(question): Path<String>,
) -> Result<Response, Response> {
    info!("api_trends_csv: question: {:?}", question);
    let report = trend_report(&settings, &question).await?;
    let data = trends_to_csv(&report).map_err(|e| ApiError::from_retro(&e))?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/csv; charset=utf-8")],
        data,
    )
        .into_response())
}

/// GET /response-counts
async fn api_response_counts(
    State(settings): State<Arc<Settings>>,
) -> Result<Json<JSValue>, Response> {
    let loaded = load(&settings).await?;
    Ok(Json(response_counts_json(
        &loaded.dataset,
        &settings.period_order,
    )))
}

/// GET /summary
async fn api_summary(State(settings): State<Arc<Settings>>) -> Result<Json<JSValue>, Response> {
    let loaded = load(&settings).await?;
    Ok(Json(summary_json(&loaded.dataset, &settings)))
}

/// GET /questions
async fn api_questions(State(settings): State<Arc<Settings>>) -> Result<Json<JSValue>, Response> {
    let loaded = load(&settings).await?;
    Ok(Json(questions_json(&loaded.dataset, &settings)))
}

/// GET /releases
async fn api_releases(State(settings): State<Arc<Settings>>) -> Result<Json<JSValue>, Response> {
    let loaded = load(&settings).await?;
    Ok(Json(releases_json(&loaded.dataset, &settings.period_order)))
}

/// GET /director-analysis/{question}
async fn api_director_analysis(
    State(settings): State<Arc<Settings>>,
    Path(question): Path<String>,
) -> Result<Json<DirectorAnalysisView>, Response> {
    info!("api_director_analysis: question: {:?}", question);
    let loaded = load(&settings).await?;
    let tables = cross_tabulate(
        &loaded.dataset,
        &question,
        &settings.director_column,
        settings.recent_periods,
        &ColumnResolver::for_cross_tab(),
        &settings.period_order,
    );
    Ok(Json(cross_tab_view(
        &question,
        &settings.director_column,
        &tables,
    )))
}

/// POST /export-all-ppt
async fn api_export_all(State(settings): State<Arc<Settings>>) -> Result<Response, Response> {
    let s = settings.clone();
    let bytes = blocking(move || {
        let loaded = load_dataset(&s)?;
        export_all(&loaded, &s)?.to_bytes()
    })
    .await?;
    Ok(deck_response(bytes, "Retrospective_Trends.pptx"))
}

/// POST /export-ppt
async fn api_export_single(
    State(settings): State<Arc<Settings>>,
    req: Result<Json<ExportRequest>, JsonRejection>,
) -> Result<Response, Response> {
    let Json(request) =
        req.map_err(|e| ApiError::bad_request(format!("Invalid request body: {}", e.body_text())))?;
    let file_name = attachment_name(request.question.as_deref().unwrap_or("question"));
    let order = settings.period_order.clone();
    let bytes = blocking(move || export_single(&request, &order)?.to_bytes()).await?;
    Ok(deck_response(bytes, &file_name))
}

/// POST /upload - Stores a spreadsheet in the upload directory.
async fn api_upload(
    State(settings): State<Arc<Settings>>,
    mut multipart: Multipart,
) -> Result<Json<JSValue>, Response> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e.body_text())))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        if name.is_empty() {
            return Err(ApiError::bad_request("No file selected"));
        }
        if !is_spreadsheet_upload(&name) {
            return Err(ApiError::bad_request(
                "Only .xlsx and .xls files are accepted",
            ));
        }
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid upload: {}", e.body_text())))?;
        let dir = settings.upload_directory.clone();
        let size = data.len();
        let stored = blocking(move || store_upload(&dir, &name, &data)).await?;
        info!("api_upload: stored {:?}", stored);
        return Ok(Json(json!({
            "message": "File uploaded successfully",
            "filename": simplify_file_name(&stored),
            "size": size,
        })));
    }
    Err(ApiError::bad_request("No file provided"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retro::test_utils::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn call(app: Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, JSValue) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let (status, body) = call(app, req).await;
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn team_app() -> (tempfile::TempDir, Router) {
        let dir = tempfile::tempdir().unwrap();
        write_team_fixtures(dir.path());
        let app = router(settings_for(dir.path()));
        (dir, app)
    }

    #[tokio::test]
    async fn health() {
        let (_dir, app) = team_app();
        let (status, js) = get_json(app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(js["status"], json!("healthy"));
    }

    #[tokio::test]
    async fn team_trends_end_to_end() {
        let (_dir, app) = team_app();
        let (status, js) = get_json(app, "/trends/Team").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(js["question"], json!("Team"));
        assert_eq!(js["trends"]["August"], json!({"A": 66.67, "B": 33.33}));
        assert_eq!(js["trends"]["September"], json!({"A": 50.0, "B": 50.0}));
        assert_eq!(js["responseCounts"], json!({"August": 3, "September": 2}));
    }

    #[tokio::test]
    async fn unknown_question_is_not_found() {
        let (_dir, app) = team_app();
        let (status, js) = get_json(app, "/trends/Favourite%20colour").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(js["error"]
            .as_str()
            .unwrap()
            .starts_with("No trend data available"));
        assert_eq!(js["code"], json!("not_found"));
    }

    #[tokio::test]
    async fn no_source_files_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(settings_for(dir.path()));
        let (status, js) = get_json(app.clone(), "/data").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(js["error"]
            .as_str()
            .unwrap()
            .starts_with("No retrospective files found"));
        let (status, _) = get_json(app, "/summary").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn overviews() {
        let (_dir, app) = team_app();
        let (_, js) = get_json(app.clone(), "/data").await;
        assert_eq!(js["summary"]["totalFiles"], json!(2));
        assert_eq!(js["questions"], json!(["Team", "Director Org", "Comments"]));
        let (_, js) = get_json(app.clone(), "/response-counts").await;
        assert_eq!(js["sorted"][0], json!({"period": "August", "count": 3}));
        let (_, js) = get_json(app.clone(), "/releases").await;
        assert_eq!(js[1]["period"], json!("September"));
        let (_, js) = get_json(app.clone(), "/questions").await;
        assert_eq!(js["categories"].as_array().unwrap().len(), 3);
        let (_, js) = get_json(app.clone(), "/summary").await;
        assert_eq!(js["responseRate"], json!(85));
        let (status, js) = get_json(app, "/director-analysis/Team").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(js["periods"][1]["period"], json!("September"));
        assert_eq!(js["periods"][1]["grandTotal"], json!(2));
    }

    #[tokio::test]
    async fn trends_csv() {
        let (_dir, app) = team_app();
        let req = Request::builder()
            .uri("/trends/Team/csv")
            .body(Body::empty())
            .unwrap();
        let (status, body) = call(app, req).await;
        assert_eq!(status, StatusCode::OK);
        let text = String::from_utf8(body).unwrap();
        assert!(text.starts_with("Period,Answer,Count,Percentage\nAugust,A,2,66.67\n"));
    }

    #[tokio::test]
    async fn export_all_returns_a_deck() {
        let (_dir, app) = team_app();
        let req = Request::builder()
            .method("POST")
            .uri("/export-all-ppt")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], PPTX_MIME);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        // A zip archive.
        assert_eq!(&body[..2], b"PK");
    }

    #[tokio::test]
    async fn export_single_validates_the_body() {
        let (_dir, app) = team_app();
        let post = |body: &str| {
            Request::builder()
                .method("POST")
                .uri("/export-ppt")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap()
        };
        let (status, _) = call(app.clone(), post("{\"trends\": {}}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = call(app.clone(), post("{\"question\": \"Team\"}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = call(app.clone(), post("not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, body) = call(
            app,
            post(r#"{"question": "Team", "trends": {"August": {"A": 66.67, "B": 33.33}}}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&body[..2], b"PK");
    }

    fn multipart_request(file_name: &str, data: &str) -> Request<Body> {
        let boundary = "XBOUNDARYX";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\nContent-Type: application/octet-stream\r\n\r\n{d}\r\n--{b}--\r\n",
            b = boundary,
            f = file_name,
            d = data
        );
        Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn upload() {
        let (dir, app) = team_app();
        let (status, body) = call(app.clone(), multipart_request("May Retrospective.xlsx", "xx")).await;
        assert_eq!(status, StatusCode::OK);
        let js: JSValue = serde_json::from_slice(&body).unwrap();
        assert_eq!(js["size"], json!(2));
        let stored = dir
            .path()
            .join("uploads")
            .join(js["filename"].as_str().unwrap());
        assert!(stored.exists());
        let (status, _) = call(app, multipart_request("notes.txt", "xx")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
