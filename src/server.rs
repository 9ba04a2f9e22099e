//! HTTP API server.
//!
//! Exposes document comparison, criteria management, report retrieval, and
//! session auth as a JSON API for browser clients.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/api/health` | Health check (returns version) |
//! | `POST` | `/api/auth/register` | Create an account |
//! | `POST` | `/api/auth/login` | Obtain access and refresh tokens |
//! | `POST` | `/api/auth/refresh` | Mint a new access token from a refresh token |
//! | `POST` | `/api/auth/logout` | Revoke the presented token |
//! | `GET`  | `/api/criteria/default` | The built-in criteria set |
//! | `POST` | `/api/criteria/normalize` | Normalize caller-supplied weights |
//! | `POST` | `/api/compare` | Rank uploaded documents and save a report |
//! | `GET`  | `/api/reports` | List recent reports |
//! | `GET`  | `/api/reports/{id}/data` | Full report payload |
//! | `GET`  | `/api/reports/{id}/pairwise` | Pairwise comparison records |
//! | `GET`  | `/api/reports/{id}/download` | Report CSVs as a zip |
//! | `POST` | `/api/reports/rename` | Rename a report |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "weights must not be negative" } }
//! ```
//!
//! Error codes: `bad_request` (400), `unauthorized` (401), `not_found` (404),
//! `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients during development.

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::auth::{self, TokenBlacklist};
use crate::compare::ComparisonEngine;
use crate::config::Config;
use crate::criteria::{self, CriteriaSet};
use crate::db;
use crate::extract;
use crate::migrate;
use crate::models::{ComparisonRecord, Criterion, ReportSummary};
use crate::ranking;
use crate::report;
use crate::store;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    pool: sqlx::SqlitePool,
    blacklist: Arc<TokenBlacklist>,
    /// HS256 signing key for session tokens.
    secret: Arc<String>,
}

/// Starts the HTTP API server.
///
/// Binds to the address configured in `[server].bind`, runs migrations, and
/// serves until the process is terminated. The token signing key comes from
/// the `RANKCENTRAL_JWT_SECRET` environment variable; if unset a random key
/// is generated, which invalidates all sessions on restart.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();

    let pool = db::connect(config).await?;
    migrate::run_migrations(&pool).await?;

    let secret = std::env::var("RANKCENTRAL_JWT_SECRET")
        .unwrap_or_else(|_| uuid::Uuid::new_v4().to_string());

    let state = AppState {
        config: Arc::new(config.clone()),
        pool,
        blacklist: Arc::new(TokenBlacklist::new()),
        secret: Arc::new(secret),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/health", get(handle_health))
        .route("/api/auth/register", post(handle_register))
        .route("/api/auth/login", post(handle_login))
        .route("/api/auth/refresh", post(handle_refresh))
        .route("/api/auth/logout", post(handle_logout))
        .route("/api/criteria/default", get(handle_default_criteria))
        .route("/api/criteria/normalize", post(handle_normalize))
        .route("/api/compare", post(handle_compare))
        .route("/api/reports", get(handle_list_reports))
        .route("/api/reports/{id}/data", get(handle_report_data))
        .route("/api/reports/{id}/pairwise", get(handle_report_pairwise))
        .route("/api/reports/{id}/download", get(handle_report_download))
        .route("/api/reports/rename", post(handle_rename))
        .layer(cors)
        .with_state(state);

    println!("API server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn unauthorized(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::UNAUTHORIZED,
        code: "unauthorized".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn internal(err: anyhow::Error) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: err.to_string(),
    }
}

// ============ Auth helpers ============

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Verify the bearer token if one is present. Requests without a token
/// proceed anonymously; requests with an invalid token are rejected.
fn authenticate_optional(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Option<auth::Claims>, AppError> {
    match bearer_token(headers) {
        None => Ok(None),
        Some(token) => auth::verify_token(&state.secret, token, &state.blacklist)
            .map(Some)
            .map_err(|e| unauthorized(e.to_string())),
    }
}

fn authenticate_required(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<auth::Claims, AppError> {
    authenticate_optional(state, headers)?
        .ok_or_else(|| unauthorized("missing bearer token"))
}

// ============ GET /api/health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    database: bool,
    uploads_dir: bool,
    api_key_configured: bool,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = sqlx::query("SELECT 1").execute(&state.pool).await.is_ok();
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database,
        uploads_dir: state.config.uploads.dir.is_dir(),
        api_key_configured: std::env::var("OPENAI_API_KEY").is_ok(),
    })
}

// ============ POST /api/auth/register ============

#[derive(Deserialize)]
struct RegisterRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
struct UserResponse {
    id: String,
    email: String,
    role: String,
}

async fn handle_register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(bad_request("a valid email address is required"));
    }
    if req.password.len() < 8 {
        return Err(bad_request("password must be at least 8 characters"));
    }

    if store::find_user_by_email(&state.pool, &email)
        .await
        .map_err(internal)?
        .is_some()
    {
        return Err(bad_request("an account with this email already exists"));
    }

    let user = store::create_user(&state.pool, &email, &auth::hash_password(&req.password))
        .await
        .map_err(internal)?;

    Ok(Json(UserResponse {
        id: user.id,
        email: user.email,
        role: user.role,
    }))
}

// ============ POST /api/auth/login ============

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    access_token: String,
    refresh_token: String,
    user: UserResponse,
}

async fn handle_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let email = req.email.trim().to_lowercase();
    let user = store::find_user_by_email(&state.pool, &email)
        .await
        .map_err(internal)?
        .filter(|u| auth::verify_password(&req.password, &u.password_hash))
        .ok_or_else(|| unauthorized("invalid email or password"))?;

    store::touch_last_login(&state.pool, &user.id)
        .await
        .map_err(internal)?;

    let access_token = auth::mint_token(
        &state.secret,
        &user.id,
        &user.email,
        auth::ACCESS_TOKEN,
        state.config.auth.access_ttl_secs,
    )
    .map_err(internal)?;
    let refresh_token = auth::mint_token(
        &state.secret,
        &user.id,
        &user.email,
        auth::REFRESH_TOKEN,
        state.config.auth.refresh_ttl_secs,
    )
    .map_err(internal)?;

    Ok(Json(LoginResponse {
        access_token,
        refresh_token,
        user: UserResponse {
            id: user.id,
            email: user.email,
            role: user.role,
        },
    }))
}

// ============ POST /api/auth/refresh ============

#[derive(Serialize)]
struct RefreshResponse {
    access_token: String,
}

async fn handle_refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<RefreshResponse>, AppError> {
    let claims = authenticate_required(&state, &headers)?;
    if claims.kind != auth::REFRESH_TOKEN {
        return Err(unauthorized("a refresh token is required"));
    }

    let access_token = auth::mint_token(
        &state.secret,
        &claims.sub,
        &claims.email,
        auth::ACCESS_TOKEN,
        state.config.auth.access_ttl_secs,
    )
    .map_err(internal)?;

    Ok(Json(RefreshResponse { access_token }))
}

// ============ POST /api/auth/logout ============

async fn handle_logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let claims = authenticate_required(&state, &headers)?;
    state.blacklist.revoke(&claims.jti);
    Ok(Json(serde_json::json!({ "revoked": true })))
}

// ============ GET /api/criteria/default ============

#[derive(Serialize)]
struct CriteriaResponse {
    criteria: Vec<Criterion>,
}

async fn handle_default_criteria() -> Json<CriteriaResponse> {
    Json(CriteriaResponse {
        criteria: criteria::default_criteria(),
    })
}

// ============ POST /api/criteria/normalize ============

#[derive(Deserialize)]
struct NormalizeRequest {
    criteria: Vec<Criterion>,
}

async fn handle_normalize(
    Json(req): Json<NormalizeRequest>,
) -> Result<Json<CriteriaResponse>, AppError> {
    criteria::validate_weights(&req.criteria).map_err(|e| bad_request(e.to_string()))?;
    Ok(Json(CriteriaResponse {
        criteria: criteria::normalize_weights(&req.criteria),
    }))
}

// ============ POST /api/compare ============

#[derive(Deserialize)]
struct CompareDocument {
    name: String,
    /// Plain text, or a base64-encoded PDF (optionally a data URL).
    content: String,
}

#[derive(Deserialize)]
struct CompareRequest {
    /// Inline documents. When omitted or empty, PDFs are read from the
    /// configured uploads folder instead.
    #[serde(default)]
    documents: Vec<CompareDocument>,
    #[serde(default)]
    criteria: Option<Vec<Criterion>>,
    #[serde(default)]
    custom_prompt: Option<String>,
    #[serde(default)]
    report_name: Option<String>,
}

#[derive(Serialize)]
struct CompareResponse {
    report_id: String,
    report_name: String,
    ranking: Vec<String>,
    winner: Option<String>,
    comparisons: Vec<ComparisonRecord>,
}

async fn handle_compare(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CompareRequest>,
) -> Result<Json<CompareResponse>, AppError> {
    let claims = authenticate_optional(&state, &headers)?;

    // With no inline documents, fall back to the configured uploads folder.
    let documents = if req.documents.is_empty() {
        extract::load_pdf_folder(&state.config.uploads.dir)
            .map_err(|e| bad_request(e.to_string()))?
    } else {
        let mut documents = BTreeMap::new();
        for doc in &req.documents {
            if doc.name.trim().is_empty() {
                return Err(bad_request("every document needs a name"));
            }
            let text = if extract::looks_like_base64_pdf(&doc.content) {
                extract::extract_base64_pdf(&doc.content)
                    .map_err(|e| bad_request(format!("{}: {}", doc.name, e)))?
            } else {
                doc.content.clone()
            };
            if text.trim().is_empty() {
                return Err(bad_request(format!("{}: document has no text", doc.name)));
            }
            documents.insert(doc.name.clone(), text);
        }
        if documents.len() != req.documents.len() {
            return Err(bad_request("document names must be unique"));
        }
        documents
    };

    if documents.len() < 2 {
        return Err(bad_request("at least two documents are required"));
    }

    let (criteria_used, evaluation_method) = match &req.custom_prompt {
        Some(prompt) if !prompt.trim().is_empty() => (
            vec![criteria::custom_prompt_criterion(prompt)],
            "prompt".to_string(),
        ),
        _ => {
            let set = match &req.criteria {
                Some(list) if !list.is_empty() => {
                    criteria::validate_weights(list).map_err(|e| bad_request(e.to_string()))?;
                    CriteriaSet::new(list.clone())
                }
                _ => CriteriaSet::with_defaults(),
            };
            (set.criteria().to_vec(), "criteria".to_string())
        }
    };

    let mut engine = ComparisonEngine::new(
        documents,
        criteria_used.clone(),
        state.config.comparison.clone(),
    );
    let names = engine.document_names();
    let ranking = ranking::rank_documents(&mut engine, names.clone())
        .await
        .map_err(internal)?;
    let records = engine.into_records();

    let report_name = req
        .report_name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| report::default_report_name(chrono::Utc::now()));

    let csv_files = report::report_files(&names, &records);
    let report_id = store::save_report(
        &state.pool,
        store::NewReport {
            report_name: report_name.clone(),
            user_id: claims.map(|c| c.sub),
            documents: names,
            records: records.clone(),
            ranking: ranking.clone(),
            criteria: criteria_used,
            evaluation_method,
            custom_prompt: req.custom_prompt,
            csv_files,
        },
        state.config.reports.history_limit,
    )
    .await
    .map_err(internal)?;

    Ok(Json(CompareResponse {
        report_id,
        report_name,
        winner: ranking.first().cloned(),
        ranking,
        comparisons: records,
    }))
}

// ============ GET /api/reports ============

#[derive(Serialize)]
struct ReportListResponse {
    reports: Vec<ReportSummary>,
}

async fn handle_list_reports(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ReportListResponse>, AppError> {
    let claims = authenticate_optional(&state, &headers)?;
    let reports = store::list_reports(
        &state.pool,
        claims.as_ref().map(|c| c.sub.as_str()),
        state.config.reports.history_limit,
    )
    .await
    .map_err(internal)?;
    Ok(Json(ReportListResponse { reports }))
}

// ============ GET /api/reports/{id}/data ============

#[derive(Serialize)]
struct ReportDataResponse {
    id: String,
    created_at: String,
    report_name: String,
    documents: Vec<String>,
    ranking: Vec<String>,
    criteria: Vec<Criterion>,
    evaluation_method: String,
    custom_prompt: Option<String>,
    win_counts: BTreeMap<String, usize>,
}

async fn fetch_report(state: &AppState, id: &str) -> Result<store::StoredReport, AppError> {
    store::get_report(&state.pool, id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found(format!("no report with id: {}", id)))
}

async fn handle_report_data(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ReportDataResponse>, AppError> {
    let stored = fetch_report(&state, &id).await?;
    let win_counts = report::win_counts(&stored.documents, &stored.records);
    Ok(Json(ReportDataResponse {
        id: stored.id,
        created_at: stored.created_at,
        report_name: stored.report_name,
        documents: stored.documents,
        ranking: stored.ranking,
        criteria: stored.criteria,
        evaluation_method: stored.evaluation_method,
        custom_prompt: stored.custom_prompt,
        win_counts,
    }))
}

// ============ GET /api/reports/{id}/pairwise ============

#[derive(Serialize)]
struct PairwiseResponse {
    comparisons: Vec<ComparisonRecord>,
}

async fn handle_report_pairwise(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PairwiseResponse>, AppError> {
    let stored = fetch_report(&state, &id).await?;
    Ok(Json(PairwiseResponse {
        comparisons: stored.records,
    }))
}

// ============ GET /api/reports/{id}/download ============

async fn handle_report_download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let stored = fetch_report(&state, &id).await?;
    let bytes = report::zip_report(&stored.csv_files).map_err(internal)?;

    let filename = format!("{}.zip", stored.report_name.replace(['/', '\\'], "_"));
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response())
}

// ============ POST /api/reports/rename ============

#[derive(Deserialize)]
struct RenameRequest {
    report_id: String,
    new_name: String,
}

async fn handle_rename(
    State(state): State<AppState>,
    Json(req): Json<RenameRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let new_name = req.new_name.trim();
    if new_name.is_empty() {
        return Err(bad_request("new_name must not be empty"));
    }
    store::rename_report(&state.pool, &req.report_id, new_name)
        .await
        .map_err(|e| {
            if e.to_string().contains("not found") {
                not_found(e.to_string())
            } else {
                internal(e)
            }
        })?;
    Ok(Json(serde_json::json!({ "renamed": true })))
}
