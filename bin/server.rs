// Diesel Control - API Server
// REST API with Axum over the same SQLite store as the CLI

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{Local, NaiveDate};
use diesel_control::{
    annotate, describe, export_file_name, indicators, latest_report, load_sorted, malformed,
    record_entry, Config, DailyEntry, EntryInput, EntryStatus, Error, ExportKind,
    Indicators, Scope, SqliteStore, StoreError, DEFAULT_WINDOW,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
struct AppState {
    store: Arc<Mutex<SqliteStore>>,
    threshold_pct: f64,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Response {
        (
            StatusCode::OK,
            Json(Self {
                success: true,
                data: Some(data),
                error: None,
            }),
        )
            .into_response()
    }
}

fn error_response(err: Error) -> Response {
    let status = if err.is_invalid_input() {
        StatusCode::BAD_REQUEST
    } else {
        error!("request failed: {}", err);
        StatusCode::INTERNAL_SERVER_ERROR
    };

    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(err.to_string()),
        }),
    )
        .into_response()
}

#[derive(Deserialize)]
struct ScopeQuery {
    #[serde(default = "default_scope")]
    scope: Scope,
}

fn default_scope() -> Scope {
    Scope::Today
}

/// Entry plus its out-of-limit status
#[derive(Serialize)]
struct EntryResponse {
    #[serde(flatten)]
    entry: DailyEntry,
    status: EntryStatus,
    status_label: &'static str,
}

#[derive(Serialize)]
struct EntriesResponse {
    scope: Scope,
    threshold_pct: f64,
    entries: Vec<EntryResponse>,
    malformed: Vec<DailyEntry>,
}

#[derive(Serialize)]
struct IndicatorsResponse {
    scope: Scope,
    window: usize,
    #[serde(flatten)]
    indicators: Indicators,
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn load(state: &AppState) -> Result<Vec<DailyEntry>, Error> {
    let store = state.store.lock().map_err(|_| Error::Store(StoreError::LockPoisoned))?;
    load_sorted(&*store)
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    ApiResponse::ok("OK")
}

/// GET /api/entries?scope= - Entries with status
async fn list_entries(State(state): State<AppState>, Query(q): Query<ScopeQuery>) -> Response {
    let all = match load(&state) {
        Ok(all) => all,
        Err(e) => return error_response(e),
    };

    let entries = annotate(&q.scope.select(&all, today()), state.threshold_pct)
        .into_iter()
        .map(|(entry, status)| EntryResponse {
            entry,
            status,
            status_label: status.label(),
        })
        .collect();

    ApiResponse::ok(EntriesResponse {
        scope: q.scope,
        threshold_pct: state.threshold_pct,
        entries,
        malformed: malformed(&all).into_iter().cloned().collect(),
    })
}

/// POST /api/entries - Record a new entry
async fn create_entry(State(state): State<AppState>, Json(input): Json<EntryInput>) -> Response {
    let result = {
        let store = match state.store.lock() {
            Ok(store) => store,
            Err(_) => return error_response(Error::Store(StoreError::LockPoisoned)),
        };
        record_entry(&*store, &input)
    };

    match result {
        Ok(entry) => {
            let status = EntryStatus::for_entry(&entry, state.threshold_pct);
            let body = EntryResponse {
                entry,
                status,
                status_label: status.label(),
            };
            (
                StatusCode::CREATED,
                Json(ApiResponse {
                    success: true,
                    data: Some(body),
                    error: None,
                }),
            )
                .into_response()
        }
        Err(e) => error_response(e),
    }
}

/// GET /api/indicators?scope=
async fn get_indicators(State(state): State<AppState>, Query(q): Query<ScopeQuery>) -> Response {
    match load(&state) {
        Ok(all) => ApiResponse::ok(IndicatorsResponse {
            scope: q.scope,
            window: DEFAULT_WINDOW,
            indicators: indicators(&q.scope.select(&all, today()), DEFAULT_WINDOW),
        }),
        Err(e) => error_response(e),
    }
}

/// GET /api/report - Standard text for today's latest entry
async fn get_report(State(state): State<AppState>) -> Response {
    match load(&state) {
        Ok(all) => ApiResponse::ok(latest_report(&Scope::Today.select(&all, today()))),
        Err(e) => error_response(e),
    }
}

/// GET /api/summary?scope= - Descriptive statistics per column
async fn get_summary(State(state): State<AppState>, Query(q): Query<ScopeQuery>) -> Response {
    match load(&state) {
        Ok(all) => ApiResponse::ok(describe(&q.scope.select(&all, today()))),
        Err(e) => error_response(e),
    }
}

async fn export_history(State(state): State<AppState>, Query(q): Query<ScopeQuery>) -> Response {
    export_csv(&state, ExportKind::History, q.scope)
}

async fn export_matrix(State(state): State<AppState>, Query(q): Query<ScopeQuery>) -> Response {
    export_csv(&state, ExportKind::Matrix, q.scope)
}

/// GET /api/export/{history,matrix}.csv?scope=
fn export_csv(state: &AppState, kind: ExportKind, scope: Scope) -> Response {
    let today = today();
    let entries = match load(state) {
        Ok(all) => scope.select(&all, today),
        Err(e) => return error_response(e),
    };

    let mut buf = Vec::new();
    if let Err(e) = kind.write(&mut buf, &entries) {
        return error_response(e);
    }

    let disposition = format!("attachment; filename=\"{}\"", export_file_name(kind, today));
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        buf,
    )
        .into_response()
}

fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/entries", get(list_entries).post(create_entry))
        .route("/indicators", get(get_indicators))
        .route("/report", get(get_report))
        .route("/summary", get(get_summary))
        .route("/export/history.csv", get(export_history))
        .route("/export/matrix.csv", get(export_matrix))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "diesel_control=info,diesel_server=info,tower_http=info".into()),
        )
        .init();

    let config = Config::load()?;
    let store = SqliteStore::open(&config.database_path)?;

    let state = AppState {
        store: Arc::new(Mutex::new(store)),
        threshold_pct: config.alert_threshold_pct,
    };

    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        addr = %addr,
        threshold_pct = config.alert_threshold_pct,
        "diesel control API listening"
    );

    axum::serve(listener, router(state)).await?;

    Ok(())
}
