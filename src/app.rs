#![cfg(not(tarpaulin_include))]

use axum::{
    Json, Router,
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::config::Config;
use crate::graph::{self, GraphType};
use crate::loader;
use crate::login::{self, AccountStore};
use crate::store::DatasetStore;
use crate::summary;

/// Shared application state: the dataset slot, the account database, and
/// the runtime configuration. Constructed once at startup and handed to
/// every handler.
pub struct AppState {
    pub datasets: DatasetStore,
    pub accounts: AccountStore,
    pub config: Config,
}

#[derive(Deserialize)]
struct ChartRequest {
    metric: String,
    #[serde(rename = "type")]
    graph_type: String,
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Data pipeline
        .route("/api/upload", post(upload_file))
        .route("/api/summary", get(get_summary))
        .route("/api/chart", post(get_chart))
        // Accounts & credits
        .route("/api/me", get(login::handle_me))
        .route("/api/use-credit", post(login::handle_use_credit))
        .route("/signup", post(login::handle_signup))
        .route("/login", post(login::handle_login))
        .route("/logout", post(login::handle_logout))
        .route("/auth/google", post(login::handle_google_auth))
        // The dashboard frontend is served separately; let it talk to us
        // from anywhere.
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the web application.
pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let accounts = AccountStore::open(&config.database_dir)?;
    let state = Arc::new(AppState {
        datasets: DatasetStore::new(),
        accounts,
        config: config.clone(),
    });

    let app = router(state);

    let listener = TcpListener::bind(&config.bind_addr).await?;
    log::info!("Listening on http://{}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Handle a spreadsheet upload.
///
/// Reads the multipart `file` field, ingests it, and echoes a receipt.
/// Failures report 400 and leave any previously loaded dataset in place.
async fn upload_file(State(state): State<Arc<AppState>>, mut multipart: Multipart) -> Response {
    let mut filename = String::new();
    let mut data = Vec::new();

    while let Some(field) = multipart.next_field().await.unwrap_or(None) {
        if field.name() == Some("file") {
            filename = field.file_name().unwrap_or("upload").to_string();
            data = field.bytes().await.unwrap_or_default().to_vec();
        }
    }

    if data.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"status": "error", "message": "No file received"})),
        )
            .into_response();
    }

    match loader::ingest(&state.datasets, &filename, &data) {
        Ok(receipt) => Json(json!({
            "status": "success",
            "filename": receipt.filename,
            "size": receipt.size,
            "message": "File uploaded and dataset loaded",
        }))
        .into_response(),
        Err(e) => {
            log::warn!("upload of '{}' rejected: {}", filename, e);
            (
                StatusCode::BAD_REQUEST,
                Json(json!({"status": "error", "message": e.to_string()})),
            )
                .into_response()
        }
    }
}

/// Serve aggregate statistics and column classification for the current
/// dataset.
async fn get_summary(State(state): State<Arc<AppState>>) -> Response {
    match summary::summarize(&state.datasets) {
        Ok(report) => Json(report).into_response(),
        Err(e) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

/// Serve a label/value series for one requested column.
async fn get_chart(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChartRequest>,
) -> Response {
    let series = GraphType::parse(&request.graph_type)
        .and_then(|graph_type| graph::build_series(&state.datasets, &request.metric, graph_type));

    match series {
        Ok(series) => Json(json!({
            "status": "success",
            "labels": series.labels,
            "values": series.values,
        }))
        .into_response(),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(json!({"detail": e.to_string()})),
        )
            .into_response(),
    }
}
