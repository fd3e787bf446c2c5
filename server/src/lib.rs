use anyhow::Result;
use axum::{extract::{Query, State}, http::{HeaderMap, StatusCode}, routing::{get, post}, Json, Router};
use locutions::tokenizer::{Algorithm, Analyzer};
use locutions::{Store, StoreError};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Words per locution when analyzing text
    pub ngram: usize,
    pub stem: bool,
    /// Start an empty store when the directory has none
    pub create: bool,
    /// Required in `X-ADMIN-TOKEN` by the admin endpoints; they are closed when unset
    pub admin_token: Option<String>,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self { ngram: 2, stem: false, create: false, admin_token: None }
    }
}

#[derive(Deserialize)]
pub struct KeyParams {
    pub k: String,
}

#[derive(Deserialize)]
pub struct ScoreParams {
    pub q: String,
}

#[derive(Serialize)]
pub struct KeyStats {
    pub key: String,
    pub known: bool,
    pub tf: u32,
    pub df: u32,
    pub tf_idf: f64,
}

#[derive(Serialize)]
pub struct ScoreResponse {
    pub query: String,
    pub took_s: f64,
    pub documents: u32,
    pub locutions: Vec<KeyStats>,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub keys: usize,
    pub documents: u32,
    pub pending_documents: u32,
    pub pending_keys: usize,
}

#[derive(Deserialize)]
pub struct BatchDoc {
    #[serde(alias = "text", alias = "abstract")]
    pub body: String,
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RwLock<Store>>,
    pub analyzer: Arc<Analyzer>,
    pub admin_token: Option<String>,
}

pub fn build_app(store_dir: String, options: AppOptions) -> Result<Router> {
    let store = Store::open(&store_dir, options.create)?;
    tracing::info!(store = %store_dir, keys = store.len(), documents = store.total(), "store opened");
    let mut analyzer = Analyzer::new(options.ngram);
    if options.stem {
        analyzer = analyzer.with_stemming(Algorithm::English);
    }
    let app_state = AppState {
        store: Arc::new(RwLock::new(store)),
        analyzer: Arc::new(analyzer),
        admin_token: options.admin_token,
    };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/stats", get(stats_handler))
        .route("/key", get(key_handler))
        .route("/score", get(score_handler))
        .route("/index/batch", post(index_batch))
        .route("/index/commit", post(index_commit))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());
    Ok(app)
}

fn key_stats(store: &Store, key: &str) -> KeyStats {
    let counts = store.get(key);
    KeyStats {
        key: key.to_string(),
        known: store.contains(key),
        tf: counts.tf,
        df: counts.df,
        tf_idf: store.tf_idf(key),
    }
}

pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let store = state.store.read();
    Json(StatsResponse {
        keys: store.len(),
        documents: store.total(),
        pending_documents: store.hot().total(),
        pending_keys: store.hot().new_keys().len(),
    })
}

pub async fn key_handler(State(state): State<AppState>, Query(params): Query<KeyParams>) -> Json<KeyStats> {
    let store = state.store.read();
    Json(key_stats(&store, &params.k))
}

/// Score every locution of `q`; unknown locutions come back with `known: false`.
pub async fn score_handler(State(state): State<AppState>, Query(params): Query<ScoreParams>) -> Json<ScoreResponse> {
    let start = std::time::Instant::now();
    let locs = state.analyzer.locutions(&params.q);
    let store = state.store.read();
    let locutions = locs.iter().map(|l| key_stats(&store, l)).collect();
    Json(ScoreResponse {
        query: params.q,
        took_s: start.elapsed().as_secs_f64(),
        documents: store.total(),
        locutions,
    })
}

fn store_error(err: StoreError) -> (StatusCode, String) {
    let status = match &err {
        StoreError::InvalidKey(_) => StatusCode::BAD_REQUEST,
        e if e.is_not_found() => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    tracing::error!(error = %err, "store operation failed");
    (status, err.to_string())
}

// --- Admin endpoints ---
async fn index_batch(State(state): State<AppState>, headers: HeaderMap, Json(docs): Json<Vec<BatchDoc>>) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    authorize(&state, &headers)?;
    let counted: Vec<_> = docs.iter().map(|d| state.analyzer.count(&d.body)).collect();
    let mut store = state.store.write();
    for counts in counted {
        store.add_counter(counts).map_err(store_error)?;
    }
    Ok(Json(serde_json::json!({
        "accepted": docs.len(),
        "pending_documents": store.hot().total(),
    })))
}

async fn index_commit(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    authorize(&state, &headers)?;
    // flush rewrites every file and rebuilds the dictionary, keep it off the async workers
    let store = state.store.clone();
    let (keys, documents) = tokio::task::spawn_blocking(move || -> Result<(usize, u32), StoreError> {
        let mut store = store.write();
        store.write()?;
        Ok((store.len(), store.total()))
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("flush task failed: {e}")))?
    .map_err(store_error)?;
    Ok(Json(serde_json::json!({ "keys": keys, "documents": documents })))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), (StatusCode, String)> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}
