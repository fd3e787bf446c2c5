use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use locutions::Store;
use serde_json::Value;
use server::{build_app, AppOptions};
use tempfile::tempdir;
use tower::ServiceExt;

const TOKEN: &str = "s3cret";

fn build_tiny_store(dir: &std::path::Path) {
    let mut store = Store::open(dir, true).unwrap();
    store.add_document(["je mange", "mange des", "des carottes"]).unwrap();
    store.add_document(["des petits", "petits pois", "des carottes"]).unwrap();
    store.write().unwrap();
}

fn app_for(dir: &std::path::Path) -> Router {
    let options = AppOptions { admin_token: Some(TOKEN.into()), ..Default::default() };
    build_app(dir.to_string_lossy().to_string(), options).unwrap()
}

async fn call(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, token: Option<&str>, body: &str) -> Request<Body> {
    let mut req = Request::post(uri).header("content-type", "application/json");
    if let Some(t) = token {
        req = req.header("X-ADMIN-TOKEN", t);
    }
    req.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn key_lookup_reports_counts() {
    let dir = tempdir().unwrap();
    build_tiny_store(dir.path());
    let app = app_for(dir.path());

    let (status, json) = call(app.clone(), get("/key?k=des%20carottes")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["tf"], 2);
    assert_eq!(json["df"], 2);
    assert_eq!(json["known"], true);
    assert_eq!(json["tf_idf"].as_f64().unwrap(), 0.0);

    let (_, json) = call(app, get("/key?k=nope")).await;
    assert_eq!(json["known"], false);
    assert_eq!(json["tf"], 0);
}

#[tokio::test]
async fn score_splits_query_into_locutions() {
    let dir = tempdir().unwrap();
    build_tiny_store(dir.path());
    let app = app_for(dir.path());

    let (status, json) = call(app, get("/score?q=Je%20mange%20des%20pommes")).await;
    assert_eq!(status, StatusCode::OK);
    let locs = json["locutions"].as_array().unwrap();
    assert_eq!(locs.len(), 3);
    assert_eq!(locs[0]["key"], "je mange");
    assert_eq!(locs[0]["known"], true);
    assert!((locs[0]["tf_idf"].as_f64().unwrap() - 2f64.ln()).abs() < 1e-9);
    assert_eq!(locs[2]["key"], "des pommes");
    assert_eq!(locs[2]["known"], false);
    assert_eq!(json["documents"], 2);
}

#[tokio::test]
async fn admin_endpoints_require_token() {
    let dir = tempdir().unwrap();
    build_tiny_store(dir.path());
    let app = app_for(dir.path());

    let (status, _) = call(app.clone(), post("/index/commit", None, "")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = call(app, post("/index/batch", Some("wrong"), "[]")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn batch_then_commit_persists() {
    let dir = tempdir().unwrap();
    build_tiny_store(dir.path());
    let app = app_for(dir.path());

    let docs = r#"[{"body": "des petits pois"}, {"text": "Des petits gâteaux"}]"#;
    let (status, json) = call(app.clone(), post("/index/batch", Some(TOKEN), docs)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["accepted"], 2);
    assert_eq!(json["pending_documents"], 2);

    let (_, stats) = call(app.clone(), get("/stats")).await;
    assert_eq!(stats["documents"], 4);
    assert_eq!(stats["pending_keys"], 1);

    let (status, json) = call(app.clone(), post("/index/commit", Some(TOKEN), "")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["documents"], 4);
    assert_eq!(json["keys"], 6);

    let (_, stats) = call(app, get("/stats")).await;
    assert_eq!(stats["pending_documents"], 0);
    assert_eq!(stats["pending_keys"], 0);
    assert_eq!(stats["documents"], 4);

    let reopened = Store::open(dir.path(), false).unwrap();
    assert_eq!(reopened.get("des petits").tf, 3);
    assert_eq!(reopened.get("des petits").df, 3);
    assert!(reopened.contains("petits gâteaux"));
    assert_eq!(reopened.total(), 4);
}

#[tokio::test]
async fn missing_store_fails_to_build() {
    let dir = tempdir().unwrap();
    let err = build_app(dir.path().join("absent").to_string_lossy().to_string(), AppOptions::default());
    assert!(err.is_err());
    let created = AppOptions { create: true, ..Default::default() };
    assert!(build_app(dir.path().join("absent").to_string_lossy().to_string(), created).is_ok());
}
