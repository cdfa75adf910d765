//! Liveness check, mounted at `<api prefix>/ping`.

use axum::{routing::get, Json};
use serde_json::{json, Value};

use crate::routing::Routes;

pub fn router() -> Routes {
    Routes::new().route("/ping", get(ping))
}

async fn ping() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
