use crate::config::{self, ReportConfig, Viewer};
use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::Value;

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn required_str(req: &Request, key: &str) -> Result<String, Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn required_i64(req: &Request, key: &str) -> Result<i64, Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn optional_i64(req: &Request, key: &str) -> Result<Option<i64>, Value> {
    match req.params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v.as_i64().map(Some).ok_or_else(|| {
            err(&req.id, "bad_params", format!("{} must be integer", key), None)
        }),
    }
}

/// Stored report config with `params.config` merged on top and the
/// request's viewer and clock applied.
pub fn request_config(conn: &Connection, req: &Request) -> Result<ReportConfig, Value> {
    let patch = match req.params.get("config") {
        None | Some(Value::Null) => None,
        Some(Value::Object(m)) => Some(m),
        Some(_) => return Err(err(&req.id, "bad_params", "config must be an object", None)),
    };
    let mut cfg = config::effective_report_config(conn, patch)
        .map_err(|e| err(&req.id, "bad_params", e, None))?;

    cfg.viewer = match req.params.get("viewer") {
        None | Some(Value::Null) => Viewer::default(),
        Some(v) => serde_json::from_value(v.clone())
            .map_err(|e| err(&req.id, "bad_params", format!("viewer: {}", e), None))?,
    };
    cfg.now = optional_i64(req, "now")?;
    Ok(cfg)
}
