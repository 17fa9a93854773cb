use crate::config;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::db_conn;
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};

#[derive(Clone, Copy)]
enum SetupSection {
    Report,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "report" => Some(Self::Report),
            _ => None,
        }
    }
}

fn section_param(req: &Request) -> Result<SetupSection, Value> {
    let raw = req
        .params
        .get("section")
        .and_then(|v| v.as_str())
        .ok_or_else(|| err(&req.id, "bad_params", "missing section", None))?;
    SetupSection::parse(raw).ok_or_else(|| {
        err(
            &req.id,
            "bad_params",
            format!("unknown setup section: {}", raw),
            None,
        )
    })
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let section = match section_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match section {
        SetupSection::Report => match config::stored_report_json(conn) {
            Ok(v) => ok(&req.id, json!({ "section": "report", "value": v })),
            Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
        },
    }
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let section = match section_param(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };
    match section {
        SetupSection::Report => {
            let mut current = match config::stored_report_json(conn) {
                Ok(v) => v,
                Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
            };
            if let Err(message) = config::merge_report_patch(&mut current, patch) {
                return err(&req.id, "bad_params", message, None);
            }
            match config::save_report_patch(conn, patch) {
                Ok(v) => ok(&req.id, json!({ "section": "report", "value": v })),
                Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
            }
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
