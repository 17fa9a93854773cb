use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, required_str};
use crate::ipc::types::{AppState, Request};
use crate::snapshot;
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

fn handle_snapshot_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let path = match required_str(req, "path") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e,
    };
    let snap = match snapshot::read_snapshot(&path) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "snapshot_read_failed", format!("{e:#}"), None),
    };
    match snapshot::import_snapshot(conn, &snap) {
        Ok(summary) => {
            info!(path = %path.to_string_lossy(), ?summary, "snapshot imported");
            ok(&req.id, json!({ "imported": summary }))
        }
        Err(e) => err(&req.id, "snapshot_import_failed", format!("{e:#}"), None),
    }
}

fn handle_cohorts_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut stmt = match conn.prepare(
        "SELECT c.id, c.name, c.idnumber,
                (SELECT COUNT(*) FROM cohort_members cm
                   JOIN users u ON u.id = cm.user_id
                  WHERE cm.cohort_id = c.id AND u.deleted = 0 AND u.suspended = 0),
                (SELECT COUNT(DISTINCT e.course_id) FROM enrol e
                  WHERE e.enrol = 'cohort' AND e.cohort_id = c.id)
         FROM cohorts c
         ORDER BY c.name, c.id",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([], |r| {
            Ok(json!({
                "id": r.get::<_, i64>(0)?,
                "name": r.get::<_, String>(1)?,
                "idnumber": r.get::<_, Option<String>>(2)?,
                "memberCount": r.get::<_, i64>(3)?,
                "courseCount": r.get::<_, i64>(4)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(cohorts) => ok(&req.id, json!({ "cohorts": cohorts })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "snapshot.import" => Some(handle_snapshot_import(state, req)),
        "cohorts.list" => Some(handle_cohorts_list(state, req)),
        _ => None,
    }
}
