use crate::grader::{self, CourseGradesRequest};
use crate::ipc::error::{err, ok, report_err};
use crate::ipc::helpers::{db_conn, request_config, required_i64};
use crate::ipc::types::{AppState, Request};
use crate::render;
use crate::report::{self, Report};
use crate::store::SqliteHost;
use serde_json::{json, Value};

fn build_report(state: &AppState, req: &Request) -> Result<Report, Value> {
    let conn = db_conn(state, req)?;
    let cohort_id = required_i64(req, "cohortId")?;
    let cfg = request_config(conn, req)?;
    let host = SqliteHost::new(conn);
    report::generate_report(&host, cohort_id, &cfg).map_err(|e| report_err(&req.id, &e))
}

fn handle_multi_course_model(state: &mut AppState, req: &Request) -> Value {
    let report = match build_report(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match serde_json::to_value(&report) {
        Ok(v) => ok(&req.id, v),
        Err(e) => err(&req.id, "serialize_failed", e.to_string(), None),
    }
}

fn handle_multi_course_table(state: &mut AppState, req: &Request) -> Value {
    let report = match build_report(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let table = render::render_table(&report.matrix);
    ok(
        &req.id,
        json!({
            "renderId": report.render_id,
            "cohort": report.cohort,
            "warnings": report.warnings,
            "fingerprint": report.fingerprint,
            "width": report.matrix.width,
            "table": table,
        }),
    )
}

fn handle_multi_course_text(state: &mut AppState, req: &Request) -> Value {
    let report = match build_report(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    ok(
        &req.id,
        json!({
            "renderId": report.render_id,
            "warnings": report.warnings,
            "text": render::render_text(&report.matrix),
        }),
    )
}

fn handle_course_grades_model(state: &mut AppState, req: &Request) -> Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(e) = required_i64(req, "courseId") {
        return e;
    }
    let request: CourseGradesRequest = match serde_json::from_value(req.params.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
    };
    let cfg = match request_config(conn, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let host = SqliteHost::new(conn);
    match grader::course_grades_model(&host, &request, &cfg) {
        Ok(model) => match serde_json::to_value(&model) {
            Ok(v) => ok(&req.id, v),
            Err(e) => err(&req.id, "serialize_failed", e.to_string(), None),
        },
        Err(e) => report_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "reports.multiCourseModel" => Some(handle_multi_course_model(state, req)),
        "reports.multiCourseTable" => Some(handle_multi_course_table(state, req)),
        "reports.multiCourseText" => Some(handle_multi_course_text(state, req)),
        "reports.courseGradesModel" => Some(handle_course_grades_model(state, req)),
        _ => None,
    }
}
