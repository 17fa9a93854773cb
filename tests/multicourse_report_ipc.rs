mod test_support;

use serde_json::{json, Value};
use test_support::{seeded_sidecar, spawn_sidecar, NOW};

fn grade_text(model: &Value, item_id: i64, user_id: i64) -> String {
    let rows = model["matrix"]["rows"].as_array().expect("rows");
    for row in rows {
        if row["itemId"].as_i64() != Some(item_id) {
            continue;
        }
        for cell in row["cells"].as_array().expect("cells") {
            if cell["userId"].as_i64() != Some(user_id) {
                continue;
            }
            return match cell["cell"].as_str() {
                Some("absent") => "absent".to_string(),
                _ if cell["display"]["kind"] == "error" => "Error".to_string(),
                _ => cell["display"]["text"].as_str().expect("text").to_string(),
            };
        }
    }
    panic!("no cell for item {} user {}", item_id, user_id);
}

#[test]
fn multicourse_model_lays_out_courses_and_learners() {
    let (_ws, mut sidecar) = seeded_sidecar();
    let model = sidecar.request_ok(
        "reports.multiCourseModel",
        json!({ "cohortId": 1, "now": NOW }),
    );

    assert_eq!(model["cohort"]["name"], "Year 10");
    assert_eq!(model["warnings"], json!([]));
    assert_eq!(model["matrix"]["learnerCount"], 3);
    assert_eq!(model["matrix"]["width"], 6);

    let rows = model["matrix"]["rows"].as_array().expect("rows");
    let kinds: Vec<&str> = rows.iter().map(|r| r["kind"].as_str().expect("kind")).collect();
    assert_eq!(
        kinds,
        vec![
            "header", "category", "filler", "category", "filler", "item", "item", "item", "item",
            "category", "item", "item", "item"
        ]
    );
    for row in rows {
        let span: u64 = row["cells"]
            .as_array()
            .expect("cells")
            .iter()
            .map(|c| c["span"].as_u64().expect("span"))
            .sum();
        assert_eq!(span, 6);
    }

    let header = rows[0]["cells"].as_array().expect("header cells");
    let names: Vec<&str> = header[3..]
        .iter()
        .map(|c| c["name"].as_str().expect("name"))
        .collect();
    assert_eq!(names, vec!["Ada Adams", "Ben Baker", "Cara Cole"]);
    assert_eq!(header[5]["suspendedIn"], json!(["CHEM10"]));

    assert_eq!(grade_text(&model, 1001, 103), "-");
    assert_eq!(grade_text(&model, 1002, 102), "-");
    assert_eq!(grade_text(&model, 1004, 102), "60.0");
    assert_eq!(grade_text(&model, 2001, 101), "Good");
    assert_eq!(grade_text(&model, 2003, 102), "Error");
}

#[test]
fn repeated_renders_share_a_fingerprint() {
    let (_ws, mut sidecar) = seeded_sidecar();
    let params = json!({ "cohortId": 1, "now": NOW });
    let a = sidecar.request_ok("reports.multiCourseModel", params.clone());
    let b = sidecar.request_ok("reports.multiCourseModel", params);
    assert_eq!(a["fingerprint"], b["fingerprint"]);
    assert_eq!(a["matrix"], b["matrix"]);
    assert_ne!(a["renderId"], b["renderId"]);
}

#[test]
fn viewer_and_config_change_the_rendering() {
    let (_ws, mut sidecar) = seeded_sidecar();
    let insider = sidecar.request_ok(
        "reports.multiCourseModel",
        json!({ "cohortId": 1, "now": NOW, "viewer": { "canViewHidden": true } }),
    );
    assert_eq!(grade_text(&insider, 1002, 102), "40");
    assert_eq!(grade_text(&insider, 1004, 102), "50.0");

    let dated = sidecar.request_ok(
        "reports.multiCourseModel",
        json!({ "cohortId": 1, "now": NOW, "config": { "hiddenAsDate": true } }),
    );
    assert_eq!(grade_text(&dated, 1002, 102), "2023-11-14 22:13");

    let active_only = sidecar.request_ok(
        "reports.multiCourseModel",
        json!({ "cohortId": 1, "now": NOW, "config": { "showOnlyActiveEnrolments": true } }),
    );
    assert_eq!(grade_text(&active_only, 2001, 103), "absent");
    assert_eq!(active_only["matrix"]["width"], 6);
}

#[test]
fn table_and_text_renderings_keep_the_width() {
    let (_ws, mut sidecar) = seeded_sidecar();
    let table = sidecar.request_ok(
        "reports.multiCourseTable",
        json!({ "cohortId": 1, "now": NOW }),
    );
    let width = table["width"].as_u64().expect("width");
    for row in table["table"]["rows"].as_array().expect("rows") {
        let span: u64 = row["cells"]
            .as_array()
            .expect("cells")
            .iter()
            .map(|c| c["colspan"].as_u64().expect("colspan"))
            .sum();
        assert_eq!(span, width);
    }

    let text = sidecar.request_ok(
        "reports.multiCourseText",
        json!({ "cohortId": 1, "now": NOW }),
    );
    let text = text["text"].as_str().expect("text");
    assert!(text.starts_with(
        "| Course / Activity name | Teachers | Grade max | Ada Adams | Ben Baker | Cara Cole |\n"
    ));
    assert!(text.contains("| Essay on photosynthesis and... |  | 100 | 72 | - | 90 |"));
}

#[test]
fn empty_cohort_and_errors() {
    let (_ws, mut sidecar) = seeded_sidecar();
    let empty = sidecar.request_ok(
        "reports.multiCourseModel",
        json!({ "cohortId": 2, "now": NOW }),
    );
    assert_eq!(empty["warnings"], json!(["noLearnersInCohort"]));
    assert_eq!(empty["matrix"]["rows"].as_array().map(|r| r.len()), Some(1));

    assert_eq!(
        sidecar.request_err("reports.multiCourseModel", json!({ "cohortId": 99 })),
        "not_found"
    );
    assert_eq!(
        sidecar.request_err("reports.multiCourseModel", json!({})),
        "bad_params"
    );
    assert_eq!(
        sidecar.request_err(
            "reports.multiCourseModel",
            json!({ "cohortId": 1, "config": { "itemNameBudget": 1 } })
        ),
        "bad_params"
    );
}

#[test]
fn reports_need_a_workspace() {
    let mut sidecar = spawn_sidecar();
    assert_eq!(
        sidecar.request_err("reports.multiCourseModel", json!({ "cohortId": 1 })),
        "no_workspace"
    );
}
