mod test_support;

use serde_json::json;
use test_support::{seeded_sidecar, NOW};

fn user_order(model: &serde_json::Value) -> Vec<i64> {
    model["rows"]
        .as_array()
        .expect("rows")
        .iter()
        .map(|r| r["userId"].as_i64().expect("userId"))
        .collect()
}

#[test]
fn sort_state_round_trips_through_requests() {
    let (_ws, mut sidecar) = seeded_sidecar();

    let first = sidecar.request_ok(
        "reports.courseGradesModel",
        json!({ "courseId": 11, "now": NOW }),
    );
    assert_eq!(first["sort"], json!({ "key": "lastname", "direction": "ASC" }));
    assert_eq!(user_order(&first), vec![101, 102, 103]);

    let by_quiz = sidecar.request_ok(
        "reports.courseGradesModel",
        json!({ "courseId": 11, "now": NOW, "sort": first["sort"], "sortBy": 1001 }),
    );
    assert_eq!(by_quiz["sort"], json!({ "key": 1001, "direction": "DESC" }));
    assert_eq!(user_order(&by_quiz), vec![101, 102, 103]);

    let flipped = sidecar.request_ok(
        "reports.courseGradesModel",
        json!({ "courseId": 11, "now": NOW, "sort": by_quiz["sort"], "sortBy": 1001 }),
    );
    assert_eq!(flipped["sort"]["direction"], "ASC");
    // Cara has no quiz grade and stays last.
    assert_eq!(user_order(&flipped), vec![102, 101, 103]);
}

#[test]
fn range_and_average_rows() {
    let (_ws, mut sidecar) = seeded_sidecar();
    let plain = sidecar.request_ok(
        "reports.courseGradesModel",
        json!({ "courseId": 11, "now": NOW }),
    );
    assert_eq!(plain["rangeRow"][0], "0.0–10.0");
    assert!(plain["averageRow"].is_null());

    let insider = sidecar.request_ok(
        "reports.courseGradesModel",
        json!({
            "courseId": 11,
            "now": NOW,
            "viewer": { "canViewHidden": true },
            "config": { "meanSelection": "all" }
        }),
    );
    let avg = insider["averageRow"].as_array().expect("averages");
    assert_eq!(avg[0]["itemId"], 1001);
    // (8 + 6 + 0) / 3
    assert_eq!(avg[0]["text"], "4.7");

    let chem = sidecar.request_ok(
        "reports.courseGradesModel",
        json!({ "courseId": 12, "cohortId": 1, "now": NOW, "viewer": { "canViewHidden": true } }),
    );
    let total = chem["averageRow"]
        .as_array()
        .expect("averages")
        .iter()
        .find(|a| a["itemId"] == 2003)
        .cloned()
        .expect("total");
    assert_eq!(total["text"], "Error");
}

#[test]
fn unknown_course_is_not_found() {
    let (_ws, mut sidecar) = seeded_sidecar();
    assert_eq!(
        sidecar.request_err("reports.courseGradesModel", json!({ "courseId": 404 })),
        "not_found"
    );
}
