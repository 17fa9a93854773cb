mod test_support;

use serde_json::json;
use test_support::{fixture_path, seeded_sidecar, spawn_sidecar};

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let mut sidecar = spawn_sidecar();
    let health = sidecar.request_ok("health", json!({}));
    assert!(health["workspacePath"].is_null());
    assert_eq!(health["version"], env!("CARGO_PKG_VERSION"));

    assert_eq!(
        sidecar.request_err("cohorts.list", json!({})),
        "no_workspace"
    );
    assert_eq!(
        sidecar.request_err("classes.list", json!({})),
        "not_implemented"
    );
    assert_eq!(
        sidecar.request_err("workspace.select", json!({})),
        "bad_params"
    );

    let bad = sidecar.send_raw("{not json");
    assert_eq!(bad["ok"], false);
    assert_eq!(bad["error"]["code"], "bad_json");

    // Still serving after a malformed line.
    sidecar.request_ok("health", json!({}));
}

#[test]
fn snapshot_import_and_cohort_listing() {
    let (_ws, mut sidecar) = seeded_sidecar();
    let listed = sidecar.request_ok("cohorts.list", json!({}));
    let cohorts = listed["cohorts"].as_array().expect("cohorts");
    assert_eq!(cohorts.len(), 2);
    assert_eq!(cohorts[0]["name"], "Year 10");
    // The deleted member is not counted.
    assert_eq!(cohorts[0]["memberCount"], 3);
    assert_eq!(cohorts[0]["courseCount"], 2);
    assert_eq!(cohorts[1]["memberCount"], 0);

    let again = sidecar.request_ok(
        "snapshot.import",
        json!({ "path": fixture_path("year10_snapshot.json").to_string_lossy() }),
    );
    assert_eq!(again["imported"]["gradeItems"], 7);
    assert_eq!(again["imported"]["enrolments"], 3);

    assert_eq!(
        sidecar.request_err(
            "snapshot.import",
            json!({ "path": fixture_path("missing.json").to_string_lossy() })
        ),
        "snapshot_read_failed"
    );
}
