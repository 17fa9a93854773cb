use crate::calc::MeanSelection;
use crate::db;
use crate::tree::CollapsedState;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const REPORT_SETTINGS_KEY: &str = "setup.report";
pub const DEFAULT_ITEM_NAME_BUDGET: usize = 30;

/// Capabilities of whoever is looking at the report. Supplied per request,
/// never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Viewer {
    pub can_view_hidden: bool,
    pub can_view_suspended: bool,
    pub can_view_profile_report: bool,
}

impl Default for Viewer {
    fn default() -> Self {
        Self {
            can_view_hidden: false,
            can_view_suspended: true,
            can_view_profile_report: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportConfig {
    pub show_only_active_enrolments: bool,
    /// Show the submission date instead of `-` for hidden grades.
    pub hidden_as_date: bool,
    pub show_user_image: bool,
    /// A cohort with no learners reports no courses either.
    pub empty_cohort_hides_courses: bool,
    pub item_name_budget: usize,
    pub mean_selection: MeanSelection,
    pub show_range_row: bool,
    pub show_average_row: bool,
    pub collapsed: CollapsedState,
    #[serde(skip)]
    pub viewer: Viewer,
    /// Unix seconds used for enrolment windows; `None` means the wall clock.
    #[serde(skip)]
    pub now: Option<i64>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            show_only_active_enrolments: false,
            hidden_as_date: false,
            show_user_image: true,
            empty_cohort_hides_courses: true,
            item_name_budget: DEFAULT_ITEM_NAME_BUDGET,
            mean_selection: MeanSelection::Graded,
            show_range_row: true,
            show_average_row: true,
            collapsed: CollapsedState::default(),
            viewer: Viewer::default(),
            now: None,
        }
    }
}

impl ReportConfig {
    pub fn now(&self) -> i64 {
        self.now.unwrap_or_else(|| chrono::Utc::now().timestamp())
    }
}

fn default_json() -> Value {
    serde_json::to_value(ReportConfig::default()).unwrap_or_else(|_| Value::Object(Map::new()))
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool().ok_or_else(|| format!("{} must be boolean", key))
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v.as_i64().ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_id_list(v: &Value, key: &str) -> Result<Value, String> {
    let arr = v
        .as_array()
        .ok_or_else(|| format!("{} must be an array of ids", key))?;
    let mut ids = Vec::with_capacity(arr.len());
    for x in arr {
        ids.push(x.as_i64().ok_or_else(|| format!("{} must contain integers", key))?);
    }
    ids.sort_unstable();
    ids.dedup();
    Ok(Value::from(ids))
}

/// Applies a validated camelCase patch over a stored config object.
pub fn merge_report_patch(current: &mut Value, patch: &Map<String, Value>) -> Result<(), String> {
    let obj = current
        .as_object_mut()
        .ok_or_else(|| "report config must be a JSON object".to_string())?;
    for (k, v) in patch {
        match k.as_str() {
            "showOnlyActiveEnrolments"
            | "hiddenAsDate"
            | "showUserImage"
            | "emptyCohortHidesCourses"
            | "showRangeRow"
            | "showAverageRow" => {
                obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
            }
            "itemNameBudget" => {
                obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 10, 200)?));
            }
            "meanSelection" => {
                let s = v
                    .as_str()
                    .ok_or_else(|| "meanSelection must be string".to_string())?
                    .trim()
                    .to_ascii_lowercase();
                if s != "graded" && s != "all" {
                    return Err("meanSelection must be one of: graded, all".into());
                }
                obj.insert(k.clone(), Value::String(s));
            }
            "collapsed" => {
                let patch = v
                    .as_object()
                    .ok_or_else(|| "collapsed must be an object".to_string())?;
                let mut collapsed = obj
                    .get("collapsed")
                    .and_then(|c| c.as_object())
                    .cloned()
                    .unwrap_or_default();
                for (ck, cv) in patch {
                    match ck.as_str() {
                        "aggregatesOnly" | "gradesOnly" => {
                            collapsed.insert(ck.clone(), parse_id_list(cv, ck)?);
                        }
                        _ => return Err(format!("unknown collapsed field: {}", ck)),
                    }
                }
                obj.insert(k.clone(), Value::Object(collapsed));
            }
            _ => return Err(format!("unknown report field: {}", k)),
        }
    }
    Ok(())
}

/// Stored config merged over defaults, as JSON.
pub fn stored_report_json(conn: &Connection) -> anyhow::Result<Value> {
    let mut merged = default_json();
    if let Some(Value::Object(saved)) = db::settings_get_json(conn, REPORT_SETTINGS_KEY)? {
        if let Some(obj) = merged.as_object_mut() {
            for (k, v) in saved {
                obj.insert(k, v);
            }
        }
    }
    Ok(merged)
}

pub fn load_report_config(conn: &Connection) -> anyhow::Result<ReportConfig> {
    Ok(serde_json::from_value(stored_report_json(conn)?)?)
}

pub fn save_report_patch(conn: &Connection, patch: &Map<String, Value>) -> anyhow::Result<Value> {
    let mut current = stored_report_json(conn)?;
    merge_report_patch(&mut current, patch).map_err(anyhow::Error::msg)?;
    db::settings_set_json(conn, REPORT_SETTINGS_KEY, &current)?;
    Ok(current)
}

/// Stored config with a one-off request patch on top. Nothing is written.
pub fn effective_report_config(
    conn: &Connection,
    patch: Option<&Map<String, Value>>,
) -> Result<ReportConfig, String> {
    let Some(p) = patch else {
        return load_report_config(conn).map_err(|e| format!("{e:#}"));
    };
    let mut current = stored_report_json(conn).map_err(|e| e.to_string())?;
    merge_report_patch(&mut current, p)?;
    serde_json::from_value(current).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn conn() -> Connection {
        let c = Connection::open_in_memory().expect("open");
        db::init_schema(&c).expect("schema");
        c
    }

    #[test]
    fn defaults_apply_without_stored_settings() {
        let c = conn();
        let cfg = load_report_config(&c).expect("load");
        assert_eq!(cfg, ReportConfig::default());
        assert!(cfg.empty_cohort_hides_courses);
        assert_eq!(cfg.item_name_budget, 30);
        assert!(!cfg.viewer.can_view_hidden);
    }

    #[test]
    fn saved_patch_persists_and_request_patch_does_not() {
        let c = conn();
        let patch = json!({ "hiddenAsDate": true, "collapsed": { "aggregatesOnly": [11, 11, 4] } });
        save_report_patch(&c, patch.as_object().expect("obj")).expect("save");

        let one_off = json!({ "meanSelection": "ALL" });
        let cfg = effective_report_config(&c, one_off.as_object()).expect("effective");
        assert!(cfg.hidden_as_date);
        assert_eq!(cfg.mean_selection, MeanSelection::All);
        assert_eq!(cfg.collapsed.aggregates_only.len(), 2);

        let stored = load_report_config(&c).expect("load");
        assert_eq!(stored.mean_selection, MeanSelection::Graded);
    }

    #[test]
    fn invalid_patch_is_rejected() {
        let mut current = default_json();
        let bad = json!({ "itemNameBudget": 3 });
        let e = merge_report_patch(&mut current, bad.as_object().expect("obj")).expect_err("range");
        assert!(e.contains("itemNameBudget"));
        let unknown = json!({ "colour": "red" });
        assert!(merge_report_patch(&mut current, unknown.as_object().expect("obj")).is_err());
    }
}
