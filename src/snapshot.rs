//! Host mirror snapshot: a JSON export of the host tables the report reads.
//! Importing replaces the whole mirror in one transaction.

use crate::model::{Aggregation, DisplayType, ItemKind};
use anyhow::{bail, Context};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Snapshot {
    pub cohorts: Vec<SnapshotCohort>,
    pub users: Vec<SnapshotUser>,
    pub courses: Vec<SnapshotCourse>,
    pub cohort_members: Vec<SnapshotCohortMember>,
    #[serde(alias = "cohortEnrolments")]
    pub enrolments: Vec<SnapshotEnrolment>,
    pub user_enrolments: Vec<SnapshotUserEnrolment>,
    pub role_assignments: Vec<SnapshotRoleAssignment>,
    pub scales: Vec<SnapshotScale>,
    pub grade_categories: Vec<SnapshotGradeCategory>,
    pub grade_items: Vec<SnapshotGradeItem>,
    pub grades: Vec<SnapshotGrade>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotCohort {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub idnumber: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotUser {
    pub id: i64,
    pub firstname: String,
    pub lastname: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub picture: bool,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub suspended: bool,
    #[serde(default)]
    pub guest: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotCourse {
    pub id: i64,
    pub shortname: String,
    pub fullname: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotCohortMember {
    pub cohort_id: i64,
    pub user_id: i64,
}

fn default_enrol() -> String {
    "cohort".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEnrolment {
    pub id: i64,
    pub course_id: i64,
    #[serde(default = "default_enrol")]
    pub enrol: String,
    #[serde(default)]
    pub cohort_id: Option<i64>,
    /// 0 enabled, anything else disabled.
    #[serde(default)]
    pub status: i64,
    #[serde(default)]
    pub sortorder: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotUserEnrolment {
    pub enrol_id: i64,
    pub user_id: i64,
    /// 0 active, 1 suspended.
    #[serde(default)]
    pub status: i64,
    #[serde(default)]
    pub time_start: i64,
    #[serde(default)]
    pub time_end: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRoleAssignment {
    pub course_id: i64,
    pub user_id: i64,
    pub role: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotScale {
    pub id: i64,
    pub name: String,
    pub items: Vec<String>,
}

fn default_aggregation() -> String {
    Aggregation::Mean.as_str().to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotGradeCategory {
    pub id: i64,
    pub course_id: i64,
    #[serde(default)]
    pub parent_id: Option<i64>,
    pub name: String,
    #[serde(default = "default_aggregation")]
    pub aggregation: String,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub sortorder: i64,
}

fn default_grademax() -> f64 {
    100.0
}

fn default_decimals() -> i64 {
    2
}

fn default_display_type() -> String {
    DisplayType::Numeric.as_str().to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotGradeItem {
    pub id: i64,
    pub course_id: i64,
    #[serde(default)]
    pub category_id: Option<i64>,
    pub name: String,
    pub itemtype: String,
    #[serde(default)]
    pub grademin: f64,
    #[serde(default = "default_grademax")]
    pub grademax: f64,
    #[serde(default)]
    pub gradepass: f64,
    #[serde(default = "default_decimals")]
    pub decimals: i64,
    #[serde(default = "default_display_type")]
    pub display_type: String,
    #[serde(default)]
    pub scale_id: Option<i64>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub needsupdate: bool,
    #[serde(default)]
    pub sortorder: i64,
    #[serde(default)]
    pub depends_on: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotGrade {
    pub item_id: i64,
    pub user_id: i64,
    #[serde(default)]
    pub finalgrade: Option<f64>,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub excluded: bool,
    #[serde(default)]
    pub overridden: bool,
    #[serde(default)]
    pub time_submitted: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub cohorts: usize,
    pub users: usize,
    pub courses: usize,
    pub cohort_members: usize,
    pub enrolments: usize,
    pub user_enrolments: usize,
    pub role_assignments: usize,
    pub scales: usize,
    pub grade_categories: usize,
    pub grade_items: usize,
    pub grades: usize,
}

pub fn read_snapshot(path: &Path) -> anyhow::Result<Snapshot> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read snapshot {}", path.to_string_lossy()))?;
    let snapshot: Snapshot = serde_json::from_str(&text)
        .with_context(|| format!("parse snapshot {}", path.to_string_lossy()))?;
    Ok(snapshot)
}

fn validate(snapshot: &Snapshot) -> anyhow::Result<()> {
    for c in &snapshot.grade_categories {
        if Aggregation::parse(&c.aggregation).is_none() {
            bail!("grade category {}: unknown aggregation {}", c.id, c.aggregation);
        }
    }
    for it in &snapshot.grade_items {
        if ItemKind::parse(&it.itemtype).is_none() {
            bail!("grade item {}: unknown itemtype {}", it.id, it.itemtype);
        }
        if DisplayType::parse(&it.display_type).is_none() {
            bail!("grade item {}: unknown displayType {}", it.id, it.display_type);
        }
        if it.grademax < it.grademin {
            bail!("grade item {}: grademax below grademin", it.id);
        }
    }
    Ok(())
}

/// Replaces every mirror table with the snapshot contents. Settings are kept.
pub fn import_snapshot(conn: &Connection, snapshot: &Snapshot) -> anyhow::Result<ImportSummary> {
    validate(snapshot)?;

    let tx = conn.unchecked_transaction()?;
    for table in [
        "grade_grades",
        "grade_items",
        "grade_categories",
        "scales",
        "role_assignments",
        "user_enrolments",
        "enrol",
        "cohort_members",
        "courses",
        "users",
        "cohorts",
    ] {
        tx.execute(&format!("DELETE FROM {}", table), [])?;
    }

    for c in &snapshot.cohorts {
        tx.execute(
            "INSERT INTO cohorts(id, name, idnumber) VALUES(?, ?, ?)",
            (c.id, &c.name, &c.idnumber),
        )
        .with_context(|| format!("insert cohort {}", c.id))?;
    }
    for u in &snapshot.users {
        tx.execute(
            "INSERT INTO users(id, firstname, lastname, email, picture, deleted, suspended, is_guest)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
            (
                u.id,
                &u.firstname,
                &u.lastname,
                &u.email,
                u.picture as i64,
                u.deleted as i64,
                u.suspended as i64,
                u.guest as i64,
            ),
        )
        .with_context(|| format!("insert user {}", u.id))?;
    }
    for c in &snapshot.courses {
        tx.execute(
            "INSERT INTO courses(id, shortname, fullname) VALUES(?, ?, ?)",
            (c.id, &c.shortname, &c.fullname),
        )
        .with_context(|| format!("insert course {}", c.id))?;
    }
    for m in &snapshot.cohort_members {
        tx.execute(
            "INSERT OR IGNORE INTO cohort_members(cohort_id, user_id) VALUES(?, ?)",
            (m.cohort_id, m.user_id),
        )
        .with_context(|| format!("insert cohort member {}/{}", m.cohort_id, m.user_id))?;
    }
    for e in &snapshot.enrolments {
        tx.execute(
            "INSERT INTO enrol(id, course_id, enrol, cohort_id, status, sortorder)
             VALUES(?, ?, ?, ?, ?, ?)",
            (e.id, e.course_id, &e.enrol, e.cohort_id, e.status, e.sortorder),
        )
        .with_context(|| format!("insert enrolment instance {}", e.id))?;
    }
    for ue in &snapshot.user_enrolments {
        tx.execute(
            "INSERT INTO user_enrolments(enrol_id, user_id, status, time_start, time_end)
             VALUES(?, ?, ?, ?, ?)",
            (ue.enrol_id, ue.user_id, ue.status, ue.time_start, ue.time_end),
        )
        .with_context(|| format!("insert user enrolment {}/{}", ue.enrol_id, ue.user_id))?;
    }
    for ra in &snapshot.role_assignments {
        tx.execute(
            "INSERT OR IGNORE INTO role_assignments(course_id, user_id, role) VALUES(?, ?, ?)",
            (ra.course_id, ra.user_id, &ra.role),
        )
        .with_context(|| format!("insert role {} for user {}", ra.role, ra.user_id))?;
    }
    for s in &snapshot.scales {
        tx.execute(
            "INSERT INTO scales(id, name, items) VALUES(?, ?, ?)",
            (s.id, &s.name, s.items.join(",")),
        )
        .with_context(|| format!("insert scale {}", s.id))?;
    }
    for c in &snapshot.grade_categories {
        tx.execute(
            "INSERT INTO grade_categories(id, course_id, parent_id, name, aggregation, hidden, sortorder)
             VALUES(?, ?, ?, ?, ?, ?, ?)",
            (
                c.id,
                c.course_id,
                c.parent_id,
                &c.name,
                &c.aggregation,
                c.hidden as i64,
                c.sortorder,
            ),
        )
        .with_context(|| format!("insert grade category {}", c.id))?;
    }
    for it in &snapshot.grade_items {
        let depends_on = it
            .depends_on
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join(",");
        tx.execute(
            "INSERT INTO grade_items(
                id, course_id, category_id, name, itemtype, grademin, grademax, gradepass,
                decimals, display_type, scale_id, hidden, locked, needsupdate, sortorder, depends_on
             ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            rusqlite::params![
                it.id,
                it.course_id,
                it.category_id,
                it.name,
                it.itemtype,
                it.grademin,
                it.grademax,
                it.gradepass,
                it.decimals,
                it.display_type,
                it.scale_id,
                it.hidden as i64,
                it.locked as i64,
                it.needsupdate as i64,
                it.sortorder,
                depends_on,
            ],
        )
        .with_context(|| format!("insert grade item {}", it.id))?;
    }
    for g in &snapshot.grades {
        tx.execute(
            "INSERT INTO grade_grades(
                item_id, user_id, finalgrade, feedback, hidden, excluded, overridden, time_submitted
             ) VALUES(?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(item_id, user_id) DO UPDATE SET
                finalgrade = excluded.finalgrade,
                feedback = excluded.feedback,
                hidden = excluded.hidden,
                excluded = excluded.excluded,
                overridden = excluded.overridden,
                time_submitted = excluded.time_submitted",
            (
                g.item_id,
                g.user_id,
                g.finalgrade,
                &g.feedback,
                g.hidden as i64,
                g.excluded as i64,
                g.overridden as i64,
                g.time_submitted,
            ),
        )
        .with_context(|| format!("insert grade {}/{}", g.item_id, g.user_id))?;
    }
    tx.commit()?;

    Ok(ImportSummary {
        cohorts: snapshot.cohorts.len(),
        users: snapshot.users.len(),
        courses: snapshot.courses.len(),
        cohort_members: snapshot.cohort_members.len(),
        enrolments: snapshot.enrolments.len(),
        user_enrolments: snapshot.user_enrolments.len(),
        role_assignments: snapshot.role_assignments.len(),
        scales: snapshot.scales.len(),
        grade_categories: snapshot.grade_categories.len(),
        grade_items: snapshot.grade_items.len(),
        grades: snapshot.grades.len(),
    })
}
