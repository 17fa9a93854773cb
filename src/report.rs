use crate::config::ReportConfig;
use crate::hiding::RecomputeHiding;
use crate::host::{HidingAggregateResolver, ReportHost};
use crate::loader::load_scope;
use crate::matrix::{build_matrix, ReportMatrix};
use crate::model::Cohort;
use crate::roster::RosterCache;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("cohort {0} not found")]
    CohortNotFound(i64),
    #[error("course {0} not found")]
    CourseNotFound(i64),
    #[error("row {row} spans {actual} columns, expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl ReportError {
    /// Error code used in IPC envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            ReportError::CohortNotFound(_) | ReportError::CourseNotFound(_) => "not_found",
            ReportError::RowWidth { .. } => "report_layout_failed",
            ReportError::Store(_) => "db_query_failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReportWarning {
    NoCoursesForCohort,
    NoLearnersInCohort,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub render_id: String,
    pub cohort: Cohort,
    pub matrix: ReportMatrix,
    pub warnings: Vec<ReportWarning>,
    /// sha256 of the serialized matrix; equal inputs give equal fingerprints.
    pub fingerprint: String,
}

pub fn matrix_fingerprint(matrix: &ReportMatrix) -> anyhow::Result<String> {
    let bytes = serde_json::to_vec(matrix)?;
    let digest = Sha256::digest(&bytes);
    Ok(digest.iter().map(|b| format!("{:02x}", b)).collect())
}

pub fn generate_report<H: ReportHost + ?Sized>(
    host: &H,
    cohort_id: i64,
    config: &ReportConfig,
) -> Result<Report, ReportError> {
    generate_report_with(host, &RecomputeHiding, cohort_id, config)
}

pub fn generate_report_with<H: ReportHost + ?Sized>(
    host: &H,
    resolver: &dyn HidingAggregateResolver,
    cohort_id: i64,
    config: &ReportConfig,
) -> Result<Report, ReportError> {
    let render_id = uuid::Uuid::new_v4().to_string();
    let scope = load_scope(host, cohort_id, config)?;
    for w in &scope.warnings {
        warn!(render_id = %render_id, cohort_id, warning = ?w, "report configuration warning");
    }

    let mut roster = RosterCache::new();
    let matrix = build_matrix(host, resolver, &scope, config, &mut roster)?;
    let fingerprint = matrix_fingerprint(&matrix)?;

    info!(
        render_id = %render_id,
        cohort_id,
        courses = scope.courses.len(),
        learners = scope.learners.len(),
        rows = matrix.rows.len(),
        roster_lookups = roster.lookups(),
        "rendered multi-course report"
    );

    Ok(Report {
        render_id,
        cohort: scope.cohort,
        matrix,
        warnings: scope.warnings,
        fingerprint,
    })
}
