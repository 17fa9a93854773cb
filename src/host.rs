//! Seams to the host platform. The report engine only reads through these
//! traits; `store::SqliteHost` is the workspace-backed implementation.

use crate::hiding::HidingAffected;
use crate::model::{Cohort, Course, Grade, Learner, Teacher};
use crate::tree::{CollapsedState, GradeTree};
use std::collections::{HashMap, HashSet};

pub trait GradeTreeProvider {
    fn grade_tree(&self, course: &Course, collapsed: &CollapsedState) -> anyhow::Result<GradeTree>;
}

pub trait GradeStore {
    /// Stored final grades keyed by `(user_id, item_id)`. Missing pairs are
    /// simply absent.
    fn final_grades_for(
        &self,
        course_id: i64,
        user_ids: &[i64],
    ) -> anyhow::Result<HashMap<(i64, i64), Grade>>;
}

pub trait EnrollmentStore {
    fn cohort(&self, cohort_id: i64) -> anyhow::Result<Option<Cohort>>;

    /// Courses the cohort is enrolled in, in enrolment sort order.
    fn cohort_courses(&self, cohort_id: i64) -> anyhow::Result<Vec<Course>>;

    /// Non-deleted, non-suspended cohort members.
    fn cohort_learners(&self, cohort_id: i64) -> anyhow::Result<Vec<Learner>>;

    /// Users holding the student role in a course.
    fn course_learners(&self, course_id: i64) -> anyhow::Result<Vec<Learner>>;

    fn course(&self, course_id: i64) -> anyhow::Result<Option<Course>>;

    /// Subset of `user_ids` with an active enrolment in the course at `now`
    /// (unix seconds).
    fn active_enrolments(
        &self,
        course_id: i64,
        user_ids: &[i64],
        now: i64,
    ) -> anyhow::Result<HashSet<i64>>;
}

pub trait RoleStore {
    fn teachers_for(&self, course_id: i64) -> anyhow::Result<Vec<Teacher>>;
}

pub trait HidingAggregateResolver {
    /// `grades` holds one learner's grades keyed by item id.
    fn affected(&self, grades: &HashMap<i64, Grade>, tree: &GradeTree) -> HidingAffected;
}

/// Everything a report render reads from the host.
pub trait ReportHost: GradeTreeProvider + GradeStore + EnrollmentStore + RoleStore {}

impl<T> ReportHost for T where T: GradeTreeProvider + GradeStore + EnrollmentStore + RoleStore {}
