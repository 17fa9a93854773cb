use crate::config::ReportConfig;
use crate::host::EnrollmentStore;
use crate::model::{sort_learners, Cohort, Course, Learner};
use crate::report::{ReportError, ReportWarning};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Participation {
    Active,
    /// Inactive enrolment the viewer is allowed to see.
    Suspended,
    /// Removed from this course's learner list.
    Excluded,
}

/// Courses and learners one report covers.
#[derive(Debug, Clone)]
pub struct ReportScope {
    pub cohort: Cohort,
    pub courses: Vec<Course>,
    pub learners: Vec<Learner>,
    participation: HashMap<i64, HashMap<i64, Participation>>,
    pub warnings: Vec<ReportWarning>,
}

impl ReportScope {
    pub fn participation(&self, course_id: i64, user_id: i64) -> Participation {
        self.participation
            .get(&course_id)
            .and_then(|m| m.get(&user_id))
            .copied()
            .unwrap_or(Participation::Excluded)
    }

    /// Learners still listed for the course, in report order.
    pub fn course_learner_ids(&self, course_id: i64) -> Vec<i64> {
        self.learners
            .iter()
            .filter(|l| self.participation(course_id, l.id) != Participation::Excluded)
            .map(|l| l.id)
            .collect()
    }

    /// Course shortnames where the learner's enrolment is suspended.
    pub fn suspended_in(&self, user_id: i64) -> Vec<String> {
        self.courses
            .iter()
            .filter(|c| self.participation(c.id, user_id) == Participation::Suspended)
            .map(|c| c.shortname.clone())
            .collect()
    }
}

pub fn load_scope<S: EnrollmentStore + ?Sized>(
    store: &S,
    cohort_id: i64,
    config: &ReportConfig,
) -> Result<ReportScope, ReportError> {
    let cohort = store
        .cohort(cohort_id)?
        .ok_or(ReportError::CohortNotFound(cohort_id))?;

    let mut courses = store.cohort_courses(cohort_id)?;
    let mut learners = store.cohort_learners(cohort_id)?;
    sort_learners(&mut learners);
    let mut warnings = Vec::new();

    if courses.is_empty() {
        warn!(cohort_id, "cohort is not enrolled in any course");
        warnings.push(ReportWarning::NoCoursesForCohort);
    }
    if learners.is_empty() {
        warn!(cohort_id, "cohort has no active members");
        warnings.push(ReportWarning::NoLearnersInCohort);
        if config.empty_cohort_hides_courses {
            courses.clear();
        }
    }

    let remove_inactive =
        config.show_only_active_enrolments || !config.viewer.can_view_suspended;
    let user_ids: Vec<i64> = learners.iter().map(|l| l.id).collect();
    let now = config.now();
    let mut participation = HashMap::with_capacity(courses.len());
    for course in &courses {
        let active = store.active_enrolments(course.id, &user_ids, now)?;
        let per_user: HashMap<i64, Participation> = user_ids
            .iter()
            .map(|uid| {
                let p = if active.contains(uid) {
                    Participation::Active
                } else if remove_inactive {
                    Participation::Excluded
                } else {
                    Participation::Suspended
                };
                (*uid, p)
            })
            .collect();
        debug!(
            course_id = course.id,
            active = active.len(),
            learners = user_ids.len(),
            "resolved course participation"
        );
        participation.insert(course.id, per_user);
    }

    Ok(ReportScope {
        cohort,
        courses,
        learners,
        participation,
        warnings,
    })
}
