//! Per-course view: learner rows by item columns, with sorting, a range row
//! and an average row.

use crate::calc::{self, DisplayValue, ResolveContext};
use crate::config::ReportConfig;
use crate::hiding::{HidingAffected, RecomputeHiding};
use crate::host::{HidingAggregateResolver, ReportHost};
use crate::matrix::shorten_name;
use crate::model::{Course, Grade, ItemKind, Learner};
use crate::report::ReportError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameField {
    Lastname,
    Firstname,
    Email,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SortKey {
    Field(NameField),
    Item(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    fn flip(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortState {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl Default for SortState {
    fn default() -> Self {
        Self {
            key: SortKey::Field(NameField::Lastname),
            direction: SortDirection::Asc,
        }
    }
}

impl SortState {
    /// Clicking the current key flips it; a new name key starts ascending,
    /// a new item key descending.
    pub fn next(prev: Option<&SortState>, requested: Option<SortKey>) -> SortState {
        match (prev, requested) {
            (prev, None) => prev.copied().unwrap_or_default(),
            (Some(p), Some(key)) if p.key == key => SortState {
                key,
                direction: p.direction.flip(),
            },
            (_, Some(key @ SortKey::Field(_))) => SortState {
                key,
                direction: SortDirection::Asc,
            },
            (_, Some(key @ SortKey::Item(_))) => SortState {
                key,
                direction: SortDirection::Desc,
            },
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CourseGradesRequest {
    pub course_id: i64,
    pub cohort_id: Option<i64>,
    /// State echoed back from the previous response.
    pub sort: Option<SortState>,
    pub sort_by: Option<SortKey>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemColumn {
    pub item_id: i64,
    pub name: String,
    pub full_name: String,
    pub kind: ItemKind,
    pub grade_max: String,
    pub hidden: bool,
    pub locked: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeCell {
    pub item_id: i64,
    pub display: DisplayValue,
    pub overridden: bool,
    pub excluded: bool,
    pub hidden: bool,
    pub pass: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerRow {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub suspended: bool,
    pub cells: Vec<GradeCell>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AverageCell {
    pub item_id: i64,
    pub text: String,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseGradesModel {
    pub course: Course,
    pub sort: SortState,
    pub items: Vec<ItemColumn>,
    pub rows: Vec<LearnerRow>,
    pub range_row: Option<Vec<String>>,
    pub average_row: Option<Vec<AverageCell>>,
}

fn displayed_value(cell: &GradeCell) -> Option<f64> {
    match &cell.display {
        DisplayValue::Value { value, .. } => *value,
        _ => None,
    }
}

fn name_tiebreak(a: &Learner, b: &Learner) -> Ordering {
    a.lastname
        .cmp(&b.lastname)
        .then_with(|| a.firstname.cmp(&b.firstname))
        .then_with(|| a.id.cmp(&b.id))
}

fn sort_rows(rows: &mut [(Learner, LearnerRow)], sort: &SortState) {
    let directed = |o: Ordering| match sort.direction {
        SortDirection::Asc => o,
        SortDirection::Desc => o.reverse(),
    };
    match sort.key {
        SortKey::Field(field) => rows.sort_by(|(a, _), (b, _)| {
            let primary = match field {
                NameField::Lastname => a.lastname.cmp(&b.lastname),
                NameField::Firstname => a.firstname.cmp(&b.firstname),
                NameField::Email => a.email.cmp(&b.email),
            };
            directed(primary).then_with(|| name_tiebreak(a, b))
        }),
        SortKey::Item(item_id) => {
            let value = |row: &LearnerRow| {
                row.cells
                    .iter()
                    .find(|c| c.item_id == item_id)
                    .and_then(displayed_value)
            };
            rows.sort_by(|(la, ra), (lb, rb)| {
                // Empty grades sink to the bottom in both directions.
                let primary = match (value(ra), value(rb)) {
                    (Some(x), Some(y)) => directed(x.partial_cmp(&y).unwrap_or(Ordering::Equal)),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                };
                primary.then_with(|| name_tiebreak(la, lb))
            })
        }
    }
}

pub fn course_grades_model<H: ReportHost + ?Sized>(
    host: &H,
    request: &CourseGradesRequest,
    config: &ReportConfig,
) -> Result<CourseGradesModel, ReportError> {
    course_grades_model_with(host, &RecomputeHiding, request, config)
}

pub fn course_grades_model_with<H: ReportHost + ?Sized>(
    host: &H,
    resolver: &dyn HidingAggregateResolver,
    request: &CourseGradesRequest,
    config: &ReportConfig,
) -> Result<CourseGradesModel, ReportError> {
    let course = host
        .course(request.course_id)?
        .ok_or(ReportError::CourseNotFound(request.course_id))?;

    let learners = match request.cohort_id {
        Some(cohort_id) => {
            if host.cohort(cohort_id)?.is_none() {
                return Err(ReportError::CohortNotFound(cohort_id));
            }
            host.cohort_learners(cohort_id)?
        }
        None => host.course_learners(course.id)?,
    };
    let all_ids: Vec<i64> = learners.iter().map(|l| l.id).collect();
    let active = host.active_enrolments(course.id, &all_ids, config.now())?;
    let remove_inactive = config.show_only_active_enrolments || !config.viewer.can_view_suspended;
    let learners: Vec<Learner> = learners
        .into_iter()
        .filter(|l| active.contains(&l.id) || !remove_inactive)
        .collect();
    let user_ids: Vec<i64> = learners.iter().map(|l| l.id).collect();

    let tree = host.grade_tree(&course, &config.collapsed)?;
    let stored = host.final_grades_for(course.id, &user_ids)?;
    let items: Vec<_> = tree.item_ids().iter().filter_map(|id| tree.item(*id)).collect();

    let columns: Vec<ItemColumn> = items
        .iter()
        .map(|it| ItemColumn {
            item_id: it.id,
            name: shorten_name(&it.name, config.item_name_budget),
            full_name: it.name.clone(),
            kind: it.kind,
            grade_max: calc::format_grade_max(it),
            hidden: it.hidden,
            locked: it.locked,
        })
        .collect();

    let no_hiding = HidingAffected::default();
    let mut rows: Vec<(Learner, LearnerRow)> = Vec::with_capacity(learners.len());
    for learner in learners {
        let grades: HashMap<i64, Grade> = tree
            .all_items()
            .map(|it| {
                let g = stored
                    .get(&(learner.id, it.id))
                    .cloned()
                    .unwrap_or_else(|| Grade::placeholder(learner.id, it.id));
                (it.id, g)
            })
            .collect();
        let affected = if config.viewer.can_view_hidden {
            None
        } else {
            Some(resolver.affected(&grades, &tree))
        };
        let ctx = ResolveContext {
            can_view_hidden: config.viewer.can_view_hidden,
            hidden_as_date: config.hidden_as_date,
            hiding: affected.as_ref().unwrap_or(&no_hiding),
        };
        let cells = items
            .iter()
            .map(|it| {
                let placeholder = Grade::placeholder(learner.id, it.id);
                let grade = grades.get(&it.id).unwrap_or(&placeholder);
                let display = calc::resolve(grade, it, &ctx);
                let pass = match &display {
                    DisplayValue::Value { value, .. } => calc::pass_state(*value, it),
                    _ => None,
                };
                GradeCell {
                    item_id: it.id,
                    display,
                    overridden: grade.overridden,
                    excluded: grade.excluded,
                    hidden: grade.is_hidden(it),
                    pass,
                }
            })
            .collect();
        let row = LearnerRow {
            user_id: learner.id,
            name: learner.full_name(),
            email: learner.email.clone(),
            suspended: !active.contains(&learner.id),
            cells,
        };
        rows.push((learner, row));
    }

    let sort = SortState::next(request.sort.as_ref(), request.sort_by);
    sort_rows(&mut rows, &sort);

    let range_row = config
        .show_range_row
        .then(|| items.iter().map(|it| calc::format_range(it)).collect());

    let average_row = (config.show_average_row && config.viewer.can_view_hidden).then(|| {
        items
            .iter()
            .map(|it| {
                if it.needsupdate {
                    return AverageCell {
                        item_id: it.id,
                        text: calc::ERROR_MARKER.to_string(),
                        value: None,
                    };
                }
                let values: Vec<Option<f64>> = user_ids
                    .iter()
                    .filter_map(|uid| match stored.get(&(*uid, it.id)) {
                        Some(g) if g.excluded => None,
                        Some(g) => Some(g.finalgrade),
                        None => Some(None),
                    })
                    .collect();
                let value = calc::item_average(&values, it, config.mean_selection);
                AverageCell {
                    item_id: it.id,
                    text: calc::format_grade_value(value, it),
                    value,
                }
            })
            .collect()
    });

    debug!(
        course_id = course.id,
        learners = rows.len(),
        items = columns.len(),
        "built course grades model"
    );

    Ok(CourseGradesModel {
        course,
        sort,
        items: columns,
        rows: rows.into_iter().map(|(_, r)| r).collect(),
        range_row,
        average_row,
    })
}
