use crate::calc::{self, DisplayValue, ResolveContext};
use crate::config::ReportConfig;
use crate::hiding::HidingAffected;
use crate::host::{HidingAggregateResolver, ReportHost};
use crate::loader::{Participation, ReportScope};
use crate::model::{Course, Grade, GradeItem, ItemKind, Learner};
use crate::report::ReportError;
use crate::roster::RosterCache;
use crate::tree::{FillerPosition, GradeNode, GradeTree};
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Course/activity name, teachers and grade max come before the learners.
pub const FIXED_COLUMNS: usize = 3;
pub const ELLIPSIS: &str = "...";

pub const HEADER_NAME: &str = "Course / Activity name";
pub const HEADER_TEACHERS: &str = "Teachers";
pub const HEADER_GRADE_MAX: &str = "Grade max";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMatrix {
    pub learner_count: usize,
    pub width: usize,
    pub rows: Vec<MatrixRow>,
}

impl ReportMatrix {
    fn new(learner_count: usize) -> Self {
        Self {
            learner_count,
            width: learner_count + FIXED_COLUMNS,
            rows: Vec::new(),
        }
    }

    fn push(&mut self, row: MatrixRow) -> Result<(), ReportError> {
        let actual = row.span();
        if actual != self.width {
            return Err(ReportError::RowWidth {
                row: self.rows.len(),
                expected: self.width,
                actual,
            });
        }
        self.rows.push(row);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RowKind {
    Header,
    Filler,
    Category,
    Item,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixRow {
    pub kind: RowKind,
    pub course_id: Option<i64>,
    pub item_id: Option<i64>,
    pub depth: usize,
    pub cells: Vec<MatrixCell>,
}

impl MatrixRow {
    pub fn span(&self) -> usize {
        self.cells.iter().map(|c| c.span).sum()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixCell {
    pub span: usize,
    #[serde(flatten)]
    pub content: CellContent,
}

impl MatrixCell {
    fn one(content: CellContent) -> Self {
        Self { span: 1, content }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "cell", rename_all = "camelCase")]
pub enum CellContent {
    #[serde(rename_all = "camelCase")]
    FixedHeader { label: String },
    #[serde(rename_all = "camelCase")]
    LearnerHeader {
        user_id: i64,
        name: String,
        profile_url: Option<String>,
        picture: bool,
        suspended_in: Vec<String>,
    },
    #[serde(rename_all = "camelCase")]
    Filler { position: Option<FillerPosition> },
    #[serde(rename_all = "camelCase")]
    CourseLink {
        course_id: i64,
        shortname: String,
        category_name: String,
        hidden: bool,
    },
    #[serde(rename_all = "camelCase")]
    Teachers { names: Vec<String> },
    #[serde(rename_all = "camelCase")]
    ItemName {
        item_id: i64,
        name: String,
        full_name: String,
        kind: ItemKind,
        hidden: bool,
        locked: bool,
    },
    Empty,
    #[serde(rename_all = "camelCase")]
    GradeMax { text: String },
    #[serde(rename_all = "camelCase")]
    Grade {
        user_id: i64,
        item_id: i64,
        display: DisplayValue,
        overridden: bool,
        excluded: bool,
        hidden: bool,
        pass: Option<bool>,
        total: Option<ItemKind>,
        feedback: Option<String>,
        suspended: bool,
    },
    #[serde(rename_all = "camelCase")]
    Absent { user_id: i64 },
}

/// Cuts `name` to at most `budget` characters on a word boundary and marks
/// the cut with an ellipsis.
pub fn shorten_name(name: &str, budget: usize) -> String {
    let name = name.trim();
    if name.chars().count() <= budget {
        return name.to_string();
    }
    let cut: String = name.chars().take(budget).collect();
    let next_is_space = name.chars().nth(budget).map(char::is_whitespace).unwrap_or(false);
    let kept = if next_is_space {
        cut.as_str()
    } else {
        match cut.rfind(char::is_whitespace) {
            Some(pos) if pos > 0 => &cut[..pos],
            _ => cut.as_str(),
        }
    };
    format!("{}{}", kept.trim_end(), ELLIPSIS)
}

fn header_row(scope: &ReportScope, config: &ReportConfig) -> MatrixRow {
    let mut cells: Vec<MatrixCell> = [HEADER_NAME, HEADER_TEACHERS, HEADER_GRADE_MAX]
        .iter()
        .map(|l| {
            MatrixCell::one(CellContent::FixedHeader {
                label: l.to_string(),
            })
        })
        .collect();
    for learner in &scope.learners {
        cells.push(MatrixCell::one(learner_header(learner, scope, config)));
    }
    MatrixRow {
        kind: RowKind::Header,
        course_id: None,
        item_id: None,
        depth: 0,
        cells,
    }
}

fn learner_header(learner: &Learner, scope: &ReportScope, config: &ReportConfig) -> CellContent {
    CellContent::LearnerHeader {
        user_id: learner.id,
        name: learner.full_name(),
        profile_url: config
            .viewer
            .can_view_profile_report
            .then(|| format!("/grade/report/user/index.php?userid={}", learner.id)),
        picture: config.show_user_image && learner.picture,
        suspended_in: scope.suspended_in(learner.id),
    }
}

/// Grades for one course, indexed for the walk.
struct CourseGrades {
    by_user: HashMap<i64, HashMap<i64, Grade>>,
    hiding: HashMap<i64, HidingAffected>,
}

impl CourseGrades {
    fn load<H: ReportHost + ?Sized>(
        host: &H,
        resolver: &dyn HidingAggregateResolver,
        tree: &GradeTree,
        learner_ids: &[i64],
        can_view_hidden: bool,
    ) -> Result<Self, ReportError> {
        let mut by_user: HashMap<i64, HashMap<i64, Grade>> = HashMap::new();
        for ((user_id, item_id), grade) in host.final_grades_for(tree.course_id(), learner_ids)? {
            by_user.entry(user_id).or_default().insert(item_id, grade);
        }
        // Placeholders so every (learner, item) pair has a grade record.
        for uid in learner_ids {
            let grades = by_user.entry(*uid).or_default();
            for it in tree.all_items() {
                grades
                    .entry(it.id)
                    .or_insert_with(|| Grade::placeholder(*uid, it.id));
            }
        }

        let mut hiding = HashMap::new();
        if !can_view_hidden {
            for uid in learner_ids {
                if let Some(grades) = by_user.get(uid) {
                    let affected = resolver.affected(grades, tree);
                    if !affected.is_empty() {
                        hiding.insert(*uid, affected);
                    }
                }
            }
        }
        Ok(Self { by_user, hiding })
    }
}

fn item_row(
    course: &Course,
    item: &GradeItem,
    depth: usize,
    scope: &ReportScope,
    grades: &CourseGrades,
    config: &ReportConfig,
) -> MatrixRow {
    let mut cells = Vec::with_capacity(FIXED_COLUMNS + scope.learners.len());
    cells.push(MatrixCell::one(CellContent::ItemName {
        item_id: item.id,
        name: shorten_name(&item.name, config.item_name_budget),
        full_name: item.name.clone(),
        kind: item.kind,
        hidden: item.hidden,
        locked: item.locked,
    }));
    cells.push(MatrixCell::one(CellContent::Empty));
    cells.push(MatrixCell::one(CellContent::GradeMax {
        text: calc::format_grade_max(item),
    }));

    let no_hiding = HidingAffected::default();
    for learner in &scope.learners {
        let participation = scope.participation(course.id, learner.id);
        if participation == Participation::Excluded {
            cells.push(MatrixCell::one(CellContent::Absent {
                user_id: learner.id,
            }));
            continue;
        }
        let placeholder;
        let grade = match grades.by_user.get(&learner.id).and_then(|g| g.get(&item.id)) {
            Some(g) => g,
            None => {
                placeholder = Grade::placeholder(learner.id, item.id);
                &placeholder
            }
        };
        let ctx = ResolveContext {
            can_view_hidden: config.viewer.can_view_hidden,
            hidden_as_date: config.hidden_as_date,
            hiding: grades.hiding.get(&learner.id).unwrap_or(&no_hiding),
        };
        let display = calc::resolve(grade, item, &ctx);
        let (pass, feedback) = match &display {
            DisplayValue::Value { value, .. } => {
                (calc::pass_state(*value, item), grade.feedback.clone())
            }
            _ => (None, None),
        };
        cells.push(MatrixCell::one(CellContent::Grade {
            user_id: learner.id,
            item_id: item.id,
            display,
            overridden: grade.overridden,
            excluded: grade.excluded,
            hidden: grade.is_hidden(item),
            pass,
            total: item.is_total().then_some(item.kind),
            feedback,
            suspended: participation == Participation::Suspended,
        }));
    }

    MatrixRow {
        kind: RowKind::Item,
        course_id: Some(course.id),
        item_id: Some(item.id),
        depth,
        cells,
    }
}

fn walk_course<H: ReportHost + ?Sized>(
    host: &H,
    resolver: &dyn HidingAggregateResolver,
    course: &Course,
    scope: &ReportScope,
    config: &ReportConfig,
    roster: &mut RosterCache,
    matrix: &mut ReportMatrix,
) -> Result<(), ReportError> {
    let tree = host.grade_tree(course, &config.collapsed)?;
    let learner_ids = scope.course_learner_ids(course.id);
    let grades = CourseGrades::load(
        host,
        resolver,
        &tree,
        &learner_ids,
        config.viewer.can_view_hidden,
    )?;
    let width = matrix.width;

    for level in tree.levels() {
        for node in level {
            let row = match node {
                GradeNode::Filler { depth, position } => MatrixRow {
                    kind: RowKind::Filler,
                    course_id: Some(course.id),
                    item_id: None,
                    depth: *depth,
                    cells: vec![MatrixCell {
                        span: width,
                        content: CellContent::Filler {
                            position: Some(*position),
                        },
                    }],
                },
                GradeNode::Category {
                    name,
                    depth,
                    hidden,
                    ..
                } => {
                    let names = roster
                        .teachers_for(host, course.id)?
                        .iter()
                        .map(|t| t.display_name())
                        .collect();
                    MatrixRow {
                        kind: RowKind::Category,
                        course_id: Some(course.id),
                        item_id: None,
                        depth: *depth,
                        cells: vec![
                            MatrixCell::one(CellContent::CourseLink {
                                course_id: course.id,
                                shortname: course.shortname.clone(),
                                category_name: name.clone(),
                                hidden: *hidden,
                            }),
                            MatrixCell::one(CellContent::Teachers { names }),
                            MatrixCell {
                                span: width - 2,
                                content: CellContent::Filler { position: None },
                            },
                        ],
                    }
                }
                GradeNode::Item { item_id, depth } => {
                    let Some(item) = tree.item(*item_id) else {
                        continue;
                    };
                    item_row(course, item, *depth, scope, &grades, config)
                }
            };
            matrix.push(row)?;
        }
    }

    debug!(
        course_id = course.id,
        items = tree.item_ids().len(),
        learners = learner_ids.len(),
        "walked course grade tree"
    );
    Ok(())
}

/// Lays every course of the scope out as transposed rows under a single
/// learner header row.
pub fn build_matrix<H: ReportHost + ?Sized>(
    host: &H,
    resolver: &dyn HidingAggregateResolver,
    scope: &ReportScope,
    config: &ReportConfig,
    roster: &mut RosterCache,
) -> Result<ReportMatrix, ReportError> {
    let mut matrix = ReportMatrix::new(scope.learners.len());
    matrix.push(header_row(scope, config))?;
    for course in &scope.courses {
        walk_course(host, resolver, course, scope, config, roster, &mut matrix)?;
    }
    Ok(matrix)
}
