use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cohort {
    pub id: i64,
    pub name: String,
    pub idnumber: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: i64,
    pub shortname: String,
    pub fullname: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Learner {
    pub id: i64,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub picture: bool,
}

impl Learner {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.firstname, self.lastname)
    }
}

/// Fixed ordering of the cross-course view: lastname, firstname, then id.
pub fn sort_learners(learners: &mut [Learner]) {
    learners.sort_by(|a, b| {
        a.lastname
            .cmp(&b.lastname)
            .then_with(|| a.firstname.cmp(&b.firstname))
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: i64,
    pub firstname: String,
    pub lastname: String,
    pub course_shortname: String,
}

impl Teacher {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.firstname, self.lastname)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Course,
    Category,
    Mod,
    Manual,
    Calculated,
}

impl ItemKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "course" => Some(ItemKind::Course),
            "category" => Some(ItemKind::Category),
            "mod" => Some(ItemKind::Mod),
            "manual" => Some(ItemKind::Manual),
            "calculated" => Some(ItemKind::Calculated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayType {
    Numeric,
    Percentage,
    Scale,
    Text,
}

impl DisplayType {
    pub fn as_str(self) -> &'static str {
        match self {
            DisplayType::Numeric => "numeric",
            DisplayType::Percentage => "percentage",
            DisplayType::Scale => "scale",
            DisplayType::Text => "text",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "numeric" => Some(DisplayType::Numeric),
            "percentage" => Some(DisplayType::Percentage),
            "scale" => Some(DisplayType::Scale),
            "text" => Some(DisplayType::Text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Mean,
    Median,
    Sum,
    Highest,
    Lowest,
}

impl Aggregation {
    pub fn as_str(self) -> &'static str {
        match self {
            Aggregation::Mean => "mean",
            Aggregation::Median => "median",
            Aggregation::Sum => "sum",
            Aggregation::Highest => "highest",
            Aggregation::Lowest => "lowest",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "mean" => Some(Aggregation::Mean),
            "median" => Some(Aggregation::Median),
            "sum" => Some(Aggregation::Sum),
            "highest" => Some(Aggregation::Highest),
            "lowest" => Some(Aggregation::Lowest),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeCategory {
    pub id: i64,
    pub course_id: i64,
    pub parent_id: Option<i64>,
    pub name: String,
    pub aggregation: Aggregation,
    pub hidden: bool,
    pub sortorder: i64,
}

/// One gradeable column. For `Course` and `Category` kinds `category_id`
/// is the category being totalled; for the others it is the containing
/// category.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeItem {
    pub id: i64,
    pub course_id: i64,
    pub category_id: Option<i64>,
    pub name: String,
    pub kind: ItemKind,
    pub grademin: f64,
    pub grademax: f64,
    pub gradepass: f64,
    pub decimals: u8,
    pub display_type: DisplayType,
    pub scale: Option<Vec<String>>,
    pub hidden: bool,
    pub locked: bool,
    pub needsupdate: bool,
    pub sortorder: i64,
    pub depends_on: Vec<i64>,
}

impl GradeItem {
    pub fn is_total(&self) -> bool {
        matches!(self.kind, ItemKind::Course | ItemKind::Category)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub user_id: i64,
    pub item_id: i64,
    pub finalgrade: Option<f64>,
    pub feedback: Option<String>,
    pub hidden: bool,
    pub excluded: bool,
    pub overridden: bool,
    pub time_submitted: Option<i64>,
}

impl Grade {
    /// Stand-in for a (user, item) pair the gradebook has no record for yet.
    pub fn placeholder(user_id: i64, item_id: i64) -> Self {
        Self {
            user_id,
            item_id,
            finalgrade: None,
            feedback: None,
            hidden: false,
            excluded: false,
            overridden: false,
            time_submitted: None,
        }
    }

    pub fn is_hidden(&self, item: &GradeItem) -> bool {
        self.hidden || item.hidden
    }
}
