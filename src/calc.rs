use crate::hiding::HidingAffected;
use crate::model::{Aggregation, DisplayType, Grade, GradeItem};
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub const EMPTY_MARKER: &str = "-";
pub const ERROR_MARKER: &str = "Error";
const DATE_SUBMITTED_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Half-up rounding at `decimals` places, the way the host gradebook
/// rounds before display.
pub fn round_half_up(x: f64, decimals: u8) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    let scaled = x * factor;
    let rounded = if scaled >= 0.0 {
        (scaled + 0.5).floor()
    } else {
        (scaled - 0.5).ceil()
    };
    rounded / factor
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DisplayValue {
    Value { text: String, value: Option<f64> },
    Redacted { text: String },
    Error,
}

impl DisplayValue {
    pub fn text(&self) -> &str {
        match self {
            DisplayValue::Value { text, .. } | DisplayValue::Redacted { text } => text,
            DisplayValue::Error => ERROR_MARKER,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    pub can_view_hidden: bool,
    pub hidden_as_date: bool,
    pub hiding: &'a HidingAffected,
}

pub fn resolve(grade: &Grade, item: &GradeItem, ctx: &ResolveContext<'_>) -> DisplayValue {
    if !ctx.can_view_hidden && grade.is_hidden(item) {
        let text = match grade.time_submitted {
            Some(ts) if ctx.hidden_as_date && !item.is_total() => format_submitted(ts),
            _ => EMPTY_MARKER.to_string(),
        };
        return DisplayValue::Redacted { text };
    }

    if item.needsupdate {
        return DisplayValue::Error;
    }

    let value = if ctx.hiding.unknown.contains(&item.id) {
        None
    } else if let Some(altered) = ctx.hiding.altered.get(&item.id) {
        *altered
    } else {
        grade.finalgrade
    };

    DisplayValue::Value {
        text: format_grade_value(value, item),
        value,
    }
}

fn format_submitted(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format(DATE_SUBMITTED_FORMAT).to_string())
        .unwrap_or_else(|| EMPTY_MARKER.to_string())
}

pub fn format_grade_value(value: Option<f64>, item: &GradeItem) -> String {
    let Some(v) = value else {
        return EMPTY_MARKER.to_string();
    };
    match item.display_type {
        DisplayType::Text => EMPTY_MARKER.to_string(),
        DisplayType::Numeric => format_decimal(v, item.decimals),
        DisplayType::Percentage => {
            let range = item.grademax - item.grademin;
            if range <= 0.0 {
                return EMPTY_MARKER.to_string();
            }
            let pct = 100.0 * (v - item.grademin) / range;
            format!("{} %", format_decimal(pct, item.decimals))
        }
        DisplayType::Scale => scale_label(v, item).unwrap_or_else(|| EMPTY_MARKER.to_string()),
    }
}

fn scale_label(v: f64, item: &GradeItem) -> Option<String> {
    let labels = item.scale.as_ref()?;
    let idx = round_half_up(v, 0);
    if idx < 1.0 {
        return None;
    }
    labels.get(idx as usize - 1).cloned()
}

fn format_decimal(v: f64, decimals: u8) -> String {
    format!("{:.*}", decimals as usize, round_half_up(v, decimals))
}

/// Reference value shown in the grade-max column.
pub fn format_grade_max(item: &GradeItem) -> String {
    match item.display_type {
        DisplayType::Text => String::new(),
        DisplayType::Scale => item
            .scale
            .as_ref()
            .and_then(|labels| labels.last().cloned())
            .unwrap_or_else(|| EMPTY_MARKER.to_string()),
        DisplayType::Percentage => format!("{} %", format_decimal(100.0, item.decimals)),
        DisplayType::Numeric => format_decimal(item.grademax, item.decimals),
    }
}

pub fn format_range(item: &GradeItem) -> String {
    match item.display_type {
        DisplayType::Text => String::new(),
        DisplayType::Scale => {
            let labels = item.scale.as_deref().unwrap_or(&[]);
            match (labels.first(), labels.last()) {
                (Some(lo), Some(hi)) => format!("{}–{}", lo, hi),
                _ => EMPTY_MARKER.to_string(),
            }
        }
        _ => format!(
            "{}–{}",
            format_decimal(item.grademin, item.decimals),
            format_decimal(item.grademax, item.decimals)
        ),
    }
}

/// `Some(true)` for pass, `Some(false)` for fail, `None` when the item has
/// no pass mark or the grade is empty.
pub fn pass_state(value: Option<f64>, item: &GradeItem) -> Option<bool> {
    if item.gradepass <= 0.0 {
        return None;
    }
    value.map(|v| v >= item.gradepass)
}

pub fn compute_median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[(n / 2) - 1] + sorted[n / 2]) / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateInput {
    pub value: f64,
    pub grademin: f64,
    pub grademax: f64,
}

/// Combines child grades into a total on `target`'s range. Children are
/// normalised to 0..1 first, except for `Sum` which adds raw points.
pub fn aggregate(method: Aggregation, inputs: &[AggregateInput], target: &GradeItem) -> Option<f64> {
    if inputs.is_empty() {
        return None;
    }
    if method == Aggregation::Sum {
        let total: f64 = inputs.iter().map(|i| i.value).sum();
        return Some(total.clamp(target.grademin, target.grademax));
    }

    let normalised: Vec<f64> = inputs
        .iter()
        .map(|i| {
            let range = i.grademax - i.grademin;
            if range > 0.0 {
                ((i.value - i.grademin) / range).clamp(0.0, 1.0)
            } else {
                0.0
            }
        })
        .collect();

    let ratio = match method {
        Aggregation::Mean | Aggregation::Sum => {
            normalised.iter().sum::<f64>() / normalised.len() as f64
        }
        Aggregation::Median => compute_median(&normalised),
        Aggregation::Highest => normalised.iter().cloned().fold(f64::MIN, f64::max),
        Aggregation::Lowest => normalised.iter().cloned().fold(f64::MAX, f64::min),
    };
    Some(target.grademin + ratio * (target.grademax - target.grademin))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MeanSelection {
    #[default]
    Graded,
    All,
}

/// Column average over the supplied final grades. `All` counts empty
/// grades as grademin.
pub fn item_average(values: &[Option<f64>], item: &GradeItem, mean: MeanSelection) -> Option<f64> {
    let graded: Vec<f64> = values.iter().filter_map(|v| *v).collect();
    let (sum, count) = match mean {
        MeanSelection::Graded => (graded.iter().sum::<f64>(), graded.len()),
        MeanSelection::All => {
            let ungraded = values.len() - graded.len();
            (
                graded.iter().sum::<f64>() + ungraded as f64 * item.grademin,
                values.len(),
            )
        }
    };
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}
