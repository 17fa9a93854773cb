use crate::calc::{self, AggregateInput};
use crate::host::HidingAggregateResolver;
use crate::model::{Grade, ItemKind};
use crate::tree::GradeTree;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Totals whose displayed value changes once hidden grades are taken out.
/// `altered` holds the recomputed value, `unknown` the items that cannot be
/// recomputed (calculated items depending on hidden grades).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HidingAffected {
    pub altered: HashMap<i64, Option<f64>>,
    pub unknown: HashSet<i64>,
}

impl HidingAffected {
    pub fn is_empty(&self) -> bool {
        self.altered.is_empty() && self.unknown.is_empty()
    }

    fn touches(&self, hidden: &HashSet<i64>, item_id: i64) -> bool {
        hidden.contains(&item_id)
            || self.altered.contains_key(&item_id)
            || self.unknown.contains(&item_id)
    }
}

/// Recomputes category and course totals for one learner with hidden
/// children left out.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecomputeHiding;

impl HidingAggregateResolver for RecomputeHiding {
    fn affected(&self, grades: &HashMap<i64, Grade>, tree: &GradeTree) -> HidingAffected {
        hiding_affected(grades, tree)
    }
}

pub fn hiding_affected(grades: &HashMap<i64, Grade>, tree: &GradeTree) -> HidingAffected {
    let mut out = HidingAffected::default();
    let mut hidden: HashSet<i64> = HashSet::new();

    for item_id in tree.evaluation_order() {
        let Some(item) = tree.item(item_id) else {
            continue;
        };
        let grade = grades.get(&item_id);
        let is_hidden = grade.map(|g| g.is_hidden(item)).unwrap_or(item.hidden);
        if is_hidden {
            hidden.insert(item_id);
            continue;
        }

        match item.kind {
            ItemKind::Course | ItemKind::Category => {
                let inputs = tree.aggregation_inputs(item_id);
                if !inputs.iter().any(|i| out.touches(&hidden, *i)) {
                    continue;
                }
                if item.needsupdate || grade.map(|g| g.overridden).unwrap_or(false) {
                    continue;
                }
                if inputs.iter().any(|i| out.unknown.contains(i)) {
                    out.unknown.insert(item_id);
                    continue;
                }

                let mut values: Vec<AggregateInput> = Vec::with_capacity(inputs.len());
                for input_id in inputs {
                    if hidden.contains(input_id) {
                        continue;
                    }
                    let Some(input_item) = tree.item(*input_id) else {
                        continue;
                    };
                    let input_grade = grades.get(input_id);
                    if input_grade.map(|g| g.excluded).unwrap_or(false) {
                        continue;
                    }
                    let value = match out.altered.get(input_id) {
                        Some(v) => *v,
                        None => input_grade.and_then(|g| g.finalgrade),
                    };
                    if let Some(value) = value {
                        values.push(AggregateInput {
                            value,
                            grademin: input_item.grademin,
                            grademax: input_item.grademax,
                        });
                    }
                }
                let recomputed = calc::aggregate(tree.aggregation_for(item_id), &values, item);
                out.altered.insert(item_id, recomputed);
            }
            ItemKind::Calculated => {
                if item.depends_on.iter().any(|d| out.touches(&hidden, *d)) {
                    out.unknown.insert(item_id);
                }
            }
            ItemKind::Mod | ItemKind::Manual => {}
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::tests::{category, item, nested_tree};
    use crate::tree::CollapsedState;

    fn grade(item_id: i64, value: f64) -> Grade {
        Grade {
            finalgrade: Some(value),
            ..Grade::placeholder(1, item_id)
        }
    }

    fn grades(list: Vec<Grade>) -> HashMap<i64, Grade> {
        list.into_iter().map(|g| (g.item_id, g)).collect()
    }

    #[test]
    fn nothing_hidden_means_nothing_affected() {
        let tree = nested_tree(&CollapsedState::default());
        let g = grades(vec![grade(1, 50.0), grade(2, 70.0), grade(3, 70.0), grade(4, 60.0)]);
        assert!(hiding_affected(&g, &tree).is_empty());
    }

    #[test]
    fn hidden_leaf_alters_the_whole_total_chain() {
        let tree = nested_tree(&CollapsedState::default());
        let mut essay = grade(2, 70.0);
        essay.hidden = true;
        let g = grades(vec![grade(1, 50.0), essay, grade(3, 70.0), grade(4, 60.0)]);

        let affected = hiding_affected(&g, &tree);
        // Essays total has no visible input left.
        assert_eq!(affected.altered.get(&3), Some(&None));
        // Course total falls back to the quiz alone.
        assert_eq!(affected.altered.get(&4), Some(&Some(50.0)));
        assert!(affected.unknown.is_empty());
    }

    #[test]
    fn overridden_total_keeps_its_value() {
        let tree = nested_tree(&CollapsedState::default());
        let mut quiz = grade(1, 50.0);
        quiz.hidden = true;
        let mut total = grade(4, 99.0);
        total.overridden = true;
        let g = grades(vec![quiz, grade(2, 70.0), grade(3, 70.0), total]);
        let affected = hiding_affected(&g, &tree);
        assert!(!affected.altered.contains_key(&4));
    }

    #[test]
    fn calculated_item_on_hidden_input_is_unknown() {
        let mut calc_item = item(5, Some(10), ItemKind::Calculated, "Bonus", 3);
        calc_item.depends_on = vec![1];
        let tree = GradeTree::build(
            1,
            "Biology",
            vec![category(10, None, "Biology", 0)],
            vec![
                item(1, Some(10), ItemKind::Mod, "Quiz", 1),
                calc_item,
                item(4, Some(10), ItemKind::Course, "Course total", 99),
            ],
            &CollapsedState::default(),
        );
        let mut quiz = grade(1, 50.0);
        quiz.hidden = true;
        let g = grades(vec![quiz, grade(5, 10.0), grade(4, 30.0)]);
        let affected = hiding_affected(&g, &tree);
        assert!(affected.unknown.contains(&5));
        // The course total depends on an unknown input.
        assert!(affected.unknown.contains(&4));
    }
}
