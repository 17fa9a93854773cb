use crate::model::{Aggregation, GradeCategory, GradeItem, ItemKind};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

/// Per-viewer collapse preferences, kept beside the tree instead of being
/// written into its nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CollapsedState {
    /// Categories shown as their total only.
    pub aggregates_only: HashSet<i64>,
    /// Categories shown without their total.
    pub grades_only: HashSet<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CollapseMode {
    AggregatesOnly,
    GradesOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FillerPosition {
    First,
    Middle,
    Last,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GradeNode {
    #[serde(rename_all = "camelCase")]
    Category {
        category_id: i64,
        name: String,
        depth: usize,
        hidden: bool,
        is_root: bool,
        collapsed: Option<CollapseMode>,
    },
    #[serde(rename_all = "camelCase")]
    Item { item_id: i64, depth: usize },
    #[serde(rename_all = "camelCase")]
    Filler {
        depth: usize,
        position: FillerPosition,
    },
}

/// Immutable snapshot of one course's gradebook hierarchy, laid out in
/// level rows where every leaf ends up on the last level.
#[derive(Debug, Clone)]
pub struct GradeTree {
    course_id: i64,
    levels: Vec<Vec<GradeNode>>,
    items: HashMap<i64, GradeItem>,
    item_order: Vec<i64>,
    categories: HashMap<i64, GradeCategory>,
    root_id: i64,
    aggregation_inputs: HashMap<i64, Vec<i64>>,
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Category(i64),
    Item(i64),
}

struct Arena {
    slots: Vec<Slot>,
    children: Vec<Vec<usize>>,
}

impl Arena {
    fn push(&mut self, slot: Slot) -> usize {
        self.slots.push(slot);
        self.children.push(Vec::new());
        self.slots.len() - 1
    }
}

enum Pending {
    Node(usize),
    Filler {
        remaining: usize,
        target: usize,
        position: FillerPosition,
    },
}

const SYNTHETIC_ROOT_ID: i64 = 0;

impl GradeTree {
    pub fn build(
        course_id: i64,
        course_name: &str,
        categories: Vec<GradeCategory>,
        items: Vec<GradeItem>,
        collapsed: &CollapsedState,
    ) -> Self {
        let mut categories: HashMap<i64, GradeCategory> =
            categories.into_iter().map(|c| (c.id, c)).collect();

        let root_id = categories
            .values()
            .filter(|c| c.parent_id.is_none())
            .map(|c| c.id)
            .min()
            .unwrap_or_else(|| {
                categories.insert(
                    SYNTHETIC_ROOT_ID,
                    GradeCategory {
                        id: SYNTHETIC_ROOT_ID,
                        course_id,
                        parent_id: None,
                        name: course_name.to_string(),
                        aggregation: Aggregation::Mean,
                        hidden: false,
                        sortorder: 0,
                    },
                );
                SYNTHETIC_ROOT_ID
            });

        // Orphaned categories and items are reattached to the root.
        let mut parent_of: HashMap<i64, i64> = categories
            .values()
            .filter(|c| c.id != root_id)
            .map(|c| {
                let parent = match c.parent_id {
                    Some(p) if categories.contains_key(&p) => p,
                    _ => root_id,
                };
                (c.id, parent)
            })
            .collect();
        // So is any category whose parent chain loops instead of reaching it.
        let mut ids: Vec<i64> = parent_of.keys().copied().collect();
        ids.sort_unstable();
        for id in ids {
            let mut seen = HashSet::from([id]);
            let mut cur = parent_of[&id];
            while cur != root_id {
                if !seen.insert(cur) {
                    parent_of.insert(id, root_id);
                    break;
                }
                cur = parent_of[&cur];
            }
        }

        let mut sub_by_parent: HashMap<i64, Vec<(i64, i64)>> = HashMap::new();
        for (id, parent) in &parent_of {
            let sortorder = categories.get(id).map(|c| c.sortorder).unwrap_or_default();
            sub_by_parent
                .entry(*parent)
                .or_default()
                .push((sortorder, *id));
        }

        let mut items_by_cat: HashMap<i64, Vec<(i64, i64)>> = HashMap::new();
        let mut total_by_cat: HashMap<i64, i64> = HashMap::new();
        for it in &items {
            let cat = match it.category_id {
                Some(c) if categories.contains_key(&c) => c,
                _ => root_id,
            };
            if it.is_total() {
                let key = if it.kind == ItemKind::Course { root_id } else { cat };
                total_by_cat.entry(key).or_insert(it.id);
            } else {
                items_by_cat.entry(cat).or_default().push((it.sortorder, it.id));
            }
        }
        for v in sub_by_parent.values_mut() {
            v.sort();
        }
        for v in items_by_cat.values_mut() {
            v.sort();
        }

        // Aggregation inputs ignore collapse state: a total still sums
        // children that are not displayed.
        let mut aggregation_inputs: HashMap<i64, Vec<i64>> = HashMap::new();
        for (cat_id, total_id) in &total_by_cat {
            let mut inputs: Vec<(i64, i64)> = items_by_cat.get(cat_id).cloned().unwrap_or_default();
            for (sort, sub_id) in sub_by_parent.get(cat_id).into_iter().flatten() {
                if let Some(sub_total) = total_by_cat.get(sub_id) {
                    inputs.push((*sort, *sub_total));
                }
            }
            inputs.sort();
            aggregation_inputs.insert(*total_id, inputs.into_iter().map(|(_, id)| id).collect());
        }

        // Pre-order arena build with an explicit stack; children are mixed
        // items and subcategories ordered by sortorder, the total goes last.
        let mut arena = Arena {
            slots: Vec::new(),
            children: Vec::new(),
        };
        let root = arena.push(Slot::Category(root_id));
        let mut stack = vec![(root, root_id)];
        while let Some((node, cat_id)) = stack.pop() {
            let mut ordered: Vec<(i64, Slot)> = Vec::new();
            let mode = collapse_mode(collapsed, cat_id);
            if mode != Some(CollapseMode::AggregatesOnly) {
                for (sort, id) in items_by_cat.get(&cat_id).into_iter().flatten() {
                    ordered.push((*sort, Slot::Item(*id)));
                }
                for (sort, id) in sub_by_parent.get(&cat_id).into_iter().flatten() {
                    ordered.push((*sort, Slot::Category(*id)));
                }
                ordered.sort_by_key(|(sort, _)| *sort);
            }
            if mode != Some(CollapseMode::GradesOnly) {
                if let Some(total) = total_by_cat.get(&cat_id) {
                    ordered.push((i64::MAX, Slot::Item(*total)));
                }
            }
            for (_, slot) in ordered {
                let child = arena.push(slot);
                arena.children[node].push(child);
                if let Slot::Category(sub) = slot {
                    stack.push((child, sub));
                }
            }
        }

        // Children always have larger indices than their parent.
        let mut height = vec![1usize; arena.slots.len()];
        for idx in (0..arena.slots.len()).rev() {
            if let Some(max_child) = arena.children[idx].iter().map(|c| height[*c]).max() {
                height[idx] = max_child + 1;
            }
        }

        let mut levels: Vec<Vec<GradeNode>> = vec![Vec::new(); height[root]];
        let mut item_order: Vec<i64> = Vec::new();
        let mut queue: VecDeque<(Pending, usize)> = VecDeque::new();
        queue.push_back((Pending::Node(root), 0));
        while let Some((pending, depth)) = queue.pop_front() {
            match pending {
                Pending::Filler {
                    remaining,
                    target,
                    position,
                } => {
                    levels[depth].push(GradeNode::Filler { depth, position });
                    let next = if remaining > 1 {
                        Pending::Filler {
                            remaining: remaining - 1,
                            target,
                            position,
                        }
                    } else {
                        Pending::Node(target)
                    };
                    queue.push_back((next, depth + 1));
                }
                Pending::Node(idx) => match arena.slots[idx] {
                    Slot::Item(item_id) => {
                        levels[depth].push(GradeNode::Item { item_id, depth });
                        item_order.push(item_id);
                    }
                    Slot::Category(cat_id) => {
                        let cat = &categories[&cat_id];
                        levels[depth].push(GradeNode::Category {
                            category_id: cat_id,
                            name: cat.name.clone(),
                            depth,
                            hidden: cat.hidden,
                            is_root: cat_id == root_id,
                            collapsed: collapse_mode(collapsed, cat_id),
                        });
                        let kids = &arena.children[idx];
                        let child_height = height[idx] - 1;
                        for (i, child) in kids.iter().enumerate() {
                            let pad = child_height - height[*child];
                            if pad == 0 {
                                queue.push_back((Pending::Node(*child), depth + 1));
                                continue;
                            }
                            let position = if i == 0 {
                                FillerPosition::First
                            } else if i + 1 == kids.len() {
                                FillerPosition::Last
                            } else {
                                FillerPosition::Middle
                            };
                            queue.push_back((
                                Pending::Filler {
                                    remaining: pad,
                                    target: *child,
                                    position,
                                },
                                depth + 1,
                            ));
                        }
                    }
                },
            }
        }

        let items: HashMap<i64, GradeItem> = items.into_iter().map(|i| (i.id, i)).collect();
        Self {
            course_id,
            levels,
            items,
            item_order,
            categories,
            root_id,
            aggregation_inputs,
        }
    }

    pub fn course_id(&self) -> i64 {
        self.course_id
    }

    pub fn levels(&self) -> &[Vec<GradeNode>] {
        &self.levels
    }

    pub fn item(&self, item_id: i64) -> Option<&GradeItem> {
        self.items.get(&item_id)
    }

    /// Displayed items in column order; totals follow their inputs.
    pub fn item_ids(&self) -> &[i64] {
        &self.item_order
    }

    /// Every item of the course, displayed or collapsed away.
    pub fn all_items(&self) -> impl Iterator<Item = &GradeItem> {
        self.items.values()
    }

    pub fn aggregation_inputs(&self, total_item_id: i64) -> &[i64] {
        self.aggregation_inputs
            .get(&total_item_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Aggregation method of the category a total item belongs to.
    pub fn aggregation_for(&self, total_item_id: i64) -> Aggregation {
        self.items
            .get(&total_item_id)
            .and_then(|it| match it.kind {
                ItemKind::Course => self.categories.get(&self.root_id).map(|c| c.aggregation),
                _ => it
                    .category_id
                    .and_then(|c| self.categories.get(&c))
                    .map(|c| c.aggregation),
            })
            .unwrap_or(Aggregation::Mean)
    }

    /// Evaluation order where every total comes after the totals feeding it.
    pub fn evaluation_order(&self) -> Vec<i64> {
        let mut order: Vec<i64> = Vec::with_capacity(self.items.len());
        let mut seen: HashSet<i64> = HashSet::new();
        let mut leaves: Vec<&GradeItem> = self.items.values().filter(|i| !i.is_total()).collect();
        leaves.sort_by_key(|i| (i.kind == ItemKind::Calculated, i.sortorder, i.id));
        for it in leaves {
            seen.insert(it.id);
            order.push(it.id);
        }
        let mut totals: Vec<i64> = self
            .items
            .values()
            .filter(|i| i.is_total())
            .map(|i| i.id)
            .collect();
        totals.sort();
        while !totals.is_empty() {
            let before = totals.len();
            totals.retain(|t| {
                let ready = self
                    .aggregation_inputs(*t)
                    .iter()
                    .all(|i| seen.contains(i) || !self.items.contains_key(i));
                if ready {
                    seen.insert(*t);
                    order.push(*t);
                }
                !ready
            });
            if totals.len() == before {
                order.append(&mut totals);
            }
        }
        order
    }
}

fn collapse_mode(collapsed: &CollapsedState, cat_id: i64) -> Option<CollapseMode> {
    if collapsed.aggregates_only.contains(&cat_id) {
        Some(CollapseMode::AggregatesOnly)
    } else if collapsed.grades_only.contains(&cat_id) {
        Some(CollapseMode::GradesOnly)
    } else {
        None
    }
}
