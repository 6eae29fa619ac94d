//! Order-path assignment from an ordinal label column.
//!
//! Outline labels (`A`, `II`, `2.6.1`, `a`, `+`) are folded row by row into a
//! small state machine of per-level counters. Each step is a pure function of
//! the previous state and the row's label, so the same label column always
//! yields the same paths.

use std::collections::{HashMap, HashSet};

use tracing::{debug, instrument};

use budgetlens_shared::Item;

/// Deepest outline level tracked. Labels that would go deeper get no path.
pub const MAX_DEPTH: usize = 10;

/// Level of single uppercase letters (`A`, `B`).
const PART_LEVEL: usize = 0;
/// Level of multi-letter uppercase labels (`II`, `III`).
const SECTION_LEVEL: usize = 1;
/// Level of lowercase letters (`a`, `b`).
const LETTER_LEVEL: usize = 3;

/// What a label says about its row's position.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LabelKind {
    Part,
    Section,
    /// Dot-delimited numbers; the value is every segment.
    Numbered(Vec<u32>),
    Letter,
    /// Bullet symbols and blank cells: one level below the current row.
    Bullet,
    Unrecognized,
}

fn classify_label(raw: &str) -> LabelKind {
    let label = raw.trim();
    if label.is_empty() || label.eq_ignore_ascii_case("n/a") || matches!(label, "+" | "-" | "*")
    {
        return LabelKind::Bullet;
    }

    let label = label.trim_end_matches(['.', ')']);
    if label.is_empty() {
        return LabelKind::Unrecognized;
    }

    if label.chars().all(char::is_alphabetic) {
        if label.chars().all(char::is_uppercase) {
            return if label.chars().count() == 1 {
                LabelKind::Part
            } else {
                LabelKind::Section
            };
        }
        if label.chars().all(char::is_lowercase) {
            return LabelKind::Letter;
        }
        return LabelKind::Unrecognized;
    }

    let segments: Option<Vec<u32>> = label
        .split('.')
        .map(|seg| {
            if !seg.is_empty() && seg.chars().all(|c| c.is_ascii_digit()) {
                seg.parse().ok()
            } else {
                None
            }
        })
        .collect();
    segments.map_or(LabelKind::Unrecognized, LabelKind::Numbered)
}

/// Counters carried from row to row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HierarchyState {
    counters: [u32; MAX_DEPTH],
    /// Level of the last labeled (non-bullet) row.
    current_level: Option<usize>,
    /// Level at which bare numbers (`1`, `2`) sit: one below the most recent
    /// uppercase label, or the top level when none has been seen.
    numeric_base: usize,
}

impl HierarchyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one label into the state, returning the next state and the row's
    /// path (`None` when the label carries no hierarchy).
    pub fn step(&self, label: &str) -> (Self, Option<String>) {
        let kind = classify_label(label);
        let mut next = self.clone();
        let level = match &kind {
            LabelKind::Part => next.increment(PART_LEVEL),
            LabelKind::Section => next.increment(SECTION_LEVEL),
            LabelKind::Letter => next.increment(LETTER_LEVEL),
            LabelKind::Bullet => next.increment(self.current_level.map_or(0, |l| l + 1)),
            LabelKind::Numbered(segments) => match segments.last() {
                Some(&last) => next.set(self.numeric_base + segments.len() - 1, last),
                None => None,
            },
            LabelKind::Unrecognized => None,
        };

        let Some(level) = level else {
            return (self.clone(), None);
        };

        match kind {
            LabelKind::Part | LabelKind::Section => {
                next.numeric_base = level + 1;
                next.current_level = Some(level);
            }
            // Consecutive bullets are siblings under the last labeled row.
            LabelKind::Bullet => {}
            _ => next.current_level = Some(level),
        }

        let path = next.path_to(level);
        (next, Some(path))
    }

    fn increment(&mut self, level: usize) -> Option<usize> {
        if level >= MAX_DEPTH {
            return None;
        }
        self.counters[level] += 1;
        self.reset_below(level);
        Some(level)
    }

    fn set(&mut self, level: usize, value: u32) -> Option<usize> {
        if level >= MAX_DEPTH {
            return None;
        }
        self.counters[level] = value;
        self.reset_below(level);
        Some(level)
    }

    fn reset_below(&mut self, level: usize) {
        for counter in &mut self.counters[level + 1..] {
            *counter = 0;
        }
    }

    fn path_to(&self, level: usize) -> String {
        let joined = self.counters[..=level]
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join("/");
        format!("/{joined}/")
    }
}

/// Compute the order path of every row from its label, in row order.
#[instrument(skip_all)]
pub fn assign_order_paths<'a>(labels: impl IntoIterator<Item = &'a str>) -> Vec<Option<String>> {
    let mut state = HierarchyState::new();
    let paths: Vec<Option<String>> = labels
        .into_iter()
        .map(|label| {
            let (next, path) = state.step(label);
            state = next;
            path
        })
        .collect();
    debug!(
        rows = paths.len(),
        assigned = paths.iter().filter(|p| p.is_some()).count(),
        "order paths assigned"
    );
    paths
}

/// Every strict-prefix path of `path`, shallowest first.
///
/// `/2/6/1/` yields `/2/` and `/2/6/`.
pub fn ancestor_paths(path: &str) -> Vec<String> {
    let segments: Vec<&str> = path.trim_matches('/').split('/').filter(|s| !s.is_empty()).collect();
    (1..segments.len())
        .map(|n| format!("/{}/", segments[..n].join("/")))
        .collect()
}

/// Ancestors of the item at `path` that exist in `items`, shallowest first.
///
/// Missing levels are skipped, not reported.
pub fn find_ancestors<'a>(items: &'a [Item], path: &str) -> Vec<&'a Item> {
    let by_path: HashMap<&str, &Item> = items
        .iter()
        .filter_map(|item| item.order_path.as_deref().map(|p| (p, item)))
        .collect();
    ancestor_paths(path)
        .iter()
        .filter_map(|prefix| by_path.get(prefix.as_str()).copied())
        .collect()
}

/// Keep items scoring at least `threshold` plus every ancestor of theirs
/// found by order path, in the original order.
pub fn retain_with_ancestors(items: Vec<Item>, threshold: u8) -> Vec<Item> {
    let mut keep: HashSet<usize> = HashSet::new();
    let mut index_by_path: HashMap<&str, usize> = HashMap::new();
    for (idx, item) in items.iter().enumerate() {
        if let Some(path) = item.order_path.as_deref() {
            index_by_path.entry(path).or_insert(idx);
        }
    }

    for (idx, item) in items.iter().enumerate() {
        if item.score_or_unknown() < threshold {
            continue;
        }
        keep.insert(idx);
        if let Some(path) = item.order_path.as_deref() {
            keep.extend(
                ancestor_paths(path)
                    .iter()
                    .filter_map(|prefix| index_by_path.get(prefix.as_str()).copied()),
            );
        }
    }

    items
        .into_iter()
        .enumerate()
        .filter(|(idx, _)| keep.contains(idx))
        .map(|(_, item)| item)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(labels: &[&str]) -> Vec<Option<String>> {
        assign_order_paths(labels.iter().copied())
    }

    fn some(values: &[&str]) -> Vec<Option<String>> {
        values.iter().map(|v| Some(v.to_string())).collect()
    }

    #[test]
    fn mixed_outline_example() {
        assert_eq!(
            paths(&["A", "1", "1.1", "a", "+", "2"]),
            some(&["/1/", "/1/1/", "/1/1/1/", "/1/1/1/1/", "/1/1/1/1/1/", "/1/2/"])
        );
    }

    #[test]
    fn numeric_labels_without_parts_start_at_top() {
        assert_eq!(
            paths(&["1", "2", "2.6", "2.6.1", "2.6.2", "3"]),
            some(&["/1/", "/2/", "/2/6/", "/2/6/1/", "/2/6/2/", "/3/"])
        );
    }

    #[test]
    fn sections_nest_under_parts() {
        assert_eq!(
            paths(&["A", "II", "1", "B", "1"]),
            some(&["/1/", "/1/1/", "/1/1/1/", "/2/", "/2/1/"])
        );
    }

    #[test]
    fn bullets_and_blanks_are_children_of_last_labeled_row() {
        assert_eq!(
            paths(&["1", "-", "", "N/A", "2", "*"]),
            some(&["/1/", "/1/1/", "/1/2/", "/1/3/", "/2/", "/2/1/"])
        );
    }

    #[test]
    fn bullet_before_any_label_is_top_level() {
        assert_eq!(paths(&["+", "+"]), some(&["/1/", "/2/"]));
    }

    #[test]
    fn trailing_punctuation_is_ignored() {
        assert_eq!(paths(&["1.", "a)"]), some(&["/1/", "/1/0/0/1/"]));
    }

    #[test]
    fn unrecognized_labels_get_no_path_and_keep_state() {
        assert_eq!(
            paths(&["1", "Ghi chú", "1.2"]),
            vec![Some("/1/".into()), None, Some("/1/2/".into())]
        );
        assert_eq!(paths(&["x1"]), vec![None]);
    }

    #[test]
    fn too_deep_labels_get_no_path() {
        assert_eq!(paths(&["1.2.3.4.5.6.7.8.9.10.11"]), vec![None]);
    }

    #[test]
    fn assignment_is_idempotent() {
        let labels = ["A", "I", "1", "1.1", "-", "a", "b", "2", "", "B", "1"];
        assert_eq!(paths(&labels), paths(&labels));
    }

    #[test]
    fn ancestor_paths_are_strict_prefixes() {
        assert_eq!(ancestor_paths("/2/6/1/"), vec!["/2/", "/2/6/"]);
        assert!(ancestor_paths("/2/").is_empty());
        assert!(ancestor_paths("").is_empty());
    }

    fn at(name: &str, path: &str, score: u8) -> Item {
        let mut item = Item::new(name);
        item.order_path = Some(path.into());
        item.score = Some(score);
        item
    }

    #[test]
    fn ancestor_lookup_skips_missing_levels() {
        let items = vec![at("Part", "/2/", 3), at("Leaf", "/2/6/1/", 9)];
        let ancestors = find_ancestors(&items, "/2/6/1/");
        assert_eq!(ancestors.len(), 1);
        assert_eq!(ancestors[0].name, "Part");
    }

    #[test]
    fn retain_keeps_qualifying_items_and_ancestors() {
        let items = vec![
            at("Chi sự nghiệp giáo dục", "/1/", 4),
            at("Chi giáo dục tiểu học", "/1/1/", 5),
            at("Chi lương giáo viên", "/1/1/1/", 9),
            at("Chi sự nghiệp y tế", "/2/", 3),
        ];
        let kept = retain_with_ancestors(items, 7);
        let names: Vec<&str> = kept.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Chi sự nghiệp giáo dục",
                "Chi giáo dục tiểu học",
                "Chi lương giáo viên"
            ]
        );
    }
}
