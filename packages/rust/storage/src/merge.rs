//! Reconciliation of item lists by identity key.

use std::collections::{HashMap, HashSet};

use budgetlens_shared::Item;

/// Merge `incoming` into `cached`.
///
/// Items are keyed by `id`, falling back to `name`. For a key present on both
/// sides the incoming item replaces the cached one whole; fields are never
/// combined. Items with neither an id nor a name cannot be keyed and are
/// dropped. The result keeps first-appearance order, but callers must not
/// rely on it.
pub fn merge_items(cached: Vec<Item>, incoming: Vec<Item>) -> Vec<Item> {
    let mut merged: Vec<Item> = Vec::with_capacity(cached.len() + incoming.len());
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut dropped = 0usize;

    for item in cached.into_iter().chain(incoming) {
        let Some(key) = item.identity_key().map(str::to_owned) else {
            dropped += 1;
            continue;
        };
        match index.get(&key) {
            Some(&pos) => merged[pos] = item,
            None => {
                index.insert(key, merged.len());
                merged.push(item);
            }
        }
    }

    if dropped > 0 {
        tracing::debug!(dropped, "skipped items without id or name during merge");
    }
    merged
}

/// Collapse duplicate names, keeping the last occurrence of each.
///
/// Survivors stay in the relative order of their kept occurrences.
pub fn dedupe_by_name(items: Vec<Item>) -> Vec<Item> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut kept: Vec<Item> = items
        .into_iter()
        .rev()
        .filter(|item| seen.insert(item.name.clone()))
        .collect();
    kept.reverse();
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: Option<&str>, name: &str, score: Option<u8>) -> Item {
        Item {
            id: id.map(String::from),
            name: name.into(),
            order_path: None,
            score,
            category_codes: None,
            funding_source: None,
            parent_name: None,
        }
    }

    #[test]
    fn incoming_replaces_whole_item() {
        let mut cached = item(Some("1"), "A", Some(1));
        cached.funding_source = Some("13".into());
        let merged = merge_items(vec![cached], vec![item(Some("1"), "A", Some(9))]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].score, Some(9));
        // Full replacement: the cached funding source is not carried over.
        assert_eq!(merged[0].funding_source, None);
    }

    #[test]
    fn disjoint_keys_are_both_kept() {
        let merged = merge_items(
            vec![item(Some("1"), "", None)],
            vec![item(Some("2"), "", None)],
        );
        let ids: Vec<_> = merged.iter().map(|i| i.id.as_deref()).collect();
        assert_eq!(ids, vec![Some("1"), Some("2")]);
    }

    #[test]
    fn name_is_the_fallback_key() {
        let merged = merge_items(
            vec![item(None, "Chi khác", Some(3))],
            vec![item(None, "Chi khác", Some(8)), item(None, "", None)],
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].score, Some(8));
    }

    #[test]
    fn dedupe_keeps_later_occurrence() {
        let items = vec![
            item(Some("1"), "Chi sự nghiệp y tế", Some(4)),
            item(Some("2"), "Chi đào tạo", None),
            item(Some("3"), "Chi sự nghiệp y tế", Some(9)),
        ];
        let deduped = dedupe_by_name(items);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].id.as_deref(), Some("2"));
        assert_eq!(deduped[1].id.as_deref(), Some("3"));
        assert_eq!(deduped[1].score, Some(9));
    }
}
