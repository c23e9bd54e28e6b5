//! Tag maps and canonical identity keys.
//!
//! Tags are stored in a `BTreeMap` so iteration order is deterministic, and
//! shared behind an `Arc` once attached to a scope: a scope's tags are never
//! mutated after construction, so readers need no lock.

use std::collections::BTreeMap;
use std::sync::Arc;

/// Owned, ordered tag map.
pub type TagMap = BTreeMap<String, String>;

/// Immutable tag map shared by a scope and everything it reports.
pub type Tags = Arc<TagMap>;

/// Render the canonical identity for `prefix` plus `tags`.
///
/// Format: `prefix+k1=v1,k2=v2` with keys in ascending order. The `+` is
/// always present, so an untagged prefix never collides with a tagged one.
pub fn key_for_prefixed_string_map(prefix: &str, tags: &TagMap) -> String {
    let cap = prefix.len() + 1 + tags.iter().map(|(k, v)| k.len() + v.len() + 2).sum::<usize>();
    let mut key = String::with_capacity(cap);
    key.push_str(prefix);
    key.push('+');
    for (i, (k, v)) in tags.iter().enumerate() {
        if i > 0 {
            key.push(',');
        }
        key.push_str(k);
        key.push('=');
        key.push_str(v);
    }
    key
}

/// Right-biased merge: keys in `right` win on conflict.
///
/// When either side is empty the other `Arc` is returned as is.
pub fn merge_right_tags(left: &Tags, right: &Tags) -> Tags {
    if right.is_empty() {
        return Arc::clone(left);
    }
    if left.is_empty() {
        return Arc::clone(right);
    }

    let mut merged = TagMap::clone(left);
    for (k, v) in right.iter() {
        merged.insert(k.clone(), v.clone());
    }
    Arc::new(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        Arc::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn key_sorts_tags() {
        let t = tags(&[("zone", "a"), ("env", "prod")]);
        assert_eq!(key_for_prefixed_string_map("svc", &t), "svc+env=prod,zone=a");
    }

    #[test]
    fn key_without_tags_keeps_separator() {
        assert_eq!(key_for_prefixed_string_map("svc", &TagMap::new()), "svc+");
    }

    #[test]
    fn merge_prefers_right() {
        let merged = merge_right_tags(&tags(&[("env", "dev"), ("a", "1")]), &tags(&[("env", "prod")]));
        assert_eq!(merged.get("env").map(String::as_str), Some("prod"));
        assert_eq!(merged.get("a").map(String::as_str), Some("1"));
    }

    #[test]
    fn merge_reuses_non_empty_side() {
        let left = tags(&[("env", "prod")]);
        let empty = tags(&[]);
        assert!(Arc::ptr_eq(&merge_right_tags(&left, &empty), &left));
        assert!(Arc::ptr_eq(&merge_right_tags(&empty, &left), &left));
    }
}
