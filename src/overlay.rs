//! Reconcile a cached list with locally edited entries.
//!
//! Used for scores edited interactively: `overrides` holds the latest local
//! versions, `deleted` the keys removed locally but possibly still present in
//! the cached `base`.

use std::collections::HashSet;
use std::hash::Hash;

pub trait Keyed {
    type Key: Eq + Hash + Clone;

    fn key(&self) -> Self::Key;
}

/// Base items in order, each replaced by its override when one exists and
/// dropped when its key is deleted; overrides for keys not in `base` are
/// appended in their own order.
pub fn overlay_by_key<T>(base: &[T], overrides: &[T], deleted: &HashSet<T::Key>) -> Vec<T>
where
    T: Keyed + Clone,
{
    let mut used = HashSet::new();
    let mut out = Vec::with_capacity(base.len() + overrides.len());

    for item in base {
        let key = item.key();
        if deleted.contains(&key) {
            continue;
        }
        match overrides.iter().rev().find(|o| o.key() == key) {
            Some(replacement) => {
                out.push(replacement.clone());
                used.insert(key);
            }
            None => out.push(item.clone()),
        }
    }

    for item in overrides {
        let key = item.key();
        if deleted.contains(&key) || used.contains(&key) {
            continue;
        }
        // a key overridden twice keeps only its latest version
        if let Some(latest) = overrides.iter().rev().find(|o| o.key() == key) {
            out.push(latest.clone());
        }
        used.insert(key);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Score {
        id: &'static str,
        value: f64,
    }

    impl Keyed for Score {
        type Key = &'static str;

        fn key(&self) -> Self::Key {
            self.id
        }
    }

    fn s(id: &'static str, value: f64) -> Score {
        Score { id, value }
    }

    #[test]
    fn test_replace_delete_append() {
        let base = vec![s("a", 1.0), s("b", 2.0), s("c", 3.0)];
        let overrides = vec![s("b", 20.0), s("d", 4.0)];
        let deleted: HashSet<_> = ["c"].into_iter().collect();
        assert_eq!(
            overlay_by_key(&base, &overrides, &deleted),
            vec![s("a", 1.0), s("b", 20.0), s("d", 4.0)]
        );
    }

    #[test]
    fn test_latest_override_wins() {
        let base = vec![s("a", 1.0)];
        let overrides = vec![s("a", 2.0), s("n", 1.0), s("a", 3.0), s("n", 5.0)];
        assert_eq!(
            overlay_by_key(&base, &overrides, &HashSet::new()),
            vec![s("a", 3.0), s("n", 5.0)]
        );
    }

    #[test]
    fn test_deleted_override_not_appended() {
        let overrides = vec![s("x", 1.0)];
        let deleted: HashSet<_> = ["x"].into_iter().collect();
        assert!(overlay_by_key(&[], &overrides, &deleted).is_empty());
    }
}
