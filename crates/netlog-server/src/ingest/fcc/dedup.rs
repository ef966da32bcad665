//! Keep-last batch deduplication
//!
//! A ULS dump may hold several revisions of the same licence inside one
//! batch window. Only the final revision is written, and writing more than
//! one row per key in a single `ON CONFLICT` statement is rejected by
//! Postgres ("command cannot affect row a second time").

use std::collections::HashSet;
use std::hash::Hash;

use super::parser::UlsRecord;

/// Collapse `items` so that only the last occurrence of each key survives.
///
/// Survivors keep their relative input order. Runs in O(n): the batch is
/// scanned from the back with a seen-key set and the survivors reversed.
pub fn dedup_keep_last_by<T, K, F>(items: Vec<T>, mut key: F) -> Vec<T>
where
    K: Eq + Hash,
    F: FnMut(&T) -> K,
{
    if items.len() < 2 {
        return items;
    }

    let mut seen = HashSet::with_capacity(items.len());
    let mut survivors: Vec<T> = items
        .into_iter()
        .rev()
        .filter(|item| seen.insert(key(item)))
        .collect();
    survivors.reverse();
    survivors
}

/// Deduplicate a batch of ULS records by their natural key
pub fn dedup_records<R: UlsRecord>(batch: Vec<R>) -> Vec<R> {
    dedup_keep_last_by(batch, R::natural_key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        k: &'static str,
        v: u32,
    }

    fn row(k: &'static str, v: u32) -> Row {
        Row { k, v }
    }

    #[test]
    fn test_keeps_last_and_preserves_order() {
        let input = vec![row("A", 1), row("B", 1), row("A", 2)];
        let output = dedup_keep_last_by(input, |r| r.k);
        assert_eq!(output, vec![row("B", 1), row("A", 2)]);
    }

    #[test]
    fn test_empty_batch_is_noop() {
        let output = dedup_keep_last_by(Vec::<Row>::new(), |r| r.k);
        assert!(output.is_empty());
    }

    #[test]
    fn test_no_duplicates_is_identity() {
        let input = vec![row("C", 1), row("A", 1), row("B", 1)];
        let output = dedup_keep_last_by(input.clone(), |r| r.k);
        assert_eq!(output, input);
    }

    #[test]
    fn test_many_revisions() {
        let input = vec![
            row("A", 1),
            row("A", 2),
            row("B", 1),
            row("A", 3),
            row("C", 1),
            row("B", 2),
        ];
        let output = dedup_keep_last_by(input, |r| r.k);
        assert_eq!(output, vec![row("A", 3), row("C", 1), row("B", 2)]);
    }
}
