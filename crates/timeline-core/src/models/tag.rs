//! Tag normalization
//!
//! Tags relate to notes by value: a note carries the set of tag names and
//! there is no separate tag object graph.

use std::collections::BTreeSet;

/// Normalize user-entered tags.
///
/// Names are trimmed and lower-cased; empty names are dropped and duplicates
/// collapse. The result iterates in sorted order.
pub fn normalize_tags<I, S>(input: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    input
        .into_iter()
        .map(|name| name.as_ref().trim().to_lowercase())
        .filter(|name| !name.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_lowercases_and_trims() {
        let tags = normalize_tags(["  Work ", "HOME"]);
        assert_eq!(
            tags.into_iter().collect::<Vec<_>>(),
            vec!["home".to_string(), "work".to_string()]
        );
    }

    #[test]
    fn test_normalize_drops_empty_and_duplicates() {
        let tags = normalize_tags(["work", " ", "Work", "", "WORK"]);
        assert_eq!(tags.len(), 1);
        assert!(tags.contains("work"));
    }
}
