//! Frequent item-pair counting.
//!
//! Each input record is a basket: an id, a comma, then whitespace-separated items, optionally
//! wrapped in square brackets (`17,[bread milk eggs]`). The mapper emits every unordered pair
//! of items in the basket with a count of 1, the optional [`combiner`] sums counts on the map
//! side, and the reducer emits the pair key when the pair occurred in at least `threshold`
//! baskets.

use thiserror::Error;

use crate::error::PluginResult;
use crate::processing::{MapEmitter, ReduceEmitter};
use crate::types::Record;

/// Threshold used by the command-line tool when none is given: pairs seen more than 650 times.
pub const DEFAULT_THRESHOLD: usize = 651;

/// A basket line that has text but no `id,items` separator.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("malformed basket: expected '<id>,<items>', got {text:?}")]
pub struct MalformedBasket {
    pub text: String,
}

/// Split a basket line into its items.
///
/// Blank lines hold no items. Items keep their original spelling and duplicates are kept.
pub fn parse_items(text: &str) -> Result<Vec<&str>, MalformedBasket> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let items = text.split(',').nth(1).ok_or_else(|| MalformedBasket {
        text: text.to_string(),
    })?;
    Ok(items
        .split(|c: char| c.is_whitespace() || c == '[' || c == ']')
        .filter(|item| !item.is_empty())
        .collect())
}

/// Key for an unordered pair: the two items in lexical order, joined by `/`.
pub fn pair_key(a: &str, b: &str) -> String {
    if a < b {
        format!("{a}/{b}")
    } else {
        format!("{b}/{a}")
    }
}

/// Emit `(pair_key, 1)` for every pair of item positions `i < j` in the basket.
pub fn mapper(record: &Record, emit: &mut MapEmitter<'_, u32>) -> PluginResult {
    let items = parse_items(&record.text)?;
    for (i, a) in items.iter().enumerate() {
        for b in &items[i + 1..] {
            emit.emit(pair_key(a, b), 1);
        }
    }
    Ok(())
}

/// Collapse one chunk's counts for a pair into their sum.
pub fn combiner(_pair: &str, counts: Vec<u32>) -> Vec<u32> {
    vec![counts.iter().sum()]
}

/// Reducer emitting the pair key when its summed count is at least `threshold`.
pub fn reducer(
    threshold: usize,
) -> impl Fn(&str, Vec<u32>, &mut ReduceEmitter<'_, String>) -> PluginResult + Send + Sync {
    move |key, counts, emit| {
        let total: u64 = counts.iter().map(|&c| u64::from(c)).sum();
        if total >= threshold as u64 {
            emit.emit(key.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::{Job, JobOptions};

    #[test]
    fn parses_bracketed_and_bare_baskets() {
        assert_eq!(parse_items("1,[bread milk eggs]").unwrap(), vec!["bread", "milk", "eggs"]);
        assert_eq!(parse_items("2, bread  milk ]").unwrap(), vec!["bread", "milk"]);
        assert_eq!(parse_items("3,[]").unwrap(), Vec::<&str>::new());
    }

    #[test]
    fn blank_line_has_no_items() {
        assert!(parse_items("").unwrap().is_empty());
        assert!(parse_items("   \t").unwrap().is_empty());
    }

    #[test]
    fn line_without_separator_is_malformed() {
        let err = parse_items("bread milk").unwrap_err();
        assert_eq!(err.text, "bread milk");
    }

    #[test]
    fn pair_key_is_order_independent() {
        assert_eq!(pair_key("milk", "bread"), "bread/milk");
        assert_eq!(pair_key("bread", "milk"), "bread/milk");
        assert_eq!(pair_key("eggs", "eggs"), "eggs/eggs");
    }

    fn run(lines: &[&str], threshold: usize) -> Vec<String> {
        Job::new(mapper, reducer(threshold))
            .with_options(JobOptions::with_workers(2))
            .run_records(Record::from_lines(lines.iter().copied()))
            .unwrap()
            .into_values()
    }

    #[test]
    fn pairs_above_threshold_are_reported() {
        let out = run(&["1,[bread milk eggs]", "2,[bread milk]", "3,[bread eggs milk]"], 2);
        assert_eq!(out, vec!["bread/eggs", "bread/milk", "eggs/milk"]);
    }

    #[test]
    fn threshold_is_inclusive() {
        let out = run(&["1,[a b]", "2,[a b]", "3,[a c]"], 3);
        assert!(out.is_empty());
        let out = run(&["1,[a b]", "2,[a b]", "3,[a c]"], 2);
        assert_eq!(out, vec!["a/b"]);
    }

    #[test]
    fn default_threshold_means_more_than_650() {
        let mut baskets = vec!["x,[a b]"; 650];
        assert!(run(&baskets, DEFAULT_THRESHOLD).is_empty());
        baskets.push("x,[b a]");
        assert_eq!(run(&baskets, DEFAULT_THRESHOLD), vec!["a/b"]);
    }

    #[test]
    fn small_baskets_emit_nothing() {
        let out = run(&["1,[]", "2,[bread]", ""], 1);
        assert!(out.is_empty());
    }

    #[test]
    fn combiner_sums_counts() {
        assert_eq!(combiner("a/b", vec![1, 1, 1]), vec![3]);
        assert_eq!(combiner("a/b", vec![2, 5]), vec![7]);
    }

    #[test]
    fn combined_run_matches_plain_run() {
        let lines = ["1,[a b c]", "2,[a b]", "3,[b c]", "4,[a b c]", "5,[c a]"];
        let plain = run(&lines, 3);

        let mut job = Job::new(mapper, reducer(3))
            .with_combiner(combiner)
            .with_options(JobOptions {
                chunk_size: 2,
                ..JobOptions::with_workers(2)
            });
        let combined = job.run_records(Record::from_lines(lines)).unwrap().into_values();
        assert_eq!(combined, plain);
        assert_eq!(combined, vec!["a/b", "a/c", "b/c"]);
    }

    #[test]
    fn malformed_basket_fails_the_job() {
        let err = Job::new(mapper, reducer(0))
            .run_records(Record::from_lines(["1,[a b]", "oops"]))
            .unwrap_err();
        assert_eq!(err.exit_code(), 4);
        assert!(err.to_string().contains("malformed basket"));
    }
}
