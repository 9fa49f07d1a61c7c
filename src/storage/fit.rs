/// Shrink `records` (newest first) until `estimate_size` fits in `budget`.
///
/// Drops from the tail, so the oldest record goes first. Returns an empty
/// vector when not even the newest record fits.
pub fn fit<T, F>(mut records: Vec<T>, estimate_size: F, budget: usize) -> Vec<T>
where
    F: Fn(&[T]) -> usize,
{
    while !records.is_empty() && estimate_size(&records) > budget {
        records.pop();
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    fn total_len(items: &[&str]) -> usize {
        items.iter().map(|s| s.len()).sum()
    }

    #[test]
    fn test_fit_keeps_everything_within_budget() {
        let records = vec!["dd", "cc", "bb"];
        assert_eq!(fit(records.clone(), total_len, 6), records);
    }

    #[test]
    fn test_fit_drops_oldest_first() {
        let records = vec!["dddd", "cc", "bbb"];
        assert_eq!(fit(records, total_len, 6), vec!["dddd", "cc"]);
    }

    #[test]
    fn test_fit_can_empty_the_set() {
        let records = vec!["too large", "x"];
        assert!(fit(records, total_len, 3).is_empty());
        assert!(fit(Vec::<&str>::new(), total_len, 0).is_empty());
    }
}
