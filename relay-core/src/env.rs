//! Environment variable merging
//!
//! Stage-level variables shadow pipeline defaults. The merged map is ordered so
//! flags built from it come out the same way on every run.

use std::collections::{BTreeMap, HashMap};

/// Merges `overrides` on top of `defaults` without touching either
pub fn merge(
    defaults: &HashMap<String, String>,
    overrides: &HashMap<String, String>,
) -> BTreeMap<String, String> {
    defaults
        .iter()
        .chain(overrides.iter())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_override_wins() {
        let defaults = map(&[("YEAR", "2020"), ("COURT", "trt13")]);
        let overrides = map(&[("YEAR", "2021"), ("MONTH", "3")]);

        let merged = merge(&defaults, &overrides);

        assert_eq!(merged.len(), 3);
        assert_eq!(merged["YEAR"], "2021");
        assert_eq!(merged["COURT"], "trt13");
        assert_eq!(merged["MONTH"], "3");
    }

    #[test]
    fn test_inputs_untouched() {
        let defaults = map(&[("A", "1"), ("B", "2")]);
        let overrides = map(&[("B", "3")]);
        let (d, o) = (defaults.clone(), overrides.clone());

        let _ = merge(&defaults, &overrides);

        assert_eq!(defaults, d);
        assert_eq!(overrides, o);
    }

    #[test]
    fn test_sorted_keys() {
        let defaults = map(&[("ZED", "z"), ("ALPHA", "a")]);
        let overrides = map(&[("MID", "m")]);

        let keys: Vec<_> = merge(&defaults, &overrides).into_keys().collect();
        assert_eq!(keys, vec!["ALPHA", "MID", "ZED"]);
    }

    #[test]
    fn test_empty_sides() {
        let empty = HashMap::new();
        let defaults = map(&[("A", "1")]);
        assert_eq!(merge(&defaults, &empty)["A"], "1");
        assert_eq!(merge(&empty, &defaults)["A"], "1");
        assert!(merge(&empty, &empty).is_empty());
    }
}
