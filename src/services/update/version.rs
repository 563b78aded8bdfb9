//! Version Comparison
//!
//! Dotted numeric comparison for registry versions. Manifest ranges such as
//! `^1.2.0` or `~1.2.0` are compared by their base version.

use std::cmp::Ordering;

/// Strip range operators and a leading `v`: `^1.2.0` → `1.2.0`.
pub fn base_version(value: &str) -> &str {
    value
        .trim()
        .trim_start_matches(|c: char| matches!(c, '^' | '~' | '=' | '>' | '<' | 'v' | ' '))
}

fn split_prerelease(value: &str) -> (&str, Option<&str>) {
    let value = value.split('+').next().unwrap_or(value);
    match value.split_once('-') {
        Some((core, pre)) => (core, Some(pre)),
        None => (value, None),
    }
}

pub fn parse_semver_like(value: &str) -> Vec<u64> {
    value
        .split('.')
        .map(|segment| {
            segment
                .chars()
                .take_while(|ch| ch.is_ascii_digit())
                .collect::<String>()
        })
        .map(|segment| segment.parse::<u64>().unwrap_or(0))
        .collect()
}

/// Pre-release tags compare identifier by identifier: numeric ones
/// numerically and below alphanumeric ones, a shorter tag below a longer one
/// it prefixes.
fn compare_prerelease(left: &str, right: &str) -> Ordering {
    let mut a = left.split('.');
    let mut b = right.split('.');
    loop {
        let ordering = match (a.next(), b.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) => match (l.parse::<u64>(), r.parse::<u64>()) {
                (Ok(ln), Ok(rn)) => ln.cmp(&rn),
                (Ok(_), Err(_)) => Ordering::Less,
                (Err(_), Ok(_)) => Ordering::Greater,
                (Err(_), Err(_)) => l.cmp(r),
            },
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
}

/// Compare two versions. A pre-release sorts below its release.
pub fn compare_versions(left: &str, right: &str) -> Ordering {
    let (left_core, left_pre) = split_prerelease(base_version(left));
    let (right_core, right_pre) = split_prerelease(base_version(right));

    let a = parse_semver_like(left_core);
    let b = parse_semver_like(right_core);
    for idx in 0..a.len().max(b.len()) {
        let av = *a.get(idx).unwrap_or(&0);
        let bv = *b.get(idx).unwrap_or(&0);
        match av.cmp(&bv) {
            Ordering::Equal => {}
            other => return other,
        }
    }

    match (left_pre, right_pre) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(l), Some(r)) => compare_prerelease(l, r),
    }
}

/// `latest` is strictly newer than `current`.
pub fn is_newer(latest: &str, current: &str) -> bool {
    compare_versions(latest, current) == Ordering::Greater
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_segments_compare_numerically() {
        assert!(is_newer("0.10.0", "0.9.9"));
        assert!(is_newer("1.0.1", "1.0.0"));
        assert!(!is_newer("1.0.0", "1.0.0"));
        assert!(!is_newer("0.9.0", "1.0.0"));
    }

    #[test]
    fn test_ranges_compare_by_base() {
        assert!(is_newer("1.3.0", "^1.2.0"));
        assert!(!is_newer("1.2.0", "~1.2.0"));
        assert_eq!(base_version("v2.0.0"), "2.0.0");
    }

    #[test]
    fn test_prerelease_sorts_below_release() {
        assert!(is_newer("1.0.0", "1.0.0-beta.1"));
        assert!(!is_newer("1.0.0-beta.1", "1.0.0"));
        assert!(is_newer("1.0.0-beta.2", "1.0.0-beta.1"));
    }

    #[test]
    fn test_prerelease_identifiers_compare_numerically() {
        assert!(is_newer("1.0.0-beta.10", "1.0.0-beta.2"));
        assert!(is_newer("1.0.0-rc.1", "1.0.0-beta.11"));
        assert!(is_newer("1.0.0-alpha.beta", "1.0.0-alpha.1"));
        assert!(is_newer("1.0.0-alpha.1", "1.0.0-alpha"));
        assert_eq!(compare_versions("1.0.0-beta.2", "1.0.0-beta.2"), Ordering::Equal);
    }

    #[test]
    fn test_missing_segments_are_zero() {
        assert_eq!(compare_versions("1.2", "1.2.0"), Ordering::Equal);
    }
}
