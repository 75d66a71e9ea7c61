//! Dotted-numeric firmware version ordering.
//!
//! Device firmware versions are dotted numeric strings (`"2.1.0"`,
//! `"10.0.0"`, occasionally just `"2.1"`). Ordering compares numeric
//! components left to right; missing trailing components count as zero, so
//! `"2.1"` and `"2.1.0"` are equal. Plain string comparison is never used
//! anywhere in the update path -- it would rank `"9.0.0"` above `"10.0.0"`.

use std::cmp::Ordering;

/// Numeric value of one dotted component. Non-numeric junk counts as zero.
fn component(part: Option<&str>) -> u64 {
    part.and_then(|p| p.parse().ok()).unwrap_or(0)
}

/// Compare two dotted-numeric version strings.
pub fn cmp_versions(a: &str, b: &str) -> Ordering {
    let a_parts: Vec<&str> = a.split('.').collect();
    let b_parts: Vec<&str> = b.split('.').collect();

    for i in 0..a_parts.len().max(b_parts.len()) {
        let a_num = component(a_parts.get(i).copied());
        let b_num = component(b_parts.get(i).copied());
        match a_num.cmp(&b_num) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    Ordering::Equal
}

/// Whether `candidate` is strictly newer than `current`.
pub fn is_newer(candidate: &str, current: &str) -> bool {
    cmp_versions(candidate, current) == Ordering::Greater
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_versions() {
        assert_eq!(cmp_versions("1.0.0", "1.0.0"), Ordering::Equal);
    }

    #[test]
    fn missing_trailing_components_are_zero() {
        assert_eq!(cmp_versions("2.1", "2.1.0"), Ordering::Equal);
        assert_eq!(cmp_versions("2", "2.0.0"), Ordering::Equal);
        assert_eq!(cmp_versions("2.1", "2.1.1"), Ordering::Less);
    }

    #[test]
    fn multi_digit_components_compare_numerically() {
        // The lexical trap: "10.0.0" < "9.0.0" as strings.
        assert_eq!(cmp_versions("10.0.0", "9.0.0"), Ordering::Greater);
        assert!(is_newer("10.0.0", "9.0.0"));
        assert!(!is_newer("9.0.0", "10.0.0"));
    }

    #[test]
    fn first_differing_component_wins() {
        assert_eq!(cmp_versions("1.2.3", "1.3.0"), Ordering::Less);
        assert_eq!(cmp_versions("2.0.0", "1.9.9"), Ordering::Greater);
    }

    #[test]
    fn non_numeric_components_count_as_zero() {
        assert_eq!(cmp_versions("1.x.0", "1.0.0"), Ordering::Equal);
        assert_eq!(cmp_versions("beta", "0"), Ordering::Equal);
    }

    #[test]
    fn antisymmetric_on_samples() {
        let samples = ["1.0.0", "1.0.1", "2.1", "9.0.0", "10.0.0", "1.10.0"];
        for a in samples {
            for b in samples {
                assert_eq!(cmp_versions(a, b), cmp_versions(b, a).reverse());
            }
        }
    }

    #[test]
    fn transitive_on_samples() {
        let samples = ["0.9", "1.0.0", "1.0.1", "1.10.0", "2.1", "9.0.0", "10.0.0"];
        for a in samples {
            for b in samples {
                for c in samples {
                    if cmp_versions(a, b) == Ordering::Less && cmp_versions(b, c) == Ordering::Less
                    {
                        assert_eq!(cmp_versions(a, c), Ordering::Less, "{a} < {b} < {c}");
                    }
                }
            }
        }
    }

    #[test]
    fn strict_newness_excludes_equal() {
        assert!(!is_newer("1.0.0", "1.0.0"));
        assert!(!is_newer("2.1", "2.1.0"));
    }
}
