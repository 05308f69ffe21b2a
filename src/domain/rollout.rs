//! Deterministic percentage bucketing and the rollout presentation helpers built on it.

use serde::Serialize;

use crate::domain::error::DomainError;

/// Steps offered when walking a rollout up or down in the admin surface.
pub const ROLLOUT_STEPS: [u8; 6] = [0, 10, 25, 50, 75, 100];

/// A rollout percentage in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Percentage(u8);

impl Percentage {
    pub const ZERO: Percentage = Percentage(0);
    pub const FULL: Percentage = Percentage(100);

    pub fn new(value: i64) -> Result<Self, DomainError> {
        if validate_percentage(value) {
            Ok(Self(value as u8))
        } else {
            Err(DomainError::field(
                "percentage",
                "percentage must be an integer between 0 and 100",
            ))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i32> for Percentage {
    type Error = DomainError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::new(value.into())
    }
}

impl From<Percentage> for i32 {
    fn from(value: Percentage) -> Self {
        value.0.into()
    }
}

pub fn validate_percentage(value: i64) -> bool {
    (0..=100).contains(&value)
}

/// Decide whether `identity` falls inside a rollout of `percentage`.
///
/// Out-of-range percentages are never in rollout. `0` and `100` short-circuit; everything
/// else buckets on `string_hash(identity) % 100`.
pub fn is_in_rollout(identity: &str, percentage: i64) -> bool {
    if !validate_percentage(percentage) {
        return false;
    }
    match percentage {
        0 => false,
        100 => true,
        pct => i64::from(string_hash(identity) % 100) < pct,
    }
}

/// 32-bit multiplicative string hash over UTF-16 code units, folded to its absolute value.
///
/// Matches the `h = 31 * h + c` hash used by the browser and JVM clients, so every
/// consumer assigns an identity to the same bucket.
pub fn string_hash(identity: &str) -> u32 {
    identity
        .encode_utf16()
        .fold(0i32, |hash, unit| {
            hash.wrapping_mul(31).wrapping_add(i32::from(unit))
        })
        .unsigned_abs()
}

/// Number of users covered by `percentage` of `total_users`, rounded down.
pub fn affected_users(total_users: u64, percentage: Percentage) -> u64 {
    total_users.saturating_mul(u64::from(percentage.get())) / 100
}

pub fn status_text(percentage: Percentage, is_active: bool) -> String {
    if !is_active {
        return "Inactive".to_string();
    }
    match percentage.get() {
        0 => "Not Started".to_string(),
        100 => "Full Rollout".to_string(),
        pct => format!("{pct}% Rollout"),
    }
}

pub fn status_color(percentage: Percentage) -> &'static str {
    match percentage.get() {
        0 => "gray",
        1..=24 => "red",
        25..=49 => "yellow",
        50..=74 => "blue",
        _ => "green",
    }
}

/// Next step on the rollout ladder strictly above `current`.
pub fn next_step(current: Percentage) -> Percentage {
    ROLLOUT_STEPS
        .iter()
        .copied()
        .find(|step| *step > current.get())
        .map(Percentage)
        .unwrap_or(Percentage::FULL)
}

/// Previous step on the rollout ladder strictly below `current`.
pub fn previous_step(current: Percentage) -> Percentage {
    ROLLOUT_STEPS
        .iter()
        .rev()
        .copied()
        .find(|step| *step < current.get())
        .map(Percentage)
        .unwrap_or(Percentage::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pct(value: i64) -> Percentage {
        Percentage::new(value).expect("valid percentage")
    }

    #[test]
    fn hash_matches_reference_values() {
        assert_eq!(string_hash(""), 0);
        assert_eq!(string_hash("a"), 97);
        assert_eq!(string_hash("ab"), 97 * 31 + 98);
        // Wraps past i32::MAX like the 32-bit reference implementation.
        assert_eq!(string_hash("hello world"), 1_794_106_052);
    }

    #[test]
    fn hash_counts_utf16_code_units() {
        // U+1F600 is a surrogate pair: 0xD83D 0xDE00.
        let expected = (0xD83Di32).wrapping_mul(31).wrapping_add(0xDE00).unsigned_abs();
        assert_eq!(string_hash("\u{1F600}"), expected);
    }

    #[test]
    fn boundaries_short_circuit() {
        for identity in ["", "user-1", "someone@example.com"] {
            assert!(!is_in_rollout(identity, 0));
            assert!(is_in_rollout(identity, 100));
        }
    }

    #[test]
    fn out_of_range_is_never_in_rollout() {
        assert!(!is_in_rollout("user-1", -1));
        assert!(!is_in_rollout("user-1", 101));
    }

    #[test]
    fn bucketing_is_deterministic() {
        for pct in [1, 33, 50, 99] {
            let first = is_in_rollout("user-42", pct);
            for _ in 0..10 {
                assert_eq!(is_in_rollout("user-42", pct), first);
            }
        }
    }

    #[test]
    fn bucketing_is_monotonic_in_percentage() {
        for n in 0..500 {
            let identity = format!("user-{n}");
            let mut seen_in = false;
            for pct in 0..=100 {
                let inside = is_in_rollout(&identity, pct);
                assert!(!seen_in || inside, "{identity} left rollout at {pct}%");
                seen_in |= inside;
            }
        }
    }

    #[test]
    fn distribution_tracks_percentage() {
        for target in [10i64, 50, 90] {
            let inside = (0..10_000)
                .filter(|n| is_in_rollout(&format!("user-{n}"), target))
                .count() as i64;
            let expected = target * 100;
            assert!(
                (inside - expected).abs() <= 500,
                "{target}%: {inside} of 10000 in rollout"
            );
        }
    }

    #[test]
    fn percentage_rejects_out_of_range() {
        assert!(Percentage::new(-1).is_err());
        assert!(Percentage::new(101).is_err());
        assert_eq!(Percentage::try_from(55).unwrap().get(), 55);
    }

    #[test]
    fn affected_users_rounds_down() {
        assert_eq!(affected_users(1000, pct(25)), 250);
        assert_eq!(affected_users(7, pct(50)), 3);
        assert_eq!(affected_users(0, pct(100)), 0);
    }

    #[test]
    fn status_text_and_color() {
        assert_eq!(status_text(pct(40), false), "Inactive");
        assert_eq!(status_text(pct(0), true), "Not Started");
        assert_eq!(status_text(pct(100), true), "Full Rollout");
        assert_eq!(status_text(pct(25), true), "25% Rollout");

        assert_eq!(status_color(pct(0)), "gray");
        assert_eq!(status_color(pct(10)), "red");
        assert_eq!(status_color(pct(25)), "yellow");
        assert_eq!(status_color(pct(60)), "blue");
        assert_eq!(status_color(pct(75)), "green");
    }

    #[test]
    fn ladder_steps() {
        assert_eq!(next_step(pct(0)).get(), 10);
        assert_eq!(next_step(pct(10)).get(), 25);
        assert_eq!(next_step(pct(30)).get(), 50);
        assert_eq!(next_step(pct(100)).get(), 100);

        assert_eq!(previous_step(pct(100)).get(), 75);
        assert_eq!(previous_step(pct(30)).get(), 25);
        assert_eq!(previous_step(pct(10)).get(), 0);
        assert_eq!(previous_step(pct(0)).get(), 0);
    }
}
