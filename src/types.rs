use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Metric value shown for unreachable destinations, as RIPng does.
pub const RIPNG_INFINITY: u32 = 16;

/// Cumulative path cost. `Infinite` marks an unreachable destination and
/// compares greater than every finite cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Finite(u32),
    Infinite,
}

impl Metric {
    pub fn is_infinite(&self) -> bool {
        matches!(self, Metric::Infinite)
    }

    pub fn value(&self) -> Option<u32> {
        match self {
            Metric::Finite(cost) => Some(*cost),
            Metric::Infinite => None,
        }
    }

    /// Distance-vector relaxation step. Infinity absorbs, overflow saturates
    /// to infinity instead of wrapping.
    pub fn saturating_add(self, other: Metric) -> Metric {
        match (self, other) {
            (Metric::Finite(a), Metric::Finite(b)) => {
                a.checked_add(b).map_or(Metric::Infinite, Metric::Finite)
            }
            _ => Metric::Infinite,
        }
    }

    /// Value used in table output: the cost, or 16 when unreachable.
    ///
    /// A finite cost of 16 or more prints the same way, so callers that
    /// need to tell the two apart check [`Metric::is_infinite`] (the text
    /// table does so in its lifetime column, which shows `∞` only for
    /// unreachable routes).
    pub fn display_value(&self) -> u32 {
        self.value().unwrap_or(RIPNG_INFINITY)
    }
}

impl From<u32> for Metric {
    fn from(cost: u32) -> Self {
        Metric::Finite(cost)
    }
}

impl Ord for Metric {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Metric::Finite(a), Metric::Finite(b)) => a.cmp(b),
            (Metric::Finite(_), Metric::Infinite) => Ordering::Less,
            (Metric::Infinite, Metric::Finite(_)) => Ordering::Greater,
            (Metric::Infinite, Metric::Infinite) => Ordering::Equal,
        }
    }
}

impl PartialOrd for Metric {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Finite(cost) => write!(f, "{}", cost),
            Metric::Infinite => write!(f, "inf"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infinite_is_greater_than_any_cost() {
        assert!(Metric::Finite(u32::MAX) < Metric::Infinite);
        assert!(Metric::Finite(3) < Metric::Finite(4));
        assert_eq!(Metric::Infinite.cmp(&Metric::Infinite), Ordering::Equal);
    }

    #[test]
    fn test_saturating_add() {
        assert_eq!(Metric::Finite(1).saturating_add(Metric::Finite(2)), Metric::Finite(3));
        assert_eq!(Metric::Finite(1).saturating_add(Metric::Infinite), Metric::Infinite);
        assert_eq!(Metric::Infinite.saturating_add(Metric::Finite(0)), Metric::Infinite);
        assert_eq!(
            Metric::Finite(u32::MAX).saturating_add(Metric::Finite(1)),
            Metric::Infinite
        );
    }

    #[test]
    fn test_display_value_uses_ripng_infinity() {
        assert_eq!(Metric::Finite(7).display_value(), 7);
        assert_eq!(Metric::Infinite.display_value(), RIPNG_INFINITY);
    }
}
