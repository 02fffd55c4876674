use serde::{Deserialize, Serialize};

/// Calendar year of a simulated fiscal year.
///
/// Results are indexed from `Year::BASE`; `results[i].year == Year::BASE.offset(i)`.
/// Serialises as a bare integer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Year(pub i32);

impl Year {
    /// First simulated fiscal year.
    pub const BASE: Year = Year(2026);

    /// Advance by a number of years.
    pub fn offset(self, years: usize) -> Self {
        Year(self.0 + years as i32)
    }

    /// Zero-based step index of this year relative to `Year::BASE`.
    pub fn index(self) -> i64 {
        (self.0 - Self::BASE.0) as i64
    }
}

impl std::fmt::Display for Year {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_and_index_are_inverse() {
        let y = Year::BASE.offset(17);
        assert_eq!(y, Year(2043));
        assert_eq!(y.index(), 17);
    }

    #[test]
    fn year_serializes_as_bare_integer() {
        let json = serde_json::to_string(&Year(2031)).unwrap();
        assert_eq!(json, "2031");
        let back: Year = serde_json::from_str("2031").unwrap();
        assert_eq!(back, Year(2031));
    }
}
