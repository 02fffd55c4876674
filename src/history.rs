use crate::results::YearResult;

/// Pre-simulation observations that feed the long-lag sub-models.
///
/// Both tables hold one value per year, oldest first, ending with the last
/// observed year before `Year::BASE`. The engine receives this by reference
/// so tests can inject their own history.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalSeries {
    /// Public education spending, % of GDP.
    pub education_gdp_ratio: Vec<f64>,
    /// Total fertility rate.
    pub tfr: Vec<f64>,
}

impl HistoricalSeries {
    /// Japan, 2011–2025.
    pub fn japan() -> Self {
        HistoricalSeries {
            education_gdp_ratio: vec![
                3.0, 3.0, 3.0, 3.0, 3.0, 3.2, 3.2, 3.1, 3.1, 3.1, 3.4, 3.4, 3.3, 3.4, 3.5,
            ],
            tfr: vec![
                1.42, 1.42, 1.44, 1.45, 1.44, 1.43, 1.42, 1.36, 1.34, 1.30, 1.33, 1.30, 1.26, 1.20,
                1.20,
            ],
        }
    }
}

impl Default for HistoricalSeries {
    fn default() -> Self {
        Self::japan()
    }
}

/// Index-addressed view over simulated years with a historical fallback.
///
/// Index 0 is the first simulated year. A negative index `-k` reads the
/// `k`-th most recent historical entry; indices beyond either end yield `None`.
pub struct Timeline<'a> {
    results: &'a [YearResult],
    history: &'a HistoricalSeries,
}

impl<'a> Timeline<'a> {
    pub fn new(results: &'a [YearResult], history: &'a HistoricalSeries) -> Self {
        Timeline { results, history }
    }

    pub fn education_gdp_ratio(&self, index: i64) -> Option<f64> {
        self.lookup(index, |r| r.education_gdp_ratio, &self.history.education_gdp_ratio)
    }

    pub fn tfr(&self, index: i64) -> Option<f64> {
        self.lookup(index, |r| r.tfr, &self.history.tfr)
    }

    fn lookup(&self, index: i64, field: fn(&YearResult) -> f64, table: &[f64]) -> Option<f64> {
        if index >= 0 {
            return self.results.get(index as usize).map(field);
        }
        let back = index.unsigned_abs() as usize;
        table.len().checked_sub(back).map(|i| table[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_indices_read_history_from_the_end() {
        let history = HistoricalSeries::japan();
        let tl = Timeline::new(&[], &history);
        assert_eq!(tl.education_gdp_ratio(-1), Some(3.5));
        assert_eq!(tl.education_gdp_ratio(-15), Some(3.0));
        assert_eq!(tl.tfr(-5), Some(1.33));
        assert_eq!(tl.tfr(-16), None);
    }

    #[test]
    fn non_negative_indices_read_results() {
        let history = HistoricalSeries::japan();
        let row = YearResult {
            tfr: 1.11,
            education_gdp_ratio: 4.2,
            ..YearResult::default()
        };
        let rows = vec![row];
        let tl = Timeline::new(&rows, &history);
        assert_eq!(tl.tfr(0), Some(1.11));
        assert_eq!(tl.education_gdp_ratio(0), Some(4.2));
        assert_eq!(tl.tfr(1), None);
    }

    #[test]
    fn both_tables_cover_fifteen_years() {
        let h = HistoricalSeries::default();
        assert_eq!(h.education_gdp_ratio.len(), 15);
        assert_eq!(h.tfr.len(), 15);
    }
}
