use std::fmt;

use rayon::prelude::*;
use serde::Serialize;

use crate::config::{ParameterSet, Scenario};
use crate::history::HistoricalSeries;
use crate::results::YearResult;
use crate::simulation::simulate;
use crate::types::Year;
use crate::warnings::{self, INTEREST_BURDEN_LIMIT};

/// Years reported in the milestone table.
pub const MILESTONE_YEARS: [i32; 7] = [2026, 2030, 2035, 2040, 2045, 2050, 2055];

/// Poverty rate (%) counted by the simple risk score.
const POVERTY_RISK_LEVEL: f64 = 20.0;

// ── Accounting audit ─────────────────────────────────────────────────────────

/// An accounting identity that does not hold in a YearResult stream.
#[derive(Debug, Clone, PartialEq)]
pub enum AccountingViolation {
    /// Years are not consecutive from the base year.
    YearSequence { expected: Year, actual: Year },
    /// debt[i] != debt[i-1] + total_cost[i] - total_revenue[i].
    DebtRollForward { year: Year, expected: f64, actual: f64 },
    /// bond_issuance != max(total_cost - total_revenue, 0).
    BondIssuance { year: Year, expected: f64, actual: f64 },
    /// Remittance exceeded a positive net income.
    RemittanceExceedsIncome { year: Year, payment: f64, net_income: f64 },
    NegativeCumulativeLoss { year: Year, loss: f64 },
    /// Held JGBs or reserves fell below the QT floor.
    BelowQtFloor { year: Year, jgb: f64, reserves: f64, floor: f64 },
    /// interest_burden != interest / tax * 100.
    InterestBurden { year: Year, expected: f64, actual: f64 },
}

impl fmt::Display for AccountingViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::YearSequence { expected, actual } => {
                write!(f, "YearSequence: expected={expected} actual={actual}")
            }
            Self::DebtRollForward { year, expected, actual } => {
                write!(f, "DebtRollForward {year}: expected={expected:.4} actual={actual:.4}")
            }
            Self::BondIssuance { year, expected, actual } => {
                write!(f, "BondIssuance {year}: expected={expected:.4} actual={actual:.4}")
            }
            Self::RemittanceExceedsIncome { year, payment, net_income } => {
                write!(f, "RemittanceExceedsIncome {year}: payment={payment:.4} net_income={net_income:.4}")
            }
            Self::NegativeCumulativeLoss { year, loss } => {
                write!(f, "NegativeCumulativeLoss {year}: loss={loss:.4}")
            }
            Self::BelowQtFloor { year, jgb, reserves, floor } => {
                write!(f, "BelowQtFloor {year}: jgb={jgb:.1} reserves={reserves:.1} floor={floor:.1}")
            }
            Self::InterestBurden { year, expected, actual } => {
                write!(f, "InterestBurden {year}: expected={expected:.4} actual={actual:.4}")
            }
        }
    }
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-6 * a.abs().max(b.abs()).max(1.0)
}

/// Check the accounting identities of a run produced from `params`.
pub fn verify_accounting(results: &[YearResult], params: &ParameterSet) -> Vec<AccountingViolation> {
    let mut out = Vec::new();
    let mut prev_debt = params.init_debt;

    for (i, r) in results.iter().enumerate() {
        let year = r.year;
        let expected_year = Year::BASE.offset(i);
        if year != expected_year {
            out.push(AccountingViolation::YearSequence {
                expected: expected_year,
                actual: year,
            });
        }

        let expected_debt = prev_debt + r.total_cost - r.total_revenue;
        if !close(r.debt, expected_debt) {
            out.push(AccountingViolation::DebtRollForward {
                year,
                expected: expected_debt,
                actual: r.debt,
            });
        }
        prev_debt = r.debt;

        let expected_bonds = (r.total_cost - r.total_revenue).max(0.0);
        if !close(r.bond_issuance, expected_bonds) {
            out.push(AccountingViolation::BondIssuance {
                year,
                expected: expected_bonds,
                actual: r.bond_issuance,
            });
        }

        if r.boj_net_income > 0.0 && r.boj_payment > r.boj_net_income + 1e-9 {
            out.push(AccountingViolation::RemittanceExceedsIncome {
                year,
                payment: r.boj_payment,
                net_income: r.boj_net_income,
            });
        }
        if r.boj_cumulative_loss < 0.0 {
            out.push(AccountingViolation::NegativeCumulativeLoss {
                year,
                loss: r.boj_cumulative_loss,
            });
        }
        // The floor binds only once QT has run; year 0 holds the initial balances.
        if i > 0 && (r.boj_jgb < params.boj_ca_floor || r.boj_ca < params.boj_ca_floor) {
            out.push(AccountingViolation::BelowQtFloor {
                year,
                jgb: r.boj_jgb,
                reserves: r.boj_ca,
                floor: params.boj_ca_floor,
            });
        }

        let expected_burden = if r.tax == 0.0 { 0.0 } else { r.interest / r.tax * 100.0 };
        if !close(r.interest_burden, expected_burden) {
            out.push(AccountingViolation::InterestBurden {
                year,
                expected: expected_burden,
                actual: r.interest_burden,
            });
        }
    }
    out
}

// ── Scenario grading ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    A,
    #[serde(rename = "B+")]
    BPlus,
    B,
    C,
    D,
}

impl Grade {
    pub fn from_risk_count(count: usize) -> Self {
        match count {
            0 => Grade::APlus,
            1..=5 => Grade::A,
            6..=10 => Grade::BPlus,
            11..=15 => Grade::B,
            16..=25 => Grade::C,
            _ => Grade::D,
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
        })
    }
}

/// Year-occurrences of a high interest burden, high poverty, or NFA below the defence line.
pub fn simple_risk_count(results: &[YearResult], params: &ParameterSet) -> usize {
    results
        .iter()
        .map(|r| {
            usize::from(r.interest_burden > INTEREST_BURDEN_LIMIT)
                + usize::from(r.poverty_rate > POVERTY_RISK_LEVEL)
                + usize::from(r.nfa < params.nfa_threshold)
        })
        .sum()
}

/// Headline figures for one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub name: String,
    pub final_year: Year,
    pub final_debt: f64,
    pub final_interest_burden: f64,
    pub final_poverty_rate: f64,
    pub final_gini: f64,
    pub final_debt_to_gdp: f64,
    pub final_nfa: f64,
    pub final_fiscal_balance: f64,
    pub avg_real_wage_growth: f64,
    pub warning_count: usize,
    pub risk_count: usize,
    pub grade: Grade,
}

pub fn summarize(name: &str, results: &[YearResult], params: &ParameterSet) -> Option<RunSummary> {
    let last = results.last()?;
    let avg_real_wage_growth =
        results.iter().map(|r| r.real_wage_growth).sum::<f64>() / results.len() as f64;
    let risk_count = simple_risk_count(results, params);
    Some(RunSummary {
        name: name.to_string(),
        final_year: last.year,
        final_debt: last.debt,
        final_interest_burden: last.interest_burden,
        final_poverty_rate: last.poverty_rate,
        final_gini: last.gini_index,
        final_debt_to_gdp: last.debt_to_gdp,
        final_nfa: last.nfa,
        final_fiscal_balance: last.fiscal_balance,
        avg_real_wage_growth,
        warning_count: warnings::evaluate(results, params).len(),
        risk_count,
        grade: Grade::from_risk_count(risk_count),
    })
}

/// Simulate and summarise every scenario in parallel; output keeps input order.
pub fn compare_scenarios(scenarios: &[Scenario], history: &HistoricalSeries) -> Vec<RunSummary> {
    scenarios
        .par_iter()
        .filter_map(|s| {
            let results = simulate(&s.params, history);
            summarize(s.name, &results, &s.params)
        })
        .collect()
}

/// Rows for the milestone years that fall inside the run.
pub fn milestones(results: &[YearResult]) -> Vec<&YearResult> {
    results
        .iter()
        .filter(|r| MILESTONE_YEARS.contains(&r.year.0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::scenarios;

    fn baseline() -> (ParameterSet, Vec<YearResult>) {
        let p = ParameterSet::default();
        let r = simulate(&p, &HistoricalSeries::japan());
        (p, r)
    }

    // ── Accounting audit ─────────────────────────────────────────────────────

    #[test]
    fn engine_output_passes_audit() {
        for s in scenarios() {
            let results = simulate(&s.params, &HistoricalSeries::japan());
            let violations = verify_accounting(&results, &s.params);
            assert!(violations.is_empty(), "{}: {:?}", s.name, violations);
        }
    }

    #[test]
    fn tampered_debt_is_reported() {
        let (p, mut results) = baseline();
        results[10].debt += 5.0;
        let violations = verify_accounting(&results, &p);
        // Year 10 breaks against year 9 and year 11 breaks against year 10.
        let years: Vec<_> = violations
            .iter()
            .filter_map(|v| match v {
                AccountingViolation::DebtRollForward { year, .. } => Some(*year),
                _ => None,
            })
            .collect();
        assert_eq!(years, vec![Year(2036), Year(2037)]);
    }

    #[test]
    fn gap_in_years_is_reported() {
        let (p, mut results) = baseline();
        results.remove(3);
        let violations = verify_accounting(&results, &p);
        assert!(violations.iter().any(|v| matches!(
            v,
            AccountingViolation::YearSequence { expected: Year(2029), actual: Year(2030) }
        )));
    }

    #[test]
    fn overpaid_remittance_is_reported() {
        let (p, mut results) = baseline();
        results[0].boj_net_income = 1.0;
        results[0].boj_payment = 2.0;
        let violations = verify_accounting(&results, &p);
        assert!(violations
            .iter()
            .any(|v| matches!(v, AccountingViolation::RemittanceExceedsIncome { .. })));
        assert!(violations[0].to_string().starts_with("RemittanceExceedsIncome 2026"));
    }

    // ── Grading ──────────────────────────────────────────────────────────────

    #[test]
    fn grade_boundaries() {
        let cases = [
            (0, Grade::APlus),
            (5, Grade::A),
            (6, Grade::BPlus),
            (10, Grade::BPlus),
            (15, Grade::B),
            (25, Grade::C),
            (26, Grade::D),
        ];
        for (n, g) in cases {
            assert_eq!(Grade::from_risk_count(n), g, "{n}");
        }
        assert_eq!(Grade::BPlus.to_string(), "B+");
    }

    #[test]
    fn risk_count_sums_three_conditions_per_year() {
        let p = ParameterSet::default();
        let rows = vec![
            YearResult {
                interest_burden: 31.0,
                poverty_rate: 21.0,
                nfa: 100.0,
                ..YearResult::default()
            },
            YearResult {
                interest_burden: 10.0,
                poverty_rate: 15.0,
                nfa: 500.0,
                ..YearResult::default()
            },
        ];
        assert_eq!(simple_risk_count(&rows, &p), 3);
    }

    #[test]
    fn comparison_keeps_scenario_order() {
        let all = scenarios();
        let summaries = compare_scenarios(&all, &HistoricalSeries::japan());
        assert_eq!(summaries.len(), all.len());
        for (s, sum) in all.iter().zip(&summaries) {
            assert_eq!(s.name, sum.name);
            assert_eq!(sum.grade, Grade::from_risk_count(sum.risk_count));
        }
    }

    #[test]
    fn summary_of_empty_run_is_none() {
        assert!(summarize("empty", &[], &ParameterSet::default()).is_none());
    }

    // ── Milestones ───────────────────────────────────────────────────────────

    #[test]
    fn milestones_follow_horizon() {
        let (_, results) = baseline();
        let years: Vec<i32> = milestones(&results).iter().map(|r| r.year.0).collect();
        assert_eq!(years, vec![2026, 2030, 2035, 2040, 2045, 2050, 2055]);

        let short = &results[..10];
        assert_eq!(milestones(short).len(), 3);
    }
}
