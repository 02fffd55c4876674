use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::ParameterSet;
use crate::results::YearResult;
use crate::types::Year;

pub const INTEREST_BURDEN_LIMIT: f64 = 30.0;
pub const REAL_WAGE_STREAK: u32 = 3;
pub const FISCAL_DEFICIT_STREAK: u32 = 5;
/// Year-over-year relative change above which a monitored flow is flagged.
pub const SWING_LIMIT: f64 = 1.0;
/// Trailing window for the currency-confidence check.
pub const CONFIDENCE_WINDOW: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    InterestBurden,
    CurrentAccountDeficit,
    BojCapitalShortfall,
    CurrencyRiskPremium,
    RealWageDecline,
    ChronicFiscalDeficit,
    LargeSwing,
    CurrencyConfidence,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::InterestBurden => "interest burden above 30%",
            Self::CurrentAccountDeficit => "current account in deficit",
            Self::BojCapitalShortfall => "central-bank losses exceed capital buffer",
            Self::CurrencyRiskPremium => "currency risk premium triggered",
            Self::RealWageDecline => "real wages falling 3 years running",
            Self::ChronicFiscalDeficit => "chronic fiscal deficit",
            Self::LargeSwing => "year-over-year change above 100%",
            Self::CurrencyConfidence => "loss of currency confidence",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Normal,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    pub year: Year,
    pub kind: WarningKind,
    pub detail: String,
    pub severity: Severity,
}

impl Warning {
    fn new(year: Year, kind: WarningKind, detail: String) -> Self {
        Warning {
            year,
            kind,
            detail,
            severity: Severity::Normal,
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = match self.severity {
            Severity::Critical => "!!",
            Severity::Normal => "  ",
        };
        write!(f, "{marker} {}  {}: {}", self.year, self.kind, self.detail)
    }
}

/// Flow fields checked for large year-over-year swings.
const MONITORED: [(&str, fn(&YearResult) -> f64); 8] = [
    ("tax revenue", |r| r.tax),
    ("interest", |r| r.interest),
    ("fiscal balance", |r| r.fiscal_balance),
    ("central-bank remittance", |r| r.boj_payment),
    ("trade balance", |r| r.trade_balance),
    ("policy expenditure", |r| r.policy_exp),
    ("energy subsidy", |r| r.energy_subsidy),
    ("currency risk premium", |r| r.dynamic_risk_premium),
];

/// Scan a completed run and emit every warning, in year order.
///
/// Per-year checks fire independently. Streak checks fire in every year from
/// the Nth consecutive occurrence until the streak breaks. The trailing
/// currency-confidence check fires at most once, stamped with the final year.
pub fn evaluate(results: &[YearResult], params: &ParameterSet) -> Vec<Warning> {
    let mut out = Vec::new();
    let mut real_wage_streak = 0u32;
    let mut deficit_streak = 0u32;

    for (i, r) in results.iter().enumerate() {
        if r.interest_burden > INTEREST_BURDEN_LIMIT {
            out.push(Warning::new(
                r.year,
                WarningKind::InterestBurden,
                format!("{:.1}% of tax revenue goes to interest", r.interest_burden),
            ));
        }
        if r.current_account < 0.0 {
            out.push(Warning::new(
                r.year,
                WarningKind::CurrentAccountDeficit,
                format!("current account {:.1}", r.current_account),
            ));
        }
        if r.boj_cumulative_loss > params.boj_capital_buffer {
            out.push(Warning::new(
                r.year,
                WarningKind::BojCapitalShortfall,
                format!(
                    "cumulative loss {:.1} > buffer {:.1}",
                    r.boj_cumulative_loss, params.boj_capital_buffer
                ),
            ));
        }
        if r.dynamic_risk_premium > 0.0 {
            let mut detail = format!("+{:.1}% on deficit below the NFA line", r.dynamic_risk_premium);
            if r.nfa_deterioration_streak > 0 {
                let factor = 1.0 + r.nfa_deterioration_streak as f64 * 0.3;
                detail.push_str(&format!(", acceleration x{factor:.1}"));
            }
            out.push(Warning::new(r.year, WarningKind::CurrencyRiskPremium, detail));
        }

        real_wage_streak = if r.real_wage_growth < 0.0 { real_wage_streak + 1 } else { 0 };
        if real_wage_streak >= REAL_WAGE_STREAK {
            out.push(Warning::new(
                r.year,
                WarningKind::RealWageDecline,
                format!("real wage growth {:.1}%", r.real_wage_growth),
            ));
        }

        deficit_streak = if r.fiscal_balance < 0.0 { deficit_streak + 1 } else { 0 };
        if deficit_streak >= FISCAL_DEFICIT_STREAK {
            out.push(Warning::new(
                r.year,
                WarningKind::ChronicFiscalDeficit,
                format!("{deficit_streak} consecutive deficits, balance {:.1}", r.fiscal_balance),
            ));
        }

        if i > 0 {
            let prev = &results[i - 1];
            for (label, field) in MONITORED {
                if let Some(detail) = swing(label, field(prev), field(r)) {
                    out.push(Warning::new(r.year, WarningKind::LargeSwing, detail));
                }
            }
        }
    }

    if let Some(w) = currency_confidence(results) {
        out.push(w);
    }
    out
}

/// Sign-preserving swing check. A change of sign is not a swing; a jump from
/// exactly zero to a nonzero value is.
fn swing(label: &str, prev: f64, curr: f64) -> Option<String> {
    if curr == 0.0 {
        return None;
    }
    if prev == 0.0 {
        return Some(format!("{label} {prev:.1} -> {curr:.1}, up from zero"));
    }
    if prev.signum() != curr.signum() {
        return None;
    }
    let change = ((curr - prev) / prev).abs();
    (change > SWING_LIMIT)
        .then(|| format!("{label} {prev:.1} -> {curr:.1}, {:.0}% change", change * 100.0))
}

fn currency_confidence(results: &[YearResult]) -> Option<Warning> {
    let tail = results.get(results.len().checked_sub(CONFIDENCE_WINDOW)?..)?;
    let all_deficit = tail.iter().all(|r| r.current_account < 0.0);
    let nfa_falling = tail.windows(2).all(|w| w[1].nfa < w[0].nfa);
    if !(all_deficit && nfa_falling) {
        return None;
    }
    let last = tail.last()?;
    let deficit_years = results.iter().filter(|r| r.current_account < 0.0).count();
    Some(Warning {
        year: last.year,
        kind: WarningKind::CurrencyConfidence,
        detail: format!(
            "current account negative for the final {CONFIDENCE_WINDOW} years ({deficit_years} in total) \
             with NFA falling every year; NFA {:.1}, current account {:.1}",
            last.nfa, last.current_account
        ),
        severity: Severity::Critical,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Quiet rows: surplus, positive real wages, no premiums.
    fn rows(n: usize) -> Vec<YearResult> {
        (0..n)
            .map(|i| YearResult {
                year: Year::BASE.offset(i),
                tax: 80.0,
                interest: 10.0,
                fiscal_balance: 1.0,
                boj_payment: 1.0,
                trade_balance: 5.0,
                policy_exp: 80.0,
                energy_subsidy: 6.0,
                current_account: 10.0,
                nfa: 400.0 + i as f64,
                real_wage_growth: 0.5,
                interest_burden: 12.0,
                ..YearResult::default()
            })
            .collect()
    }

    fn kinds(ws: &[Warning], kind: WarningKind) -> Vec<Year> {
        ws.iter().filter(|w| w.kind == kind).map(|w| w.year).collect()
    }

    #[test]
    fn quiet_run_has_no_warnings() {
        assert!(evaluate(&rows(30), &ParameterSet::default()).is_empty());
    }

    // ── Per-year checks ──────────────────────────────────────────────────────

    #[test]
    fn per_year_checks_fire_independently() {
        let mut rs = rows(6);
        rs[1].interest_burden = 31.0;
        rs[2].current_account = -1.0;
        rs[3].boj_cumulative_loss = 13.0;
        rs[4].interest_burden = 30.0;
        let ws = evaluate(&rs, &ParameterSet::default());
        assert_eq!(kinds(&ws, WarningKind::InterestBurden), vec![Year(2027)]);
        assert_eq!(kinds(&ws, WarningKind::CurrentAccountDeficit), vec![Year(2028)]);
        assert_eq!(kinds(&ws, WarningKind::BojCapitalShortfall), vec![Year(2029)]);
    }

    // ── Streaks ──────────────────────────────────────────────────────────────

    #[test]
    fn four_year_real_wage_decline_is_one_episode_starting_at_third_year() {
        let mut rs = rows(10);
        for r in &mut rs[2..6] {
            r.real_wage_growth = -0.4;
        }
        let ws = evaluate(&rs, &ParameterSet::default());
        let years = kinds(&ws, WarningKind::RealWageDecline);
        assert_eq!(years.first(), Some(&Year(2030)), "first fires on the 3rd year");
        assert_eq!(years, vec![Year(2030), Year(2031)]);
    }

    #[test]
    fn broken_streak_resets() {
        let mut rs = rows(10);
        for i in [1, 2, 4, 5] {
            rs[i].real_wage_growth = -1.0;
        }
        let ws = evaluate(&rs, &ParameterSet::default());
        assert!(kinds(&ws, WarningKind::RealWageDecline).is_empty());
    }

    #[test]
    fn fiscal_deficit_streak_fires_from_fifth_year() {
        let mut rs = rows(10);
        for r in &mut rs[..7] {
            r.fiscal_balance = -2.0;
        }
        let ws = evaluate(&rs, &ParameterSet::default());
        assert_eq!(
            kinds(&ws, WarningKind::ChronicFiscalDeficit),
            vec![Year(2030), Year(2031), Year(2032)]
        );
    }

    // ── Large swings ─────────────────────────────────────────────────────────

    #[test]
    fn swing_rules() {
        assert!(swing("x", 10.0, 25.0).is_some());
        assert!(swing("x", 10.0, 19.0).is_none());
        assert!(swing("x", -10.0, -25.0).is_some());
        assert!(swing("x", 0.0, 3.0).is_some(), "zero to nonzero");
        assert!(swing("x", 10.0, -30.0).is_none(), "sign flip is skipped");
        assert!(swing("x", 10.0, 0.0).is_none());
        assert!(swing("x", 10.0, 1.0).is_none(), "a 90% drop is below the limit");
    }

    #[test]
    fn premium_switching_on_counts_as_swing() {
        let mut rs = rows(4);
        rs[2].dynamic_risk_premium = 2.0;
        rs[2].current_account = -1.0;
        let ws = evaluate(&rs, &ParameterSet::default());
        assert_eq!(kinds(&ws, WarningKind::LargeSwing), vec![Year(2028)]);
        assert_eq!(kinds(&ws, WarningKind::CurrencyRiskPremium), vec![Year(2028)]);
    }

    // ── Currency confidence ──────────────────────────────────────────────────

    #[test]
    fn trailing_deficits_with_falling_nfa_fire_once_as_critical() {
        let mut rs = rows(12);
        for (k, r) in rs[7..].iter_mut().enumerate() {
            r.current_account = -5.0;
            r.nfa = 300.0 - k as f64 * 5.0;
        }
        let ws = evaluate(&rs, &ParameterSet::default());
        let critical: Vec<_> = ws.iter().filter(|w| w.severity == Severity::Critical).collect();
        assert_eq!(critical.len(), 1);
        assert_eq!(critical[0].kind, WarningKind::CurrencyConfidence);
        assert_eq!(critical[0].year, Year(2037));
    }

    #[test]
    fn flat_nfa_does_not_count_as_falling() {
        let mut rs = rows(12);
        for r in &mut rs[7..] {
            r.current_account = -5.0;
            r.nfa = 300.0;
        }
        let ws = evaluate(&rs, &ParameterSet::default());
        assert!(kinds(&ws, WarningKind::CurrencyConfidence).is_empty());
    }

    #[test]
    fn short_runs_skip_trailing_check() {
        let mut rs = rows(4);
        for r in &mut rs {
            r.current_account = -1.0;
        }
        assert!(currency_confidence(&rs).is_none());
    }

    #[test]
    fn warning_round_trips_through_json() {
        let mut rs = rows(12);
        for (k, r) in rs[7..].iter_mut().enumerate() {
            r.current_account = -5.0;
            r.nfa = 300.0 - k as f64;
        }
        for w in evaluate(&rs, &ParameterSet::default()) {
            let line = serde_json::to_string(&w).unwrap();
            assert_eq!(serde_json::from_str::<Warning>(&line).unwrap(), w);
        }
    }
}
