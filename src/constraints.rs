use serde::{Deserialize, Serialize};

use crate::results::YearResult;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub enabled: bool,
    pub threshold: f64,
}

impl Constraint {
    pub const fn on(threshold: f64) -> Self {
        Constraint {
            enabled: true,
            threshold,
        }
    }

    pub const fn off(threshold: f64) -> Self {
        Constraint {
            enabled: false,
            threshold,
        }
    }
}

/// Caller-configured limits counted toward the optimizer objective.
///
/// The first three are upper bounds, `real_policy_exp_index` is a lower bound,
/// and `current_account_deficit` caps the length of a run of deficit years.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constraints {
    pub poverty_rate: Constraint,
    pub gini_index: Constraint,
    pub interest_burden: Constraint,
    pub real_policy_exp_index: Constraint,
    pub current_account_deficit: Constraint,
}

impl Default for Constraints {
    fn default() -> Self {
        Constraints {
            poverty_rate: Constraint::on(20.0),
            gini_index: Constraint::on(0.45),
            interest_burden: Constraint::on(30.0),
            real_policy_exp_index: Constraint::on(70.0),
            current_account_deficit: Constraint::on(5.0),
        }
    }
}

impl Constraints {
    /// Every constraint present but disabled.
    pub fn none() -> Self {
        let d = Self::default();
        Constraints {
            poverty_rate: Constraint::off(d.poverty_rate.threshold),
            gini_index: Constraint::off(d.gini_index.threshold),
            interest_burden: Constraint::off(d.interest_burden.threshold),
            real_policy_exp_index: Constraint::off(d.real_policy_exp_index.threshold),
            current_account_deficit: Constraint::off(d.current_account_deficit.threshold),
        }
    }

    pub fn any_enabled(&self) -> bool {
        [
            self.poverty_rate,
            self.gini_index,
            self.interest_burden,
            self.real_policy_exp_index,
            self.current_account_deficit,
        ]
        .iter()
        .any(|c| c.enabled)
    }

    /// Number of year-occurrences breaching an enabled constraint.
    pub fn count_violations(&self, results: &[YearResult]) -> usize {
        let mut violations = 0;
        let mut deficit_run = 0u32;
        for r in results {
            let breaches = [
                self.poverty_rate.enabled && r.poverty_rate > self.poverty_rate.threshold,
                self.gini_index.enabled && r.gini_index > self.gini_index.threshold,
                self.interest_burden.enabled && r.interest_burden > self.interest_burden.threshold,
                self.real_policy_exp_index.enabled
                    && r.real_policy_exp_index < self.real_policy_exp_index.threshold,
            ];
            violations += breaches.iter().filter(|&&b| b).count();

            if self.current_account_deficit.enabled {
                deficit_run = if r.current_account < 0.0 { deficit_run + 1 } else { 0 };
                if deficit_run as f64 > self.current_account_deficit.threshold {
                    violations += 1;
                }
            }
        }
        violations
    }
}

/// Free-function form of [`Constraints::count_violations`].
pub fn count_violations(results: &[YearResult], constraints: &Constraints) -> usize {
    constraints.count_violations(results)
}
