use govsim::config::{ParamKey, ParameterSet, find_scenario};
use govsim::history::HistoricalSeries;
use govsim::optimizer::{AdjustableParam, adjustable};
use govsim::results::YearResult;
use govsim::simulation::simulate;

pub struct Scenario {
    pub preset: &'static str,
    pub years: usize,
    pub keys: &'static [ParamKey],
}

pub const SMALL: Scenario = Scenario {
    preset: "baseline",
    years: 30,
    keys: &[ParamKey::RiskPremium],
};

pub const MEDIUM: Scenario = Scenario {
    preset: "stagflation",
    years: 40,
    keys: &[ParamKey::RealGrowth, ParamKey::RiskPremium, ParamKey::InflationRate, ParamKey::BojQtRate],
};

pub const LARGE: Scenario = Scenario {
    preset: "global-crisis",
    years: 50,
    keys: &ParamKey::ALL,
};

/// Preset parameters with the scenario's horizon applied. Unknown presets fall back to the baseline.
pub fn build_params(scenario: &Scenario) -> ParameterSet {
    let mut params = find_scenario(scenario.preset)
        .map(|s| s.params)
        .unwrap_or_default();
    params.sim_years = scenario.years;
    params
}

pub fn build_keys(scenario: &Scenario) -> Vec<AdjustableParam> {
    adjustable(scenario.keys)
}

pub fn build_results(scenario: &Scenario) -> (ParameterSet, Vec<YearResult>) {
    let params = build_params(scenario);
    let results = simulate(&params, &HistoricalSeries::japan());
    (params, results)
}
