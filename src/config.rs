use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Shortest and longest supported horizons, in years.
pub const MIN_HORIZON: usize = 30;
pub const MAX_HORIZON: usize = 50;

/// Year in which the consumption-tax rate switches to `tax_rate_new`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TaxChangeYear {
    #[default]
    #[serde(rename = "none")]
    Never,
    #[serde(rename = "2030")]
    In2030,
    #[serde(rename = "2035")]
    In2035,
    #[serde(rename = "2040")]
    In2040,
}

impl TaxChangeYear {
    pub fn year(self) -> Option<i32> {
        match self {
            Self::Never => None,
            Self::In2030 => Some(2030),
            Self::In2035 => Some(2035),
            Self::In2040 => Some(2040),
        }
    }
}

impl FromStr for TaxChangeYear {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "none" | "" => Ok(Self::Never),
            "2030" => Ok(Self::In2030),
            "2035" => Ok(Self::In2035),
            "2040" => Ok(Self::In2040),
            other => Err(ConfigError::UnknownTaxChangeYear(other.to_string())),
        }
    }
}

/// Every scalar input of one simulation run.
///
/// Rates are stored in percentage points (2.0 = 2%) and converted to fractions
/// inside the engine. Ratios named `*_rate` without a percent meaning
/// (`productivity_share_rate`, `energy_subsidy_rate`, ...) are plain 0–1 fractions.
/// Stocks and flows are in trillion yen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterSet {
    // ── Macro ────────────────────────────────────────────────────────────────
    pub inflation_rate: f64,
    pub real_growth: f64,
    pub risk_premium: f64,

    // ── Initial fiscal stocks and flows ──────────────────────────────────────
    pub init_debt: f64,
    pub init_tax_consumption: f64,
    pub init_tax_income: f64,
    pub init_tax_corporate: f64,
    pub init_tax_other: f64,
    pub init_policy_exp: f64,
    pub init_avg_coupon: f64,
    pub other_revenue: f64,
    pub natural_increase: f64,
    pub tax_rate_change_year: TaxChangeYear,
    /// Consumption-tax rate (%) after the change year; the current rate is 10%.
    pub tax_rate_new: f64,

    // ── Central bank ─────────────────────────────────────────────────────────
    pub boj_ca: f64,
    pub boj_yield: f64,
    pub boj_capital_buffer: f64,
    pub policy_rate_spread: f64,
    pub init_boj_jgb: f64,
    pub boj_qt_rate: f64,
    pub boj_ca_floor: f64,

    // ── FX and trade ─────────────────────────────────────────────────────────
    /// Exogenous annual depreciation bias (%, positive = weaker yen).
    pub yen_depreciation: f64,
    pub global_growth: f64,
    pub init_export: f64,
    pub init_import: f64,
    pub fx_reserves: f64,
    pub init_exchange_rate: f64,
    pub init_nfa: f64,
    /// NFA defence line below which a current-account deficit triggers the currency premium.
    pub nfa_threshold: f64,
    pub currency_risk_premium: f64,
    pub foreign_interest_rate: f64,
    pub foreign_inflation: f64,

    // ── Wages and households ─────────────────────────────────────────────────
    pub nominal_wage_growth: f64,
    pub productivity_share_rate: f64,
    pub wage_pass_through_rate: f64,
    pub init_poverty_rate: f64,
    pub init_gini: f64,
    pub poverty_sensitivity: f64,
    pub energy_subsidy_rate: f64,

    // ── Fiscal risk ──────────────────────────────────────────────────────────
    pub fiscal_risk_sensitivity: f64,
    pub interest_burden_threshold: f64,

    // ── Expenditure categories ───────────────────────────────────────────────
    pub init_social_security: f64,
    pub init_childcare: f64,
    pub init_local_gov_transfer: f64,
    pub init_defense: f64,
    pub childcare_growth: f64,
    pub defense_growth: f64,

    // ── Corporate sector ─────────────────────────────────────────────────────
    pub init_nominal_gdp: f64,
    pub init_retained_earnings: f64,
    pub effective_corporate_tax_rate: f64,
    pub retained_earnings_return_rate: f64,

    // ── Demographics and human capital ───────────────────────────────────────
    pub population_growth: f64,
    pub labor_participation_change: f64,
    pub education_gdp_ratio: f64,
    pub tech_effect: f64,
    pub base_tfr: f64,
    pub tfr_sensitivity: f64,

    /// Requested horizon in years; see `horizon()`.
    pub sim_years: usize,
}

impl Default for ParameterSet {
    /// Fiscal position at the end of 2024, status-quo policy.
    fn default() -> Self {
        ParameterSet {
            inflation_rate: 2.0,
            real_growth: 0.5,
            risk_premium: 0.5,
            init_debt: 1100.0,
            init_tax_consumption: 24.0,
            init_tax_income: 22.0,
            init_tax_corporate: 17.0,
            init_tax_other: 12.0,
            init_policy_exp: 80.0,
            init_avg_coupon: 0.8,
            other_revenue: 15.0,
            natural_increase: 0.5,
            tax_rate_change_year: TaxChangeYear::Never,
            tax_rate_new: 10.0,
            boj_ca: 550.0,
            boj_yield: 0.2,
            boj_capital_buffer: 12.0,
            policy_rate_spread: 1.0,
            init_boj_jgb: 590.0,
            boj_qt_rate: 30.0,
            boj_ca_floor: 100.0,
            yen_depreciation: 2.0,
            global_growth: 2.5,
            init_export: 100.0,
            init_import: 110.0,
            fx_reserves: 180.0,
            init_exchange_rate: 150.0,
            init_nfa: 420.0,
            nfa_threshold: 200.0,
            currency_risk_premium: 2.0,
            foreign_interest_rate: 3.5,
            foreign_inflation: 2.0,
            nominal_wage_growth: 1.5,
            productivity_share_rate: 0.5,
            wage_pass_through_rate: 0.3,
            init_poverty_rate: 15.4,
            init_gini: 0.334,
            poverty_sensitivity: 0.5,
            energy_subsidy_rate: 0.3,
            fiscal_risk_sensitivity: 0.1,
            interest_burden_threshold: 20.0,
            init_social_security: 37.0,
            init_childcare: 5.0,
            init_local_gov_transfer: 17.0,
            init_defense: 7.0,
            childcare_growth: 2.0,
            defense_growth: 1.5,
            init_nominal_gdp: 615.0,
            init_retained_earnings: 550.0,
            effective_corporate_tax_rate: 0.23,
            retained_earnings_return_rate: 0.02,
            population_growth: -0.5,
            labor_participation_change: 0.1,
            education_gdp_ratio: 3.5,
            tech_effect: 0.2,
            base_tfr: 1.20,
            tfr_sensitivity: 0.5,
            sim_years: 30,
        }
    }
}

impl ParameterSet {
    /// Effective horizon: `sim_years` clamped to [30, 50]; 0 means the default 30.
    pub fn horizon(&self) -> usize {
        if self.sim_years == 0 {
            return MIN_HORIZON;
        }
        self.sim_years.clamp(MIN_HORIZON, MAX_HORIZON)
    }

    /// Replace `sim_years` with the effective horizon, warning when a requested
    /// value was out of range. Returns whether it was clamped.
    pub fn normalize_horizon(&mut self) -> bool {
        let horizon = self.horizon();
        let clamped = self.sim_years != 0 && horizon != self.sim_years;
        if clamped {
            log::warn!("horizon {} clamped to {horizon}", self.sim_years);
        }
        self.sim_years = horizon;
        clamped
    }

    /// Read a (possibly partial) JSON object; missing fields keep their baseline value.
    pub fn from_json_reader<R: Read>(reader: R) -> ConfigResult<Self> {
        let mut params: Self = serde_json::from_reader(reader)?;
        params.normalize_horizon();
        Ok(params)
    }

    pub fn from_json_path(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let file = File::open(path)?;
        Self::from_json_reader(BufReader::new(file))
    }
}

/// Parameters the optimizer may move. Each key addresses one `ParameterSet` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKey {
    InflationRate,
    RealGrowth,
    RiskPremium,
    YenDepreciation,
    ForeignInterestRate,
    NominalWageGrowth,
    ProductivityShareRate,
    WagePassThroughRate,
    RetainedEarningsReturnRate,
    GlobalGrowth,
    NaturalIncrease,
    EnergySubsidyRate,
    BojQtRate,
    FiscalRiskSensitivity,
    PopulationGrowth,
    EducationGdpRatio,
    TechEffect,
}

impl ParamKey {
    pub const ALL: [ParamKey; 17] = [
        ParamKey::InflationRate,
        ParamKey::RealGrowth,
        ParamKey::RiskPremium,
        ParamKey::YenDepreciation,
        ParamKey::ForeignInterestRate,
        ParamKey::NominalWageGrowth,
        ParamKey::ProductivityShareRate,
        ParamKey::WagePassThroughRate,
        ParamKey::RetainedEarningsReturnRate,
        ParamKey::GlobalGrowth,
        ParamKey::NaturalIncrease,
        ParamKey::EnergySubsidyRate,
        ParamKey::BojQtRate,
        ParamKey::FiscalRiskSensitivity,
        ParamKey::PopulationGrowth,
        ParamKey::EducationGdpRatio,
        ParamKey::TechEffect,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::InflationRate => "inflation_rate",
            Self::RealGrowth => "real_growth",
            Self::RiskPremium => "risk_premium",
            Self::YenDepreciation => "yen_depreciation",
            Self::ForeignInterestRate => "foreign_interest_rate",
            Self::NominalWageGrowth => "nominal_wage_growth",
            Self::ProductivityShareRate => "productivity_share_rate",
            Self::WagePassThroughRate => "wage_pass_through_rate",
            Self::RetainedEarningsReturnRate => "retained_earnings_return_rate",
            Self::GlobalGrowth => "global_growth",
            Self::NaturalIncrease => "natural_increase",
            Self::EnergySubsidyRate => "energy_subsidy_rate",
            Self::BojQtRate => "boj_qt_rate",
            Self::FiscalRiskSensitivity => "fiscal_risk_sensitivity",
            Self::PopulationGrowth => "population_growth",
            Self::EducationGdpRatio => "education_gdp_ratio",
            Self::TechEffect => "tech_effect",
        }
    }

    pub fn get(self, p: &ParameterSet) -> f64 {
        match self {
            Self::InflationRate => p.inflation_rate,
            Self::RealGrowth => p.real_growth,
            Self::RiskPremium => p.risk_premium,
            Self::YenDepreciation => p.yen_depreciation,
            Self::ForeignInterestRate => p.foreign_interest_rate,
            Self::NominalWageGrowth => p.nominal_wage_growth,
            Self::ProductivityShareRate => p.productivity_share_rate,
            Self::WagePassThroughRate => p.wage_pass_through_rate,
            Self::RetainedEarningsReturnRate => p.retained_earnings_return_rate,
            Self::GlobalGrowth => p.global_growth,
            Self::NaturalIncrease => p.natural_increase,
            Self::EnergySubsidyRate => p.energy_subsidy_rate,
            Self::BojQtRate => p.boj_qt_rate,
            Self::FiscalRiskSensitivity => p.fiscal_risk_sensitivity,
            Self::PopulationGrowth => p.population_growth,
            Self::EducationGdpRatio => p.education_gdp_ratio,
            Self::TechEffect => p.tech_effect,
        }
    }

    pub fn set(self, p: &mut ParameterSet, value: f64) {
        let field = match self {
            Self::InflationRate => &mut p.inflation_rate,
            Self::RealGrowth => &mut p.real_growth,
            Self::RiskPremium => &mut p.risk_premium,
            Self::YenDepreciation => &mut p.yen_depreciation,
            Self::ForeignInterestRate => &mut p.foreign_interest_rate,
            Self::NominalWageGrowth => &mut p.nominal_wage_growth,
            Self::ProductivityShareRate => &mut p.productivity_share_rate,
            Self::WagePassThroughRate => &mut p.wage_pass_through_rate,
            Self::RetainedEarningsReturnRate => &mut p.retained_earnings_return_rate,
            Self::GlobalGrowth => &mut p.global_growth,
            Self::NaturalIncrease => &mut p.natural_increase,
            Self::EnergySubsidyRate => &mut p.energy_subsidy_rate,
            Self::BojQtRate => &mut p.boj_qt_rate,
            Self::FiscalRiskSensitivity => &mut p.fiscal_risk_sensitivity,
            Self::PopulationGrowth => &mut p.population_growth,
            Self::EducationGdpRatio => &mut p.education_gdp_ratio,
            Self::TechEffect => &mut p.tech_effect,
        };
        *field = value;
    }

    /// Copy of `p` with this key set to `value`.
    pub fn with(self, p: &ParameterSet, value: f64) -> ParameterSet {
        let mut out = p.clone();
        self.set(&mut out, value);
        out
    }
}

impl FromStr for ParamKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        ParamKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownParamKey(s.to_string()))
    }
}

/// A named preset: the baseline with a handful of overrides.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: &'static str,
    pub label: &'static str,
    pub params: ParameterSet,
}

/// The ten preset scenarios, baseline first.
pub fn scenarios() -> Vec<Scenario> {
    let base = ParameterSet::default();

    vec![
        Scenario {
            name: "baseline",
            label: "Status quo: current policy maintained",
            params: base.clone(),
        },
        // Structural reform succeeds; a fast-growing economy absorbs external deficits,
        // so the NFA defence line is relaxed.
        Scenario {
            name: "high-growth",
            label: "Structural reform lifts real growth",
            params: ParameterSet {
                real_growth: 2.0,
                risk_premium: 0.2,
                other_revenue: 16.0,
                nominal_wage_growth: 3.0,
                productivity_share_rate: 0.7,
                wage_pass_through_rate: 0.5,
                global_growth: 3.0,
                yen_depreciation: 0.0,
                retained_earnings_return_rate: 0.05,
                foreign_interest_rate: 3.0,
                population_growth: -0.3,
                labor_participation_change: 0.3,
                education_gdp_ratio: 4.5,
                tech_effect: 0.5,
                base_tfr: 1.30,
                tfr_sensitivity: 0.6,
                natural_increase: 0.3,
                init_tax_income: 24.0,
                init_tax_corporate: 18.0,
                init_policy_exp: 73.0,
                nfa_threshold: -500.0,
                ..base.clone()
            },
        },
        Scenario {
            name: "stagflation",
            label: "High inflation with zero real growth",
            params: ParameterSet {
                inflation_rate: 4.0,
                real_growth: 0.0,
                risk_premium: 1.0,
                natural_increase: 1.0,
                policy_rate_spread: 0.5,
                yen_depreciation: 1.5,
                nominal_wage_growth: 1.0,
                productivity_share_rate: 0.3,
                wage_pass_through_rate: 0.2,
                poverty_sensitivity: 0.8,
                energy_subsidy_rate: 0.5,
                retained_earnings_return_rate: 0.01,
                population_growth: -0.6,
                labor_participation_change: 0.0,
                education_gdp_ratio: 3.0,
                tech_effect: 0.1,
                base_tfr: 1.10,
                tfr_sensitivity: 0.3,
                ..base.clone()
            },
        },
        Scenario {
            name: "rate-spike",
            label: "Long-term yields jump on fiscal doubts",
            params: ParameterSet {
                inflation_rate: 2.5,
                real_growth: 0.3,
                risk_premium: 2.0,
                yen_depreciation: -1.0,
                nominal_wage_growth: 1.0,
                productivity_share_rate: 0.4,
                wage_pass_through_rate: 0.2,
                foreign_interest_rate: 3.0,
                labor_participation_change: 0.0,
                education_gdp_ratio: 3.2,
                tech_effect: 0.1,
                base_tfr: 1.15,
                tfr_sensitivity: 0.4,
                ..base.clone()
            },
        },
        Scenario {
            name: "consolidation",
            label: "Tax increases and spending restraint",
            params: ParameterSet {
                inflation_rate: 1.5,
                real_growth: 1.0,
                risk_premium: 0.3,
                init_tax_consumption: 26.0,
                init_tax_income: 24.0,
                init_tax_corporate: 18.0,
                init_policy_exp: 75.0,
                other_revenue: 17.0,
                natural_increase: 0.3,
                yen_depreciation: 0.0,
                nominal_wage_growth: 2.0,
                productivity_share_rate: 0.6,
                wage_pass_through_rate: 0.4,
                retained_earnings_return_rate: 0.03,
                foreign_interest_rate: 3.0,
                population_growth: -0.4,
                labor_participation_change: 0.2,
                education_gdp_ratio: 4.0,
                tech_effect: 0.3,
                base_tfr: 1.25,
                ..base.clone()
            },
        },
        Scenario {
            name: "sharp-depreciation",
            label: "Persistent and rapid yen weakness",
            params: ParameterSet {
                inflation_rate: 3.5,
                real_growth: 0.3,
                risk_premium: 1.0,
                yen_depreciation: 3.0,
                nominal_wage_growth: 1.0,
                productivity_share_rate: 0.3,
                wage_pass_through_rate: 0.2,
                global_growth: 2.0,
                poverty_sensitivity: 0.7,
                energy_subsidy_rate: 0.6,
                foreign_interest_rate: 4.5,
                foreign_inflation: 2.5,
                labor_participation_change: 0.0,
                education_gdp_ratio: 3.0,
                tech_effect: 0.1,
                base_tfr: 1.10,
                tfr_sensitivity: 0.4,
                ..base.clone()
            },
        },
        Scenario {
            name: "low-fertility",
            label: "Fertility decline accelerates",
            params: ParameterSet {
                real_growth: 0.0,
                natural_increase: 1.5,
                init_social_security: 39.0,
                childcare_growth: 3.0,
                nominal_wage_growth: 0.8,
                productivity_share_rate: 0.4,
                poverty_sensitivity: 0.6,
                yen_depreciation: 0.5,
                population_growth: -1.0,
                labor_participation_change: -0.1,
                education_gdp_ratio: 3.0,
                base_tfr: 0.90,
                tfr_sensitivity: 0.3,
                ..base.clone()
            },
        },
        Scenario {
            name: "tech-revolution",
            label: "AI and automation lift productivity",
            params: ParameterSet {
                real_growth: 2.0,
                inflation_rate: 1.5,
                risk_premium: 0.2,
                nominal_wage_growth: 2.5,
                wage_pass_through_rate: 0.5,
                global_growth: 3.5,
                init_tax_corporate: 19.0,
                effective_corporate_tax_rate: 0.25,
                yen_depreciation: -0.5,
                retained_earnings_return_rate: 0.03,
                foreign_interest_rate: 3.0,
                population_growth: -0.3,
                labor_participation_change: 0.3,
                education_gdp_ratio: 5.0,
                tech_effect: 0.8,
                natural_increase: 0.3,
                init_policy_exp: 73.0,
                ..base.clone()
            },
        },
        Scenario {
            name: "global-crisis",
            label: "World recession with an energy shock",
            params: ParameterSet {
                real_growth: -0.5,
                inflation_rate: 3.0,
                risk_premium: 1.5,
                yen_depreciation: 1.0,
                global_growth: 0.5,
                init_defense: 9.0,
                defense_growth: 4.0,
                energy_subsidy_rate: 0.7,
                nominal_wage_growth: 0.5,
                productivity_share_rate: 0.3,
                wage_pass_through_rate: 0.2,
                poverty_sensitivity: 0.8,
                natural_increase: 1.2,
                foreign_interest_rate: 4.0,
                foreign_inflation: 3.0,
                population_growth: -0.6,
                labor_participation_change: 0.0,
                education_gdp_ratio: 3.0,
                tech_effect: 0.1,
                base_tfr: 1.10,
                tfr_sensitivity: 0.3,
                ..base.clone()
            },
        },
        Scenario {
            name: "redistribution",
            label: "Progressive taxation funds wage and family support",
            params: ParameterSet {
                inflation_rate: 1.5,
                real_growth: 0.8,
                risk_premium: 0.3,
                init_tax_consumption: 23.8,
                init_tax_income: 28.0,
                init_tax_corporate: 23.0,
                init_policy_exp: 76.0,
                other_revenue: 18.0,
                natural_increase: 0.3,
                nominal_wage_growth: 2.5,
                productivity_share_rate: 0.7,
                wage_pass_through_rate: 0.6,
                effective_corporate_tax_rate: 0.26,
                yen_depreciation: 0.0,
                retained_earnings_return_rate: 0.06,
                foreign_interest_rate: 3.0,
                population_growth: -0.3,
                labor_participation_change: 0.2,
                education_gdp_ratio: 4.5,
                tech_effect: 0.3,
                base_tfr: 1.25,
                tfr_sensitivity: 0.6,
                ..base
            },
        },
    ]
}

/// Look a preset up by name or by 1-based position.
pub fn find_scenario(name_or_index: &str) -> ConfigResult<Scenario> {
    let all = scenarios();
    if let Ok(n) = name_or_index.parse::<usize>()
        && n >= 1
        && n <= all.len()
    {
        return Ok(all[n - 1].clone());
    }
    all.into_iter()
        .find(|s| s.name == name_or_index)
        .ok_or_else(|| ConfigError::UnknownScenario(name_or_index.to_string()))
}
