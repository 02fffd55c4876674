use serde::{Deserialize, Serialize};

use crate::types::Year;

/// One simulated fiscal year.
///
/// Monetary amounts are in trillion yen. Fields documented as "%" are
/// percentages (2.0 = 2%); the engine works in fractions internally.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct YearResult {
    pub year: Year,

    // ── Revenue ──────────────────────────────────────────────────────────────
    pub tax_consumption: f64,
    pub tax_income: f64,
    pub tax_corporate: f64,
    pub tax_other: f64,
    /// Sum of the four tax categories.
    pub tax: f64,
    /// Central-bank remittance; negative once losses pass through.
    pub boj_payment: f64,
    /// Non-tax revenue including the booked share of FX valuation gains.
    pub other_revenue: f64,
    pub other_revenue_stamp: f64,
    pub other_revenue_gov_assets: f64,
    pub other_revenue_asset_income: f64,
    pub other_revenue_misc: f64,
    /// Tax + remittance + other revenue.
    pub total_revenue: f64,
    pub bond_revenue: f64,
    /// Total revenue including bond issuance.
    pub revenue_total: f64,
    /// %
    pub revenue_tax_ratio: f64,
    /// %
    pub revenue_bond_ratio: f64,
    /// %
    pub revenue_other_ratio: f64,

    // ── Expenditure ──────────────────────────────────────────────────────────
    pub social_security: f64,
    pub childcare: f64,
    pub local_gov_transfer: f64,
    pub defense: f64,
    pub other_policy_exp: f64,
    pub energy_subsidy: f64,
    pub policy_exp: f64,
    /// Average coupon on outstanding debt, %.
    pub avg_coupon: f64,
    pub interest: f64,
    pub total_cost: f64,

    // ── Balance and debt ─────────────────────────────────────────────────────
    pub fiscal_balance: f64,
    pub bond_issuance: f64,
    pub debt: f64,
    /// %
    pub debt_to_gdp: f64,
    /// Interest ÷ tax × 100.
    pub interest_burden: f64,
    /// Policy expenditure deflated by cumulative inflation, year 0 = 100.
    pub real_policy_exp_index: f64,

    // ── Rates and premiums (%) ───────────────────────────────────────────────
    pub effective_market_rate: f64,
    pub fiscal_risk_premium: f64,
    pub dynamic_risk_premium: f64,
    pub nfa_deterioration_streak: u32,

    // ── Central bank ─────────────────────────────────────────────────────────
    pub boj_jgb: f64,
    pub boj_ca: f64,
    /// %
    pub boj_yield: f64,
    /// %
    pub policy_rate: f64,
    pub boj_revenue: f64,
    pub boj_cost: f64,
    pub boj_net_income: f64,
    pub boj_cumulative_loss: f64,

    // ── FX and trade ─────────────────────────────────────────────────────────
    /// Yen per dollar.
    pub exchange_rate: f64,
    /// Realised annual depreciation, %.
    pub yen_depreciation: f64,
    pub exports: f64,
    pub imports: f64,
    pub trade_balance: f64,
    pub investment_income: f64,
    pub current_account: f64,
    pub nfa: f64,
    pub fx_valuation_gain: f64,

    // ── Prices, wages, distribution ──────────────────────────────────────────
    /// Headline CPI increase, %.
    pub cpi_increase: f64,
    /// CPI increase net of the energy-subsidy offset, %.
    pub effective_cpi: f64,
    /// Wage growth before the corporate payout boost, %.
    pub endogenous_wage: f64,
    /// Wage growth including the payout boost, %.
    pub wage_increase: f64,
    /// %
    pub real_wage_growth: f64,
    /// %
    pub poverty_rate: f64,
    pub gini_index: f64,
    /// Top/bottom quintile income ratio implied by the Gini index.
    pub income_ratio: f64,

    // ── Corporate sector ─────────────────────────────────────────────────────
    pub nominal_gdp: f64,
    pub corporate_profit: f64,
    pub labor_cost: f64,
    pub worker_payout: f64,
    pub retained_earnings: f64,
    /// %
    pub retained_to_gdp: f64,

    // ── Demographics and human capital ───────────────────────────────────────
    pub labor_force_index: f64,
    pub human_capital_index: f64,
    /// %
    pub human_capital_growth: f64,
    /// %
    pub education_effect: f64,
    /// Education spending input for this year, % of GDP.
    pub education_gdp_ratio: f64,
    /// Population growth after the lagged fertility correction, %.
    pub effective_population_growth: f64,
    pub tfr: f64,
    pub social_vitality_index: f64,

    // ── Model household (ten-thousand yen per year) ──────────────────────────
    pub model_income: f64,
    pub model_disposable: f64,
    pub model_food_cost: f64,
    pub model_energy_cost: f64,
    pub model_income_change: f64,
    pub model_disposable_change: f64,
    pub model_food_cost_change: f64,
    pub model_energy_cost_change: f64,
}

impl YearResult {
    /// Net integrated-government interest: gross interest less the central-bank remittance.
    pub fn net_interest(&self) -> f64 {
        self.interest - self.boj_payment
    }
}
