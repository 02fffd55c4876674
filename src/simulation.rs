use crate::config::ParameterSet;
use crate::history::{HistoricalSeries, Timeline};
use crate::results::YearResult;
use crate::types::Year;

// ── Model constants ──────────────────────────────────────────────────────────

/// Interest ÷ tax (%) in the year before the first simulated year.
const INITIAL_INTEREST_BURDEN: f64 = 12.8;
/// Cap on each of the fiscal and currency risk premiums (fraction).
const PREMIUM_CAP: f64 = 0.03;
/// Currency-premium acceleration per year of worsening current account.
const STREAK_ACCELERATION: f64 = 0.3;

const FX_ALPHA: f64 = 0.5;
const FX_BETA: f64 = 0.3;
const FX_GAMMA: f64 = 0.5;
/// Floor on annual depreciation (a 50% appreciation).
const MIN_YEN_DEPRECIATION: f64 = -0.5;
const IMPORT_PASS_THROUGH: f64 = 0.7;
const EXPORT_ELASTICITY: f64 = 0.15;
const NFA_YIELD: f64 = 0.03;
const FX_RESERVE_BOOKING: f64 = 0.1;

const EDU_ELASTICITY: f64 = 0.015;
const EDU_BASE: f64 = 3.0;
const EDU_LAG: i64 = 15;
const AGING_PENALTY: f64 = 0.3;
const TFR_LAG: i64 = 20;
const TFR_FEEDBACK: f64 = 0.005;
const TFR_MIN: f64 = 0.8;
const TFR_MAX: f64 = 2.07;
/// Childcare spending, % of GDP, at which the childcare effect on TFR is zero.
const CHILDCARE_REFERENCE_PCT: f64 = 0.81;
const VITALITY_CAP: f64 = 0.003;
const HUMAN_CAPITAL_GDP_SHARE: f64 = 0.4;
const HUMAN_CAPITAL_WAGE_SHARE: f64 = 0.3;

const POVERTY_RECOVERY_PACE: f64 = 0.3;

const INCOME_TAX_ELASTICITY: f64 = 1.4;
/// Consumption-tax rate (%) in force before any change year.
const CURRENT_CONSUMPTION_TAX: f64 = 10.0;

const NATURAL_INCREASE_BUDGETED: f64 = 0.7;
const BOND_ROLLOVER_SHARE: f64 = 1.0 / 9.0;
const MAX_NEW_ISSUANCE_SHARE: f64 = 0.3;

// Model household archetype (ten-thousand yen per year).
const BASE_INCOME: f64 = 400.0;
const BASE_FOOD_RATIO: f64 = 0.255;
const BASE_ENERGY_RATIO: f64 = 0.073;
const TAX_SOCIAL_RATIO: f64 = 0.30;

/// `num / den`, or 0 when `den` is zero.
fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 { 0.0 } else { num / den }
}

/// Stocks carried between years that are not (or not only) read back from the previous row.
struct EngineState {
    boj_cumulative_loss: f64,
    boj_jgb: f64,
    boj_ca: f64,
    /// Fraction, not %.
    boj_yield: f64,
    retained_earnings: f64,
    nfa_deterioration_streak: u32,
    human_capital_index: f64,
    labor_force_index: f64,
    cumulative_cpi: f64,
    cumulative_wage: f64,
}

impl EngineState {
    fn new(p: &ParameterSet) -> Self {
        EngineState {
            boj_cumulative_loss: 0.0,
            boj_jgb: p.init_boj_jgb,
            boj_ca: p.boj_ca,
            boj_yield: p.boj_yield / 100.0,
            retained_earnings: p.init_retained_earnings,
            nfa_deterioration_streak: 0,
            human_capital_index: 100.0,
            labor_force_index: 100.0,
            cumulative_cpi: 1.0,
            cumulative_wage: 1.0,
        }
    }
}

/// Deterministic year-by-year engine.
///
/// Each `step()` appends one `YearResult`. Sub-models run in dependency order:
/// the market rate reads only the previous year's interest burden and current
/// account, so no year depends on itself.
pub struct Simulation<'h> {
    params: ParameterSet,
    history: &'h HistoricalSeries,
    horizon: usize,
    results: Vec<YearResult>,
    state: EngineState,
}

impl<'h> Simulation<'h> {
    pub fn new(params: ParameterSet, history: &'h HistoricalSeries) -> Self {
        let horizon = params.horizon();
        let state = EngineState::new(&params);
        Simulation {
            params,
            history,
            horizon,
            results: Vec::with_capacity(horizon),
            state,
        }
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn results(&self) -> &[YearResult] {
        &self.results
    }

    pub fn is_finished(&self) -> bool {
        self.results.len() >= self.horizon
    }

    /// Run to the horizon and hand back the full sequence.
    pub fn run(mut self) -> Vec<YearResult> {
        while self.step().is_some() {}
        if let Some(last) = self.results.last() {
            log::debug!(
                "simulated {} years: final debt {:.1}, interest burden {:.1}%",
                self.horizon,
                last.debt,
                last.interest_burden
            );
        }
        self.results
    }

    /// Simulate the next year. Returns `None` once the horizon is reached.
    pub fn step(&mut self) -> Option<&YearResult> {
        if self.is_finished() {
            return None;
        }
        let row = self.compute_year();
        log::trace!(
            "{}: debt {:.1} burden {:.2}% market rate {:.2}%",
            row.year,
            row.debt,
            row.interest_burden,
            row.effective_market_rate
        );
        self.results.push(row);
        self.results.last()
    }

    fn compute_year(&mut self) -> YearResult {
        let p = &self.params;
        let st = &mut self.state;
        let i = self.results.len();
        let year = Year::BASE.offset(i);
        let prev = self.results.last();
        let timeline = Timeline::new(&self.results, self.history);

        let b = p.inflation_rate / 100.0;
        let c = p.real_growth / 100.0;
        let d = b + c;
        let change_year = p.tax_rate_change_year.year();
        let in_change_year = change_year == Some(year.0);
        let after_change = change_year.is_some_and(|y| year.0 >= y);

        let prev_nfa = prev.map_or(p.init_nfa, |r| r.nfa);
        let prev_ca = prev.map_or(0.0, |r| r.current_account);
        let prev_burden = prev.map_or(INITIAL_INTEREST_BURDEN, |r| r.interest_burden);

        // ── Risk premiums ────────────────────────────────────────────────────
        if i >= 2 {
            st.nfa_deterioration_streak = next_deterioration_streak(
                st.nfa_deterioration_streak,
                self.results[i - 1].current_account,
                self.results[i - 2].current_account,
            );
        }

        let dynamic_risk_premium = if i > 0 && prev_ca < 0.0 && prev_nfa < p.nfa_threshold {
            let acceleration = 1.0 + st.nfa_deterioration_streak as f64 * STREAK_ACCELERATION;
            (p.currency_risk_premium / 100.0 * acceleration).min(PREMIUM_CAP)
        } else {
            0.0
        };

        let fiscal_risk_premium = if prev_burden > p.interest_burden_threshold {
            ((prev_burden - p.interest_burden_threshold) * p.fiscal_risk_sensitivity / 100.0)
                .min(PREMIUM_CAP)
        } else {
            0.0
        };

        // ── Human capital and labour force ───────────────────────────────────
        let tfr_feedback = timeline
            .tfr(i as i64 - TFR_LAG)
            .map_or(0.0, |t| ((t - p.base_tfr) * TFR_FEEDBACK).clamp(-TFR_FEEDBACK, TFR_FEEDBACK));
        let pop_growth = p.population_growth / 100.0 + tfr_feedback;

        if i > 0 {
            st.labor_force_index *=
                1.0 + pop_growth + p.labor_participation_change / 100.0;
        }

        let lagged_education = timeline
            .education_gdp_ratio(i as i64 - EDU_LAG)
            .unwrap_or(EDU_BASE);
        let education_effect = EDU_ELASTICITY * (lagged_education - EDU_BASE) / EDU_BASE;
        let human_capital_growth =
            education_effect + p.tech_effect / 100.0 - pop_growth.abs() * AGING_PENALTY;
        let prev_human_capital_index = st.human_capital_index;
        st.human_capital_index *= 1.0 + human_capital_growth;

        // ── Fertility and social vitality ────────────────────────────────────
        let recent_wages = &self.results[i.saturating_sub(3)..];
        let avg_recent_wage = if recent_wages.is_empty() {
            0.0
        } else {
            recent_wages.iter().map(|r| r.real_wage_growth).sum::<f64>()
                / recent_wages.len() as f64
                / 100.0
        };
        let current_gini = prev.map_or(p.init_gini, |r| r.gini_index);
        let childcare_pct = match prev {
            None => ratio(p.init_childcare, p.init_nominal_gdp) * 100.0,
            Some(r) => ratio(r.childcare, r.nominal_gdp) * 100.0,
        };
        let s = p.tfr_sensitivity;
        let tfr = (p.base_tfr
            + 0.08 * avg_recent_wage * 3.0 * s
            + 1.5 * (p.init_gini - current_gini) * s
            + 0.15 * (childcare_pct - CHILDCARE_REFERENCE_PCT) * s)
            .clamp(TFR_MIN, TFR_MAX);

        let recent_tfr = &self.results[i.saturating_sub(5)..];
        let tfr_trend = match (recent_tfr.first(), recent_tfr.last()) {
            (Some(first), Some(last)) if recent_tfr.len() >= 2 => {
                (last.tfr - first.tfr) / recent_tfr.len() as f64
            }
            _ => 0.0,
        };
        let vitality_boost = (tfr_trend * 0.1).clamp(-VITALITY_CAP, VITALITY_CAP);
        let hc_d = d + human_capital_growth * HUMAN_CAPITAL_GDP_SHARE + vitality_boost;

        let social_vitality_index = 100.0
            * ratio(tfr, p.base_tfr)
            * (1.0 + human_capital_growth)
            * (1.0 + avg_recent_wage);
        let ss_pressure = if pop_growth < 0.0 { pop_growth.abs() * 0.5 } else { 0.0 };

        // ── Market rate and central bank ─────────────────────────────────────
        let e = hc_d + p.risk_premium / 100.0 + dynamic_risk_premium + fiscal_risk_premium;

        if i > 0 {
            st.boj_ca = (st.boj_ca - p.boj_qt_rate).max(p.boj_ca_floor);
            st.boj_jgb = (st.boj_jgb - p.boj_qt_rate).max(p.boj_ca_floor);
            st.boj_yield = st.boj_yield * 8.0 / 9.0 + e / 9.0;
        }
        let policy_rate = (e - p.policy_rate_spread / 100.0).max(0.0);
        let boj_revenue = st.boj_jgb * st.boj_yield;
        let boj_cost = st.boj_ca * policy_rate;
        let boj_net_income = boj_revenue - boj_cost;
        if boj_net_income < 0.0 {
            st.boj_cumulative_loss += boj_net_income.abs();
        } else {
            st.boj_cumulative_loss = (st.boj_cumulative_loss - boj_net_income).max(0.0);
        }
        let boj_payment = if st.boj_cumulative_loss > p.boj_capital_buffer {
            boj_net_income
        } else {
            boj_net_income.max(0.0)
        };

        // ── FX and trade ─────────────────────────────────────────────────────
        let yen_dep = (p.yen_depreciation / 100.0
            + FX_ALPHA * (p.foreign_interest_rate / 100.0 - e)
            + FX_BETA * (b - p.foreign_inflation / 100.0)
            + FX_GAMMA * dynamic_risk_premium)
            .max(MIN_YEN_DEPRECIATION);
        let depreciation = yen_dep.max(0.0);
        let exchange_rate = prev.map_or(p.init_exchange_rate, |r| r.exchange_rate) * (1.0 + yen_dep);
        let cumulative_depreciation = (ratio(exchange_rate, p.init_exchange_rate) - 1.0).max(0.0);

        let imports = prev.map_or(p.init_import, |r| r.imports)
            * (1.0 + c)
            * (1.0 + b)
            * (1.0 + depreciation * IMPORT_PASS_THROUGH);
        let exports = prev.map_or(p.init_export, |r| r.exports)
            * (1.0 + p.global_growth / 100.0)
            * (1.0 + depreciation * EXPORT_ELASTICITY);
        let trade_balance = exports - imports;

        let real_nfa = prev_nfa / (1.0 + cumulative_depreciation);
        let investment_income = real_nfa * NFA_YIELD * (1.0 + cumulative_depreciation * 0.5);
        let current_account = trade_balance + investment_income;
        let nfa = prev_nfa + current_account;
        let fx_valuation_gain = p.fx_reserves * yen_dep;

        // ── Output and wages ─────────────────────────────────────────────────
        let nominal_gdp = prev.map_or(p.init_nominal_gdp, |r| r.nominal_gdp) * (1.0 + hc_d);
        let prod_share = p.productivity_share_rate;
        let endogenous_wage = c * prod_share
            + b * p.wage_pass_through_rate
            + human_capital_growth * HUMAN_CAPITAL_WAGE_SHARE;
        let nom_wage_growth = endogenous_wage.max(p.nominal_wage_growth / 100.0);

        // ── Tax revenue ──────────────────────────────────────────────────────
        let mut tax_consumption = prev.map_or(p.init_tax_consumption, |r| r.tax_consumption) * (1.0 + b);
        if in_change_year {
            tax_consumption *= p.tax_rate_new / CURRENT_CONSUMPTION_TAX;
        }
        let wage_driver = prev.map_or(nom_wage_growth, |r| r.wage_increase / 100.0);
        let tax_income = prev.map_or(p.init_tax_income, |r| r.tax_income)
            * (1.0 + (hc_d * 0.5 + wage_driver * 0.5) * INCOME_TAX_ELASTICITY)
            * ratio(st.human_capital_index, prev_human_capital_index);
        let tax_corporate = prev.map_or(p.init_tax_corporate, |r| r.tax_corporate)
            * (1.0 + c * 2.0 + b * 0.5)
            * (1.0 + depreciation * 0.3 - depreciation * 0.2);
        let tax_other = prev.map_or(p.init_tax_other, |r| r.tax_other) * (1.0 + d * 0.8);
        let tax = tax_consumption + tax_income + tax_corporate + tax_other;

        // ── Corporate sector ─────────────────────────────────────────────────
        let corporate_profit = ratio(tax_corporate, p.effective_corporate_tax_rate);
        let labor_cost = nominal_gdp * prod_share * nom_wage_growth;
        let worker_payout = st.retained_earnings * p.retained_earnings_return_rate;
        st.retained_earnings += corporate_profit - labor_cost - worker_payout;
        let retained_to_gdp = ratio(st.retained_earnings, nominal_gdp) * 100.0;
        let payout_wage_boost = ratio(worker_payout, nominal_gdp);

        // ── Prices, wages, distribution ──────────────────────────────────────
        let tax_cpi_effect = if in_change_year {
            (p.tax_rate_new - CURRENT_CONSUMPTION_TAX) / (100.0 + CURRENT_CONSUMPTION_TAX) * 0.4
        } else {
            0.0
        };
        let cpi_increase = b + depreciation * 0.3 + tax_cpi_effect;
        let effective_cpi = cpi_increase - cpi_increase * p.energy_subsidy_rate * 0.5;
        let wage_increase = nom_wage_growth + payout_wage_boost;
        let real_wage_growth = wage_increase - effective_cpi;

        let sensitivity = p.poverty_sensitivity * (1.0 + (1.0 - prod_share) * 0.5);
        let prev_poverty = prev.map_or(p.init_poverty_rate, |r| r.poverty_rate);
        let poverty_rate = next_poverty_rate(prev_poverty, effective_cpi, wage_increase, sensitivity);
        // The first year books signed FX moves; later years only depreciation.
        let fx_move = if prev.is_none() { yen_dep } else { depreciation };
        let asset_growth = fx_move * 0.5 + c;
        let gini_index = current_gini + (asset_growth - real_wage_growth) * 0.01;

        // ── Expenditure ──────────────────────────────────────────────────────
        let energy_subsidy = p.inflation_rate * 10.0
            * p.energy_subsidy_rate
            * (1.0 + cpi_increase)
            * (1.0 + depreciation * 0.5);
        let other_revenue = p.other_revenue + (fx_valuation_gain * FX_RESERVE_BOOKING).max(0.0);

        let (social_security, childcare, local_gov_transfer, defense, other_policy_exp) = match prev {
            None => {
                let ss = p.init_social_security * (1.0 + ss_pressure);
                let known = ss + p.init_childcare + p.init_local_gov_transfer + p.init_defense;
                (
                    ss,
                    p.init_childcare,
                    p.init_local_gov_transfer,
                    p.init_defense,
                    (p.init_policy_exp - known).max(0.0),
                )
            }
            Some(r) => (
                r.social_security * (1.0 + b)
                    + p.natural_increase * NATURAL_INCREASE_BUDGETED
                    + ss_pressure * r.social_security,
                r.childcare * (1.0 + p.childcare_growth / 100.0),
                r.local_gov_transfer * (1.0 + d * 0.5),
                r.defense * (1.0 + p.defense_growth / 100.0),
                r.other_policy_exp * (1.0 + b),
            ),
        };
        let policy_exp = social_security
            + childcare
            + local_gov_transfer
            + defense
            + other_policy_exp
            + energy_subsidy;

        // ── Debt service and aggregation ─────────────────────────────────────
        // Year 0 pays the initial coupon as-is; later years roll 1/9 of the
        // stock plus last year's new issuance into the market rate.
        let avg_coupon = match prev {
            None => p.init_avg_coupon / 100.0,
            Some(r) => {
                let bond_share = if r.debt > 0.0 { r.bond_issuance / r.debt } else { 0.0 };
                let new_share = (BOND_ROLLOVER_SHARE + bond_share).min(MAX_NEW_ISSUANCE_SHARE);
                r.avg_coupon / 100.0 * (1.0 - new_share) + e * new_share
            }
        };
        let prev_debt = prev.map_or(p.init_debt, |r| r.debt);
        let interest = prev_debt * avg_coupon;

        let total_revenue = tax + boj_payment + other_revenue;
        let total_cost = policy_exp + interest;
        let fiscal_balance = total_revenue - total_cost;
        let debt = prev_debt + (total_cost - total_revenue);
        let bond_issuance = (total_cost - total_revenue).max(0.0);
        let interest_burden = ratio(interest, tax) * 100.0;
        let debt_to_gdp = match prev {
            None => ratio(p.init_debt, nominal_gdp) * 100.0,
            Some(_) => ratio(debt, nominal_gdp) * 100.0,
        };

        let revenue_total = total_revenue + bond_issuance;
        let share_of_revenue = |x: f64| if revenue_total > 0.0 { x / revenue_total * 100.0 } else { 0.0 };

        let real_policy_exp_index = match self.results.first() {
            Some(first) if first.policy_exp > 0.0 => {
                ratio(policy_exp, (1.0 + b).powi(i as i32)) / first.policy_exp * 100.0
            }
            _ => 100.0,
        };

        // ── Model household ──────────────────────────────────────────────────
        st.cumulative_cpi *= 1.0 + cpi_increase;
        st.cumulative_wage *= 1.0 + wage_increase;
        let model_income = match prev {
            None => BASE_INCOME * (1.0 + nom_wage_growth),
            Some(_) => BASE_INCOME * st.cumulative_wage,
        };
        let model_food_cost = BASE_INCOME * BASE_FOOD_RATIO * st.cumulative_cpi;
        let model_energy_cost = BASE_INCOME
            * BASE_ENERGY_RATIO
            * st.cumulative_cpi
            * (1.0 + cumulative_depreciation * 0.5)
            * (1.0 - p.energy_subsidy_rate * 0.5);
        let mut model_disposable =
            model_income * (1.0 - TAX_SOCIAL_RATIO) - model_food_cost - model_energy_cost;
        if after_change {
            model_disposable -= model_disposable.max(0.0)
                * ratio(p.tax_rate_new - CURRENT_CONSUMPTION_TAX, 100.0 + p.tax_rate_new);
        }
        let base_disposable =
            BASE_INCOME * (1.0 - TAX_SOCIAL_RATIO - BASE_FOOD_RATIO - BASE_ENERGY_RATIO);

        YearResult {
            year,
            tax_consumption,
            tax_income,
            tax_corporate,
            tax_other,
            tax,
            boj_payment,
            other_revenue,
            other_revenue_stamp: other_revenue * 0.30,
            other_revenue_gov_assets: other_revenue * 0.20,
            other_revenue_asset_income: other_revenue * 0.25,
            other_revenue_misc: other_revenue * 0.25,
            total_revenue,
            bond_revenue: bond_issuance,
            revenue_total,
            revenue_tax_ratio: share_of_revenue(tax),
            revenue_bond_ratio: share_of_revenue(bond_issuance),
            revenue_other_ratio: share_of_revenue(boj_payment + other_revenue),
            social_security,
            childcare,
            local_gov_transfer,
            defense,
            other_policy_exp,
            energy_subsidy,
            policy_exp,
            avg_coupon: avg_coupon * 100.0,
            interest,
            total_cost,
            fiscal_balance,
            bond_issuance,
            debt,
            debt_to_gdp,
            interest_burden,
            real_policy_exp_index,
            effective_market_rate: e * 100.0,
            fiscal_risk_premium: fiscal_risk_premium * 100.0,
            dynamic_risk_premium: dynamic_risk_premium * 100.0,
            nfa_deterioration_streak: st.nfa_deterioration_streak,
            boj_jgb: st.boj_jgb,
            boj_ca: st.boj_ca,
            boj_yield: st.boj_yield * 100.0,
            policy_rate: policy_rate * 100.0,
            boj_revenue,
            boj_cost,
            boj_net_income,
            boj_cumulative_loss: st.boj_cumulative_loss,
            exchange_rate,
            yen_depreciation: yen_dep * 100.0,
            exports,
            imports,
            trade_balance,
            investment_income,
            current_account,
            nfa,
            fx_valuation_gain,
            cpi_increase: cpi_increase * 100.0,
            effective_cpi: effective_cpi * 100.0,
            endogenous_wage: endogenous_wage * 100.0,
            wage_increase: wage_increase * 100.0,
            real_wage_growth: real_wage_growth * 100.0,
            poverty_rate,
            gini_index,
            income_ratio: income_ratio(gini_index),
            nominal_gdp,
            corporate_profit,
            labor_cost,
            worker_payout,
            retained_earnings: st.retained_earnings,
            retained_to_gdp,
            labor_force_index: st.labor_force_index,
            human_capital_index: st.human_capital_index,
            human_capital_growth: human_capital_growth * 100.0,
            education_effect: education_effect * 100.0,
            education_gdp_ratio: p.education_gdp_ratio,
            effective_population_growth: pop_growth * 100.0,
            tfr,
            social_vitality_index,
            model_income,
            model_disposable,
            model_food_cost,
            model_energy_cost,
            model_income_change: model_income - BASE_INCOME,
            model_disposable_change: model_disposable - base_disposable,
            model_food_cost_change: model_food_cost - BASE_INCOME * BASE_FOOD_RATIO,
            model_energy_cost_change: model_energy_cost - BASE_INCOME * BASE_ENERGY_RATIO,
        }
    }
}

/// Years of worsening deficit: +1 when the current account is negative and
/// falling, otherwise decays by one.
fn next_deterioration_streak(streak: u32, last_ca: f64, before_ca: f64) -> u32 {
    if last_ca - before_ca < 0.0 && last_ca < 0.0 {
        streak + 1
    } else {
        streak.saturating_sub(1)
    }
}

/// Improvement runs at 30% of the pace of deterioration.
fn next_poverty_rate(prev: f64, effective_cpi: f64, wage_increase: f64, sensitivity: f64) -> f64 {
    if effective_cpi > wage_increase {
        prev * (1.0 + (effective_cpi - wage_increase) * sensitivity)
    } else {
        prev * (1.0 - (wage_increase - effective_cpi) * sensitivity * POVERTY_RECOVERY_PACE)
    }
}

/// Top/bottom quintile income ratio implied by a Gini index; never below 1.
fn income_ratio(gini: f64) -> f64 {
    ratio(1.0 + gini, 1.0 - gini).max(1.0)
}

/// Run one full simulation.
pub fn simulate(params: &ParameterSet, history: &HistoricalSeries) -> Vec<YearResult> {
    Simulation::new(params.clone(), history).run()
}
