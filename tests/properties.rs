use proptest::prelude::*;

use govsim::analysis::verify_accounting;
use govsim::config::{ParamKey, ParameterSet, TaxChangeYear};
use govsim::history::HistoricalSeries;
use govsim::optimizer::{Optimizer, adjustable};
use govsim::results::YearResult;
use govsim::simulation::simulate;
use govsim::types::Year;
use govsim::warnings::{WarningKind, evaluate};

fn tax_change_year() -> impl Strategy<Value = TaxChangeYear> {
    prop_oneof![
        Just(TaxChangeYear::Never),
        Just(TaxChangeYear::In2030),
        Just(TaxChangeYear::In2035),
        Just(TaxChangeYear::In2040),
    ]
}

prop_compose! {
    fn parameter_set()(
        inflation in 0.0f64..10.0,
        growth in -2.0f64..5.0,
        risk in 0.0f64..6.0,
        depreciation in -3.0f64..10.0,
        qt in 0.0f64..80.0,
        buffer in 0.0f64..30.0,
        population in -2.0f64..1.0,
        education in 2.0f64..7.0,
        change in tax_change_year(),
        new_rate in 5.0f64..20.0,
        years in 0usize..80,
    ) -> ParameterSet {
        ParameterSet {
            inflation_rate: inflation,
            real_growth: growth,
            risk_premium: risk,
            yen_depreciation: depreciation,
            boj_qt_rate: qt,
            boj_capital_buffer: buffer,
            population_growth: population,
            education_gdp_ratio: education,
            tax_rate_change_year: change,
            tax_rate_new: new_rate,
            sim_years: years,
            ..ParameterSet::default()
        }
    }
}

proptest! {
    #[test]
    fn identical_inputs_are_bit_identical(p in parameter_set()) {
        let history = HistoricalSeries::japan();
        prop_assert_eq!(simulate(&p, &history), simulate(&p, &history));
    }

    #[test]
    fn length_is_clamped_horizon(p in parameter_set()) {
        let results = simulate(&p, &HistoricalSeries::japan());
        let expected = if p.sim_years == 0 { 30 } else { p.sim_years.clamp(30, 50) };
        prop_assert_eq!(results.len(), expected);
        for (i, r) in results.iter().enumerate() {
            prop_assert_eq!(r.year, Year::BASE.offset(i));
        }
    }

    #[test]
    fn debt_rolls_forward(p in parameter_set()) {
        let results = simulate(&p, &HistoricalSeries::japan());
        for w in results.windows(2) {
            let expected = w[0].debt + (w[1].total_cost - w[1].total_revenue);
            let tol = 1e-9 * expected.abs().max(1.0);
            prop_assert!((w[1].debt - expected).abs() <= tol, "{}: {} vs {}", w[1].year, w[1].debt, expected);
        }
    }

    #[test]
    fn central_bank_invariants(p in parameter_set()) {
        for r in simulate(&p, &HistoricalSeries::japan()) {
            prop_assert!(r.boj_cumulative_loss >= 0.0);
            prop_assert!(r.boj_jgb >= p.boj_ca_floor);
            prop_assert!(r.boj_ca >= p.boj_ca_floor);
            if r.boj_net_income > 0.0 {
                prop_assert!(r.boj_payment <= r.boj_net_income);
            }
        }
    }

    #[test]
    fn engine_output_passes_accounting_audit(p in parameter_set()) {
        let results = simulate(&p, &HistoricalSeries::japan());
        let violations = verify_accounting(&results, &p);
        prop_assert!(violations.is_empty(), "{:?}", violations);
    }

    #[test]
    fn real_wage_warnings_match_streak_lengths(signs in prop::collection::vec(any::<bool>(), 30..50)) {
        let rows: Vec<YearResult> = signs
            .iter()
            .enumerate()
            .map(|(i, &negative)| YearResult {
                year: Year::BASE.offset(i),
                real_wage_growth: if negative { -1.0 } else { 1.0 },
                ..YearResult::default()
            })
            .collect();

        let mut expected = 0usize;
        let mut run = 0usize;
        for &negative in &signs {
            run = if negative { run + 1 } else { 0 };
            if run >= 3 {
                expected += 1;
            }
        }

        let got = evaluate(&rows, &ParameterSet::default())
            .iter()
            .filter(|w| w.kind == WarningKind::RealWageDecline)
            .count();
        prop_assert_eq!(got, expected);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(6))]

    #[test]
    fn optimizer_best_objective_never_increases(risk in 0.0f64..3.0, growth in -1.0f64..2.0) {
        let base = ParameterSet {
            risk_premium: (risk * 10.0).round() / 10.0,
            real_growth: (growth * 10.0).round() / 10.0,
            ..ParameterSet::default()
        };
        let opt = Optimizer::new(
            base,
            adjustable(&[ParamKey::RealGrowth, ParamKey::RiskPremium]),
            HistoricalSeries::japan(),
            None,
        );
        let initial = opt.state().best_objective;
        let mut bests = vec![initial];
        let mut done = 0;
        let last = opt.run(|p| {
            bests.push(p.best_objective);
            done += usize::from(p.done);
        });
        prop_assert_eq!(done, 1);
        prop_assert!(bests.windows(2).all(|w| w[1] <= w[0]));
        prop_assert!(last.best_objective <= initial);
    }
}
