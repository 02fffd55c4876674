use std::fs::File;
use std::io::{BufWriter, Write};

use anyhow::{Context, Result, bail};
use govsim::analysis::{self, RunSummary};
use govsim::config::{self, ParamKey, ParameterSet};
use govsim::constraints::Constraints;
use govsim::history::HistoricalSeries;
use govsim::optimizer::{self, OptimizerProgress};
use govsim::results::YearResult;
use govsim::simulation::simulate;
use govsim::warnings::{self, Severity};

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    let mut scenario: Option<String> = None;
    let mut params_path: Option<String> = None;
    let mut years_override: Option<usize> = None;
    let mut output_path = "results.ndjson".to_string();
    let mut quiet = false;
    let mut compare = false;
    let mut optimize: Option<String> = None;
    let mut use_constraints = true;

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        let mut value = || {
            i += 1;
            args.get(i)
                .cloned()
                .with_context(|| format!("{flag} requires a value"))
        };
        match flag {
            "--scenario" => scenario = Some(value()?),
            "--params" => params_path = Some(value()?),
            "--years" => {
                let v = value()?;
                years_override = Some(v.parse().with_context(|| format!("--years: '{v}' is not a number"))?);
            }
            "--output" => output_path = value()?,
            "--optimize" => optimize = Some(value()?),
            "--quiet" => quiet = true,
            "--compare" => compare = true,
            "--no-constraints" => use_constraints = false,
            other => log::warn!("ignoring unknown argument {other}"),
        }
        i += 1;
    }

    let history = HistoricalSeries::japan();

    if compare {
        let mut presets = config::scenarios();
        if let Some(y) = years_override {
            for s in &mut presets {
                s.params.sim_years = y;
                s.params.normalize_horizon();
            }
        }
        let summaries = analysis::compare_scenarios(&presets, &history);
        print_comparison(&summaries);
        return Ok(());
    }

    let mut params = match (&scenario, &params_path) {
        (Some(_), Some(_)) => bail!("--scenario and --params are mutually exclusive"),
        (Some(name), None) => config::find_scenario(name)?.params,
        (None, Some(path)) => ParameterSet::from_json_path(path)
            .with_context(|| format!("loading parameters from {path}"))?,
        (None, None) => ParameterSet::default(),
    };
    if let Some(y) = years_override {
        params.sim_years = y;
    }
    params.normalize_horizon();

    if let Some(keys) = optimize {
        let keys = keys
            .split(',')
            .filter(|k| !k.trim().is_empty())
            .map(str::parse::<ParamKey>)
            .collect::<Result<Vec<_>, _>>()?;
        let constraints = use_constraints.then(Constraints::default);
        return run_optimizer(params, &keys, history, constraints, quiet);
    }

    let results = simulate(&params, &history);

    let file = File::create(&output_path).with_context(|| format!("creating {output_path}"))?;
    let mut writer = BufWriter::new(file);
    for r in &results {
        serde_json::to_writer(&mut writer, r)?;
        writeln!(writer)?;
    }
    writer.flush()?;

    if !quiet {
        println!("Simulated {} years → {output_path}", results.len());
        print_milestones(&results);
        print_warnings(&results, &params);
        print_audit(&results, &params);
    }
    Ok(())
}

fn run_optimizer(
    params: ParameterSet,
    keys: &[ParamKey],
    history: HistoricalSeries,
    constraints: Option<Constraints>,
    quiet: bool,
) -> Result<()> {
    let base = params.clone();
    let handle = optimizer::start(
        params,
        optimizer::adjustable(keys),
        history,
        constraints,
        move |p: OptimizerProgress| {
            if !quiet && !p.done {
                println!(
                    "  iter {:>3}/{:<3} current {:>4}  best {:>4}",
                    p.iteration, p.max_iterations, p.current_objective, p.best_objective
                );
            }
        },
    );
    let last = handle.join();

    println!(
        "\n=== Optimizer: {:?} after {} iterations, best objective {} ===",
        last.status, last.iteration, last.best_objective
    );
    for key in keys {
        let before = key.get(&base);
        let after = key.get(&last.best_params);
        let marker = if before != after { "*" } else { " " };
        println!("  {marker} {:<30} {before:>8.3} → {after:>8.3}", key.as_str());
    }
    println!("{}", serde_json::to_string_pretty(&last.best_params)?);
    Ok(())
}

fn print_milestones(results: &[YearResult]) {
    println!("\n=== Milestones ===");
    println!(
        "{:>4} | {:>8} | {:>7} | {:>7} | {:>7} | {:>7} | {:>7} | {:>7} | {:>6} | {:>5}",
        "Year", "Debt", "Debt/Y%", "Burden%", "Rate%", "Coupon%", "NetInt", "NFA", "Pov%", "TFR"
    );
    println!("{}", "-".repeat(90));
    for r in analysis::milestones(results) {
        println!(
            "{:>4} | {:>8.1} | {:>7.1} | {:>7.1} | {:>7.2} | {:>7.2} | {:>7.1} | {:>7.1} | {:>6.1} | {:>5.2}",
            r.year,
            r.debt,
            r.debt_to_gdp,
            r.interest_burden,
            r.effective_market_rate,
            r.avg_coupon,
            r.net_interest(),
            r.nfa,
            r.poverty_rate,
            r.tfr,
        );
    }
}

fn print_warnings(results: &[YearResult], params: &ParameterSet) {
    let ws = warnings::evaluate(results, params);
    let critical = ws.iter().filter(|w| w.severity == Severity::Critical).count();
    println!("\n=== Warnings: {} ({critical} critical) ===", ws.len());
    for w in &ws {
        println!("  {w}");
    }
}

fn print_audit(results: &[YearResult], params: &ParameterSet) {
    let violations = analysis::verify_accounting(results, params);
    if violations.is_empty() {
        println!("\nAccounting identities: PASS");
    } else {
        println!("\nAccounting identities: FAIL ({} violation(s))", violations.len());
        for v in &violations {
            println!("    {v}");
        }
    }
}

fn print_comparison(summaries: &[RunSummary]) {
    println!("\n=== Scenario comparison ===");
    println!(
        "{:<20} | {:>8} | {:>7} | {:>6} | {:>6} | {:>8} | {:>8} | {:>6} | {:>5} | {:>5}",
        "Scenario", "Debt", "Burden%", "Pov%", "Gini", "Debt/Y%", "NFA", "RW%", "Warn#", "Grade"
    );
    println!("{}", "-".repeat(104));
    for s in summaries {
        println!(
            "{:<20} | {:>8.1} | {:>7.1} | {:>6.1} | {:>6.3} | {:>8.1} | {:>8.1} | {:>6.2} | {:>5} | {:>5}",
            s.name,
            s.final_debt,
            s.final_interest_burden,
            s.final_poverty_rate,
            s.final_gini,
            s.final_debt_to_gdp,
            s.final_nfa,
            s.avg_real_wage_growth,
            s.warning_count,
            s.grade.to_string(),
        );
    }
}
