//! Accounting audit for govsim output.
//!
//! Reads a YearResult NDJSON stream (first positional argument, default
//! `results.ndjson`), then prints:
//!   Tier 1  — accounting identities, PASS/FAIL each
//!   Tier 2  — warnings re-derived from the stream
//!
//! `--params <file.json>` supplies the parameter set the stream was produced
//! with; otherwise the baseline is assumed.

use std::fs::File;
use std::io::{BufRead, BufReader};

use anyhow::{Context, Result, bail};
use govsim::analysis::{AccountingViolation, verify_accounting};
use govsim::config::ParameterSet;
use govsim::results::YearResult;
use govsim::warnings::{self, WarningKind};

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut results_path = "results.ndjson".to_string();
    let mut params = ParameterSet::default();

    let mut i = 0;
    while i < args.len() {
        if args[i] == "--params" {
            i += 1;
            let path = args.get(i).context("--params requires a path")?;
            params = ParameterSet::from_json_path(path)
                .with_context(|| format!("loading parameters from {path}"))?;
        } else {
            results_path = args[i].clone();
        }
        i += 1;
    }

    // ── Load results ─────────────────────────────────────────────────────────
    let file = File::open(&results_path).with_context(|| {
        format!("cannot open {results_path}; run `govsim --output {results_path}` first")
    })?;
    let mut results: Vec<YearResult> = Vec::new();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("reading line {}", line_no + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let row = serde_json::from_str::<YearResult>(&line)
            .with_context(|| format!("line {} is not a YearResult", line_no + 1))?;
        results.push(row);
    }
    if results.is_empty() {
        bail!("{results_path} contains no results");
    }
    println!("Loaded {} years from {results_path}", results.len());

    // ── Tier 1: accounting identities ────────────────────────────────────────
    let violations = verify_accounting(&results, &params);
    let inv = |variant: fn(&AccountingViolation) -> bool| {
        if violations.iter().any(variant) { "FAIL" } else { "PASS" }
    };
    println!("\n=== Accounting identities ===");
    println!("  [1] Consecutive years:                  {}", inv(|v| matches!(v, AccountingViolation::YearSequence { .. })));
    println!("  [2] Debt roll-forward:                  {}", inv(|v| matches!(v, AccountingViolation::DebtRollForward { .. })));
    println!("  [3] Bond issuance = max(gap, 0):        {}", inv(|v| matches!(v, AccountingViolation::BondIssuance { .. })));
    println!("  [4] Remittance ≤ positive net income:   {}", inv(|v| matches!(v, AccountingViolation::RemittanceExceedsIncome { .. })));
    println!("  [5] Cumulative loss ≥ 0:                {}", inv(|v| matches!(v, AccountingViolation::NegativeCumulativeLoss { .. })));
    println!("  [6] Holdings at or above QT floor:      {}", inv(|v| matches!(v, AccountingViolation::BelowQtFloor { .. })));
    println!("  [7] Interest burden = interest / tax:   {}", inv(|v| matches!(v, AccountingViolation::InterestBurden { .. })));
    if violations.is_empty() {
        println!("  All accounting identities: PASS");
    } else {
        println!("\n  {} violation(s):", violations.len());
        for v in &violations {
            println!("    {v}");
        }
    }

    // ── Tier 2: warnings ─────────────────────────────────────────────────────
    let ws = warnings::evaluate(&results, &params);
    println!("\n=== Warnings by kind ===");
    for kind in [
        WarningKind::InterestBurden,
        WarningKind::CurrentAccountDeficit,
        WarningKind::BojCapitalShortfall,
        WarningKind::CurrencyRiskPremium,
        WarningKind::RealWageDecline,
        WarningKind::ChronicFiscalDeficit,
        WarningKind::LargeSwing,
        WarningKind::CurrencyConfidence,
    ] {
        let years: Vec<_> = ws.iter().filter(|w| w.kind == kind).map(|w| w.year).collect();
        match (years.first(), years.len()) {
            (None, _) => println!("  {:<45} -", kind.to_string()),
            (Some(first), n) => println!("  {:<45} {n:>3} (first {first})", kind.to_string()),
        }
    }

    if !violations.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}
