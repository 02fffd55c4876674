use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use rayon::prelude::*;
use serde::Serialize;

use crate::config::{ParamKey, ParameterSet};
use crate::constraints::Constraints;
use crate::history::HistoricalSeries;
use crate::simulation::simulate;
use crate::warnings;

pub const MAX_ITERATIONS: usize = 80;
pub const BATCH_SIZE: usize = 4;
pub const LEARNING_RATE: f64 = 0.5;
pub const EPSILON: f64 = 1e-4;
/// Consecutive non-improving iterations before the search gives up.
pub const PATIENCE: u32 = 15;

/// One optimizable parameter with its search box and grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AdjustableParam {
    pub key: ParamKey,
    pub label: &'static str,
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

const fn adj(key: ParamKey, label: &'static str, min: f64, max: f64, step: f64) -> AdjustableParam {
    AdjustableParam {
        key,
        label,
        min,
        max,
        step,
    }
}

pub const OPTIMIZABLE_PARAMS: [AdjustableParam; 17] = [
    adj(ParamKey::InflationRate, "inflation", 0.0, 10.0, 0.1),
    adj(ParamKey::RealGrowth, "real growth", -2.0, 5.0, 0.1),
    adj(ParamKey::RiskPremium, "base risk premium", 0.0, 3.0, 0.1),
    adj(ParamKey::YenDepreciation, "depreciation bias", -3.0, 10.0, 0.5),
    adj(ParamKey::ForeignInterestRate, "foreign interest rate", 0.5, 8.0, 0.1),
    adj(ParamKey::NominalWageGrowth, "nominal wage floor", 0.0, 5.0, 0.1),
    adj(ParamKey::ProductivityShareRate, "productivity share", 0.1, 1.0, 0.05),
    adj(ParamKey::WagePassThroughRate, "inflation pass-through", 0.0, 1.0, 0.05),
    adj(ParamKey::RetainedEarningsReturnRate, "retained-earnings payout", 0.0, 0.10, 0.005),
    adj(ParamKey::GlobalGrowth, "global growth", 0.0, 5.0, 0.1),
    adj(ParamKey::NaturalIncrease, "social-security natural increase", 0.0, 2.0, 0.1),
    adj(ParamKey::EnergySubsidyRate, "energy subsidy rate", 0.0, 1.0, 0.1),
    adj(ParamKey::BojQtRate, "QT pace", 0.0, 80.0, 5.0),
    adj(ParamKey::FiscalRiskSensitivity, "fiscal risk sensitivity", 0.0, 0.5, 0.01),
    adj(ParamKey::PopulationGrowth, "population growth", -2.0, 1.0, 0.1),
    adj(ParamKey::EducationGdpRatio, "education spending / GDP", 2.0, 7.0, 0.1),
    adj(ParamKey::TechEffect, "technology effect", 0.0, 2.0, 0.1),
];

impl AdjustableParam {
    pub fn lookup(key: ParamKey) -> Option<AdjustableParam> {
        OPTIMIZABLE_PARAMS.iter().copied().find(|a| a.key == key)
    }

    /// Gradient step from `x`, snapped to the step grid and clamped to the box.
    /// A non-positive step never moves.
    fn propose(&self, x: f64, grad: f64) -> f64 {
        if self.step <= 0.0 {
            return x;
        }
        let raw = x - LEARNING_RATE * grad * self.step;
        ((raw / self.step).round() * self.step).clamp(self.min, self.max)
    }
}

/// Table entries for the selected keys, in table order, without duplicates.
pub fn adjustable(keys: &[ParamKey]) -> Vec<AdjustableParam> {
    OPTIMIZABLE_PARAMS
        .iter()
        .copied()
        .filter(|a| keys.contains(&a.key))
        .collect()
}

/// Warnings plus constraint violations for one full simulation.
pub fn objective(
    params: &ParameterSet,
    history: &HistoricalSeries,
    constraints: Option<&Constraints>,
) -> usize {
    let results = simulate(params, history);
    let warnings = warnings::evaluate(&results, params).len();
    warnings + constraints.map_or(0, |c| c.count_violations(&results))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerStatus {
    Idle,
    Running,
    /// Best objective reached zero.
    Converged,
    NoImprovement,
    BudgetExhausted,
    Cancelled,
}

impl OptimizerStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Idle | Self::Running)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OptimizerProgress {
    pub iteration: usize,
    pub max_iterations: usize,
    pub current_objective: usize,
    pub best_objective: usize,
    pub done: bool,
    pub status: OptimizerStatus,
    pub best_params: ParameterSet,
}

#[derive(Debug, Clone)]
pub struct OptimizerState {
    pub current_params: ParameterSet,
    pub current_objective: usize,
    pub best_params: ParameterSet,
    pub best_objective: usize,
    pub iteration: usize,
    pub no_improve_streak: u32,
}

/// Batched projected gradient descent over a step-quantised box.
///
/// `step()` is the only transition: each call runs one batch of up to
/// `BATCH_SIZE` iterations, or moves to a terminal status and reports it.
pub struct Optimizer {
    params: Vec<AdjustableParam>,
    history: HistoricalSeries,
    constraints: Option<Constraints>,
    state: OptimizerState,
    status: OptimizerStatus,
}

impl Optimizer {
    pub fn new(
        base: ParameterSet,
        params: Vec<AdjustableParam>,
        history: HistoricalSeries,
        constraints: Option<Constraints>,
    ) -> Self {
        let constraints = constraints.filter(Constraints::any_enabled);
        let initial = objective(&base, &history, constraints.as_ref());
        Optimizer {
            params,
            history,
            constraints,
            state: OptimizerState {
                current_params: base.clone(),
                current_objective: initial,
                best_params: base,
                best_objective: initial,
                iteration: 0,
                no_improve_streak: 0,
            },
            status: OptimizerStatus::Idle,
        }
    }

    pub fn status(&self) -> OptimizerStatus {
        self.status
    }

    pub fn state(&self) -> &OptimizerState {
        &self.state
    }

    pub fn max_iterations(&self) -> usize {
        if self.params.is_empty() { 0 } else { MAX_ITERATIONS }
    }

    fn evaluate(&self, params: &ParameterSet) -> usize {
        objective(params, &self.history, self.constraints.as_ref())
    }

    fn progress(&self) -> OptimizerProgress {
        let done = self.status.is_terminal();
        OptimizerProgress {
            iteration: self.state.iteration,
            max_iterations: self.max_iterations(),
            // A finished search reports its best point as current.
            current_objective: if done {
                self.state.best_objective
            } else {
                self.state.current_objective
            },
            best_objective: self.state.best_objective,
            done,
            status: self.status,
            best_params: self.state.best_params.clone(),
        }
    }

    fn stop_reason(&self) -> Option<OptimizerStatus> {
        if self.params.is_empty() {
            Some(OptimizerStatus::BudgetExhausted)
        } else if self.state.best_objective == 0 {
            Some(OptimizerStatus::Converged)
        } else if self.state.no_improve_streak >= PATIENCE {
            Some(OptimizerStatus::NoImprovement)
        } else if self.state.iteration >= MAX_ITERATIONS {
            Some(OptimizerStatus::BudgetExhausted)
        } else {
            None
        }
    }

    fn finish(&mut self, status: OptimizerStatus) -> OptimizerProgress {
        self.status = status;
        log::info!(
            "optimizer {:?} after {} iterations, best objective {}",
            status,
            self.state.iteration,
            self.state.best_objective
        );
        self.progress()
    }

    /// Advance by one batch. Calling again after a terminal status repeats the final report.
    pub fn step(&mut self) -> OptimizerProgress {
        if self.status.is_terminal() {
            return self.progress();
        }
        if let Some(status) = self.stop_reason() {
            return self.finish(status);
        }
        self.status = OptimizerStatus::Running;

        for _ in 0..BATCH_SIZE {
            if self.stop_reason().is_some() {
                break;
            }
            self.iterate();
            self.state.iteration += 1;
        }
        log::debug!(
            "iteration {}: current {} best {} stalled {}",
            self.state.iteration,
            self.state.current_objective,
            self.state.best_objective,
            self.state.no_improve_streak
        );
        self.progress()
    }

    /// Stop the search; the reported state is the best found so far.
    pub fn cancel(&mut self) -> OptimizerProgress {
        if self.status.is_terminal() {
            return self.progress();
        }
        self.finish(OptimizerStatus::Cancelled)
    }

    /// Drive to completion on the calling thread.
    pub fn run(mut self, mut on_progress: impl FnMut(&OptimizerProgress)) -> OptimizerProgress {
        loop {
            let p = self.step();
            on_progress(&p);
            if p.done {
                return p;
            }
        }
    }

    fn record_best(&mut self) {
        let st = &mut self.state;
        if st.current_objective < st.best_objective {
            st.best_objective = st.current_objective;
            st.best_params = st.current_params.clone();
            st.no_improve_streak = 0;
        }
    }

    /// One gradient iteration: estimate, joint step, greedy fallback.
    fn iterate(&mut self) {
        let current = &self.state.current_params;

        // Perturbation runs are independent; collect keeps key order.
        let gradient: Vec<f64> = self
            .params
            .par_iter()
            .map(|a| {
                let x = a.key.get(current);
                let h = (a.step * 0.5).max(EPSILON);
                let plus = self.evaluate(&a.key.with(current, (x + h).min(a.max)));
                let minus = self.evaluate(&a.key.with(current, (x - h).max(a.min)));
                (plus as f64 - minus as f64) / (2.0 * h)
            })
            .collect();

        let moves: Vec<(ParamKey, f64)> = self
            .params
            .iter()
            .zip(&gradient)
            .filter(|&(_, g)| g.abs() >= EPSILON)
            .map(|(a, &g)| (a.key, a.propose(a.key.get(current), g)))
            .collect();

        let mut next = current.clone();
        let mut moved = false;
        for &(key, value) in &moves {
            if value != key.get(current) {
                key.set(&mut next, value);
                moved = true;
            }
        }

        if !moved {
            self.state.no_improve_streak += 1;
            return;
        }

        let next_objective = self.evaluate(&next);
        if next_objective <= self.state.current_objective {
            let improved = next_objective < self.state.best_objective;
            self.state.current_params = next;
            self.state.current_objective = next_objective;
            if improved {
                self.record_best();
            } else {
                self.state.no_improve_streak += 1;
            }
            return;
        }

        // Joint step made things worse: try each key alone, take the first strict improvement.
        self.state.no_improve_streak += 1;
        for (key, value) in moves {
            let trial = key.with(&self.state.current_params, value);
            let trial_objective = self.evaluate(&trial);
            if trial_objective < self.state.current_objective {
                self.state.current_params = trial;
                self.state.current_objective = trial_objective;
                self.record_best();
                break;
            }
        }
    }
}

/// Handle to a search running on a background thread.
pub struct OptimizerHandle {
    cancelled: Arc<AtomicBool>,
    thread: JoinHandle<OptimizerProgress>,
}

impl OptimizerHandle {
    /// Request cancellation; honoured at the next batch boundary.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the search and return its final report.
    pub fn join(self) -> OptimizerProgress {
        self.thread
            .join()
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
    }
}

/// Start a search on its own thread.
///
/// `on_progress` fires after every batch and exactly once with `done == true`.
pub fn start<F>(
    base: ParameterSet,
    params: Vec<AdjustableParam>,
    history: HistoricalSeries,
    constraints: Option<Constraints>,
    mut on_progress: F,
) -> OptimizerHandle
where
    F: FnMut(OptimizerProgress) + Send + 'static,
{
    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancelled);
    let thread = thread::spawn(move || {
        let mut optimizer = Optimizer::new(base, params, history, constraints);
        loop {
            let p = if flag.load(Ordering::Relaxed) {
                optimizer.cancel()
            } else {
                optimizer.step()
            };
            on_progress(p.clone());
            if p.done {
                return p;
            }
            thread::yield_now();
        }
    });
    OptimizerHandle { cancelled, thread }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn baseline_objective() -> usize {
        objective(&ParameterSet::default(), &HistoricalSeries::japan(), None)
    }

    // ── Parameter table ──────────────────────────────────────────────────────

    #[test]
    fn table_covers_every_key_once() {
        for key in ParamKey::ALL {
            let a = AdjustableParam::lookup(key).unwrap();
            assert!(a.min < a.max && a.step > 0.0, "{}", key.as_str());
        }
        assert_eq!(adjustable(&[ParamKey::RiskPremium, ParamKey::RealGrowth, ParamKey::RiskPremium]).len(), 2);
        assert_eq!(adjustable(&[ParamKey::RiskPremium, ParamKey::RealGrowth])[0].key, ParamKey::RealGrowth);
    }

    #[test]
    fn propose_snaps_and_clamps() {
        let a = AdjustableParam::lookup(ParamKey::BojQtRate).unwrap();
        assert_eq!(a.propose(30.0, 1.2), 25.0);
        assert_eq!(a.propose(5.0, 10.0), 0.0);
        assert_eq!(a.propose(75.0, -10.0), 80.0);
        let flat = AdjustableParam { step: 0.0, ..a };
        assert_eq!(flat.propose(30.0, 5.0), 30.0);
    }

    // ── Degenerate cases ─────────────────────────────────────────────────────

    #[test]
    fn no_keys_reports_once_and_returns_input() {
        let base = ParameterSet::default();
        let mut calls = Vec::new();
        let opt = Optimizer::new(base.clone(), Vec::new(), HistoricalSeries::japan(), None);
        let last = opt.run(|p| calls.push(p.clone()));
        assert_eq!(calls.len(), 1);
        assert!(last.done);
        assert_eq!(last.iteration, 0);
        assert_eq!(last.max_iterations, 0);
        assert_eq!(last.best_params, base);
        assert_eq!(last.best_objective, baseline_objective());
    }

    #[test]
    fn disabled_constraints_are_ignored() {
        let opt = Optimizer::new(
            ParameterSet::default(),
            Vec::new(),
            HistoricalSeries::japan(),
            Some(Constraints::none()),
        );
        assert_eq!(opt.state().best_objective, baseline_objective());
    }

    #[test]
    fn step_after_finish_repeats_final_report() {
        let mut opt = Optimizer::new(ParameterSet::default(), Vec::new(), HistoricalSeries::japan(), None);
        let first = opt.step();
        let again = opt.step();
        assert!(first.done && again.done);
        assert_eq!(opt.status(), OptimizerStatus::BudgetExhausted);
        assert_eq!(again.iteration, first.iteration);
    }

    // ── Search behaviour ─────────────────────────────────────────────────────

    #[test]
    fn search_never_regresses_and_finishes_once() {
        let baseline = baseline_objective();
        assert!(baseline > 0, "baseline should raise warnings");
        let opt = Optimizer::new(
            ParameterSet::default(),
            adjustable(&[ParamKey::RealGrowth, ParamKey::RiskPremium]),
            HistoricalSeries::japan(),
            None,
        );
        let mut reports = Vec::new();
        let last = opt.run(|p| reports.push(p.clone()));

        assert!(last.best_objective <= baseline);
        assert_eq!(reports.iter().filter(|p| p.done).count(), 1);
        assert!(reports.last().unwrap().done);
        for w in reports.windows(2) {
            assert!(w[1].best_objective <= w[0].best_objective);
        }
        assert!(last.iteration <= MAX_ITERATIONS);
        assert!(last.status.is_terminal());
        assert_eq!(last.current_objective, last.best_objective);
        assert_eq!(
            objective(&last.best_params, &HistoricalSeries::japan(), None),
            last.best_objective
        );
    }

    #[test]
    fn batches_advance_four_iterations() {
        let mut opt = Optimizer::new(
            ParameterSet::default(),
            adjustable(&[ParamKey::RiskPremium]),
            HistoricalSeries::japan(),
            None,
        );
        let p = opt.step();
        assert!(p.iteration <= BATCH_SIZE);
        let q = opt.step();
        assert!(q.done || q.iteration <= 2 * BATCH_SIZE);
    }

    #[test]
    fn search_is_deterministic() {
        let run = || {
            Optimizer::new(
                ParameterSet {
                    risk_premium: 2.0,
                    ..ParameterSet::default()
                },
                adjustable(&[ParamKey::RiskPremium, ParamKey::InflationRate, ParamKey::BojQtRate]),
                HistoricalSeries::japan(),
                Some(Constraints::default()),
            )
            .run(|_| {})
        };
        let (a, b) = (run(), run());
        assert_eq!(a.best_objective, b.best_objective);
        assert_eq!(a.iteration, b.iteration);
        assert_eq!(a.best_params, b.best_params);
    }

    #[test]
    fn cancel_reports_best_so_far() {
        let mut opt = Optimizer::new(
            ParameterSet::default(),
            adjustable(&[ParamKey::RealGrowth]),
            HistoricalSeries::japan(),
            None,
        );
        let first = opt.step();
        let cancelled = opt.cancel();
        if !first.done {
            assert_eq!(cancelled.status, OptimizerStatus::Cancelled);
        }
        assert!(cancelled.done);
        assert_eq!(cancelled.best_objective, first.best_objective);
    }

    // ── Background driver ────────────────────────────────────────────────────

    #[test]
    fn background_search_emits_exactly_one_done() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handle = start(
            ParameterSet::default(),
            adjustable(&[ParamKey::RealGrowth, ParamKey::RiskPremium]),
            HistoricalSeries::japan(),
            Some(Constraints::default()),
            move |p| sink.lock().unwrap().push(p),
        );
        let last = handle.join();
        let seen = seen.lock().unwrap();
        assert!(last.done);
        assert_eq!(seen.iter().filter(|p| p.done).count(), 1);
        assert_eq!(seen.last().unwrap().best_objective, last.best_objective);
    }

    #[test]
    fn background_search_without_keys_reports_input_once() {
        let base = ParameterSet {
            risk_premium: 1.5,
            ..ParameterSet::default()
        };
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handle = start(base.clone(), Vec::new(), HistoricalSeries::japan(), None, move |p| {
            sink.lock().unwrap().push(p)
        });
        let last = handle.join();
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].done && last.done);
        assert_eq!(last.best_params, base);
        assert_eq!(last.iteration, 0);
    }

    #[test]
    fn cancelled_background_search_stops_at_a_batch_boundary() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handle = start(
            ParameterSet::default(),
            OPTIMIZABLE_PARAMS.to_vec(),
            HistoricalSeries::japan(),
            None,
            move |p| sink.lock().unwrap().push(p),
        );
        handle.cancel();
        let last = handle.join();
        assert!(last.done);
        let seen = seen.lock().unwrap();
        assert_eq!(seen.iter().filter(|p| p.done).count(), 1);
        assert!(last.status.is_terminal());
        assert!(last.iteration < MAX_ITERATIONS || last.status != OptimizerStatus::Cancelled);
    }
}
