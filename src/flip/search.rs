//! Bounded random walks on the flip graph.

use std::time::Instant;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::BitPackedScheme;

/// Budget for a walk
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Budget {
    /// Maximum wall-clock time in milliseconds (0 = unlimited)
    pub time_ms: u64,
    /// Maximum number of flips (0 = scale with the problem size)
    pub steps: usize,
}

/// Flips per squared naive rank when no step count is given
const STEPS_PER_PRODUCT_PAIR: usize = 1_000;

impl Budget {
    pub fn new(time_ms: u64, steps: usize) -> Self {
        Self { time_ms, steps }
    }

    /// Step limit for a walk from `scheme`: `steps`, or `1000·naive_rank²`
    /// when unset
    pub fn steps_for(&self, scheme: &BitPackedScheme) -> usize {
        if self.steps > 0 {
            return self.steps;
        }
        let naive = scheme.naive_rank();
        naive.saturating_mul(naive).saturating_mul(STEPS_PER_PRODUCT_PAIR)
    }
}

/// How a walk ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WalkOutcome {
    /// The target rank was reached
    Reached,
    /// Steps or time ran out
    Exhausted,
    /// No flip and no escape move was possible
    Stuck,
}

/// Summary of a walk
#[derive(Clone, Debug)]
pub struct WalkReport {
    pub outcome: WalkOutcome,
    pub steps: usize,
    pub flips: usize,
    /// Rank decrease from reductions and cancellations
    pub reductions: usize,
    /// Plus moves taken after a plateau
    pub escapes: usize,
    pub initial_rank: usize,
    /// Lowest-rank scheme visited
    pub best: BitPackedScheme,
}

/// Random walk settings.
///
/// Each step flips a random pair and eagerly reduces. After `plateau`
/// steps without a new best rank a plus move is taken, as long as the
/// current rank stays within `max_slack` of the best.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlipWalk {
    pub budget: Budget,
    pub plateau: usize,
    pub max_slack: usize,
    /// Stop once the rank is at most this
    pub target_rank: Option<usize>,
}

impl Default for FlipWalk {
    fn default() -> Self {
        Self {
            budget: Budget::default(),
            plateau: 10_000,
            max_slack: 1,
            target_rank: None,
        }
    }
}

impl FlipWalk {
    pub fn new(budget: Budget) -> Self {
        Self {
            budget,
            ..Self::default()
        }
    }

    pub fn with_target(mut self, rank: usize) -> Self {
        self.target_rank = Some(rank);
        self
    }

    fn reached(&self, rank: usize) -> bool {
        self.target_rank.is_some_and(|target| rank <= target)
    }

    /// Walk from `start`, returning the best scheme seen
    pub fn run<R: Rng + ?Sized>(&self, start: &BitPackedScheme, rng: &mut R) -> WalkReport {
        let clock = Instant::now();
        let mut current = start.clone();
        let mut report = WalkReport {
            outcome: WalkOutcome::Exhausted,
            steps: 0,
            flips: 0,
            reductions: 0,
            escapes: 0,
            initial_rank: start.rank(),
            best: start.clone(),
        };

        report.reductions += current.reduce_all(rng);
        report.best = current.clone();
        let mut since_best = 0;
        let steps = self.budget.steps_for(start);

        while report.steps < steps {
            if self.reached(report.best.rank()) {
                report.outcome = WalkOutcome::Reached;
                break;
            }
            if self.budget.time_ms > 0 && clock.elapsed().as_millis() >= u128::from(self.budget.time_ms) {
                break;
            }
            report.steps += 1;

            if current.try_flip(rng) {
                report.flips += 1;
            } else if current.try_plus(rng) {
                report.escapes += 1;
            } else {
                report.outcome = WalkOutcome::Stuck;
                break;
            }
            report.reductions += current.reduce_all(rng);

            if current.rank() < report.best.rank() {
                info!(rank = current.rank(), step = report.steps, "new best rank");
                report.best = current.clone();
                since_best = 0;
                continue;
            }

            since_best += 1;
            if since_best >= self.plateau && current.rank() < report.best.rank() + self.max_slack {
                if current.try_plus(rng) {
                    debug!(rank = current.rank(), step = report.steps, "plateau escape");
                    report.escapes += 1;
                }
                since_best = 0;
            }
        }

        if report.outcome == WalkOutcome::Exhausted && self.reached(report.best.rank()) {
            report.outcome = WalkOutcome::Reached;
        }
        report.best.validate();
        info!(
            outcome = ?report.outcome,
            steps = report.steps,
            flips = report.flips,
            from = report.initial_rank,
            to = report.best.rank(),
            elapsed_ms = clock.elapsed().as_millis() as u64,
            "flip walk finished"
        );
        report
    }
}
