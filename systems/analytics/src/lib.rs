#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure system that folds world events into run statistics.

use std::collections::BTreeSet;

use serde::Serialize;
use shapeshifter_core::{AgentId, Event};

/// Aggregated counters describing a simulation run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Scheduler steps observed.
    pub steps: u64,
    /// Successful single-cell moves.
    pub advances: u64,
    /// Times an agent started backing off.
    pub waits: u64,
    /// Plans computed after the world was built.
    pub replans: u64,
    /// Planning attempts that found no route.
    pub plan_failures: u64,
    /// Plans dropped because a settled agent blocked them.
    pub reroutes: u64,
    /// Agents reported as stalled.
    pub stalls: u64,
    /// Overlap reports, one per shared cell per step.
    pub overlaps: u64,
    /// Agents that reached their destination.
    pub arrivals: u64,
    /// Step on which every agent had arrived, if that happened.
    pub completed: Option<u64>,
}

impl RunReport {
    /// Average number of moves per arrived agent.
    #[must_use]
    pub fn moves_per_arrival(&self) -> Option<f64> {
        (self.arrivals > 0).then(|| self.advances as f64 / self.arrivals as f64)
    }
}

/// Consumes world events and keeps a running [`RunReport`].
#[derive(Debug, Default)]
pub struct Analytics {
    report: RunReport,
    stalled: BTreeSet<AgentId>,
}

impl Analytics {
    /// Creates an analytics system with zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds the provided events into the report.
    pub fn handle(&mut self, events: &[Event]) {
        for event in events {
            match event {
                Event::StepCompleted { step, .. } => {
                    self.report.steps = self.report.steps.max(*step);
                }
                Event::AgentAdvanced { .. } => self.report.advances += 1,
                Event::AgentWaiting { .. } => self.report.waits += 1,
                Event::AgentPlanned { .. } => self.report.replans += 1,
                Event::AgentPlanFailed { .. } => self.report.plan_failures += 1,
                Event::AgentRerouted { .. } => self.report.reroutes += 1,
                Event::AgentArrived { .. } => self.report.arrivals += 1,
                Event::AgentStalled { agent_id, .. } => {
                    if self.stalled.insert(*agent_id) {
                        self.report.stalls += 1;
                    }
                }
                Event::OverlapDetected { .. } => self.report.overlaps += 1,
                Event::SimulationCompleted { steps } => self.report.completed = Some(*steps),
                Event::RunModeChanged { .. } => {}
            }
        }
    }

    /// Statistics gathered so far.
    #[must_use]
    pub fn report(&self) -> &RunReport {
        &self.report
    }

    /// Agents that were reported as stalled at least once.
    pub fn stalled_agents(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.stalled.iter().copied()
    }
}
