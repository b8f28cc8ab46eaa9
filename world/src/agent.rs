//! Per-agent state machine.
//!
//! An agent starts `Idle` at its origin, plans a route, and then alternates
//! between `Moving` along the plan and `Waiting` whenever the next cell is
//! held by another agent. Waiting backs off for a number of steps that grows
//! with the remaining distance before the agent replans. Reaching the
//! destination is terminal until the world is reset.

use std::collections::VecDeque;

use shapeshifter_core::{AgentId, AgentSnapshot, AgentStatus, CellCoord, Event};
use shapeshifter_system_pathfinding::{Pathfinder, RouteRequest};
use tracing::{debug, info};

use crate::{grid::Grid, occupancy::OccupancyGrid};

/// Back-off length, in steps, for an agent `remaining` cells from its goal.
pub(crate) const fn max_wait(remaining: u32) -> u32 {
    if remaining < 3 {
        1
    } else if remaining < 5 {
        2
    } else {
        3
    }
}

/// Shared state each agent transition reads or mutates.
pub(crate) struct StepContext<'a> {
    pub(crate) grid: &'a Grid,
    pub(crate) occupancy: &'a mut OccupancyGrid,
    /// Destination of every agent, indexed by agent id.
    pub(crate) destinations: &'a [CellCoord],
    pub(crate) pathfinder: &'a mut Pathfinder,
    pub(crate) stall_threshold: u32,
    pub(crate) events: &'a mut Vec<Event>,
}

impl StepContext<'_> {
    fn destination_of(&self, agent_id: AgentId) -> Option<CellCoord> {
        usize::try_from(agent_id.get())
            .ok()
            .and_then(|index| self.destinations.get(index).copied())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Phase {
    Idle,
    Planning,
    Moving { plan: VecDeque<CellCoord> },
    Waiting { waited: u32, max_wait: u32 },
    Arrived,
}

#[derive(Clone, Debug)]
pub(crate) struct Agent {
    id: AgentId,
    origin: CellCoord,
    destination: CellCoord,
    cell: CellCoord,
    phase: Phase,
    escalations: u32,
    stalled: bool,
    overlapping: bool,
}

impl Agent {
    pub(crate) fn new(id: AgentId, origin: CellCoord, destination: CellCoord) -> Self {
        Self {
            id,
            origin,
            destination,
            cell: origin,
            phase: Phase::Idle,
            escalations: 0,
            stalled: false,
            overlapping: false,
        }
    }

    pub(crate) const fn id(&self) -> AgentId {
        self.id
    }

    pub(crate) const fn cell(&self) -> CellCoord {
        self.cell
    }

    pub(crate) const fn destination(&self) -> CellCoord {
        self.destination
    }

    pub(crate) fn is_arrived(&self) -> bool {
        self.phase == Phase::Arrived
    }

    pub(crate) fn set_overlapping(&mut self, overlapping: bool) {
        self.overlapping = overlapping;
    }

    /// Cells the agent still intends to visit, in order.
    pub(crate) fn plan(&self) -> Vec<CellCoord> {
        match &self.phase {
            Phase::Moving { plan } => plan.iter().copied().collect(),
            _ => Vec::new(),
        }
    }

    /// Puts the agent back on its origin with every counter cleared.
    pub(crate) fn reset(&mut self) {
        self.cell = self.origin;
        self.phase = Phase::Idle;
        self.escalations = 0;
        self.stalled = false;
        self.overlapping = false;
    }

    pub(crate) fn snapshot(&self) -> AgentSnapshot {
        let (status, wait_count, max_wait, remaining_plan) = match &self.phase {
            Phase::Idle => (AgentStatus::Idle, 0, 0, 0),
            Phase::Planning => (AgentStatus::Planning, 0, 0, 0),
            Phase::Moving { plan } => (AgentStatus::Moving, 0, 0, plan.len()),
            Phase::Waiting { waited, max_wait } => (AgentStatus::Waiting, *waited, *max_wait, 0),
            Phase::Arrived => (AgentStatus::Arrived, 0, 0, 0),
        };
        AgentSnapshot {
            id: self.id,
            origin: self.origin,
            cell: self.cell,
            destination: self.destination,
            status,
            wait_count,
            max_wait,
            remaining_plan,
            escalations: self.escalations,
            stalled: self.stalled,
            overlapping: self.overlapping,
        }
    }

    /// Performs exactly one transition of the state machine.
    pub(crate) fn step(&mut self, ctx: &mut StepContext<'_>) {
        match self.phase {
            Phase::Arrived => {}
            Phase::Idle | Phase::Planning => self.replan(ctx),
            Phase::Waiting { waited, max_wait } => {
                let waited = waited.saturating_add(1);
                if waited >= max_wait {
                    self.escalate(ctx);
                    self.replan(ctx);
                } else {
                    self.phase = Phase::Waiting { waited, max_wait };
                }
            }
            Phase::Moving { .. } => self.advance(ctx),
        }
    }

    /// Computes a fresh plan against the live occupancy.
    ///
    /// Planning never moves the agent; it either lands in `Moving`, in
    /// `Waiting` when no route exists, or in `Arrived` when the agent already
    /// stands on its destination.
    pub(crate) fn replan(&mut self, ctx: &mut StepContext<'_>) {
        self.phase = Phase::Planning;
        if self.cell == self.destination {
            self.arrive(ctx);
            return;
        }

        let own_id = self.id;
        let grid = ctx.grid;
        let occupancy = &*ctx.occupancy;
        let request = RouteRequest {
            start: self.cell,
            goal: self.destination,
            columns: grid.columns(),
            rows: grid.rows(),
        };
        let route = ctx.pathfinder.find_route(
            request,
            |cell| grid.is_obstacle(cell),
            |cell| occupancy.occupant(cell).is_some_and(|occupant| occupant != own_id),
        );

        match route {
            Some(route) => {
                let plan: VecDeque<CellCoord> = route.into_iter().skip(1).collect();
                let moves = u32::try_from(plan.len()).unwrap_or(u32::MAX);
                debug!(agent = %self.id, cell = %self.cell, moves, "planned");
                ctx.events.push(Event::AgentPlanned {
                    agent_id: self.id,
                    moves,
                });
                self.phase = Phase::Moving { plan };
            }
            None => {
                debug!(agent = %self.id, cell = %self.cell, "no route");
                ctx.events.push(Event::AgentPlanFailed { agent_id: self.id });
                self.wait(None, ctx);
            }
        }
    }

    fn advance(&mut self, ctx: &mut StepContext<'_>) {
        let next = match &mut self.phase {
            Phase::Moving { plan } => {
                while plan.front() == Some(&self.cell) {
                    let _ = plan.pop_front();
                }
                plan.front().copied()
            }
            _ => return,
        };

        let Some(next) = next else {
            if self.cell == self.destination {
                self.arrive(ctx);
            } else {
                self.replan(ctx);
            }
            return;
        };

        match ctx.occupancy.occupant(next) {
            Some(holder) if holder != self.id => {
                if ctx.destination_of(holder) == Some(next) {
                    debug!(agent = %self.id, settled = %holder, cell = %next, "rerouting around settled agent");
                    ctx.events.push(Event::AgentRerouted {
                        agent_id: self.id,
                        settled: holder,
                    });
                    self.replan(ctx);
                } else {
                    self.wait(Some(holder), ctx);
                }
            }
            _ => self.move_to(next, ctx),
        }
    }

    fn move_to(&mut self, next: CellCoord, ctx: &mut StepContext<'_>) {
        let from = self.cell;
        ctx.occupancy.release(self.id, from);
        ctx.occupancy.occupy(self.id, next);
        self.cell = next;
        self.escalations = 0;
        self.stalled = false;

        let plan_exhausted = match &mut self.phase {
            Phase::Moving { plan } => {
                let _ = plan.pop_front();
                plan.is_empty()
            }
            _ => true,
        };

        debug!(agent = %self.id, %from, to = %next, "advanced");
        ctx.events.push(Event::AgentAdvanced {
            agent_id: self.id,
            from,
            to: next,
        });

        if plan_exhausted && self.cell == self.destination {
            self.arrive(ctx);
        }
    }

    fn wait(&mut self, blocked_by: Option<AgentId>, ctx: &mut StepContext<'_>) {
        let max_wait = max_wait(self.cell.manhattan_distance(self.destination));
        self.phase = Phase::Waiting {
            waited: 0,
            max_wait,
        };
        debug!(agent = %self.id, cell = %self.cell, max_wait, "waiting");
        ctx.events.push(Event::AgentWaiting {
            agent_id: self.id,
            blocked_by,
            max_wait,
        });
    }

    fn escalate(&mut self, ctx: &mut StepContext<'_>) {
        self.escalations = self.escalations.saturating_add(1);
        if !self.stalled && self.escalations >= ctx.stall_threshold {
            self.stalled = true;
            info!(
                agent = %self.id,
                cell = %self.cell,
                escalations = self.escalations,
                "agent stalled"
            );
            ctx.events.push(Event::AgentStalled {
                agent_id: self.id,
                escalations: self.escalations,
            });
        }
    }

    fn arrive(&mut self, ctx: &mut StepContext<'_>) {
        self.phase = Phase::Arrived;
        debug!(agent = %self.id, cell = %self.cell, "arrived");
        ctx.events.push(Event::AgentArrived {
            agent_id: self.id,
            cell: self.cell,
        });
    }
}
