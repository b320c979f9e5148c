//! Timed door-open → agent-move → door-close sequence between two rooms.
//!
//! The sequence is a plain state machine stepped by the host's tick loop, so
//! it never blocks and can be abandoned at any tick.

use bevy::log::debug;
use bevy::prelude::{Quat, Vec3};

use crate::adapter::{Body, MovementAdapter};
use crate::config::TransitionTimings;
use crate::error::{DungeonError, Result};
use crate::room::{Pose, Room};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransitionPlan {
    pub from_room: usize,
    pub target_room: usize,
    pub closed_position: Vec3,
    pub open_position: Vec3,
    pub agent_from: Pose,
    pub agent_to: Pose,
}

impl TransitionPlan {
    /// Leave `from` through its door and arrive at the spawn of `to`.
    pub fn between(from: &Room, to: &Room, agent_from: Pose) -> Self {
        Self {
            from_room: from.index,
            target_room: to.index,
            closed_position: from.door.closed,
            open_position: from.door.open(),
            agent_from,
            agent_to: to.spawn,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionPhase {
    OpeningDoor,
    MovingAgent,
    ClosingDoor,
}

impl TransitionPhase {
    fn next(self) -> Option<Self> {
        match self {
            TransitionPhase::OpeningDoor => Some(TransitionPhase::MovingAgent),
            TransitionPhase::MovingAgent => Some(TransitionPhase::ClosingDoor),
            TransitionPhase::ClosingDoor => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TransitionStatus {
    Idle,
    Running {
        phase: TransitionPhase,
        progress: f32,
    },
    Completed {
        target_room: usize,
    },
}

#[derive(Clone, Copy, Debug)]
struct ActiveTransition {
    plan: TransitionPlan,
    phase: TransitionPhase,
    elapsed: f32,
}

#[derive(Clone, Debug)]
pub struct TransitionSequencer {
    timings: TransitionTimings,
    active: Option<ActiveTransition>,
}

impl TransitionSequencer {
    pub fn new(timings: TransitionTimings) -> Self {
        Self {
            timings,
            active: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn plan(&self) -> Option<&TransitionPlan> {
        self.active.as_ref().map(|active| &active.plan)
    }

    pub fn phase(&self) -> Option<TransitionPhase> {
        self.active.as_ref().map(|active| active.phase)
    }

    /// Fraction of the current phase already played, in `[0, 1]`.
    pub fn progress(&self) -> Option<f32> {
        self.active
            .as_ref()
            .map(|active| phase_fraction(active.elapsed, self.duration(active.phase)))
    }

    pub fn begin(&mut self, plan: TransitionPlan) -> Result<()> {
        if let Some(active) = &self.active {
            return Err(DungeonError::TransitionInProgress {
                target: active.plan.target_room,
            });
        }
        debug!(
            "🚪 Transition {} -> {} started",
            plan.from_room, plan.target_room
        );
        self.active = Some(ActiveTransition {
            plan,
            phase: TransitionPhase::OpeningDoor,
            elapsed: 0.0,
        });
        Ok(())
    }

    /// Play `dt` seconds of the sequence. Time left over at the end of a phase
    /// carries into the next one.
    pub fn advance(&mut self, dt: f32, movement: &mut dyn MovementAdapter) -> TransitionStatus {
        let timings = self.timings;
        let Some(active) = self.active.as_mut() else {
            return TransitionStatus::Idle;
        };

        let mut remaining = dt.max(0.0);
        loop {
            let duration = phase_duration(timings, active.phase);
            let needed = (duration - active.elapsed).max(0.0);

            if remaining < needed {
                active.elapsed += remaining;
                let progress = phase_fraction(active.elapsed, duration);
                apply_phase(&active.plan, active.phase, progress, movement);
                return TransitionStatus::Running {
                    phase: active.phase,
                    progress,
                };
            }

            remaining -= needed;
            apply_phase(&active.plan, active.phase, 1.0, movement);

            match active.phase.next() {
                Some(next) => {
                    active.phase = next;
                    active.elapsed = 0.0;
                }
                None => {
                    let target_room = active.plan.target_room;
                    self.active = None;
                    debug!("🚪 Transition to room {} complete", target_room);
                    return TransitionStatus::Completed { target_room };
                }
            }
        }
    }

    /// Abandon the sequence, leaving door and agent where the finished
    /// sequence would have: door closed, agent on the target spawn.
    /// Returns the room the agent now stands in.
    pub fn cancel(&mut self, movement: &mut dyn MovementAdapter) -> Option<usize> {
        let active = self.active.take()?;

        let mut phase = Some(active.phase);
        while let Some(current) = phase {
            apply_phase(&active.plan, current, 1.0, movement);
            phase = current.next();
        }

        debug!(
            "🚪 Transition to room {} cancelled, snapped to rest",
            active.plan.target_room
        );
        Some(active.plan.target_room)
    }

    fn duration(&self, phase: TransitionPhase) -> f32 {
        phase_duration(self.timings, phase)
    }
}

fn phase_duration(timings: TransitionTimings, phase: TransitionPhase) -> f32 {
    match phase {
        TransitionPhase::OpeningDoor | TransitionPhase::ClosingDoor => timings.door_secs,
        TransitionPhase::MovingAgent => timings.move_secs,
    }
}

fn phase_fraction(elapsed: f32, duration: f32) -> f32 {
    if duration <= 0.0 {
        1.0
    } else {
        (elapsed / duration).clamp(0.0, 1.0)
    }
}

fn apply_phase(
    plan: &TransitionPlan,
    phase: TransitionPhase,
    t: f32,
    movement: &mut dyn MovementAdapter,
) {
    match phase {
        TransitionPhase::OpeningDoor => movement.move_to(
            Body::Door(plan.from_room),
            plan.closed_position.lerp(plan.open_position, t),
            Quat::IDENTITY,
        ),
        TransitionPhase::MovingAgent => {
            let pose = plan.agent_from.lerp(&plan.agent_to, t);
            movement.move_to(Body::Agent, pose.position, pose.rotation);
        }
        TransitionPhase::ClosingDoor => movement.move_to(
            Body::Door(plan.from_room),
            plan.open_position.lerp(plan.closed_position, t),
            Quat::IDENTITY,
        ),
    }
}
