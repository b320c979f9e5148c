use crate::config::{ProgressionConfig, RewardTable, WallPolicy};
use crate::event::RewardOutcome;

/// An event together with the state facts needed to score it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Scored {
    /// `progress` is how much closer to the goal the agent got this step.
    Step { progress: f32 },
    Wall,
    /// `wins` is the already-incremented win count.
    Goal {
        wins: u32,
        required: u32,
        last_room: bool,
    },
    Barricade,
    TimeExpired,
}

/// Reward shaping table. Scoring is a pure function of its inputs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RewardPolicy {
    step_penalty: f32,
    wall: WallPolicy,
    rewards: RewardTable,
    distance_shaping: f32,
}

impl RewardPolicy {
    pub fn new(config: &ProgressionConfig) -> Self {
        let max_steps = config.max_steps.max(1) as f64;
        Self {
            step_penalty: (-1.0 / max_steps) as f32,
            wall: config.wall_policy,
            rewards: config.rewards,
            distance_shaping: config.distance_shaping,
        }
    }

    /// Existential cost per step; a full-length episode sums to -1.
    pub fn step_penalty(&self) -> f32 {
        self.step_penalty
    }

    pub fn wall_policy(&self) -> WallPolicy {
        self.wall
    }

    pub fn score(&self, scored: Scored) -> RewardOutcome {
        match scored {
            Scored::Step { progress } => {
                RewardOutcome::reward(self.step_penalty + self.distance_shaping * progress)
            }
            Scored::Wall => RewardOutcome {
                delta: self.wall.penalty(),
                terminal: self.wall.is_terminal(),
                advance_room: false,
            },
            Scored::Goal {
                wins,
                required,
                last_room,
            } => {
                if wins < required {
                    RewardOutcome::reward(self.rewards.goal_partial)
                } else if last_room {
                    RewardOutcome {
                        delta: self.rewards.room_clear + self.rewards.dungeon_clear,
                        terminal: true,
                        advance_room: false,
                    }
                } else {
                    RewardOutcome {
                        delta: self.rewards.room_clear,
                        terminal: false,
                        advance_room: true,
                    }
                }
            }
            Scored::Barricade => RewardOutcome::reward(self.rewards.barricade),
            Scored::TimeExpired => RewardOutcome::NONE,
        }
    }
}
