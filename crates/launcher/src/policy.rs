//! Scripted stand-in for a learned policy: walk straight at the goal, with an
//! occasional random action so walls and respawns get exercised too.

use avian3d::prelude::Position;
use bevy::prelude::{Query, Res, ResMut, Resource, Vec2, Vec3, With};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use arena::DungeonRun;
use arena::agent::{Agent, AgentAction};

#[derive(Resource, Clone, Debug)]
pub struct GoalSeeker {
    epsilon: f32,
    rng: StdRng,
}

impl GoalSeeker {
    /// `epsilon` is the chance of a uniformly random action, clamped to `[0, 1]`.
    pub fn new(epsilon: f32, seed: u64) -> Self {
        Self {
            epsilon: epsilon.clamp(0.0, 1.0),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    /// Move action in `[-1, 1]` on X and Z.
    pub fn act(&mut self, agent: Vec3, goal: Vec3) -> Vec2 {
        if self.epsilon > 0.0 && self.rng.random::<f32>() < self.epsilon {
            return Vec2::new(
                self.rng.random_range(-1.0..=1.0),
                self.rng.random_range(-1.0..=1.0),
            );
        }

        let toward = Vec2::new(goal.x - agent.x, goal.z - agent.z);
        if toward.length_squared() < 1e-6 {
            Vec2::ZERO
        } else {
            toward.normalize()
        }
    }
}

pub fn seek_goal(
    run: Res<DungeonRun>,
    mut seeker: ResMut<GoalSeeker>,
    mut agents: Query<(&Position, &mut AgentAction), With<Agent>>,
) {
    let goal = run.driver.progression().state().goal_position;
    for (position, mut action) in agents.iter_mut() {
        action.0 = if run.is_transitioning() {
            Vec2::ZERO
        } else {
            seeker.act(position.0, goal)
        };
    }
}
