use bevy::prelude::{Vec2, Vec3};

/// Number of floats in [`Observation::to_vector`].
pub const OBSERVATION_SIZE: usize = 7;

/// Agent motion the host can report on demand.
pub trait KinematicsSource {
    fn forward(&self) -> Vec3;
    fn velocity(&self) -> Vec3;
}

/// What the policy sees each decision step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Observation {
    pub room_index: usize,
    pub forward: Vec3,
    pub velocity_xz: Vec2,
    pub wins_remaining: u32,
}

impl Observation {
    /// Flattened for the policy network. Trained policies depend on this
    /// exact order: room, forward xyz, velocity xz, wins remaining.
    pub fn to_vector(&self) -> [f32; OBSERVATION_SIZE] {
        [
            self.room_index as f32,
            self.forward.x,
            self.forward.y,
            self.forward.z,
            self.velocity_xz.x,
            self.velocity_xz.y,
            self.wins_remaining as f32,
        ]
    }
}
