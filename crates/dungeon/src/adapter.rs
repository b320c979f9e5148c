//! Seams between the progression core and whatever engine hosts it.
//!
//! The core never moves anything itself: it asks the host to, and assumes
//! the host's physics and rendering calls cannot fail.

use bevy::prelude::{Quat, Vec3};

/// A movable object the core knows about.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Body {
    Agent,
    Goal(usize),
    Door(usize),
}

pub trait MovementAdapter {
    /// Request that `body` be placed at the given pose. Collision resolution is
    /// the host's business.
    fn move_to(&mut self, body: Body, position: Vec3, rotation: Quat);

    /// Show or hide a room's goal.
    fn set_goal_active(&mut self, _room: usize, _active: bool) {}
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Scoreboard {
    pub room_index: usize,
    pub wins: u32,
    pub required: u32,
    pub seconds_remaining: f32,
}

/// Fire-and-forget UI updates.
pub trait PresentationAdapter {
    fn update_scoreboard(&mut self, scoreboard: Scoreboard);

    fn update_timer(&mut self, room_index: usize, elapsed_secs: f32);

    /// The agent now belongs to `room_index`. `snap` is set on episode resets,
    /// where cameras should cut rather than fly.
    fn room_entered(&mut self, _room_index: usize, _snap: bool) {}

    fn time_expired(&mut self, _room_index: usize) {}
}

/// Where the episode driver reports the end of an episode.
pub trait EpisodeSignal {
    fn end_episode(&mut self, summary: &crate::driver::EpisodeSummary);
}

/// Host-side hooks needed to dispatch one event.
pub struct Adapters<'a> {
    pub movement: &'a mut dyn MovementAdapter,
    pub presentation: &'a mut dyn PresentationAdapter,
}

impl<'a> Adapters<'a> {
    pub fn new(
        movement: &'a mut dyn MovementAdapter,
        presentation: &'a mut dyn PresentationAdapter,
    ) -> Self {
        Self {
            movement,
            presentation,
        }
    }
}

/// Drops every presentation update.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPresentation;

impl PresentationAdapter for NoPresentation {
    fn update_scoreboard(&mut self, _scoreboard: Scoreboard) {}

    fn update_timer(&mut self, _room_index: usize, _elapsed_secs: f32) {}
}

/// Records every request. Handy for hosts that apply moves later in the frame,
/// and for tests.
#[derive(Clone, Debug, Default)]
pub struct MoveLog {
    pub moves: Vec<(Body, Vec3, Quat)>,
    pub goal_toggles: Vec<(usize, bool)>,
}

impl MoveLog {
    pub fn last_position(&self, body: Body) -> Option<Vec3> {
        self.moves
            .iter()
            .rev()
            .find(|(b, _, _)| *b == body)
            .map(|(_, position, _)| *position)
    }

    pub fn clear(&mut self) {
        self.moves.clear();
        self.goal_toggles.clear();
    }
}

impl MovementAdapter for MoveLog {
    fn move_to(&mut self, body: Body, position: Vec3, rotation: Quat) {
        self.moves.push((body, position, rotation));
    }

    fn set_goal_active(&mut self, room: usize, active: bool) {
        self.goal_toggles.push((room, active));
    }
}
