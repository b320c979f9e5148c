use bevy::prelude::Vec3;

/// One physics step as seen by the progression core.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Tick {
    /// Seconds since the previous tick.
    pub dt: f32,
    /// Where the host last put the agent. Needed for distance shaping and for
    /// starting a transition from the agent's actual pose.
    pub agent_position: Option<Vec3>,
}

impl Tick {
    pub fn new(dt: f32) -> Self {
        Self {
            dt,
            agent_position: None,
        }
    }

    pub fn with_agent(dt: f32, agent_position: Vec3) -> Self {
        Self {
            dt,
            agent_position: Some(agent_position),
        }
    }
}

/// Everything the host engine can report to the core.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Event {
    StepTick(Tick),
    WallContact,
    GoalContact,
    BarricadeContact,
    TimeExpired,
    EpisodeReset,
}

/// Scored result of a single event.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RewardOutcome {
    pub delta: f32,
    pub terminal: bool,
    pub advance_room: bool,
}

impl RewardOutcome {
    pub const NONE: RewardOutcome = RewardOutcome {
        delta: 0.0,
        terminal: false,
        advance_room: false,
    };

    pub fn reward(delta: f32) -> Self {
        Self {
            delta,
            ..Self::NONE
        }
    }
}
