//! Episodic multi-room progression for a dungeon-crawling RL agent.
//!
//! The host engine feeds [`Event`]s into an [`EpisodeDriver`] (or straight
//! into a [`ProgressionState`]) and applies the movement and presentation
//! requests that come back through the [`adapter`] traits.

pub mod adapter;
pub mod config;
pub mod driver;
pub mod error;
pub mod event;
pub mod observation;
pub mod progression;
pub mod reward;
pub mod room;
pub mod transition;

pub use adapter::{
    Adapters, Body, EpisodeSignal, MoveLog, MovementAdapter, NoPresentation,
    PresentationAdapter, Scoreboard,
};
pub use config::{DungeonConfig, ProgressionConfig, RewardTable, TransitionTimings, WallPolicy};
pub use driver::{EpisodeDriver, EpisodeSummary, StepReport};
pub use error::{DungeonError, Result};
pub use event::{Event, RewardOutcome, Tick};
pub use observation::{KinematicsSource, OBSERVATION_SIZE, Observation};
pub use progression::{EpisodeState, ProgressionPhase, ProgressionState};
pub use reward::{RewardPolicy, Scored};
pub use room::{Barricade, BarricadeSpec, DoorAnchor, Pose, Room, RoomLayout, RoomRegistry};
pub use transition::{TransitionPhase, TransitionPlan, TransitionSequencer, TransitionStatus};

/// Physics tick used by hosts that don't bring their own clock.
pub const FIXED_TIMESTEP_HZ: f64 = 60.0;
