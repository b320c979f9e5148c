use std::path::Path;

use bevy::prelude::Resource;
use serde::{Deserialize, Serialize};

use crate::error::{DungeonError, Result};
use crate::room::RoomLayout;

/// What touching a wall costs the agent.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WallPolicy {
    /// Penalize and put the agent back at the room spawn; the episode goes on.
    Respawn { penalty: f32 },
    /// Penalize and end the episode.
    Terminal { penalty: f32 },
}

impl WallPolicy {
    pub const RESPAWN_PENALTY: f32 = -0.02;
    pub const LIGHT_RESPAWN_PENALTY: f32 = -0.005;
    pub const TERMINAL_PENALTY: f32 = -2.0;

    pub fn respawn() -> Self {
        WallPolicy::Respawn {
            penalty: Self::RESPAWN_PENALTY,
        }
    }

    pub fn terminal() -> Self {
        WallPolicy::Terminal {
            penalty: Self::TERMINAL_PENALTY,
        }
    }

    pub fn penalty(&self) -> f32 {
        match *self {
            WallPolicy::Respawn { penalty } | WallPolicy::Terminal { penalty } => penalty,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WallPolicy::Terminal { .. })
    }
}

impl Default for WallPolicy {
    fn default() -> Self {
        Self::respawn()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardTable {
    pub goal_partial: f32,
    pub room_clear: f32,
    pub dungeon_clear: f32,
    pub barricade: f32,
}

impl Default for RewardTable {
    fn default() -> Self {
        Self {
            goal_partial: 1.0,
            room_clear: 5.0,
            dungeon_clear: 10.0,
            barricade: -0.2,
        }
    }
}

/// Durations of the door and agent phases of a room transition, in seconds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionTimings {
    pub door_secs: f32,
    pub move_secs: f32,
}

impl Default for TransitionTimings {
    fn default() -> Self {
        Self {
            door_secs: 1.0,
            move_secs: 1.5,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Resource, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressionConfig {
    /// Step budget of one episode. The per-step penalty is `-1 / max_steps`.
    pub max_steps: u32,
    /// Countdown shown on the scoreboard.
    pub time_limit_secs: f32,
    /// Half-width of the random goal offset after a partial win.
    pub spawn_radius: f32,
    pub wall_policy: WallPolicy,
    pub rewards: RewardTable,
    pub timings: TransitionTimings,
    /// Weight of the "got closer to the goal" term. Zero disables it.
    pub distance_shaping: f32,
    pub seed: u64,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            max_steps: 5000,
            time_limit_secs: 60.0,
            spawn_radius: 2.0,
            wall_policy: WallPolicy::default(),
            rewards: RewardTable::default(),
            timings: TransitionTimings::default(),
            distance_shaping: 0.0,
            seed: 42,
        }
    }
}

impl ProgressionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            return Err(DungeonError::Configuration(
                "max_steps must be at least 1".to_string(),
            ));
        }
        if self.time_limit_secs <= 0.0 {
            return Err(DungeonError::Configuration(format!(
                "time_limit_secs must be positive, got {}",
                self.time_limit_secs
            )));
        }
        if self.spawn_radius < 0.0 || !self.spawn_radius.is_finite() {
            return Err(DungeonError::Configuration(format!(
                "spawn_radius must be a non-negative number, got {}",
                self.spawn_radius
            )));
        }
        if self.timings.door_secs < 0.0 || self.timings.move_secs < 0.0 {
            return Err(DungeonError::Configuration(
                "transition durations cannot be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Everything needed to build a dungeon: rewards and timings plus the room layout.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DungeonConfig {
    pub progression: ProgressionConfig,
    pub layout: RoomLayout,
}

impl DungeonConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: DungeonConfig = serde_json::from_str(json)?;
        config.progression.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}
