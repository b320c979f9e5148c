use std::path::PathBuf;

use bevy::app::AppExit;
use bevy::log::{Level, LogPlugin};
use bevy::prelude::default;
use clap::{Parser, ValueEnum};

use arena::ArenaSettings;
use dungeon::{DungeonConfig, Result, RoomLayout, WallPolicy};

use crate::headless::create_headless_app;
use crate::view::create_view_app;

#[derive(Parser, Debug)]
#[command(name = "dungeon-launcher")]
#[command(version = "0.1")]
#[command(about = "Multi-room dungeon training environment")]
#[command(long_about = "
Multi-room dungeon training environment

EXAMPLES:
    cargo run --bin launcher -- headless --episodes 20                # Train-style run, no window
    cargo run --bin launcher -- headless --wall-policy terminal       # Walls end the episode
    cargo run --bin launcher -- view --rooms 4 --required-wins 3      # Watch the scripted agent
    cargo run --bin launcher -- view --config dungeon.json --inspector
")]
pub struct Cli {
    #[arg(value_enum)]
    pub mode: Mode,

    #[arg(long)]
    #[arg(help = "JSON file with progression settings and room layout")]
    pub config: Option<PathBuf>,

    #[arg(long)]
    #[arg(help = "Replace the layout with a straight corridor of this many rooms")]
    pub rooms: Option<usize>,

    #[arg(long)]
    pub required_wins: Option<u32>,

    #[arg(long, default_value_t = 10)]
    #[arg(help = "Episodes to run before a headless run exits")]
    pub episodes: u32,

    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long, value_enum)]
    pub wall_policy: Option<WallPolicyArg>,

    #[arg(long, default_value_t = 0.1)]
    #[arg(help = "Chance of a random action for the scripted policy")]
    pub epsilon: f32,

    #[arg(long, default_value_t = false)]
    #[arg(help = "Open the world inspector (view mode only)")]
    pub inspector: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    Headless,
    View,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum WallPolicyArg {
    Respawn,
    Terminal,
}

impl Cli {
    /// Config file (or defaults) with the command line overrides applied.
    pub fn dungeon_config(&self, settings: &ArenaSettings) -> Result<DungeonConfig> {
        let mut config = match &self.config {
            Some(path) => DungeonConfig::load(path)?,
            None => DungeonConfig::default(),
        };

        if self.rooms.is_some() || self.required_wins.is_some() {
            let rooms = self.rooms.unwrap_or(config.layout.spawns.len());
            let required_wins = self.required_wins.unwrap_or(config.layout.required_wins);
            config.layout = RoomLayout::corridor(rooms, settings.room_size, required_wins);
        }
        if let Some(seed) = self.seed {
            config.progression.seed = seed;
        }
        if let Some(policy) = self.wall_policy {
            config.progression.wall_policy = match policy {
                WallPolicyArg::Respawn => WallPolicy::respawn(),
                WallPolicyArg::Terminal => WallPolicy::terminal(),
            };
        }

        config.progression.validate()?;
        Ok(config)
    }
}

pub fn log_plugin() -> LogPlugin {
    LogPlugin {
        level: Level::INFO,
        filter: "wgpu=error,bevy_render=info,bevy_ecs=info,avian3d=info".to_string(),
        ..default()
    }
}

pub fn run() -> AppExit {
    let cli = Cli::parse();
    let settings = ArenaSettings::default();

    let config = match cli.dungeon_config(&settings) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("❌ Could not load the dungeon config: {}", err);
            return AppExit::error();
        }
    };

    let app = match cli.mode {
        Mode::Headless => create_headless_app(&config, cli.epsilon, cli.episodes).map(|mut app| {
            app.add_plugins(log_plugin());
            app
        }),
        Mode::View => create_view_app(&config, settings, cli.epsilon, cli.inspector, log_plugin()),
    };

    match app {
        Ok(mut app) => app.run(),
        Err(err) => {
            eprintln!("❌ Could not build the dungeon: {}", err);
            AppExit::error()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corridor_overrides_replace_the_layout() {
        let cli = Cli::try_parse_from([
            "launcher",
            "headless",
            "--rooms",
            "4",
            "--required-wins",
            "3",
            "--wall-policy",
            "terminal",
            "--seed",
            "11",
        ])
        .unwrap();

        let config = cli.dungeon_config(&ArenaSettings::default()).unwrap();
        assert_eq!(cli.mode, Mode::Headless);
        assert_eq!(config.layout.spawns.len(), 4);
        assert_eq!(config.layout.required_wins, 3);
        assert!(config.progression.wall_policy.is_terminal());
        assert_eq!(config.progression.seed, 11);
    }

    #[test]
    fn defaults_keep_the_stock_dungeon() {
        let cli = Cli::try_parse_from(["launcher", "view"]).unwrap();
        let config = cli.dungeon_config(&ArenaSettings::default()).unwrap();

        assert_eq!(config, DungeonConfig::default());
        assert_eq!(cli.episodes, 10);
        assert!(!cli.inspector);
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let cli = Cli::try_parse_from([
            "launcher",
            "headless",
            "--config",
            "/definitely/not/here.json",
        ])
        .unwrap();
        assert!(cli.dungeon_config(&ArenaSettings::default()).is_err());
    }
}
