pub mod agent;
pub mod camera;
pub mod contacts;
pub mod debug;
pub mod door;
pub mod host;
pub mod inspector;
pub mod level;
pub mod scoreboard;

use bevy::prelude::{
    App, FixedUpdate, IntoScheduleConfigs, Plugin, Resource, Startup, SystemSet, Update,
};
use dungeon::{DungeonConfig, EpisodeDriver, Result, StepReport};
use serde::{Deserialize, Serialize};

/// Physical dimensions of the arena built around the room layout.
#[derive(Resource, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArenaSettings {
    pub room_size: f32,
    pub wall_height: f32,
    pub wall_thickness: f32,
    pub agent_radius: f32,
    pub agent_speed: f32,
    pub goal_radius: f32,
}

impl Default for ArenaSettings {
    fn default() -> Self {
        Self {
            room_size: 12.0,
            wall_height: 6.0,
            wall_thickness: 0.5,
            agent_radius: 0.5,
            agent_speed: 3.0,
            goal_radius: 0.6,
        }
    }
}

/// The progression core as a Bevy resource.
#[derive(Resource, Clone, Debug)]
pub struct DungeonRun {
    pub driver: EpisodeDriver,
    pub last_report: StepReport,
}

impl DungeonRun {
    pub fn from_config(config: &DungeonConfig) -> Result<Self> {
        Ok(Self {
            driver: EpisodeDriver::from_config(config)?,
            last_report: StepReport::default(),
        })
    }

    pub fn room_index(&self) -> usize {
        self.driver.progression().state().room_index
    }

    pub fn is_transitioning(&self) -> bool {
        self.driver.progression().state().is_transitioning()
    }
}

/// Order of the per-physics-step work. Policies that drive the agent should
/// run in `Decide`.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArenaSet {
    Decide,
    Act,
    Progress,
    Apply,
}

/// Simulation half of the arena: level, agent, contacts and progression.
/// Works under `MinimalPlugins`; pair with [`ArenaViewPlugin`] for a window.
pub struct ArenaPlugin {
    run: DungeonRun,
    settings: ArenaSettings,
}

impl ArenaPlugin {
    pub fn new(config: &DungeonConfig) -> Result<Self> {
        Ok(Self {
            run: DungeonRun::from_config(config)?,
            settings: ArenaSettings::default(),
        })
    }

    pub fn with_settings(mut self, settings: ArenaSettings) -> Self {
        self.settings = settings;
        self
    }
}

impl Plugin for ArenaPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(self.run.clone());
        app.insert_resource(self.settings.clone());
        app.init_resource::<host::PendingMoves>();
        app.init_resource::<host::ArenaPresenter>();
        app.init_resource::<host::EpisodeHistory>();
        app.init_resource::<agent::LatestObservation>();

        app.configure_sets(
            FixedUpdate,
            (
                ArenaSet::Decide,
                ArenaSet::Act,
                ArenaSet::Progress,
                ArenaSet::Apply,
            )
                .chain(),
        );

        app.add_systems(
            Startup,
            (
                level::spawn_dungeon_level,
                agent::spawn_agent,
                host::start_first_episode,
            )
                .chain(),
        );
        app.add_systems(
            FixedUpdate,
            agent::apply_agent_action.in_set(ArenaSet::Act),
        );
        app.add_systems(
            FixedUpdate,
            (host::step_progression, contacts::route_contacts)
                .chain()
                .in_set(ArenaSet::Progress),
        );
        app.add_systems(
            FixedUpdate,
            (
                host::apply_pending_moves,
                door::sync_door_states,
                agent::record_observation,
            )
                .chain()
                .in_set(ArenaSet::Apply),
        );

        bevy::log::info!("🏰 Arena plugin initialized");
    }
}

/// Window-side half: follow camera, lights, scoreboard and debug gizmos.
pub struct ArenaViewPlugin;

impl Plugin for ArenaViewPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Startup,
            (
                camera::spawn_room_camera,
                scoreboard::spawn_scoreboard,
                level::spawn_lights,
            ),
        );
        app.add_systems(
            Update,
            (
                (camera::follow_room_changes, camera::update_room_camera).chain(),
                scoreboard::update_scoreboard_text,
                debug::draw_goal_gizmos,
                debug::draw_door_gizmos,
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::prelude::{Assets, Mesh, MinimalPlugins, StandardMaterial};
    use dungeon::ProgressionPhase;

    fn count<T: bevy::prelude::Component>(app: &mut App) -> usize {
        let mut query = app.world_mut().query::<&T>();
        query.iter(app.world()).count()
    }

    #[test]
    fn startup_builds_every_room_and_starts_an_episode() {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins);
        app.init_resource::<Assets<Mesh>>();
        app.init_resource::<Assets<StandardMaterial>>();
        app.add_plugins(ArenaPlugin::new(&DungeonConfig::default()).unwrap());
        app.update();

        assert_eq!(count::<level::GoalMarker>(&mut app), 3);
        assert_eq!(count::<door::DoorMarker>(&mut app), 3);
        assert_eq!(count::<agent::Agent>(&mut app), 1);
        // north and south per room, plus the west wall closing room 0
        assert_eq!(count::<level::WallMarker>(&mut app), 7);

        let run = app.world().resource::<DungeonRun>();
        assert_eq!(run.room_index(), 0);
        assert_eq!(
            run.driver.progression().state().phase,
            ProgressionPhase::Active
        );

        let presenter = app.world().resource::<host::ArenaPresenter>();
        assert_eq!(presenter.scoreboard.required, 2);
    }

    #[test]
    fn level_builds_without_render_assets() {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins);
        app.add_plugins(ArenaPlugin::new(&DungeonConfig::default()).unwrap());
        app.update();

        assert_eq!(count::<level::FloorMarker>(&mut app), 3);
    }

    #[test]
    fn layout_barricades_become_colliders() {
        let mut config = DungeonConfig::default();
        config.layout = config.layout.with_barricade(
            1,
            dungeon::BarricadeSpec {
                center: [12.0, 0.5, 2.0],
                size: [1.0, 1.0, 1.0],
            },
        );

        let mut app = App::new();
        app.add_plugins(MinimalPlugins);
        app.add_plugins(ArenaPlugin::new(&config).unwrap());
        app.update();

        assert_eq!(count::<level::BarricadeMarker>(&mut app), 1);
        assert_eq!(count::<level::WallMarker>(&mut app), 7);
    }

    #[test]
    fn invalid_config_is_rejected_before_building() {
        let mut config = DungeonConfig::default();
        config.layout.goals.clear();
        assert!(ArenaPlugin::new(&config).is_err());
    }
}
