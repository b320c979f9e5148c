use avian3d::prelude::PhysicsPlugins;
use bevy::log::LogPlugin;
use bevy::prelude::{
    App, DefaultPlugins, Fixed, FixedUpdate, IntoScheduleConfigs, PluginGroup, Time, Window,
    WindowPlugin, default,
};
use bevy::window::PresentMode;

use arena::inspector::ArenaInspectorPlugin;
use arena::{ArenaPlugin, ArenaSet, ArenaSettings, ArenaViewPlugin};
use dungeon::{DungeonConfig, FIXED_TIMESTEP_HZ, Result};

use crate::policy::{GoalSeeker, seek_goal};

/// Windowed arena with physics, the room camera and the scripted policy at the
/// controls.
pub fn create_view_app(
    config: &DungeonConfig,
    settings: ArenaSettings,
    epsilon: f32,
    inspector: bool,
    log: LogPlugin,
) -> Result<App> {
    let arena = ArenaPlugin::new(config)?.with_settings(settings);

    let mut app = App::new();
    app.add_plugins(
        DefaultPlugins
            .set(WindowPlugin {
                primary_window: Some(Window {
                    title: "Dungeon Arena".to_string(),
                    resolution: (1280, 720).into(),
                    present_mode: PresentMode::AutoVsync,
                    ..default()
                }),
                ..default()
            })
            .set(log),
    );
    app.insert_resource(Time::<Fixed>::from_hz(FIXED_TIMESTEP_HZ));
    app.add_plugins(PhysicsPlugins::default());
    app.add_plugins((arena, ArenaViewPlugin));

    app.insert_resource(GoalSeeker::new(
        epsilon,
        config.progression.seed.wrapping_add(1),
    ));
    app.add_systems(FixedUpdate, seek_goal.in_set(ArenaSet::Decide));

    if inspector {
        app.add_plugins(ArenaInspectorPlugin);
    }

    Ok(app)
}
