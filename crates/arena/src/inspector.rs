use bevy::prelude::{App, Plugin};
use bevy_inspector_egui::{bevy_egui::EguiPlugin, quick::WorldInspectorPlugin};

use crate::agent::AgentAction;
use crate::door::{DoorMarker, DoorState};
use crate::level::GoalMarker;

/// World inspector window for poking at doors, goals and the agent while the
/// arena runs. Needs a window, so never add it to headless apps.
pub struct ArenaInspectorPlugin;

impl Plugin for ArenaInspectorPlugin {
    fn build(&self, app: &mut App) {
        app.register_type::<DoorMarker>();
        app.register_type::<DoorState>();
        app.register_type::<GoalMarker>();
        app.register_type::<AgentAction>();
        app.add_plugins((EguiPlugin::default(), WorldInspectorPlugin::default()));
        bevy::log::info!("🔍 World inspector enabled");
    }
}
