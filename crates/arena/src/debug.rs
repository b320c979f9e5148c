use avian3d::prelude::Position;
use bevy::prelude::{Color, Gizmos, Query, Res, Vec3, Visibility, With};

use crate::agent::Agent;
use crate::door::{DoorMarker, DoorState};
use crate::level::GoalMarker;
use crate::{ArenaSettings, DungeonRun};

/// Outline the active goal and a line from the agent to it.
pub fn draw_goal_gizmos(
    run: Res<DungeonRun>,
    settings: Res<ArenaSettings>,
    goals: Query<(&GoalMarker, &Position, &Visibility)>,
    agents: Query<&Position, With<Agent>>,
    mut gizmos: Gizmos,
) {
    let room = run.room_index();
    let active = Color::srgb(0.0, 1.0, 0.0);
    let idle = Color::srgba(0.5, 0.5, 0.5, 0.4);

    for (marker, position, visibility) in goals.iter() {
        if *visibility == Visibility::Hidden {
            continue;
        }
        let color = if marker.room == room { active } else { idle };
        gizmos.sphere(position.0, settings.goal_radius * 1.2, color);

        if marker.room == room
            && !run.is_transitioning()
            && let Ok(agent) = agents.single()
        {
            gizmos.line(agent.0 + Vec3::Y * 0.1, position.0, Color::srgb(1.0, 1.0, 0.0));
        }
    }
}

/// Green marker on doors the agent can pass, red on closed ones.
pub fn draw_door_gizmos(
    doors: Query<(&DoorState, &Position), With<DoorMarker>>,
    mut gizmos: Gizmos,
) {
    for (state, position) in doors.iter() {
        let color = if state.is_passable() {
            Color::srgb(0.1, 0.9, 0.2)
        } else {
            Color::srgb(0.9, 0.1, 0.1)
        };
        gizmos.sphere(position.0, 0.3, color);
    }
}
