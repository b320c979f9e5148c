use avian3d::prelude::CollidingEntities;
use bevy::prelude::{Entity, Or, Query, ResMut, With};
use dungeon::Event;

use crate::DungeonRun;
use crate::agent::{Agent, ContactMemory};
use crate::door::DoorMarker;
use crate::host::{ArenaPresenter, EpisodeHistory, PendingMoves, dispatch};
use crate::level::{BarricadeMarker, GoalMarker, WallMarker};

/// What touching an entity means to the progression core, if anything.
pub fn classify(
    entity: Entity,
    room_index: usize,
    walls: &Query<(), Or<(With<WallMarker>, With<DoorMarker>)>>,
    goals: &Query<&GoalMarker>,
    barricades: &Query<(), With<BarricadeMarker>>,
) -> Option<Event> {
    if walls.contains(entity) {
        return Some(Event::WallContact);
    }
    if let Ok(goal) = goals.get(entity) {
        // Goals of other rooms are out of reach behind their doors anyway.
        return (goal.room == room_index).then_some(Event::GoalContact);
    }
    if barricades.contains(entity) {
        return Some(Event::BarricadeContact);
    }
    None
}

/// Report contacts the agent did not have on the previous step.
///
/// Nothing is reported once the step has ended an episode: the contacts still
/// belong to the pose from before the reset.
#[allow(clippy::too_many_arguments)]
pub fn route_contacts(
    mut agents: Query<(&CollidingEntities, &mut ContactMemory), With<Agent>>,
    walls: Query<(), Or<(With<WallMarker>, With<DoorMarker>)>>,
    goals: Query<&GoalMarker>,
    barricades: Query<(), With<BarricadeMarker>>,
    mut run: ResMut<DungeonRun>,
    mut moves: ResMut<PendingMoves>,
    mut presenter: ResMut<ArenaPresenter>,
    mut history: ResMut<EpisodeHistory>,
) {
    for (colliding, mut memory) in agents.iter_mut() {
        let mut fresh: Vec<Entity> = colliding
            .0
            .iter()
            .copied()
            .filter(|entity| !memory.0.contains(entity))
            .collect();
        fresh.sort();

        memory.0 = colliding.0.iter().copied().collect();

        for entity in fresh {
            if run.last_report.terminal {
                break;
            }
            let Some(event) = classify(entity, run.room_index(), &walls, &goals, &barricades)
            else {
                continue;
            };
            bevy::log::debug!("💥 Agent touched {:?}: {:?}", entity, event);
            dispatch(&mut run, event, &mut moves, &mut presenter, &mut history);
        }
    }
}
