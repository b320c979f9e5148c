// Room doors
//
// The progression core moves door panels itself while a transition plays.
// `DoorState` mirrors where each door is in that sequence so other systems
// (and the inspector) can tell an opening door from a closed one.

use bevy::prelude::{Component, Query, Reflect, ReflectComponent, Res};
use dungeon::TransitionPhase;
use serde::{Deserialize, Serialize};

use crate::DungeonRun;

/// Door panel of a room; it separates that room from the next one.
#[derive(Component, Reflect, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[reflect(Component)]
pub struct DoorMarker {
    pub room: usize,
}

#[derive(Component, Reflect, Clone, Debug, PartialEq, Serialize, Deserialize, Default)]
#[reflect(Component)]
pub enum DoorState {
    /// Panel sits in the doorway.
    #[default]
    Closed,
    /// Panel sliding up, `progress` of the way.
    Opening { progress: f32 },
    /// Panel out of the way while the agent is carried through.
    Open,
    /// Panel sliding back down behind the agent.
    Closing { progress: f32 },
}

impl DoorState {
    /// State of `room`'s door given the running transition, if any.
    pub fn for_room(
        room: usize,
        transition: Option<(usize, TransitionPhase, f32)>,
    ) -> Self {
        match transition {
            Some((from_room, phase, progress)) if from_room == room => match phase {
                TransitionPhase::OpeningDoor if progress >= 1.0 => DoorState::Open,
                TransitionPhase::OpeningDoor => DoorState::Opening { progress },
                TransitionPhase::MovingAgent => DoorState::Open,
                TransitionPhase::ClosingDoor if progress >= 1.0 => DoorState::Closed,
                TransitionPhase::ClosingDoor => DoorState::Closing { progress },
            },
            _ => DoorState::Closed,
        }
    }

    /// Whether the panel has left the doorway at all.
    pub fn is_passable(&self) -> bool {
        !matches!(self, DoorState::Closed)
    }
}

pub fn sync_door_states(run: Res<DungeonRun>, mut doors: Query<(&DoorMarker, &mut DoorState)>) {
    let sequencer = run.driver.progression().sequencer();
    let transition = sequencer
        .plan()
        .zip(sequencer.phase())
        .zip(sequencer.progress())
        .map(|((plan, phase), progress)| (plan.from_room, phase, progress));

    for (marker, mut state) in doors.iter_mut() {
        let next = DoorState::for_room(marker.room, transition);
        if *state != next {
            *state = next;
        }
    }
}
