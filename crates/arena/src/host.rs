//! Bevy side of the progression adapters.
//!
//! The core's requests are buffered into resources while an event is being
//! handled and applied to entities afterwards, so a single system never needs
//! mutable access to the whole world.

use avian3d::prelude::{LinearVelocity, Position, Rotation};
use bevy::log::{error, info};
use bevy::prelude::{
    Quat, Query, Res, ResMut, Resource, Time, Vec3, Visibility, With, Without,
};
use dungeon::{
    Adapters, Body, EpisodeSignal, EpisodeSummary, Event, MoveLog, MovementAdapter,
    PresentationAdapter, Scoreboard, Tick,
};

use crate::DungeonRun;
use crate::agent::Agent;
use crate::door::DoorMarker;
use crate::level::GoalMarker;

/// Movement requests waiting to be written to entity positions.
#[derive(Resource, Default, Debug)]
pub struct PendingMoves(pub MoveLog);

impl MovementAdapter for PendingMoves {
    fn move_to(&mut self, body: Body, position: Vec3, rotation: Quat) {
        self.0.move_to(body, position, rotation);
    }

    fn set_goal_active(&mut self, room: usize, active: bool) {
        self.0.set_goal_active(room, active);
    }
}

/// Latest presentation state published by the core.
#[derive(Resource, Default, Debug, Clone)]
pub struct ArenaPresenter {
    pub scoreboard: Scoreboard,
    pub run_elapsed: f32,
    pub time_ran_out: bool,
    /// Room change not yet picked up by the camera, with its snap flag.
    pub entered: Option<(usize, bool)>,
}

impl PresentationAdapter for ArenaPresenter {
    fn update_scoreboard(&mut self, scoreboard: Scoreboard) {
        self.scoreboard = scoreboard;
    }

    fn update_timer(&mut self, _room_index: usize, elapsed_secs: f32) {
        self.run_elapsed = elapsed_secs;
    }

    /// The timeout only clears when a new episode snaps the view back.
    fn room_entered(&mut self, room_index: usize, snap: bool) {
        if snap {
            self.time_ran_out = false;
        }
        self.entered = Some((room_index, snap));
    }

    fn time_expired(&mut self, _room_index: usize) {
        self.time_ran_out = true;
    }
}

/// Every finished episode, oldest first.
#[derive(Resource, Default, Debug, Clone)]
pub struct EpisodeHistory(pub Vec<EpisodeSummary>);

impl EpisodeHistory {
    pub fn dungeon_clears(&self) -> usize {
        self.0.iter().filter(|summary| summary.cleared_dungeon).count()
    }
}

impl EpisodeSignal for EpisodeHistory {
    fn end_episode(&mut self, summary: &EpisodeSummary) {
        self.0.push(summary.clone());
    }
}

/// Feed one event through the driver with the arena's adapters.
pub fn dispatch(
    run: &mut DungeonRun,
    event: Event,
    moves: &mut PendingMoves,
    presenter: &mut ArenaPresenter,
    history: &mut EpisodeHistory,
) {
    let mut adapters = Adapters::new(moves, presenter);
    match run.driver.handle(event, &mut adapters, history) {
        Ok(report) => run.last_report = report,
        Err(err) => error!("❌ Progression rejected {:?}: {}", event, err),
    }
}

pub fn start_first_episode(
    mut run: ResMut<DungeonRun>,
    mut moves: ResMut<PendingMoves>,
    mut presenter: ResMut<ArenaPresenter>,
    mut history: ResMut<EpisodeHistory>,
) {
    dispatch(
        &mut run,
        Event::EpisodeReset,
        &mut moves,
        &mut presenter,
        &mut history,
    );
    info!(
        "🎬 First episode started in room {}",
        run.room_index()
    );
}

pub fn step_progression(
    time: Res<Time>,
    agent: Query<&Position, With<Agent>>,
    mut run: ResMut<DungeonRun>,
    mut moves: ResMut<PendingMoves>,
    mut presenter: ResMut<ArenaPresenter>,
    mut history: ResMut<EpisodeHistory>,
) {
    let tick = Tick {
        dt: time.delta_secs(),
        agent_position: agent.single().ok().map(|position| position.0),
    };
    dispatch(
        &mut run,
        Event::StepTick(tick),
        &mut moves,
        &mut presenter,
        &mut history,
    );
}

/// Write buffered movement requests onto the agent, goals and doors.
pub fn apply_pending_moves(
    mut moves: ResMut<PendingMoves>,
    mut agents: Query<(&mut Position, &mut Rotation, &mut LinearVelocity), With<Agent>>,
    mut goals: Query<(&GoalMarker, &mut Position, &mut Visibility), Without<Agent>>,
    mut doors: Query<(&DoorMarker, &mut Position), (Without<Agent>, Without<GoalMarker>)>,
) {
    if moves.0.moves.is_empty() && moves.0.goal_toggles.is_empty() {
        return;
    }

    for (body, position, rotation) in moves.0.moves.drain(..) {
        match body {
            Body::Agent => {
                for (mut agent_position, mut agent_rotation, mut velocity) in agents.iter_mut() {
                    agent_position.0 = position;
                    agent_rotation.0 = rotation;
                    velocity.0 = Vec3::ZERO;
                }
            }
            Body::Goal(room) => {
                for (marker, mut goal_position, _) in goals.iter_mut() {
                    if marker.room == room {
                        goal_position.0 = position;
                    }
                }
            }
            Body::Door(room) => {
                for (marker, mut door_position) in doors.iter_mut() {
                    if marker.room == room {
                        door_position.0 = position;
                    }
                }
            }
        }
    }

    for (room, active) in moves.0.goal_toggles.drain(..) {
        for (marker, _, mut visibility) in goals.iter_mut() {
            if marker.room == room {
                *visibility = if active {
                    Visibility::Inherited
                } else {
                    Visibility::Hidden
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_label_outlives_later_wins() {
        let mut presenter = ArenaPresenter::default();
        presenter.time_expired(0);

        presenter.update_scoreboard(Scoreboard {
            wins: 1,
            ..presenter.scoreboard
        });
        presenter.room_entered(1, false);
        assert!(presenter.time_ran_out, "goal and room change keep TIME!");

        presenter.room_entered(1, true);
        assert!(!presenter.time_ran_out);
        assert_eq!(presenter.entered, Some((1, true)));
    }
}
