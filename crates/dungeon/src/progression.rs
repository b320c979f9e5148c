//! The episodic multi-room state machine.
//!
//! `Idle → Active → Transitioning → Active`, and `Active → Idle` when the last
//! room is cleared or a terminal penalty ends the episode. Room progress
//! survives episode resets: a timed-out agent retries the room it is in.

use bevy::log::{debug, info, warn};
use bevy::prelude::{Quat, Vec2, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::adapter::{Adapters, Body, Scoreboard};
use crate::config::ProgressionConfig;
use crate::error::Result;
use crate::event::{Event, RewardOutcome, Tick};
use crate::observation::{KinematicsSource, Observation};
use crate::reward::{RewardPolicy, Scored};
use crate::room::{Pose, RoomRegistry};
use crate::transition::{TransitionPlan, TransitionSequencer, TransitionStatus};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProgressionPhase {
    #[default]
    Idle,
    Active,
    Transitioning,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct EpisodeState {
    pub room_index: usize,
    pub wins: u32,
    pub phase: ProgressionPhase,
    /// Seconds spent on the current dungeon attempt. Survives episode resets.
    pub run_elapsed: f32,
    pub episode_elapsed: f32,
    pub time_ran_out: bool,
    pub goal_position: Vec3,
    pub agent_position: Option<Vec3>,
    last_distance: Option<f32>,
}

impl EpisodeState {
    pub fn is_transitioning(&self) -> bool {
        self.phase == ProgressionPhase::Transitioning
    }
}

#[derive(Clone, Debug)]
pub struct ProgressionState {
    config: ProgressionConfig,
    registry: RoomRegistry,
    policy: RewardPolicy,
    sequencer: TransitionSequencer,
    state: EpisodeState,
    rng: StdRng,
}

impl ProgressionState {
    pub fn new(registry: RoomRegistry, config: ProgressionConfig) -> Result<Self> {
        config.validate()?;
        let first_goal = registry.get(0)?.goal;

        Ok(Self {
            policy: RewardPolicy::new(&config),
            sequencer: TransitionSequencer::new(config.timings),
            rng: StdRng::seed_from_u64(config.seed),
            state: EpisodeState {
                goal_position: first_goal,
                ..Default::default()
            },
            registry,
            config,
        })
    }

    pub fn state(&self) -> &EpisodeState {
        &self.state
    }

    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ProgressionConfig {
        &self.config
    }

    pub fn policy(&self) -> &RewardPolicy {
        &self.policy
    }

    pub fn sequencer(&self) -> &TransitionSequencer {
        &self.sequencer
    }

    pub fn seconds_remaining(&self) -> f32 {
        (self.config.time_limit_secs - self.state.episode_elapsed).max(0.0)
    }

    /// Single entry point for host events.
    pub fn handle(&mut self, event: Event, adapters: &mut Adapters) -> Result<RewardOutcome> {
        match event {
            Event::StepTick(tick) => self.on_step(tick, adapters),
            Event::WallContact => self.on_wall_contact(adapters),
            Event::GoalContact => self.on_goal_contact(adapters),
            Event::BarricadeContact => Ok(self.on_barricade_contact()),
            Event::TimeExpired => Ok(self.on_time_expired(adapters)),
            Event::EpisodeReset => {
                self.begin_episode(adapters)?;
                Ok(RewardOutcome::NONE)
            }
        }
    }

    /// Reset everything but the room index, and put the agent back at the
    /// current room's spawn.
    pub fn begin_episode(&mut self, adapters: &mut Adapters) -> Result<()> {
        if let Some(landed) = self.sequencer.cancel(adapters.movement) {
            self.state.room_index = landed;
        }

        for room in self.registry.iter() {
            adapters
                .movement
                .move_to(Body::Door(room.index), room.door.closed, Quat::IDENTITY);
            adapters
                .movement
                .move_to(Body::Goal(room.index), room.goal, Quat::IDENTITY);
            adapters.movement.set_goal_active(room.index, true);
        }

        let room = self.registry.get(self.state.room_index)?;
        self.state.wins = 0;
        self.state.time_ran_out = false;
        self.state.episode_elapsed = 0.0;
        self.state.goal_position = room.goal;
        self.state.phase = ProgressionPhase::Active;
        self.respawn_agent(adapters)?;

        debug!(
            "🎬 Episode begins in room {} (run clock {:.1}s)",
            self.state.room_index, self.state.run_elapsed
        );
        adapters
            .presentation
            .room_entered(self.state.room_index, true);
        self.publish(adapters)?;
        Ok(())
    }

    pub fn on_step(&mut self, tick: Tick, adapters: &mut Adapters) -> Result<RewardOutcome> {
        if let Some(position) = tick.agent_position {
            self.state.agent_position = Some(position);
        }

        match self.state.phase {
            ProgressionPhase::Idle => return Ok(RewardOutcome::NONE),
            ProgressionPhase::Transitioning => {
                self.advance_transition(tick.dt, adapters)?;
                return Ok(RewardOutcome::NONE);
            }
            ProgressionPhase::Active => {}
        }

        let dt = tick.dt.max(0.0);
        self.state.run_elapsed += dt;
        self.state.episode_elapsed += dt;

        let progress = match self.state.agent_position {
            Some(position) => {
                let distance = position.distance(self.state.goal_position);
                let progress = self
                    .state
                    .last_distance
                    .map_or(0.0, |previous| previous - distance);
                self.state.last_distance = Some(distance);
                progress
            }
            None => 0.0,
        };

        let outcome = self.policy.score(Scored::Step { progress });
        self.publish(adapters)?;
        adapters
            .presentation
            .update_timer(self.state.room_index, self.state.run_elapsed);

        if self.seconds_remaining() <= 0.0 && !self.state.time_ran_out {
            self.on_time_expired(adapters);
        }

        Ok(outcome)
    }

    /// Play the running room transition forward. Hosts that animate per frame
    /// rather than per physics step can call this directly.
    pub fn advance_transition(&mut self, dt: f32, adapters: &mut Adapters) -> Result<()> {
        if let TransitionStatus::Completed { target_room } =
            self.sequencer.advance(dt, adapters.movement)
        {
            self.finish_transition(target_room, adapters)?;
        }
        Ok(())
    }

    pub fn on_wall_contact(&mut self, adapters: &mut Adapters) -> Result<RewardOutcome> {
        if self.state.phase != ProgressionPhase::Active {
            return Ok(RewardOutcome::NONE);
        }

        let outcome = self.policy.score(Scored::Wall);
        if outcome.terminal {
            debug!("🧱 Wall hit in room {}, episode over", self.state.room_index);
            self.state.phase = ProgressionPhase::Idle;
        } else {
            debug!("🧱 Wall hit in room {}, respawning", self.state.room_index);
            self.respawn_agent(adapters)?;
        }
        Ok(outcome)
    }

    pub fn on_goal_contact(&mut self, adapters: &mut Adapters) -> Result<RewardOutcome> {
        if self.state.phase != ProgressionPhase::Active {
            return Ok(RewardOutcome::NONE);
        }

        let index = self.state.room_index;
        let room = self.registry.get(index)?.clone();
        let last_room = self.registry.is_last(index);

        self.state.wins = (self.state.wins + 1).min(room.required_wins);
        let outcome = self.policy.score(Scored::Goal {
            wins: self.state.wins,
            required: room.required_wins,
            last_room,
        });

        if !outcome.advance_room && !outcome.terminal {
            let offset = if self.config.spawn_radius > 0.0 {
                self.rng
                    .random_range(-self.config.spawn_radius..=self.config.spawn_radius)
            } else {
                0.0
            };
            let goal = room.goal + Vec3::X * offset;
            adapters
                .movement
                .move_to(Body::Goal(index), goal, Quat::IDENTITY);
            self.state.goal_position = goal;
            self.respawn_agent(adapters)?;
            debug!(
                "🎯 Goal {}/{} in room {}",
                self.state.wins, room.required_wins, index
            );
        } else if outcome.terminal {
            info!(
                "🏆 Dungeon cleared in {:.1}s, back to room 0",
                self.state.run_elapsed
            );
            adapters.movement.set_goal_active(index, false);
            self.state.run_elapsed = 0.0;
            self.state.room_index = 0;
            self.state.wins = 0;
            self.state.phase = ProgressionPhase::Idle;
        } else {
            let next = self.registry.get(index + 1)?;
            let from = Pose::new(
                self.state.agent_position.unwrap_or(room.spawn.position),
                room.spawn.rotation,
            );
            self.sequencer
                .begin(TransitionPlan::between(&room, next, from))?;

            info!("🚪 Room {} cleared, opening the way to {}", index, index + 1);
            adapters.movement.set_goal_active(index, false);
            self.state.wins = 0;
            self.state.phase = ProgressionPhase::Transitioning;
            adapters.presentation.room_entered(index + 1, false);
        }

        self.publish(adapters)?;
        Ok(outcome)
    }

    pub fn on_barricade_contact(&mut self) -> RewardOutcome {
        if self.state.phase != ProgressionPhase::Active {
            return RewardOutcome::NONE;
        }
        self.policy.score(Scored::Barricade)
    }

    /// Only flags the timeout for presentation. Ending the episode on an
    /// exhausted step budget is up to the host.
    pub fn on_time_expired(&mut self, adapters: &mut Adapters) -> RewardOutcome {
        if !self.state.time_ran_out {
            warn!("⏰ Time ran out in room {}", self.state.room_index);
        }
        self.state.time_ran_out = true;
        adapters.presentation.time_expired(self.state.room_index);
        self.policy.score(Scored::TimeExpired)
    }

    pub fn observe(&self, kinematics: &dyn KinematicsSource) -> Observation {
        let velocity = kinematics.velocity();
        let required = self
            .registry
            .get(self.state.room_index)
            .map_or(0, |room| room.required_wins);

        Observation {
            room_index: self.state.room_index,
            forward: kinematics.forward(),
            velocity_xz: Vec2::new(velocity.x, velocity.z),
            wins_remaining: required.saturating_sub(self.state.wins),
        }
    }

    fn finish_transition(&mut self, target_room: usize, adapters: &mut Adapters) -> Result<()> {
        let room = self.registry.get(target_room)?;
        self.state.room_index = target_room;
        self.state.goal_position = room.goal;
        self.state.agent_position = Some(room.spawn.position);
        self.state.last_distance = Some(room.spawn.position.distance(room.goal));
        self.state.phase = ProgressionPhase::Active;

        info!("➡️ Entered room {}", target_room);
        self.publish(adapters)
    }

    fn respawn_agent(&mut self, adapters: &mut Adapters) -> Result<()> {
        let spawn = self.registry.get(self.state.room_index)?.spawn;
        adapters
            .movement
            .move_to(Body::Agent, spawn.position, spawn.rotation);
        self.state.agent_position = Some(spawn.position);
        self.state.last_distance = Some(spawn.position.distance(self.state.goal_position));
        Ok(())
    }

    fn publish(&self, adapters: &mut Adapters) -> Result<()> {
        let room = self.registry.get(self.state.room_index)?;
        adapters.presentation.update_scoreboard(Scoreboard {
            room_index: self.state.room_index,
            wins: self.state.wins,
            required: room.required_wins,
            seconds_remaining: self.seconds_remaining(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{MoveLog, PresentationAdapter};
    use crate::config::{TransitionTimings, WallPolicy};
    use crate::room::RoomLayout;

    #[derive(Default)]
    struct Screen {
        boards: Vec<Scoreboard>,
        entered: Vec<(usize, bool)>,
        expired: usize,
    }

    impl PresentationAdapter for Screen {
        fn update_scoreboard(&mut self, scoreboard: Scoreboard) {
            self.boards.push(scoreboard);
        }

        fn update_timer(&mut self, _room_index: usize, _elapsed_secs: f32) {}

        fn room_entered(&mut self, room_index: usize, snap: bool) {
            self.entered.push((room_index, snap));
        }

        fn time_expired(&mut self, _room_index: usize) {
            self.expired += 1;
        }
    }

    struct Harness {
        progression: ProgressionState,
        moves: MoveLog,
        screen: Screen,
    }

    impl Harness {
        fn new(rooms: usize, required_wins: u32, config: ProgressionConfig) -> Self {
            let registry =
                RoomRegistry::from_layout(&RoomLayout::corridor(rooms, 10.0, required_wins))
                    .unwrap();
            let mut harness = Self {
                progression: ProgressionState::new(registry, config).unwrap(),
                moves: MoveLog::default(),
                screen: Screen::default(),
            };
            harness.send(Event::EpisodeReset);
            harness
        }

        fn send(&mut self, event: Event) -> RewardOutcome {
            let mut adapters = Adapters::new(&mut self.moves, &mut self.screen);
            self.progression.handle(event, &mut adapters).unwrap()
        }

        fn tick(&mut self, dt: f32) -> RewardOutcome {
            self.send(Event::StepTick(Tick::new(dt)))
        }

        fn finish_transition(&mut self) {
            let mut guard = 0;
            while self.progression.state().is_transitioning() {
                self.tick(0.1);
                guard += 1;
                assert!(guard < 1000, "transition never finished");
            }
        }

        fn state(&self) -> &EpisodeState {
            self.progression.state()
        }
    }

    fn quick_config() -> ProgressionConfig {
        ProgressionConfig {
            max_steps: 100,
            timings: TransitionTimings {
                door_secs: 0.2,
                move_secs: 0.3,
            },
            ..Default::default()
        }
    }

    #[test]
    fn three_room_scenario_walks_the_whole_dungeon() {
        let mut h = Harness::new(3, 2, quick_config());

        assert_eq!(h.send(Event::GoalContact).delta, 1.0);
        let clear = h.send(Event::GoalContact);
        assert_eq!(clear.delta, 5.0);
        assert!(clear.advance_room);
        assert_eq!(h.state().wins, 0, "win count resets on room clear");
        assert!(h.state().is_transitioning());
        h.finish_transition();
        assert_eq!(h.state().room_index, 1);
        assert_eq!(h.state().wins, 0);

        h.send(Event::GoalContact);
        h.send(Event::GoalContact);
        h.finish_transition();
        assert_eq!(h.state().room_index, 2);

        h.send(Event::GoalContact);
        let done = h.send(Event::GoalContact);
        assert_eq!(done.delta, 15.0, "room clear plus +10 dungeon bonus");
        assert!(done.terminal);
        assert_eq!(h.state().room_index, 0);
        assert_eq!(h.state().phase, ProgressionPhase::Idle);
    }

    #[test]
    fn wins_stay_within_bounds() {
        let mut h = Harness::new(2, 3, quick_config());
        let required = 3;

        for _ in 0..20 {
            h.send(Event::GoalContact);
            assert!(h.state().wins <= required);
            h.tick(0.05);
            assert!(h.state().wins <= required);
        }
    }

    #[test]
    fn goal_contacts_during_transition_are_ignored() {
        let mut h = Harness::new(3, 1, quick_config());

        h.send(Event::GoalContact);
        assert!(h.state().is_transitioning());
        let target = h.progression.sequencer().plan().unwrap().target_room;

        for _ in 0..5 {
            assert_eq!(h.send(Event::GoalContact), RewardOutcome::NONE);
            assert_eq!(h.send(Event::WallContact), RewardOutcome::NONE);
            assert_eq!(
                h.progression.sequencer().plan().unwrap().target_room,
                target,
                "a second transition must not start"
            );
        }

        h.finish_transition();
        assert_eq!(h.state().room_index, 1, "exactly one room per clear");
    }

    #[test]
    fn non_terminal_wall_penalty_respawns_in_place() {
        let mut h = Harness::new(3, 2, quick_config());
        h.moves.clear();

        let outcome = h.send(Event::WallContact);
        assert_eq!(outcome.delta, -0.02);
        assert!(!outcome.terminal);
        assert_eq!(h.state().room_index, 0);
        assert!(!h.state().is_transitioning());

        let spawn = h.progression.registry().get(0).unwrap().spawn.position;
        assert_eq!(h.moves.last_position(Body::Agent), Some(spawn));
    }

    #[test]
    fn terminal_wall_policy_ends_the_episode() {
        let config = ProgressionConfig {
            wall_policy: WallPolicy::terminal(),
            ..quick_config()
        };
        let mut h = Harness::new(2, 2, config);

        let outcome = h.send(Event::WallContact);
        assert_eq!(outcome.delta, -2.0);
        assert!(outcome.terminal);
        assert_eq!(h.state().phase, ProgressionPhase::Idle);
    }

    #[test]
    fn room_progress_survives_episode_reset() {
        let mut h = Harness::new(3, 1, quick_config());
        h.send(Event::GoalContact);
        h.finish_transition();
        h.tick(0.5);
        let run_clock = h.state().run_elapsed;

        h.send(Event::EpisodeReset);
        assert_eq!(h.state().room_index, 1, "retry the same room");
        assert_eq!(h.state().wins, 0);
        assert_eq!(h.state().episode_elapsed, 0.0);
        assert!(h.state().run_elapsed >= run_clock, "run clock is monotonic");
        assert_eq!(h.screen.entered.last(), Some(&(1, true)));
    }

    #[test]
    fn reset_mid_transition_lands_in_the_next_room() {
        let mut h = Harness::new(3, 1, quick_config());
        h.send(Event::GoalContact);
        h.tick(0.1);
        assert!(h.state().is_transitioning());

        h.send(Event::EpisodeReset);
        assert!(!h.state().is_transitioning());
        assert!(!h.progression.sequencer().is_active());
        assert_eq!(h.state().room_index, 1);

        let room = h.progression.registry().get(0).unwrap();
        assert_eq!(
            h.moves.last_position(Body::Door(0)),
            Some(room.door.closed)
        );
    }

    #[test]
    fn dungeon_clear_resets_run_clock() {
        let mut h = Harness::new(2, 1, quick_config());
        h.tick(1.0);
        h.send(Event::GoalContact);
        h.finish_transition();
        h.tick(1.0);
        assert!(h.state().run_elapsed > 1.9);

        let done = h.send(Event::GoalContact);
        assert!(done.terminal);
        assert_eq!(h.state().run_elapsed, 0.0);
    }

    #[test]
    fn partial_goal_moves_goal_within_spawn_radius() {
        let config = ProgressionConfig {
            spawn_radius: 1.5,
            ..quick_config()
        };
        let mut h = Harness::new(1, 10, config);
        let anchor = h.progression.registry().get(0).unwrap().goal;

        for _ in 0..8 {
            h.send(Event::GoalContact);
            let goal = h.moves.last_position(Body::Goal(0)).unwrap();
            assert!((goal.x - anchor.x).abs() <= 1.5);
            assert_eq!(goal.y, anchor.y);
            assert_eq!(goal.z, anchor.z);
            assert_eq!(h.state().goal_position, goal);
        }
    }

    #[test]
    fn countdown_flags_time_out_once_without_ending_episode() {
        let config = ProgressionConfig {
            time_limit_secs: 1.0,
            ..quick_config()
        };
        let mut h = Harness::new(2, 2, config);

        for _ in 0..15 {
            let outcome = h.tick(0.1);
            assert!(!outcome.terminal);
        }
        assert!(h.state().time_ran_out);
        assert_eq!(h.screen.expired, 1);
        assert_eq!(h.screen.boards.last().unwrap().seconds_remaining, 0.0);
        assert_eq!(h.state().phase, ProgressionPhase::Active);
    }

    #[test]
    fn distance_shaping_uses_reported_agent_position() {
        let config = ProgressionConfig {
            distance_shaping: 1.0,
            ..quick_config()
        };
        let mut h = Harness::new(1, 2, config);
        let goal = h.state().goal_position;
        let spawn = h.progression.registry().get(0).unwrap().spawn.position;
        let halfway = spawn.lerp(goal, 0.5);

        let outcome = h.send(Event::StepTick(Tick::with_agent(0.02, halfway)));
        let expected = spawn.distance(goal) * 0.5 - 0.01;
        assert!((outcome.delta - expected).abs() < 1e-4);
    }

    #[test]
    fn barricade_is_a_soft_penalty() {
        let mut h = Harness::new(2, 2, quick_config());
        let outcome = h.send(Event::BarricadeContact);
        assert_eq!(outcome.delta, -0.2);
        assert!(!outcome.terminal);
        assert_eq!(h.state().phase, ProgressionPhase::Active);
    }

    struct Still;

    impl KinematicsSource for Still {
        fn forward(&self) -> Vec3 {
            Vec3::NEG_Z
        }

        fn velocity(&self) -> Vec3 {
            Vec3::new(1.0, 9.0, -2.0)
        }
    }

    #[test]
    fn observation_reports_room_and_remaining_wins() {
        let mut h = Harness::new(2, 3, quick_config());
        h.send(Event::GoalContact);

        let observation = h.progression.observe(&Still);
        assert_eq!(observation.room_index, 0);
        assert_eq!(observation.wins_remaining, 2);
        assert_eq!(observation.velocity_xz, Vec2::new(1.0, -2.0));
        assert_eq!(observation.forward, Vec3::NEG_Z);
    }
}
