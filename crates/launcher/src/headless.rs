//! Physics-free training loop: a point mass walks the room layout while the
//! episode driver scores it, one fixed step per app update.

use bevy::app::{AppExit, ScheduleRunnerPlugin};
use bevy::log::{error, info};
use bevy::prelude::{
    App, MessageWriter, MinimalPlugins, Plugin, PluginGroup, Quat, Res, ResMut, Resource, Update,
    Vec2, Vec3,
};
use std::time::Duration;

use arena::ArenaSettings;
use arena::agent::{BodyKinematics, facing};
use arena::host::EpisodeHistory;
use dungeon::{
    Adapters, Barricade, Body, DungeonConfig, EpisodeDriver, EpisodeSummary, Event,
    FIXED_TIMESTEP_HZ, KinematicsSource, MovementAdapter, NoPresentation, OBSERVATION_SIZE,
    Result, RoomRegistry, StepReport, Tick,
};

use crate::policy::GoalSeeker;

pub const HEADLESS_DT: f32 = (1.0 / FIXED_TIMESTEP_HZ) as f32;

/// How close the agent has to be to a barricade face to count as touching it.
const CONTACT_SKIN: f32 = 0.01;

/// Agent, goals and doors as plain positions inside axis-aligned rooms.
#[derive(Clone, Debug)]
pub struct PointMassSim {
    settings: ArenaSettings,
    centers: Vec<Vec3>,
    position: Vec3,
    rotation: Quat,
    velocity: Vec3,
    goals: Vec<Vec3>,
    goal_active: Vec<bool>,
    doors: Vec<Vec3>,
    barricades: Vec<Vec<Barricade>>,
    /// Contact reported on the previous step; a touch is reported once.
    touching: Option<Event>,
}

impl PointMassSim {
    pub fn new(registry: &RoomRegistry, settings: ArenaSettings) -> Self {
        let spawn = registry
            .iter()
            .next()
            .map(|room| room.spawn)
            .unwrap_or_default();

        Self {
            centers: registry
                .iter()
                .map(|room| (room.spawn.position + room.goal) * 0.5)
                .collect(),
            goals: registry.iter().map(|room| room.goal).collect(),
            goal_active: vec![true; registry.len()],
            doors: registry.iter().map(|room| room.door.closed).collect(),
            barricades: registry
                .iter()
                .map(|room| room.barricades.clone())
                .collect(),
            touching: None,
            position: spawn.position,
            rotation: spawn.rotation,
            velocity: Vec3::ZERO,
            settings,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn door(&self, room: usize) -> Option<Vec3> {
        self.doors.get(room).copied()
    }

    pub fn goal(&self, room: usize) -> Option<Vec3> {
        self.goals.get(room).copied()
    }

    /// Integrate one step of planar motion from a move action. Barricades
    /// are solid: the agent is pushed back out of any it walks into.
    pub fn advance(&mut self, action: Vec2, dt: f32) {
        let input = action.clamp_length_max(1.0);
        self.velocity = Vec3::new(input.x, 0.0, input.y) * self.settings.agent_speed;
        self.position += self.velocity * dt.max(0.0);
        if let Some(yaw) = facing(input) {
            self.rotation = yaw;
        }

        let radius = self.settings.agent_radius;
        for barricade in self.barricades.iter().flatten() {
            self.position = push_out(self.position, barricade, radius);
        }
    }

    /// Like [`Self::contact`], but only when it differs from the last step's.
    pub fn fresh_contact(&mut self, room: usize) -> Option<Event> {
        let now = self.contact(room);
        if now == self.touching {
            return None;
        }
        self.touching = now;
        now
    }

    /// What the agent is touching in `room`: goal, then barricades, then walls.
    pub fn contact(&self, room: usize) -> Option<Event> {
        let center = *self.centers.get(room)?;
        let radius = self.settings.agent_radius;

        if self.goal_active.get(room).copied().unwrap_or(false)
            && let Some(goal) = self.goal(room)
        {
            let gap = Vec2::new(goal.x - self.position.x, goal.z - self.position.z);
            if gap.length() <= radius + self.settings.goal_radius {
                return Some(Event::GoalContact);
            }
        }

        let barricades = self.barricades.get(room).map(Vec::as_slice).unwrap_or(&[]);
        if barricades
            .iter()
            .any(|barricade| barricade.planar_distance(self.position) <= radius + CONTACT_SKIN)
        {
            return Some(Event::BarricadeContact);
        }

        let half = (self.settings.room_size - self.settings.wall_thickness) / 2.0;
        let local = self.position - center;
        if local.z.abs() + radius >= half || local.x.abs() + radius >= half {
            return Some(Event::WallContact);
        }
        None
    }
}

/// Move a disc of `radius` at `position` out of `barricade`'s footprint.
fn push_out(position: Vec3, barricade: &Barricade, radius: f32) -> Vec3 {
    let half = barricade.size * 0.5;
    let local = Vec2::new(position.x - barricade.center.x, position.z - barricade.center.z);
    let closest = local.clamp(-Vec2::new(half.x, half.z), Vec2::new(half.x, half.z));
    let gap = local - closest;

    let resolved = if gap == Vec2::ZERO {
        // Center inside the footprint: leave along the shallowest side.
        let depth = Vec2::new(half.x - local.x.abs(), half.z - local.y.abs());
        if depth.x < depth.y {
            Vec2::new(local.x.signum() * (half.x + radius), local.y)
        } else {
            Vec2::new(local.x, local.y.signum() * (half.z + radius))
        }
    } else if gap.length() < radius {
        closest + gap.normalize() * radius
    } else {
        return position;
    };

    Vec3::new(
        barricade.center.x + resolved.x,
        position.y,
        barricade.center.z + resolved.y,
    )
}

impl MovementAdapter for PointMassSim {
    fn move_to(&mut self, body: Body, position: Vec3, rotation: Quat) {
        match body {
            Body::Agent => {
                self.position = position;
                self.rotation = rotation;
                self.velocity = Vec3::ZERO;
                self.touching = None;
            }
            Body::Goal(room) => {
                if let Some(goal) = self.goals.get_mut(room) {
                    *goal = position;
                }
            }
            Body::Door(room) => {
                if let Some(door) = self.doors.get_mut(room) {
                    *door = position;
                }
            }
        }
    }

    fn set_goal_active(&mut self, room: usize, active: bool) {
        if let Some(flag) = self.goal_active.get_mut(room) {
            *flag = active;
        }
    }
}

impl KinematicsSource for PointMassSim {
    fn forward(&self) -> Vec3 {
        BodyKinematics {
            rotation: self.rotation,
            velocity: self.velocity,
        }
        .forward()
    }

    fn velocity(&self) -> Vec3 {
        self.velocity
    }
}

/// Outcome of one headless step, with the observation the policy sees next.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HeadlessStep {
    pub report: StepReport,
    pub observation: [f32; OBSERVATION_SIZE],
}

/// Driver, simulation and policy for one headless run.
#[derive(Resource, Clone, Debug)]
pub struct HeadlessSession {
    pub driver: EpisodeDriver,
    pub sim: PointMassSim,
    pub policy: GoalSeeker,
    pub history: EpisodeHistory,
}

impl HeadlessSession {
    pub fn new(config: &DungeonConfig, settings: ArenaSettings, epsilon: f32) -> Result<Self> {
        let driver = EpisodeDriver::from_config(config)?;
        let sim = PointMassSim::new(driver.progression().registry(), settings);
        let policy = GoalSeeker::new(epsilon, config.progression.seed.wrapping_add(1));
        Ok(Self {
            driver,
            sim,
            policy,
            history: EpisodeHistory::default(),
        })
    }

    /// Act, integrate, tick the driver, then report whatever the agent touched.
    pub fn step(&mut self) -> Result<HeadlessStep> {
        let report = self.advance()?;
        let observation = self.driver.progression().observe(&self.sim).to_vector();
        Ok(HeadlessStep {
            report,
            observation,
        })
    }

    fn advance(&mut self) -> Result<StepReport> {
        let Self {
            driver,
            sim,
            policy,
            history,
        } = self;
        let mut presentation = NoPresentation;

        let state = driver.progression().state();
        let action = if state.is_transitioning() {
            Vec2::ZERO
        } else {
            policy.act(sim.position(), state.goal_position)
        };
        sim.advance(action, HEADLESS_DT);

        let tick = Tick::with_agent(HEADLESS_DT, sim.position());
        let report = driver.handle(
            Event::StepTick(tick),
            &mut Adapters::new(&mut *sim, &mut presentation),
            &mut *history,
        )?;
        if report.terminal || driver.progression().state().is_transitioning() {
            return Ok(report);
        }

        let room = driver.progression().state().room_index;
        let Some(event) = sim.fresh_contact(room) else {
            return Ok(report);
        };
        let contact = driver.handle(
            event,
            &mut Adapters::new(&mut *sim, &mut presentation),
            &mut *history,
        )?;
        Ok(StepReport {
            reward: report.reward + contact.reward,
            ..contact
        })
    }

    /// Step until the running episode ends.
    pub fn run_episode(&mut self) -> Result<EpisodeSummary> {
        let finished = self.history.0.len();
        loop {
            self.step()?;
            if let Some(summary) = self.history.0.get(finished) {
                return Ok(summary.clone());
            }
        }
    }
}

/// Runs [`HeadlessSession`] steps every update and exits after `episodes`.
pub struct HeadlessPlugin {
    session: HeadlessSession,
    episodes: u32,
}

impl HeadlessPlugin {
    pub fn new(config: &DungeonConfig, epsilon: f32, episodes: u32) -> Result<Self> {
        Ok(Self {
            session: HeadlessSession::new(config, ArenaSettings::default(), epsilon)?,
            episodes: episodes.max(1),
        })
    }
}

#[derive(Resource, Debug, Clone, Copy)]
pub struct EpisodeTarget(pub u32);

impl Plugin for HeadlessPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(self.session.clone());
        app.insert_resource(EpisodeTarget(self.episodes));
        app.add_systems(Update, step_headless);
        info!("🏃 Headless run of {} episodes", self.episodes);
    }
}

fn step_headless(
    mut session: ResMut<HeadlessSession>,
    target: Res<EpisodeTarget>,
    mut exit: MessageWriter<AppExit>,
) {
    if let Err(err) = session.step() {
        error!("❌ Headless step failed: {}", err);
        exit.write(AppExit::error());
        return;
    }

    let history = &session.history;
    if history.0.len() < target.0 as usize {
        return;
    }

    let total: f32 = history.0.iter().map(|summary| summary.reward).sum();
    info!(
        "🏁 {} episodes done: mean reward {:.3}, {} dungeon clears",
        history.0.len(),
        total / history.0.len() as f32,
        history.dungeon_clears()
    );
    exit.write(AppExit::Success);
}

/// Minimal app that runs the headless session as fast as it can.
pub fn create_headless_app(config: &DungeonConfig, epsilon: f32, episodes: u32) -> Result<App> {
    let plugin = HeadlessPlugin::new(config, epsilon, episodes)?;

    let mut app = App::new();
    app.add_plugins(MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::ZERO)));
    app.add_plugins(plugin);
    Ok(app)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dungeon::{BarricadeSpec, RoomLayout};

    fn sim() -> PointMassSim {
        let registry = RoomRegistry::from_layout(&RoomLayout::default()).unwrap();
        PointMassSim::new(&registry, ArenaSettings::default())
    }

    /// Default corridor with a block in the middle of room 0, across the
    /// straight line from spawn to goal.
    fn blocked_layout() -> RoomLayout {
        RoomLayout::default().with_barricade(
            0,
            BarricadeSpec {
                center: [0.0, 0.5, 0.0],
                size: [1.0, 1.0, 2.0],
            },
        )
    }

    #[test]
    fn walking_into_a_side_wall_is_a_wall_contact() {
        let mut sim = sim();
        assert_eq!(sim.contact(0), None);

        for _ in 0..200 {
            sim.advance(Vec2::new(0.0, 1.0), HEADLESS_DT);
        }
        assert_eq!(sim.contact(0), Some(Event::WallContact));
    }

    #[test]
    fn reaching_the_goal_beats_the_wall_check() {
        let mut sim = sim();
        let goal = sim.goal(0).unwrap();
        sim.move_to(Body::Agent, goal, Quat::IDENTITY);
        assert_eq!(sim.contact(0), Some(Event::GoalContact));

        sim.set_goal_active(0, false);
        assert_eq!(sim.contact(0), None);
    }

    #[test]
    fn moves_update_goals_and_doors() {
        let mut sim = sim();
        sim.move_to(Body::Door(1), Vec3::new(1.0, 2.0, 3.0), Quat::IDENTITY);
        sim.move_to(Body::Goal(7), Vec3::ONE, Quat::IDENTITY);
        assert_eq!(sim.door(1), Some(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(sim.goal(7), None);
    }

    #[test]
    fn forward_follows_the_last_move() {
        let mut sim = sim();
        sim.advance(Vec2::new(1.0, 0.0), HEADLESS_DT);
        assert!(sim.forward().distance(Vec3::X) < 1e-5);
        assert!((sim.velocity().x - 3.0).abs() < 1e-5);
    }

    #[test]
    fn barricades_stop_the_agent_and_are_reported_once() {
        let registry = RoomRegistry::from_layout(&blocked_layout()).unwrap();
        let mut sim = PointMassSim::new(&registry, ArenaSettings::default());

        let mut touches = 0;
        for _ in 0..200 {
            sim.advance(Vec2::new(1.0, 0.0), HEADLESS_DT);
            if sim.fresh_contact(0) == Some(Event::BarricadeContact) {
                touches += 1;
            }
        }

        assert_eq!(touches, 1);
        assert_eq!(sim.contact(0), Some(Event::BarricadeContact));
        // west face at -0.5, agent radius 0.5
        assert!((sim.position().x + 1.0).abs() < 1e-4, "{:?}", sim.position());
    }

    #[test]
    fn barricade_penalty_does_not_respawn_the_agent() {
        let mut config = DungeonConfig {
            layout: blocked_layout(),
            ..DungeonConfig::default()
        };
        config.progression.max_steps = 1_000;
        let mut session = HeadlessSession::new(&config, ArenaSettings::default(), 0.0).unwrap();

        let step_penalty = -1.0 / 1_000.0;
        let mut hits = 0;
        for _ in 0..200 {
            let step = session.step().unwrap();
            if (step.report.reward - (step_penalty - 0.2)).abs() < 1e-5 {
                hits += 1;
            }
        }

        assert_eq!(hits, 1);
        assert_eq!(session.driver.episode(), 1);
        assert!(session.sim.position().x > -3.0, "agent stayed at the block");
    }

    #[test]
    fn steps_carry_the_observation_vector() {
        let mut session =
            HeadlessSession::new(&DungeonConfig::default(), ArenaSettings::default(), 0.0)
                .unwrap();

        let step = session.step().unwrap();
        let [room, fx, fy, fz, vx, vz, wins_left] = step.observation;

        assert_eq!(room, 0.0);
        // the greedy policy walks east, straight at the goal
        assert!((fx - 1.0).abs() < 1e-4 && fy.abs() < 1e-4 && fz.abs() < 1e-4);
        assert!((vx - 3.0).abs() < 1e-4 && vz.abs() < 1e-4);
        assert_eq!(wins_left, 2.0);
    }
}
