use avian3d::prelude::{
    Collider, CollidingEntities, LinearVelocity, LockedAxes, Position, RigidBody, Rotation,
};
use bevy::prelude::{
    Assets, Color, Commands, Component, Entity, Mesh, Mesh3d, MeshMaterial3d, Name, Quat, Query,
    Reflect, ReflectComponent, Res, ResMut, Resource, Sphere, StandardMaterial, Vec2, Vec3, With,
    default, info,
};
use dungeon::{KinematicsSource, Observation};

use crate::{ArenaSettings, DungeonRun};

#[derive(Component, Clone, Debug, Default)]
pub struct Agent;

/// Continuous move action in `[-1, 1]` on X and Z, written by whatever policy
/// drives the agent.
#[derive(Component, Reflect, Clone, Copy, Debug, Default, PartialEq)]
#[reflect(Component)]
pub struct AgentAction(pub Vec2);

/// Contacts seen on the previous step, so a touch is reported once.
#[derive(Component, Clone, Debug, Default)]
pub struct ContactMemory(pub Vec<Entity>);

/// Observation of the agent after the latest physics step.
#[derive(Resource, Clone, Copy, Debug, Default)]
pub struct LatestObservation(pub Observation);

/// Forward and velocity of the agent body.
pub struct BodyKinematics {
    pub rotation: Quat,
    pub velocity: Vec3,
}

impl KinematicsSource for BodyKinematics {
    fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    fn velocity(&self) -> Vec3 {
        self.velocity
    }
}

/// Yaw that turns `Vec3::NEG_Z` towards `direction` on the XZ plane.
pub fn facing(direction: Vec2) -> Option<Quat> {
    if direction.length_squared() <= f32::EPSILON {
        return None;
    }
    Some(Quat::from_rotation_y(f32::atan2(-direction.x, -direction.y)))
}

pub fn spawn_agent(
    mut commands: Commands,
    meshes: Option<ResMut<Assets<Mesh>>>,
    materials: Option<ResMut<Assets<StandardMaterial>>>,
    run: Res<DungeonRun>,
    settings: Res<ArenaSettings>,
) {
    let spawn = match run.driver.progression().registry().get(run.room_index()) {
        Ok(room) => room.spawn,
        Err(err) => {
            bevy::log::error!("❌ No spawn for the agent: {}", err);
            return;
        }
    };

    let mut agent = commands.spawn((
        Name::new("Agent"),
        Agent,
        AgentAction::default(),
        ContactMemory::default(),
        CollidingEntities::default(),
        Position::from(spawn.position),
        Rotation::from(spawn.rotation),
        LinearVelocity::default(),
        RigidBody::Dynamic,
        Collider::sphere(settings.agent_radius),
        LockedAxes::ROTATION_LOCKED,
    ));

    if let (Some(mut meshes), Some(mut materials)) = (meshes, materials) {
        agent.insert((
            Mesh3d(meshes.add(Sphere::new(settings.agent_radius))),
            MeshMaterial3d(materials.add(StandardMaterial {
                base_color: Color::srgb(0.2, 0.4, 0.9),
                ..default()
            })),
        ));
    }

    info!("🤖 Agent spawned at {:?}", spawn.position);
}

/// Turn the policy's action into planar velocity. The agent stands still while
/// a room transition carries it.
pub fn apply_agent_action(
    run: Res<DungeonRun>,
    settings: Res<ArenaSettings>,
    mut agents: Query<(&AgentAction, &mut LinearVelocity, &mut Rotation), With<Agent>>,
) {
    let frozen = run.is_transitioning();

    for (action, mut velocity, mut rotation) in agents.iter_mut() {
        if frozen {
            velocity.0 = Vec3::ZERO;
            continue;
        }

        let input = action.0.clamp_length_max(1.0);
        velocity.0.x = input.x * settings.agent_speed;
        velocity.0.z = input.y * settings.agent_speed;

        if let Some(yaw) = facing(input) {
            rotation.0 = yaw;
        }
    }
}

pub fn record_observation(
    run: Res<DungeonRun>,
    agents: Query<(&Rotation, &LinearVelocity), With<Agent>>,
    mut latest: ResMut<LatestObservation>,
) {
    let Ok((rotation, velocity)) = agents.single() else {
        return;
    };

    latest.0 = run.driver.progression().observe(&BodyKinematics {
        rotation: rotation.0,
        velocity: velocity.0,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facing_points_forward_along_the_move() {
        for direction in [
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, -1.0),
            Vec2::new(-0.6, 0.8),
        ] {
            let yaw = facing(direction).unwrap();
            let forward = yaw * Vec3::NEG_Z;
            let expected = Vec3::new(direction.x, 0.0, direction.y).normalize();
            assert!(
                forward.distance(expected) < 1e-5,
                "direction {:?} gave forward {:?}",
                direction,
                forward
            );
        }
        assert_eq!(facing(Vec2::ZERO), None);
    }

    #[test]
    fn body_kinematics_reports_forward_from_rotation() {
        let kinematics = BodyKinematics {
            rotation: Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
            velocity: Vec3::new(1.0, 0.0, 2.0),
        };
        assert!(kinematics.forward().distance(Vec3::NEG_X) < 1e-5);
        assert_eq!(kinematics.velocity(), Vec3::new(1.0, 0.0, 2.0));
    }

    #[test]
    fn recorded_observation_follows_the_agent_body() {
        use bevy::prelude::{App, MinimalPlugins, Update};
        use dungeon::{DungeonConfig, OBSERVATION_SIZE};

        let mut app = App::new();
        app.add_plugins(MinimalPlugins);
        app.insert_resource(DungeonRun::from_config(&DungeonConfig::default()).unwrap());
        app.init_resource::<LatestObservation>();
        app.add_systems(Update, record_observation);
        app.world_mut().spawn((
            Agent,
            Rotation::from(facing(Vec2::new(0.0, 1.0)).unwrap()),
            LinearVelocity(Vec3::new(0.0, -9.0, 3.0)),
        ));

        app.update();

        let vector = app.world().resource::<LatestObservation>().0.to_vector();
        assert_eq!(vector.len(), OBSERVATION_SIZE);
        assert_eq!(vector[0], 0.0);
        assert!((vector[3] - 1.0).abs() < 1e-5, "forward should be +Z: {:?}", vector);
        // vertical speed is not part of the observation
        assert_eq!(&vector[4..6], &[0.0, 3.0]);
        assert_eq!(vector[6], 2.0);
    }
}
