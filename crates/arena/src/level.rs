use avian3d::prelude::{Collider, Position, RigidBody, Rotation, Sensor};
use bevy::prelude::{
    Assets, Color, Commands, Component, Cuboid, DirectionalLight, Mesh, Mesh3d, MeshMaterial3d,
    Name, Quat, Reflect, ReflectComponent, Res, ResMut, Sphere, StandardMaterial, Transform, Vec3,
    Visibility, default, info,
};
use serde::{Deserialize, Serialize};

use crate::door::{DoorMarker, DoorState};
use crate::{ArenaSettings, DungeonRun};

pub const FLOOR_THICKNESS: f32 = 1.0;

#[derive(Component, Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FloorMarker;

/// Touching this costs the wall penalty.
#[derive(Component, Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct WallMarker;

/// Soft obstacle: small penalty, no respawn.
#[derive(Component, Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct BarricadeMarker;

#[derive(Component, Reflect, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[reflect(Component)]
pub struct GoalMarker {
    pub room: usize,
}

/// Mesh and material handles, absent in headless apps.
struct Paint<'a> {
    meshes: Option<ResMut<'a, Assets<Mesh>>>,
    materials: Option<ResMut<'a, Assets<StandardMaterial>>>,
}

impl Paint<'_> {
    fn cuboid(
        &mut self,
        size: Vec3,
        color: Color,
    ) -> Option<(Mesh3d, MeshMaterial3d<StandardMaterial>)> {
        let meshes = self.meshes.as_mut()?;
        let materials = self.materials.as_mut()?;
        Some((
            Mesh3d(meshes.add(Cuboid::new(size.x, size.y, size.z))),
            MeshMaterial3d(materials.add(StandardMaterial {
                base_color: color,
                ..default()
            })),
        ))
    }

    fn sphere(
        &mut self,
        radius: f32,
        color: Color,
    ) -> Option<(Mesh3d, MeshMaterial3d<StandardMaterial>)> {
        let meshes = self.meshes.as_mut()?;
        let materials = self.materials.as_mut()?;
        Some((
            Mesh3d(meshes.add(Sphere::new(radius))),
            MeshMaterial3d(materials.add(StandardMaterial {
                base_color: color,
                emissive: color.to_linear() * 2.0,
                ..default()
            })),
        ))
    }
}

/// Build floor, side walls, door panel, barricades and goal sensor for every
/// room.
///
/// Rooms are squares of `room_size` centered between their spawn and goal.
/// The door panel closes the east side of each room; only room 0 gets a west
/// wall, every other room is closed off by the previous room's door.
pub fn spawn_dungeon_level(
    mut commands: Commands,
    meshes: Option<ResMut<Assets<Mesh>>>, // Option for tests as there is no render
    materials: Option<ResMut<Assets<StandardMaterial>>>,
    run: Res<DungeonRun>,
    settings: Res<ArenaSettings>,
) {
    let mut paint = Paint { meshes, materials };
    let size = settings.room_size;
    let height = settings.wall_height;
    let thickness = settings.wall_thickness;
    let registry = run.driver.progression().registry();

    for room in registry.iter() {
        let center = (room.spawn.position + room.goal) * 0.5;
        let i = room.index;

        let floor_size = Vec3::new(size, FLOOR_THICKNESS, size);
        let mut floor = commands.spawn((
            Name::new(format!("Room_{}_Floor", i)),
            FloorMarker,
            Position::from(Vec3::new(center.x, -FLOOR_THICKNESS / 2.0, center.z)),
            Rotation::default(),
            RigidBody::Static,
            Collider::cuboid(floor_size.x, floor_size.y, floor_size.z),
        ));
        if let Some(look) = paint.cuboid(floor_size, Color::srgb(0.35, 0.35, 0.4)) {
            floor.insert(look);
        }

        let mut walls = vec![
            (
                Vec3::new(center.x, height / 2.0, center.z + size / 2.0),
                Vec3::new(size, height, thickness),
                "North",
            ),
            (
                Vec3::new(center.x, height / 2.0, center.z - size / 2.0),
                Vec3::new(size, height, thickness),
                "South",
            ),
        ];
        if i == 0 {
            walls.push((
                Vec3::new(center.x - size / 2.0, height / 2.0, center.z),
                Vec3::new(thickness, height, size),
                "West",
            ));
        }

        for (position, wall_size, side) in walls {
            let mut wall = commands.spawn((
                Name::new(format!("Room_{}_Wall_{}", i, side)),
                WallMarker,
                Position::from(position),
                Rotation::default(),
                RigidBody::Static,
                Collider::cuboid(wall_size.x, wall_size.y, wall_size.z),
            ));
            if let Some(look) = paint.cuboid(wall_size, Color::srgb(0.55, 0.5, 0.45)) {
                wall.insert(look);
            }
        }

        let door_size = Vec3::new(thickness, height, size);
        let mut door = commands.spawn((
            Name::new(format!("Room_{}_Door", i)),
            DoorMarker { room: i },
            DoorState::Closed,
            Position::from(room.door.closed),
            Rotation::default(),
            RigidBody::Static,
            Collider::cuboid(door_size.x, door_size.y, door_size.z),
        ));
        if let Some(look) = paint.cuboid(door_size, Color::srgb(0.6, 0.3, 0.15)) {
            door.insert(look);
        }

        for (b, barricade) in room.barricades.iter().enumerate() {
            let mut block = commands.spawn((
                Name::new(format!("Room_{}_Barricade_{}", i, b)),
                BarricadeMarker,
                Position::from(barricade.center),
                Rotation::default(),
                RigidBody::Static,
                Collider::cuboid(barricade.size.x, barricade.size.y, barricade.size.z),
            ));
            if let Some(look) = paint.cuboid(barricade.size, Color::srgb(0.8, 0.6, 0.1)) {
                block.insert(look);
            }
        }

        let mut goal = commands.spawn((
            Name::new(format!("Room_{}_Goal", i)),
            GoalMarker { room: i },
            Position::from(room.goal),
            Rotation::default(),
            Visibility::default(),
            RigidBody::Static,
            Collider::sphere(settings.goal_radius),
            Sensor,
        ));
        if let Some(look) = paint.sphere(settings.goal_radius, Color::srgb(0.2, 0.9, 0.3)) {
            goal.insert(look);
        }
    }

    info!("🏗️ Dungeon level built with {} rooms", registry.len());
}

pub fn spawn_lights(mut commands: Commands) {
    commands.spawn((
        Name::new("Sun"),
        DirectionalLight {
            illuminance: 8_000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_rotation(Quat::from_euler(
            bevy::math::EulerRot::XYZ,
            -0.9,
            0.4,
            0.0,
        )),
    ));
}
