use bevy::prelude::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::{DungeonError, Result};

/// Position and orientation of something placed in a room.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Pose {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
        }
    }

    /// Interpolate towards `other`, `t` clamped to `[0, 1]`.
    pub fn lerp(&self, other: &Pose, t: f32) -> Pose {
        let t = t.clamp(0.0, 1.0);
        Pose {
            position: self.position.lerp(other.position, t),
            rotation: self.rotation.slerp(other.rotation, t),
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::from_position(Vec3::ZERO)
    }
}

/// Resting position of a door and how far it slides when opened.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DoorAnchor {
    pub closed: Vec3,
    pub open_offset: Vec3,
}

impl DoorAnchor {
    pub fn open(&self) -> Vec3 {
        self.closed + self.open_offset
    }
}

/// Axis-aligned soft obstacle. Touching it costs the barricade penalty but
/// does not respawn the agent.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Barricade {
    pub center: Vec3,
    pub size: Vec3,
}

impl Barricade {
    /// Distance on the XZ plane from `point` to the barricade's footprint,
    /// zero when inside.
    pub fn planar_distance(&self, point: Vec3) -> f32 {
        let half = self.size * 0.5;
        let dx = ((point.x - self.center.x).abs() - half.x).max(0.0);
        let dz = ((point.z - self.center.z).abs() - half.z).max(0.0);
        (dx * dx + dz * dz).sqrt()
    }
}

/// One traversal stage of the dungeon.
#[derive(Clone, Debug, PartialEq)]
pub struct Room {
    pub index: usize,
    pub spawn: Pose,
    pub goal: Vec3,
    pub door: DoorAnchor,
    pub required_wins: u32,
    pub barricades: Vec<Barricade>,
}

/// Serialized spawn anchor. Positions are `[x, y, z]`, yaw in degrees around +Y.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnchorSpec {
    pub position: [f32; 3],
    #[serde(default)]
    pub yaw_degrees: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DoorSpec {
    pub closed: [f32; 3],
    pub open_offset: [f32; 3],
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BarricadeSpec {
    pub center: [f32; 3],
    pub size: [f32; 3],
}

/// Host-supplied position data, one entry per room in each array.
/// `barricades` may be left out entirely; when present it needs one list per
/// room.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoomLayout {
    pub spawns: Vec<AnchorSpec>,
    pub goals: Vec<[f32; 3]>,
    pub doors: Vec<DoorSpec>,
    pub required_wins: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub barricades: Vec<Vec<BarricadeSpec>>,
}

impl RoomLayout {
    /// Straight corridor of square rooms along +X. Each room's door sits in the
    /// wall it shares with the next room and slides up to open.
    pub fn corridor(rooms: usize, spacing: f32, required_wins: u32) -> Self {
        let mut spawns = Vec::with_capacity(rooms);
        let mut goals = Vec::with_capacity(rooms);
        let mut doors = Vec::with_capacity(rooms);

        for i in 0..rooms {
            let center_x = i as f32 * spacing;
            spawns.push(AnchorSpec {
                position: [center_x - spacing * 0.3, 0.5, 0.0],
                yaw_degrees: -90.0,
            });
            goals.push([center_x + spacing * 0.3, 0.5, 0.0]);
            doors.push(DoorSpec {
                closed: [center_x + spacing * 0.5, spacing * 0.25, 0.0],
                open_offset: [0.0, spacing * 0.5, 0.0],
            });
        }

        Self {
            spawns,
            goals,
            doors,
            required_wins,
            barricades: Vec::new(),
        }
    }

    /// Put a barricade in `room`, filling in empty lists for the other rooms.
    pub fn with_barricade(mut self, room: usize, spec: BarricadeSpec) -> Self {
        if self.barricades.len() < self.spawns.len() {
            self.barricades.resize(self.spawns.len(), Vec::new());
        }
        if let Some(list) = self.barricades.get_mut(room) {
            list.push(spec);
        }
        self
    }
}

impl Default for RoomLayout {
    fn default() -> Self {
        Self::corridor(3, 12.0, 2)
    }
}

/// Immutable per-dungeon room data, validated once at load.
#[derive(Clone, Debug)]
pub struct RoomRegistry {
    rooms: Vec<Room>,
}

impl RoomRegistry {
    pub fn from_layout(layout: &RoomLayout) -> Result<Self> {
        let count = layout.spawns.len();
        if count == 0 {
            return Err(DungeonError::Configuration(
                "layout must contain at least one room".to_string(),
            ));
        }
        if layout.goals.len() != count || layout.doors.len() != count {
            return Err(DungeonError::Configuration(format!(
                "room arrays differ in length: {} spawns, {} goals, {} doors",
                count,
                layout.goals.len(),
                layout.doors.len()
            )));
        }
        if !layout.barricades.is_empty() && layout.barricades.len() != count {
            return Err(DungeonError::Configuration(format!(
                "barricades list {} rooms, layout has {}",
                layout.barricades.len(),
                count
            )));
        }
        if layout.required_wins == 0 {
            return Err(DungeonError::Configuration(
                "required_wins must be at least 1".to_string(),
            ));
        }

        let rooms = layout
            .spawns
            .iter()
            .zip(&layout.goals)
            .zip(&layout.doors)
            .enumerate()
            .map(|(index, ((spawn, goal), door))| Room {
                index,
                spawn: Pose::new(
                    Vec3::from_array(spawn.position),
                    Quat::from_rotation_y(spawn.yaw_degrees.to_radians()),
                ),
                goal: Vec3::from_array(*goal),
                door: DoorAnchor {
                    closed: Vec3::from_array(door.closed),
                    open_offset: Vec3::from_array(door.open_offset),
                },
                required_wins: layout.required_wins,
                barricades: layout
                    .barricades
                    .get(index)
                    .map(|specs| {
                        specs
                            .iter()
                            .map(|spec| Barricade {
                                center: Vec3::from_array(spec.center),
                                size: Vec3::from_array(spec.size),
                            })
                            .collect()
                    })
                    .unwrap_or_default(),
            })
            .collect();

        Ok(Self { rooms })
    }

    pub fn get(&self, index: usize) -> Result<&Room> {
        self.rooms.get(index).ok_or(DungeonError::IndexOutOfRange {
            index,
            len: self.rooms.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn is_last(&self, index: usize) -> bool {
        index + 1 >= self.rooms.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Room> {
        self.rooms.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corridor_layout_loads_every_room() {
        let registry = RoomRegistry::from_layout(&RoomLayout::corridor(4, 10.0, 3)).unwrap();

        assert_eq!(registry.len(), 4);
        for (i, room) in registry.iter().enumerate() {
            assert_eq!(room.index, i);
            assert_eq!(room.required_wins, 3);
            assert!(room.goal.x > room.spawn.position.x, "goal sits east of spawn");
        }
        assert!(registry.is_last(3));
        assert!(!registry.is_last(2));
    }

    #[test]
    fn get_past_the_end_is_an_error() {
        let registry = RoomRegistry::from_layout(&RoomLayout::corridor(2, 10.0, 1)).unwrap();

        match registry.get(2) {
            Err(DungeonError::IndexOutOfRange { index, len }) => {
                assert_eq!(index, 2);
                assert_eq!(len, 2);
            }
            other => panic!("expected IndexOutOfRange, got {:?}", other),
        }
    }

    #[test]
    fn mismatched_arrays_are_rejected() {
        let mut layout = RoomLayout::corridor(3, 10.0, 2);
        layout.doors.pop();

        let err = RoomRegistry::from_layout(&layout).unwrap_err();
        assert!(
            matches!(err, DungeonError::Configuration(_)),
            "missing door must not fall back to a zero vector"
        );

        let mut layout = RoomLayout::corridor(3, 10.0, 2);
        layout.goals.push([0.0, 0.0, 0.0]);
        assert!(RoomRegistry::from_layout(&layout).is_err());
    }

    #[test]
    fn empty_layout_and_zero_wins_are_rejected() {
        let empty = RoomLayout::corridor(0, 10.0, 2);
        assert!(RoomRegistry::from_layout(&empty).is_err());

        let zero_wins = RoomLayout::corridor(2, 10.0, 0);
        assert!(RoomRegistry::from_layout(&zero_wins).is_err());
    }

    #[test]
    fn barricades_are_optional_but_must_cover_every_room() {
        let spec = BarricadeSpec {
            center: [1.0, 0.5, 0.0],
            size: [1.0, 1.0, 2.0],
        };
        let layout = RoomLayout::corridor(3, 12.0, 2).with_barricade(1, spec);
        let registry = RoomRegistry::from_layout(&layout).unwrap();

        assert!(registry.get(0).unwrap().barricades.is_empty());
        assert_eq!(registry.get(1).unwrap().barricades.len(), 1);

        let mut short = layout.clone();
        short.barricades.pop();
        assert!(RoomRegistry::from_layout(&short).is_err());

        let json = r#"{
            "spawns": [{ "position": [0.0, 0.5, 0.0] }],
            "goals": [[4.0, 0.5, 0.0]],
            "doors": [{ "closed": [6.0, 3.0, 0.0], "open_offset": [0.0, 6.0, 0.0] }],
            "required_wins": 1
        }"#;
        let parsed: RoomLayout = serde_json::from_str(json).unwrap();
        assert!(parsed.barricades.is_empty());
        assert!(RoomRegistry::from_layout(&parsed).is_ok());
    }

    #[test]
    fn barricade_distance_is_measured_on_the_floor_plane() {
        let barricade = Barricade {
            center: Vec3::new(0.0, 0.5, 0.0),
            size: Vec3::new(2.0, 1.0, 2.0),
        };
        assert_eq!(barricade.planar_distance(Vec3::new(0.5, 3.0, 0.5)), 0.0);
        assert!((barricade.planar_distance(Vec3::new(4.0, 0.0, 0.0)) - 3.0).abs() < 1e-6);
        assert!((barricade.planar_distance(Vec3::new(4.0, 0.0, 5.0)) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn door_open_position_applies_offset() {
        let door = DoorAnchor {
            closed: Vec3::new(5.0, 1.0, 0.0),
            open_offset: Vec3::new(0.0, 4.0, 0.0),
        };
        assert_eq!(door.open(), Vec3::new(5.0, 5.0, 0.0));
    }

    #[test]
    fn pose_lerp_clamps_t() {
        let a = Pose::from_position(Vec3::ZERO);
        let b = Pose::new(Vec3::new(10.0, 0.0, 0.0), Quat::from_rotation_y(1.0));

        assert_eq!(a.lerp(&b, 0.5).position, Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(a.lerp(&b, 2.0).position, b.position);
        assert!(a.lerp(&b, 1.0).rotation.dot(b.rotation).abs() > 0.999);
    }
}
