use bevy::prelude::{
    Camera, Camera3d, Commands, Component, Name, Query, Res, ResMut, Time, Transform, Vec3, default,
};
use dungeon::{Pose, RoomRegistry};

use crate::DungeonRun;
use crate::host::ArenaPresenter;

/// Where the camera sits relative to the room center.
pub const VIEW_OFFSET: Vec3 = Vec3::new(0.0, 14.0, 10.0);

pub const DEFAULT_TRANSITION_SPEED: f32 = 2.0;

/// One fixed view per room. Moving to a room eases the camera over from
/// wherever it is; episode resets snap it.
#[derive(Component, Clone, Debug)]
pub struct RoomCameraRig {
    views: Vec<Pose>,
    pose: Pose,
    target: Option<usize>,
    pub transition_speed: f32,
}

impl RoomCameraRig {
    pub fn new(views: Vec<Pose>) -> Self {
        let pose = views.first().copied().unwrap_or_default();
        Self {
            views,
            pose,
            target: None,
            transition_speed: DEFAULT_TRANSITION_SPEED,
        }
    }

    /// A view looking down on every room of the registry.
    pub fn from_registry(registry: &RoomRegistry) -> Self {
        let views = registry
            .iter()
            .map(|room| {
                let center = (room.spawn.position + room.goal) * 0.5;
                let eye = center + VIEW_OFFSET;
                let rotation = Transform::from_translation(eye)
                    .looking_at(center, Vec3::Y)
                    .rotation;
                Pose::new(eye, rotation)
            })
            .collect();
        Self::new(views)
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn target_room(&self) -> Option<usize> {
        self.target
    }

    /// Start easing towards `room`'s view. Unknown rooms are ignored.
    pub fn move_to_room(&mut self, room: usize) -> bool {
        if room >= self.views.len() {
            bevy::log::warn!("⚠️ Camera has no view for room {}", room);
            return false;
        }
        self.target = Some(room);
        true
    }

    pub fn snap_to_room(&mut self, room: usize) -> bool {
        let Some(view) = self.views.get(room) else {
            bevy::log::warn!("⚠️ Camera has no view for room {}", room);
            return false;
        };
        self.pose = *view;
        self.target = Some(room);
        true
    }

    /// Step the easing by `dt` and return the new pose.
    pub fn update(&mut self, dt: f32) -> Pose {
        if let Some(view) = self.target.and_then(|room| self.views.get(room)) {
            let t = (self.transition_speed * dt.max(0.0)).min(1.0);
            self.pose = self.pose.lerp(view, t);
        }
        self.pose
    }
}

pub fn spawn_room_camera(mut commands: Commands, run: Res<DungeonRun>) {
    let mut rig = RoomCameraRig::from_registry(run.driver.progression().registry());
    rig.snap_to_room(run.room_index());
    let pose = rig.pose();

    commands.spawn((
        Name::new("Dungeon_Camera"),
        Camera {
            order: 0,
            ..default()
        },
        Camera3d::default(),
        Transform::from_translation(pose.position).with_rotation(pose.rotation),
        rig,
    ));

    bevy::log::info!("🎥 Dungeon camera looking at room {}", run.room_index());
}

pub fn follow_room_changes(
    mut presenter: ResMut<ArenaPresenter>,
    mut rigs: Query<&mut RoomCameraRig>,
) {
    if presenter.entered.is_none() {
        return;
    }
    let Some((room, snap)) = presenter.entered.take() else {
        return;
    };

    for mut rig in rigs.iter_mut() {
        if snap {
            rig.snap_to_room(room);
        } else {
            rig.move_to_room(room);
        }
    }
}

pub fn update_room_camera(
    time: Res<Time>,
    mut cameras: Query<(&mut RoomCameraRig, &mut Transform)>,
) {
    for (mut rig, mut transform) in cameras.iter_mut() {
        let pose = rig.update(time.delta_secs());
        transform.translation = pose.position;
        transform.rotation = pose.rotation;
    }
}
