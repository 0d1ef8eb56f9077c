//! The POV state machine.
//!
//! Two states: disabled (initial) and enabled. Enable picks an avatar,
//! suppresses its head per the VR/context rules, acquires the camera and
//! seeds the look-rotation cache; disable is the exact mirror and is safe to
//! call at any point, including after a partially failed enable. The
//! per-frame override replaces the host's head-aim output for the current
//! avatar only, every frame while enabled.

use std::collections::HashMap;

use bevy::prelude::*;
use bevy::window::{CursorOptions, PrimaryWindow};

use crate::camera_rig::{self, CameraBackup, PovCamera, PovCameraQuery};
use crate::capability::VrCapability;
use crate::config::PovConfig;
use crate::input::{self, DragState};
use crate::save::PovSaveData;
use crate::scene::{
  AnimationSetChanged, Avatar, AvatarId, AvatarRig, HostMode, InteractionMode, PovSubject,
  SelectionSet,
};
use crate::select::{self, AvatarInfo, AvatarQueue, FilterCtx};

/// Requests handled in the decide phase, strictly before the per-frame
/// camera override runs.
#[derive(Message, Debug, Clone)]
pub enum PovRequest {
  Toggle,
  Enable,
  Disable,
  /// Re-enter POV from host save data instead of running the selector.
  Restore(PovSaveData),
}

/// Transient state of an active session. Exists iff POV is enabled with a
/// current avatar; fully consumed on disable.
#[derive(Debug, Clone)]
pub struct PovSession {
  pub avatar: Entity,
  pub prev_head_visible: bool,
  /// Head was hidden through the companion VR integration and must be
  /// restored the same way.
  pub head_hidden_via_vr: bool,
  pub camera: Option<CameraBackup>,
}

/// The POV state machine.
#[derive(Resource, Default)]
pub struct Pov {
  pub enabled: bool,
  pub current: Option<Entity>,
  pub session: Option<PovSession>,
  /// Current field of view in degrees. Persists across sessions; `None`
  /// while the VR runtime owns it.
  pub current_fov: Option<f32>,
}

/// Per-avatar look rotation (pitch/yaw/roll, degrees). Entries survive
/// disable/enable cycles and are dropped in bulk on an animation-set change.
#[derive(Resource, Default)]
pub struct LookRotationCache {
  entries: HashMap<Entity, Vec3>,
}

impl LookRotationCache {
  pub fn get(&self, avatar: Entity) -> Option<Vec3> {
    self.entries.get(&avatar).copied()
  }

  pub fn get_mut(&mut self, avatar: Entity) -> Option<&mut Vec3> {
    self.entries.get_mut(&avatar)
  }

  pub fn insert(&mut self, avatar: Entity, look: Vec3) {
    self.entries.insert(avatar, look);
  }

  pub fn contains(&self, avatar: Entity) -> bool {
    self.entries.contains_key(&avatar)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn clear(&mut self) {
    self.entries.clear();
  }
}

/// Head-bone orientation to cached look rotation (degrees).
pub(crate) fn rotation_to_look(rotation: Quat) -> Vec3 {
  let (yaw, pitch, roll) = rotation.to_euler(EulerRot::YXZ);
  Vec3::new(pitch.to_degrees(), yaw.to_degrees(), roll.to_degrees())
}

/// Cached look rotation (degrees) back to a bone orientation.
pub(crate) fn look_to_rotation(look: Vec3) -> Quat {
  Quat::from_euler(
    EulerRot::YXZ,
    look.y.to_radians(),
    look.x.to_radians(),
    look.z.to_radians(),
  )
}

/// Decide-phase hotkey check.
pub fn toggle_hotkey(
  keys: Res<ButtonInput<KeyCode>>,
  config: Res<PovConfig>,
  mut requests: MessageWriter<PovRequest>,
) {
  if keys.just_pressed(config.toggle_key) {
    requests.write(PovRequest::Toggle);
  }
}

/// Drops every cached look rotation when the host changes the animation set.
pub fn invalidate_look_cache(
  mut messages: MessageReader<AnimationSetChanged>,
  mut cache: ResMut<LookRotationCache>,
) {
  if !messages.is_empty() {
    messages.clear();
    if !cache.is_empty() {
      debug!("Animation set changed; dropping {} cached look rotations", cache.len());
      cache.clear();
    }
  }
}

/// Decide-phase request applier. Runs before the input bridge and strictly
/// before the per-frame override, so a toggle-off never leaves a stale
/// override running in the same frame.
#[allow(clippy::too_many_arguments)]
pub fn apply_pov_requests(
  mut requests: MessageReader<PovRequest>,
  mut pov: ResMut<Pov>,
  mut cache: ResMut<LookRotationCache>,
  mut queue: ResMut<AvatarQueue>,
  mut drag: ResMut<DragState>,
  selection: Res<SelectionSet>,
  host_mode: Res<HostMode>,
  interaction: Res<InteractionMode>,
  config: Res<PovConfig>,
  vr: Res<VrCapability>,
  mut avatars: Query<(Entity, &mut Avatar)>,
  rigs: Query<&AvatarRig>,
  (ids, globals): (Query<(Entity, &AvatarId)>, Query<&GlobalTransform>),
  mut cameras: Query<PovCameraQuery, With<PovCamera>>,
  mut cursors: Query<&mut CursorOptions, With<PrimaryWindow>>,
  mut commands: Commands,
) {
  for request in requests.read() {
    match request {
      PovRequest::Toggle => {
        if pov.enabled {
          disable(&mut pov, &vr, &mut avatars, &mut cameras, &mut drag, &mut cursors, &mut commands);
        } else {
          enable(
            None, None, &mut pov, &mut cache, &mut queue, &selection, *host_mode, *interaction,
            &config, &vr, &mut avatars, &rigs, &globals, &mut cameras, &mut commands,
          );
        }
      }
      PovRequest::Enable => {
        if !pov.enabled {
          enable(
            None, None, &mut pov, &mut cache, &mut queue, &selection, *host_mode, *interaction,
            &config, &vr, &mut avatars, &rigs, &globals, &mut cameras, &mut commands,
          );
        }
      }
      PovRequest::Disable => {
        disable(&mut pov, &vr, &mut avatars, &mut cameras, &mut drag, &mut cursors, &mut commands);
      }
      PovRequest::Restore(data) => {
        if pov.enabled {
          disable(&mut pov, &vr, &mut avatars, &mut cameras, &mut drag, &mut cursors, &mut commands);
        }
        let Some(avatar) = ids
          .iter()
          .find(|(_, id)| **id == data.avatar)
          .map(|(entity, _)| entity)
        else {
          warn!("Cannot restore POV: no avatar with id {}", data.avatar.0);
          continue;
        };
        cache.insert(avatar, Vec3::from_array(data.look_rotation));
        pov.current_fov = Some(data.fov);
        enable(
          Some(avatar),
          Some(data.head_visible_before_pov),
          &mut pov, &mut cache, &mut queue, &selection, *host_mode, *interaction, &config, &vr,
          &mut avatars, &rigs, &globals, &mut cameras, &mut commands,
        );
      }
    }
  }
}

#[allow(clippy::too_many_arguments)]
fn enable(
  explicit: Option<Entity>,
  restored_head_visible: Option<bool>,
  pov: &mut Pov,
  cache: &mut LookRotationCache,
  queue: &mut AvatarQueue,
  selection: &SelectionSet,
  host_mode: HostMode,
  interaction: InteractionMode,
  config: &PovConfig,
  vr: &VrCapability,
  avatars: &mut Query<(Entity, &mut Avatar)>,
  rigs: &Query<&AvatarRig>,
  globals: &Query<&GlobalTransform>,
  cameras: &mut Query<PovCameraQuery, With<PovCamera>>,
  commands: &mut Commands,
) {
  if pov.enabled {
    return;
  }

  let avatar = match explicit {
    Some(entity) if avatars.contains(entity) => Some(entity),
    Some(_) => {
      warn!("Cannot enter POV: requested avatar no longer exists");
      None
    }
    None => {
      let live: Vec<(Entity, AvatarInfo)> = avatars
        .iter()
        .map(|(entity, avatar)| {
          (
            entity,
            AvatarInfo {
              sex: avatar.sex,
              active: avatar.active,
            },
          )
        })
        .collect();
      let ctx = FilterCtx {
        interaction,
        pov_sex: config.pov_sex,
      };
      let mut found = select::pick(host_mode, selection, queue, ctx, &live);
      if found.is_none() && host_mode == HostMode::Live {
        // One rebuild from the live set, then give up.
        queue.rebuild(live.iter().map(|(entity, _)| *entity));
        found = select::pick(host_mode, selection, queue, ctx, &live);
      }
      found
    }
  };

  let Some(avatar) = avatar else {
    match host_mode {
      HostMode::Authoring => info!("Select an avatar in the workspace to enter its POV"),
      HostMode::Live => info!("Can't enter POV: no valid avatar found"),
    }
    return;
  };

  let Ok((_, mut subject)) = avatars.get_mut(avatar) else {
    return;
  };
  let prev_head_visible = restored_head_visible.unwrap_or(subject.head_always_visible);

  let mut head_hidden_via_vr = false;
  if vr.usable() {
    match host_mode {
      HostMode::Authoring => {
        if vr.hide_head(avatar, true) {
          head_hidden_via_vr = true;
        } else {
          warn!("VR head hider unavailable; falling back to desktop head suppression");
          if config.hide_head {
            subject.head_always_visible = false;
          }
        }
      }
      HostMode::Live => {
        debug!("VR runtime owns head visibility in live mode");
      }
    }
  } else if config.hide_head {
    subject.head_always_visible = false;
  }

  let camera_backup = match cameras.single_mut() {
    Ok((_, mut projection, mut layers, mut control, mut dof)) => camera_rig::acquire(
      vr.usable(),
      &mut projection,
      layers.as_deref_mut(),
      control.as_deref_mut(),
      dof.as_deref_mut(),
    ),
    Err(_) => {
      warn!("No POV camera found; entering POV without camera backup");
      None
    }
  };

  if vr.usable() {
    pov.current_fov = None;
  } else if pov.current_fov.is_none() {
    pov.current_fov = Some(config.default_fov);
  }

  if !cache.contains(avatar) {
    let seed = rigs
      .get(avatar)
      .ok()
      .and_then(|rig| globals.get(rig.head).ok())
      .map(|head| rotation_to_look(head.rotation()))
      .unwrap_or(Vec3::ZERO);
    cache.insert(avatar, seed);
  }

  commands.entity(avatar).insert(PovSubject);
  pov.enabled = true;
  pov.current = Some(avatar);
  pov.session = Some(PovSession {
    avatar,
    prev_head_visible,
    head_hidden_via_vr,
    camera: camera_backup,
  });
  info!("Entered POV of avatar {avatar}");
}

/// Tears down the active session. Idempotent: calling it while disabled is a
/// safe no-op, and it restores exactly what enable touched.
pub(crate) fn disable(
  pov: &mut Pov,
  vr: &VrCapability,
  avatars: &mut Query<(Entity, &mut Avatar)>,
  cameras: &mut Query<PovCameraQuery, With<PovCamera>>,
  drag: &mut DragState,
  cursors: &mut Query<&mut CursorOptions, With<PrimaryWindow>>,
  commands: &mut Commands,
) {
  if !pov.enabled {
    pov.current = None;
    return;
  }

  if let Some(session) = pov.session.take() {
    if let Ok((_, mut subject)) = avatars.get_mut(session.avatar) {
      if session.head_hidden_via_vr {
        if !vr.hide_head(session.avatar, false) {
          warn!("VR head hider unavailable on POV exit; restoring head visibility directly");
          subject.head_always_visible = session.prev_head_visible;
        }
      } else {
        subject.head_always_visible = session.prev_head_visible;
      }
      commands.entity(session.avatar).remove::<PovSubject>();
    }

    if let Some(backup) = &session.camera
      && let Ok((_, mut projection, mut layers, mut control, mut dof)) = cameras.single_mut()
    {
      camera_rig::release(
        backup,
        &mut projection,
        layers.as_deref_mut(),
        control.as_deref_mut(),
        dof.as_deref_mut(),
      );
    }
  }

  pov.enabled = false;
  pov.current = None;
  drag.rotate_drag = false;
  drag.fov_drag = false;
  input::release_pointer(drag, cursors);
  info!("Left POV");
}

/// Apply-phase override. Replaces the host's head-aim output for the current
/// avatar only; every other avatar keeps default behavior. Nothing in here
/// may panic: a failure would corrupt every subsequent frame.
#[allow(clippy::too_many_arguments)]
pub fn pov_override(
  mut pov: ResMut<Pov>,
  vr: Res<VrCapability>,
  host_mode: Res<HostMode>,
  config: Res<PovConfig>,
  mut cache: ResMut<LookRotationCache>,
  mut drag: ResMut<DragState>,
  mut avatars: Query<(Entity, &mut Avatar)>,
  rigs: Query<&AvatarRig>,
  globals: Query<&GlobalTransform>,
  mut bones: Query<&mut Transform, Without<PovCamera>>,
  mut cameras: Query<PovCameraQuery, With<PovCamera>>,
  mut cursors: Query<&mut CursorOptions, With<PrimaryWindow>>,
  mut commands: Commands,
) {
  // The VR integration is defined only for the authoring context; in live
  // mode with VR usable the host's own aim logic keeps running untouched.
  // Evaluated before any state check.
  if *host_mode == HostMode::Live && vr.usable() {
    return;
  }

  if !pov.enabled {
    return;
  }
  let Some(avatar) = pov.current else {
    return;
  };

  if !avatars.contains(avatar) {
    warn!("POV avatar went stale; leaving POV");
    disable(&mut pov, &vr, &mut avatars, &mut cameras, &mut drag, &mut cursors, &mut commands);
    return;
  }
  let Ok(rig) = rigs.get(avatar) else {
    return;
  };

  let look = match cache.get(avatar) {
    Some(look) => look,
    None => {
      // Re-seed lazily; the cache may have been invalidated mid-session.
      let seed = globals
        .get(rig.head)
        .map(|head| rotation_to_look(head.rotation()))
        .unwrap_or(Vec3::ZERO);
      cache.insert(avatar, seed);
      seed
    }
  };

  if let Ok(mut neck) = bones.get_mut(rig.necks[0]) {
    neck.rotation = Quat::IDENTITY;
  }
  if let Ok(mut neck) = bones.get_mut(rig.necks[1]) {
    neck.rotation = look_to_rotation(look);
  }

  let (Ok(eye_a), Ok(eye_b)) = (globals.get(rig.eyes[0]), globals.get(rig.eyes[1])) else {
    return;
  };
  let eye_position = eye_a.translation().lerp(eye_b.translation(), 0.5);
  let Ok(head) = globals.get(rig.head) else {
    return;
  };
  let head_rotation = head.rotation();
  let head_forward = head_rotation * Vec3::NEG_Z;

  if vr.usable() {
    vr.invoke(eye_position + head_forward * config.vr_view_offset, false);
    // The VR runtime owns the field of view.
    pov.current_fov = None;
  } else {
    let Ok((mut camera, mut projection, ..)) = cameras.single_mut() else {
      return;
    };
    *camera = Transform::from_translation(eye_position).with_rotation(head_rotation);
    let forward = camera.forward();
    camera.translation += forward * config.view_offset;
    let fov = *pov.current_fov.get_or_insert(config.default_fov);
    camera_rig::apply_fov(&mut projection, fov);
  }
}
