//! POV session persistence.
//!
//! The host owns the save file; this module only defines the serializable
//! POV snapshot and the helper that captures one from a running session.
//! Restoring goes through [`PovRequest::Restore`](crate::state::PovRequest).

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::scene::AvatarId;
use crate::state::{LookRotationCache, Pov};

/// Snapshot of an active POV session, keyed by the stable avatar id rather
/// than the entity handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PovSaveData {
  pub avatar: AvatarId,
  pub head_visible_before_pov: bool,
  pub fov: f32,
  pub look_rotation: [f32; 3],
}

/// Captures the current session, or `None` when POV is disabled or the
/// current avatar has no stable id to key the snapshot by.
pub fn pov_save_data(
  pov: &Pov,
  cache: &LookRotationCache,
  default_fov: f32,
  ids: &Query<&AvatarId>,
) -> Option<PovSaveData> {
  if !pov.enabled {
    return None;
  }
  let avatar = pov.current?;
  let session = pov.session.as_ref()?;
  let id = ids.get(avatar).ok()?;
  Some(PovSaveData {
    avatar: *id,
    head_visible_before_pov: session.prev_head_visible,
    fov: pov.current_fov.unwrap_or(default_fov),
    look_rotation: cache.get(avatar).unwrap_or(Vec3::ZERO).to_array(),
  })
}
