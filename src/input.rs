//! Desktop input bridge.
//!
//! While POV is enabled and VR is not usable, a left-button drag rotates the
//! cached look (yaw from horizontal motion, pitch from vertical) and a
//! right-button drag adjusts the field of view; left wins when both buttons
//! are down. The pointer is captured while any drag is active and released
//! the moment none is, so the host regains the cursor immediately.

use bevy::input::mouse::MouseMotion;
use bevy::prelude::*;
use bevy::window::{CursorGrabMode, CursorOptions, PrimaryWindow};

use crate::capability::VrCapability;
use crate::config::PovConfig;
use crate::state::{LookRotationCache, Pov};

/// Which drags are in flight, plus whether we currently hold the pointer.
#[derive(Resource, Default)]
pub struct DragState {
  pub rotate_drag: bool,
  pub fov_drag: bool,
  pub captured: bool,
}

/// Set by the host while a UI element has pointer focus; new drags must not
/// start then. Optional: an absent resource means no UI focus ever.
#[derive(Resource, Default)]
pub struct UiPointerState {
  pub hovered: bool,
}

#[allow(clippy::too_many_arguments)]
pub fn pointer_input(
  mut pov: ResMut<Pov>,
  vr: Res<VrCapability>,
  config: Res<PovConfig>,
  buttons: Res<ButtonInput<MouseButton>>,
  ui: Option<Res<UiPointerState>>,
  mut motions: MessageReader<MouseMotion>,
  mut drag: ResMut<DragState>,
  mut cache: ResMut<LookRotationCache>,
  mut cursors: Query<&mut CursorOptions, With<PrimaryWindow>>,
) {
  if !pov.enabled {
    motions.clear();
    return;
  }
  if vr.usable() {
    // The VR runtime owns both the viewpoint and the field of view.
    drag.rotate_drag = false;
    drag.fov_drag = false;
    release_pointer(&mut drag, &mut cursors);
    motions.clear();
    return;
  }

  let ui_has_focus = ui.is_some_and(|ui| ui.hovered);
  if !ui_has_focus {
    if buttons.just_pressed(MouseButton::Left) {
      drag.rotate_drag = true;
    }
    if buttons.just_pressed(MouseButton::Right) {
      drag.fov_drag = true;
    }
  }

  if (drag.rotate_drag || drag.fov_drag) && !drag.captured {
    capture_pointer(&mut drag, &mut cursors);
  }

  let delta = motions
    .read()
    .fold(Vec2::ZERO, |acc, motion| acc + motion.delta);

  if delta != Vec2::ZERO {
    if drag.rotate_drag {
      if let Some(avatar) = pov.current
        && let Some(look) = cache.get_mut(avatar)
      {
        look.y += delta.x * config.mouse_sensitivity;
        look.x -= delta.y * config.mouse_sensitivity;
      }
    } else if drag.fov_drag {
      let fov = pov.current_fov.get_or_insert(config.default_fov);
      *fov += delta.x * config.mouse_sensitivity;
    }
  }

  if buttons.just_released(MouseButton::Left) {
    drag.rotate_drag = false;
  }
  if buttons.just_released(MouseButton::Right) {
    drag.fov_drag = false;
  }
  if !drag.rotate_drag && !drag.fov_drag {
    release_pointer(&mut drag, &mut cursors);
  }
}

pub(crate) fn capture_pointer(
  drag: &mut DragState,
  cursors: &mut Query<&mut CursorOptions, With<PrimaryWindow>>,
) {
  if let Ok(mut cursor) = cursors.single_mut() {
    cursor.grab_mode = CursorGrabMode::Locked;
    cursor.visible = false;
  }
  drag.captured = true;
}

/// Releases the pointer if we hold it; a foreign grab is left alone.
pub(crate) fn release_pointer(
  drag: &mut DragState,
  cursors: &mut Query<&mut CursorOptions, With<PrimaryWindow>>,
) {
  if !drag.captured {
    return;
  }
  if let Ok(mut cursor) = cursors.single_mut() {
    cursor.grab_mode = CursorGrabMode::None;
    cursor.visible = true;
  }
  drag.captured = false;
}
