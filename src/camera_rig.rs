//! Camera acquisition and release.
//!
//! `acquire` captures the camera parameters POV will touch and applies the
//! POV-appropriate values; `release` is the mirror restore. Both are guarded
//! so a release after a skipped or partial acquire is a safe no-op. When VR
//! is usable the whole rig is skipped and the VR runtime owns the viewpoint.

use bevy::camera::visibility::RenderLayers;
use bevy::prelude::*;

/// Marker for the camera this plugin may drive.
#[derive(Component)]
pub struct PovCamera;

/// The host's default camera-control behavior, disabled for the duration of
/// a POV session.
#[derive(Component, Debug, Clone)]
pub struct CameraControl {
  pub enabled: bool,
}

impl Default for CameraControl {
  fn default() -> Self {
    Self { enabled: true }
  }
}

/// Optional depth-of-field post effect on the camera. Tightened while POV is
/// active to pull the focal point close for a first-person look.
#[derive(Component, Debug, Clone)]
pub struct DepthOfField {
  pub enabled: bool,
  pub focal_size: f32,
  pub aperture: f32,
  /// Focal point position, camera-local.
  pub focal_offset: Vec3,
}

pub const POV_DOF_FOCAL_OFFSET: Vec3 = Vec3::new(0.0, 0.0, 0.25);
pub const POV_DOF_FOCAL_SIZE: f32 = 0.9;
pub const POV_DOF_APERTURE: f32 = 0.6;

/// Camera query shape shared by every system that touches the POV camera.
pub type PovCameraQuery = (
  &'static mut Transform,
  &'static mut Projection,
  Option<&'static mut RenderLayers>,
  Option<&'static mut CameraControl>,
  Option<&'static mut DepthOfField>,
);

#[derive(Debug, Clone)]
struct DofBackup {
  focal_size: f32,
  aperture: f32,
  focal_offset: Vec3,
}

/// Everything `acquire` captured, consumed by `release`.
#[derive(Debug, Clone)]
pub struct CameraBackup {
  fov: f32,
  near: f32,
  layers: Option<RenderLayers>,
  control_was_enabled: Option<bool>,
  dof: Option<DofBackup>,
}

/// Backs up the camera parameters and applies POV values. Returns `None`
/// when VR is usable (the VR runtime owns every viewpoint parameter) or when
/// the camera has no perspective projection to drive.
pub fn acquire(
  vr_usable: bool,
  projection: &mut Projection,
  layers: Option<&mut RenderLayers>,
  control: Option<&mut CameraControl>,
  dof: Option<&mut DepthOfField>,
) -> Option<CameraBackup> {
  if vr_usable {
    debug!("VR usable; leaving camera parameters to the VR runtime");
    return None;
  }

  let Projection::Perspective(perspective) = projection else {
    warn!("POV camera has no perspective projection; entering POV without camera backup");
    return None;
  };

  let mut backup = CameraBackup {
    fov: perspective.fov,
    near: perspective.near,
    layers: None,
    control_was_enabled: None,
    dof: None,
  };

  // An absent RenderLayers component already means the base layer.
  if let Some(layers) = layers {
    backup.layers = Some(layers.clone());
    *layers = RenderLayers::layer(0);
  }

  if let Some(control) = control {
    backup.control_was_enabled = Some(control.enabled);
    control.enabled = false;
  }

  if let Some(dof) = dof
    && dof.enabled
  {
    backup.dof = Some(DofBackup {
      focal_size: dof.focal_size,
      aperture: dof.aperture,
      focal_offset: dof.focal_offset,
    });
    dof.focal_offset = POV_DOF_FOCAL_OFFSET;
    dof.focal_size = POV_DOF_FOCAL_SIZE;
    dof.aperture = POV_DOF_APERTURE;
  }

  Some(backup)
}

/// Mirror restore of everything `acquire` captured. Restoring a field that
/// was never touched is a guarded no-op.
pub fn release(
  backup: &CameraBackup,
  projection: &mut Projection,
  layers: Option<&mut RenderLayers>,
  control: Option<&mut CameraControl>,
  dof: Option<&mut DepthOfField>,
) {
  if let Projection::Perspective(perspective) = projection {
    perspective.fov = backup.fov;
    perspective.near = backup.near;
  }

  if let (Some(saved), Some(layers)) = (&backup.layers, layers) {
    *layers = saved.clone();
  }

  if let (Some(was_enabled), Some(control)) = (backup.control_was_enabled, control) {
    control.enabled = was_enabled;
  }

  if let (Some(saved), Some(dof)) = (&backup.dof, dof) {
    dof.focal_size = saved.focal_size;
    dof.aperture = saved.aperture;
    dof.focal_offset = saved.focal_offset;
  }
}

/// Applies the current POV field of view (degrees) to the camera.
pub fn apply_fov(projection: &mut Projection, fov_degrees: f32) {
  if let Projection::Perspective(perspective) = projection {
    perspective.fov = fov_degrees.to_radians();
  }
}
