//! Plugin wiring and frame ordering.
//!
//! Each frame splits into a decide phase and an apply phase. Requests and
//! pointer input are handled in `Update`; the head-aim override runs in
//! `PostUpdate` after [`HeadAimSet`] and before transform propagation, so
//! the host's aim systems finish first, the override has the last word for
//! the POV subject, and the camera's global transform is current in the
//! frame it was written.

use bevy::input::mouse::MouseMotion;
use bevy::prelude::*;
use bevy::transform::TransformSystems;

use crate::capability::{self, VrCapability, VrProviderRegistry};
use crate::config;
use crate::input::{self, DragState};
use crate::scene::{AnimationSetChanged, HostMode, InteractionMode, SceneChanged, SelectionSet};
use crate::select::{self, AvatarQueue};
use crate::state::{self, LookRotationCache, Pov, PovRequest};

/// Label for the host's head-aim systems. The host adds its aim systems to
/// this set; the POV override is scheduled strictly after it.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeadAimSet;

/// Internal frame phases.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PovSet {
  /// State transitions: hotkey, requests, cache invalidation.
  Decide,
  /// Pointer drags, strictly after `Decide`.
  Input,
}

pub struct AvatarPovPlugin;

impl Plugin for AvatarPovPlugin {
  fn build(&self, app: &mut App) {
    app
      .init_resource::<Pov>()
      .init_resource::<LookRotationCache>()
      .init_resource::<AvatarQueue>()
      .init_resource::<DragState>()
      .init_resource::<SelectionSet>()
      .init_resource::<HostMode>()
      .init_resource::<InteractionMode>()
      .init_resource::<VrProviderRegistry>()
      .init_resource::<VrCapability>()
      // Input plumbing the host may or may not have set up already.
      .init_resource::<ButtonInput<KeyCode>>()
      .init_resource::<ButtonInput<MouseButton>>()
      .add_message::<MouseMotion>()
      .add_message::<PovRequest>()
      .add_message::<SceneChanged>()
      .add_message::<AnimationSetChanged>()
      .configure_sets(Update, PovSet::Input.after(PovSet::Decide))
      .add_systems(PreStartup, config::load_pov_config)
      .add_systems(Startup, capability::initialize_vr_capability)
      .add_systems(
        Update,
        (
          select::clear_queue_on_scene_change,
          state::invalidate_look_cache,
          state::toggle_hotkey,
          state::apply_pov_requests,
        )
          .chain()
          .in_set(PovSet::Decide),
      )
      .add_systems(Update, input::pointer_input.in_set(PovSet::Input))
      .add_systems(
        PostUpdate,
        state::pov_override
          .after(HeadAimSet)
          .before(TransformSystems::Propagate),
      );
  }
}
