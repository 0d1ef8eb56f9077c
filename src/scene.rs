//! Host-scene facing data model.
//!
//! The host app owns the avatars; this plugin only reads their identity and
//! attributes, and mutates the head-visibility flag and neck bones while an
//! avatar is the POV subject.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Avatar sex attribute as the host scene models it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvatarSex {
  Male,
  Female,
}

/// A scene avatar. `sex` and `active` are read-only to this plugin;
/// `head_always_visible` is suppressed on POV enter and restored on exit.
#[derive(Component, Debug, Clone)]
pub struct Avatar {
  pub sex: AvatarSex,
  pub active: bool,
  pub head_always_visible: bool,
}

/// Bone-entity references for an avatar skeleton. The bones are plain
/// entities with `Transform`s, owned and animated by the host.
#[derive(Component, Debug, Clone)]
pub struct AvatarRig {
  pub head: Entity,
  pub necks: [Entity; 2],
  pub eyes: [Entity; 2],
}

/// Host-stable avatar identity, used by the save/restore contract.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AvatarId(pub u32);

/// Marker inserted on the avatar currently driven by POV.
///
/// Host head-aim systems should filter on `Without<PovSubject>` so that the
/// POV override replaces their output for this one avatar only.
#[derive(Component)]
pub struct PovSubject;

/// Explicit avatar selection in the authoring context (workspace selection).
#[derive(Resource, Default)]
pub struct SelectionSet(pub Vec<Entity>);

/// Which mode the host application is running in.
#[derive(Resource, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostMode {
  /// Editing/composition mode with an explicit selection set.
  Authoring,
  /// Default interactive mode; avatars are picked from a rotating queue.
  #[default]
  Live,
}

/// Restrictive interaction sub-modes of the live context. During the
/// restrictive ones, non-preferred-sex avatars are skipped by the selector.
#[derive(Resource, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractionMode {
  #[default]
  Default,
  Affectionate,
  SameSex,
  Solo,
}

impl InteractionMode {
  pub fn restricts_non_preferred(self) -> bool {
    matches!(
      self,
      InteractionMode::Affectionate | InteractionMode::SameSex | InteractionMode::Solo
    )
  }
}

/// Host signal: the avatar set changed (scene load/unload). Invalidates the
/// selection queue.
#[derive(Message)]
pub struct SceneChanged;

/// Host signal: the avatar animation set changed. Invalidates every cached
/// look rotation, since stale offsets would fight the new animation.
#[derive(Message)]
pub struct AnimationSetChanged;
