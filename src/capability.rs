//! Capability binding for the optional VR runtime.
//!
//! The VR subsystem is not known at build time. A host-side integration
//! registers a [`VrProvider`] in the [`VrProviderRegistry`]; at startup the
//! binding is resolved exactly once into [`VrCapability`], trying the
//! two-argument move shape first and the three-argument shape as a fallback.
//! Absence of a provider, or a provider exposing neither shape, is a normal
//! configuration: every call site checks [`VrCapability::usable`] and
//! degrades to the desktop path.

use std::sync::Arc;

use bevy::prelude::*;

/// Two-argument move shape: `(position, ignore_height)`.
pub type PositionMover = Arc<dyn Fn(Vec3, bool) + Send + Sync>;
/// Three-argument move shape: `(position, orientation, ignore_height)`.
pub type PoseMover = Arc<dyn Fn(Vec3, Quat, bool) + Send + Sync>;
/// Companion head-hiding toggle: `(avatar, hidden)`.
pub type HeadHider = Arc<dyn Fn(Entity, bool) + Send + Sync>;

/// An optional external VR runtime, as negotiated capabilities rather than
/// symbols looked up by name.
pub trait VrProvider: Send + Sync {
  /// Provider name, for diagnostics only.
  fn name(&self) -> &str;

  /// Whether an HMD session is currently running.
  fn runtime_active(&self) -> bool;

  fn position_mover(&self) -> Option<PositionMover> {
    None
  }

  fn pose_mover(&self) -> Option<PoseMover> {
    None
  }

  fn head_hider(&self) -> Option<HeadHider> {
    None
  }
}

/// Injection point: the host inserts its VR integration here before startup.
#[derive(Resource, Default)]
pub struct VrProviderRegistry {
  pub provider: Option<Box<dyn VrProvider>>,
}

enum BoundMover {
  Position(PositionMover),
  Pose(PoseMover),
}

/// The resolved (or permanently absent) VR binding.
///
/// Binding happens at most once per process lifetime; a failed attempt is
/// never retried and leaves `usable() == false` for good.
#[derive(Resource, Default)]
pub struct VrCapability {
  initialized: bool,
  provider: Option<Box<dyn VrProvider>>,
  mover: Option<BoundMover>,
  head_hider: Option<HeadHider>,
}

impl VrCapability {
  /// Resolves the viewpoint mover from the registered provider. Idempotent:
  /// the second and later calls are no-ops regardless of the first outcome.
  pub fn initialize(&mut self, registry: &mut VrProviderRegistry) {
    if self.initialized {
      return;
    }
    self.initialized = true;

    let Some(provider) = registry.provider.take() else {
      info!("No VR provider registered; POV runs in desktop mode");
      return;
    };

    if let Some(mover) = provider.position_mover() {
      self.mover = Some(BoundMover::Position(mover));
    } else {
      warn!(
        "VR provider '{}' has no (position, ignore_height) move shape, trying (position, orientation, ignore_height)",
        provider.name()
      );
      if let Some(mover) = provider.pose_mover() {
        self.mover = Some(BoundMover::Pose(mover));
      } else {
        warn!(
          "VR provider '{}' exposes no viewpoint move entry point; VR support disabled",
          provider.name()
        );
      }
    }

    if self.mover.is_some() {
      info!("Bound VR viewpoint mover from provider '{}'", provider.name());
    }
    self.head_hider = provider.head_hider();
    self.provider = Some(provider);
  }

  pub fn initialized(&self) -> bool {
    self.initialized
  }

  /// The only predicate call sites may consult before any VR dispatch.
  pub fn usable(&self) -> bool {
    self.mover.is_some() && self.provider.as_ref().is_some_and(|p| p.runtime_active())
  }

  /// Moves the viewpoint origin so the head sits at `position`, using
  /// whichever call shape was bound. The orientation argument of the
  /// three-argument shape is filled with identity.
  pub fn invoke(&self, position: Vec3, ignore_height: bool) {
    match &self.mover {
      Some(BoundMover::Position(mover)) => mover(position, ignore_height),
      Some(BoundMover::Pose(mover)) => mover(position, Quat::IDENTITY, ignore_height),
      None => debug!("VR viewpoint move requested but no mover is bound"),
    }
  }

  /// Forwards to the companion head-hiding integration. Returns whether one
  /// was present.
  pub fn hide_head(&self, avatar: Entity, hidden: bool) -> bool {
    match &self.head_hider {
      Some(hider) => {
        hider(avatar, hidden);
        true
      }
      None => false,
    }
  }
}

/// Startup system performing the one-time binding.
pub fn initialize_vr_capability(
  mut vr: ResMut<VrCapability>,
  mut registry: ResMut<VrProviderRegistry>,
) {
  vr.initialize(&mut registry);
}
