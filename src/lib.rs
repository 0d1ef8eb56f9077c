//! First-person avatar POV for Bevy hosts.
//!
//! Drops the camera into the head of a scene avatar: a toggle enters and
//! leaves POV, the subject's head is suppressed while inside, mouse drags
//! drive look and field of view on desktop, and an optionally present VR
//! runtime takes over the viewpoint when one is bound at startup. The host
//! owns the avatars, the camera and the save file; this crate only drives
//! them through [`AvatarPovPlugin`].

pub mod camera_rig;
pub mod capability;
pub mod config;
pub mod input;
pub mod plugin;
pub mod save;
pub mod scene;
pub mod select;
pub mod state;

pub use camera_rig::{CameraControl, DepthOfField, PovCamera};
pub use capability::{
  HeadHider, PoseMover, PositionMover, VrCapability, VrProvider, VrProviderRegistry,
};
pub use config::{PovConfig, PovSex};
pub use input::{DragState, UiPointerState};
pub use plugin::{AvatarPovPlugin, HeadAimSet, PovSet};
pub use save::{PovSaveData, pov_save_data};
pub use scene::{
  AnimationSetChanged, Avatar, AvatarId, AvatarRig, AvatarSex, HostMode, InteractionMode,
  PovSubject, SceneChanged, SelectionSet,
};
pub use state::{LookRotationCache, Pov, PovRequest};
