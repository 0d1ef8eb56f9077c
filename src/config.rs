use bevy::prelude::*;
use serde::Deserialize;

use crate::scene::AvatarSex;

pub const POV_CONFIG_FILE: &str = "assets/config/pov.config.toml";

/// Which sex the selector prefers as the POV subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PovSex {
  Male,
  Female,
  Either,
}

impl PovSex {
  /// The explicit sex filter, or `None` when either sex is accepted.
  pub fn wanted_sex(self) -> Option<AvatarSex> {
    match self {
      PovSex::Male => Some(AvatarSex::Male),
      PovSex::Female => Some(AvatarSex::Female),
      PovSex::Either => None,
    }
  }
}

/// POV configuration surface. Loaded from `assets/config/pov.config.toml`
/// when present, otherwise defaults. The toggle key is not part of the file;
/// keybinding plumbing belongs to the host.
#[derive(Resource, Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PovConfig {
  /// Hide the subject's head while in POV so hair and accessories don't
  /// obstruct the view.
  pub hide_head: bool,
  pub pov_sex: PovSex,
  /// Camera offset along the head's forward axis, desktop mode.
  pub view_offset: f32,
  /// Viewpoint offset along the head's forward axis, VR mode.
  pub vr_view_offset: f32,
  /// Field of view in degrees applied when entering POV.
  pub default_fov: f32,
  pub mouse_sensitivity: f32,
  #[serde(skip, default = "default_toggle_key")]
  pub toggle_key: KeyCode,
}

impl Default for PovConfig {
  fn default() -> Self {
    Self {
      hide_head: false,
      pov_sex: PovSex::Male,
      view_offset: 0.03,
      vr_view_offset: 0.0,
      default_fov: 45.0,
      mouse_sensitivity: 1.0,
      toggle_key: default_toggle_key(),
    }
  }
}

fn default_toggle_key() -> KeyCode {
  KeyCode::Backspace
}

/// Sync-loads the POV config at `PreStartup`. A missing file is a normal
/// configuration, not an error.
pub fn load_pov_config(mut commands: Commands) {
  let config = match std::fs::read_to_string(POV_CONFIG_FILE) {
    Ok(contents) => match toml::from_str(&contents) {
      Ok(config) => {
        info!("Loaded POV config from {POV_CONFIG_FILE}");
        config
      }
      Err(e) => {
        warn!("Failed to parse {POV_CONFIG_FILE}: {e}, using defaults");
        PovConfig::default()
      }
    },
    Err(_) => {
      info!("No POV config at {POV_CONFIG_FILE}, using defaults");
      PovConfig::default()
    }
  };
  commands.insert_resource(config);
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn partial_config_fills_defaults() {
    let config: PovConfig = toml::from_str("hide_head = true\npov_sex = \"either\"").unwrap();
    assert!(config.hide_head);
    assert_eq!(config.pov_sex, PovSex::Either);
    assert_eq!(config.default_fov, 45.0);
    assert_eq!(config.view_offset, 0.03);
    assert_eq!(config.toggle_key, KeyCode::Backspace);
  }

  #[test]
  fn empty_config_is_default() {
    let config: PovConfig = toml::from_str("").unwrap();
    assert_eq!(config.pov_sex, PovSex::Male);
    assert_eq!(config.mouse_sensitivity, 1.0);
    assert!(!config.hide_head);
  }
}
