//! # lift-settings
//!
//! Layered configuration for the lift dispatch server.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`LiftSettings::default()`]
//! 2. **Settings file**: `~/.lift/settings.json` or an explicit path
//! 3. **Environment variables**: `LIFT_*` overrides (highest priority)
//!
//! There is no global instance: the binary loads settings once and passes
//! the relevant pieces to each service it constructs.

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, lift_home, load_settings, load_settings_from_path, settings_path};
pub use types::*;
