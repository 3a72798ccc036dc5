//! # altnet-settings
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`AltnetSettings::default()`]
//! 2. **User file**: `~/.altnet/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `ALTNET_*` overrides

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    altnet_dir, apply_overrides, deep_merge, load_settings, load_settings_from_path, settings_path,
    store_path, validate,
};
pub use types::*;
