//! Layered TOML settings for the scene synchronisation tools.
//!
//! Each section is a plain serde struct implementing [`Settings`]. The
//! [`SettingsStore`] owns the backing TOML document, hands out typed
//! sections (missing keys fall back to `Default`) and persists updates.

mod errors;
mod sections;
mod store;

pub use errors::SettingsError;
pub use sections::{ClockSettings, NetworkSettings, SceneSettings, SyncSettings};
pub use store::SettingsStore;

use serde::{Serialize, de::DeserializeOwned};

/// A typed section inside the settings file.
pub trait Settings: Default + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Name of the TOML table holding this section.
    const SECTION: &'static str;
}
