use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::Settings;

/// Addresses, ports and timeouts of the synchronisation transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Address of the synchronisation server (also used to pick the local interface).
    pub server_address: String,
    /// Request/reply port serving the scene blobs.
    pub scene_port: u16,
    /// Port the server publishes updates on (clients subscribe here).
    pub update_port: u16,
    /// Port the server collects client updates on (clients publish here).
    pub collect_port: u16,
    pub receive_timeout_ms: u64,
    pub request_timeout_ms: u64,
    /// Upper bound for a single transport frame, scene blobs included.
    pub max_frame_bytes: usize,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1".into(),
            scene_port: 5555,
            update_port: 5556,
            collect_port: 5557,
            receive_timeout_ms: 1000,
            request_timeout_ms: 5000,
            max_frame_bytes: 64 * 1024 * 1024,
        }
    }
}

impl Settings for NetworkSettings {
    const SECTION: &'static str = "network";
}

impl NetworkSettings {
    pub fn scene_endpoint(&self) -> String {
        format!("{}:{}", self.server_address, self.scene_port)
    }

    pub fn update_endpoint(&self) -> String {
        format!("{}:{}", self.server_address, self.update_port)
    }

    pub fn collect_endpoint(&self) -> String {
        format!("{}:{}", self.server_address, self.collect_port)
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Shared clock configuration. All peers of a session must agree on `frame_rate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockSettings {
    pub frame_rate: u16,
    /// Ticks between two SYNC broadcasts of the server. `0` means once per second.
    pub sync_interval_ticks: u16,
}

impl Default for ClockSettings {
    fn default() -> Self {
        Self {
            frame_rate: 60,
            sync_interval_ticks: 0,
        }
    }
}

impl Settings for ClockSettings {
    const SECTION: &'static str = "clock";
}

impl ClockSettings {
    pub fn effective_sync_interval(&self) -> u16 {
        if self.sync_interval_ticks == 0 {
            self.frame_rate.max(1)
        } else {
            self.sync_interval_ticks
        }
    }
}

/// Scene parsing and history options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneSettings {
    pub scene_name: String,
    pub lod_low: bool,
    pub lod_high: bool,
    pub lod_mixed: bool,
    pub max_history: usize,
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            scene_name: "scene".into(),
            lod_low: false,
            lod_high: true,
            lod_mixed: true,
            max_history: 100,
        }
    }
}

impl Settings for SceneSettings {
    const SECTION: &'static str = "scene";
}

/// Snapshot of every section, handed to the runtime context at start-up.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncSettings {
    pub network: NetworkSettings,
    pub clock: ClockSettings,
    pub scene: SceneSettings,
}
