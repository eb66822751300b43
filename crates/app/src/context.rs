use std::sync::Arc;

use scene::{LodFilter, SceneManager, SceneParser};
use settings::SyncSettings;

use crate::clock::SyncClock;
use crate::ui::UiBridge;

/// Who this process is on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkIdentity {
    pub client_id: u8,
    pub is_server: bool,
}

/// Subsystems shared by every module of one process.
///
/// Cloning is cheap; all clones see the same clock, scene and UI bridge.
#[derive(Debug, Clone)]
pub struct Core {
    settings: Arc<SyncSettings>,
    clock: Arc<SyncClock>,
    scene: Arc<SceneManager>,
    ui: Arc<UiBridge>,
    identity: NetworkIdentity,
}

impl Core {
    pub fn new(settings: SyncSettings, identity: NetworkIdentity) -> Self {
        let clock = SyncClock::new(settings.clock.frame_rate);
        let scene = SceneManager::new(settings.scene.max_history);
        Self {
            settings: Arc::new(settings),
            clock: Arc::new(clock),
            scene: Arc::new(scene),
            ui: Arc::new(UiBridge::new()),
            identity,
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn clock(&self) -> &Arc<SyncClock> {
        &self.clock
    }

    pub fn scene(&self) -> &Arc<SceneManager> {
        &self.scene
    }

    pub fn ui(&self) -> &Arc<UiBridge> {
        &self.ui
    }

    pub fn network(&self) -> NetworkIdentity {
        self.identity
    }

    /// Parser configured with the level-of-detail flags of the scene settings.
    pub fn scene_parser(&self) -> SceneParser {
        let scene = &self.settings.scene;
        SceneParser::new(LodFilter {
            low: scene.lod_low,
            high: scene.lod_high,
            mixed: scene.lod_mixed,
        })
    }
}
