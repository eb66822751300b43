use std::sync::{Arc, RwLock};

use tracing::{info, warn};

use crate::builder::build_graph;
use crate::error::SceneError;
use crate::graph::SceneGraph;
use crate::history::{HistoryStep, UndoRedoHistory};
use crate::model::{SceneBlobs, SceneData};
use crate::object::{SceneObject, SceneRegistry};

/// A decoded scene with everything derived from it.
#[derive(Debug)]
pub struct LoadedScene {
    pub data: SceneData,
    pub graph: SceneGraph,
    pub registry: Arc<SceneRegistry>,
    /// Encoded form, served to clients as-is.
    pub blobs: SceneBlobs,
}

impl LoadedScene {
    fn from_data(data: SceneData, blobs: SceneBlobs) -> Result<Self, SceneError> {
        let graph = build_graph(&data)?;
        let registry = Arc::new(SceneRegistry::from_scene(&data));
        Ok(Self {
            data,
            graph,
            registry,
            blobs,
        })
    }
}

/// Holds the current scene of a peer and its undo history.
///
/// Loading is all-or-nothing: the current scene is only replaced once the new
/// one decoded and validated completely.
#[derive(Debug)]
pub struct SceneManager {
    current: RwLock<Option<Arc<LoadedScene>>>,
    history: UndoRedoHistory,
}

impl SceneManager {
    pub fn new(max_history: usize) -> Self {
        Self {
            current: RwLock::new(None),
            history: UndoRedoHistory::new(max_history),
        }
    }

    /// Decodes received blobs and makes them the current scene.
    pub fn load_blobs(&self, blobs: SceneBlobs) -> Result<Arc<LoadedScene>, SceneError> {
        let data = SceneData::decode(&blobs)?;
        let scene = LoadedScene::from_data(data, blobs)?;
        Ok(self.install(scene))
    }

    /// Makes an already parsed scene current, encoding it for distribution.
    pub fn load_data(&self, data: SceneData) -> Result<Arc<LoadedScene>, SceneError> {
        let blobs = data.encode();
        let scene = LoadedScene::from_data(data, blobs)?;
        Ok(self.install(scene))
    }

    fn install(&self, scene: LoadedScene) -> Arc<LoadedScene> {
        let scene = Arc::new(scene);
        info!(
            nodes = scene.data.nodes.len(),
            objects = scene.registry.len(),
            bytes = scene.blobs.total_len(),
            "scene loaded"
        );
        match self.current.write() {
            Ok(mut slot) => *slot = Some(Arc::clone(&scene)),
            Err(poisoned) => *poisoned.into_inner() = Some(Arc::clone(&scene)),
        }
        self.history.clear();
        scene
    }

    pub fn unload(&self) {
        match self.current.write() {
            Ok(mut slot) => *slot = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
        self.history.clear();
    }

    pub fn current(&self) -> Option<Arc<LoadedScene>> {
        match self.current.read() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.current().is_some()
    }

    pub fn registry(&self) -> Option<Arc<SceneRegistry>> {
        self.current().map(|scene| Arc::clone(&scene.registry))
    }

    pub fn object(&self, id: u16) -> Option<Arc<SceneObject>> {
        self.registry()?.get(id).cloned()
    }

    pub fn history(&self) -> &UndoRedoHistory {
        &self.history
    }

    pub fn undo(&self) -> Option<HistoryStep> {
        let Some(registry) = self.registry() else {
            warn!("undo without a loaded scene");
            return None;
        };
        self.history.undo(&registry)
    }

    pub fn redo(&self) -> Option<HistoryStep> {
        let Some(registry) = self.registry() else {
            warn!("redo without a loaded scene");
            return None;
        };
        self.history.redo(&registry)
    }

    pub fn reset_scene(&self) {
        if let Some(registry) = self.registry() {
            self.history.reset_scene(&registry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NodeKind, SceneNode, Transform};
    use crate::parameter::{ChangeOrigin, ParameterValue};

    fn scene() -> SceneData {
        SceneData {
            nodes: vec![
                SceneNode {
                    name: "root".into(),
                    editable: false,
                    child_count: 1,
                    transform: Transform::default(),
                    kind: NodeKind::Group,
                },
                SceneNode {
                    name: "prop".into(),
                    editable: true,
                    child_count: 0,
                    transform: Transform::default(),
                    kind: NodeKind::Group,
                },
            ],
            ..SceneData::default()
        }
    }

    #[test]
    fn failed_load_keeps_previous_scene() {
        let manager = SceneManager::new(10);
        let loaded = manager.load_data(scene()).unwrap();
        assert_eq!(manager.object(1).unwrap().name(), "prop");

        let mut blobs = loaded.blobs.clone();
        blobs.nodes = blobs.nodes.slice(..blobs.nodes.len() - 3);
        assert!(manager.load_blobs(blobs).unwrap_err().is_corrupt());

        let current = manager.current().unwrap();
        assert!(Arc::ptr_eq(&current, &loaded));
    }

    #[test]
    fn reload_clears_history() {
        let manager = SceneManager::new(10);
        let loaded = manager.load_data(scene()).unwrap();
        manager.history().add_step(1, 0, ParameterValue::Vector3([1.0; 3]));
        assert!(manager.history().can_undo());

        manager.load_blobs(loaded.blobs.clone()).unwrap();
        assert!(manager.history().is_empty());
    }

    #[test]
    fn undo_goes_through_current_registry() {
        let manager = SceneManager::new(10);
        manager.load_data(scene()).unwrap();
        let position = manager.object(1).unwrap().parameter(0).unwrap().clone();
        position
            .set(ParameterValue::Vector3([2.0; 3]), ChangeOrigin::Local)
            .unwrap();
        manager.history().add_step(1, 0, ParameterValue::Vector3([2.0; 3]));

        manager.undo().unwrap();
        assert_eq!(position.value(), ParameterValue::Vector3([0.0; 3]));
        manager.redo().unwrap();
        assert_eq!(position.value(), ParameterValue::Vector3([2.0; 3]));

        manager.unload();
        assert!(manager.undo().is_none());
    }
}
