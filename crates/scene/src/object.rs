use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::model::{LightType, NodeKind, SceneData, SceneNode};
use crate::parameter::{ChangeOrigin, Parameter, ParameterValue};

/// Parameter ids shared by every peer. Ids are list positions and never change
/// while a session is live.
///
/// | object | valid ids |
/// |---|---|
/// | any | 0 position, 1 rotation, 2 scale |
/// | spot light | 3 color, 4 intensity, 5 range, 6 spot angle |
/// | point, directional or area light | 3 color, 4 intensity, 5 range |
/// | camera | 3 fov, 4 near, 5 far |
///
/// Only spot lights carry [`LIGHT_SPOT_ANGLE`](param_ids::LIGHT_SPOT_ANGLE); an
/// update addressing id 6 on another light kind is dropped as unknown.
pub mod param_ids {
    pub const POSITION: u16 = 0;
    pub const ROTATION: u16 = 1;
    pub const SCALE: u16 = 2;

    pub const LIGHT_COLOR: u16 = 3;
    pub const LIGHT_INTENSITY: u16 = 4;
    pub const LIGHT_RANGE: u16 = 5;
    /// Spot lights only.
    pub const LIGHT_SPOT_ANGLE: u16 = 6;

    pub const CAMERA_FOV: u16 = 3;
    pub const CAMERA_NEAR: u16 = 4;
    pub const CAMERA_FAR: u16 = 5;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneObjectKind {
    Object,
    Light,
    Camera,
}

type LockObserver = Arc<dyn Fn(u16, bool) + Send + Sync>;

/// A live, networked entity addressed by its session-wide id.
pub struct SceneObject {
    id: u16,
    name: String,
    kind: SceneObjectKind,
    node_index: Option<usize>,
    locked: AtomicBool,
    parameters: Vec<Arc<Parameter>>,
    lock_observers: Mutex<Vec<LockObserver>>,
}

impl std::fmt::Debug for SceneObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneObject")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("locked", &self.is_locked())
            .field("parameters", &self.parameters.len())
            .finish()
    }
}

impl SceneObject {
    pub fn builder(id: u16, name: impl Into<String>) -> SceneObjectBuilder {
        SceneObjectBuilder {
            id,
            name: name.into(),
            kind: SceneObjectKind::Object,
            node_index: None,
            parameters: Vec::new(),
        }
    }

    /// Creates the networked object for a node, or `None` when the node is
    /// not shared (plain, non-editable geometry and groups).
    pub fn from_node(id: u16, node_index: usize, node: &SceneNode) -> Option<Self> {
        let kind = match &node.kind {
            NodeKind::Light(_) => SceneObjectKind::Light,
            NodeKind::Camera(_) => SceneObjectKind::Camera,
            _ if node.editable => SceneObjectKind::Object,
            _ => return None,
        };

        let t = &node.transform;
        let mut builder = SceneObject::builder(id, node.name.clone())
            .kind(kind)
            .node_index(node_index)
            .parameter("position", ParameterValue::Vector3(t.position))
            .parameter("rotation", ParameterValue::Quaternion(t.rotation))
            .parameter("scale", ParameterValue::Vector3(t.scale));

        match &node.kind {
            NodeKind::Light(light) => {
                let [r, g, b] = light.color;
                builder = builder
                    .parameter("color", ParameterValue::Color([r, g, b, 1.0]))
                    .parameter("intensity", ParameterValue::Float(light.intensity))
                    .parameter("range", ParameterValue::Float(light.range));
                if light.light_type == LightType::Spot {
                    builder = builder.parameter("spotAngle", ParameterValue::Float(light.angle));
                }
            }
            NodeKind::Camera(camera) => {
                builder = builder
                    .parameter("fov", ParameterValue::Float(camera.fov))
                    .parameter("nearClipPlane", ParameterValue::Float(camera.near))
                    .parameter("farClipPlane", ParameterValue::Float(camera.far));
            }
            _ => {}
        }

        Some(builder.build())
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SceneObjectKind {
        self.kind
    }

    /// Index of the node this object was built from.
    pub fn node_index(&self) -> Option<usize> {
        self.node_index
    }

    pub fn parameters(&self) -> &[Arc<Parameter>] {
        &self.parameters
    }

    pub fn parameter(&self, id: u16) -> Option<&Arc<Parameter>> {
        self.parameters.get(usize::from(id))
    }

    pub fn parameter_by_name(&self, name: &str) -> Option<&Arc<Parameter>> {
        self.parameters.iter().find(|p| p.name() == name)
    }

    /// Whether a peer currently holds the object. The UI decides what that gates.
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    pub fn set_locked(&self, locked: bool) {
        self.locked.store(locked, Ordering::Release);
        let observers: Vec<LockObserver> = match self.lock_observers.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => return,
        };
        for observer in observers {
            observer(self.id, locked);
        }
    }

    pub fn on_lock_change<F>(&self, observer: F)
    where
        F: Fn(u16, bool) + Send + Sync + 'static,
    {
        if let Ok(mut observers) = self.lock_observers.lock() {
            observers.push(Arc::new(observer));
        }
    }

    /// Resets every parameter to the value it had when the scene was built.
    pub fn reset_all(&self, origin: ChangeOrigin) {
        for parameter in &self.parameters {
            parameter.reset(origin);
        }
    }
}

pub struct SceneObjectBuilder {
    id: u16,
    name: String,
    kind: SceneObjectKind,
    node_index: Option<usize>,
    parameters: Vec<Parameter>,
}

impl SceneObjectBuilder {
    pub fn kind(mut self, kind: SceneObjectKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn node_index(mut self, index: usize) -> Self {
        self.node_index = Some(index);
        self
    }

    /// Appends a parameter; its id is its position in the list.
    pub fn parameter(mut self, name: &str, default: ParameterValue) -> Self {
        let id = self.parameters.len() as u16;
        self.parameters.push(Parameter::new(self.id, id, name, default));
        self
    }

    pub fn action(mut self, name: &str) -> Self {
        let id = self.parameters.len() as u16;
        self.parameters.push(Parameter::action(self.id, id, name));
        self
    }

    pub fn build(self) -> SceneObject {
        SceneObject {
            id: self.id,
            name: self.name,
            kind: self.kind,
            node_index: self.node_index,
            locked: AtomicBool::new(false),
            parameters: self.parameters.into_iter().map(Arc::new).collect(),
            lock_observers: Mutex::new(Vec::new()),
        }
    }
}

/// All scene objects of the current session, keyed by id.
#[derive(Debug, Default)]
pub struct SceneRegistry {
    objects: Vec<Arc<SceneObject>>,
    by_id: HashMap<u16, usize>,
}

impl SceneRegistry {
    /// Assigns ids `1..` in node order. Every peer derives the same numbering
    /// from the same node list.
    pub fn from_scene(data: &SceneData) -> Self {
        let mut objects = Vec::new();
        let mut next_id: u16 = 1;
        for (index, node) in data.nodes.iter().enumerate() {
            if let Some(object) = SceneObject::from_node(next_id, index, node) {
                objects.push(object);
                let Some(id) = next_id.checked_add(1) else {
                    warn!(nodes = data.nodes.len(), "scene object ids exhausted");
                    break;
                };
                next_id = id;
            }
        }
        debug!(objects = objects.len(), "scene registry built");
        Self::from_objects(objects)
    }

    pub fn from_objects(objects: Vec<SceneObject>) -> Self {
        let objects: Vec<Arc<SceneObject>> = objects.into_iter().map(Arc::new).collect();
        let by_id = objects
            .iter()
            .enumerate()
            .map(|(index, object)| (object.id(), index))
            .collect();
        Self { objects, by_id }
    }

    pub fn get(&self, id: u16) -> Option<&Arc<SceneObject>> {
        self.by_id.get(&id).and_then(|index| self.objects.get(*index))
    }

    pub fn parameter(&self, object_id: u16, parameter_id: u16) -> Option<&Arc<Parameter>> {
        self.get(object_id)?.parameter(parameter_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<SceneObject>> {
        self.objects.iter()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CameraNode, LightNode, Transform};

    fn node(name: &str, editable: bool, kind: NodeKind) -> SceneNode {
        SceneNode {
            name: name.into(),
            editable,
            child_count: 0,
            transform: Transform::default(),
            kind,
        }
    }

    #[test]
    fn ids_follow_node_order_and_skip_static_nodes() {
        let data = SceneData {
            nodes: vec![
                node("root", false, NodeKind::Group),
                node("prop", true, NodeKind::Group),
                node("wall", false, NodeKind::Group),
                node(
                    "key",
                    false,
                    NodeKind::Light(LightNode {
                        light_type: LightType::Spot,
                        intensity: 2.0,
                        angle: 45.0,
                        range: 10.0,
                        color: [1.0, 1.0, 1.0],
                    }),
                ),
                node(
                    "cam",
                    false,
                    NodeKind::Camera(CameraNode {
                        fov: 60.0,
                        near: 0.1,
                        far: 1000.0,
                    }),
                ),
            ],
            ..SceneData::default()
        };

        let registry = SceneRegistry::from_scene(&data);
        let ids: Vec<_> = registry.iter().map(|o| (o.id(), o.name().to_owned())).collect();
        assert_eq!(
            ids,
            [
                (1, "prop".to_owned()),
                (2, "key".to_owned()),
                (3, "cam".to_owned())
            ]
        );

        let light = registry.get(2).unwrap();
        assert_eq!(light.kind(), SceneObjectKind::Light);
        assert_eq!(light.parameters().len(), 7);
        assert_eq!(
            light.parameter(param_ids::LIGHT_INTENSITY).unwrap().value(),
            ParameterValue::Float(2.0)
        );
        assert_eq!(
            registry.parameter(3, param_ids::CAMERA_FOV).unwrap().name(),
            "fov"
        );
        assert!(registry.get(4).is_none());
    }

    #[test]
    fn only_spot_lights_carry_a_spot_angle() {
        let light = |light_type| {
            node(
                "lamp",
                false,
                NodeKind::Light(LightNode {
                    light_type,
                    intensity: 1.0,
                    angle: 30.0,
                    range: 5.0,
                    color: [1.0; 3],
                }),
            )
        };
        let spot = SceneObject::from_node(1, 0, &light(LightType::Spot)).unwrap();
        let point = SceneObject::from_node(1, 0, &light(LightType::Point)).unwrap();

        assert_eq!(
            spot.parameter(param_ids::LIGHT_SPOT_ANGLE).unwrap().name(),
            "spotAngle"
        );
        assert_eq!(point.parameters().len(), 6);
        assert!(point.parameter(param_ids::LIGHT_SPOT_ANGLE).is_none());
        assert!(point.parameter(param_ids::LIGHT_RANGE).is_some());
    }

    #[test]
    fn lock_observers_fire_on_every_change() {
        let object = SceneObject::builder(9, "crate").build();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        object.on_lock_change(move |id, locked| sink.lock().unwrap().push((id, locked)));

        object.set_locked(true);
        assert!(object.is_locked());
        object.set_locked(false);
        assert_eq!(*seen.lock().unwrap(), [(9, true), (9, false)]);
    }

    #[test]
    fn builder_numbers_parameters_in_order() {
        let object = SceneObject::builder(5, "rig")
            .parameter("weight", ParameterValue::Float(0.0))
            .action("play")
            .parameter("label", "a".into())
            .build();
        let names: Vec<_> = object.parameters().iter().map(|p| (p.id(), p.name())).collect();
        assert_eq!(names, [(0, "weight"), (1, "play"), (2, "label")]);
        assert!(object.parameters().iter().all(|p| p.object_id() == 5));
    }
}
