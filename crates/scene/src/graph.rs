//! Hierarchical scene as seen by the host engine.
//!
//! Assets are shared through `Arc`; two components pointing at the same
//! `Arc` use the same source asset and are encoded once.

use std::sync::Arc;

use crate::model::{
    CameraNode, LightNode, ObjectPackage, SceneHeader, TexturePackage, Transform,
};

/// Stable identity of a graph node, used for bone and rig references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(pub u32);

/// Level-of-detail layer a node lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LodLayer {
    #[default]
    Default,
    LodLow,
    LodHigh,
    LodMixed,
}

/// Which level-of-detail layers a parse includes. `Default` is always included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LodFilter {
    pub low: bool,
    pub high: bool,
    pub mixed: bool,
}

impl Default for LodFilter {
    fn default() -> Self {
        Self {
            low: false,
            high: true,
            mixed: true,
        }
    }
}

impl LodFilter {
    pub const ALL: LodFilter = LodFilter {
        low: true,
        high: true,
        mixed: true,
    };

    pub fn allows(&self, layer: LodLayer) -> bool {
        match layer {
            LodLayer::Default => true,
            LodLayer::LodLow => self.low,
            LodLayer::LodHigh => self.high,
            LodLayer::LodMixed => self.mixed,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaterialTexture {
    pub texture: Arc<TexturePackage>,
    pub offset: [f32; 2],
    pub scale: [f32; 2],
}

/// Material with its textures resolved to shared assets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialAsset {
    pub kind: i32,
    pub name: String,
    pub src: String,
    pub material_id: i32,
    pub textures: Vec<MaterialTexture>,
    pub shader_config: Vec<bool>,
    pub shader_property_ids: Vec<i32>,
    pub shader_property_types: Vec<i32>,
    pub shader_properties: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeoComponent {
    pub mesh: Option<Arc<ObjectPackage>>,
    pub texture: Option<Arc<TexturePackage>>,
    pub material: Option<Arc<MaterialAsset>>,
    pub roughness: f32,
    pub color: [f32; 4],
}

impl Default for GeoComponent {
    fn default() -> Self {
        Self {
            mesh: None,
            texture: None,
            material: None,
            roughness: 0.5,
            color: [1.0; 4],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkinnedGeoComponent {
    pub geo: GeoComponent,
    pub root_bone: Option<NodeKey>,
    pub bones: Vec<Option<NodeKey>>,
    pub bind_poses: Vec<[f32; 16]>,
    pub bound_extents: [f32; 3],
    pub bound_center: [f32; 3],
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum Component {
    #[default]
    None,
    Geo(GeoComponent),
    SkinnedGeo(SkinnedGeoComponent),
    Light(LightNode),
    Camera(CameraNode),
    Mocap,
}

/// Animation rig attached to a node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CharacterRig {
    pub name: String,
    pub root: Option<NodeKey>,
    pub bone_mapping: Vec<Option<NodeKey>>,
    pub skeleton_mapping: Vec<Option<NodeKey>>,
    pub bone_positions: Vec<[f32; 3]>,
    pub bone_rotations: Vec<[f32; 4]>,
    pub bone_scales: Vec<[f32; 3]>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub key: NodeKey,
    pub name: String,
    pub editable: bool,
    pub active: bool,
    pub layer: LodLayer,
    pub transform: Transform,
    pub component: Component,
    pub rig: Option<CharacterRig>,
    pub children: Vec<GraphNode>,
}

impl GraphNode {
    pub fn new(key: NodeKey, name: impl Into<String>) -> Self {
        Self {
            key,
            name: name.into(),
            editable: false,
            active: true,
            layer: LodLayer::Default,
            transform: Transform::default(),
            component: Component::None,
            rig: None,
            children: Vec::new(),
        }
    }

    pub fn with_component(mut self, component: Component) -> Self {
        self.component = component;
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn editable(mut self, editable: bool) -> Self {
        self.editable = editable;
        self
    }

    pub fn on_layer(mut self, layer: LodLayer) -> Self {
        self.layer = layer;
        self
    }

    pub fn with_child(mut self, child: GraphNode) -> Self {
        self.children.push(child);
        self
    }

    /// Depth-first walk in sibling order, the node itself first.
    pub fn walk(&self) -> Vec<&GraphNode> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(node.children.iter().rev());
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneGraph {
    pub header: SceneHeader,
    pub root: GraphNode,
}

impl SceneGraph {
    pub fn new(header: SceneHeader, root: GraphNode) -> Self {
        Self { header, root }
    }

    pub fn node_count(&self) -> usize {
        self.root.walk().len()
    }

    pub fn find(&self, key: NodeKey) -> Option<&GraphNode> {
        self.root.walk().into_iter().find(|node| node.key == key)
    }
}
