use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::graph::{
    CharacterRig, Component, GeoComponent, GraphNode, LodFilter, MaterialAsset, NodeKey,
    SceneGraph,
};
use crate::model::{
    CharacterPackage, GeoNode, MAX_BIND_POSES, MAX_SKIN_BONES, MaterialPackage, NodeKind,
    ObjectPackage, SceneData, SceneNode, SkinnedGeoNode, TexturePackage,
};

/// Row-major 4x4 identity, used for bones that come without a bind pose.
const IDENTITY_POSE: [f32; 16] = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0,
];

/// Deduplicates shared assets by `Arc` identity, handing out dense ids.
struct Interner<T> {
    index: HashMap<*const T, i32>,
}

impl<T> Interner<T> {
    fn new() -> Self {
        Self {
            index: HashMap::new(),
        }
    }

    fn lookup(&self, asset: &Arc<T>) -> Option<i32> {
        self.index.get(&Arc::as_ptr(asset)).copied()
    }

    fn insert(&mut self, asset: &Arc<T>, id: i32) {
        self.index.insert(Arc::as_ptr(asset), id);
    }
}

/// Flattens a [`SceneGraph`] into [`SceneData`].
///
/// Nodes are visited depth-first in sibling order. The root is always
/// included; any other node only when it is active and its layer passes the
/// [`LodFilter`]. Excluded subtrees vanish completely and references into
/// them become `-1`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SceneParser {
    filter: LodFilter,
}

struct ParseState {
    data: SceneData,
    keys: HashMap<NodeKey, i32>,
    meshes: Interner<ObjectPackage>,
    textures: Interner<TexturePackage>,
    materials: Interner<MaterialAsset>,
}

impl SceneParser {
    pub fn new(filter: LodFilter) -> Self {
        Self { filter }
    }

    pub fn filter(&self) -> LodFilter {
        self.filter
    }

    pub fn parse(&self, graph: &SceneGraph) -> SceneData {
        let mut visited = Vec::new();
        self.collect(&graph.root, &mut visited);

        let keys = visited
            .iter()
            .enumerate()
            .map(|(index, (node, _))| (node.key, index as i32))
            .collect();

        let mut state = ParseState {
            data: SceneData {
                header: graph.header,
                ..SceneData::default()
            },
            keys,
            meshes: Interner::new(),
            textures: Interner::new(),
            materials: Interner::new(),
        };

        for (index, (node, child_count)) in visited.iter().enumerate() {
            let kind = state.node_kind(node);
            state.data.nodes.push(SceneNode {
                name: node.name.clone(),
                editable: node.editable,
                child_count: *child_count,
                transform: node.transform,
                kind,
            });
            if let Some(rig) = &node.rig {
                let character = state.character(index as i32, rig);
                state.data.characters.push(character);
            }
        }

        debug!(
            nodes = state.data.nodes.len(),
            objects = state.data.objects.len(),
            textures = state.data.textures.len(),
            materials = state.data.materials.len(),
            characters = state.data.characters.len(),
            "scene parsed"
        );
        state.data
    }

    fn collect<'g>(&self, node: &'g GraphNode, out: &mut Vec<(&'g GraphNode, usize)>) {
        let slot = out.len();
        out.push((node, 0));
        let mut included = 0;
        for child in &node.children {
            if child.active && self.filter.allows(child.layer) {
                self.collect(child, out);
                included += 1;
            }
        }
        out[slot].1 = included;
    }
}

impl ParseState {
    fn resolve(&self, key: Option<NodeKey>) -> i32 {
        key.and_then(|key| self.keys.get(&key).copied())
            .unwrap_or(-1)
    }

    fn node_kind(&mut self, node: &GraphNode) -> NodeKind {
        match &node.component {
            Component::None => NodeKind::Group,
            Component::Mocap => NodeKind::Mocap,
            Component::Light(light) => NodeKind::Light(*light),
            Component::Camera(camera) => NodeKind::Camera(*camera),
            Component::Geo(geo) => NodeKind::Geo(self.geo(geo)),
            Component::SkinnedGeo(skinned) => {
                let slots = skinned.bones.len().min(MAX_SKIN_BONES).min(MAX_BIND_POSES);
                if slots != skinned.bones.len() || slots != skinned.bind_poses.len() {
                    warn!(
                        node = %node.name,
                        bones = skinned.bones.len(),
                        bind_poses = skinned.bind_poses.len(),
                        slots,
                        "skinned mesh bones and bind poses disagree"
                    );
                }
                let bind_poses = (0..slots)
                    .map(|slot| skinned.bind_poses.get(slot).copied().unwrap_or(IDENTITY_POSE))
                    .collect();
                NodeKind::SkinnedGeo(SkinnedGeoNode {
                    geo: self.geo(&skinned.geo),
                    root_bone_id: self.resolve(skinned.root_bone),
                    bound_extents: skinned.bound_extents,
                    bound_center: skinned.bound_center,
                    bind_poses,
                    bone_ids: skinned.bones[..slots]
                        .iter()
                        .map(|bone| self.resolve(*bone))
                        .collect(),
                })
            }
        }
    }

    fn geo(&mut self, geo: &GeoComponent) -> GeoNode {
        GeoNode {
            geo_id: geo.mesh.as_ref().map_or(-1, |mesh| self.mesh(mesh)),
            texture_id: geo.texture.as_ref().map_or(-1, |tex| self.texture(tex)),
            material_id: geo.material.as_ref().map_or(-1, |mat| self.material(mat)),
            roughness: geo.roughness,
            color: geo.color,
        }
    }

    fn mesh(&mut self, mesh: &Arc<ObjectPackage>) -> i32 {
        if let Some(id) = self.meshes.lookup(mesh) {
            return id;
        }
        let id = self.data.objects.len() as i32;
        self.data.objects.push(ObjectPackage::clone(mesh));
        self.meshes.insert(mesh, id);
        id
    }

    fn texture(&mut self, texture: &Arc<TexturePackage>) -> i32 {
        if let Some(id) = self.textures.lookup(texture) {
            return id;
        }
        let id = self.data.textures.len() as i32;
        self.data.textures.push(TexturePackage::clone(texture));
        self.textures.insert(texture, id);
        id
    }

    fn material(&mut self, material: &Arc<MaterialAsset>) -> i32 {
        if let Some(id) = self.materials.lookup(material) {
            return id;
        }
        let texture_ids = material
            .textures
            .iter()
            .map(|slot| self.texture(&slot.texture))
            .collect();
        let id = self.data.materials.len() as i32;
        self.data.materials.push(MaterialPackage {
            kind: material.kind,
            name: material.name.clone(),
            src: material.src.clone(),
            material_id: material.material_id,
            texture_ids,
            texture_offsets: material.textures.iter().map(|slot| slot.offset).collect(),
            texture_scales: material.textures.iter().map(|slot| slot.scale).collect(),
            shader_config: material.shader_config.clone(),
            shader_property_ids: material.shader_property_ids.clone(),
            shader_property_types: material.shader_property_types.clone(),
            shader_properties: material.shader_properties.clone(),
        });
        self.materials.insert(material, id);
        id
    }

    fn character(&self, node_index: i32, rig: &CharacterRig) -> CharacterPackage {
        CharacterPackage {
            scene_object_id: node_index,
            root_id: self.resolve(rig.root),
            bone_mapping: rig.bone_mapping.iter().map(|k| self.resolve(*k)).collect(),
            skeleton_mapping: rig.skeleton_mapping.iter().map(|k| self.resolve(*k)).collect(),
            bone_positions: rig.bone_positions.clone(),
            bone_rotations: rig.bone_rotations.clone(),
            bone_scales: rig.bone_scales.clone(),
            name: rig.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{LodLayer, SkinnedGeoComponent};
    use crate::model::SceneHeader;

    fn shared_mesh() -> Arc<ObjectPackage> {
        Arc::new(ObjectPackage {
            vertices: vec![[0.0; 3]; 3],
            indices: vec![0, 1, 2],
            ..ObjectPackage::default()
        })
    }

    #[test]
    fn shared_assets_are_encoded_once() {
        let mesh = shared_mesh();
        let other = shared_mesh();
        let geo = |mesh: &Arc<ObjectPackage>| {
            Component::Geo(GeoComponent {
                mesh: Some(Arc::clone(mesh)),
                ..GeoComponent::default()
            })
        };
        let root = GraphNode::new(NodeKey(0), "root")
            .with_child(GraphNode::new(NodeKey(1), "a").with_component(geo(&mesh)))
            .with_child(GraphNode::new(NodeKey(2), "b").with_component(geo(&mesh)))
            .with_child(GraphNode::new(NodeKey(3), "c").with_component(geo(&other)));

        let data = SceneParser::default().parse(&SceneGraph::new(SceneHeader::default(), root));
        assert_eq!(data.objects.len(), 2);
        let ids: Vec<i32> = data.nodes[1..]
            .iter()
            .map(|n| match &n.kind {
                NodeKind::Geo(g) => g.geo_id,
                _ => -2,
            })
            .collect();
        assert_eq!(ids, [0, 0, 1]);
    }

    #[test]
    fn filtered_subtrees_are_dropped_and_references_cleared() {
        let root = GraphNode::new(NodeKey(0), "root")
            .with_child(
                GraphNode::new(NodeKey(1), "low")
                    .on_layer(LodLayer::LodLow)
                    .with_child(GraphNode::new(NodeKey(2), "low-child")),
            )
            .with_child(GraphNode::new(NodeKey(3), "skin").with_component(
                Component::SkinnedGeo(SkinnedGeoComponent {
                    root_bone: Some(NodeKey(2)),
                    bones: vec![Some(NodeKey(0)), Some(NodeKey(1))],
                    ..SkinnedGeoComponent::default()
                }),
            ));

        let data = SceneParser::default().parse(&SceneGraph::new(SceneHeader::default(), root));
        let names: Vec<_> = data.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, ["root", "skin"]);
        assert_eq!(data.nodes[0].child_count, 1);
        match &data.nodes[1].kind {
            NodeKind::SkinnedGeo(skin) => {
                assert_eq!(skin.root_bone_id, -1);
                assert_eq!(skin.bone_ids, [0, -1]);
                assert_eq!(skin.bind_poses, [IDENTITY_POSE; 2]);
            }
            other => panic!("unexpected kind {other:?}"),
        }
        data.validate().unwrap();
    }

    #[test]
    fn inactive_children_are_skipped() {
        let mut hidden = GraphNode::new(NodeKey(1), "hidden");
        hidden.active = false;
        let root = GraphNode::new(NodeKey(0), "root").with_child(hidden);
        let data = SceneParser::new(LodFilter::ALL)
            .parse(&SceneGraph::new(SceneHeader::default(), root));
        assert_eq!(data.nodes.len(), 1);
        assert_eq!(data.nodes[0].child_count, 0);
    }
}
