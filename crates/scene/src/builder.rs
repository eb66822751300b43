use std::sync::Arc;

use crate::error::SceneError;
use crate::graph::{
    CharacterRig, Component, GeoComponent, GraphNode, MaterialAsset, MaterialTexture, NodeKey,
    SceneGraph, SkinnedGeoComponent,
};
use crate::model::{BlobKind, GeoNode, NodeKind, SceneData, SceneNode};

struct Assets {
    meshes: Vec<Arc<crate::model::ObjectPackage>>,
    textures: Vec<Arc<crate::model::TexturePackage>>,
    materials: Vec<Arc<MaterialAsset>>,
}

fn pick<T>(items: &[Arc<T>], id: i32) -> Option<Arc<T>> {
    usize::try_from(id).ok().and_then(|i| items.get(i)).cloned()
}

fn key(id: i32) -> Option<NodeKey> {
    u32::try_from(id).ok().map(NodeKey)
}

/// Rebuilds the node hierarchy from a flat [`SceneData`].
///
/// Node `i` gets `NodeKey(i)`; assets are shared so that parsing the result
/// again reproduces the same package lists. Fails with `CorruptSceneData`
/// when references or child counts are inconsistent.
pub fn build_graph(data: &SceneData) -> Result<SceneGraph, SceneError> {
    data.validate()?;

    let textures: Vec<_> = data.textures.iter().cloned().map(Arc::new).collect();
    let assets = Assets {
        meshes: data.objects.iter().cloned().map(Arc::new).collect(),
        materials: data
            .materials
            .iter()
            .map(|material| {
                let slots = material
                    .texture_ids
                    .iter()
                    .zip(&material.texture_offsets)
                    .zip(&material.texture_scales)
                    .filter_map(|((id, offset), scale)| {
                        pick(&textures, *id).map(|texture| MaterialTexture {
                            texture,
                            offset: *offset,
                            scale: *scale,
                        })
                    })
                    .collect();
                Arc::new(MaterialAsset {
                    kind: material.kind,
                    name: material.name.clone(),
                    src: material.src.clone(),
                    material_id: material.material_id,
                    textures: slots,
                    shader_config: material.shader_config.clone(),
                    shader_property_ids: material.shader_property_ids.clone(),
                    shader_property_types: material.shader_property_types.clone(),
                    shader_properties: material.shader_properties.clone(),
                })
            })
            .collect(),
        textures,
    };

    let mut rigs: Vec<Option<CharacterRig>> = vec![None; data.nodes.len()];
    for character in &data.characters {
        if let Some(slot) = usize::try_from(character.scene_object_id)
            .ok()
            .and_then(|i| rigs.get_mut(i))
        {
            *slot = Some(CharacterRig {
                name: character.name.clone(),
                root: key(character.root_id),
                bone_mapping: character.bone_mapping.iter().map(|id| key(*id)).collect(),
                skeleton_mapping: character.skeleton_mapping.iter().map(|id| key(*id)).collect(),
                bone_positions: character.bone_positions.clone(),
                bone_rotations: character.bone_rotations.clone(),
                bone_scales: character.bone_scales.clone(),
            });
        }
    }

    // (node, children still to attach)
    let mut open: Vec<(GraphNode, usize)> = Vec::new();
    let mut root = None;

    for (index, (node, rig)) in data.nodes.iter().zip(rigs).enumerate() {
        if root.is_some() {
            return Err(SceneError::corrupt(
                BlobKind::Nodes,
                format!("node {index} follows a completed root"),
            ));
        }
        let mut graph_node = graph_node(index, node, &assets);
        graph_node.rig = rig;
        open.push((graph_node, node.child_count));

        while open.last().is_some_and(|(_, pending)| *pending == 0) {
            let Some((done, _)) = open.pop() else { break };
            match open.last_mut() {
                Some((parent, pending)) => {
                    parent.children.push(done);
                    *pending -= 1;
                }
                None => root = Some(done),
            }
        }
    }

    let root = root.ok_or_else(|| {
        SceneError::corrupt(BlobKind::Nodes, "node list does not form a complete tree")
    })?;
    Ok(SceneGraph::new(data.header, root))
}

fn graph_node(index: usize, node: &SceneNode, assets: &Assets) -> GraphNode {
    let geo = |geo: &GeoNode| GeoComponent {
        mesh: pick(&assets.meshes, geo.geo_id),
        texture: pick(&assets.textures, geo.texture_id),
        material: pick(&assets.materials, geo.material_id),
        roughness: geo.roughness,
        color: geo.color,
    };

    let component = match &node.kind {
        NodeKind::Group => Component::None,
        NodeKind::Mocap => Component::Mocap,
        NodeKind::Light(light) => Component::Light(*light),
        NodeKind::Camera(camera) => Component::Camera(*camera),
        NodeKind::Geo(g) => Component::Geo(geo(g)),
        NodeKind::SkinnedGeo(skinned) => Component::SkinnedGeo(SkinnedGeoComponent {
            geo: geo(&skinned.geo),
            root_bone: key(skinned.root_bone_id),
            bones: skinned.bone_ids.iter().map(|id| key(*id)).collect(),
            bind_poses: skinned.bind_poses.clone(),
            bound_extents: skinned.bound_extents,
            bound_center: skinned.bound_center,
        }),
    };

    GraphNode::new(NodeKey(index as u32), node.name.clone())
        .editable(node.editable)
        .with_transform(node.transform)
        .with_component(component)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SceneHeader, Transform};

    fn group(name: &str, child_count: usize) -> SceneNode {
        SceneNode {
            name: name.into(),
            editable: false,
            child_count,
            transform: Transform::default(),
            kind: NodeKind::Group,
        }
    }

    #[test]
    fn rebuilds_nested_hierarchy() {
        let data = SceneData {
            header: SceneHeader::default(),
            nodes: vec![group("root", 2), group("a", 1), group("a1", 0), group("b", 0)],
            ..SceneData::default()
        };
        let graph = build_graph(&data).unwrap();
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.root.children.len(), 2);
        assert_eq!(graph.root.children[0].children[0].name, "a1");
        assert_eq!(graph.root.children[1].key, NodeKey(3));
    }

    #[test]
    fn rejects_forest() {
        let data = SceneData {
            nodes: vec![group("root", 0), group("stray", 0)],
            ..SceneData::default()
        };
        assert!(build_graph(&data).unwrap_err().is_corrupt());
    }

    #[test]
    fn empty_scene_has_no_root() {
        assert!(build_graph(&SceneData::default()).is_err());
    }
}
