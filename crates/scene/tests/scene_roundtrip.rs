use std::sync::Arc;

use scene::{
    BlobKind, CameraNode, CharacterRig, ChangeOrigin, Component, GeoComponent, GeoNode, GraphNode,
    LightNode, LightType, LodFilter, LodLayer, MAX_BIND_POSES, MAX_SKIN_BONES, MaterialAsset,
    MaterialTexture, NodeKey, NodeKind, ObjectPackage, ParameterValue, SceneData, SceneGraph,
    SceneHeader, SceneManager, SceneNode, SceneParser, SceneStorage, SkinnedGeoComponent,
    SkinnedGeoNode, TexturePackage, Transform, build_graph, param_ids,
};

fn stage() -> SceneGraph {
    let mesh = Arc::new(ObjectPackage {
        vertices: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        indices: vec![0, 1, 2],
        normals: vec![[0.0, 0.0, 1.0]; 3],
        uvs: vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]],
        bone_weights: vec![[1.0, 0.0, 0.0, 0.0]; 3],
        bone_indices: vec![[0, 0, 0, 0]; 3],
    });
    let albedo = Arc::new(TexturePackage {
        width: 2,
        height: 2,
        format: 4,
        data: vec![0xff; 16],
    });
    let material = Arc::new(MaterialAsset {
        kind: 1,
        name: "Standard".into(),
        src: "Standard".into(),
        material_id: 7,
        textures: vec![MaterialTexture {
            texture: Arc::clone(&albedo),
            offset: [0.0, 0.0],
            scale: [1.0, 1.0],
        }],
        shader_config: vec![true, false],
        shader_property_ids: vec![3],
        shader_property_types: vec![2],
        shader_properties: vec![0, 0, 128, 63],
    });

    let geo = GeoComponent {
        mesh: Some(Arc::clone(&mesh)),
        texture: Some(Arc::clone(&albedo)),
        material: Some(Arc::clone(&material)),
        roughness: 0.3,
        color: [0.5, 0.5, 0.5, 1.0],
    };

    let mut character = GraphNode::new(NodeKey(10), "character")
        .editable(true)
        .with_child(
            GraphNode::new(NodeKey(11), "hips").with_child(GraphNode::new(NodeKey(12), "spine")),
        )
        .with_child(GraphNode::new(NodeKey(13), "body").with_component(Component::SkinnedGeo(
            SkinnedGeoComponent {
                geo: geo.clone(),
                root_bone: Some(NodeKey(11)),
                bones: vec![Some(NodeKey(11)), Some(NodeKey(12))],
                bind_poses: vec![[1.0; 16]; 2],
                bound_extents: [1.0, 2.0, 1.0],
                bound_center: [0.0, 1.0, 0.0],
            },
        )));
    character.rig = Some(CharacterRig {
        name: "hero".into(),
        root: Some(NodeKey(11)),
        bone_mapping: vec![Some(NodeKey(11)), Some(NodeKey(12))],
        skeleton_mapping: vec![Some(NodeKey(11)), Some(NodeKey(12))],
        bone_positions: vec![[0.0; 3]; 2],
        bone_rotations: vec![[0.0, 0.0, 0.0, 1.0]; 2],
        bone_scales: vec![[1.0; 3]; 2],
    });

    let root = GraphNode::new(NodeKey(0), "stage")
        .with_child(
            GraphNode::new(NodeKey(1), "table")
                .editable(true)
                .with_transform(Transform {
                    position: [1.0, 0.0, -2.0],
                    ..Transform::default()
                })
                .with_component(Component::Geo(geo.clone())),
        )
        .with_child(
            GraphNode::new(NodeKey(2), "table-proxy")
                .on_layer(LodLayer::LodLow)
                .with_component(Component::Geo(geo)),
        )
        .with_child(
            GraphNode::new(NodeKey(3), "key light").with_component(Component::Light(LightNode {
                light_type: LightType::Spot,
                intensity: 3.0,
                angle: 35.0,
                range: 12.0,
                color: [1.0, 0.9, 0.8],
            })),
        )
        .with_child(
            GraphNode::new(NodeKey(4), "shot cam").with_component(Component::Camera(CameraNode {
                fov: 45.0,
                near: 0.1,
                far: 500.0,
            })),
        )
        .with_child(character);

    SceneGraph::new(
        SceneHeader {
            light_intensity_factor: 1.0,
            texture_binary_type: 0,
            sender_id: 254,
            frame_rate: 60,
        },
        root,
    )
}

#[test]
fn parse_encode_decode_build_is_a_fixed_point() {
    let parser = SceneParser::new(LodFilter::default());
    let data = parser.parse(&stage());

    assert_eq!(data.nodes.len(), 8);
    assert_eq!(data.objects.len(), 1);
    assert_eq!(data.textures.len(), 1);
    assert_eq!(data.materials.len(), 1);
    assert_eq!(data.characters.len(), 1);

    let blobs = data.encode();
    let decoded = SceneData::decode(&blobs).unwrap();
    assert_eq!(decoded, data);

    let rebuilt = build_graph(&decoded).unwrap();
    let reparsed = parser.parse(&rebuilt);
    assert_eq!(reparsed, data);
    assert_eq!(reparsed.encode(), blobs);
}

#[test]
fn skinned_mesh_with_filtered_last_bone_survives_the_wire() {
    let root = GraphNode::new(NodeKey(0), "rig")
        .with_child(GraphNode::new(NodeKey(1), "skin").with_component(Component::SkinnedGeo(
            SkinnedGeoComponent {
                root_bone: Some(NodeKey(0)),
                bones: vec![Some(NodeKey(0)), Some(NodeKey(2))],
                bind_poses: vec![[1.0; 16]; 2],
                ..SkinnedGeoComponent::default()
            },
        )))
        .with_child(GraphNode::new(NodeKey(2), "proxy bone").on_layer(LodLayer::LodLow));

    let data = SceneParser::default().parse(&SceneGraph::new(SceneHeader::default(), root));
    match &data.nodes[1].kind {
        NodeKind::SkinnedGeo(skin) => assert_eq!(skin.bone_ids, [0, -1]),
        other => panic!("unexpected kind {other:?}"),
    }
    assert_eq!(SceneData::decode(&data.encode()).unwrap(), data);
}

#[test]
fn skinned_mesh_with_every_bone_slot_used_survives_the_wire() {
    let mut bone_ids: Vec<i32> = (0..MAX_SKIN_BONES as i32).map(|slot| slot % 2).collect();
    bone_ids[MAX_SKIN_BONES - 1] = -1;
    let node = |name: &str, child_count, kind| SceneNode {
        name: String::from(name),
        editable: false,
        child_count,
        transform: Transform::default(),
        kind,
    };
    let data = SceneData {
        nodes: vec![
            node("rig", 1, NodeKind::Group),
            node(
                "skin",
                0,
                NodeKind::SkinnedGeo(SkinnedGeoNode {
                    geo: GeoNode::default(),
                    root_bone_id: 0,
                    bound_extents: [1.0; 3],
                    bound_center: [0.0; 3],
                    bind_poses: vec![[0.25; 16]; MAX_BIND_POSES],
                    bone_ids,
                }),
            ),
        ],
        ..SceneData::default()
    };
    data.validate().unwrap();
    assert_eq!(SceneData::decode(&data.encode()).unwrap(), data);
}

#[test]
fn every_truncated_blob_is_rejected() {
    let blobs = SceneParser::default().parse(&stage()).encode();
    for kind in BlobKind::ALL {
        let full = blobs.get(kind).clone();
        let mut broken = blobs.clone();
        broken.set(kind, full.slice(..full.len() - 1));
        let err = SceneData::decode(&broken).unwrap_err();
        assert!(err.is_corrupt(), "{kind}: {err}");
    }
}

#[test]
fn stored_scene_loads_into_manager() {
    let dir = tempfile::tempdir().unwrap();
    let storage = SceneStorage::new(dir.path());
    let data = SceneParser::default().parse(&stage());
    storage.save("stage", &data.encode()).unwrap();

    let manager = SceneManager::new(100);
    let scene = manager.load_blobs(storage.load("stage").unwrap()).unwrap();
    assert_eq!(scene.data, data);

    let names: Vec<_> = scene
        .registry
        .iter()
        .map(|o| (o.id(), o.name().to_owned()))
        .collect();
    assert_eq!(
        names,
        [
            (1, "table".to_owned()),
            (2, "key light".to_owned()),
            (3, "shot cam".to_owned()),
            (4, "character".to_owned()),
        ]
    );

    let table = manager.object(1).unwrap();
    assert_eq!(
        table.parameter(param_ids::POSITION).unwrap().value(),
        ParameterValue::Vector3([1.0, 0.0, -2.0])
    );
    let spot = manager.object(2).unwrap();
    assert_eq!(
        spot.parameter(param_ids::LIGHT_SPOT_ANGLE).unwrap().value(),
        ParameterValue::Float(35.0)
    );

    table
        .parameter(param_ids::POSITION)
        .unwrap()
        .set(ParameterValue::Vector3([0.0; 3]), ChangeOrigin::Local)
        .unwrap();
    manager.reset_scene();
    assert_eq!(
        table.parameter(param_ids::POSITION).unwrap().value(),
        ParameterValue::Vector3([1.0, 0.0, -2.0])
    );
}
