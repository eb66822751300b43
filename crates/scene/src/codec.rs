//! Six-blob binary codec for [`SceneData`].
//!
//! Fields are written one by one in a fixed order with explicit widths
//! (little-endian `i32`/`f32`, single-byte flags, fixed ASCII buffers).
//! Nothing relies on in-memory layout.

use crate::error::SceneError;
use crate::model::*;
use crate::wire::{BlobReader, BlobWriter};

impl SceneData {
    /// Serializes the scene into its six blobs.
    pub fn encode(&self) -> SceneBlobs {
        SceneBlobs {
            header: encode_header(&self.header),
            nodes: encode_nodes(&self.nodes),
            objects: encode_objects(&self.objects),
            characters: encode_characters(&self.characters),
            textures: encode_textures(&self.textures),
            materials: encode_materials(&self.materials),
        }
    }

    /// Decodes and validates all six blobs.
    ///
    /// Fails with [`SceneError::CorruptSceneData`] on truncation, trailing
    /// bytes, impossible counts or dangling references.
    pub fn decode(blobs: &SceneBlobs) -> Result<Self, SceneError> {
        let data = SceneData {
            header: decode_header(&blobs.header)?,
            nodes: decode_nodes(&blobs.nodes)?,
            objects: decode_objects(&blobs.objects)?,
            characters: decode_characters(&blobs.characters)?,
            textures: decode_textures(&blobs.textures)?,
            materials: decode_materials(&blobs.materials)?,
        };
        data.validate()?;
        Ok(data)
    }

    /// Checks every cross reference against the package lengths.
    pub fn validate(&self) -> Result<(), SceneError> {
        let node_count = self.nodes.len();
        let check = |blob: BlobKind, what: &str, id: i32, len: usize| -> Result<(), SceneError> {
            if id == -1 || (id >= 0 && (id as usize) < len) {
                Ok(())
            } else {
                Err(SceneError::corrupt(
                    blob,
                    format!("{what} {id} out of range (0..{len})"),
                ))
            }
        };

        for (index, node) in self.nodes.iter().enumerate() {
            let geo = match &node.kind {
                NodeKind::Geo(geo) => Some(geo),
                NodeKind::SkinnedGeo(skinned) => {
                    // the record carries a single count for both slot arrays
                    let bones = skinned.bone_ids.len();
                    if bones != skinned.bind_poses.len() || bones > MAX_SKIN_BONES {
                        return Err(SceneError::corrupt(
                            BlobKind::Nodes,
                            format!(
                                "node {index} has {bones} bone ids for {} bind poses",
                                skinned.bind_poses.len()
                            ),
                        ));
                    }
                    check(BlobKind::Nodes, "root bone", skinned.root_bone_id, node_count)?;
                    for bone in &skinned.bone_ids {
                        check(BlobKind::Nodes, "bone id", *bone, node_count)?;
                    }
                    Some(&skinned.geo)
                }
                _ => None,
            };
            if let Some(geo) = geo {
                check(BlobKind::Nodes, "geo id", geo.geo_id, self.objects.len())?;
                check(BlobKind::Nodes, "texture id", geo.texture_id, self.textures.len())?;
                check(BlobKind::Nodes, "material id", geo.material_id, self.materials.len())?;
            }
            if node.child_count >= node_count.saturating_sub(index) {
                return Err(SceneError::corrupt(
                    BlobKind::Nodes,
                    format!("node {index} claims {} children", node.child_count),
                ));
            }
        }
        check_tree(&self.nodes)?;

        for (index, object) in self.objects.iter().enumerate() {
            let vertex_count = object.vertices.len();
            if let Some(bad) = object
                .indices
                .iter()
                .find(|i| **i < 0 || **i as usize >= vertex_count)
            {
                return Err(SceneError::corrupt(
                    BlobKind::Objects,
                    format!("mesh {index} index {bad} past {vertex_count} vertices"),
                ));
            }
        }

        for character in &self.characters {
            check(BlobKind::Characters, "character node", character.scene_object_id, node_count)?;
            check(BlobKind::Characters, "character root", character.root_id, node_count)?;
            for id in character.bone_mapping.iter().chain(&character.skeleton_mapping) {
                check(BlobKind::Characters, "bone node", *id, node_count)?;
            }
        }

        for material in &self.materials {
            for id in &material.texture_ids {
                check(BlobKind::Materials, "material texture", *id, self.textures.len())?;
            }
        }

        Ok(())
    }
}

/// Child counts must describe exactly one depth-first tree covering every node.
fn check_tree(nodes: &[SceneNode]) -> Result<(), SceneError> {
    if nodes.is_empty() {
        return Ok(());
    }
    let mut pending: Vec<usize> = Vec::new();
    for (index, node) in nodes.iter().enumerate() {
        if index > 0 {
            match pending.last_mut() {
                Some(open) => *open -= 1,
                None => {
                    return Err(SceneError::corrupt(
                        BlobKind::Nodes,
                        format!("node {index} lies outside the root's subtree"),
                    ));
                }
            }
        }
        pending.push(node.child_count);
        while pending.last() == Some(&0) {
            pending.pop();
        }
    }
    if pending.is_empty() {
        Ok(())
    } else {
        Err(SceneError::corrupt(
            BlobKind::Nodes,
            "child counts exceed the node list",
        ))
    }
}

fn encode_header(header: &SceneHeader) -> bytes::Bytes {
    let mut w = BlobWriter::new();
    w.u8(HEADER_VERSION);
    w.f32(header.light_intensity_factor);
    w.i32(header.texture_binary_type);
    w.u8(header.sender_id);
    w.u8(header.frame_rate);
    w.finish()
}

fn decode_header(blob: &[u8]) -> Result<SceneHeader, SceneError> {
    let mut r = BlobReader::new(BlobKind::Header, blob);
    let version = r.u8("header version")?;
    if version != HEADER_VERSION {
        return Err(SceneError::UnsupportedHeaderVersion {
            found: version,
            expected: HEADER_VERSION,
        });
    }
    let header = SceneHeader {
        light_intensity_factor: r.f32("light intensity factor")?,
        texture_binary_type: r.i32("texture binary type")?,
        sender_id: r.u8("sender id")?,
        frame_rate: r.u8("frame rate")?,
    };
    r.expect_end()?;
    Ok(header)
}

fn encode_geo(w: &mut BlobWriter, geo: &GeoNode) {
    w.i32(geo.geo_id);
    w.i32(geo.texture_id);
    w.i32(geo.material_id);
    w.f32(geo.roughness);
    w.f32s(&geo.color);
}

fn decode_geo(r: &mut BlobReader<'_>) -> Result<GeoNode, SceneError> {
    Ok(GeoNode {
        geo_id: r.i32("geo id")?,
        texture_id: r.i32("texture id")?,
        material_id: r.i32("material id")?,
        roughness: r.f32("roughness")?,
        color: r.f32_array("color")?,
    })
}

fn encode_nodes(nodes: &[SceneNode]) -> bytes::Bytes {
    let mut w = BlobWriter::new();
    for node in nodes {
        w.i32(node.kind.node_type() as i32);
        w.bool(node.editable);
        w.count(node.child_count);
        w.f32s(&node.transform.position);
        w.f32s(&node.transform.scale);
        w.f32s(&node.transform.rotation);
        w.fixed_ascii(&node.name, NODE_NAME_LEN);

        match &node.kind {
            NodeKind::Group | NodeKind::Mocap => {}
            NodeKind::Geo(geo) => encode_geo(&mut w, geo),
            NodeKind::SkinnedGeo(skinned) => {
                encode_geo(&mut w, &skinned.geo);
                let poses = skinned.bind_poses.len().min(MAX_BIND_POSES);
                w.count(poses);
                w.i32(skinned.root_bone_id);
                w.f32s(&skinned.bound_extents);
                w.f32s(&skinned.bound_center);
                for slot in 0..MAX_BIND_POSES {
                    match skinned.bind_poses.get(slot) {
                        Some(pose) if slot < poses => w.f32s(pose),
                        _ => w.f32s(&[0.0; 16]),
                    }
                }
                for slot in 0..MAX_SKIN_BONES {
                    w.i32(skinned.bone_ids.get(slot).copied().unwrap_or(-1));
                }
            }
            NodeKind::Light(light) => {
                w.i32(light.light_type as i32);
                w.f32(light.intensity);
                w.f32(light.angle);
                w.f32(light.range);
                w.f32s(&light.color);
            }
            NodeKind::Camera(camera) => {
                w.f32(camera.fov);
                w.f32(camera.near);
                w.f32(camera.far);
            }
        }
    }
    w.finish()
}

fn decode_nodes(blob: &[u8]) -> Result<Vec<SceneNode>, SceneError> {
    let mut r = BlobReader::new(BlobKind::Nodes, blob);
    let mut nodes = Vec::new();

    while !r.is_empty() {
        let raw_type = r.i32("node type")?;
        let node_type = NodeType::from_i32(raw_type)
            .ok_or_else(|| r.corrupt(format!("unknown node type {raw_type}")))?;
        let editable = r.bool("editable")?;
        let raw_children = r.i32("child count")?;
        let child_count = usize::try_from(raw_children)
            .map_err(|_| r.corrupt(format!("negative child count {raw_children}")))?;
        let position = r.f32_array("position")?;
        let scale = r.f32_array("scale")?;
        let rotation = r.f32_array("rotation")?;
        let name = r.fixed_ascii(NODE_NAME_LEN, "node name")?;

        let kind = match node_type {
            NodeType::Group => NodeKind::Group,
            NodeType::Mocap => NodeKind::Mocap,
            NodeType::Geo => NodeKind::Geo(decode_geo(&mut r)?),
            NodeType::SkinnedMesh => {
                let geo = decode_geo(&mut r)?;
                let raw_len = r.i32("bind pose length")?;
                let pose_len = usize::try_from(raw_len)
                    .ok()
                    .filter(|len| *len <= MAX_BIND_POSES)
                    .ok_or_else(|| r.corrupt(format!("bind pose length {raw_len}")))?;
                let root_bone_id = r.i32("root bone id")?;
                let bound_extents = r.f32_array("bound extents")?;
                let bound_center = r.f32_array("bound center")?;
                let mut bind_poses = r.f32_groups::<16>(MAX_BIND_POSES, "bind poses")?;
                bind_poses.truncate(pose_len);
                // one bone per bind pose; the remaining slots are padding
                let mut bone_ids = r.i32_vec(MAX_SKIN_BONES, "bone ids")?;
                bone_ids.truncate(pose_len);
                NodeKind::SkinnedGeo(SkinnedGeoNode {
                    geo,
                    root_bone_id,
                    bound_extents,
                    bound_center,
                    bind_poses,
                    bone_ids,
                })
            }
            NodeType::Light => {
                let raw_light = r.i32("light type")?;
                let light_type = LightType::from_i32(raw_light)
                    .ok_or_else(|| r.corrupt(format!("unknown light type {raw_light}")))?;
                NodeKind::Light(LightNode {
                    light_type,
                    intensity: r.f32("intensity")?,
                    angle: r.f32("angle")?,
                    range: r.f32("range")?,
                    color: r.f32_array("light color")?,
                })
            }
            NodeType::Camera => NodeKind::Camera(CameraNode {
                fov: r.f32("fov")?,
                near: r.f32("near")?,
                far: r.f32("far")?,
            }),
        };

        nodes.push(SceneNode {
            name,
            editable,
            child_count,
            transform: Transform {
                position,
                rotation,
                scale,
            },
            kind,
        });
    }

    Ok(nodes)
}

fn encode_objects(objects: &[ObjectPackage]) -> bytes::Bytes {
    let mut w = BlobWriter::new();
    for object in objects {
        w.count(object.vertices.len());
        object.vertices.iter().for_each(|v| w.f32s(v));
        w.count(object.indices.len());
        w.i32s(&object.indices);
        w.count(object.normals.len());
        object.normals.iter().for_each(|n| w.f32s(n));
        w.count(object.uvs.len());
        object.uvs.iter().for_each(|uv| w.f32s(uv));
        let weights = object.bone_weights.len().min(object.bone_indices.len());
        w.count(weights);
        object.bone_weights[..weights].iter().for_each(|bw| w.f32s(bw));
        object.bone_indices[..weights].iter().for_each(|bi| w.i32s(bi));
    }
    w.finish()
}

fn decode_objects(blob: &[u8]) -> Result<Vec<ObjectPackage>, SceneError> {
    let mut r = BlobReader::new(BlobKind::Objects, blob);
    let mut objects = Vec::new();

    while !r.is_empty() {
        let v = r.count("vertex", 12)?;
        let vertices = r.f32_groups::<3>(v, "vertices")?;
        let i = r.count("index", 4)?;
        let indices = r.i32_vec(i, "indices")?;
        let n = r.count("normal", 12)?;
        let normals = r.f32_groups::<3>(n, "normals")?;
        let uv = r.count("uv", 8)?;
        let uvs = r.f32_groups::<2>(uv, "uvs")?;
        let bw = r.count("bone weight", 32)?;
        let bone_weights = r.f32_groups::<4>(bw, "bone weights")?;
        let bone_indices = r.i32_groups::<4>(bw, "bone indices")?;

        objects.push(ObjectPackage {
            vertices,
            indices,
            normals,
            uvs,
            bone_weights,
            bone_indices,
        });
    }

    Ok(objects)
}

fn encode_characters(characters: &[CharacterPackage]) -> bytes::Bytes {
    let mut w = BlobWriter::new();
    for character in characters {
        let bones = character
            .skeleton_mapping
            .len()
            .min(character.bone_positions.len())
            .min(character.bone_rotations.len())
            .min(character.bone_scales.len());
        w.count(character.bone_mapping.len());
        w.count(bones);
        w.i32(character.scene_object_id);
        w.i32(character.root_id);
        w.i32s(&character.bone_mapping);
        w.i32s(&character.skeleton_mapping[..bones]);
        character.bone_positions[..bones].iter().for_each(|p| w.f32s(p));
        character.bone_rotations[..bones].iter().for_each(|q| w.f32s(q));
        character.bone_scales[..bones].iter().for_each(|s| w.f32s(s));
        w.fixed_ascii(&character.name, CHARACTER_NAME_LEN);
    }
    w.finish()
}

fn decode_characters(blob: &[u8]) -> Result<Vec<CharacterPackage>, SceneError> {
    let mut r = BlobReader::new(BlobKind::Characters, blob);
    let mut characters = Vec::new();

    while !r.is_empty() {
        let mapping_len = r.count("bone mapping", 0)?;
        let skeleton_len = r.count("skeleton", 0)?;
        let scene_object_id = r.i32("character node")?;
        let root_id = r.i32("character root")?;
        let bone_mapping = r.i32_vec(mapping_len, "bone mapping")?;
        let skeleton_mapping = r.i32_vec(skeleton_len, "skeleton mapping")?;
        let bone_positions = r.f32_groups::<3>(skeleton_len, "bone positions")?;
        let bone_rotations = r.f32_groups::<4>(skeleton_len, "bone rotations")?;
        let bone_scales = r.f32_groups::<3>(skeleton_len, "bone scales")?;
        let name = r.fixed_ascii(CHARACTER_NAME_LEN, "character name")?;

        characters.push(CharacterPackage {
            scene_object_id,
            root_id,
            bone_mapping,
            skeleton_mapping,
            bone_positions,
            bone_rotations,
            bone_scales,
            name,
        });
    }

    Ok(characters)
}

fn encode_textures(textures: &[TexturePackage]) -> bytes::Bytes {
    let mut w = BlobWriter::new();
    for texture in textures {
        w.i32(texture.width);
        w.i32(texture.height);
        w.i32(texture.format);
        w.count(texture.data.len());
        w.bytes(&texture.data);
    }
    w.finish()
}

fn decode_textures(blob: &[u8]) -> Result<Vec<TexturePackage>, SceneError> {
    let mut r = BlobReader::new(BlobKind::Textures, blob);
    let mut textures = Vec::new();

    while !r.is_empty() {
        let width = r.i32("texture width")?;
        let height = r.i32("texture height")?;
        let format = r.i32("texture format")?;
        let size = r.count("texture data", 1)?;
        let data = r.byte_vec(size, "texture data")?;
        textures.push(TexturePackage {
            width,
            height,
            format,
            data,
        });
    }

    Ok(textures)
}

fn encode_materials(materials: &[MaterialPackage]) -> bytes::Bytes {
    let mut w = BlobWriter::new();
    for material in materials {
        let textures = material
            .texture_ids
            .len()
            .min(material.texture_offsets.len())
            .min(material.texture_scales.len());
        let props = material
            .shader_property_ids
            .len()
            .min(material.shader_property_types.len());

        w.i32(material.kind);
        w.prefixed_ascii(&material.name);
        w.prefixed_ascii(&material.src);
        w.i32(material.material_id);
        w.count(textures);
        w.i32s(&material.texture_ids[..textures]);
        material.texture_offsets[..textures].iter().for_each(|o| w.f32s(o));
        material.texture_scales[..textures].iter().for_each(|s| w.f32s(s));
        w.count(material.shader_config.len());
        material.shader_config.iter().for_each(|flag| w.bool(*flag));
        w.count(props);
        w.i32s(&material.shader_property_ids[..props]);
        w.i32s(&material.shader_property_types[..props]);
        w.count(material.shader_properties.len());
        w.bytes(&material.shader_properties);
    }
    w.finish()
}

fn decode_materials(blob: &[u8]) -> Result<Vec<MaterialPackage>, SceneError> {
    let mut r = BlobReader::new(BlobKind::Materials, blob);
    let mut materials = Vec::new();

    while !r.is_empty() {
        let kind = r.i32("material type")?;
        let name = r.prefixed_ascii("material name")?;
        let src = r.prefixed_ascii("material src")?;
        let material_id = r.i32("material id")?;
        let textures = r.count("material textures", 4 + 8 + 8)?;
        let texture_ids = r.i32_vec(textures, "texture ids")?;
        let texture_offsets = r.f32_groups::<2>(textures, "texture offsets")?;
        let texture_scales = r.f32_groups::<2>(textures, "texture scales")?;
        let config_len = r.count("shader config", 1)?;
        let shader_config = r
            .byte_vec(config_len, "shader config")?
            .into_iter()
            .map(|b| b != 0)
            .collect();
        let props = r.count("shader properties", 8)?;
        let shader_property_ids = r.i32_vec(props, "shader property ids")?;
        let shader_property_types = r.i32_vec(props, "shader property types")?;
        let data_len = r.count("shader property data", 1)?;
        let shader_properties = r.byte_vec(data_len, "shader property data")?;

        materials.push(MaterialPackage {
            kind,
            name,
            src,
            material_id,
            texture_ids,
            texture_offsets,
            texture_scales,
            shader_config,
            shader_property_ids,
            shader_property_types,
            shader_properties,
        });
    }

    Ok(materials)
}

/// Bytes of one encoded node record of the given type.
#[cfg(test)]
fn node_record_len(node_type: NodeType) -> usize {
    let base = 4 + 1 + 4 + 10 * 4 + NODE_NAME_LEN;
    let geo = 3 * 4 + 4 + 4 * 4;
    base + match node_type {
        NodeType::Group | NodeType::Mocap => 0,
        NodeType::Geo => geo,
        NodeType::SkinnedMesh => {
            geo + 4 + 4 + 6 * 4 + MAX_BIND_POSES * 16 * 4 + MAX_SKIN_BONES * 4
        }
        NodeType::Light => 4 + 3 * 4 + 3 * 4,
        NodeType::Camera => 3 * 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str, child_count: usize, kind: NodeKind) -> SceneNode {
        SceneNode {
            name: name.into(),
            editable: true,
            child_count,
            transform: Transform {
                position: [1.0, 2.0, 3.0],
                ..Transform::default()
            },
            kind,
        }
    }

    fn sample() -> SceneData {
        SceneData {
            header: SceneHeader {
                light_intensity_factor: 2.5,
                texture_binary_type: 1,
                sender_id: 254,
                frame_rate: 24,
            },
            nodes: vec![
                node("root", 3, NodeKind::Group),
                node(
                    "cube",
                    0,
                    NodeKind::Geo(GeoNode {
                        geo_id: 0,
                        texture_id: 0,
                        material_id: 0,
                        ..GeoNode::default()
                    }),
                ),
                node(
                    "sun",
                    0,
                    NodeKind::Light(LightNode {
                        light_type: LightType::Directional,
                        intensity: 3.0,
                        angle: 30.0,
                        range: 100.0,
                        color: [1.0, 0.9, 0.8],
                    }),
                ),
                node(
                    "skin",
                    0,
                    NodeKind::SkinnedGeo(SkinnedGeoNode {
                        geo: GeoNode::default(),
                        root_bone_id: 0,
                        bound_extents: [1.0; 3],
                        bound_center: [0.0; 3],
                        bind_poses: vec![[0.5; 16]; 2],
                        bone_ids: vec![0, 2],
                    }),
                ),
            ],
            objects: vec![ObjectPackage {
                vertices: vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
                indices: vec![0, 1, 2],
                normals: vec![[0.0, 0.0, 1.0]; 3],
                uvs: vec![[0.0, 0.0]; 3],
                bone_weights: vec![[1.0, 0.0, 0.0, 0.0]],
                bone_indices: vec![[0, 0, 0, 0]],
            }],
            characters: vec![CharacterPackage {
                scene_object_id: 0,
                root_id: 3,
                bone_mapping: vec![1, -1],
                skeleton_mapping: vec![3],
                bone_positions: vec![[0.0; 3]],
                bone_rotations: vec![[0.0, 0.0, 0.0, 1.0]],
                bone_scales: vec![[1.0; 3]],
                name: "hero".into(),
            }],
            textures: vec![TexturePackage {
                width: 2,
                height: 1,
                format: 4,
                data: vec![1, 2, 3, 4, 5, 6, 7, 8],
            }],
            materials: vec![MaterialPackage {
                kind: 1,
                name: "mat".into(),
                src: "Standard".into(),
                material_id: 7,
                texture_ids: vec![0],
                texture_offsets: vec![[0.0, 0.0]],
                texture_scales: vec![[1.0, 1.0]],
                shader_config: vec![true, false],
                shader_property_ids: vec![3],
                shader_property_types: vec![2],
                shader_properties: vec![0, 0, 128, 63],
            }],
        }
    }

    #[test]
    fn scene_survives_encode_decode() {
        let data = sample();
        let blobs = data.encode();
        assert_eq!(blobs.header.len(), HEADER_LEN);
        let expected_nodes = node_record_len(NodeType::Group)
            + node_record_len(NodeType::Geo)
            + node_record_len(NodeType::Light)
            + node_record_len(NodeType::SkinnedMesh);
        assert_eq!(blobs.nodes.len(), expected_nodes);

        let decoded = SceneData::decode(&blobs).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn truncated_nodes_are_corrupt() {
        let mut blobs = sample().encode();
        blobs.nodes = blobs.nodes.slice(..blobs.nodes.len() - 3);
        assert!(matches!(
            SceneData::decode(&blobs),
            Err(SceneError::CorruptSceneData {
                blob: BlobKind::Nodes,
                ..
            })
        ));
    }

    #[test]
    fn dangling_geo_reference_is_corrupt() {
        let mut data = sample();
        if let NodeKind::Geo(geo) = &mut data.nodes[1].kind {
            geo.geo_id = 5;
        }
        let err = SceneData::decode(&data.encode()).unwrap_err();
        assert!(err.is_corrupt());
    }

    #[test]
    fn inconsistent_child_counts_are_corrupt() {
        let mut data = sample();
        data.nodes[0].child_count = 2;
        assert!(SceneData::decode(&data.encode()).is_err());

        let mut data = sample();
        data.nodes[1].child_count = 2;
        assert!(SceneData::decode(&data.encode()).is_err());
    }

    #[test]
    fn wrong_header_length_is_corrupt() {
        let mut blobs = sample().encode();
        blobs.header = bytes::Bytes::from_static(&[0, 0, 0]);
        assert!(matches!(
            SceneData::decode(&blobs),
            Err(SceneError::CorruptSceneData {
                blob: BlobKind::Header,
                ..
            })
        ));
    }

    #[test]
    fn header_starts_with_its_version() {
        let blobs = sample().encode();
        assert_eq!(blobs.header[0], HEADER_VERSION);

        let mut raw = blobs.header.to_vec();
        raw[0] = HEADER_VERSION + 1;
        let mut blobs = blobs;
        blobs.header = bytes::Bytes::from(raw);
        assert!(matches!(
            SceneData::decode(&blobs),
            Err(SceneError::UnsupportedHeaderVersion { found: 2, expected: 1 })
        ));
    }

    #[test]
    fn skinned_bone_ids_keep_trailing_unresolved_slots() {
        let mut data = sample();
        if let NodeKind::SkinnedGeo(skin) = &mut data.nodes[3].kind {
            skin.bone_ids = vec![0, -1];
        }
        data.validate().unwrap();
        assert_eq!(SceneData::decode(&data.encode()).unwrap(), data);
    }

    #[test]
    fn bone_and_bind_pose_counts_must_agree() {
        let mut data = sample();
        if let NodeKind::SkinnedGeo(skin) = &mut data.nodes[3].kind {
            skin.bone_ids.push(-1);
        }
        assert!(data.validate().unwrap_err().is_corrupt());
    }

    #[test]
    fn lying_texture_size_is_corrupt() {
        let mut w = BlobWriter::new();
        w.i32(1);
        w.i32(1);
        w.i32(0);
        w.i32(i32::MAX);
        w.bytes(&[1, 2, 3]);
        let mut blobs = sample().encode();
        blobs.textures = w.finish();
        assert!(SceneData::decode(&blobs).unwrap_err().is_corrupt());
    }

    #[test]
    fn mesh_index_past_vertices_is_corrupt() {
        let mut data = sample();
        data.objects[0].indices.push(3);
        assert!(SceneData::decode(&data.encode()).unwrap_err().is_corrupt());
    }
}
