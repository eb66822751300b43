//! Flat scene records exchanged between server and clients.
//!
//! The node list is ordered depth-first; a node's position in that list is
//! its scene-graph index, which other records refer to as a plain `i32`
//! (`-1` meaning "none"). Package ids are dense indices into their arrays.

use std::fmt;

use bytes::Bytes;

/// Width of the fixed ASCII name field of every node record.
pub const NODE_NAME_LEN: usize = 256;
/// Width of the fixed ASCII name field of a character record.
pub const CHARACTER_NAME_LEN: usize = 64;
/// Bone id slots carried by a skinned geo node.
pub const MAX_SKIN_BONES: usize = 99;
/// Bind pose matrix slots carried by a skinned geo node.
pub const MAX_BIND_POSES: usize = 99;
/// Layout version written as the first byte of the header blob.
pub const HEADER_VERSION: u8 = 1;
/// Encoded size of the header blob, version byte included.
pub const HEADER_LEN: usize = 11;

/// The six independent blobs of a serialized scene, in request order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlobKind {
    Header,
    Nodes,
    Objects,
    Characters,
    Textures,
    Materials,
}

impl BlobKind {
    pub const ALL: [BlobKind; 6] = [
        BlobKind::Header,
        BlobKind::Nodes,
        BlobKind::Objects,
        BlobKind::Characters,
        BlobKind::Textures,
        BlobKind::Materials,
    ];

    /// Topic name used on the request/reply channel and as file extension.
    pub fn name(self) -> &'static str {
        match self {
            BlobKind::Header => "header",
            BlobKind::Nodes => "nodes",
            BlobKind::Objects => "objects",
            BlobKind::Characters => "characters",
            BlobKind::Textures => "textures",
            BlobKind::Materials => "materials",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for BlobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Raw bytes of the six blobs. An empty blob is a valid, empty package list,
/// except for the header which must be present for the scene to count as ready.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SceneBlobs {
    pub header: Bytes,
    pub nodes: Bytes,
    pub objects: Bytes,
    pub characters: Bytes,
    pub textures: Bytes,
    pub materials: Bytes,
}

impl SceneBlobs {
    pub fn get(&self, kind: BlobKind) -> &Bytes {
        match kind {
            BlobKind::Header => &self.header,
            BlobKind::Nodes => &self.nodes,
            BlobKind::Objects => &self.objects,
            BlobKind::Characters => &self.characters,
            BlobKind::Textures => &self.textures,
            BlobKind::Materials => &self.materials,
        }
    }

    pub fn set(&mut self, kind: BlobKind, data: Bytes) {
        let slot = match kind {
            BlobKind::Header => &mut self.header,
            BlobKind::Nodes => &mut self.nodes,
            BlobKind::Objects => &mut self.objects,
            BlobKind::Characters => &mut self.characters,
            BlobKind::Textures => &mut self.textures,
            BlobKind::Materials => &mut self.materials,
        };
        *slot = data;
    }

    /// A scene is only usable when the header blob arrived.
    pub fn is_ready(&self) -> bool {
        !self.header.is_empty()
    }

    pub fn total_len(&self) -> usize {
        BlobKind::ALL.iter().map(|kind| self.get(*kind).len()).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneHeader {
    pub light_intensity_factor: f32,
    pub texture_binary_type: i32,
    pub sender_id: u8,
    pub frame_rate: u8,
}

impl Default for SceneHeader {
    fn default() -> Self {
        Self {
            light_intensity_factor: 1.0,
            texture_binary_type: 0,
            sender_id: 0,
            frame_rate: 60,
        }
    }
}

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Group = 0,
    Geo = 1,
    Light = 2,
    Camera = 3,
    SkinnedMesh = 4,
    Mocap = 5,
}

impl NodeType {
    pub fn from_i32(raw: i32) -> Option<Self> {
        Some(match raw {
            0 => NodeType::Group,
            1 => NodeType::Geo,
            2 => NodeType::Light,
            3 => NodeType::Camera,
            4 => NodeType::SkinnedMesh,
            5 => NodeType::Mocap,
            _ => return None,
        })
    }
}

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightType {
    Spot = 0,
    Directional = 1,
    Point = 2,
    Area = 3,
}

impl LightType {
    pub fn from_i32(raw: i32) -> Option<Self> {
        Some(match raw {
            0 => LightType::Spot,
            1 => LightType::Directional,
            2 => LightType::Point,
            3 => LightType::Area,
            _ => return None,
        })
    }
}

/// Local transform; rotation is a quaternion `x y z w`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: [f32; 3],
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: [1.0; 3],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub name: String,
    pub editable: bool,
    /// Number of direct children that follow this node in the list.
    pub child_count: usize,
    pub transform: Transform,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Group,
    Geo(GeoNode),
    SkinnedGeo(SkinnedGeoNode),
    Light(LightNode),
    Camera(CameraNode),
    Mocap,
}

impl NodeKind {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeKind::Group => NodeType::Group,
            NodeKind::Geo(_) => NodeType::Geo,
            NodeKind::SkinnedGeo(_) => NodeType::SkinnedMesh,
            NodeKind::Light(_) => NodeType::Light,
            NodeKind::Camera(_) => NodeType::Camera,
            NodeKind::Mocap => NodeType::Mocap,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoNode {
    pub geo_id: i32,
    pub texture_id: i32,
    pub material_id: i32,
    pub roughness: f32,
    pub color: [f32; 4],
}

impl Default for GeoNode {
    fn default() -> Self {
        Self {
            geo_id: -1,
            texture_id: -1,
            material_id: -1,
            roughness: 0.5,
            color: [1.0; 4],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkinnedGeoNode {
    pub geo: GeoNode,
    pub root_bone_id: i32,
    pub bound_extents: [f32; 3],
    pub bound_center: [f32; 3],
    /// At most [`MAX_BIND_POSES`] row-major 4x4 matrices.
    pub bind_poses: Vec<[f32; 16]>,
    /// Node indices of the skinning bones, at most [`MAX_SKIN_BONES`].
    pub bone_ids: Vec<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightNode {
    pub light_type: LightType,
    pub intensity: f32,
    pub angle: f32,
    pub range: f32,
    pub color: [f32; 3],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraNode {
    pub fov: f32,
    pub near: f32,
    pub far: f32,
}

/// Mesh data referenced by `geo_id`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectPackage {
    pub vertices: Vec<[f32; 3]>,
    pub indices: Vec<i32>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub bone_weights: Vec<[f32; 4]>,
    /// One entry per bone weight.
    pub bone_indices: Vec<[i32; 4]>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CharacterPackage {
    /// Node index of the node carrying the rig.
    pub scene_object_id: i32,
    pub root_id: i32,
    pub bone_mapping: Vec<i32>,
    pub skeleton_mapping: Vec<i32>,
    /// One entry per skeleton bone.
    pub bone_positions: Vec<[f32; 3]>,
    pub bone_rotations: Vec<[f32; 4]>,
    pub bone_scales: Vec<[f32; 3]>,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TexturePackage {
    pub width: i32,
    pub height: i32,
    pub format: i32,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialPackage {
    pub kind: i32,
    pub name: String,
    pub src: String,
    pub material_id: i32,
    pub texture_ids: Vec<i32>,
    /// One offset and one scale per texture id.
    pub texture_offsets: Vec<[f32; 2]>,
    pub texture_scales: Vec<[f32; 2]>,
    pub shader_config: Vec<bool>,
    pub shader_property_ids: Vec<i32>,
    pub shader_property_types: Vec<i32>,
    pub shader_properties: Vec<u8>,
}

/// Fully parsed scene. Built fresh on every parse or load, never patched in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneData {
    pub header: SceneHeader,
    pub nodes: Vec<SceneNode>,
    pub objects: Vec<ObjectPackage>,
    pub characters: Vec<CharacterPackage>,
    pub textures: Vec<TexturePackage>,
    pub materials: Vec<MaterialPackage>,
}
