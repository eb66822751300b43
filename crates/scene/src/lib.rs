//! Scene model of the synchronisation core.
//!
//! - [`SceneData`]: the flat, serializable scene (header, node list and the
//!   object/character/texture/material packages) plus its six-blob codec.
//! - [`SceneGraph`]: the hierarchical scene the host engine works with;
//!   [`SceneParser`] flattens it and [`build_graph`] rebuilds it.
//! - [`SceneObject`] / [`Parameter`]: the live, networked entities addressed by
//!   `(object id, parameter id)` during a session.
//! - [`UndoRedoHistory`], [`SceneManager`] and [`SceneStorage`] on top.

mod builder;
mod codec;
mod error;
mod graph;
mod history;
mod manager;
mod model;
mod object;
mod parameter;
mod parser;
mod storage;
mod wire;

pub use builder::build_graph;
pub use error::SceneError;
pub use graph::{
    CharacterRig, Component, GeoComponent, GraphNode, LodFilter, LodLayer, MaterialAsset,
    MaterialTexture, NodeKey, SceneGraph, SkinnedGeoComponent,
};
pub use history::{HistoryStep, UndoRedoHistory};
pub use manager::{LoadedScene, SceneManager};
pub use model::{
    BlobKind, CHARACTER_NAME_LEN, CameraNode, CharacterPackage, GeoNode, HEADER_LEN,
    HEADER_VERSION, LightNode, LightType, MAX_BIND_POSES, MAX_SKIN_BONES, MaterialPackage,
    NODE_NAME_LEN, NodeKind, NodeType, ObjectPackage, SceneBlobs, SceneData, SceneHeader,
    SceneNode, SkinnedGeoNode, TexturePackage, Transform,
};
pub use object::{SceneObject, SceneObjectBuilder, SceneObjectKind, SceneRegistry, param_ids};
pub use parameter::{
    ChangeOrigin, Parameter, ParameterChange, ParameterError, ParameterType, ParameterValue,
    SubscriptionId,
};
pub use parser::SceneParser;
pub use storage::SceneStorage;
