//! Core types for map documents.

pub mod layer;
pub mod document;

pub use layer::{
    Layer, LayerKind, TileLayer, ObjectGroup, MapObject, MalformedLayerData, is_blank,
    TILE_LAYER, OBJECT_GROUP, DENSE_FIELD, SPARSE_FIELD, OBJECTS_FIELD,
};
pub use document::{MapDocument, DocumentError, LAYERS_FIELD};
