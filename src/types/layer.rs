//! Map layers, resolved to a tagged variant at parse time.
//!
//! Every layer keeps its raw JSON fields so that anything the transform does
//! not touch is written back unchanged and in its original key order.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Layer `type` of a dense tile grid.
pub const TILE_LAYER: &str = "tilelayer";

/// Layer `type` of a group of placed objects.
pub const OBJECT_GROUP: &str = "objectgroup";

/// Field holding the dense per-cell grid of a tile layer.
pub const DENSE_FIELD: &str = "data";

/// Field holding the flat `(index, tile id)` pairs of a sparsified tile layer.
pub const SPARSE_FIELD: &str = "sparsed";

/// Field holding the objects of an object group.
pub const OBJECTS_FIELD: &str = "objects";

/// A layer's data could not be interpreted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Malformed layer data in {layer}: {detail}")]
pub struct MalformedLayerData {
    /// Layer name, or its position when unnamed.
    pub layer: String,
    /// What was wrong with it.
    pub detail: String,
}

impl MalformedLayerData {
    /// Create a new error for the given layer.
    pub fn new(layer: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            layer: layer.into(),
            detail: detail.into(),
        }
    }
}

/// Returns true for values the map format treats as "nothing here":
/// `null`, `false`, `0` and the empty string.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// Kind of a layer, read from its `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    /// Dense grid of tile ids.
    Tile,
    /// Placed objects.
    ObjectGroup,
    /// Anything else (image layers, groups, malformed entries).
    Other,
}

impl LayerKind {
    /// Resolve the kind of a raw layer value.
    pub fn of(value: &Value) -> Self {
        match value.get("type").and_then(Value::as_str) {
            Some(TILE_LAYER) => Self::Tile,
            Some(OBJECT_GROUP) => Self::ObjectGroup,
            _ => Self::Other,
        }
    }
}

/// A map layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Layer {
    /// A `tilelayer`.
    Tile(TileLayer),
    /// An `objectgroup`.
    ObjectGroup(ObjectGroup),
    /// Any other layer, passed through unchanged.
    Other(Value),
}

impl Layer {
    /// Build a layer from its raw JSON value.
    pub fn from_value(value: Value) -> Self {
        match (LayerKind::of(&value), value) {
            (LayerKind::Tile, Value::Object(fields)) => Self::Tile(TileLayer { fields }),
            (LayerKind::ObjectGroup, Value::Object(fields)) => {
                Self::ObjectGroup(ObjectGroup { fields })
            }
            (_, other) => Self::Other(other),
        }
    }

    /// Kind of this layer.
    pub fn kind(&self) -> LayerKind {
        match self {
            Self::Tile(_) => LayerKind::Tile,
            Self::ObjectGroup(_) => LayerKind::ObjectGroup,
            Self::Other(_) => LayerKind::Other,
        }
    }

    /// Human-readable label used in errors and logs.
    ///
    /// Uses the layer's `name` when it has one, its position otherwise.
    pub fn label(&self, position: usize) -> String {
        let name = match self {
            Self::Tile(layer) => layer.name(),
            Self::ObjectGroup(group) => group.name(),
            Self::Other(value) => value.get("name").and_then(Value::as_str),
        };

        label_for(name, position)
    }

    /// Convert back into a raw JSON value.
    pub fn into_value(self) -> Value {
        match self {
            Self::Tile(layer) => Value::Object(layer.fields),
            Self::ObjectGroup(group) => Value::Object(group.fields),
            Self::Other(value) => value,
        }
    }
}

/// A `tilelayer`, holding either a dense grid or its sparse form.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TileLayer {
    fields: Map<String, Value>,
}

impl TileLayer {
    /// Layer name, if any.
    pub fn name(&self) -> Option<&str> {
        self.fields.get("name").and_then(Value::as_str)
    }

    /// The dense grid, if present and not blank.
    pub fn dense(&self) -> Option<&Value> {
        self.fields.get(DENSE_FIELD).filter(|grid| !is_blank(grid))
    }

    /// The sparse pairs, if this layer has been sparsified.
    pub fn sparsed(&self) -> Option<&[Value]> {
        self.fields
            .get(SPARSE_FIELD)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
    }

    /// Install the sparse form and drop the dense grid.
    ///
    /// `sparsed` is appended after the existing fields; the rest of the
    /// layer keeps its order.
    pub fn replace_dense(&mut self, pairs: Vec<u64>) {
        let sparsed = pairs.into_iter().map(Value::from).collect();
        self.fields.insert(SPARSE_FIELD.to_string(), Value::Array(sparsed));
        self.fields.shift_remove(DENSE_FIELD);
    }

    /// Raw fields of the layer.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

/// An `objectgroup` layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ObjectGroup {
    fields: Map<String, Value>,
}

impl ObjectGroup {
    /// Layer name, if any.
    pub fn name(&self) -> Option<&str> {
        self.fields.get("name").and_then(Value::as_str)
    }

    /// Read the objects of this group.
    ///
    /// A group without an `objects` field has no objects. An `objects` field
    /// that is not an array of objects is malformed.
    pub fn objects(&self, label: &str) -> Result<Vec<MapObject>, MalformedLayerData> {
        let items = match self.fields.get(OBJECTS_FIELD) {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(MalformedLayerData::new(
                    label,
                    format!("`objects` must be an array, found {}", type_name(other)),
                ))
            }
        };

        items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                MapObject::deserialize(item).map_err(|e| {
                    MalformedLayerData::new(label, format!("objects[{}]: {}", i, e))
                })
            })
            .collect()
    }

    /// Raw fields of the layer.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

/// The parts of a placed object that matter for its header entry.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MapObject {
    /// Marks a point object.
    #[serde(default)]
    pub point: Option<Value>,
    /// The object's `type`.
    #[serde(default, rename = "type")]
    pub type_name: Option<Value>,
    /// The object's `class` (newer map editors use this instead of `type`).
    #[serde(default)]
    pub class: Option<Value>,
    /// The object's `name`.
    #[serde(default)]
    pub name: Option<Value>,
}

impl MapObject {
    /// Whether this is a point object.
    pub fn is_point(&self) -> bool {
        matches!(self.point, Some(Value::Bool(true)))
    }

    /// Kind of the object: the first non-empty string of `type`, `class`, `name`.
    pub fn kind(&self) -> Option<&str> {
        [&self.type_name, &self.class, &self.name]
            .into_iter()
            .filter_map(|field| field.as_ref().and_then(Value::as_str))
            .find(|kind| !kind.is_empty())
    }
}

/// Label a layer by name, falling back to its position.
pub(crate) fn label_for(name: Option<&str>, position: usize) -> String {
    match name {
        Some(name) if !name.is_empty() => format!("layer '{}'", name),
        _ => format!("layers[{}]", position),
    }
}

/// JSON type name of a value, for error messages.
pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_resolved_from_type_field() {
        assert_eq!(LayerKind::of(&json!({"type": "tilelayer"})), LayerKind::Tile);
        assert_eq!(LayerKind::of(&json!({"type": "objectgroup"})), LayerKind::ObjectGroup);
        assert_eq!(LayerKind::of(&json!({"type": "imagelayer"})), LayerKind::Other);
        assert_eq!(LayerKind::of(&json!(42)), LayerKind::Other);
    }

    #[test]
    fn test_non_object_layer_is_other() {
        let layer = Layer::from_value(json!("tilelayer"));
        assert_eq!(layer.kind(), LayerKind::Other);
        assert_eq!(layer.into_value(), json!("tilelayer"));
    }

    #[test]
    fn test_replace_dense_removes_data() {
        let Layer::Tile(mut layer) = Layer::from_value(json!({
            "name": "ground",
            "type": "tilelayer",
            "data": [0, 3],
            "opacity": 1
        })) else {
            panic!("expected a tile layer");
        };

        layer.replace_dense(vec![1, 3]);

        assert!(layer.fields().get(DENSE_FIELD).is_none());
        assert_eq!(layer.sparsed(), Some(&[json!(1), json!(3)][..]));
        let keys: Vec<_> = layer.fields().keys().map(String::as_str).collect();
        assert_eq!(keys, ["name", "type", "opacity", "sparsed"]);
    }

    #[test]
    fn test_blank_grid_is_not_dense() {
        let Layer::Tile(layer) = Layer::from_value(json!({"type": "tilelayer", "data": null})) else {
            panic!("expected a tile layer");
        };
        assert!(layer.dense().is_none());
    }

    #[test]
    fn test_object_kind_precedence() {
        let object: MapObject =
            serde_json::from_value(json!({"type": "", "class": "npc", "name": "bob"})).unwrap();
        assert_eq!(object.kind(), Some("npc"));

        let object: MapObject = serde_json::from_value(json!({"name": "door"})).unwrap();
        assert_eq!(object.kind(), Some("door"));

        let object: MapObject = serde_json::from_value(json!({"id": 4})).unwrap();
        assert_eq!(object.kind(), None);
    }

    #[test]
    fn test_point_flag() {
        let object: MapObject =
            serde_json::from_value(json!({"point": true, "type": "spawn"})).unwrap();
        assert!(object.is_point());

        let object: MapObject = serde_json::from_value(json!({"point": false})).unwrap();
        assert!(!object.is_point());
    }

    #[test]
    fn test_objects_must_be_array() {
        let Layer::ObjectGroup(group) =
            Layer::from_value(json!({"type": "objectgroup", "objects": {"a": 1}}))
        else {
            panic!("expected an object group");
        };
        let err = group.objects("layer 'things'").unwrap_err();
        assert_eq!(err.layer, "layer 'things'");
    }

    #[test]
    fn test_missing_objects_is_empty() {
        let Layer::ObjectGroup(group) = Layer::from_value(json!({"type": "objectgroup"})) else {
            panic!("expected an object group");
        };
        assert!(group.objects("layers[0]").unwrap().is_empty());
    }

    #[test]
    fn test_label_prefers_name() {
        let layer = Layer::from_value(json!({"type": "tilelayer", "name": "walls"}));
        assert_eq!(layer.label(3), "layer 'walls'");

        let layer = Layer::from_value(json!({"type": "tilelayer"}));
        assert_eq!(layer.label(3), "layers[3]");
    }
}
