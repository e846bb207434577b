//! Parsed map documents.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

use super::layer::{is_blank, type_name, Layer, ObjectGroup, TileLayer};

/// Field holding the ordered layers of a map.
pub const LAYERS_FIELD: &str = "layers";

/// Why a map document could not be read.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// The text is not valid JSON.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// `layers` is present but is not a sequence.
    #[error("`layers` must be an array, found {0}")]
    LayersNotArray(&'static str),
}

/// A map document with typed layers and untouched passthrough fields.
///
/// Serializing writes the fields back in their original order, with the
/// layers in the position the `layers` key originally held.
#[derive(Debug, Clone, PartialEq)]
pub struct MapDocument {
    fields: Map<String, Value>,
    layers: Vec<Layer>,
}

impl MapDocument {
    /// Parse a map document.
    ///
    /// Returns `Ok(None)` when the document has no layers to work on: it is
    /// not a JSON object, or its `layers` field is missing or blank. Such
    /// documents are passed through by callers as-is.
    pub fn parse(text: &str) -> Result<Option<Self>, DocumentError> {
        let Value::Object(mut fields) = serde_json::from_str::<Value>(text)? else {
            return Ok(None);
        };

        let layers = match fields.get_mut(LAYERS_FIELD) {
            None => return Ok(None),
            Some(value) if is_blank(value) => return Ok(None),
            // Leave an empty placeholder so the key keeps its position.
            Some(Value::Array(items)) => std::mem::take(items),
            Some(other) => return Err(DocumentError::LayersNotArray(type_name(other))),
        };

        Ok(Some(Self {
            fields,
            layers: layers.into_iter().map(Layer::from_value).collect(),
        }))
    }

    /// All layers, in document order.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Tile layers with their position in the document.
    pub fn tile_layers_mut(&mut self) -> impl Iterator<Item = (usize, &mut TileLayer)> {
        self.layers
            .iter_mut()
            .enumerate()
            .filter_map(|(i, layer)| match layer {
                Layer::Tile(tile) => Some((i, tile)),
                _ => None,
            })
    }

    /// Object groups with their position in the document.
    pub fn object_groups(&self) -> impl Iterator<Item = (usize, &ObjectGroup)> {
        self.layers
            .iter()
            .enumerate()
            .filter_map(|(i, layer)| match layer {
                Layer::ObjectGroup(group) => Some((i, group)),
                _ => None,
            })
    }

    /// A passthrough field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        if key == LAYERS_FIELD {
            return None;
        }
        self.fields.get(key)
    }

    /// Drop the layers, keeping every other field in order.
    pub fn into_fields_without_layers(mut self) -> Map<String, Value> {
        self.fields.shift_remove(LAYERS_FIELD);
        self.fields
    }
}

impl Serialize for MapDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            if key == LAYERS_FIELD {
                map.serialize_entry(key, &self.layers)?;
            } else {
                map.serialize_entry(key, value)?;
            }
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LayerKind;

    #[test]
    fn test_missing_layers_is_passthrough() {
        assert!(MapDocument::parse(r#"{"width": 4}"#).unwrap().is_none());
        assert!(MapDocument::parse(r#"{"layers": null}"#).unwrap().is_none());
        assert!(MapDocument::parse("[1, 2, 3]").unwrap().is_none());
    }

    #[test]
    fn test_invalid_json_is_error() {
        let err = MapDocument::parse("{\"layers\": [").unwrap_err();
        assert!(matches!(err, DocumentError::Json(_)));
    }

    #[test]
    fn test_layers_must_be_array() {
        let err = MapDocument::parse(r#"{"layers": {"a": 1}}"#).unwrap_err();
        assert!(matches!(err, DocumentError::LayersNotArray("an object")));
    }

    #[test]
    fn test_layers_resolved_at_parse_time() {
        let doc = MapDocument::parse(
            r#"{"layers": [{"type": "tilelayer"}, {"type": "objectgroup"}, {"type": "group"}]}"#,
        )
        .unwrap()
        .unwrap();

        let kinds: Vec<_> = doc.layers().iter().map(Layer::kind).collect();
        assert_eq!(kinds, [LayerKind::Tile, LayerKind::ObjectGroup, LayerKind::Other]);
    }

    #[test]
    fn test_serialize_keeps_key_order() {
        let text = r#"{"width":2,"layers":[{"type":"imagelayer","image":"sky.png"}],"height":1}"#;
        let doc = MapDocument::parse(text).unwrap().unwrap();
        assert_eq!(serde_json::to_string(&doc).unwrap(), text);
    }

    #[test]
    fn test_get_sees_only_passthrough_fields() {
        let doc = MapDocument::parse(r#"{"width":4,"layers":[]}"#).unwrap().unwrap();
        assert_eq!(doc.get("width"), Some(&Value::from(4)));
        assert_eq!(doc.get(LAYERS_FIELD), None);
        assert_eq!(doc.get("height"), None);
    }

    #[test]
    fn test_into_fields_without_layers() {
        let doc = MapDocument::parse(r#"{"layers":[],"tilewidth":16}"#).unwrap().unwrap();
        let fields = doc.into_fields_without_layers();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["tilewidth"], 16);
    }
}
