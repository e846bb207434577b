//! Map headers: a map's metadata without its layer data.
//!
//! A header lists the distinct object kinds placed on the map and points at
//! the public sparse map, so a game can decide what to preload without
//! fetching the map itself.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::encoding::to_pretty_json;
use crate::types::layer::label_for;
use crate::types::{MalformedLayerData, MapDocument};

/// Header field listing the sorted object kinds.
pub const TYPES_FIELD: &str = "types";

/// Header field holding the public path of the sparse map.
pub const MAP_FIELD: &str = "map";

/// A map document with its layers stripped, plus `types` and `map`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct HeaderDocument {
    fields: Map<String, Value>,
}

impl HeaderDocument {
    /// Object kinds found on the map, sorted and distinct.
    pub fn types(&self) -> Vec<&str> {
        self.fields
            .get(TYPES_FIELD)
            .and_then(Value::as_array)
            .map(|types| types.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Public path of the sparse map.
    pub fn map_url(&self) -> Option<&str> {
        self.fields.get(MAP_FIELD).and_then(Value::as_str)
    }

    /// Any other header field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Pretty-printed header, as written to disk.
    pub fn to_json(&self) -> serde_json::Result<String> {
        to_pretty_json(self)
    }
}

/// Collect the distinct kinds of all non-point objects, sorted ascending.
pub fn collect_types(doc: &MapDocument) -> Result<Vec<String>, MalformedLayerData> {
    let mut types = BTreeSet::new();

    for (position, group) in doc.object_groups() {
        let label = label_for(group.name(), position);
        for object in group.objects(&label)? {
            if object.is_point() {
                continue;
            }
            if let Some(kind) = object.kind() {
                types.insert(kind.to_string());
            }
        }
    }

    Ok(types.into_iter().collect())
}

/// Turn a (sparsified) map document into its header.
///
/// `map_url` is the public path of the sparse map, e.g. `/map/forest.json`.
pub fn extract_header(
    doc: MapDocument,
    map_url: impl Into<String>,
) -> Result<HeaderDocument, MalformedLayerData> {
    let types = collect_types(&doc)?;

    let mut fields = doc.into_fields_without_layers();
    fields.insert(
        TYPES_FIELD.to_string(),
        Value::Array(types.into_iter().map(Value::String).collect()),
    );
    fields.insert(MAP_FIELD.to_string(), Value::String(map_url.into()));

    Ok(HeaderDocument { fields })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> MapDocument {
        MapDocument::parse(text).unwrap().unwrap()
    }

    #[test]
    fn test_types_sorted_and_distinct() {
        let doc = parse(
            r#"{"layers":[
                {"type":"objectgroup","objects":[{"type":"npc"},{"type":"npc"}]},
                {"type":"objectgroup","objects":[{"class":"item"}]}
            ]}"#,
        );
        assert_eq!(collect_types(&doc).unwrap(), ["item", "npc"]);
    }

    #[test]
    fn test_point_objects_ignored() {
        let doc = parse(
            r#"{"layers":[{"type":"objectgroup","objects":[
                {"point":true,"type":"spawn","name":"p1"},
                {"name":"chest"}
            ]}]}"#,
        );
        assert_eq!(collect_types(&doc).unwrap(), ["chest"]);
    }

    #[test]
    fn test_objects_without_kind_ignored() {
        let doc = parse(r#"{"layers":[{"type":"objectgroup","objects":[{"id":1,"name":""}]}]}"#);
        assert!(collect_types(&doc).unwrap().is_empty());
    }

    #[test]
    fn test_tile_layers_do_not_contribute() {
        let doc = parse(r#"{"layers":[{"type":"tilelayer","name":"npc","sparsed":[]}]}"#);
        assert!(collect_types(&doc).unwrap().is_empty());
    }

    #[test]
    fn test_extract_header() {
        let doc = parse(
            r#"{"width":10,"layers":[{"type":"objectgroup","objects":[{"type":"door"}]}],"height":8}"#,
        );

        let header = extract_header(doc, "/map/house.json").unwrap();

        assert_eq!(header.types(), ["door"]);
        assert_eq!(header.map_url(), Some("/map/house.json"));
        assert!(header.get("layers").is_none());
        assert_eq!(
            serde_json::to_string(&header).unwrap(),
            r#"{"width":10,"height":8,"types":["door"],"map":"/map/house.json"}"#
        );
    }

    #[test]
    fn test_header_is_pretty_printed() {
        let header = extract_header(parse(r#"{"layers":[]}"#), "/map/empty.json").unwrap();
        assert_eq!(
            header.to_json().unwrap(),
            "{\n    \"types\": [],\n    \"map\": \"/map/empty.json\"\n}"
        );
    }

    #[test]
    fn test_malformed_objects_rejected() {
        let doc = parse(r#"{"layers":[{"type":"objectgroup","name":"mobs","objects":[3]}]}"#);
        let err = extract_header(doc, "/map/x.json").unwrap_err();
        assert_eq!(err.layer, "layer 'mobs'");
    }
}
