//! JSON output formats for the artifacts this crate writes.
//!
//! - Sparse maps are written compact, they are loaded at runtime.
//! - Headers and the maps index are pretty-printed with 4-space indents.

use serde::Serialize;
use serde_json::ser::PrettyFormatter;

/// Indentation used for pretty-printed artifacts.
pub const PRETTY_INDENT: &[u8] = b"    ";

/// Serialize a value to compact JSON.
pub fn to_compact_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string(value)
}

/// Serialize a value to JSON indented with [`PRETTY_INDENT`].
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    let mut out = Vec::with_capacity(256);
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(PRETTY_INDENT));
    value.serialize(&mut serializer)?;

    String::from_utf8(out).map_err(<serde_json::Error as serde::ser::Error>::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_pretty_uses_four_spaces() {
        let set: BTreeSet<&str> = ["/map/b.headers.json", "/map/a.headers.json"].into();
        let json = to_pretty_json(&set).unwrap();
        assert_eq!(json, "[\n    \"/map/a.headers.json\",\n    \"/map/b.headers.json\"\n]");
    }

    #[test]
    fn test_compact_has_no_whitespace() {
        let value = serde_json::json!({"sparsed": [0, 5], "name": "ground"});
        assert_eq!(to_compact_json(&value).unwrap(), r#"{"sparsed":[0,5],"name":"ground"}"#);
    }
}
