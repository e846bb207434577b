//! Dense grid to sparse pair conversion.
//!
//! A tile layer's `data` grid stores one tile id per cell, with 0 for an
//! empty cell. Most cells of a large map are empty, so the grid is replaced
//! by `sparsed`: a flat `[index, tile, index, tile, ...]` sequence holding
//! only the non-empty cells, in index order.
//!
//! ```text
//! data:    [5, 0, 7, 0, 0]        {"0": 5, "1": 0, "2": 7}
//! sparsed: [0, 5, 2, 7]           [0, 5, 2, 7]
//! ```

use serde_json::Value;

use crate::types::layer::{label_for, type_name};
use crate::types::{is_blank, MalformedLayerData, MapDocument, TileLayer};

/// Counts from sparsifying a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SparseStats {
    /// Tile layers whose dense grid was replaced.
    pub layers_sparsified: usize,
    /// Non-empty tiles kept across those layers.
    pub tiles_kept: usize,
}

/// Sparsify every tile layer of a document that still has a dense grid.
///
/// Layers that are already sparse are left alone, so running this twice is
/// the same as running it once.
pub fn sparsify_map(doc: &mut MapDocument) -> Result<SparseStats, MalformedLayerData> {
    let mut stats = SparseStats::default();

    for (position, layer) in doc.tile_layers_mut() {
        let label = label_for(layer.name(), position);
        if let Some(kept) = sparsify_layer(layer, &label)? {
            stats.layers_sparsified += 1;
            stats.tiles_kept += kept;
        }
    }

    Ok(stats)
}

/// Sparsify one tile layer.
///
/// Returns the number of tiles kept, or `None` if the layer had no dense grid.
/// On error the layer is left unchanged.
pub fn sparsify_layer(
    layer: &mut TileLayer,
    label: &str,
) -> Result<Option<usize>, MalformedLayerData> {
    let Some(grid) = layer.dense() else {
        return Ok(None);
    };

    let pairs = sparsify_grid(grid).map_err(|detail| MalformedLayerData::new(label, detail))?;
    let kept = pairs.len() / 2;
    layer.replace_dense(pairs);

    Ok(Some(kept))
}

/// Convert a dense grid into flat `(index, tile)` pairs.
///
/// The grid is either an array (index = position) or an object keyed by
/// decimal indices, which is walked in ascending index order.
pub fn sparsify_grid(grid: &Value) -> Result<Vec<u64>, String> {
    let mut pairs = Vec::new();

    match grid {
        Value::Array(cells) => {
            for (index, cell) in cells.iter().enumerate() {
                push_cell(&mut pairs, index as u64, cell)?;
            }
        }
        Value::Object(cells) => {
            let mut indexed = cells
                .iter()
                .map(|(key, cell)| parse_index(key).map(|index| (index, cell)))
                .collect::<Result<Vec<_>, _>>()?;
            indexed.sort_by_key(|(index, _)| *index);

            for (index, cell) in indexed {
                push_cell(&mut pairs, index, cell)?;
            }
        }
        other => {
            return Err(format!(
                "grid must be an array or an index-keyed object, found {}",
                type_name(other)
            ))
        }
    }

    Ok(pairs)
}

fn push_cell(pairs: &mut Vec<u64>, index: u64, cell: &Value) -> Result<(), String> {
    let tile = tile_id(cell).ok_or_else(|| {
        format!("tile at index {} is not a non-negative integer: {}", index, cell)
    })?;

    if tile != 0 {
        pairs.push(index);
        pairs.push(tile);
    }
    Ok(())
}

fn parse_index(key: &str) -> Result<u64, String> {
    numeric_str(key).ok_or_else(|| format!("grid index '{}' is not a non-negative integer", key))
}

/// Numeric tile id of a cell; blank cells are 0.
fn tile_id(cell: &Value) -> Option<u64> {
    if is_blank(cell) {
        return Some(0);
    }

    match cell {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => numeric_str(s),
        _ => None,
    }
}

/// A string holding a non-negative integer, in integer, decimal or exponent form.
fn numeric_str(s: &str) -> Option<u64> {
    let s = s.trim();
    s.parse::<u64>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().and_then(integral))
}

fn integral(f: f64) -> Option<u64> {
    (f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64).then(|| f as u64)
}
