//! Property tests for sparsify and header type collection.

use proptest::prelude::*;
use serde_json::{json, Value};
use tilemap_sparser::{collect_types, sparsify_grid, sparsify_map, MapDocument};

fn tile() -> impl Strategy<Value = u64> {
    prop_oneof![3 => Just(0u64), 2 => 1u64..5_000]
}

fn kind() -> impl Strategy<Value = Option<String>> {
    prop::option::of(prop::sample::select(vec!["npc", "item", "door", "chest", "Npc"]))
        .prop_map(|k| k.map(str::to_string))
}

proptest! {
    #[test]
    fn sparse_pairs_rebuild_the_grid(grid in prop::collection::vec(tile(), 0..200)) {
        let pairs = sparsify_grid(&json!(grid)).unwrap();

        prop_assert_eq!(pairs.len() % 2, 0);

        let mut rebuilt = vec![0u64; grid.len()];
        let mut last = None;
        for pair in pairs.chunks(2) {
            let (index, tile) = (pair[0] as usize, pair[1]);
            prop_assert_ne!(tile, 0);
            prop_assert!(last.map_or(true, |last| index > last));
            last = Some(index);
            rebuilt[index] = tile;
        }
        prop_assert_eq!(rebuilt, grid);
    }

    #[test]
    fn object_grids_match_array_grids(grid in prop::collection::vec(tile(), 0..100)) {
        let keyed: serde_json::Map<String, Value> = grid
            .iter()
            .enumerate()
            .rev()
            .map(|(i, t)| (i.to_string(), json!(t)))
            .collect();

        prop_assert_eq!(
            sparsify_grid(&Value::Object(keyed)).unwrap(),
            sparsify_grid(&json!(grid)).unwrap()
        );
    }

    #[test]
    fn sparsify_twice_is_sparsify_once(grid in prop::collection::vec(tile(), 0..50)) {
        let text = json!({"layers": [{"type": "tilelayer", "data": grid}]}).to_string();
        let mut doc = MapDocument::parse(&text).unwrap().unwrap();

        sparsify_map(&mut doc).unwrap();
        let once = serde_json::to_string(&doc).unwrap();
        let stats = sparsify_map(&mut doc).unwrap();

        prop_assert_eq!(stats.layers_sparsified, 0);
        prop_assert_eq!(serde_json::to_string(&doc).unwrap(), once);
    }

    #[test]
    fn types_are_sorted_and_distinct(
        objects in prop::collection::vec((kind(), any::<bool>()), 0..40)
    ) {
        let objects: Vec<Value> = objects
            .iter()
            .map(|(kind, point)| json!({"type": kind, "point": point}))
            .collect();
        let text = json!({"layers": [{"type": "objectgroup", "objects": objects}]}).to_string();
        let doc = MapDocument::parse(&text).unwrap().unwrap();

        let types = collect_types(&doc).unwrap();

        prop_assert!(types.windows(2).all(|w| w[0] < w[1]));
        for (kind, point) in objects.iter().map(|o| (o["type"].as_str(), o["point"] == true)) {
            if let (Some(kind), false) = (kind, point) {
                prop_assert!(types.iter().any(|t| t == kind));
            }
        }
    }
}
