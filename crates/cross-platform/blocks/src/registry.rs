use std::collections::HashMap;
use std::sync::LazyLock;

use crate::MINECRAFT_PREFIX;


static FLATTEN_DATA: &str = include_str!("../data/flatten.tsv");
static LEGACY_ID_DATA: &str = include_str!("../data/legacy_ids.tsv");

/// Keys are either `name:meta` (exact) or a bare `name` (fallback for any
/// meta); names are unprefixed.
static FLATTEN_TABLE: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    let mut table = HashMap::new();

    for line in FLATTEN_DATA.lines() {
        if line.is_empty() {
            continue;
        }
        match line.split_once('\t') {
            Some((key, value)) => {
                table.insert(key, value);
            }
            None => log::warn!("malformed flattening table line: {line:?}"),
        }
    }

    // A handful of entries point at names which are themselves legacy keys
    // (tallgrass:1 -> grass, while grass -> grass_block). Follow such
    // chains to their fixpoint so that translating an already-translated
    // name is always a no-op.
    let chained: Vec<(&str, &str)> = table
        .iter()
        .filter_map(|(&key, &value)| {
            let mut resolved = value;
            for _ in 0..table.len() {
                match table.get(resolved) {
                    Some(&next) if next != resolved => resolved = next,
                    _ => break,
                }
            }
            (resolved != value).then_some((key, resolved))
        })
        .collect();

    for (key, value) in chained {
        table.insert(key, value);
    }

    table
});

static LEGACY_IDS: LazyLock<(HashMap<u8, &'static str>, HashMap<&'static str, u8>)> =
    LazyLock::new(|| {
        let mut by_id = HashMap::new();
        let mut by_name = HashMap::new();

        for line in LEGACY_ID_DATA.lines() {
            if line.is_empty() {
                continue;
            }

            let parsed = line
                .split_once('\t')
                .and_then(|(id, name)| Some((id.parse::<u8>().ok()?, name)));

            match parsed {
                Some((id, name)) => {
                    by_id.insert(id, name);
                    by_name.insert(name, id);
                }
                None => log::warn!("malformed legacy id table line: {line:?}"),
            }
        }

        (by_id, by_name)
    });

#[inline]
fn strip_namespace(name: &str) -> &str {
    name.strip_prefix(MINECRAFT_PREFIX).unwrap_or(name)
}

/// Translates a pre-flattening block name and meta value to the
/// post-flattening name.
///
/// Lookup tries the exact `(name, meta)` pair first, then the bare name,
/// and finally leaves the name unchanged rather than fabricating a
/// flattened form for unknown blocks. The result is always
/// `minecraft:`-prefixed.
pub fn flatten(name: &str, meta: u8) -> String {
    let bare = strip_namespace(name);
    let keyed = format!("{bare}:{meta}");

    let flattened = FLATTEN_TABLE
        .get(keyed.as_str())
        .or_else(|| FLATTEN_TABLE.get(bare))
        .copied()
        .unwrap_or(bare);

    format!("{MINECRAFT_PREFIX}{flattened}")
}

/// The pre-flattening Java name for a numeric block ID.
#[inline]
pub fn legacy_name(id: u8) -> Option<&'static str> {
    LEGACY_IDS.0.get(&id).copied()
}

/// The numeric Java block ID for a pre-flattening name.
#[inline]
pub fn legacy_id(name: &str) -> Option<u8> {
    LEGACY_IDS.1.get(strip_namespace(name)).copied()
}

/// Translates a pre-1.13 Java `(id, meta)` pair straight to a
/// post-flattening name. `None` if the ID is not a known 1.12 block.
pub fn flatten_java_legacy(id: u8, meta: u8) -> Option<String> {
    legacy_name(id).map(|name| flatten(name, meta))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_specific_lookup() {
        assert_eq!(flatten("wool", 7), "minecraft:gray_wool");
        assert_eq!(flatten("stone", 1), "minecraft:granite");
        // The orientation bits of log meta are listed per value in the table.
        assert_eq!(flatten("log", 4), "minecraft:oak_log");
        assert_eq!(flatten("log", 13), "minecraft:spruce_log");
    }

    #[test]
    fn bare_name_fallback() {
        assert_eq!(flatten("noteblock", 0), "minecraft:note_block");
        assert_eq!(flatten("noteblock", 9), "minecraft:note_block");
    }

    #[test]
    fn unknown_names_pass_through() {
        assert_eq!(flatten("unknown_block", 3), "minecraft:unknown_block");
        assert_eq!(flatten("minecraft:unknown_block", 3), "minecraft:unknown_block");
    }

    #[test]
    fn chained_entries_resolve_to_their_final_name() {
        // tallgrass:1 pointed at "grass", itself a legacy key for
        // grass_block; the chain is followed when the table is built.
        assert_eq!(flatten("tallgrass", 1), "minecraft:grass_block");
        assert_eq!(flatten("grass", 1), "minecraft:grass_block");
        assert_eq!(flatten("tallgrass", 0), "minecraft:dead_bush");
    }

    #[test]
    fn translation_is_idempotent() {
        let keys = [
            ("wool", 7_u8),
            ("log", 4),
            ("planks", 2),
            ("tallgrass", 1),
            ("unknown", 0),
        ];
        for (name, meta) in keys {
            let once = flatten(name, meta);
            let twice = flatten(&once, meta);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn numeric_ids_round_trip() {
        assert_eq!(legacy_name(1), Some("stone"));
        assert_eq!(legacy_name(35), Some("wool"));
        assert_eq!(legacy_id("minecraft:wool"), Some(35));
        assert_eq!(legacy_name(253), None);

        assert_eq!(flatten_java_legacy(35, 7).as_deref(), Some("minecraft:gray_wool"));
        assert_eq!(flatten_java_legacy(253, 0), None);
    }
}
