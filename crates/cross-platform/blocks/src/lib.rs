//! Cross-version block identity: the 1.13 "flattening" table mapping
//! pre-flattening `(name, meta)` pairs to post-flattening names, and the
//! numeric-ID registry for pre-1.13 Java blocks.
//!
//! Both tables live in `data/*.tsv` and are loaded once, on first use,
//! into immutable maps. Keeping the mapping in data files rather than
//! source literals keeps it auditable.

mod registry;

pub use self::registry::{flatten, flatten_java_legacy, legacy_id, legacy_name};


/// The namespace prefixed to every translated name.
pub const MINECRAFT_PREFIX: &str = "minecraft:";
