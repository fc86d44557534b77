//! Codec for a whole Java chunk: the outer compound with its `DataVersion`
//! marker and the `Level` compound holding positions, biomes, sections and
//! entity lists.

use thiserror::Error;

use strata_chunk::{BiomeMap, Chunk, Finalization, Subchunk, SubchunkSlotError};
use strata_datatypes::ChunkPosition;
use strata_nbt::{NbtCompound, NbtList, NbtStructureError, NbtTag};

use crate::subchunk_codec::{JavaSubchunkCodec, JavaSubchunkError};


/// Decodes an outer chunk compound, routing the section codec by the
/// chunk's `DataVersion`.
pub fn decode_chunk(root: &NbtCompound) -> Result<Chunk, JavaChunkError> {
    let data_version = root.get_opt::<i32>("DataVersion")?;
    let codec = JavaSubchunkCodec::for_data_version(data_version)?;

    let level = root.get::<&NbtCompound>("Level")?;

    let pos = ChunkPosition {
        x: level.get::<i32>("xPos")?,
        z: level.get::<i32>("zPos")?,
    };
    let mut chunk = Chunk::new(pos);

    // Anvil chunks predate the finalization flag; a stored chunk is
    // simply generated.
    chunk.set_finalization(Finalization::Unsupported);

    if let Some(biomes) = level.tag("Biomes") {
        chunk.set_biomes(decode_biomes(biomes)?);
    }

    if let Some(last_update) = level.get_opt::<i64>("LastUpdate")? {
        chunk.set_last_update(last_update);
    }
    if let Some(inhabited) = level.get_opt::<i64>("InhabitedTime")? {
        chunk.set_inhabited_time(inhabited);
    }

    if let Some(sections) = level.get_opt::<&NbtList>("Sections")? {
        for entry in sections {
            let section: &NbtCompound = entry.try_into()?;

            // 1.13+ files carry marker sections (often Y = -1) with no
            // block data. Those are skipped, not errors.
            if !section.contains_key("Blocks") && !section.contains_key("Palette") {
                continue;
            }

            match codec.decode(section) {
                Ok(subchunk) => {
                    chunk.insert_subchunk(subchunk)?;
                }
                Err(JavaSubchunkError::SectionYOutOfRange(y)) => {
                    log::warn!("skipping section with out-of-range Y {y} in chunk {pos:?}");
                }
                Err(other) => return Err(other.into()),
            }
        }
    }

    if let Some(entities) = level.get_opt::<&NbtList>("Entities")? {
        *chunk.entities_mut() = compound_list(entities)?;
    }
    if let Some(block_entities) = level.get_opt::<&NbtList>("TileEntities")? {
        *chunk.block_entities_mut() = compound_list(block_entities)?;
    }

    Ok(chunk)
}

/// Encodes a chunk into its outer compound, the inverse of
/// [`decode_chunk`]. The caller chooses the target `DataVersion`; omit it
/// to write the pre-1.13 layout.
pub fn encode_chunk(
    chunk:        &Chunk,
    data_version: Option<i32>,
) -> Result<NbtCompound, JavaChunkError> {
    let codec = JavaSubchunkCodec::for_data_version(data_version)?;

    let mut level = NbtCompound::new();
    level.insert("xPos", chunk.pos().x);
    level.insert("zPos", chunk.pos().z);
    level.insert("LastUpdate", chunk.last_update());
    level.insert("InhabitedTime", chunk.inhabited_time());

    match chunk.biomes() {
        BiomeMap::Bytes(bytes) => {
            let biomes: Vec<i8> = bytes.iter().map(|&biome| biome as i8).collect();
            level.insert("Biomes", biomes);
        }
        BiomeMap::Ints(ints) => {
            level.insert("Biomes", ints.clone());
        }
    }

    let mut sections = NbtList::new();
    for subchunk in chunk.subchunks() {
        sections.push(codec.encode(subchunk)?);
    }
    level.insert("Sections", sections);

    let mut entities = NbtList::new();
    for entity in chunk.entities() {
        entities.push(entity.clone());
    }
    level.insert("Entities", entities);

    let mut block_entities = NbtList::new();
    for block_entity in chunk.block_entities() {
        block_entities.push(block_entity.clone());
    }
    level.insert("TileEntities", block_entities);

    let mut root = NbtCompound::new();
    if let Some(version) = data_version {
        root.insert("DataVersion", version);
    }
    root.insert("Level", level);
    Ok(root)
}

fn decode_biomes(biomes: &NbtTag) -> Result<BiomeMap, JavaChunkError> {
    match biomes {
        NbtTag::ByteArray(bytes) => {
            if bytes.len() != 256 {
                return Err(JavaChunkError::BadBiomeLength(bytes.len()));
            }

            let mut map = Box::new([0_u8; 256]);
            for (slot, &byte) in map.iter_mut().zip(bytes) {
                *slot = byte as u8;
            }
            Ok(BiomeMap::Bytes(map))
        }
        // 256 columns up to 1.14, 1024 cells afterwards.
        NbtTag::IntArray(ints) => Ok(BiomeMap::Ints(ints.clone())),
        other => Err(NbtStructureError::type_mismatch("ByteArray or IntArray", other.type_name()).into()),
    }
}

fn compound_list(list: &NbtList) -> Result<Vec<NbtCompound>, JavaChunkError> {
    let mut compounds = Vec::with_capacity(list.len());
    for entry in list {
        let compound: &NbtCompound = entry.try_into()?;
        compounds.push(compound.clone());
    }
    Ok(compounds)
}

#[derive(Error, Debug)]
pub enum JavaChunkError {
    #[error(transparent)]
    Structure(#[from] NbtStructureError),
    #[error(transparent)]
    Subchunk(#[from] JavaSubchunkError),
    #[error("chunk Biomes array holds {0} bytes, expected 256")]
    BadBiomeLength(usize),
    #[error(transparent)]
    SubchunkSlot(#[from] SubchunkSlotError),
}

#[cfg(test)]
mod tests {
    use strata_chunk::BlockState;

    use super::*;

    fn sample_chunk() -> Chunk {
        let mut chunk = Chunk::new(ChunkPosition::new(7, -3));
        chunk
            .set_block(0, 0, 0, 0, BlockState::modern("minecraft:bedrock"))
            .unwrap();
        chunk
            .set_block(4, 77, 9, 0, BlockState::modern("minecraft:stone"))
            .unwrap();
        chunk.set_last_update(99);
        chunk.set_inhabited_time(1234);
        chunk.biomes_mut().set_column(3, 3, 7);

        let mut entity = NbtCompound::new();
        entity.insert("id", "minecraft:creeper");
        chunk.entities_mut().push(entity);

        chunk
    }

    #[test]
    fn chunk_round_trip_via_nbt() {
        let chunk = sample_chunk();
        let root = encode_chunk(&chunk, Some(2566)).unwrap();

        assert_eq!(root.get::<i32>("DataVersion").unwrap(), 2566);
        let level = root.get::<&NbtCompound>("Level").unwrap();
        assert_eq!(level.get::<i32>("xPos").unwrap(), 7);
        assert_eq!(level.get::<i32>("zPos").unwrap(), -3);
        // Two populated sections: slots 0 and 4.
        assert_eq!(level.get::<&NbtList>("Sections").unwrap().len(), 2);

        let reread = decode_chunk(&root).unwrap();
        assert_eq!(reread.pos(), chunk.pos());
        assert_eq!(reread.last_update(), 99);
        assert_eq!(reread.inhabited_time(), 1234);
        assert_eq!(reread.biomes().column(3, 3), Some(7));
        assert_eq!(reread.entities().len(), 1);
        assert_eq!(
            reread.block(4, 77, 9).unwrap(),
            &BlockState::modern("minecraft:stone"),
        );
        assert!(reread.block(1, 1, 1).unwrap().is_air());
    }

    #[test]
    fn marker_sections_are_skipped() {
        let chunk = sample_chunk();
        let mut root = encode_chunk(&chunk, Some(2566)).unwrap();

        // Splice in an empty marker section like 1.13+ writes.
        let mut marker = NbtCompound::new();
        marker.insert("Y", -1_i8);

        let level: &NbtCompound = root.get("Level").unwrap();
        let mut level = level.clone();
        let mut sections = level.get::<&NbtList>("Sections").unwrap().clone();
        sections.push(marker);
        level.insert("Sections", sections);
        root.insert("Level", level);

        let reread = decode_chunk(&root).unwrap();
        assert_eq!(reread.subchunks().count(), 2);
    }

    #[test]
    fn unsupported_data_version_is_rejected() {
        let chunk = sample_chunk();
        assert!(matches!(
            encode_chunk(&chunk, Some(3465)),
            Err(JavaChunkError::Subchunk(JavaSubchunkError::UnknownVersion(3465))),
        ));
    }
}
