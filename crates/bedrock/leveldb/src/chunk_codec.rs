//! Assembles whole chunks from their per-tag records and writes them back.

use thiserror::Error;

use strata_chunk::{BiomeMap, Chunk, Finalization, SubchunkSlotError};
use strata_datatypes::{ChunkPosition, Dimension};

use crate::data_2d::Data2D;
use crate::key::{DimensionedChunkPos, RecordKey};
use crate::kv::{KvError, KvStore};
use crate::nbt_stream::{ConcatenatedCompounds, NbtStreamError};
use crate::subchunk_record::{
    BedrockSubchunkError, RecordVersion, decode_subchunk_record, encode_subchunk_record,
};


/// The chunk version byte written to the version record. Reads only test
/// the record for presence, so older worlds load regardless of the value.
pub const CHUNK_VERSION: u8 = 15;

/// Reads the chunk at `pos`, or `None` if its version record is absent
/// (the chunk was never generated).
pub fn read_chunk<K: KvStore>(
    store:     &mut K,
    pos:       ChunkPosition,
    dimension: Dimension,
) -> Result<Option<Chunk>, BedrockChunkError> {
    let dim_pos = DimensionedChunkPos::new(pos, dimension);

    if !store.has(&RecordKey::Version(dim_pos).to_bytes())? {
        return Ok(None);
    }

    let mut chunk = Chunk::new(pos);

    for y in 0..16 {
        let key = RecordKey::SubchunkBlocks(dim_pos, y).to_bytes();
        let Some(value) = store.get(&key)? else {
            continue;
        };

        let subchunk = decode_subchunk_record(y, &value)
            .map_err(|source| BedrockChunkError::Subchunk { y, source })?;
        chunk.insert_subchunk(subchunk)?;
    }

    if let Some(value) = store.get(&RecordKey::Data2D(dim_pos).to_bytes())? {
        match Data2D::parse(&value) {
            Some(data) => {
                chunk.set_height_map(Some(data.heights));
                chunk.set_biomes(BiomeMap::Bytes(data.biomes));
            }
            None => return Err(BedrockChunkError::BadData2D { len: value.len() }),
        }
    }

    if let Some(value) = store.get(&RecordKey::BlockEntities(dim_pos).to_bytes())? {
        *chunk.block_entities_mut() = ConcatenatedCompounds::parse(&value)?.0;
    }
    if let Some(value) = store.get(&RecordKey::Entities(dim_pos).to_bytes())? {
        *chunk.entities_mut() = ConcatenatedCompounds::parse(&value)?.0;
    }

    // Absent on pre-1.1 worlds.
    match store.get(&RecordKey::FinalizedState(dim_pos).to_bytes())? {
        Some(value) if value.len() == 4 => {
            let raw = u32::from_le_bytes([value[0], value[1], value[2], value[3]]);
            match Finalization::from_numeric(raw) {
                Some(finalization) => chunk.set_finalization(finalization),
                None => {
                    log::warn!("chunk {pos:?} has unknown finalization value {raw}");
                    chunk.set_finalization(Finalization::Unsupported);
                }
            }
        }
        Some(value) => {
            return Err(BedrockChunkError::BadFinalization { len: value.len() });
        }
        None => chunk.set_finalization(Finalization::Unsupported),
    }

    Ok(Some(chunk))
}

/// Writes every record of `chunk`, deleting records for parts the chunk no
/// longer has.
pub fn write_chunk<K: KvStore>(
    store:     &mut K,
    chunk:     &Chunk,
    dimension: Dimension,
    version:   RecordVersion,
) -> Result<(), BedrockChunkError> {
    let dim_pos = DimensionedChunkPos::new(chunk.pos(), dimension);

    store.put(&RecordKey::Version(dim_pos).to_bytes(), &[CHUNK_VERSION])?;

    for y in 0..16 {
        let key = RecordKey::SubchunkBlocks(dim_pos, y).to_bytes();

        match chunk.subchunk(y) {
            Some(subchunk) => {
                let value = encode_subchunk_record(subchunk, version)
                    .map_err(|source| BedrockChunkError::Subchunk { y, source })?;
                store.put(&key, &value)?;
            }
            None => store.delete(&key)?,
        }
    }

    let data_2d = Data2D {
        heights: Box::new(chunk.height_map().copied().unwrap_or([0; 256])),
        biomes:  match chunk.biomes() {
            BiomeMap::Bytes(bytes) => bytes.clone(),
            BiomeMap::Ints(ints) => {
                log::warn!(
                    "chunk {:?} has a Java int biome layout; truncating to bytes",
                    chunk.pos(),
                );
                let mut bytes = Box::new([0_u8; 256]);
                for (slot, &biome) in bytes.iter_mut().zip(ints) {
                    *slot = biome as u8;
                }
                bytes
            }
        },
    };
    store.put(&RecordKey::Data2D(dim_pos).to_bytes(), &data_2d.to_bytes())?;

    let block_entities_key = RecordKey::BlockEntities(dim_pos).to_bytes();
    if chunk.block_entities().is_empty() {
        store.delete(&block_entities_key)?;
    } else {
        let stream = ConcatenatedCompounds(chunk.block_entities().to_vec());
        store.put(&block_entities_key, &stream.to_bytes().map_err(NbtStreamError::from)?)?;
    }

    let entities_key = RecordKey::Entities(dim_pos).to_bytes();
    if chunk.entities().is_empty() {
        store.delete(&entities_key)?;
    } else {
        let stream = ConcatenatedCompounds(chunk.entities().to_vec());
        store.put(&entities_key, &stream.to_bytes().map_err(NbtStreamError::from)?)?;
    }

    match chunk.finalization().to_numeric() {
        Some(raw) => {
            store.put(
                &RecordKey::FinalizedState(dim_pos).to_bytes(),
                &raw.to_le_bytes(),
            )?;
        }
        None => store.delete(&RecordKey::FinalizedState(dim_pos).to_bytes())?,
    }

    Ok(())
}

#[derive(Error, Debug)]
pub enum BedrockChunkError {
    #[error(transparent)]
    Kv(#[from] KvError),
    #[error("error in the subchunk record at Y {y}: {source}")]
    Subchunk {
        y:      u8,
        source: BedrockSubchunkError,
    },
    #[error(transparent)]
    SubchunkSlot(#[from] SubchunkSlotError),
    #[error("Data2D record holds {len} bytes, expected 768")]
    BadData2D {
        len: usize,
    },
    #[error("finalization record holds {len} bytes, expected 4")]
    BadFinalization {
        len: usize,
    },
    #[error(transparent)]
    NbtStream(#[from] NbtStreamError),
}

#[cfg(test)]
mod tests {
    use strata_chunk::BlockState;
    use strata_nbt::NbtCompound;

    use crate::kv::MemoryStore;

    use super::*;

    fn sample_chunk(pos: ChunkPosition) -> Chunk {
        let mut chunk = Chunk::new(pos);
        chunk
            .set_block(0, 0, 0, 0, BlockState::bedrock_legacy("minecraft:bedrock", 0))
            .unwrap();
        chunk
            .set_block(8, 70, 8, 0, BlockState::bedrock_legacy("minecraft:wool", 7))
            .unwrap();
        chunk.biomes_mut().set_column(1, 1, 4);

        let mut block_entity = NbtCompound::new();
        block_entity.insert("id", "Chest");
        chunk.block_entities_mut().push(block_entity);

        chunk.set_finalization(Finalization::Generated);
        chunk
    }

    #[test]
    fn missing_version_record_means_not_generated() {
        let mut store = MemoryStore::new();
        let pos = ChunkPosition::new(0, 0);
        assert!(read_chunk(&mut store, pos, Dimension::OverWorld)
            .unwrap()
            .is_none());
    }

    #[test]
    fn chunk_round_trip_through_the_store() {
        let mut store = MemoryStore::new();
        let pos = ChunkPosition::new(5, -9);
        let chunk = sample_chunk(pos);

        write_chunk(&mut store, &chunk, Dimension::OverWorld, RecordVersion::V8).unwrap();

        let reread = read_chunk(&mut store, pos, Dimension::OverWorld)
            .unwrap()
            .expect("chunk exists after write");

        assert_eq!(reread.pos(), pos);
        assert_eq!(reread.finalization(), Finalization::Generated);
        assert_eq!(reread.biomes().column(1, 1), Some(4));
        assert_eq!(reread.block_entities().len(), 1);
        assert_eq!(
            reread.block(8, 70, 8).unwrap(),
            &BlockState::bedrock_legacy("minecraft:wool", 7),
        );
        assert!(reread.block(8, 71, 8).unwrap().is_air());

        // Subchunk slots 0 and 4 are populated, nothing else.
        assert_eq!(reread.subchunks().count(), 2);
    }

    #[test]
    fn dimensions_do_not_collide() {
        let mut store = MemoryStore::new();
        let pos = ChunkPosition::new(2, 2);

        let chunk = sample_chunk(pos);
        write_chunk(&mut store, &chunk, Dimension::Nether, RecordVersion::V8).unwrap();

        assert!(read_chunk(&mut store, pos, Dimension::OverWorld)
            .unwrap()
            .is_none());
        assert!(read_chunk(&mut store, pos, Dimension::Nether)
            .unwrap()
            .is_some());
    }

    #[test]
    fn pre_finalization_worlds_read_as_unsupported() {
        let mut store = MemoryStore::new();
        let pos = ChunkPosition::new(0, 0);
        let dim_pos = DimensionedChunkPos::new(pos, Dimension::OverWorld);

        store
            .put(&RecordKey::Version(dim_pos).to_bytes(), &[9])
            .unwrap();

        let chunk = read_chunk(&mut store, pos, Dimension::OverWorld)
            .unwrap()
            .expect("version record implies existence");
        assert_eq!(chunk.finalization(), Finalization::Unsupported);
    }

    #[test]
    fn removed_parts_are_deleted_on_save() {
        let mut store = MemoryStore::new();
        let pos = ChunkPosition::new(1, 1);
        let dim_pos = DimensionedChunkPos::new(pos, Dimension::OverWorld);

        let mut chunk = sample_chunk(pos);
        write_chunk(&mut store, &chunk, Dimension::OverWorld, RecordVersion::V8).unwrap();
        assert!(store
            .has(&RecordKey::BlockEntities(dim_pos).to_bytes())
            .unwrap());

        chunk.block_entities_mut().clear();
        write_chunk(&mut store, &chunk, Dimension::OverWorld, RecordVersion::V8).unwrap();
        assert!(!store
            .has(&RecordKey::BlockEntities(dim_pos).to_bytes())
            .unwrap());
    }
}
