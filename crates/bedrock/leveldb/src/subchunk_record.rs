//! The `SubchunkBlocks` record: palettized block storages with a
//! little-endian NBT palette.
//!
//! ```text
//! u8 version                  # 1 = single storage, 8 = multi storage
//! if version == 8: u8 storage count
//! per storage:
//!   u8 flags                  # bits-per-index << 1 | runtime flag
//!   u32 words[...]            # little-endian, non-spanning
//!   i32 palette length        # little-endian
//!   palette length × NBT compound { "name": String, "val": Int }
//! ```
//!
//! A flags width of 0 means every cell is palette entry 0 and no words are
//! stored. The runtime flag marks a palette of transient runtime IDs; no
//! serialized mapping for those exists, so such storages are rejected.

use std::io::{Cursor, Read as _};

use thiserror::Error;

use strata_chunk::packed::{self, BitPackError, CELLS_PER_SUBCHUNK};
use strata_chunk::{
    BlockState, BlockStorage, StorageCheckError, Subchunk, storage_type,
};
use strata_nbt::io::{NbtIoError, read_compound, write_compound};
use strata_nbt::{IoOptions, NbtCompound, NbtStructureError};
use strata_util::u64_equals_usize;


/// Which record version to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordVersion {
    /// The 1.2.13 single-storage layout.
    V1,
    /// The 1.3+ multi-storage layout.
    V8,
}

/// Decodes a subchunk record; `y` is the subchunk index from the key.
pub fn decode_subchunk_record(y: u8, value: &[u8]) -> Result<Subchunk, BedrockSubchunkError> {
    let Some(&version) = value.first() else {
        return Err(BedrockSubchunkError::NoHeader);
    };

    let mut reader = Cursor::new(&value[1..]);
    let mut storages = Vec::new();

    match version {
        1 => {
            storages.push(read_storage(&mut reader)?);
        }
        8 => {
            let mut count = [0; 1];
            reader
                .read_exact(&mut count)
                .map_err(|_| BedrockSubchunkError::NoHeader)?;

            for _ in 0..count[0] {
                storages.push(read_storage(&mut reader)?);
            }
        }
        other => return Err(BedrockSubchunkError::UnknownVersion(other)),
    }

    if !u64_equals_usize(reader.position(), value.len() - 1) {
        return Err(BedrockSubchunkError::NotAllRead);
    }

    if storages.is_empty() {
        return Err(BedrockSubchunkError::NoStorages);
    }

    Ok(Subchunk::with_storages(y, storages).expect("at least one storage was decoded"))
}

fn read_storage(reader: &mut Cursor<&[u8]>) -> Result<BlockStorage, BedrockSubchunkError> {
    let mut flags = [0; 1];
    reader
        .read_exact(&mut flags)
        .map_err(|_| BedrockSubchunkError::NoHeader)?;

    let bits = flags[0] >> 1;
    let is_runtime = flags[0] & 1 != 0;

    if is_runtime {
        return Err(BedrockSubchunkError::RuntimeIdUnsupported);
    }
    if bits > 16 {
        return Err(BedrockSubchunkError::InvalidBitsPerIndex(bits));
    }

    let indices = if bits == 0 {
        // Every cell is palette entry 0; no words are stored.
        Box::new([0_u16; CELLS_PER_SUBCHUNK])
    } else {
        let word_count = packed::u32_word_count(bits);
        let mut raw = vec![0_u8; word_count * 4];
        reader
            .read_exact(&mut raw)
            .map_err(|_| BedrockSubchunkError::ShortIndices)?;

        let words: Vec<u32> = raw
            .chunks_exact(4)
            .map(|bytes| u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            .collect();

        packed::unpack_u32(&words, bits)?
    };

    let mut palette_len = [0; 4];
    reader
        .read_exact(&mut palette_len)
        .map_err(|_| BedrockSubchunkError::ShortPalette)?;
    let palette_len = i32::from_le_bytes(palette_len);
    let palette_len =
        usize::try_from(palette_len).map_err(|_| BedrockSubchunkError::BadPaletteLen(palette_len))?;

    let mut palette = Vec::with_capacity(palette_len.min(4096));
    for _ in 0..palette_len {
        let (compound, _) = read_compound(reader, IoOptions::bedrock_uncompressed())?;
        palette.push(palette_entry_to_state(&compound)?);
    }

    Ok(BlockStorage::new_checked(palette, indices)?)
}

/// Encodes a subchunk into a record. Version 1 can only represent a single
/// storage.
pub fn encode_subchunk_record(
    subchunk: &Subchunk,
    version:  RecordVersion,
) -> Result<Vec<u8>, BedrockSubchunkError> {
    let mut bytes = Vec::new();

    match version {
        RecordVersion::V1 => {
            if subchunk.storage_count() > 1 {
                return Err(BedrockSubchunkError::MultiStorageUnrepresentable {
                    storages: subchunk.storage_count(),
                });
            }
            bytes.push(1);
        }
        RecordVersion::V8 => {
            let count = u8::try_from(subchunk.storage_count()).map_err(|_| {
                BedrockSubchunkError::MultiStorageUnrepresentable {
                    storages: subchunk.storage_count(),
                }
            })?;
            bytes.push(8);
            bytes.push(count);
        }
    }

    for storage in subchunk.storages() {
        write_storage(storage, &mut bytes)?;
    }

    Ok(bytes)
}

fn write_storage(
    storage: &BlockStorage,
    bytes:   &mut Vec<u8>,
) -> Result<(), BedrockSubchunkError> {
    let palette = storage.palette();

    // Storages cap their palettes at 2^16 entries, so a width exists.
    let bits = storage_type(palette.len()).expect("palette length fits a packable width");

    bytes.push(bits << 1);

    let words = packed::pack_u32(storage.indices(), bits)?;
    bytes.reserve(words.len() * 4 + 4);
    for word in words {
        bytes.extend(word.to_le_bytes());
    }

    bytes.extend((palette.len() as i32).to_le_bytes());

    for state in palette {
        let compound = state_to_palette_entry(state)?;
        write_compound(bytes, IoOptions::bedrock_uncompressed(), None, &compound)?;
    }

    Ok(())
}

fn palette_entry_to_state(compound: &NbtCompound) -> Result<BlockState, BedrockSubchunkError> {
    let name = compound.get::<&String>("name")?;
    let val = compound.get::<i32>("val")?;
    Ok(BlockState::bedrock_legacy(name.clone(), val))
}

fn state_to_palette_entry(state: &BlockState) -> Result<NbtCompound, BedrockSubchunkError> {
    let (name, val) = match state {
        BlockState::BedrockLegacy { name, val } => (name.as_str(), *val),
        // Fresh storages are seeded with the shared air state.
        state if state.is_air() => ("minecraft:air", 0),
        state => {
            return Err(BedrockSubchunkError::UnrepresentableState(format!("{state:?}")));
        }
    };

    let mut compound = NbtCompound::new();
    compound.insert("name", name);
    compound.insert("val", val);
    Ok(compound)
}

#[derive(Error, Debug)]
pub enum BedrockSubchunkError {
    #[error("subchunk record is truncated before its header ends")]
    NoHeader,
    #[error("subchunk record version {0} is not supported (expected 1 or 8)")]
    UnknownVersion(u8),
    #[error("a block storage declares a runtime-ID palette, which is never persisted")]
    RuntimeIdUnsupported,
    #[error("a block storage declares {0} bits per index, above the 16-bit limit")]
    InvalidBitsPerIndex(u8),
    #[error("subchunk record ends before its packed indices do")]
    ShortIndices,
    #[error("subchunk record ends before its palette length")]
    ShortPalette,
    #[error("palette length {0} is not usable")]
    BadPaletteLen(i32),
    #[error("bytes were left over after parsing a subchunk record")]
    NotAllRead,
    #[error("a subchunk record decoded to zero storages")]
    NoStorages,
    #[error("{storages} storages cannot be written to a single-storage record")]
    MultiStorageUnrepresentable {
        storages: usize,
    },
    #[error("block state {0} cannot be stored in a Bedrock palette")]
    UnrepresentableState(String),
    #[error(transparent)]
    BitPack(#[from] BitPackError),
    #[error(transparent)]
    Storage(#[from] StorageCheckError),
    #[error("error while reading or writing a palette compound: {0}")]
    Nbt(#[from] NbtIoError),
    #[error("palette compound is missing or mistypes a field: {0}")]
    Structure(#[from] NbtStructureError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy(name: &str, val: i32) -> BlockState {
        BlockState::bedrock_legacy(name, val)
    }

    fn sample_subchunk() -> Subchunk {
        let mut subchunk = Subchunk::new(3);
        subchunk.set_block(0, 0, 0, 0, legacy("minecraft:bedrock", 0)).unwrap();
        subchunk.set_block(1, 2, 3, 0, legacy("minecraft:stone", 0)).unwrap();
        subchunk.set_block(1, 2, 3, 1, legacy("minecraft:water", 0)).unwrap();
        subchunk
    }

    #[test]
    fn v8_round_trip_with_two_storages() {
        let subchunk = sample_subchunk();
        let bytes = encode_subchunk_record(&subchunk, RecordVersion::V8).unwrap();

        assert_eq!(&bytes[..2], &[8, 2]);

        let reread = decode_subchunk_record(3, &bytes).unwrap();
        assert_eq!(reread.y(), 3);
        assert_eq!(reread.storage_count(), 2);
        assert_eq!(
            reread.block(0, 0, 0, 0).unwrap(),
            &legacy("minecraft:bedrock", 0),
        );
        assert_eq!(
            reread.block(1, 2, 3, 1).unwrap(),
            &legacy("minecraft:water", 0),
        );
        assert!(reread.block(0, 0, 0, 1).unwrap().is_air());

        // Byte-for-byte inverse.
        let rewritten = encode_subchunk_record(&reread, RecordVersion::V8).unwrap();
        assert_eq!(rewritten, bytes);
    }

    #[test]
    fn v1_records_hold_one_storage() {
        let mut subchunk = Subchunk::new(0);
        subchunk.set_block(9, 9, 9, 0, legacy("minecraft:planks", 2)).unwrap();

        let bytes = encode_subchunk_record(&subchunk, RecordVersion::V1).unwrap();
        assert_eq!(bytes[0], 1);

        let reread = decode_subchunk_record(0, &bytes).unwrap();
        assert_eq!(
            reread.block(9, 9, 9, 0).unwrap(),
            &legacy("minecraft:planks", 2),
        );

        let layered = sample_subchunk();
        assert!(matches!(
            encode_subchunk_record(&layered, RecordVersion::V1),
            Err(BedrockSubchunkError::MultiStorageUnrepresentable { storages: 2 }),
        ));
    }

    #[test]
    fn single_entry_palettes_pack_at_one_bit() {
        let subchunk = Subchunk::new(0);
        let bytes = encode_subchunk_record(&subchunk, RecordVersion::V1).unwrap();

        // version, flags 1<<1, 128 zero words, palette length 1, air.
        assert_eq!(bytes[1], 0b10);
        assert!(bytes[2..2 + 512].iter().all(|&byte| byte == 0));
        assert_eq!(&bytes[2 + 512..2 + 516], &1_i32.to_le_bytes());

        let reread = decode_subchunk_record(0, &bytes).unwrap();
        assert!(reread.block(15, 15, 15, 0).unwrap().is_air());

        assert_eq!(encode_subchunk_record(&reread, RecordVersion::V1).unwrap(), bytes);
    }

    #[test]
    fn width_zero_records_decode_as_uniform() {
        // A record using the reserved width 0: no words, a single palette
        // entry that every cell points at.
        let mut bytes = vec![1, 0];
        bytes.extend(1_i32.to_le_bytes());
        write_compound(
            &mut bytes,
            IoOptions::bedrock_uncompressed(),
            None,
            &state_to_palette_entry(&legacy("minecraft:bedrock", 0)).unwrap(),
        )
        .unwrap();

        let reread = decode_subchunk_record(0, &bytes).unwrap();
        assert_eq!(
            reread.block(0, 0, 0, 0).unwrap(),
            &legacy("minecraft:bedrock", 0),
        );
        assert_eq!(
            reread.block(15, 15, 15, 0).unwrap(),
            &legacy("minecraft:bedrock", 0),
        );
    }

    #[test]
    fn runtime_palettes_are_rejected() {
        let subchunk = sample_subchunk();
        let mut bytes = encode_subchunk_record(&subchunk, RecordVersion::V8).unwrap();

        // Find the second storage's flags byte by encoding the first
        // storage alone: a V1 record is one version byte plus that storage.
        let first_only = Subchunk::with_storages(
            3,
            vec![subchunk.storage(0).unwrap().clone()],
        )
        .unwrap();
        let first_len = encode_subchunk_record(&first_only, RecordVersion::V1)
            .unwrap()
            .len()
            - 1;

        // Set the runtime bit on the second storage.
        bytes[2 + first_len] |= 1;
        assert!(matches!(
            decode_subchunk_record(3, &bytes),
            Err(BedrockSubchunkError::RuntimeIdUnsupported),
        ));
    }

    #[test]
    fn version_bytes_are_validated() {
        assert!(matches!(
            decode_subchunk_record(0, &[]),
            Err(BedrockSubchunkError::NoHeader),
        ));
        assert!(matches!(
            decode_subchunk_record(0, &[7]),
            Err(BedrockSubchunkError::UnknownVersion(7)),
        ));

        // Trailing garbage is rejected.
        let mut bytes =
            encode_subchunk_record(&Subchunk::new(0), RecordVersion::V8).unwrap();
        bytes.push(0xEE);
        assert!(matches!(
            decode_subchunk_record(0, &bytes),
            Err(BedrockSubchunkError::NotAllRead),
        ));
    }
}
