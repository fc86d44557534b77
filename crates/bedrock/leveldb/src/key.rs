//! Record keys of a Bedrock world database.
//!
//! A chunk record key is the little-endian concatenation
//! `[cx: i32][cz: i32][dimension: i32, elided for the Overworld][tag: u8]`,
//! with subchunk-block keys carrying one extra byte for the subchunk index.

use subslice_to_array::SubsliceToArray as _;

use strata_datatypes::{ChunkPosition, Dimension};


/// The location of a chunk in a world, including its dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DimensionedChunkPos {
    pub pos:       ChunkPosition,
    pub dimension: Dimension,
}

impl DimensionedChunkPos {
    #[inline]
    pub fn new(pos: ChunkPosition, dimension: Dimension) -> Self {
        Self { pos, dimension }
    }

    /// Parses `[cx][cz]` (8 bytes) or `[cx][cz][dimension]` (12 bytes).
    /// An elided dimension is the Overworld.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let dimension = match bytes.len() {
            8 => Dimension::OverWorld,
            12 => {
                let id = i32::from_le_bytes(bytes.subslice_to_array::<8, 12>());
                Dimension::from_storage_id(id)?
            }
            _ => return None,
        };

        Some(Self {
            pos: ChunkPosition {
                x: i32::from_le_bytes(bytes.subslice_to_array::<0, 4>()),
                z: i32::from_le_bytes(bytes.subslice_to_array::<4, 8>()),
            },
            dimension,
        })
    }

    fn extend_serialized(self, bytes: &mut Vec<u8>) {
        bytes.extend(self.pos.x.to_le_bytes());
        bytes.extend(self.pos.z.to_le_bytes());
        if let Some(id) = self.dimension.storage_id() {
            bytes.extend(id.to_le_bytes());
        }
    }
}

/// The per-chunk record keys the chunk codec touches.
///
/// These chunk tag values are also hardcoded in the `parse_recognized_key`
/// and `extend_serialized` match arms below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKey {
    /// Version marker; its presence is what makes a chunk "exist".
    Version(DimensionedChunkPos),
    /// 512-byte heightmap plus 256-byte biome IDs.
    Data2D(DimensionedChunkPos),
    /// Block data for one subchunk, keyed by its vertical index.
    SubchunkBlocks(DimensionedChunkPos, u8),
    /// Concatenated NBT compounds of block entities.
    BlockEntities(DimensionedChunkPos),
    /// Concatenated NBT compounds of entities.
    Entities(DimensionedChunkPos),
    /// Generation state as a little-endian u32; written since 1.1.
    FinalizedState(DimensionedChunkPos),
}

impl RecordKey {
    /// Parses a raw database key into one of the recognized chunk record
    /// keys. Other keys (and chunk tags outside this codec's reach)
    /// return `None`.
    pub fn parse_recognized_key(raw_key: &[u8]) -> Option<Self> {
        match raw_key.len() {
            // [pos][tag]
            9 | 13 => {
                let pos = DimensionedChunkPos::parse(&raw_key[..raw_key.len() - 1])?;
                match raw_key[raw_key.len() - 1] {
                    45  => Some(Self::Data2D(pos)),
                    49  => Some(Self::BlockEntities(pos)),
                    50  => Some(Self::Entities(pos)),
                    54  => Some(Self::FinalizedState(pos)),
                    118 => Some(Self::Version(pos)),
                    _   => None,
                }
            }
            // [pos][47][subchunk index]
            10 | 14 => {
                if raw_key[raw_key.len() - 2] != 47 {
                    return None;
                }
                let pos = DimensionedChunkPos::parse(&raw_key[..raw_key.len() - 2])?;
                let index = raw_key[raw_key.len() - 1];
                Some(Self::SubchunkBlocks(pos, index))
            }
            _ => None,
        }
    }

    /// Extends `bytes` with the raw key.
    pub fn extend_serialized(&self, bytes: &mut Vec<u8>) {
        bytes.reserve(14);

        let (pos, tag) = match *self {
            Self::SubchunkBlocks(pos, index) => {
                pos.extend_serialized(bytes);
                bytes.push(47);
                bytes.push(index);
                return;
            }
            Self::Data2D(pos)         => (pos, 45),
            Self::BlockEntities(pos)  => (pos, 49),
            Self::Entities(pos)       => (pos, 50),
            Self::FinalizedState(pos) => (pos, 54),
            Self::Version(pos)        => (pos, 118),
        };

        pos.extend_serialized(bytes);
        bytes.push(tag);
    }

    #[inline]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        self.extend_serialized(&mut bytes);
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(x: i32, z: i32, dimension: Dimension) -> DimensionedChunkPos {
        DimensionedChunkPos::new(ChunkPosition::new(x, z), dimension)
    }

    #[test]
    fn overworld_keys_elide_the_dimension() {
        let key = RecordKey::Version(pos(1, -2, Dimension::OverWorld));
        let bytes = key.to_bytes();

        assert_eq!(
            bytes,
            [1, 0, 0, 0, 0xFE, 0xFF, 0xFF, 0xFF, 118],
        );
        assert_eq!(RecordKey::parse_recognized_key(&bytes), Some(key));
    }

    #[test]
    fn nether_keys_carry_their_id() {
        let key = RecordKey::SubchunkBlocks(pos(0, 0, Dimension::Nether), 5);
        let bytes = key.to_bytes();

        assert_eq!(
            bytes,
            [0, 0, 0, 0, 0, 0, 0, 0, 10, 0, 0, 0, 47, 5],
        );
        assert_eq!(RecordKey::parse_recognized_key(&bytes), Some(key));

        let end = RecordKey::Data2D(pos(3, 4, Dimension::End)).to_bytes();
        assert_eq!(end[8..12], [20, 0, 0, 0]);
        assert_eq!(end[12], 45);
    }

    #[test]
    fn unknown_keys_parse_to_none() {
        assert_eq!(RecordKey::parse_recognized_key(b"BiomeData"), None);
        // Chunk-shaped key with a tag outside the recognized set.
        let mut bytes = pos(0, 0, Dimension::OverWorld).pos.x.to_le_bytes().to_vec();
        bytes.extend([0, 0, 0, 0]);
        bytes.push(51);
        assert_eq!(RecordKey::parse_recognized_key(&bytes), None);
        // Unknown dimension id.
        let mut bytes = vec![0; 8];
        bytes.extend(7_i32.to_le_bytes());
        bytes.push(118);
        assert_eq!(RecordKey::parse_recognized_key(&bytes), None);
    }
}
