use thiserror::Error;

use strata_datatypes::ChunkPosition;
use strata_nbt::NbtCompound;

use crate::block_state::BlockState;
use crate::subchunk::{Subchunk, SubchunkAccessError};


/// Per-chunk generation status, introduced by Bedrock 1.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finalization {
    /// The storage format predates finalization and carries no flag.
    Unsupported,
    /// The chunk has not been generated; it holds no subchunk data and
    /// reads as all air.
    NotGenerated,
    /// Generated, but mobs are not spawned yet.
    NotSpawnMobs,
    /// Fully generated.
    Generated,
}

impl Finalization {
    #[inline]
    pub fn from_numeric(id: u32) -> Option<Self> {
        match id {
            0 => Some(Self::NotGenerated),
            1 => Some(Self::NotSpawnMobs),
            2 => Some(Self::Generated),
            _ => None,
        }
    }

    /// The stored numeric value; `None` for [`Unsupported`](Self::Unsupported),
    /// which is never serialized.
    #[inline]
    pub fn to_numeric(self) -> Option<u32> {
        match self {
            Self::Unsupported  => None,
            Self::NotGenerated => Some(0),
            Self::NotSpawnMobs => Some(1),
            Self::Generated    => Some(2),
        }
    }
}

/// Biome IDs for a chunk column.
///
/// Pre-1.13 Java and Bedrock store one byte per column (256 total); 1.13+
/// Java stores ints, 256 of them up to 1.14 and 1024 (in 4×4×4 cells)
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BiomeMap {
    Bytes(Box<[u8; 256]>),
    Ints(Vec<i32>),
}

impl BiomeMap {
    /// The biome of the column `(x, z)`, if the layout is column-based.
    pub fn column(&self, x: u8, z: u8) -> Option<i32> {
        if x >= 16 || z >= 16 {
            return None;
        }
        let index = usize::from(z) * 16 + usize::from(x);

        match self {
            Self::Bytes(bytes) => Some(i32::from(bytes[index])),
            Self::Ints(ints)   => ints.get(index).copied(),
        }
    }

    /// Sets the biome of the column `(x, z)`. Out-of-range coordinates and
    /// non-column layouts are ignored with a warning.
    pub fn set_column(&mut self, x: u8, z: u8, biome: i32) {
        if x >= 16 || z >= 16 {
            log::warn!("ignoring biome write outside the chunk at ({x}, {z})");
            return;
        }
        let index = usize::from(z) * 16 + usize::from(x);

        match self {
            Self::Bytes(bytes) => bytes[index] = biome as u8,
            Self::Ints(ints) => match ints.get_mut(index) {
                Some(entry) => *entry = biome,
                None => log::warn!("ignoring biome write into a non-column biome layout"),
            },
        }
    }
}

impl Default for BiomeMap {
    #[inline]
    fn default() -> Self {
        Self::Bytes(Box::new([0; 256]))
    }
}

/// A 16×16 block column of a world: up to 16 vertically stacked subchunks
/// plus column metadata.
#[derive(Debug, Clone)]
pub struct Chunk {
    pos:            ChunkPosition,
    biomes:         BiomeMap,
    height_map:     Option<Box<[u16; 256]>>,
    subchunks:      [Option<Box<Subchunk>>; 16],
    entities:       Vec<NbtCompound>,
    block_entities: Vec<NbtCompound>,
    finalization:   Finalization,
    last_update:    i64,
    inhabited_time: i64,
}

impl Chunk {
    /// A fresh, ungenerated chunk: no subchunks, all air.
    pub fn new(pos: ChunkPosition) -> Self {
        Self {
            pos,
            biomes:         BiomeMap::default(),
            height_map:     None,
            subchunks:      Default::default(),
            entities:       Vec::new(),
            block_entities: Vec::new(),
            finalization:   Finalization::NotGenerated,
            last_update:    0,
            inhabited_time: 0,
        }
    }

    #[inline]
    pub fn pos(&self) -> ChunkPosition {
        self.pos
    }

    #[inline]
    pub fn biomes(&self) -> &BiomeMap {
        &self.biomes
    }

    #[inline]
    pub fn biomes_mut(&mut self) -> &mut BiomeMap {
        &mut self.biomes
    }

    #[inline]
    pub fn set_biomes(&mut self, biomes: BiomeMap) {
        self.biomes = biomes;
    }

    #[inline]
    pub fn height_map(&self) -> Option<&[u16; 256]> {
        self.height_map.as_deref()
    }

    #[inline]
    pub fn set_height_map(&mut self, height_map: Option<Box<[u16; 256]>>) {
        self.height_map = height_map;
    }

    /// The height of the highest block of the column `(x, z)`,
    /// if a height map is present.
    pub fn height(&self, x: u8, z: u8) -> Option<u16> {
        if x >= 16 || z >= 16 {
            return None;
        }
        let map = self.height_map.as_ref()?;
        Some(map[usize::from(z) * 16 + usize::from(x)])
    }

    #[inline]
    pub fn entities(&self) -> &[NbtCompound] {
        &self.entities
    }

    #[inline]
    pub fn entities_mut(&mut self) -> &mut Vec<NbtCompound> {
        &mut self.entities
    }

    #[inline]
    pub fn block_entities(&self) -> &[NbtCompound] {
        &self.block_entities
    }

    #[inline]
    pub fn block_entities_mut(&mut self) -> &mut Vec<NbtCompound> {
        &mut self.block_entities
    }

    #[inline]
    pub fn finalization(&self) -> Finalization {
        self.finalization
    }

    #[inline]
    pub fn set_finalization(&mut self, finalization: Finalization) {
        self.finalization = finalization;
    }

    #[inline]
    pub fn last_update(&self) -> i64 {
        self.last_update
    }

    #[inline]
    pub fn set_last_update(&mut self, last_update: i64) {
        self.last_update = last_update;
    }

    #[inline]
    pub fn inhabited_time(&self) -> i64 {
        self.inhabited_time
    }

    #[inline]
    pub fn set_inhabited_time(&mut self, inhabited_time: i64) {
        self.inhabited_time = inhabited_time;
    }

    /// The subchunk in vertical slot `index`, if populated.
    pub fn subchunk(&self, index: u8) -> Option<&Subchunk> {
        self.subchunks
            .get(usize::from(index))
            .and_then(|slot| slot.as_deref())
    }

    /// Iterate over the populated subchunks, bottom to top.
    pub fn subchunks(&self) -> impl Iterator<Item = &Subchunk> {
        self.subchunks.iter().filter_map(|slot| slot.as_deref())
    }

    /// Installs a subchunk into the slot named by its own `y` value.
    /// Fails if the slot index is out of range.
    pub fn insert_subchunk(&mut self, subchunk: Subchunk) -> Result<(), SubchunkSlotError> {
        let slot = usize::from(subchunk.y());
        if slot >= self.subchunks.len() {
            return Err(SubchunkSlotError { y: subchunk.y() });
        }

        self.subchunks[slot] = Some(Box::new(subchunk));
        Ok(())
    }

    /// Removes and returns the subchunk in vertical slot `index`.
    pub fn take_subchunk(&mut self, index: u8) -> Option<Box<Subchunk>> {
        self.subchunks.get_mut(usize::from(index))?.take()
    }

    fn check_column(x: u8, y: u16, z: u8) -> Result<(), ChunkAccessError> {
        if x < 16 && z < 16 && y < 256 {
            Ok(())
        } else {
            Err(ChunkAccessError::BadCoord { x, y, z })
        }
    }

    /// The block at chunk-local `(x, y, z)` in storage layer 0.
    /// Cells of unpopulated subchunks read as air.
    #[inline]
    pub fn block(&self, x: u8, y: u16, z: u8) -> Result<&BlockState, ChunkAccessError> {
        self.block_at_layer(x, y, z, 0)
    }

    /// The block at chunk-local `(x, y, z)` in the given storage layer.
    pub fn block_at_layer(
        &self,
        x: u8,
        y: u16,
        z: u8,
        layer: usize,
    ) -> Result<&BlockState, ChunkAccessError> {
        Self::check_column(x, y, z)?;

        match self.subchunk((y / 16) as u8) {
            Some(subchunk) => Ok(subchunk.block(x, (y % 16) as u8, z, layer)?),
            None => Ok(BlockState::air()),
        }
    }

    /// Writes the block at chunk-local `(x, y, z)` in the given storage
    /// layer, creating and installing the target subchunk first if its slot
    /// is empty.
    ///
    /// The first successful write moves an ungenerated chunk to
    /// [`Finalization::NotSpawnMobs`].
    pub fn set_block(
        &mut self,
        x: u8,
        y: u16,
        z: u8,
        layer: usize,
        state: BlockState,
    ) -> Result<(), ChunkAccessError> {
        Self::check_column(x, y, z)?;

        let slot = usize::from(y / 16);
        // Install the subchunk before writing, so the write cannot be lost.
        if self.subchunks[slot].is_none() {
            self.subchunks[slot] = Some(Box::new(Subchunk::new(slot as u8)));
        }

        // The slot was just filled if it was empty.
        let subchunk = self.subchunks[slot]
            .as_deref_mut()
            .expect("subchunk slot is populated");
        subchunk.set_block(x, (y % 16) as u8, z, layer, state)?;

        if self.finalization == Finalization::NotGenerated {
            self.finalization = Finalization::NotSpawnMobs;
        }

        Ok(())
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("subchunk y value {y} does not fit a 16-slot chunk")]
pub struct SubchunkSlotError {
    pub y: u8,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChunkAccessError {
    #[error("block coordinate ({x}, {y}, {z}) is outside the chunk")]
    BadCoord {
        x: u8,
        y: u16,
        z: u8,
    },
    #[error(transparent)]
    Subchunk(#[from] SubchunkAccessError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ungenerated_chunk_reads_as_air() {
        let chunk = Chunk::new(ChunkPosition::new(3, -4));
        assert_eq!(chunk.finalization(), Finalization::NotGenerated);
        assert!(chunk.block(0, 200, 0).unwrap().is_air());
    }

    #[test]
    fn set_block_installs_subchunk_and_bumps_finalization() {
        let mut chunk = Chunk::new(ChunkPosition::new(0, 0));
        let stone = BlockState::modern("minecraft:stone");

        chunk.set_block(1, 37, 2, 0, stone.clone()).unwrap();

        // y = 37 lives in subchunk slot 2
        let sub = chunk.subchunk(2).expect("subchunk was installed");
        assert_eq!(sub.y(), 2);
        assert_eq!(chunk.block(1, 37, 2).unwrap(), &stone);
        assert_eq!(chunk.finalization(), Finalization::NotSpawnMobs);
    }

    #[test]
    fn out_of_range_coordinates_fail() {
        let mut chunk = Chunk::new(ChunkPosition::new(0, 0));
        assert_eq!(
            chunk.block(0, 256, 0),
            Err(ChunkAccessError::BadCoord { x: 0, y: 256, z: 0 }),
        );
        assert!(chunk
            .set_block(16, 0, 0, 0, BlockState::modern("minecraft:stone"))
            .is_err());
    }

    #[test]
    fn insert_subchunk_uses_embedded_y() {
        let mut chunk = Chunk::new(ChunkPosition::new(0, 0));
        chunk.insert_subchunk(Subchunk::new(5)).unwrap();

        assert!(chunk.subchunk(5).is_some());
        assert!(chunk.subchunk(4).is_none());
        assert!(chunk.insert_subchunk(Subchunk::new(16)).is_err());
    }

    #[test]
    fn finalization_numeric_round_trip() {
        for id in 0..3 {
            let finalization = Finalization::from_numeric(id).unwrap();
            assert_eq!(finalization.to_numeric(), Some(id));
        }
        assert_eq!(Finalization::from_numeric(3), None);
        assert_eq!(Finalization::Unsupported.to_numeric(), None);
    }
}
