use thiserror::Error;

use strata_datatypes::BlockPosInSubchunk;

use crate::block_state::BlockState;
use crate::nibble_array::NibbleArray;
use crate::packed::CELLS_PER_SUBCHUNK;


/// Palettes hold at most `2^16` entries, the limit of a packed `u16` index.
pub const MAX_PALETTE_LEN: usize = 1 << 16;

/// Bedrock's allowed bits-per-index widths. Note the absence of 7,
/// which Java does use.
const BEDROCK_WIDTHS: [u8; 8] = [1, 2, 3, 4, 5, 6, 8, 16];

/// The smallest Bedrock storage width `b` with `2^b >= palette_len`.
///
/// `palette_len` must be at most `2^16`; a width of 0 ("every cell is
/// palette entry 0") is a codec-level special case and never returned here.
pub fn storage_type(palette_len: usize) -> Option<u8> {
    BEDROCK_WIDTHS
        .into_iter()
        .find(|&bits| (1_usize << bits) >= palette_len)
}

/// One (palette, indices) pair of a subchunk.
///
/// Every cell holds an index into the palette; the palette is append-only
/// under [`set`](Self::set) so existing indices never shift. Only
/// [`compact`](Self::compact) may reorder or shrink it.
#[derive(Debug, Clone)]
pub struct BlockStorage {
    palette: Vec<BlockState>,
    indices: Box<[u16; CELLS_PER_SUBCHUNK]>,
}

impl BlockStorage {
    /// A storage with a one-entry palette and every cell pointing at it.
    pub fn filled_with(state: BlockState) -> Self {
        Self {
            palette: vec![state],
            indices: Box::new([0; CELLS_PER_SUBCHUNK]),
        }
    }

    /// A storage filled with air.
    #[inline]
    pub fn air() -> Self {
        Self::filled_with(BlockState::air().clone())
    }

    /// Assembles a storage from decoded parts, checking that every index
    /// points inside the palette and that the palette length is legal.
    pub fn new_checked(
        palette: Vec<BlockState>,
        indices: Box<[u16; CELLS_PER_SUBCHUNK]>,
    ) -> Result<Self, StorageCheckError> {
        if palette.is_empty() || palette.len() > MAX_PALETTE_LEN {
            return Err(StorageCheckError::InvalidPaletteLen(palette.len()));
        }

        let palette_len = palette.len();
        if let Some(&index) = indices.iter().find(|&&index| usize::from(index) >= palette_len) {
            return Err(StorageCheckError::IndexTooLarge { index, palette_len });
        }

        Ok(Self { palette, indices })
    }

    #[inline]
    pub fn palette(&self) -> &[BlockState] {
        &self.palette
    }

    #[inline]
    pub fn indices(&self) -> &[u16; CELLS_PER_SUBCHUNK] {
        &self.indices
    }

    /// The block state at the given position.
    #[inline]
    pub fn state_at(&self, pos: BlockPosInSubchunk) -> &BlockState {
        // Indices are checked against the palette on every mutation.
        &self.palette[usize::from(self.indices[pos.flattened()])]
    }

    /// Writes a block via palette interning: an equal palette entry is
    /// reused, otherwise the state is appended.
    pub fn set(
        &mut self,
        pos:   BlockPosInSubchunk,
        state: BlockState,
    ) -> Result<(), PaletteFullError> {
        let index = self.intern(state)?;
        self.indices[pos.flattened()] = index;
        Ok(())
    }

    fn intern(&mut self, state: BlockState) -> Result<u16, PaletteFullError> {
        if let Some(index) = self.palette.iter().position(|entry| *entry == state) {
            // position is bounded by the palette length, which fits in u16 range
            return Ok(index as u16);
        }

        if self.palette.len() >= MAX_PALETTE_LEN {
            return Err(PaletteFullError);
        }

        let index = self.palette.len() as u16;
        self.palette.push(state);
        Ok(index)
    }

    /// Rebuilds the palette to exactly the entries in use and rewrites the
    /// indices accordingly. Idempotent.
    pub fn compact(&mut self) {
        let mut used = vec![false; self.palette.len()];
        for &index in self.indices.iter() {
            used[usize::from(index)] = true;
        }

        // Map each old index to its position after unused entries are dropped.
        let mut remapped = vec![0_u16; self.palette.len()];
        let mut next = 0_u16;
        for (old, &keep) in used.iter().enumerate() {
            if keep {
                remapped[old] = next;
                next += 1;
            }
        }

        if usize::from(next) == self.palette.len() {
            return;
        }

        let mut old_palette = std::mem::take(&mut self.palette);
        self.palette = Vec::with_capacity(usize::from(next));
        for (old, entry) in old_palette.drain(..).enumerate() {
            if used[old] {
                self.palette.push(entry);
            }
        }

        for index in self.indices.iter_mut() {
            *index = remapped[usize::from(*index)];
        }
    }
}

/// A 16×16×16 segment of a chunk: one or more block storages, plus the
/// optional light data older Java formats store alongside the blocks.
///
/// Layer 0 is the ordinary block layer. Bedrock worlds use a second layer
/// for things like the water part of waterlogged blocks.
#[derive(Debug, Clone)]
pub struct Subchunk {
    y:           u8,
    storages:    Vec<BlockStorage>,
    block_light: Option<NibbleArray<2048>>,
    sky_light:   Option<NibbleArray<2048>>,
}

impl Subchunk {
    /// An air-filled subchunk for vertical slot `y`.
    pub fn new(y: u8) -> Self {
        Self {
            y,
            storages:    vec![BlockStorage::air()],
            block_light: None,
            sky_light:   None,
        }
    }

    /// Assembles a subchunk from decoded storages. At least one storage is
    /// required.
    pub fn with_storages(y: u8, storages: Vec<BlockStorage>) -> Option<Self> {
        if storages.is_empty() {
            return None;
        }

        Some(Self {
            y,
            storages,
            block_light: None,
            sky_light:   None,
        })
    }

    /// The vertical slot of this subchunk within its chunk, in `[0, 16)`.
    #[inline]
    pub fn y(&self) -> u8 {
        self.y
    }

    #[inline]
    pub fn storage_count(&self) -> usize {
        self.storages.len()
    }

    #[inline]
    pub fn storages(&self) -> &[BlockStorage] {
        &self.storages
    }

    #[inline]
    pub fn storage(&self, layer: usize) -> Option<&BlockStorage> {
        self.storages.get(layer)
    }

    fn checked_pos(x: u8, y: u8, z: u8) -> Result<BlockPosInSubchunk, SubchunkAccessError> {
        BlockPosInSubchunk::new(x, y, z).ok_or(SubchunkAccessError::BadCoord { x, y, z })
    }

    /// The block at `(x, y, z)` in the given storage layer.
    pub fn block(
        &self,
        x: u8,
        y: u8,
        z: u8,
        layer: usize,
    ) -> Result<&BlockState, SubchunkAccessError> {
        let pos = Self::checked_pos(x, y, z)?;
        let storage = self.storages.get(layer).ok_or(SubchunkAccessError::BadLayer {
            layer,
            count: self.storages.len(),
        })?;

        Ok(storage.state_at(pos))
    }

    /// Writes the block at `(x, y, z)` in the given storage layer.
    ///
    /// `layer` may be at most the current storage count: addressing the
    /// first missing layer creates it filled with air.
    pub fn set_block(
        &mut self,
        x: u8,
        y: u8,
        z: u8,
        layer: usize,
        state: BlockState,
    ) -> Result<(), SubchunkAccessError> {
        let pos = Self::checked_pos(x, y, z)?;

        if layer > self.storages.len() {
            return Err(SubchunkAccessError::BadLayer {
                layer,
                count: self.storages.len(),
            });
        }
        if layer == self.storages.len() {
            self.storages.push(BlockStorage::air());
        }

        self.storages[layer].set(pos, state)?;
        Ok(())
    }

    /// Compacts every storage's palette.
    pub fn compact(&mut self) {
        for storage in &mut self.storages {
            storage.compact();
        }
    }

    /// True if every cell of every storage is air.
    pub fn is_empty(&self) -> bool {
        self.storages.iter().all(|storage| {
            storage.palette.len() == 1 && storage.palette[0].is_air()
                || storage
                    .indices
                    .iter()
                    .all(|&index| storage.palette[usize::from(index)].is_air())
        })
    }

    #[inline]
    pub fn block_light(&self) -> Option<&NibbleArray<2048>> {
        self.block_light.as_ref()
    }

    #[inline]
    pub fn sky_light(&self) -> Option<&NibbleArray<2048>> {
        self.sky_light.as_ref()
    }

    #[inline]
    pub fn set_block_light(&mut self, light: Option<NibbleArray<2048>>) {
        self.block_light = light;
    }

    #[inline]
    pub fn set_sky_light(&mut self, light: Option<NibbleArray<2048>>) {
        self.sky_light = light;
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("palette cannot exceed 2^16 entries")]
pub struct PaletteFullError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageCheckError {
    #[error("a block storage palette had an invalid length of {0}")]
    InvalidPaletteLen(usize),
    #[error("a block storage had index {index}, but the palette has length {palette_len}")]
    IndexTooLarge {
        index:       u16,
        palette_len: usize,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubchunkAccessError {
    #[error("block coordinate ({x}, {y}, {z}) is outside the subchunk")]
    BadCoord {
        x: u8,
        y: u8,
        z: u8,
    },
    #[error("storage layer {layer} does not exist ({count} layers present)")]
    BadLayer {
        layer: usize,
        count: usize,
    },
    #[error(transparent)]
    PaletteFull(#[from] PaletteFullError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_interns_into_palette() {
        let mut sub = Subchunk::new(0);
        let stone = BlockState::modern("minecraft:stone");

        sub.set_block(0, 0, 0, 0, stone.clone()).unwrap();
        sub.set_block(1, 0, 0, 0, stone.clone()).unwrap();
        sub.set_block(2, 0, 0, 0, BlockState::modern("minecraft:granite")).unwrap();

        // air + stone + granite; stone was interned once
        assert_eq!(sub.storage(0).unwrap().palette().len(), 3);
        assert_eq!(sub.block(0, 0, 0, 0).unwrap(), &stone);
        assert_eq!(sub.block(1, 0, 0, 0).unwrap(), &stone);
        assert!(sub.block(3, 0, 0, 0).unwrap().is_air());

        assert!(Subchunk::new(0).is_empty());
        assert!(!sub.is_empty());
    }

    #[test]
    fn coordinates_and_layers_are_checked() {
        let sub = Subchunk::new(0);

        assert_eq!(
            sub.block(16, 0, 0, 0),
            Err(SubchunkAccessError::BadCoord { x: 16, y: 0, z: 0 }),
        );
        assert_eq!(
            sub.block(0, 0, 0, 1),
            Err(SubchunkAccessError::BadLayer { layer: 1, count: 1 }),
        );
    }

    #[test]
    fn setting_next_layer_creates_it() {
        let mut sub = Subchunk::new(4);
        let water = BlockState::modern("minecraft:water");

        sub.set_block(5, 6, 7, 1, water.clone()).unwrap();
        assert_eq!(sub.storage_count(), 2);
        assert_eq!(sub.block(5, 6, 7, 1).unwrap(), &water);

        // Skipping a layer is still rejected.
        assert!(matches!(
            sub.set_block(0, 0, 0, 3, water),
            Err(SubchunkAccessError::BadLayer { .. }),
        ));
    }

    #[test]
    fn compact_drops_unused_entries() {
        let mut storage = BlockStorage::air();
        let pos = |x| BlockPosInSubchunk::new(x, 0, 0).unwrap();

        storage.set(pos(0), BlockState::modern("minecraft:stone")).unwrap();
        storage.set(pos(1), BlockState::modern("minecraft:granite")).unwrap();
        // Overwrite the only stone cell, leaving stone unused.
        storage.set(pos(0), BlockState::modern("minecraft:granite")).unwrap();

        storage.compact();
        assert_eq!(storage.palette().len(), 2);
        assert_eq!(
            storage.state_at(pos(1)),
            &BlockState::modern("minecraft:granite"),
        );
        assert!(storage.state_at(pos(2)).is_air());

        // Idempotent.
        let before = storage.clone().palette.len();
        storage.compact();
        assert_eq!(storage.palette.len(), before);
    }

    #[test]
    fn storage_type_widths() {
        assert_eq!(storage_type(1), Some(1));
        assert_eq!(storage_type(2), Some(1));
        assert_eq!(storage_type(3), Some(2));
        assert_eq!(storage_type(16), Some(4));
        assert_eq!(storage_type(17), Some(5));
        // 7 is skipped on Bedrock
        assert_eq!(storage_type(100), Some(8));
        assert_eq!(storage_type(257), Some(16));
        assert_eq!(storage_type(MAX_PALETTE_LEN), Some(16));
        assert_eq!(storage_type(MAX_PALETTE_LEN + 1), None);
    }

    #[test]
    fn checked_construction_rejects_bad_indices() {
        let mut indices = Box::new([0_u16; CELLS_PER_SUBCHUNK]);
        indices[17] = 1;

        let err = BlockStorage::new_checked(
            vec![BlockState::air().clone()],
            indices,
        );
        assert_eq!(
            err.unwrap_err(),
            StorageCheckError::IndexTooLarge { index: 1, palette_len: 1 },
        );
    }
}
