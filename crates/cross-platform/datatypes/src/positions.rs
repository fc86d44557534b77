#[cfg(feature = "derive_serde")]
use serde::{Deserialize, Serialize};


/// The location of a chunk in a dimension of a world.
///
/// Note that this is not the block position;
/// multiply by 16 to find the positions of the chunk's blocks.
#[cfg_attr(feature = "derive_serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkPosition {
    pub x: i32,
    pub z: i32,
}

impl ChunkPosition {
    #[inline]
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Coordinates of the 32×32 region this chunk falls in.
    #[inline]
    pub fn region(self) -> (i32, i32) {
        (self.x >> 5, self.z >> 5)
    }

    /// Position of this chunk within its region, each axis in `[0, 32)`.
    #[inline]
    pub fn region_local(self) -> (u8, u8) {
        ((self.x & 31) as u8, (self.z & 31) as u8)
    }

    /// Index of this chunk in a region's 1024-entry location table.
    #[inline]
    pub fn region_index(self) -> usize {
        let (lx, lz) = self.region_local();
        usize::from(lx) + usize::from(lz) * 32
    }
}

/// A block position within a subchunk. Each axis is limited to 4 bits;
/// since `u8` is the smallest standard integer type, encapsulation enforces
/// the limit.
#[cfg_attr(feature = "derive_serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockPosInSubchunk(u16);

impl BlockPosInSubchunk {
    /// Returns `Some` if and only if all three coordinates are below 16.
    #[inline]
    pub fn new(x: u8, y: u8, z: u8) -> Option<Self> {
        if x < 16 && y < 16 && z < 16 {
            Some(Self(
                u16::from(x) << 8 | u16::from(z) << 4 | u16::from(y),
            ))
        } else {
            None
        }
    }

    #[inline]
    pub fn x(self) -> u8 {
        (self.0 >> 8) as u8
    }

    #[inline]
    pub fn z(self) -> u8 {
        (self.0 >> 4) as u8 & 0b1111
    }

    #[inline]
    pub fn y(self) -> u8 {
        (self.0 & 0b1111) as u8
    }

    /// Flat cell index in the XZY order used by the in-memory block storages,
    /// `x<<8 | z<<4 | y`.
    #[inline]
    pub fn flattened(self) -> usize {
        usize::from(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_math_handles_negatives() {
        let pos = ChunkPosition::new(-1, -33);
        assert_eq!(pos.region(), (-1, -2));
        assert_eq!(pos.region_local(), (31, 31));
        assert_eq!(pos.region_index(), 31 + 31 * 32);

        let pos = ChunkPosition::new(7, 13);
        assert_eq!(pos.region(), (0, 0));
        assert_eq!(pos.region_index(), 7 + 13 * 32);
    }

    #[test]
    fn subchunk_pos_packs_xzy() {
        let pos = BlockPosInSubchunk::new(1, 2, 3).unwrap();
        assert_eq!((pos.x(), pos.y(), pos.z()), (1, 2, 3));
        assert_eq!(pos.flattened(), (1 << 8) | (3 << 4) | 2);

        assert!(BlockPosInSubchunk::new(16, 0, 0).is_none());
        assert!(BlockPosInSubchunk::new(0, 0, 255).is_none());
    }
}
