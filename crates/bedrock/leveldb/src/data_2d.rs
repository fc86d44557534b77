//! The `Data2D` record: a 512-byte little-endian heightmap (256 × u16)
//! followed by 256 bytes of biome IDs.

use subslice_to_array::SubsliceToArray as _;


#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Data2D {
    /// Height of the highest block per column, in ZX order.
    pub heights: Box<[u16; 256]>,
    /// One biome ID per column, in ZX order.
    pub biomes:  Box<[u8; 256]>,
}

impl Data2D {
    /// Parses a 768-byte record; any other length is `None`.
    pub fn parse(value: &[u8]) -> Option<Self> {
        if value.len() != 512 + 256 {
            return None;
        }

        let mut heights = Box::new([0_u16; 256]);
        for (column, height) in heights.iter_mut().enumerate() {
            *height = u16::from_le_bytes([value[column * 2], value[column * 2 + 1]]);
        }

        let biomes: [u8; 256] = value.subslice_to_array::<512, 768>();

        Some(Self {
            heights,
            biomes: Box::new(biomes),
        })
    }

    pub fn extend_serialized(&self, bytes: &mut Vec<u8>) {
        bytes.reserve(768);
        for height in self.heights.iter() {
            bytes.extend(height.to_le_bytes());
        }
        bytes.extend(self.biomes.iter());
    }

    #[inline]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        self.extend_serialized(&mut bytes);
        bytes
    }
}

impl Default for Data2D {
    fn default() -> Self {
        Self {
            heights: Box::new([0; 256]),
            biomes:  Box::new([0; 256]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let mut data = Data2D::default();
        data.heights[0] = 0x1234;
        data.heights[255] = 7;
        data.biomes[3] = 21;

        let bytes = data.to_bytes();
        assert_eq!(bytes.len(), 768);
        assert_eq!(&bytes[..2], &[0x34, 0x12]);
        assert_eq!(bytes[512 + 3], 21);

        assert_eq!(Data2D::parse(&bytes), Some(data));
        assert_eq!(Data2D::parse(&bytes[..700]), None);
    }
}
