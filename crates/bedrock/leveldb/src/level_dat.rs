//! `level.dat`: a `[version: u32 LE][payload length: u32 LE]` header
//! followed by one little-endian NBT compound of world properties.

use std::io::Cursor;

use thiserror::Error;

use strata_nbt::io::{
    NbtIoError, read_bedrock_header, read_compound, write_bedrock_header, write_compound,
};
use strata_nbt::{IoOptions, NbtCompound};


/// Storage version written to fresh `level.dat` headers.
pub const STORAGE_VERSION: u32 = 8;

/// A parsed `level.dat` file.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelDat {
    pub version:    u32,
    pub properties: NbtCompound,
}

impl LevelDat {
    /// An empty properties compound under the current storage version.
    pub fn new() -> Self {
        Self {
            version:    STORAGE_VERSION,
            properties: NbtCompound::new(),
        }
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, LevelDatError> {
        let mut reader = Cursor::new(bytes);
        let (version, payload_len) = read_bedrock_header(&mut reader)?;

        let payload_len = payload_len as usize;
        let payload = bytes
            .get(8..8 + payload_len)
            .ok_or(LevelDatError::ShortPayload {
                declared: payload_len,
                received: bytes.len().saturating_sub(8),
            })?;

        let (properties, _) =
            read_compound(&mut Cursor::new(payload), IoOptions::bedrock_uncompressed())?;

        Ok(Self {
            version,
            properties,
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, LevelDatError> {
        let mut payload = Vec::new();
        write_compound(
            &mut payload,
            IoOptions::bedrock_uncompressed(),
            None,
            &self.properties,
        )?;

        let payload_len =
            u32::try_from(payload.len()).map_err(|_| LevelDatError::PayloadTooLarge(payload.len()))?;

        let mut bytes = Vec::with_capacity(8 + payload.len());
        write_bedrock_header(&mut bytes, self.version, payload_len)?;
        bytes.extend(payload);
        Ok(bytes)
    }
}

impl Default for LevelDat {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Error, Debug)]
pub enum LevelDatError {
    #[error(transparent)]
    Nbt(#[from] NbtIoError),
    #[error("level.dat declares a {declared}-byte payload but holds {received}")]
    ShortPayload {
        declared: usize,
        received: usize,
    },
    #[error("level.dat payload of {0} bytes exceeds the 32-bit length field")]
    PayloadTooLarge(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_and_payload_round_trip() {
        let mut dat = LevelDat::new();
        dat.properties.insert("LevelName", "My World");
        dat.properties.insert("GameType", 1_i32);
        dat.properties.insert("SpawnX", -16_i32);

        let bytes = dat.to_bytes().unwrap();
        assert_eq!(&bytes[..4], &STORAGE_VERSION.to_le_bytes());
        assert_eq!(
            u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize,
            bytes.len() - 8,
        );

        let reread = LevelDat::parse(&bytes).unwrap();
        assert_eq!(reread, dat);
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let mut dat = LevelDat::new();
        dat.properties.insert("LevelName", "My World");

        let bytes = dat.to_bytes().unwrap();
        assert!(matches!(
            LevelDat::parse(&bytes[..bytes.len() - 1]),
            Err(LevelDatError::ShortPayload { .. }),
        ));
    }
}
