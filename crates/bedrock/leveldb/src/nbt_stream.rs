//! Entity and block-entity records: top-level little-endian NBT compounds
//! concatenated back to back until the record ends.

use std::io::Cursor;

use thiserror::Error;

use strata_nbt::io::{NbtIoError, read_compound, write_compound};
use strata_nbt::{IoOptions, NbtCompound};
use strata_util::u64_equals_usize;


/// Hard cap on compounds per record, guarding malformed input that never
/// advances the cursor to the end.
const MAX_COMPOUNDS: usize = 65_536;

#[derive(Debug, Clone, Default)]
pub struct ConcatenatedCompounds(pub Vec<NbtCompound>);

impl ConcatenatedCompounds {
    pub fn parse(value: &[u8]) -> Result<Self, NbtStreamError> {
        let mut compounds = Vec::new();
        let mut reader = Cursor::new(value);

        while !u64_equals_usize(reader.position(), value.len()) {
            if compounds.len() >= MAX_COMPOUNDS {
                return Err(NbtStreamError::TooManyCompounds);
            }

            let (compound, _) = read_compound(&mut reader, IoOptions::bedrock_uncompressed())?;
            compounds.push(compound);
        }

        Ok(Self(compounds))
    }

    pub fn extend_serialized(&self, bytes: &mut Vec<u8>) -> Result<(), NbtIoError> {
        for compound in &self.0 {
            write_compound(bytes, IoOptions::bedrock_uncompressed(), None, compound)?;
        }
        Ok(())
    }

    #[inline]
    pub fn to_bytes(&self) -> Result<Vec<u8>, NbtIoError> {
        let mut bytes = Vec::new();
        self.extend_serialized(&mut bytes)?;
        Ok(bytes)
    }
}

#[derive(Error, Debug)]
pub enum NbtStreamError {
    #[error(transparent)]
    Nbt(#[from] NbtIoError),
    #[error("record holds more than {MAX_COMPOUNDS} NBT compounds")]
    TooManyCompounds,
}
