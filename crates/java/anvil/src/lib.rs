//! Java Edition world storage: Anvil region files and the NBT chunk and
//! subchunk codecs for both the pre-1.13 and the flattened 1.13+ layouts.

mod chunk_codec;
mod region;
mod subchunk_codec;


pub use self::{
    chunk_codec::{JavaChunkError, decode_chunk, encode_chunk},
    region::{
        CompressionScheme, Region, RegionDir, RegionError, RegionFlavor,
        HEADER_SECTORS, SECTOR_SIZE,
    },
    subchunk_codec::{
        JavaSubchunkCodec, JavaSubchunkError,
        DATA_VERSION_FLATTENING, DATA_VERSION_MAX, DATA_VERSION_NON_SPANNING,
    },
};
