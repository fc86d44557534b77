//! LevelDB initialization with settings compatible with Minecraft's
//! databases, which compress blocks with raw zlib (compressor IDs 2
//! and 4) rather than snappy.

use std::io::Read as _;
use std::path::Path;
use std::rc::Rc;

use flate2::{Compress, Compression, Decompress};
use flate2::bufread::{ZlibDecoder, ZlibEncoder};
use rusty_leveldb::{
    Compressor, CompressorId, CompressorList, DB as LevelDb, Options, Status, StatusCode,
    compressor::NoneCompressor,
};

use crate::kv::LevelDbStore;


/// Opens the `db/` directory of a Bedrock world.
pub fn open_leveldb<P: AsRef<Path>>(
    db_path:           P,
    create_if_missing: bool,
) -> Result<LevelDbStore, Status> {
    let mut compressors = CompressorList::new();
    compressors.set_with_id(0, NoneCompressor);
    compressors.set_with_id(2, ZlibCompressor::new(true, Compression::default()));
    compressors.set_with_id(4, ZlibCompressor::new(false, Compression::default()));

    // Chunk reads cluster, so larger blocks and caches pay off.
    let block_size = 4 * 4096;

    let options = Options {
        block_size,
        block_cache_capacity_bytes: block_size * 1024,
        create_if_missing,
        compressor: 4,
        compressor_list: Rc::new(compressors),
        write_buffer_size: block_size * 1024,
        ..Options::default()
    };

    LevelDb::open(db_path, options).map(LevelDbStore::new)
}

/// Zlib block compression, with or without the two-byte zlib header.
#[derive(Debug)]
struct ZlibCompressor {
    include_zlib_header: bool,
    compression_level:   Compression,
}

impl ZlibCompressor {
    #[inline]
    fn new(include_zlib_header: bool, compression_level: Compression) -> Self {
        Self {
            include_zlib_header,
            compression_level,
        }
    }
}

impl CompressorId for ZlibCompressor {
    const ID: u8 = 2;
}

impl Compressor for ZlibCompressor {
    fn encode(&self, block: Vec<u8>) -> Result<Vec<u8>, Status> {
        let mut encoder = ZlibEncoder::new_with_compress(
            block.as_slice(),
            Compress::new(self.compression_level, self.include_zlib_header),
        );
        let mut buf = Vec::new();
        encoder.read_to_end(&mut buf).map_err(|err| {
            Status::new(
                StatusCode::CompressionError,
                &format!("error while compressing a block: {err}"),
            )
        })?;
        Ok(buf)
    }

    fn decode(&self, block: Vec<u8>) -> Result<Vec<u8>, Status> {
        let mut decoder = ZlibDecoder::new_with_decompress(
            block.as_slice(),
            Decompress::new(self.include_zlib_header),
        );
        let mut buf = Vec::new();
        decoder.read_to_end(&mut buf).map_err(|err| {
            Status::new(
                StatusCode::CompressionError,
                &format!("error while decompressing a block: {err}"),
            )
        })?;
        Ok(buf)
    }
}
