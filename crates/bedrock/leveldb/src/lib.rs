//! Bedrock Edition world storage: record keys, subchunk and column
//! records, `level.dat` framing, and the key-value adapter the chunk codec
//! runs against.

mod chunk_codec;
mod data_2d;
mod key;
mod kv;
mod level_dat;
mod leveldb;
mod nbt_stream;
mod subchunk_record;


pub use self::{
    chunk_codec::{BedrockChunkError, CHUNK_VERSION, read_chunk, write_chunk},
    data_2d::Data2D,
    key::{DimensionedChunkPos, RecordKey},
    kv::{KvError, KvStore, LevelDbStore, MemoryStore},
    level_dat::{LevelDat, LevelDatError, STORAGE_VERSION},
    leveldb::open_leveldb,
    nbt_stream::{ConcatenatedCompounds, NbtStreamError},
    subchunk_record::{
        BedrockSubchunkError, RecordVersion, decode_subchunk_record, encode_subchunk_record,
    },
};
