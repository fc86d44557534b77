//! The storage backends a `WorldStore` can sit on.

use std::io::Cursor;
use std::path::PathBuf;

use strata_anvil::{RegionDir, RegionFlavor};
use strata_bedrock::{KvStore, LevelDbStore, RecordVersion, open_leveldb};
use strata_chunk::Chunk;
use strata_datatypes::{ChunkPosition, Dimension};
use strata_nbt::io::{read_compound, write_compound};
use strata_nbt::IoOptions;

use crate::store::WorldError;


/// What a `WorldStore` needs from a storage format: existence probing and
/// whole-chunk load/save.
pub trait WorldBackend {
    fn has_generated(&mut self, pos: ChunkPosition) -> Result<bool, WorldError>;

    /// Loads a chunk; `None` if it was never generated.
    fn load_chunk(&mut self, pos: ChunkPosition) -> Result<Option<Chunk>, WorldError>;

    fn save_chunk(&mut self, chunk: &Chunk) -> Result<(), WorldError>;

    /// Flushes anything buffered to durable storage.
    fn sync(&mut self) -> Result<(), WorldError> {
        Ok(())
    }
}

/// Java worlds: a directory of region files.
#[derive(Debug)]
pub struct AnvilBackend {
    regions: RegionDir,
    /// DataVersion written into saved chunks; `None` writes the pre-1.13
    /// layout.
    data_version: Option<i32>,
}

impl AnvilBackend {
    /// Opens the region directory of `world_path` for the given dimension.
    pub fn open(
        world_path:   impl Into<PathBuf>,
        dimension:    Dimension,
        flavor:       RegionFlavor,
        data_version: Option<i32>,
    ) -> Self {
        let path = world_path.into().join(dimension.java_region_subdir());
        Self {
            regions: RegionDir::new(path, flavor),
            data_version,
        }
    }

    /// A backend over a bare region directory.
    pub fn from_region_dir(regions: RegionDir, data_version: Option<i32>) -> Self {
        Self {
            regions,
            data_version,
        }
    }
}

impl WorldBackend for AnvilBackend {
    fn has_generated(&mut self, pos: ChunkPosition) -> Result<bool, WorldError> {
        let (rx, rz) = pos.region();
        if !self.regions.region_exists(rx, rz) {
            return Ok(false);
        }

        let (lx, lz) = pos.region_local();
        Ok(self.regions.region(rx, rz, false)?.has_chunk(lx, lz)?)
    }

    fn load_chunk(&mut self, pos: ChunkPosition) -> Result<Option<Chunk>, WorldError> {
        let (rx, rz) = pos.region();
        if !self.regions.region_exists(rx, rz) {
            return Ok(None);
        }

        let (lx, lz) = pos.region_local();
        let Some(payload) = self.regions.region(rx, rz, false)?.read_chunk(lx, lz)? else {
            return Ok(None);
        };

        let (root, _) = read_compound(
            &mut Cursor::new(payload),
            IoOptions::java_uncompressed(),
        )?;
        Ok(Some(strata_anvil::decode_chunk(&root)?))
    }

    fn save_chunk(&mut self, chunk: &Chunk) -> Result<(), WorldError> {
        let root = strata_anvil::encode_chunk(chunk, self.data_version)?;

        // The region file owns the compression framing; the payload
        // handed to it is plain NBT.
        let mut payload = Vec::new();
        write_compound(
            &mut payload,
            IoOptions::java_uncompressed(),
            None,
            &root,
        )?;

        let (rx, rz) = chunk.pos().region();
        let (lx, lz) = chunk.pos().region_local();
        self.regions
            .region(rx, rz, true)?
            .write_chunk(lx, lz, &payload)?;
        Ok(())
    }
}

/// Bedrock worlds: chunk records in a sorted key-value store. Generic over
/// the store so tests can run in memory.
#[derive(Debug)]
pub struct BedrockBackend<K> {
    store:          K,
    dimension:      Dimension,
    record_version: RecordVersion,
}

impl BedrockBackend<LevelDbStore> {
    /// Opens the `db/` directory of the world at `world_path`.
    pub fn open(
        world_path: impl Into<PathBuf>,
        dimension:  Dimension,
        create:     bool,
    ) -> Result<Self, WorldError> {
        let db_path = world_path.into().join("db");
        let store = open_leveldb(db_path, create)
            .map_err(|status| WorldError::Backend(status.to_string()))?;
        Ok(Self::from_store(store, dimension))
    }
}

impl<K: KvStore> BedrockBackend<K> {
    pub fn from_store(store: K, dimension: Dimension) -> Self {
        Self {
            store,
            dimension,
            record_version: RecordVersion::V8,
        }
    }

    /// Chooses which subchunk record version saves use; fresh backends
    /// write version 8.
    pub fn set_record_version(&mut self, version: RecordVersion) {
        self.record_version = version;
    }

    #[inline]
    pub fn store_mut(&mut self) -> &mut K {
        &mut self.store
    }
}

impl<K: KvStore> WorldBackend for BedrockBackend<K> {
    fn has_generated(&mut self, pos: ChunkPosition) -> Result<bool, WorldError> {
        use strata_bedrock::{DimensionedChunkPos, RecordKey};

        let key = RecordKey::Version(DimensionedChunkPos::new(pos, self.dimension));
        Ok(self.store.has(&key.to_bytes())?)
    }

    fn load_chunk(&mut self, pos: ChunkPosition) -> Result<Option<Chunk>, WorldError> {
        Ok(strata_bedrock::read_chunk(&mut self.store, pos, self.dimension)?)
    }

    fn save_chunk(&mut self, chunk: &Chunk) -> Result<(), WorldError> {
        strata_bedrock::write_chunk(&mut self.store, chunk, self.dimension, self.record_version)?;
        Ok(())
    }

    fn sync(&mut self) -> Result<(), WorldError> {
        self.store.flush()?;
        Ok(())
    }
}
