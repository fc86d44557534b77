//! The loaded-chunk cache and its lifecycle rules.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use thiserror::Error;

use strata_anvil::{JavaChunkError, RegionError};
use strata_bedrock::{BedrockChunkError, KvError, LevelDatError};
use strata_chunk::Chunk;
use strata_datatypes::ChunkPosition;
use strata_nbt::io::NbtIoError;
use strata_util::{LockOrPanic as _, RwLockOrPanic as _};

use crate::backend::WorldBackend;
use crate::properties::WorldProperties;


/// A world with a keyed cache of loaded chunks.
///
/// Chunk lookups take the cache read lock; load and unload take the write
/// lock briefly. Each loaded chunk sits behind its own mutex, so mutating
/// one chunk never blocks access to another, and backend I/O runs outside
/// the cache locks.
#[derive(Debug)]
pub struct WorldStore<B> {
    backend:    Mutex<B>,
    chunks:     RwLock<HashMap<(i32, i32), Arc<Mutex<Chunk>>>>,
    properties: Mutex<WorldProperties>,
    closed:     AtomicBool,
}

impl<B: WorldBackend> WorldStore<B> {
    pub fn new(backend: B, properties: WorldProperties) -> Self {
        Self {
            backend:    Mutex::new(backend),
            chunks:     RwLock::new(HashMap::new()),
            properties: Mutex::new(properties),
            closed:     AtomicBool::new(false),
        }
    }

    fn check_open(&self) -> Result<(), WorldError> {
        if self.closed.load(Ordering::Acquire) {
            Err(WorldError::Closed)
        } else {
            Ok(())
        }
    }

    /// Loads the chunk at `(cx, cz)` into the cache. With `create`, a
    /// never-generated chunk comes up empty and ungenerated instead of
    /// failing.
    pub fn load(&self, cx: i32, cz: i32, create: bool) -> Result<(), WorldError> {
        self.check_open()?;

        if self.is_loaded(cx, cz) {
            return Err(WorldError::AlreadyLoaded { cx, cz });
        }

        let chunk = self.fetch_chunk(cx, cz, create)?;

        let mut chunks = self.chunks.write_or_panic();
        if chunks.contains_key(&(cx, cz)) {
            return Err(WorldError::AlreadyLoaded { cx, cz });
        }
        chunks.insert((cx, cz), chunk);
        Ok(())
    }

    /// Reads a chunk from the backend without touching the cache.
    fn fetch_chunk(
        &self,
        cx: i32,
        cz: i32,
        create: bool,
    ) -> Result<Arc<Mutex<Chunk>>, WorldError> {
        let pos = ChunkPosition::new(cx, cz);

        let loaded = self.backend.lock_or_panic().load_chunk(pos)?;
        let chunk = match loaded {
            Some(chunk) => chunk,
            None if create => Chunk::new(pos),
            None => return Err(WorldError::NotGenerated { cx, cz }),
        };

        Ok(Arc::new(Mutex::new(chunk)))
    }

    /// Drops the chunk from the cache without saving it.
    pub fn unload(&self, cx: i32, cz: i32) -> Result<(), WorldError> {
        self.check_open()?;

        match self.chunks.write_or_panic().remove(&(cx, cz)) {
            Some(_) => Ok(()),
            None => Err(WorldError::NotLoaded { cx, cz }),
        }
    }

    pub fn is_loaded(&self, cx: i32, cz: i32) -> bool {
        self.chunks.read_or_panic().contains_key(&(cx, cz))
    }

    /// Whether the chunk exists in storage (or is live in the cache).
    pub fn has_generated(&self, cx: i32, cz: i32) -> Result<bool, WorldError> {
        self.check_open()?;

        if self.is_loaded(cx, cz) {
            return Ok(true);
        }
        self.backend
            .lock_or_panic()
            .has_generated(ChunkPosition::new(cx, cz))
    }

    /// The chunk at `(cx, cz)`, loading it transparently if needed.
    /// Unlike [`load`](Self::load), an already-loaded chunk is not an
    /// error.
    pub fn chunk(
        &self,
        cx: i32,
        cz: i32,
        create: bool,
    ) -> Result<Arc<Mutex<Chunk>>, WorldError> {
        self.check_open()?;

        if let Some(chunk) = self.chunks.read_or_panic().get(&(cx, cz)) {
            return Ok(Arc::clone(chunk));
        }

        let chunk = self.fetch_chunk(cx, cz, create)?;

        let mut chunks = self.chunks.write_or_panic();
        // A racing loader may have beaten us to the slot; theirs wins.
        Ok(Arc::clone(
            chunks.entry((cx, cz)).or_insert(chunk),
        ))
    }

    /// Writes a loaded chunk back to storage.
    pub fn save(&self, cx: i32, cz: i32) -> Result<(), WorldError> {
        self.check_open()?;

        let chunk = self
            .chunks
            .read_or_panic()
            .get(&(cx, cz))
            .map(Arc::clone)
            .ok_or(WorldError::NotLoaded { cx, cz })?;

        let chunk = chunk.lock_or_panic();
        self.backend.lock_or_panic().save_chunk(&chunk)
    }

    /// Writes every loaded chunk back to storage.
    pub fn save_all(&self) -> Result<(), WorldError> {
        self.check_open()?;

        let loaded: Vec<Arc<Mutex<Chunk>>> = self
            .chunks
            .read_or_panic()
            .values()
            .map(Arc::clone)
            .collect();

        let mut backend = self.backend.lock_or_panic();
        for chunk in loaded {
            let chunk = chunk.lock_or_panic();
            backend.save_chunk(&chunk)?;
        }
        backend.sync()
    }

    /// Positions of every loaded chunk.
    pub fn loaded_chunks(&self) -> Vec<(i32, i32)> {
        let mut positions: Vec<(i32, i32)> =
            self.chunks.read_or_panic().keys().copied().collect();
        positions.sort_unstable();
        positions
    }

    pub fn properties(&self) -> WorldProperties {
        self.properties.lock_or_panic().clone()
    }

    pub fn update_properties(&self, update: impl FnOnce(&mut WorldProperties)) {
        update(&mut self.properties.lock_or_panic());
    }

    /// Closes the store. Later calls fail with [`WorldError::Closed`];
    /// closing twice is a no-op. Loaded chunks are dropped unsaved.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.chunks.write_or_panic().clear();
    }
}

#[derive(Error, Debug)]
pub enum WorldError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Region(#[from] RegionError),
    #[error(transparent)]
    JavaChunk(#[from] JavaChunkError),
    #[error(transparent)]
    BedrockChunk(#[from] BedrockChunkError),
    #[error(transparent)]
    Kv(#[from] KvError),
    #[error(transparent)]
    Nbt(#[from] NbtIoError),
    #[error(transparent)]
    LevelDat(#[from] LevelDatError),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("chunk ({cx}, {cz}) is already loaded")]
    AlreadyLoaded {
        cx: i32,
        cz: i32,
    },
    #[error("chunk ({cx}, {cz}) is not loaded")]
    NotLoaded {
        cx: i32,
        cz: i32,
    },
    #[error("chunk ({cx}, {cz}) has not been generated")]
    NotGenerated {
        cx: i32,
        cz: i32,
    },
    #[error("the world store is closed")]
    Closed,
}
