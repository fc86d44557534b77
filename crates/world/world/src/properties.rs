//! World properties sourced from `level.dat`, with typed accessors over
//! the well-known tags and raw passthrough for everything else.

use strata_bedrock::{LevelDat, STORAGE_VERSION};
use strata_datatypes::GameType;
use strata_nbt::{NbtCompound, NbtTag};


const TAG_LEVEL_NAME: &str = "LevelName";
const TAG_GAME_TYPE: &str = "GameType";
const TAG_SPAWN_X: &str = "SpawnX";
const TAG_SPAWN_Y: &str = "SpawnY";
const TAG_SPAWN_Z: &str = "SpawnZ";

#[derive(Debug, Clone, PartialEq)]
pub struct WorldProperties {
    version: u32,
    data:    NbtCompound,
}

impl WorldProperties {
    /// Default properties for a fresh world: empty name, survival mode,
    /// spawn at the origin.
    pub fn new() -> Self {
        let mut data = NbtCompound::new();
        data.insert(TAG_LEVEL_NAME, "");
        data.insert(TAG_GAME_TYPE, GameType::Survival.to_numeric());
        data.insert(TAG_SPAWN_X, 0_i32);
        data.insert(TAG_SPAWN_Y, 0_i32);
        data.insert(TAG_SPAWN_Z, 0_i32);

        Self {
            version: STORAGE_VERSION,
            data,
        }
    }

    #[inline]
    pub fn from_level_dat(level_dat: LevelDat) -> Self {
        Self {
            version: level_dat.version,
            data:    level_dat.properties,
        }
    }

    #[inline]
    pub fn to_level_dat(&self) -> LevelDat {
        LevelDat {
            version:    self.version,
            properties: self.data.clone(),
        }
    }

    #[inline]
    pub fn storage_version(&self) -> u32 {
        self.version
    }

    pub fn level_name(&self) -> &str {
        self.data
            .get::<&String>(TAG_LEVEL_NAME)
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn set_level_name(&mut self, name: impl Into<String>) {
        self.data.insert(TAG_LEVEL_NAME, name.into());
    }

    pub fn game_type(&self) -> GameType {
        self.data
            .get::<i32>(TAG_GAME_TYPE)
            .ok()
            .and_then(GameType::from_numeric)
            .unwrap_or_default()
    }

    pub fn set_game_type(&mut self, game_type: GameType) {
        self.data.insert(TAG_GAME_TYPE, game_type.to_numeric());
    }

    pub fn spawn(&self) -> (i32, i32, i32) {
        let coord = |tag| self.data.get::<i32>(tag).unwrap_or(0);
        (coord(TAG_SPAWN_X), coord(TAG_SPAWN_Y), coord(TAG_SPAWN_Z))
    }

    pub fn set_spawn(&mut self, x: i32, y: i32, z: i32) {
        self.data.insert(TAG_SPAWN_X, x);
        self.data.insert(TAG_SPAWN_Y, y);
        self.data.insert(TAG_SPAWN_Z, z);
    }

    /// Raw access to any property tag.
    #[inline]
    pub fn property(&self, name: &str) -> Option<&NbtTag> {
        self.data.tag(name)
    }

    #[inline]
    pub fn set_property(&mut self, name: impl Into<String>, tag: NbtTag) {
        self.data.insert(name, tag);
    }

    /// The whole properties compound.
    #[inline]
    pub fn all(&self) -> &NbtCompound {
        &self.data
    }

    #[inline]
    pub fn set_all(&mut self, data: NbtCompound) {
        self.data = data;
    }
}

impl Default for WorldProperties {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}
