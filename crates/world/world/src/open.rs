//! Convenience constructors for on-disk worlds.

use std::path::Path;

use strata_anvil::RegionFlavor;
use strata_bedrock::{LevelDat, LevelDbStore};
use strata_datatypes::Dimension;

use crate::backend::{AnvilBackend, BedrockBackend};
use crate::properties::WorldProperties;
use crate::store::{WorldError, WorldStore};


/// Opens a Java world folder for one dimension. Java's gzip-wrapped
/// `level.dat` is not parsed here; properties start from defaults.
pub fn open_anvil_world(
    world_path:   impl AsRef<Path>,
    dimension:    Dimension,
    flavor:       RegionFlavor,
    data_version: Option<i32>,
) -> WorldStore<AnvilBackend> {
    let backend = AnvilBackend::open(
        world_path.as_ref().to_path_buf(),
        dimension,
        flavor,
        data_version,
    );
    WorldStore::new(backend, WorldProperties::new())
}

/// Opens a Bedrock world folder: `level.dat` for the properties and the
/// `db/` directory for chunk records.
pub fn open_bedrock_world(
    world_path: impl AsRef<Path>,
    dimension:  Dimension,
    create:     bool,
) -> Result<WorldStore<BedrockBackend<LevelDbStore>>, WorldError> {
    let world_path = world_path.as_ref();

    let level_dat_path = world_path.join("level.dat");
    let properties = if level_dat_path.is_file() {
        let bytes = std::fs::read(&level_dat_path)?;
        WorldProperties::from_level_dat(LevelDat::parse(&bytes)?)
    } else if create {
        log::warn!(
            "no level.dat under {}; starting from default properties",
            world_path.display(),
        );
        WorldProperties::new()
    } else {
        return Err(WorldError::Backend(format!(
            "no level.dat under {}",
            world_path.display(),
        )));
    };

    let backend = BedrockBackend::open(world_path.to_path_buf(), dimension, create)?;
    Ok(WorldStore::new(backend, properties))
}

/// Writes a store's properties back to a Bedrock world's `level.dat`.
pub fn write_bedrock_level_dat(
    world_path: impl AsRef<Path>,
    properties: &WorldProperties,
) -> Result<(), WorldError> {
    let bytes = properties.to_level_dat().to_bytes()?;
    std::fs::write(world_path.as_ref().join("level.dat"), bytes)?;
    Ok(())
}
