//! The uniform world-level API: one `WorldStore` over either storage
//! backend, with a loaded-chunk cache and world properties.

mod backend;
mod open;
mod properties;
mod store;


pub use self::{
    backend::{AnvilBackend, BedrockBackend, WorldBackend},
    open::{open_anvil_world, open_bedrock_world, write_bedrock_level_dat},
    properties::WorldProperties,
    store::{WorldError, WorldStore},
};
