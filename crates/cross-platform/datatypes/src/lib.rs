//! Plain datatypes shared by the Java and Bedrock storage formats.

pub mod dimensions;
pub mod game_type;
pub mod positions;


pub use self::{
    dimensions::Dimension,
    game_type::GameType,
    positions::{BlockPosInSubchunk, ChunkPosition},
};
