//! The uniform in-memory model shared by both storage backends:
//! block states, bit-packed palette indices, subchunks, and chunks.

pub mod packed;


strata_util::declare_and_pub_use! {
    block_state;
    chunk;
    nibble_array;
    subchunk;
}
