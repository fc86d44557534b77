//! A small NBT implementation covering what world storage needs:
//! an owned tag tree, and binary reading/writing in both the Java flavor
//! (big-endian, CESU-8 strings, optionally gzip/zlib wrapped) and the
//! Bedrock flavor (little-endian, UTF-8 strings).
//!
//! SNBT, serde transcoding, and network varint flavors are deliberately
//! not implemented.

mod repr;
mod tag;

pub mod io;

mod raw;

pub mod settings;


pub use self::repr::*;
pub use self::tag::*;
pub use self::settings::{DepthLimit, IoOptions, NbtCompression, NbtFlavor};
