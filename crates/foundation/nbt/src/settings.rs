//! Serialization settings for binary NBT.

/// Which dialect of binary NBT to read or write.
///
/// The flavor decides byte order *and* string encoding: Java NBT is big-endian
/// with CESU-8 ("modified UTF-8") strings, Bedrock NBT is little-endian with
/// plain UTF-8 strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NbtFlavor {
    Java,
    Bedrock,
}

/// Compression applied around an entire NBT document.
///
/// Region files compress chunk payloads themselves, so chunk codecs always use
/// `Uncompressed` here; `level.dat` on Java is traditionally gzip-wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NbtCompression {
    Uncompressed,
    ZlibCompressed,
    GzipCompressed,
}

/// Recursion limit for nested compounds and lists, guarding against
/// stack exhaustion on crafted input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthLimit(pub u32);

impl Default for DepthLimit {
    #[inline]
    fn default() -> Self {
        Self(512)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoOptions {
    pub flavor:      NbtFlavor,
    pub compression: NbtCompression,
    pub depth_limit: DepthLimit,
}

impl IoOptions {
    #[inline]
    pub fn java_uncompressed() -> Self {
        Self {
            flavor:      NbtFlavor::Java,
            compression: NbtCompression::Uncompressed,
            depth_limit: DepthLimit::default(),
        }
    }

    #[inline]
    pub fn java_gzip() -> Self {
        Self {
            compression: NbtCompression::GzipCompressed,
            ..Self::java_uncompressed()
        }
    }

    #[inline]
    pub fn java_zlib() -> Self {
        Self {
            compression: NbtCompression::ZlibCompressed,
            ..Self::java_uncompressed()
        }
    }

    #[inline]
    pub fn bedrock_uncompressed() -> Self {
        Self {
            flavor:      NbtFlavor::Bedrock,
            compression: NbtCompression::Uncompressed,
            depth_limit: DepthLimit::default(),
        }
    }
}
