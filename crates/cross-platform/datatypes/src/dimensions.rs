#[cfg(feature = "derive_serde")]
use serde::{Deserialize, Serialize};


/// A dimension of a Minecraft world.
///
/// Only the three vanilla dimensions are addressable through the storage
/// layer; custom dimensions are out of scope.
#[cfg_attr(feature = "derive_serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Dimension {
    #[default]
    OverWorld,
    Nether,
    End,
}

impl Dimension {
    /// The dimension ID serialized into Bedrock record keys.
    /// The Overworld has no ID: its keys elide the dimension entirely.
    #[inline]
    pub fn storage_id(self) -> Option<i32> {
        match self {
            Self::OverWorld => None,
            Self::Nether    => Some(10),
            Self::End       => Some(20),
        }
    }

    /// Inverse of [`storage_id`](Self::storage_id) for non-Overworld IDs.
    #[inline]
    pub fn from_storage_id(id: i32) -> Option<Self> {
        match id {
            10 => Some(Self::Nether),
            20 => Some(Self::End),
            _  => None,
        }
    }

    /// Directory name used for this dimension's region files inside a Java
    /// world folder (`region`, `DIM-1/region`, `DIM1/region`).
    #[inline]
    pub fn java_region_subdir(self) -> &'static str {
        match self {
            Self::OverWorld => "region",
            Self::Nether    => "DIM-1/region",
            Self::End       => "DIM1/region",
        }
    }
}
