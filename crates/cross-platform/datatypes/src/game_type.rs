#[cfg(feature = "derive_serde")]
use serde::{Deserialize, Serialize};


/// The default game mode stored in a world's properties.
#[cfg_attr(feature = "derive_serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GameType {
    #[default]
    Survival,
    Creative,
    Adventure,
}

impl GameType {
    #[inline]
    pub fn from_numeric(id: i32) -> Option<Self> {
        match id {
            0 => Some(Self::Survival),
            1 => Some(Self::Creative),
            2 => Some(Self::Adventure),
            _ => None,
        }
    }

    #[inline]
    pub fn to_numeric(self) -> i32 {
        match self {
            Self::Survival  => 0,
            Self::Creative  => 1,
            Self::Adventure => 2,
        }
    }
}
