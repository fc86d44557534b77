use thiserror::Error;


/// A conflict between the expected and actual structure of an NBT tag tree.
#[derive(Error, Debug, Clone)]
pub enum NbtStructureError {
    #[error("missing tag \"{tag_name}\"")]
    MissingTag {
        tag_name: Box<str>,
    },
    #[error("index out of range: {index} >= {length}")]
    InvalidIndex {
        index:  usize,
        length: usize,
    },
    #[error("tag type mismatch: expected {expected} but found {found}")]
    TypeMismatch {
        expected: &'static str,
        found:    &'static str,
    },
}

impl NbtStructureError {
    pub fn missing_tag<T: Into<String>>(tag_name: T) -> Self {
        Self::MissingTag {
            tag_name: tag_name.into().into_boxed_str(),
        }
    }

    pub fn invalid_index(index: usize, length: usize) -> Self {
        Self::InvalidIndex { index, length }
    }

    pub fn type_mismatch(expected: &'static str, found: &'static str) -> Self {
        Self::TypeMismatch { expected, found }
    }
}
