use std::fmt;
use std::fmt::{Debug, Formatter};

use indexmap::IndexMap;

use crate::repr::NbtStructureError;


/// One NBT tag of any type.
#[derive(Clone, PartialEq)]
pub enum NbtTag {
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    ByteArray(Vec<i8>),
    String(String),
    List(NbtList),
    Compound(NbtCompound),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
}

impl NbtTag {
    /// The numeric ID this tag is serialized with.
    #[inline]
    pub fn id(&self) -> u8 {
        match self {
            Self::Byte(_)      => 0x1,
            Self::Short(_)     => 0x2,
            Self::Int(_)       => 0x3,
            Self::Long(_)      => 0x4,
            Self::Float(_)     => 0x5,
            Self::Double(_)    => 0x6,
            Self::ByteArray(_) => 0x7,
            Self::String(_)    => 0x8,
            Self::List(_)      => 0x9,
            Self::Compound(_)  => 0xA,
            Self::IntArray(_)  => 0xB,
            Self::LongArray(_) => 0xC,
        }
    }

    /// Human-readable tag type name, used in error messages.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Byte(_)      => "Byte",
            Self::Short(_)     => "Short",
            Self::Int(_)       => "Int",
            Self::Long(_)      => "Long",
            Self::Float(_)     => "Float",
            Self::Double(_)    => "Double",
            Self::ByteArray(_) => "ByteArray",
            Self::String(_)    => "String",
            Self::List(_)      => "List",
            Self::Compound(_)  => "Compound",
            Self::IntArray(_)  => "IntArray",
            Self::LongArray(_) => "LongArray",
        }
    }
}

impl Debug for NbtTag {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Byte(value)       => write!(f, "{value}b"),
            Self::Short(value)      => write!(f, "{value}s"),
            Self::Int(value)        => write!(f, "{value}"),
            Self::Long(value)       => write!(f, "{value}l"),
            Self::Float(value)      => write!(f, "{value}f"),
            Self::Double(value)     => write!(f, "{value}d"),
            Self::ByteArray(values) => write!(f, "[B; {} bytes]", values.len()),
            Self::String(value)     => write!(f, "{value:?}"),
            Self::List(list)        => Debug::fmt(list, f),
            Self::Compound(com)     => Debug::fmt(com, f),
            Self::IntArray(values)  => write!(f, "[I; {} ints]", values.len()),
            Self::LongArray(values) => write!(f, "[L; {} longs]", values.len()),
        }
    }
}

macro_rules! tag_from {
    ($($type:ty, $variant:ident);* $(;)?) => {
        $(
            impl From<$type> for NbtTag {
                #[inline]
                fn from(value: $type) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

tag_from! {
    i8, Byte;
    i16, Short;
    i32, Int;
    i64, Long;
    f32, Float;
    f64, Double;
    Vec<i8>, ByteArray;
    String, String;
    NbtList, List;
    NbtCompound, Compound;
    Vec<i32>, IntArray;
    Vec<i64>, LongArray;
}

impl From<&str> for NbtTag {
    #[inline]
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<bool> for NbtTag {
    #[inline]
    fn from(value: bool) -> Self {
        Self::Byte(i8::from(value))
    }
}

macro_rules! tag_try_into_ref {
    ($($type:ty, $variant:ident, $name:literal);* $(;)?) => {
        $(
            impl<'a> TryFrom<&'a NbtTag> for &'a $type {
                type Error = NbtStructureError;

                #[inline]
                fn try_from(tag: &'a NbtTag) -> Result<Self, Self::Error> {
                    match tag {
                        NbtTag::$variant(value) => Ok(value),
                        other => Err(NbtStructureError::type_mismatch($name, other.type_name())),
                    }
                }
            }
        )*
    };
}

tag_try_into_ref! {
    Vec<i8>, ByteArray, "ByteArray";
    String, String, "String";
    NbtList, List, "List";
    NbtCompound, Compound, "Compound";
    Vec<i32>, IntArray, "IntArray";
    Vec<i64>, LongArray, "LongArray";
}

macro_rules! tag_try_into_copy {
    ($($type:ty, $variant:ident, $name:literal);* $(;)?) => {
        $(
            impl TryFrom<&NbtTag> for $type {
                type Error = NbtStructureError;

                #[inline]
                fn try_from(tag: &NbtTag) -> Result<Self, Self::Error> {
                    match tag {
                        NbtTag::$variant(value) => Ok(*value),
                        other => Err(NbtStructureError::type_mismatch($name, other.type_name())),
                    }
                }
            }
        )*
    };
}

tag_try_into_copy! {
    i8, Byte, "Byte";
    i16, Short, "Short";
    i32, Int, "Int";
    i64, Long, "Long";
    f32, Float, "Float";
    f64, Double, "Double";
}

/// An NBT list: a sequence of tags which must share one tag type
/// when serialized.
#[derive(Clone, PartialEq, Default)]
pub struct NbtList(pub(crate) Vec<NbtTag>);

impl NbtList {
    #[inline]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    #[inline]
    pub fn into_inner(self) -> Vec<NbtTag> {
        self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn push<T: Into<NbtTag>>(&mut self, tag: T) {
        self.0.push(tag.into());
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&NbtTag> {
        self.0.get(index)
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, NbtTag> {
        self.0.iter()
    }

    /// Iterate over the list, converting each element to `T`.
    pub fn iter_map<'a, T: TryFrom<&'a NbtTag, Error = NbtStructureError>>(
        &'a self,
    ) -> impl Iterator<Item = Result<T, NbtStructureError>> + 'a {
        self.0.iter().map(|tag| T::try_from(tag))
    }
}

impl Debug for NbtList {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.0).finish()
    }
}

impl From<Vec<NbtTag>> for NbtList {
    #[inline]
    fn from(tags: Vec<NbtTag>) -> Self {
        Self(tags)
    }
}

impl<'a> IntoIterator for &'a NbtList {
    type Item = &'a NbtTag;
    type IntoIter = std::slice::Iter<'a, NbtTag>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for NbtList {
    type Item = NbtTag;
    type IntoIter = std::vec::IntoIter<NbtTag>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// An NBT compound. Insertion order is preserved, so a decode-encode cycle
/// reproduces the original byte stream.
#[derive(Clone, PartialEq, Default)]
pub struct NbtCompound(pub(crate) IndexMap<String, NbtTag>);

impl NbtCompound {
    #[inline]
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self(IndexMap::with_capacity(capacity))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn insert<T: Into<NbtTag>>(&mut self, name: impl Into<String>, tag: T) {
        self.0.insert(name.into(), tag.into());
    }

    #[inline]
    pub fn remove(&mut self, name: &str) -> Option<NbtTag> {
        // Preserves the order of the remaining entries.
        self.0.shift_remove(name)
    }

    #[inline]
    pub fn contains_key(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    #[inline]
    pub fn tag(&self, name: &str) -> Option<&NbtTag> {
        self.0.get(name)
    }

    #[inline]
    pub fn iter(&self) -> indexmap::map::Iter<'_, String, NbtTag> {
        self.0.iter()
    }

    /// Look up `name` and convert the tag to `T`,
    /// failing if the tag is missing or has the wrong type.
    pub fn get<'a, T: TryFrom<&'a NbtTag, Error = NbtStructureError>>(
        &'a self,
        name: &str,
    ) -> Result<T, NbtStructureError> {
        let tag = self
            .0
            .get(name)
            .ok_or_else(|| NbtStructureError::missing_tag(name))?;
        T::try_from(tag)
    }

    /// Like [`get`](Self::get), but a missing tag is `None` rather than an error.
    /// A present tag of the wrong type is still an error.
    pub fn get_opt<'a, T: TryFrom<&'a NbtTag, Error = NbtStructureError>>(
        &'a self,
        name: &str,
    ) -> Result<Option<T>, NbtStructureError> {
        match self.0.get(name) {
            Some(tag) => T::try_from(tag).map(Some),
            None => Ok(None),
        }
    }
}

impl Debug for NbtCompound {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.iter()).finish()
    }
}

impl FromIterator<(String, NbtTag)> for NbtCompound {
    fn from_iter<I: IntoIterator<Item = (String, NbtTag)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a NbtCompound {
    type Item = (&'a String, &'a NbtTag);
    type IntoIter = indexmap::map::Iter<'a, String, NbtTag>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
