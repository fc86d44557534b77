//! Binary reading and writing of NBT documents.

use std::io;
use std::io::{Read, Write};

use flate2::Compression;
use flate2::{
    read::{GzDecoder, ZlibDecoder},
    write::{GzEncoder, ZlibEncoder},
};
use thiserror::Error;

use crate::raw;
use crate::{
    raw::{
        BYTE_ARRAY_ID, BYTE_ID, COMPOUND_ID, DOUBLE_ID, FLOAT_ID, INT_ARRAY_ID,
        INT_ID, LIST_ID, LONG_ARRAY_ID, LONG_ID, SHORT_ID, STRING_ID, TAG_END_ID,
    },
    settings::{DepthLimit, IoOptions, NbtCompression},
    tag::{NbtCompound, NbtList, NbtTag},
};


// ================================
//  Reading functions
// ================================

/// Reads an NBT document whose root is a compound from the given reader,
/// returning the compound and its root name.
pub fn read_compound<R: Read>(
    reader: &mut R,
    opts:   IoOptions,
) -> Result<(NbtCompound, String), NbtIoError> {
    match opts.compression {
        NbtCompression::Uncompressed => read_compound_uncompressed(reader, opts),
        NbtCompression::ZlibCompressed => {
            read_compound_uncompressed(&mut ZlibDecoder::new(reader), opts)
        }
        NbtCompression::GzipCompressed => {
            read_compound_uncompressed(&mut GzDecoder::new(reader), opts)
        }
    }
}

fn read_compound_uncompressed<R: Read>(
    reader: &mut R,
    opts:   IoOptions,
) -> Result<(NbtCompound, String), NbtIoError> {
    let root_id = raw::read_u8(reader)?;
    if root_id != COMPOUND_ID {
        return Err(NbtIoError::TagTypeMismatch {
            expected: COMPOUND_ID,
            found:    root_id,
        });
    }

    let root_name = raw::read_string(reader, opts)?;
    match read_tag_body(reader, opts, COMPOUND_ID, 0)? {
        NbtTag::Compound(compound) => Ok((compound, root_name)),
        _ => unreachable!("read_tag_body with COMPOUND_ID returns a compound"),
    }
}

fn read_tag_body<R: Read>(
    reader:        &mut R,
    opts:          IoOptions,
    tag_id:        u8,
    current_depth: u32,
) -> Result<NbtTag, NbtIoError> {
    let tag = match tag_id {
        BYTE_ID   => NbtTag::Byte(  raw::read_i8( reader)?),
        SHORT_ID  => NbtTag::Short( raw::read_i16(reader, opts)?),
        INT_ID    => NbtTag::Int(   raw::read_i32(reader, opts)?),
        LONG_ID   => NbtTag::Long(  raw::read_i64(reader, opts)?),
        FLOAT_ID  => NbtTag::Float( raw::read_f32(reader, opts)?),
        DOUBLE_ID => NbtTag::Double(raw::read_f64(reader, opts)?),
        BYTE_ARRAY_ID => {
            let len = raw::read_i32_as_usize(reader, opts)?;
            let mut array = vec![0_u8; len];
            reader.read_exact(&mut array)?;

            NbtTag::ByteArray(raw::cast_byte_buf_to_signed(array))
        }
        STRING_ID => NbtTag::String(raw::read_string(reader, opts)?),
        LIST_ID => {
            let element_id = raw::read_u8(reader)?;
            let len = raw::read_i32_as_usize(reader, opts)?;

            // A nonempty list of TAG_End is not representable
            if element_id > LONG_ARRAY_ID || (element_id == TAG_END_ID && len > 0) {
                return Err(NbtIoError::InvalidTagId(element_id));
            }

            if len == 0 {
                return Ok(NbtTag::List(NbtList::new()));
            }

            if current_depth >= opts.depth_limit.0 {
                return Err(NbtIoError::ExceededDepthLimit {
                    limit: opts.depth_limit,
                });
            }

            let mut list = NbtList::with_capacity(len.min(65_536));
            for _ in 0..len {
                list.push(read_tag_body(reader, opts, element_id, current_depth + 1)?);
            }

            NbtTag::List(list)
        }
        COMPOUND_ID => {
            let mut compound = NbtCompound::new();
            let mut entry_id = raw::read_u8(reader)?;

            if entry_id != TAG_END_ID && current_depth >= opts.depth_limit.0 {
                return Err(NbtIoError::ExceededDepthLimit {
                    limit: opts.depth_limit,
                });
            }

            // Read until TAG_End
            while entry_id != TAG_END_ID {
                let name = raw::read_string(reader, opts)?;
                let tag = read_tag_body(reader, opts, entry_id, current_depth + 1)?;
                compound.insert(name, tag);
                entry_id = raw::read_u8(reader)?;
            }

            NbtTag::Compound(compound)
        }
        INT_ARRAY_ID => {
            let len = raw::read_i32_as_usize(reader, opts)?;
            NbtTag::IntArray(raw::read_i32_array(reader, opts, len)?)
        }
        LONG_ARRAY_ID => {
            let len = raw::read_i32_as_usize(reader, opts)?;
            NbtTag::LongArray(raw::read_i64_array(reader, opts, len)?)
        }
        invalid => return Err(NbtIoError::InvalidTagId(invalid)),
    };

    Ok(tag)
}

// ================================
//  Writing functions
// ================================

/// Writes the provided compound as a complete NBT document.
/// If no root name is provided, the empty string is used.
pub fn write_compound<W: Write>(
    writer:    &mut W,
    opts:      IoOptions,
    root_name: Option<&str>,
    root:      &NbtCompound,
) -> Result<(), NbtIoError> {
    let (mode, compression) = match opts.compression {
        NbtCompression::Uncompressed => {
            return write_compound_uncompressed(writer, opts, root_name, root);
        }
        NbtCompression::ZlibCompressed => (2, Compression::default()),
        NbtCompression::GzipCompressed => (1, Compression::default()),
    };

    if mode == 1 {
        let mut encoder = GzEncoder::new(writer, compression);
        write_compound_uncompressed(&mut encoder, opts, root_name, root)?;
        encoder.finish()?;
    } else {
        let mut encoder = ZlibEncoder::new(writer, compression);
        write_compound_uncompressed(&mut encoder, opts, root_name, root)?;
        encoder.finish()?;
    }

    Ok(())
}

fn write_compound_uncompressed<W: Write>(
    writer:    &mut W,
    opts:      IoOptions,
    root_name: Option<&str>,
    root:      &NbtCompound,
) -> Result<(), NbtIoError> {
    raw::write_u8(writer, COMPOUND_ID)?;
    raw::write_string(writer, opts, root_name.unwrap_or(""))?;
    write_compound_body(writer, opts, root)
}

fn write_compound_body<W: Write>(
    writer: &mut W,
    opts:   IoOptions,
    com:    &NbtCompound,
) -> Result<(), NbtIoError> {
    for (name, tag) in com {
        raw::write_u8(writer, tag.id())?;
        raw::write_string(writer, opts, name)?;
        write_tag_body(writer, opts, tag)?;
    }
    raw::write_u8(writer, TAG_END_ID)
        .map_err(NbtIoError::from)
}

fn write_tag_body<W: Write>(
    writer: &mut W,
    opts:   IoOptions,
    tag:    &NbtTag,
) -> Result<(), NbtIoError> {
    match tag {
        NbtTag::Byte(value)   => raw::write_i8( writer, *value)?,
        NbtTag::Short(value)  => raw::write_i16(writer, opts, *value)?,
        NbtTag::Int(value)    => raw::write_i32(writer, opts, *value)?,
        NbtTag::Long(value)   => raw::write_i64(writer, opts, *value)?,
        NbtTag::Float(value)  => raw::write_f32(writer, opts, *value)?,
        NbtTag::Double(value) => raw::write_f64(writer, opts, *value)?,
        NbtTag::ByteArray(values) => {
            write_len(writer, opts, values.len())?;
            writer.write_all(&raw::cast_bytes_to_unsigned(values))?;
        }
        NbtTag::String(value) => raw::write_string(writer, opts, value)?,
        NbtTag::List(list) => {
            let element_id = match list.get(0) {
                Some(first) => first.id(),
                None => TAG_END_ID,
            };

            raw::write_u8(writer, element_id)?;
            write_len(writer, opts, list.len())?;

            for element in list {
                if element.id() != element_id {
                    return Err(NbtIoError::NonHomogenousList {
                        list_type:    element_id,
                        encountered:  element.id(),
                    });
                }
                write_tag_body(writer, opts, element)?;
            }
        }
        NbtTag::Compound(com) => write_compound_body(writer, opts, com)?,
        NbtTag::IntArray(values) => {
            write_len(writer, opts, values.len())?;
            for value in values {
                raw::write_i32(writer, opts, *value)?;
            }
        }
        NbtTag::LongArray(values) => {
            write_len(writer, opts, values.len())?;
            for value in values {
                raw::write_i64(writer, opts, *value)?;
            }
        }
    }

    Ok(())
}

fn write_len<W: Write>(writer: &mut W, opts: IoOptions, len: usize) -> Result<(), NbtIoError> {
    let len = i32::try_from(len).map_err(|_| NbtIoError::LengthTooLong(len))?;
    raw::write_i32(writer, opts, len)?;
    Ok(())
}

// ================================
//  Bedrock level.dat framing
// ================================

/// Reads the `[version: u32 LE][payload length: u32 LE]` header which Bedrock
/// prefixes to its `level.dat` NBT payload.
pub fn read_bedrock_header<R: Read>(reader: &mut R) -> Result<(u32, u32), NbtIoError> {
    let mut header = [0; 8];
    reader.read_exact(&mut header)?;

    let version = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let payload_len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

    Ok((version, payload_len))
}

/// Writes the Bedrock `level.dat` prefix header.
pub fn write_bedrock_header<W: Write>(
    writer:      &mut W,
    version:     u32,
    payload_len: u32,
) -> Result<(), NbtIoError> {
    writer.write_all(&version.to_le_bytes())?;
    writer.write_all(&payload_len.to_le_bytes())?;
    Ok(())
}

// ================================
//  Errors
// ================================

/// An error which occurred while reading or writing binary NBT.
#[derive(Error, Debug)]
pub enum NbtIoError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("invalid NBT tag ID {0:#04x}")]
    InvalidTagId(u8),
    #[error("expected tag ID {expected:#04x} but found {found:#04x}")]
    TagTypeMismatch {
        expected: u8,
        found:    u8,
    },
    #[error("NBT list declares element type {list_type:#04x} but holds {encountered:#04x}")]
    NonHomogenousList {
        list_type:   u8,
        encountered: u8,
    },
    #[error("negative length prefix {0}")]
    NegativeLength(i32),
    #[error("sequence of length {0} cannot be length-prefixed")]
    LengthTooLong(usize),
    #[error("string of {0} bytes exceeds the 16-bit length prefix")]
    StringTooLong(usize),
    #[error("string is not valid for the selected encoding")]
    InvalidString,
    #[error("exceeded NBT depth limit of {}", limit.0)]
    ExceededDepthLimit {
        limit: DepthLimit,
    },
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn sample_compound() -> NbtCompound {
        let mut inner = NbtCompound::new();
        inner.insert("name", "minecraft:stone");
        inner.insert("val", 2_i32);

        let mut list = NbtList::new();
        list.push(1_i16);
        list.push(2_i16);

        let mut root = NbtCompound::new();
        root.insert("inner", inner);
        root.insert("list", list);
        root.insert("flag", 1_i8);
        root.insert("longs", vec![1_i64, -2, 3]);
        root
    }

    #[test]
    fn round_trip_both_flavors() {
        for opts in [IoOptions::java_uncompressed(), IoOptions::bedrock_uncompressed()] {
            let root = sample_compound();

            let mut bytes = Vec::new();
            write_compound(&mut bytes, opts, Some("root"), &root).unwrap();

            let (reread, name) = read_compound(&mut Cursor::new(&bytes), opts).unwrap();
            assert_eq!(name, "root");
            assert_eq!(reread, root);
        }
    }

    #[test]
    fn bedrock_is_little_endian() {
        let mut root = NbtCompound::new();
        root.insert("v", 1_i32);

        let mut bytes = Vec::new();
        write_compound(&mut bytes, IoOptions::bedrock_uncompressed(), None, &root).unwrap();

        // compound id, name len 0, entry id, name len 1, 'v', then 01 00 00 00
        assert_eq!(
            bytes,
            [0x0A, 0, 0, 0x03, 1, 0, b'v', 1, 0, 0, 0, 0x00],
        );
    }

    #[test]
    fn gzip_round_trip() {
        let root = sample_compound();
        let opts = IoOptions::java_gzip();

        let mut bytes = Vec::new();
        write_compound(&mut bytes, opts, None, &root).unwrap();
        // gzip magic
        assert_eq!(&bytes[..2], &[0x1F, 0x8B]);

        let (reread, _) = read_compound(&mut Cursor::new(&bytes), opts).unwrap();
        assert_eq!(reread, root);
    }

    #[test]
    fn rejects_nonhomogenous_list() {
        let mut list = NbtList::new();
        list.push(1_i16);
        list.push(2_i32);

        let mut root = NbtCompound::new();
        root.insert("list", list);

        let mut bytes = Vec::new();
        let err = write_compound(
            &mut bytes,
            IoOptions::java_uncompressed(),
            None,
            &root,
        );
        assert!(matches!(err, Err(NbtIoError::NonHomogenousList { .. })));
    }

    #[test]
    fn rejects_truncated_input() {
        let root = sample_compound();
        let opts = IoOptions::bedrock_uncompressed();

        let mut bytes = Vec::new();
        write_compound(&mut bytes, opts, None, &root).unwrap();
        bytes.truncate(bytes.len() - 4);

        assert!(read_compound(&mut Cursor::new(&bytes), opts).is_err());
    }
}
