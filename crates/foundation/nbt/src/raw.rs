//! Primitive reads and writes, dispatched on the NBT flavor's byte order
//! and string encoding.

use std::io;
use std::io::{Read, Write};

use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::io::NbtIoError;
use crate::settings::{IoOptions, NbtFlavor};


pub(crate) const TAG_END_ID: u8    = 0x0;
pub(crate) const BYTE_ID: u8       = 0x1;
pub(crate) const SHORT_ID: u8      = 0x2;
pub(crate) const INT_ID: u8        = 0x3;
pub(crate) const LONG_ID: u8       = 0x4;
pub(crate) const FLOAT_ID: u8      = 0x5;
pub(crate) const DOUBLE_ID: u8     = 0x6;
pub(crate) const BYTE_ARRAY_ID: u8 = 0x7;
pub(crate) const STRING_ID: u8     = 0x8;
pub(crate) const LIST_ID: u8       = 0x9;
pub(crate) const COMPOUND_ID: u8   = 0xA;
pub(crate) const INT_ARRAY_ID: u8  = 0xB;
pub(crate) const LONG_ARRAY_ID: u8 = 0xC;

macro_rules! ordered_rw {
    ($($read_name:ident, $write_name:ident, $type:ty, $read_method:ident, $write_method:ident);* $(;)?) => {
        $(
            #[inline]
            pub(crate) fn $read_name<R: Read>(
                reader: &mut R,
                opts:   IoOptions,
            ) -> io::Result<$type> {
                match opts.flavor {
                    NbtFlavor::Java    => reader.$read_method::<BigEndian>(),
                    NbtFlavor::Bedrock => reader.$read_method::<LittleEndian>(),
                }
            }

            #[inline]
            pub(crate) fn $write_name<W: Write>(
                writer: &mut W,
                opts:   IoOptions,
                value:  $type,
            ) -> io::Result<()> {
                match opts.flavor {
                    NbtFlavor::Java    => writer.$write_method::<BigEndian>(value),
                    NbtFlavor::Bedrock => writer.$write_method::<LittleEndian>(value),
                }
            }
        )*
    };
}

ordered_rw! {
    read_i16, write_i16, i16, read_i16, write_i16;
    read_u16, write_u16, u16, read_u16, write_u16;
    read_i32, write_i32, i32, read_i32, write_i32;
    read_i64, write_i64, i64, read_i64, write_i64;
    read_f32, write_f32, f32, read_f32, write_f32;
    read_f64, write_f64, f64, read_f64, write_f64;
}

#[inline]
pub(crate) fn read_u8<R: Read>(reader: &mut R) -> io::Result<u8> {
    ReadBytesExt::read_u8(reader)
}

#[inline]
pub(crate) fn write_u8<W: Write>(writer: &mut W, value: u8) -> io::Result<()> {
    WriteBytesExt::write_u8(writer, value)
}

#[inline]
pub(crate) fn read_i8<R: Read>(reader: &mut R) -> io::Result<i8> {
    ReadBytesExt::read_i8(reader)
}

#[inline]
pub(crate) fn write_i8<W: Write>(writer: &mut W, value: i8) -> io::Result<()> {
    WriteBytesExt::write_i8(writer, value)
}

/// Read a signed 32-bit length prefix, rejecting negative values.
pub(crate) fn read_i32_as_usize<R: Read>(
    reader: &mut R,
    opts:   IoOptions,
) -> Result<usize, NbtIoError> {
    let len = read_i32(reader, opts)?;
    usize::try_from(len).map_err(|_| NbtIoError::NegativeLength(len))
}

pub(crate) fn read_string<R: Read>(
    reader: &mut R,
    opts:   IoOptions,
) -> Result<String, NbtIoError> {
    let len = usize::from(read_u16(reader, opts)?);
    let mut bytes = vec![0; len];
    reader.read_exact(&mut bytes)?;

    match opts.flavor {
        NbtFlavor::Java => match cesu8::from_java_cesu8(&bytes) {
            Ok(string) => Ok(string.into_owned()),
            Err(_) => Err(NbtIoError::InvalidString),
        },
        NbtFlavor::Bedrock => {
            String::from_utf8(bytes).map_err(|_| NbtIoError::InvalidString)
        }
    }
}

pub(crate) fn write_string<W: Write>(
    writer: &mut W,
    opts:   IoOptions,
    string: &str,
) -> Result<(), NbtIoError> {
    let bytes = match opts.flavor {
        NbtFlavor::Java    => cesu8::to_java_cesu8(string),
        NbtFlavor::Bedrock => string.as_bytes().into(),
    };

    let len = u16::try_from(bytes.len()).map_err(|_| NbtIoError::StringTooLong(bytes.len()))?;

    write_u16(writer, opts, len)?;
    writer.write_all(&bytes)?;
    Ok(())
}

pub(crate) fn read_i32_array<R: Read>(
    reader: &mut R,
    opts:   IoOptions,
    len:    usize,
) -> io::Result<Vec<i32>> {
    let mut array = Vec::with_capacity(len.min(65_536));
    for _ in 0..len {
        array.push(read_i32(reader, opts)?);
    }
    Ok(array)
}

pub(crate) fn read_i64_array<R: Read>(
    reader: &mut R,
    opts:   IoOptions,
    len:    usize,
) -> io::Result<Vec<i64>> {
    let mut array = Vec::with_capacity(len.min(65_536));
    for _ in 0..len {
        array.push(read_i64(reader, opts)?);
    }
    Ok(array)
}

#[inline]
pub(crate) fn cast_byte_buf_to_signed(bytes: Vec<u8>) -> Vec<i8> {
    bytes.into_iter().map(|byte| byte as i8).collect()
}

#[inline]
pub(crate) fn cast_bytes_to_unsigned(bytes: &[i8]) -> Vec<u8> {
    bytes.iter().map(|&byte| byte as u8).collect()
}
