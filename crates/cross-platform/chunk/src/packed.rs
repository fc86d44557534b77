//! Packing and unpacking of 4096 palette indices into fixed-width words.
//!
//! Three layouts exist in the wild and all are supported:
//! - 64-bit words, non-spanning (Java since the 1.16 format bump): each word
//!   holds `⌊64 / bits⌋` indices, low bits first, and an index never
//!   straddles a word boundary. The trailing `64 mod bits` bits of every
//!   word are padding.
//! - 64-bit words, spanning (Java 1.13 up to the 1.16 bump): indices are
//!   packed back to back, and one index may straddle two words.
//! - 32-bit little-endian words, non-spanning (Bedrock): as the first
//!   layout, with the word width halved. The width is transmitted in the
//!   storage header rather than derived.

use thiserror::Error;


/// Cells in one subchunk (16 × 16 × 16).
pub const CELLS_PER_SUBCHUNK: usize = 4096;

/// Whether an index may straddle a word boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackOrder {
    NonSpanning,
    Spanning,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BitPackError {
    #[error("bits per index must be in [1, 16], but was {0}")]
    InvalidBits(u8),
    #[error("{bits} bits per index requires {expected} words for 4096 cells, but {received} were provided")]
    WordCountMismatch {
        bits:     u8,
        expected: usize,
        received: usize,
    },
    #[error("no bits-per-index value produces a word count of {0}")]
    UnderivableWordCount(usize),
}

#[inline]
fn check_bits(bits: u8) -> Result<(), BitPackError> {
    if bits >= 1 && bits <= 16 {
        Ok(())
    } else {
        Err(BitPackError::InvalidBits(bits))
    }
}

/// Number of 64-bit words needed for 4096 indices at the given width.
pub fn u64_word_count(bits: u8, order: PackOrder) -> usize {
    match order {
        PackOrder::NonSpanning => {
            CELLS_PER_SUBCHUNK.div_ceil(64 / usize::from(bits))
        }
        // 4096 * bits is always divisible by 64
        PackOrder::Spanning => CELLS_PER_SUBCHUNK * usize::from(bits) / 64,
    }
}

/// Number of 32-bit words needed for 4096 indices at the given width.
#[inline]
pub fn u32_word_count(bits: u8) -> usize {
    CELLS_PER_SUBCHUNK.div_ceil(32 / usize::from(bits))
}

/// Derive the bits-per-index of a stored Java index array from its word
/// count. For the non-spanning layout this is the smallest `bits >= 4` whose
/// word count matches; for the spanning layout the word count determines
/// the width exactly.
pub fn bits_from_u64_word_count(
    word_count: usize,
    order:      PackOrder,
) -> Result<u8, BitPackError> {
    match order {
        PackOrder::NonSpanning => {
            for bits in 4..=16 {
                if u64_word_count(bits, order) == word_count {
                    return Ok(bits);
                }
            }
            Err(BitPackError::UnderivableWordCount(word_count))
        }
        PackOrder::Spanning => {
            // word_count = 4096 * bits / 64 = 64 * bits
            if word_count % 64 == 0 && (1..=16).contains(&(word_count / 64)) {
                Ok((word_count / 64) as u8)
            } else {
                Err(BitPackError::UnderivableWordCount(word_count))
            }
        }
    }
}

/// Unpack 4096 indices from 64-bit words.
pub fn unpack_u64(
    words: &[u64],
    bits:  u8,
    order: PackOrder,
) -> Result<Box<[u16; CELLS_PER_SUBCHUNK]>, BitPackError> {
    check_bits(bits)?;

    let expected = u64_word_count(bits, order);
    if words.len() != expected {
        return Err(BitPackError::WordCountMismatch {
            bits,
            expected,
            received: words.len(),
        });
    }

    let mask = (1_u64 << bits) - 1;
    let mut indices = Box::new([0_u16; CELLS_PER_SUBCHUNK]);

    match order {
        PackOrder::NonSpanning => {
            let per_word = usize::from(64 / bits);
            let mut cell = 0;

            'words: for &word in words {
                let mut word = word;
                for _ in 0..per_word {
                    indices[cell] = (word & mask) as u16;
                    word >>= bits;

                    cell += 1;
                    if cell == CELLS_PER_SUBCHUNK {
                        break 'words;
                    }
                }
            }
        }
        PackOrder::Spanning => {
            let bits = usize::from(bits);
            for (cell, index) in indices.iter_mut().enumerate() {
                let bit_index = cell * bits;
                let word = bit_index / 64;
                let offset = bit_index % 64;

                let mut value = words[word] >> offset;
                if offset + bits > 64 {
                    value |= words[word + 1] << (64 - offset);
                }

                *index = (value & mask) as u16;
            }
        }
    }

    Ok(indices)
}

/// Pack 4096 indices into 64-bit words. Padding bits are zero.
pub fn pack_u64(
    indices: &[u16; CELLS_PER_SUBCHUNK],
    bits:    u8,
    order:   PackOrder,
) -> Result<Vec<u64>, BitPackError> {
    check_bits(bits)?;

    let word_count = u64_word_count(bits, order);
    let mask = (1_u64 << bits) - 1;
    let mut words = vec![0_u64; word_count];

    match order {
        PackOrder::NonSpanning => {
            let per_word = usize::from(64 / bits);
            for (cell, &index) in indices.iter().enumerate() {
                let shift = (cell % per_word) as u32 * u32::from(bits);
                words[cell / per_word] |= (u64::from(index) & mask) << shift;
            }
        }
        PackOrder::Spanning => {
            let bits = usize::from(bits);
            for (cell, &index) in indices.iter().enumerate() {
                let bit_index = cell * bits;
                let word = bit_index / 64;
                let offset = bit_index % 64;

                let value = u64::from(index) & mask;
                words[word] |= value << offset;
                if offset + bits > 64 {
                    words[word + 1] |= value >> (64 - offset);
                }
            }
        }
    }

    Ok(words)
}

/// Unpack 4096 indices from 32-bit words. Bedrock never spans word
/// boundaries, so no pack order parameter exists here.
pub fn unpack_u32(
    words: &[u32],
    bits:  u8,
) -> Result<Box<[u16; CELLS_PER_SUBCHUNK]>, BitPackError> {
    check_bits(bits)?;

    let expected = u32_word_count(bits);
    if words.len() != expected {
        return Err(BitPackError::WordCountMismatch {
            bits,
            expected,
            received: words.len(),
        });
    }

    let mask = (1_u32 << bits) - 1;
    let per_word = usize::from(32 / bits);
    let mut indices = Box::new([0_u16; CELLS_PER_SUBCHUNK]);
    let mut cell = 0;

    'words: for &word in words {
        let mut word = word;
        for _ in 0..per_word {
            indices[cell] = (word & mask) as u16;
            word >>= bits;

            cell += 1;
            if cell == CELLS_PER_SUBCHUNK {
                break 'words;
            }
        }
    }

    Ok(indices)
}

/// Pack 4096 indices into 32-bit words. Padding bits are zero.
pub fn pack_u32(
    indices: &[u16; CELLS_PER_SUBCHUNK],
    bits:    u8,
) -> Result<Vec<u32>, BitPackError> {
    check_bits(bits)?;

    let mask = (1_u32 << bits) - 1;
    let per_word = usize::from(32 / bits);
    let mut words = vec![0_u32; u32_word_count(bits)];

    for (cell, &index) in indices.iter().enumerate() {
        let shift = (cell % per_word) as u32 * u32::from(bits);
        words[cell / per_word] |= (u32::from(index) & mask) << shift;
    }

    Ok(words)
}
