//! Codecs for one `Sections` entry of a Java chunk.
//!
//! Two layouts exist. Up to 1.12 a section stores raw `Blocks` IDs with a
//! `Data` meta nibble array; from 1.13 ("the flattening") it stores a
//! palette of named states plus a packed `BlockStates` index array, whose
//! packing changed again with the 1.16 format bump.

use std::collections::HashMap;

use thiserror::Error;

use strata_chunk::packed::{
    self, BitPackError, CELLS_PER_SUBCHUNK, PackOrder,
};
use strata_chunk::{
    BlockState, BlockStorage, NibbleArray, StorageCheckError, Subchunk,
};
use strata_nbt::{NbtCompound, NbtList, NbtStructureError, NbtTag};


/// First DataVersion of the flattened section layout (17w47a).
pub const DATA_VERSION_FLATTENING: i32 = 1444;

/// First DataVersion with non-spanning index packing (20w17a).
pub const DATA_VERSION_NON_SPANNING: i32 = 2529;

/// Last DataVersion with the `Level`/`Sections` chunk layout (1.17.1).
/// The 1.18 world-height rework is out of supported range.
pub const DATA_VERSION_MAX: i32 = 2730;

/// The section codec variants, selected by a chunk's DataVersion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JavaSubchunkCodec {
    /// 1.12 and earlier: `Blocks` + `Data`.
    Legacy,
    /// 1.13+: `Palette` + `BlockStates`.
    Flattened {
        order: PackOrder,
    },
}

impl JavaSubchunkCodec {
    /// Selects the codec for a chunk's DataVersion. A missing DataVersion
    /// means the chunk predates 1.13.
    pub fn for_data_version(data_version: Option<i32>) -> Result<Self, JavaSubchunkError> {
        match data_version {
            None => Ok(Self::Legacy),
            Some(version) if (0..DATA_VERSION_FLATTENING).contains(&version) => Ok(Self::Legacy),
            Some(version) if (DATA_VERSION_FLATTENING..DATA_VERSION_NON_SPANNING)
                .contains(&version) =>
            {
                Ok(Self::Flattened { order: PackOrder::Spanning })
            }
            Some(version) if (DATA_VERSION_NON_SPANNING..=DATA_VERSION_MAX)
                .contains(&version) =>
            {
                Ok(Self::Flattened { order: PackOrder::NonSpanning })
            }
            Some(version) => Err(JavaSubchunkError::UnknownVersion(version)),
        }
    }

    /// Decodes one section compound into a subchunk.
    pub fn decode(self, section: &NbtCompound) -> Result<Subchunk, JavaSubchunkError> {
        let y = section.get::<i8>("Y")?;
        if !(0..16).contains(&y) {
            return Err(JavaSubchunkError::SectionYOutOfRange(y));
        }

        let mut subchunk = match self {
            Self::Legacy => decode_legacy(y as u8, section)?,
            Self::Flattened { order } => decode_flattened(y as u8, section, order)?,
        };

        subchunk.set_block_light(read_light(section, "BlockLight")?);
        subchunk.set_sky_light(read_light(section, "SkyLight")?);

        Ok(subchunk)
    }

    /// Encodes a subchunk into a section compound, the inverse of
    /// [`decode`](Self::decode).
    pub fn encode(self, subchunk: &Subchunk) -> Result<NbtCompound, JavaSubchunkError> {
        if subchunk.storage_count() > 1 {
            log::warn!(
                "Java sections hold a single block layer; dropping {} extra layers",
                subchunk.storage_count() - 1,
            );
        }
        // At least one storage always exists.
        let storage = subchunk.storage(0).expect("subchunks hold at least one storage");

        let mut section = NbtCompound::new();
        section.insert("Y", subchunk.y() as i8);

        match self {
            Self::Legacy => encode_legacy(storage, &mut section)?,
            Self::Flattened { order } => encode_flattened(storage, &mut section, order)?,
        }

        if let Some(light) = subchunk.block_light() {
            section.insert("BlockLight", nibble_to_nbt(light));
        }
        if let Some(light) = subchunk.sky_light() {
            section.insert("SkyLight", nibble_to_nbt(light));
        }

        Ok(section)
    }
}

/// Maps a Java cell index (`y<<8 | z<<4 | x`) to the canonical storage
/// index (`x<<8 | z<<4 | y`).
#[inline]
fn java_to_canonical(java: usize) -> usize {
    let y = (java >> 8) & 15;
    let z = (java >> 4) & 15;
    let x = java & 15;
    x << 8 | z << 4 | y
}

fn expect_len(
    field:    &'static str,
    expected: usize,
    received: usize,
) -> Result<(), JavaSubchunkError> {
    if expected == received {
        Ok(())
    } else {
        Err(JavaSubchunkError::ShortArray {
            field,
            expected,
            received,
        })
    }
}

fn read_light(
    section: &NbtCompound,
    field:   &'static str,
) -> Result<Option<NibbleArray<2048>>, JavaSubchunkError> {
    let Some(bytes) = section.get_opt::<&Vec<i8>>(field)? else {
        return Ok(None);
    };
    expect_len(field, 2048, bytes.len())?;

    let mut array = NibbleArray::zeroed();
    for (slot, &byte) in array.0.iter_mut().zip(bytes) {
        *slot = byte as u8;
    }
    Ok(Some(array))
}

fn nibble_to_nbt(array: &NibbleArray<2048>) -> Vec<i8> {
    array.0.iter().map(|&byte| byte as i8).collect()
}

fn decode_legacy(y: u8, section: &NbtCompound) -> Result<Subchunk, JavaSubchunkError> {
    let blocks = section.get::<&Vec<i8>>("Blocks")?;
    let data = section.get::<&Vec<i8>>("Data")?;
    expect_len("Blocks", CELLS_PER_SUBCHUNK, blocks.len())?;
    expect_len("Data", CELLS_PER_SUBCHUNK / 2, data.len())?;

    let mut meta = NibbleArray::<2048>::zeroed();
    for (slot, &byte) in meta.0.iter_mut().zip(data) {
        *slot = byte as u8;
    }

    // Index 0 is always air; distinct (id, meta) pairs are interned once.
    let mut palette = vec![BlockState::air().clone()];
    let mut interned: HashMap<(u8, u8), u16> = HashMap::new();
    let mut indices = Box::new([0_u16; CELLS_PER_SUBCHUNK]);

    for java in 0..CELLS_PER_SUBCHUNK {
        let id = blocks[java] as u8;
        if id == 0 {
            continue;
        }

        let meta = meta.get_flattened(java).unwrap_or(0);
        let index = *interned.entry((id, meta)).or_insert_with(|| {
            palette.push(BlockState::java_legacy(id, meta));
            (palette.len() - 1) as u16
        });

        indices[java_to_canonical(java)] = index;
    }

    let storage = BlockStorage::new_checked(palette, indices)?;
    Ok(Subchunk::with_storages(y, vec![storage])
        .expect("exactly one storage is provided"))
}

fn encode_legacy(
    storage: &BlockStorage,
    section: &mut NbtCompound,
) -> Result<(), JavaSubchunkError> {
    let palette = storage.palette();
    let mut blocks = vec![0_i8; CELLS_PER_SUBCHUNK];
    let mut meta = NibbleArray::<2048>::zeroed();

    for java in 0..CELLS_PER_SUBCHUNK {
        let state = &palette[usize::from(storage.indices()[java_to_canonical(java)])];

        let (id, id_meta) = match state {
            BlockState::JavaLegacy { id, meta } => (*id, *meta),
            state if state.is_air() => (0, 0),
            state => {
                return Err(JavaSubchunkError::UnrepresentableState(format!("{state:?}")));
            }
        };

        blocks[java] = id as i8;
        meta.set_flattened(java, id_meta);
    }

    section.insert("Blocks", blocks);
    section.insert("Data", nibble_to_nbt(&meta));
    Ok(())
}

fn decode_flattened(
    y:       u8,
    section: &NbtCompound,
    order:   PackOrder,
) -> Result<Subchunk, JavaSubchunkError> {
    let palette_list = section.get::<&NbtList>("Palette")?;
    let block_states = section.get::<&Vec<i64>>("BlockStates")?;

    let bits = packed::bits_from_u64_word_count(block_states.len(), order)?;
    let words: Vec<u64> = block_states.iter().map(|&word| word as u64).collect();
    let java_indices = packed::unpack_u64(&words, bits, order)?;

    let mut palette = Vec::with_capacity(palette_list.len());
    for entry in palette_list {
        let compound: &NbtCompound = entry.try_into()?;
        palette.push(palette_entry_to_state(compound)?);
    }

    let mut indices = Box::new([0_u16; CELLS_PER_SUBCHUNK]);
    for (java, &index) in java_indices.iter().enumerate() {
        indices[java_to_canonical(java)] = index;
    }

    let storage = BlockStorage::new_checked(palette, indices)?;
    Ok(Subchunk::with_storages(y, vec![storage])
        .expect("exactly one storage is provided"))
}

fn encode_flattened(
    storage: &BlockStorage,
    section: &mut NbtCompound,
    order:   PackOrder,
) -> Result<(), JavaSubchunkError> {
    let palette = storage.palette();

    let mut palette_list = NbtList::with_capacity(palette.len());
    for state in palette {
        palette_list.push(state_to_palette_entry(state)?);
    }

    // The stored width is the minimum that indexes the palette, never
    // below 4. Unlike Bedrock, any width in [4, 16] may appear.
    let min_bits = if palette.len() <= 1 {
        0
    } else {
        (usize::BITS - (palette.len() - 1).leading_zeros()) as u8
    };
    let bits = min_bits.max(4);

    let mut java_indices = Box::new([0_u16; CELLS_PER_SUBCHUNK]);
    for java in 0..CELLS_PER_SUBCHUNK {
        java_indices[java] = storage.indices()[java_to_canonical(java)];
    }

    let words = packed::pack_u64(&java_indices, bits, order)?;
    let longs: Vec<i64> = words.into_iter().map(|word| word as i64).collect();

    section.insert("Palette", palette_list);
    section.insert("BlockStates", longs);
    Ok(())
}

fn palette_entry_to_state(compound: &NbtCompound) -> Result<BlockState, JavaSubchunkError> {
    let name = compound.get::<&String>("Name")?.clone();

    let mut properties = indexmap::IndexMap::new();
    if let Some(props) = compound.get_opt::<&NbtCompound>("Properties")? {
        for (key, value) in props {
            match value {
                NbtTag::String(value) => {
                    properties.insert(key.clone(), value.clone());
                }
                other => {
                    return Err(JavaSubchunkError::PropertyNotString {
                        name:  key.clone(),
                        found: other.type_name(),
                    });
                }
            }
        }
    }

    Ok(BlockState::Modern { name, properties })
}

fn state_to_palette_entry(state: &BlockState) -> Result<NbtCompound, JavaSubchunkError> {
    // Pre-1.13 palette entries are upgraded through the legacy block
    // table when written to the flattened layout.
    let flattened;
    let state = match state {
        BlockState::Modern { .. } => state,
        BlockState::JavaLegacy { .. } => {
            flattened = state.flattened().ok_or_else(|| {
                JavaSubchunkError::UnrepresentableState(format!("{state:?}"))
            })?;
            &flattened
        }
        other => {
            return Err(JavaSubchunkError::UnrepresentableState(format!("{other:?}")));
        }
    };

    let BlockState::Modern { name, properties } = state else {
        unreachable!("legacy palette entries were flattened to modern states above");
    };

    let mut compound = NbtCompound::new();
    compound.insert("Name", name.as_str());

    // Stateless blocks carry no Properties key at all.
    if !properties.is_empty() {
        let mut props = NbtCompound::new();
        for (key, value) in properties {
            props.insert(key.as_str(), value.as_str());
        }
        compound.insert("Properties", props);
    }

    Ok(compound)
}

#[derive(Error, Debug)]
pub enum JavaSubchunkError {
    #[error("DataVersion {0} is outside the supported range")]
    UnknownVersion(i32),
    #[error(transparent)]
    Structure(#[from] NbtStructureError),
    #[error("section {field} holds {received} bytes, expected {expected}")]
    ShortArray {
        field:    &'static str,
        expected: usize,
        received: usize,
    },
    #[error("section Y value {0} does not fit a 16-slot chunk")]
    SectionYOutOfRange(i8),
    #[error(transparent)]
    BitPack(#[from] BitPackError),
    #[error(transparent)]
    Storage(#[from] StorageCheckError),
    #[error("palette property {name} is a {found} tag, expected a string")]
    PropertyNotString {
        name:  String,
        found: &'static str,
    },
    #[error("block state {0} cannot be stored in this section layout")]
    UnrepresentableState(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modern(name: &str) -> NbtCompound {
        let mut compound = NbtCompound::new();
        compound.insert("Name", name);
        compound
    }

    fn flattened_section(words: Vec<i64>, palette: Vec<NbtCompound>) -> NbtCompound {
        let mut list = NbtList::new();
        for entry in palette {
            list.push(entry);
        }

        let mut section = NbtCompound::new();
        section.insert("Y", 0_i8);
        section.insert("Palette", list);
        section.insert("BlockStates", words);
        section
    }

    #[test]
    fn decodes_two_entry_palette_at_four_bits() {
        // Palette [air, stone], all cells air except (0, 0, 0).
        let mut words = vec![0_i64; 256];
        words[0] = 0x0000_0000_0000_0001;

        let section = flattened_section(
            words,
            vec![modern("minecraft:air"), modern("minecraft:stone")],
        );

        let codec = JavaSubchunkCodec::for_data_version(Some(2566)).unwrap();
        assert_eq!(codec, JavaSubchunkCodec::Flattened { order: PackOrder::NonSpanning });

        let subchunk = codec.decode(&section).unwrap();
        assert_eq!(
            subchunk.block(0, 0, 0, 0).unwrap(),
            &BlockState::modern("minecraft:stone"),
        );
        assert!(subchunk.block(1, 0, 0, 0).unwrap().is_air());
        assert!(subchunk.block(0, 1, 0, 0).unwrap().is_air());

        // Byte-for-byte inverse.
        let reencoded = codec.encode(&subchunk).unwrap();
        assert_eq!(reencoded, section);
    }

    #[test]
    fn spanning_and_non_spanning_disagree_on_layout() {
        let mut subchunk = Subchunk::new(0);
        for x in 0..16 {
            subchunk
                .set_block(x, 0, 0, 0, BlockState::modern(format!("minecraft:block_{x}")))
                .unwrap();
        }

        let spanning = JavaSubchunkCodec::Flattened { order: PackOrder::Spanning };
        let non_spanning = JavaSubchunkCodec::Flattened { order: PackOrder::NonSpanning };

        let a = spanning.encode(&subchunk).unwrap();
        let b = non_spanning.encode(&subchunk).unwrap();

        // 17 palette entries force 5 bits: 320 words spanning, 342 words not.
        assert_eq!(a.get::<&Vec<i64>>("BlockStates").unwrap().len(), 320);
        assert_eq!(b.get::<&Vec<i64>>("BlockStates").unwrap().len(), 342);

        let again = spanning.decode(&a).unwrap();
        for x in 0..16_u8 {
            assert_eq!(
                again.block(x, 0, 0, 0).unwrap(),
                subchunk.block(x, 0, 0, 0).unwrap(),
            );
        }
    }

    #[test]
    fn legacy_sections_intern_id_meta_pairs() {
        let mut blocks = vec![0_i8; 4096];
        let mut data = vec![0_i8; 2048];

        // Java cell order is y<<8 | z<<4 | x; cell (2, 0, 0) is index 2.
        blocks[2] = 35; // wool
        data[1] = 0x07; // meta nibble for cell 2 (low nibble of byte 1)
        blocks[256] = 35; // (0, 1, 0), same wool:7
        data[128] = 0x07;
        blocks[3] = 1; // stone

        let mut section = NbtCompound::new();
        section.insert("Y", 4_i8);
        section.insert("Blocks", blocks);
        section.insert("Data", data);

        let codec = JavaSubchunkCodec::for_data_version(None).unwrap();
        assert_eq!(codec, JavaSubchunkCodec::Legacy);

        let subchunk = codec.decode(&section).unwrap();
        assert_eq!(subchunk.y(), 4);
        assert_eq!(
            subchunk.block(2, 0, 0, 0).unwrap(),
            &BlockState::java_legacy(35, 7),
        );
        assert_eq!(
            subchunk.block(0, 1, 0, 0).unwrap(),
            &BlockState::java_legacy(35, 7),
        );
        assert_eq!(
            subchunk.block(3, 0, 0, 0).unwrap(),
            &BlockState::java_legacy(1, 0),
        );

        // air + wool:7 + stone; the repeated pair was interned once
        assert_eq!(subchunk.storage(0).unwrap().palette().len(), 3);

        let reencoded = codec.encode(&subchunk).unwrap();
        assert_eq!(reencoded, section);
    }

    #[test]
    fn legacy_subchunks_upgrade_to_flattened_sections() {
        let mut blocks = vec![0_i8; 4096];
        let mut data = vec![0_i8; 2048];
        blocks[0] = 35; // wool:7
        blocks[1] = 17; // log:4
        data[0] = 0x47; // low nibble cell 0, high nibble cell 1

        let mut section = NbtCompound::new();
        section.insert("Y", 0_i8);
        section.insert("Blocks", blocks);
        section.insert("Data", data);

        let subchunk = JavaSubchunkCodec::Legacy.decode(&section).unwrap();
        let upgraded = JavaSubchunkCodec::Flattened { order: PackOrder::NonSpanning }
            .encode(&subchunk)
            .unwrap();

        let palette = upgraded.get::<&NbtList>("Palette").unwrap();
        let names: Vec<&str> = palette
            .iter()
            .map(|entry| {
                let compound: &NbtCompound = entry.try_into().unwrap();
                compound.get::<&String>("Name").unwrap().as_str()
            })
            .collect();
        assert_eq!(
            names,
            ["minecraft:air", "minecraft:gray_wool", "minecraft:oak_log"],
        );

        // An ID outside the 1.12 registry has no flattened form.
        let mut odd = Subchunk::new(0);
        odd.set_block(0, 0, 0, 0, BlockState::java_legacy(253, 0)).unwrap();
        assert!(matches!(
            JavaSubchunkCodec::Flattened { order: PackOrder::NonSpanning }.encode(&odd),
            Err(JavaSubchunkError::UnrepresentableState(_)),
        ));
    }

    #[test]
    fn light_arrays_survive_round_trips() {
        let mut blocks = vec![0_i8; 4096];
        blocks[0] = 1;

        let mut light = vec![0_i8; 2048];
        light[0] = 0x4F;

        let mut section = NbtCompound::new();
        section.insert("Y", 0_i8);
        section.insert("Blocks", blocks);
        section.insert("Data", vec![0_i8; 2048]);
        section.insert("BlockLight", light);

        let subchunk = JavaSubchunkCodec::Legacy.decode(&section).unwrap();
        assert_eq!(subchunk.block_light().unwrap().get_flattened(0), Some(0xF));
        assert_eq!(subchunk.block_light().unwrap().get_flattened(1), Some(0x4));
        assert!(subchunk.sky_light().is_none());

        let reencoded = JavaSubchunkCodec::Legacy.encode(&subchunk).unwrap();
        assert_eq!(reencoded, section);
    }

    #[test]
    fn version_routing() {
        assert_eq!(
            JavaSubchunkCodec::for_data_version(Some(1343)).unwrap(),
            JavaSubchunkCodec::Legacy,
        );
        assert_eq!(
            JavaSubchunkCodec::for_data_version(Some(1976)).unwrap(),
            JavaSubchunkCodec::Flattened { order: PackOrder::Spanning },
        );
        assert_eq!(
            JavaSubchunkCodec::for_data_version(Some(2730)).unwrap(),
            JavaSubchunkCodec::Flattened { order: PackOrder::NonSpanning },
        );
        assert!(matches!(
            JavaSubchunkCodec::for_data_version(Some(2860)),
            Err(JavaSubchunkError::UnknownVersion(2860)),
        ));
    }

    #[test]
    fn malformed_sections_are_rejected() {
        let section = flattened_section(vec![0; 257], vec![modern("minecraft:air")]);
        let codec = JavaSubchunkCodec::Flattened { order: PackOrder::NonSpanning };
        assert!(matches!(
            codec.decode(&section),
            Err(JavaSubchunkError::BitPack(BitPackError::UnderivableWordCount(257))),
        ));

        // An index outside the palette is rejected even when the word
        // count is fine.
        let mut words = vec![0_i64; 256];
        words[0] = 0x5;
        let section = flattened_section(words, vec![modern("minecraft:air")]);
        assert!(matches!(
            codec.decode(&section),
            Err(JavaSubchunkError::Storage(StorageCheckError::IndexTooLarge { .. })),
        ));

        let mut short = NbtCompound::new();
        short.insert("Y", 0_i8);
        short.insert("Blocks", vec![0_i8; 100]);
        short.insert("Data", vec![0_i8; 2048]);
        assert!(matches!(
            JavaSubchunkCodec::Legacy.decode(&short),
            Err(JavaSubchunkError::ShortArray { field: "Blocks", .. }),
        ));
    }
}
