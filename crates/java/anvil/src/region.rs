//! Region files: 32×32 chunks per file, 4096-byte sectors, a two-sector
//! header of chunk locations and timestamps, and per-chunk compressed
//! payloads.
//!
//! The writer keeps a bitmap of allocated sectors, derived from the
//! location table on open. Rewrites stay in place when the chunk still
//! fits; otherwise the old run is freed and the lowest run of enough free
//! sectors is claimed, extending the file if none exists. The header entry
//! is written only after the payload, so a torn write cannot leave the
//! table pointing at garbage.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs::File;
use std::io;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use flate2::Compression;
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::ZlibEncoder;
use thiserror::Error;


/// The size of one sector in bytes, used by both the header and payloads.
pub const SECTOR_SIZE: usize = 4096;

/// Sectors 0 and 1 hold the location and timestamp tables.
pub const HEADER_SECTORS: u32 = 2;

const CHUNKS_PER_REGION: usize = 32 * 32;

const EMPTY_SECTOR: &[u8; SECTOR_SIZE] = &[0; SECTOR_SIZE];

/// Compression schemes a chunk payload may be framed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionScheme {
    Gzip,
    Zlib,
}

impl CompressionScheme {
    #[inline]
    fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Gzip),
            2 => Some(Self::Zlib),
            _ => None,
        }
    }

    #[inline]
    fn code(self) -> u8 {
        match self {
            Self::Gzip => 1,
            Self::Zlib => 2,
        }
    }
}

/// File naming flavor of a region directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegionFlavor {
    /// `r.<x>.<z>.mca`
    #[default]
    Anvil,
    /// `r.<x>.<z>.mcr`
    McRegion,
}

impl RegionFlavor {
    #[inline]
    fn extension(self) -> &'static str {
        match self {
            Self::Anvil    => "mca",
            Self::McRegion => "mcr",
        }
    }
}

/// The `(sector offset, sector count)` pair of one chunk's location entry.
/// An all-zero entry means the chunk was never generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct SectorRange {
    offset: u32,
    count:  u32,
}

impl SectorRange {
    #[inline]
    fn is_empty(self) -> bool {
        self.offset == 0 && self.count == 0
    }
}

/// One region file.
///
/// Generic over the underlying storage so tests can run against an
/// in-memory buffer; the file-backed alias is what world loading uses.
/// A `Region` is the sole writer of its file while open.
#[derive(Debug)]
pub struct Region<I> {
    inner:      I,
    locations:  Box<[SectorRange; CHUNKS_PER_REGION]>,
    timestamps: Box<[u32; CHUNKS_PER_REGION]>,
    /// Bit per sector, set when allocated. Derived from the location table.
    sectors:    Vec<u64>,
}

impl Region<File> {
    /// Opens the region file at `path`, creating and initializing it if
    /// `create` is set.
    pub fn open<P: AsRef<Path>>(path: P, create: bool) -> Result<Self, RegionError> {
        let path: &Path = path.as_ref();

        if create {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = File::options()
            .read(true)
            .write(true)
            .create(create)
            .open(path)?;

        Self::new(file, create)
    }
}

impl<I> Region<I>
where
    I: Read + Write + Seek,
{
    /// Wraps an open region around `inner`, reading the header and deriving
    /// the sector bitmap. An empty stream is initialized with a blank
    /// header when `create` is set.
    pub fn new(mut inner: I, create: bool) -> Result<Self, RegionError> {
        let mut file_len = inner.seek(SeekFrom::End(0))?;

        if file_len == 0 && create {
            inner.seek(SeekFrom::Start(0))?;
            for _ in 0..HEADER_SECTORS {
                inner.write_all(EMPTY_SECTOR)?;
            }
            file_len = u64::from(HEADER_SECTORS) * SECTOR_SIZE as u64;
        } else if file_len < u64::from(HEADER_SECTORS) * SECTOR_SIZE as u64 {
            return Err(RegionError::MissingHeader(file_len));
        } else if file_len % SECTOR_SIZE as u64 != 0 {
            // Tolerated: some tools truncate the trailing padding.
            log::warn!("region file length {file_len} is not sector-aligned");
        }

        let file_sectors = file_len.div_ceil(SECTOR_SIZE as u64) as usize;

        let mut locations = Box::new([SectorRange::default(); CHUNKS_PER_REGION]);
        let mut timestamps = Box::new([0_u32; CHUNKS_PER_REGION]);
        let mut sectors = vec![0_u64; file_sectors.div_ceil(64)];
        // The header owns its own sectors.
        sectors[0] |= 0b11;

        inner.seek(SeekFrom::Start(0))?;

        for location in locations.iter_mut() {
            let raw = inner.read_u32::<BigEndian>()?;
            let range = SectorRange {
                offset: raw >> 8,
                count:  raw & 0xFF,
            };

            if range.is_empty() {
                continue;
            }

            if range.offset < HEADER_SECTORS
                || (u64::from(range.offset) + u64::from(range.count)) > file_sectors as u64
            {
                return Err(RegionError::BadLocation {
                    offset: range.offset,
                    count:  range.count,
                });
            }

            for sector in range.offset..range.offset + range.count {
                let slot = &mut sectors[sector as usize / 64];
                let bit = 1_u64 << (sector % 64);
                if *slot & bit != 0 {
                    log::warn!("region sector {sector} is claimed by more than one chunk");
                }
                *slot |= bit;
            }

            *location = range;
        }

        for timestamp in timestamps.iter_mut() {
            *timestamp = inner.read_u32::<BigEndian>()?;
        }

        Ok(Self {
            inner,
            locations,
            timestamps,
            sectors,
        })
    }

    fn index(lx: u8, lz: u8) -> Result<usize, RegionError> {
        if lx < 32 && lz < 32 {
            Ok(usize::from(lx) + usize::from(lz) * 32)
        } else {
            Err(RegionError::BadChunkCoord { lx, lz })
        }
    }

    /// True if the chunk has a nonzero location entry.
    pub fn has_chunk(&self, lx: u8, lz: u8) -> Result<bool, RegionError> {
        Ok(!self.locations[Self::index(lx, lz)?].is_empty())
    }

    /// The modification timestamp of a chunk, in seconds since the epoch.
    pub fn timestamp(&self, lx: u8, lz: u8) -> Result<u32, RegionError> {
        Ok(self.timestamps[Self::index(lx, lz)?])
    }

    /// Reads and decompresses the payload of the chunk at region-local
    /// `(lx, lz)`. `None` means the chunk was never generated.
    pub fn read_chunk(&mut self, lx: u8, lz: u8) -> Result<Option<Vec<u8>>, RegionError> {
        let range = self.locations[Self::index(lx, lz)?];
        if range.is_empty() {
            return Ok(None);
        }

        // Offsets 0 and 1 would point into the header.
        if range.offset < HEADER_SECTORS {
            return Err(RegionError::BadLocation {
                offset: range.offset,
                count:  range.count,
            });
        }

        let mut raw = vec![0_u8; range.count as usize * SECTOR_SIZE];
        self.inner
            .seek(SeekFrom::Start(u64::from(range.offset) * SECTOR_SIZE as u64))?;
        self.inner
            .read_exact(&mut raw)
            .map_err(|_| RegionError::ShortSector {
                offset: range.offset,
                count:  range.count,
            })?;

        let mut cursor = &raw[..];
        // The length field counts the compression byte plus the data.
        let length = cursor.read_u32::<BigEndian>()? as usize;
        let code = cursor.read_u8()?;

        if length < 1 || length + 4 > raw.len() {
            return Err(RegionError::ShortSector {
                offset: range.offset,
                count:  range.count,
            });
        }

        let compressed = &raw[5..4 + length];

        let scheme = CompressionScheme::from_code(code)
            .ok_or(RegionError::UnknownCompression(code))?;

        let mut payload = Vec::new();
        match scheme {
            CompressionScheme::Gzip => {
                GzDecoder::new(compressed)
                    .read_to_end(&mut payload)
                    .map_err(RegionError::Decompress)?;
            }
            CompressionScheme::Zlib => {
                ZlibDecoder::new(compressed)
                    .read_to_end(&mut payload)
                    .map_err(RegionError::Decompress)?;
            }
        }

        Ok(Some(payload))
    }

    /// Compresses and writes a chunk payload, allocating sectors as needed,
    /// and updates the chunk's location and timestamp. The header entry is
    /// flushed only after the payload bytes are in place.
    pub fn write_chunk(&mut self, lx: u8, lz: u8, payload: &[u8]) -> Result<(), RegionError> {
        let index = Self::index(lx, lz)?;

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(payload)?;
        let compressed = encoder.finish()?;

        let framed_len = 4 + 1 + compressed.len();
        let needed = framed_len.div_ceil(SECTOR_SIZE) as u32;
        if needed > 0xFF {
            return Err(RegionError::ChunkTooLarge { sectors: needed });
        }

        let current = self.locations[index];

        let range = if !current.is_empty() && needed <= current.count {
            // The chunk still fits where it is; free any tail sectors.
            self.mark_range(
                SectorRange {
                    offset: current.offset + needed,
                    count:  current.count - needed,
                },
                false,
            );
            SectorRange {
                offset: current.offset,
                count:  needed,
            }
        } else {
            self.mark_range(current, false);
            let offset = self.find_free_run(needed);
            let range = SectorRange {
                offset,
                count: needed,
            };
            self.mark_range(range, true);
            range
        };

        // Payload first: [length][compression code][data], zero-padded to
        // whole sectors.
        self.inner
            .seek(SeekFrom::Start(u64::from(range.offset) * SECTOR_SIZE as u64))?;
        self.inner
            .write_u32::<BigEndian>((compressed.len() + 1) as u32)?;
        self.inner.write_u8(CompressionScheme::Zlib.code())?;
        self.inner.write_all(&compressed)?;

        let padding = range.count as usize * SECTOR_SIZE - framed_len;
        self.inner.write_all(&EMPTY_SECTOR[..padding])?;

        // Header last.
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs() as u32)
            .unwrap_or(0);

        self.locations[index] = range;
        self.timestamps[index] = timestamp;

        self.inner.seek(SeekFrom::Start(index as u64 * 4))?;
        self.inner
            .write_u32::<BigEndian>(range.offset << 8 | range.count & 0xFF)?;

        self.inner
            .seek(SeekFrom::Start(SECTOR_SIZE as u64 + index as u64 * 4))?;
        self.inner.write_u32::<BigEndian>(timestamp)?;

        self.inner.flush()?;
        Ok(())
    }

    #[inline]
    fn is_allocated(&self, sector: u32) -> bool {
        match self.sectors.get(sector as usize / 64) {
            Some(slot) => slot & (1 << (sector % 64)) != 0,
            // Sectors past the end of the file are free for the taking.
            None => false,
        }
    }

    fn mark_range(&mut self, range: SectorRange, allocated: bool) {
        for sector in range.offset..range.offset + range.count {
            let slot_index = sector as usize / 64;
            if slot_index >= self.sectors.len() {
                self.sectors.resize(slot_index + 1, 0);
            }

            let bit = 1_u64 << (sector % 64);
            if allocated {
                self.sectors[slot_index] |= bit;
            } else {
                self.sectors[slot_index] &= !bit;
            }
        }
    }

    /// First run of `needed` consecutive free sectors after the header,
    /// lowest offset first. Runs past the current end of the file grow it.
    fn find_free_run(&self, needed: u32) -> u32 {
        let mut run_start = HEADER_SECTORS;
        let mut run_len = 0_u32;
        let mut sector = HEADER_SECTORS;

        loop {
            if self.is_allocated(sector) {
                run_start = sector + 1;
                run_len = 0;
            } else {
                run_len += 1;
                if run_len == needed {
                    return run_start;
                }
            }
            sector += 1;
        }
    }

    /// Sectors currently allocated to chunks or the header. Exposed for
    /// integrity checks.
    pub fn allocated_sectors(&self) -> Vec<u32> {
        let total = self.sectors.len() as u32 * 64;
        (0..total).filter(|&sector| self.is_allocated(sector)).collect()
    }
}

/// A directory of region files, opened lazily and cached.
#[derive(Debug)]
pub struct RegionDir {
    path:   PathBuf,
    flavor: RegionFlavor,
    cache:  HashMap<(i32, i32), Region<File>>,
}

impl RegionDir {
    pub fn new(path: impl Into<PathBuf>, flavor: RegionFlavor) -> Self {
        Self {
            path: path.into(),
            flavor,
            cache: HashMap::new(),
        }
    }

    fn file_name(&self, rx: i32, rz: i32) -> PathBuf {
        self.path
            .join(format!("r.{rx}.{rz}.{}", self.flavor.extension()))
    }

    /// Whether the region file for `(rx, rz)` exists on disk or is open.
    pub fn region_exists(&self, rx: i32, rz: i32) -> bool {
        self.cache.contains_key(&(rx, rz)) || self.file_name(rx, rz).is_file()
    }

    /// The open region for `(rx, rz)`, opening (and optionally creating)
    /// the backing file on first use.
    pub fn region(
        &mut self,
        rx: i32,
        rz: i32,
        create: bool,
    ) -> Result<&mut Region<File>, RegionError> {
        match self.cache.entry((rx, rz)) {
            Entry::Occupied(occupied) => Ok(occupied.into_mut()),
            Entry::Vacant(vacant) => {
                let path = self
                    .path
                    .join(format!("r.{rx}.{rz}.{}", self.flavor.extension()));
                if !create && !path.is_file() {
                    return Err(RegionError::NoSuchRegion { rx, rz });
                }
                Ok(vacant.insert(Region::open(path, create)?))
            }
        }
    }

    /// Drops every cached region, closing the underlying files.
    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

#[derive(Error, Debug)]
pub enum RegionError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("region file of {0} bytes is too short to hold its header")]
    MissingHeader(u64),
    #[error("chunk coordinate ({lx}, {lz}) is outside the 32×32 region")]
    BadChunkCoord {
        lx: u8,
        lz: u8,
    },
    #[error("location entry (offset {offset}, count {count}) is out of bounds")]
    BadLocation {
        offset: u32,
        count:  u32,
    },
    #[error("chunk data at sector {offset} (count {count}) is truncated")]
    ShortSector {
        offset: u32,
        count:  u32,
    },
    #[error("unknown chunk compression code {0}")]
    UnknownCompression(u8),
    #[error("failed to decompress chunk payload: {0}")]
    Decompress(io::Error),
    #[error("chunk payload spans {sectors} sectors, above the 255-sector limit")]
    ChunkTooLarge {
        sectors: u32,
    },
    #[error("no region file exists for region ({rx}, {rz})")]
    NoSuchRegion {
        rx: i32,
        rz: i32,
    },
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn fresh_region() -> Region<Cursor<Vec<u8>>> {
        Region::new(Cursor::new(Vec::new()), true).unwrap()
    }

    #[test]
    fn fresh_file_is_two_empty_sectors() {
        let region = fresh_region();
        let bytes = region.inner.into_inner();
        assert_eq!(bytes.len(), 2 * SECTOR_SIZE);
        assert!(bytes.iter().all(|&byte| byte == 0));
    }

    #[test]
    fn write_then_read_round_trip() {
        let mut region = fresh_region();

        // A payload of zlib-incompressible bytes, roughly 10 KB compressed.
        let payload: Vec<u8> = (0..10_240_u32)
            .map(|value| (value.wrapping_mul(2_654_435_761) >> 13) as u8)
            .collect();

        region.write_chunk(7, 13, &payload).unwrap();

        assert_eq!(region.locations[7 + 13 * 32].offset, 2);
        assert_eq!(region.locations[7 + 13 * 32].count, 3);

        assert_eq!(region.read_chunk(7, 13).unwrap(), Some(payload.clone()));
        assert_eq!(region.read_chunk(0, 0).unwrap(), None);

        // The file is sector-aligned: header plus three payload sectors.
        let bytes = region.inner.into_inner();
        assert_eq!(bytes.len(), 5 * SECTOR_SIZE);

        // Reopen from the raw bytes and read again.
        let mut reopened = Region::new(Cursor::new(bytes), false).unwrap();
        assert_eq!(reopened.read_chunk(7, 13).unwrap(), Some(payload));
    }

    #[test]
    fn growing_chunk_is_reallocated() {
        let mut region = fresh_region();

        let small: Vec<u8> = (0..100_u32).map(|value| value as u8).collect();
        let noise = |len: usize| -> Vec<u8> {
            (0..len as u32)
                .map(|value| (value.wrapping_mul(2_654_435_761) >> 11) as u8)
                .collect()
        };

        region.write_chunk(0, 0, &small).unwrap();
        // A second chunk right after, so the first cannot grow in place.
        region.write_chunk(1, 0, &noise(5000)).unwrap();

        let first = region.locations[0];
        assert_eq!((first.offset, first.count), (2, 1));

        let big = noise(13_000);
        region.write_chunk(0, 0, &big).unwrap();

        let moved = region.locations[0];
        assert!(moved.count == 4);
        // The old sector is free again and the chunk landed past its
        // neighbor.
        assert!(!region.is_allocated(2));
        assert!(moved.offset > first.offset);

        assert_eq!(region.read_chunk(0, 0).unwrap(), Some(big));

        // A new small chunk reuses the freed low sector, lowest index first.
        region.write_chunk(2, 0, &small).unwrap();
        assert_eq!(region.locations[2].offset, 2);
    }

    #[test]
    fn shrinking_chunk_frees_tail_sectors() {
        let mut region = fresh_region();
        let noise = |len: usize| -> Vec<u8> {
            (0..len as u32)
                .map(|value| (value.wrapping_mul(0x9E37_79B9) >> 9) as u8)
                .collect()
        };

        region.write_chunk(5, 5, &noise(13_000)).unwrap();
        let fat = region.locations[5 + 5 * 32];
        assert!(fat.count >= 3);

        region.write_chunk(5, 5, &noise(100)).unwrap();
        let slim = region.locations[5 + 5 * 32];
        assert_eq!(slim.offset, fat.offset);
        assert_eq!(slim.count, 1);
        assert!(!region.is_allocated(fat.offset + 1));
    }

    #[test]
    fn bitmap_matches_location_table() {
        let mut region = fresh_region();
        let noise = |seed: u32, len: usize| -> Vec<u8> {
            (0..len as u32)
                .map(|value| ((value ^ seed).wrapping_mul(2_654_435_761) >> 13) as u8)
                .collect()
        };

        for i in 0..12_u8 {
            region
                .write_chunk(i, 0, &noise(u32::from(i), 3000 + 700 * usize::from(i)))
                .unwrap();
        }
        for i in (0..12_u8).step_by(2) {
            region
                .write_chunk(i, 0, &noise(u32::from(i) + 100, 9000))
                .unwrap();
        }

        let mut expected: Vec<u32> = vec![0, 1];
        for location in region.locations.iter() {
            expected.extend(location.offset..location.offset + location.count);
        }
        expected.sort_unstable();

        assert_eq!(region.allocated_sectors(), expected);
    }

    #[test]
    fn rejects_oversized_chunks() {
        let mut region = fresh_region();
        // Incompressible payload larger than 255 sectors.
        let huge: Vec<u8> = (0..(256 * SECTOR_SIZE) as u32)
            .map(|value| (value.wrapping_mul(2_654_435_761) >> 7) as u8)
            .collect();

        assert!(matches!(
            region.write_chunk(0, 0, &huge),
            Err(RegionError::ChunkTooLarge { .. }),
        ));
        // Nothing was allocated.
        assert_eq!(region.allocated_sectors(), vec![0, 1]);
    }

    #[test]
    fn rejects_bad_coordinates_and_headers() {
        let mut region = fresh_region();
        assert!(matches!(
            region.read_chunk(32, 0),
            Err(RegionError::BadChunkCoord { .. }),
        ));

        assert!(matches!(
            Region::new(Cursor::new(vec![0_u8; 100]), false),
            Err(RegionError::MissingHeader(100)),
        ));

        // A location table pointing into the header is rejected.
        let mut bytes = vec![0_u8; 3 * SECTOR_SIZE];
        bytes[..4].copy_from_slice(&[0, 0, 1, 1]);
        assert!(matches!(
            Region::new(Cursor::new(bytes), false),
            Err(RegionError::BadLocation { .. }),
        ));
    }

    #[test]
    fn gzip_payloads_are_read() {
        use flate2::write::GzEncoder;

        let mut region = fresh_region();
        let payload = b"gzip framed chunk".to_vec();

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&payload).unwrap();
        let compressed = encoder.finish().unwrap();

        // Hand-frame a gzip chunk at sector 2.
        let mut raw = region.inner.into_inner();
        let mut framed = Vec::new();
        framed.write_u32::<BigEndian>((compressed.len() + 1) as u32).unwrap();
        framed.push(1); // gzip
        framed.extend(&compressed);
        framed.resize(SECTOR_SIZE, 0);
        raw.extend(&framed);
        raw[..4].copy_from_slice(&[0, 0, 2, 1]);

        let mut region = Region::new(Cursor::new(raw), false).unwrap();
        assert_eq!(region.read_chunk(0, 0).unwrap(), Some(payload));

        // An unknown compression code is an error.
        let mut raw = region.inner.into_inner();
        raw[2 * SECTOR_SIZE + 4] = 9;
        let mut region = Region::new(Cursor::new(raw), false).unwrap();
        assert!(matches!(
            region.read_chunk(0, 0),
            Err(RegionError::UnknownCompression(9)),
        ));
    }
}
