/// The **Image file** volume reader variant: addresses a regular file as if
/// it were a raw disk, optionally restricted to one partition's byte range.
///
/// Partition geometry comes from a pluggable decoder — here, a minimal MBR
/// table parser grounded on `examples/other_examples/19e0520e_kregerl-MBR-Parser`.
/// GPT and "whole disk, no partition table" are represented as
/// [`PartitionTable::None`] and treated as "address the whole file".
use super::{boot_sector, check_bounds, FsKind, VolumeGeometry, VolumeKind, VolumeReader};
use crate::error::{OrcError, Result};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use uuid::Uuid;

const SECTOR_SIZE: u64 = 512;
const BOOT_SIGNATURE: [u8; 2] = [0x55, 0xAA];

/// One decoded MBR partition table entry.
#[derive(Debug, Clone, Copy)]
pub struct MbrEntry {
    pub partition_type: u8,
    pub lba_start: u32,
    pub num_sectors: u32,
}

/// Partition geometry backing an [`ImageFileReader`] (or a [`super::raw_disk::RawDiskReader`]).
#[derive(Debug, Clone)]
pub enum PartitionTable {
    /// No partition table decoded — address the whole underlying file/disk.
    None,
    /// A specific MBR entry selected by the `,partition=N` location token.
    Mbr(MbrEntry),
}

impl PartitionTable {
    /// Byte offset/length of the addressable range this selects, given the
    /// sector size of the underlying device.
    pub fn byte_range(&self, sector_size: u64) -> Option<(u64, u64)> {
        match self {
            PartitionTable::None => None,
            PartitionTable::Mbr(e) => Some((
                e.lba_start as u64 * sector_size,
                e.num_sectors as u64 * sector_size,
            )),
        }
    }
}

/// Decode the 4 primary MBR partition table entries from a 512-byte boot
/// sector. Returns `None` if the `0x55AA` boot signature is absent, or if
/// the byte at offset 0x1C2 (partition type of entry 0) is the GPT
/// protective-MBR marker `0xEE` (GPT volumes are out of scope; callers
/// should address the whole image instead).
pub fn decode_mbr(sector: &[u8; 512]) -> Option<Vec<MbrEntry>> {
    if sector[510..512] != BOOT_SIGNATURE {
        return None;
    }
    let mut entries = Vec::with_capacity(4);
    for i in 0..4 {
        let base = 446 + i * 16;
        let partition_type = sector[base + 4];
        if partition_type == 0 {
            continue;
        }
        let lba_start = u32::from_le_bytes(sector[base + 8..base + 12].try_into().unwrap());
        let num_sectors = u32::from_le_bytes(sector[base + 12..base + 16].try_into().unwrap());
        entries.push(MbrEntry {
            partition_type,
            lba_start,
            num_sectors,
        });
    }
    Some(entries)
}

pub struct ImageFileReader {
    file: Mutex<File>,
    path: PathBuf,
    base_offset: u64,
    geometry: VolumeGeometry,
    volume_len: u64,
}

impl std::fmt::Debug for ImageFileReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageFileReader")
            .field("path", &self.path)
            .field("base_offset", &self.base_offset)
            .field("geometry", &self.geometry)
            .finish()
    }
}

impl ImageFileReader {
    /// Open `path` as an image file. `partition` selects which MBR entry (by
    /// 0-based index) to address; `None` addresses the whole file starting
    /// at its own boot sector.
    pub fn open(path: impl AsRef<Path>, partition: Option<usize>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path).map_err(|e| OrcError::Io {
            path: path.clone(),
            source: e,
        })?;

        let file_len = file
            .metadata()
            .map_err(|e| OrcError::Io {
                path: path.clone(),
                source: e,
            })?
            .len();

        let mut first_sector = [0u8; 512];
        file.read_exact(&mut first_sector).map_err(|e| OrcError::Io {
            path: path.clone(),
            source: e,
        })?;

        let base_offset = if let Some(idx) = partition {
            let entries = decode_mbr(&first_sector).ok_or_else(|| OrcError::Config {
                reason: format!("{}: no MBR partition table found", path.display()),
            })?;
            let entry = entries.get(idx).ok_or_else(|| OrcError::Config {
                reason: format!("{}: partition index {idx} out of range", path.display()),
            })?;
            entry.lba_start as u64 * SECTOR_SIZE
        } else {
            0
        };

        file.seek(SeekFrom::Start(base_offset)).map_err(|e| OrcError::Io {
            path: path.clone(),
            source: e,
        })?;
        let mut boot = [0u8; 512];
        file.read_exact(&mut boot).map_err(|e| OrcError::Io {
            path: path.clone(),
            source: e,
        })?;
        let geometry = boot_sector::parse_boot_sector(&boot)?;
        let volume_len = (file_len - base_offset).min(geometry.cluster_count * geometry.bytes_per_cluster() as u64);
        let volume_len = if volume_len == 0 {
            file_len - base_offset
        } else {
            volume_len
        };

        Ok(Self {
            file: Mutex::new(file),
            path,
            base_offset,
            geometry,
            volume_len,
        })
    }
}

impl VolumeReader for ImageFileReader {
    fn read_at(&self, byte_offset: u64, len: u64) -> Result<Vec<u8>> {
        check_bounds(byte_offset, len, self.volume_len)?;
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(self.base_offset + byte_offset))
            .map_err(|e| OrcError::Io {
                path: self.path.clone(),
                source: e,
            })?;
        let mut buf = vec![0u8; len as usize];
        file.read_exact(&mut buf).map_err(|e| OrcError::Io {
            path: self.path.clone(),
            source: e,
        })?;
        Ok(buf)
    }

    fn len(&self) -> u64 {
        self.volume_len
    }

    fn serial(&self) -> u64 {
        self.geometry.serial
    }

    fn fs_type(&self) -> FsKind {
        self.geometry.fs_kind
    }

    fn bytes_per_cluster(&self) -> u32 {
        self.geometry.bytes_per_cluster()
    }

    fn mft_start_lcn(&self) -> u64 {
        self.geometry.mft_start_lcn
    }

    fn record_size(&self) -> u32 {
        self.geometry.mft_record_size
    }

    fn kind(&self) -> VolumeKind {
        VolumeKind::Image
    }

    fn snapshot_id(&self) -> Option<Uuid> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn make_image(with_mbr: bool) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        let mut disk = vec![0u8; 4096 * 16];

        if with_mbr {
            disk[510] = 0x55;
            disk[511] = 0xAA;
            // One entry: type 0x07 (NTFS), starting at sector 2, 10 sectors.
            let base = 446;
            disk[base + 4] = 0x07;
            disk[base + 8..base + 12].copy_from_slice(&2u32.to_le_bytes());
            disk[base + 12..base + 16].copy_from_slice(&10u32.to_le_bytes());

            // Boot sector for the partition lives at sector 2 (offset 1024).
            write_ntfs_boot(&mut disk[1024..1536]);
        } else {
            write_ntfs_boot(&mut disk[0..512]);
        }

        f.write_all(&disk).unwrap();
        f.flush().unwrap();
        f
    }

    fn write_ntfs_boot(b: &mut [u8]) {
        b[0] = 0xEB;
        b[3..11].copy_from_slice(b"NTFS    ");
        b[0x0B..0x0D].copy_from_slice(&512u16.to_le_bytes());
        b[0x0D] = 8;
        b[0x28..0x30].copy_from_slice(&100i64.to_le_bytes());
        b[0x30..0x38].copy_from_slice(&4i64.to_le_bytes());
        b[0x40] = (-10i8) as u8;
        b[0x48..0x50].copy_from_slice(&42u64.to_le_bytes());
    }

    #[test]
    fn reads_whole_file_without_partition() {
        let f = make_image(false);
        let reader = ImageFileReader::open(f.path(), None).unwrap();
        assert_eq!(reader.fs_type(), FsKind::Ntfs);
        assert_eq!(reader.serial(), 42);
        let data = reader.read_at(0, 512).unwrap();
        assert_eq!(&data[3..11], b"NTFS    ");
    }

    #[test]
    fn reads_selected_partition() {
        let f = make_image(true);
        let reader = ImageFileReader::open(f.path(), Some(0)).unwrap();
        assert_eq!(reader.fs_type(), FsKind::Ntfs);
        let data = reader.read_at(0, 512).unwrap();
        assert_eq!(&data[3..11], b"NTFS    ");
    }

    #[test]
    fn out_of_range_read_fails() {
        let f = make_image(false);
        let reader = ImageFileReader::open(f.path(), None).unwrap();
        let err = reader.read_at(reader.len(), 1).unwrap_err();
        assert!(matches!(err, OrcError::OutOfRange { .. }));
    }
}
