/// The **Raw disk / partition** volume reader variant: addresses an entire
/// physical disk by offset+length, optionally indexed by a partition-table
/// entry (location grammar: `\\.\PhysicalDriveN[,offset=…[,size=…]]`).
///
/// Shares its `CreateFileW` + progressive-rights-retry open strategy with
/// [`super::mounted::MountedVolumeReader`]; the only difference is the
/// device path shape and the optional partition offset.
use super::image::{decode_mbr, PartitionTable};
use super::{boot_sector, check_bounds, FsKind, VolumeGeometry, VolumeKind, VolumeReader};
use crate::error::{OrcError, Result};
use uuid::Uuid;

#[cfg(windows)]
use super::mounted::imp as win;

pub struct RawDiskReader {
    device_path: String,
    base_offset: u64,
    geometry: VolumeGeometry,
    volume_len: u64,
    #[cfg(windows)]
    handle: windows::Win32::Foundation::HANDLE,
}

impl std::fmt::Debug for RawDiskReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawDiskReader")
            .field("device_path", &self.device_path)
            .field("base_offset", &self.base_offset)
            .field("geometry", &self.geometry)
            .finish()
    }
}

#[cfg(windows)]
impl RawDiskReader {
    /// Open `\\.\PhysicalDriveN`, optionally selecting one MBR partition by
    /// index, and optionally overriding with an explicit `offset`/`size`
    /// pair (location grammar tokens take precedence over the decoded
    /// partition table when both are given).
    pub fn open(
        disk_number: u32,
        partition: Option<usize>,
        explicit_offset: Option<u64>,
        explicit_size: Option<u64>,
    ) -> Result<Self> {
        let device_path = format!("\\\\.\\PhysicalDrive{disk_number}");
        let mut handle = None;
        for rights in win::RIGHTS_LADDER {
            if let Ok(h) = win::open_with_rights(&device_path, rights) {
                handle = Some(h);
                break;
            }
        }
        let handle = handle.ok_or_else(|| OrcError::AccessDenied {
            path: device_path.clone().into(),
        })?;

        let first_sector = win::read_at_offset(handle, 0, 512).map_err(|e| OrcError::Io {
            path: device_path.clone().into(),
            source: std::io::Error::other(e.to_string()),
        })?;
        let mut sector = [0u8; 512];
        sector.copy_from_slice(&first_sector[..512]);

        let base_offset = if let Some(off) = explicit_offset {
            off
        } else if let Some(idx) = partition {
            let entries = decode_mbr(&sector).ok_or_else(|| OrcError::Config {
                reason: format!("{device_path}: no MBR partition table found"),
            })?;
            let entry = entries.get(idx).ok_or_else(|| OrcError::Config {
                reason: format!("{device_path}: partition index {idx} out of range"),
            })?;
            PartitionTable::Mbr(*entry)
                .byte_range(512)
                .map(|(o, _)| o)
                .unwrap_or(0)
        } else {
            0
        };

        let boot = win::read_at_offset(handle, base_offset, 512).map_err(|e| OrcError::Io {
            path: device_path.clone().into(),
            source: std::io::Error::other(e.to_string()),
        })?;
        let geometry = boot_sector::parse_boot_sector(&boot)?;

        let volume_len =
            explicit_size.unwrap_or_else(|| geometry.cluster_count * geometry.bytes_per_cluster() as u64);

        Ok(Self {
            device_path,
            base_offset,
            geometry,
            volume_len,
            handle,
        })
    }
}

#[cfg(windows)]
impl Drop for RawDiskReader {
    fn drop(&mut self) {
        win::close(self.handle);
    }
}

#[cfg(windows)]
impl VolumeReader for RawDiskReader {
    fn read_at(&self, byte_offset: u64, len: u64) -> Result<Vec<u8>> {
        check_bounds(byte_offset, len, self.volume_len)?;
        win::read_at_offset(self.handle, self.base_offset + byte_offset, len as u32).map_err(|e| {
            OrcError::Io {
                path: self.device_path.clone().into(),
                source: std::io::Error::other(e.to_string()),
            }
        })
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
        VolumeKind::RawDisk
    }

    fn snapshot_id(&self) -> Option<Uuid> {
        None
    }
}
