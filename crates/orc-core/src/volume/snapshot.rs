/// The **Snapshot** volume reader variant: like [`super::mounted::MountedVolumeReader`]
/// but pinned to a shadow-copy device path
/// (`\\?\GLOBALROOT\Device\HarddiskVolumeShadowCopyN`) and carrying a
/// non-`None` [`VolumeReader::snapshot_id`].
use super::{boot_sector, check_bounds, FsKind, VolumeGeometry, VolumeKind, VolumeReader};
use crate::error::{OrcError, Result};
use uuid::Uuid;

#[cfg(windows)]
use super::mounted::imp as win;

pub struct SnapshotVolumeReader {
    device_path: String,
    snapshot_id: Uuid,
    geometry: VolumeGeometry,
    volume_len: u64,
    #[cfg(windows)]
    handle: windows::Win32::Foundation::HANDLE,
}

impl std::fmt::Debug for SnapshotVolumeReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotVolumeReader")
            .field("device_path", &self.device_path)
            .field("snapshot_id", &self.snapshot_id)
            .field("geometry", &self.geometry)
            .finish()
    }
}

#[cfg(windows)]
impl SnapshotVolumeReader {
    /// Open a shadow-copy device path directly (callers resolve the VSS
    /// enumeration themselves — glue code out of scope per spec §1).
    pub fn open(device_path: impl Into<String>, snapshot_id: Uuid) -> Result<Self> {
        let device_path = device_path.into();
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

        let boot = win::read_at_offset(handle, 0, 512).map_err(|e| OrcError::Io {
            path: device_path.clone().into(),
            source: std::io::Error::other(e.to_string()),
        })?;
        let geometry = boot_sector::parse_boot_sector(&boot)?;
        let volume_len = geometry.cluster_count * geometry.bytes_per_cluster() as u64;

        Ok(Self {
            device_path,
            snapshot_id,
            geometry,
            volume_len,
            handle,
        })
    }
}

#[cfg(windows)]
impl Drop for SnapshotVolumeReader {
    fn drop(&mut self) {
        win::close(self.handle);
    }
}

#[cfg(windows)]
impl VolumeReader for SnapshotVolumeReader {
    fn read_at(&self, byte_offset: u64, len: u64) -> Result<Vec<u8>> {
        check_bounds(byte_offset, len, self.volume_len)?;
        win::read_at_offset(self.handle, byte_offset, len as u32).map_err(|e| OrcError::Io {
            path: self.device_path.clone().into(),
            source: std::io::Error::other(e.to_string()),
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
        VolumeKind::Snapshot
    }

    fn snapshot_id(&self) -> Option<Uuid> {
        Some(self.snapshot_id)
    }
}
