/// The **Mounted** volume reader variant: opens `\\.\<drive>` through the OS
/// and issues direct volume reads.
///
/// Grounded on the teacher's `scanner::mft::scan_mft`, which opens
/// `\\.\<drive>:` with `CreateFileW` before calling `FSCTL_ENUM_USN_DATA`;
/// this generalizes that single open into a reusable, bounds-checked reader
/// that other components (MftStore, UsnJournal) can share.
use super::{boot_sector, check_bounds, FsKind, VolumeGeometry, VolumeKind, VolumeReader};
use crate::error::{OrcError, Result};
use std::fmt;
use uuid::Uuid;

#[cfg(windows)]
pub(crate) mod imp {
    use windows::core::PCWSTR;
    use windows::Win32::Foundation::{CloseHandle, HANDLE};
    use windows::Win32::Storage::FileSystem::{
        CreateFileW, ReadFile, SetFilePointerEx, FILE_BEGIN, FILE_SHARE_READ, FILE_SHARE_WRITE,
        OPEN_EXISTING,
    };

    /// Rights tried in order, most permissive first. `GENERIC_READ` alone is
    /// requested first; on `SharingViolation` the reader retries with
    /// progressively narrower requested access, per spec §4.1.
    pub(super) const RIGHTS_LADDER: [u32; 2] = [0x8000_0000, 0x0000_0001]; // GENERIC_READ, FILE_READ_DATA

    pub(super) fn open_with_rights(vol_path: &str, rights: u32) -> windows::core::Result<HANDLE> {
        let wide: Vec<u16> = vol_path.encode_utf16().chain(std::iter::once(0)).collect();
        unsafe {
            CreateFileW(
                PCWSTR(wide.as_ptr()),
                rights,
                FILE_SHARE_READ | FILE_SHARE_WRITE,
                None,
                OPEN_EXISTING,
                Default::default(),
                None,
            )
        }
    }

    pub(super) fn read_at_offset(handle: HANDLE, offset: u64, len: u32) -> windows::core::Result<Vec<u8>> {
        unsafe {
            SetFilePointerEx(handle, offset as i64, None, FILE_BEGIN)?;
        }
        let mut buf = vec![0u8; len as usize];
        let mut read: u32 = 0;
        unsafe {
            ReadFile(handle, Some(&mut buf), Some(&mut read), None)?;
        }
        buf.truncate(read as usize);
        Ok(buf)
    }

    pub(super) fn close(handle: HANDLE) {
        unsafe {
            let _ = CloseHandle(handle);
        }
    }
}

/// Opens a live, mounted NTFS volume by drive letter (e.g. `C`).
pub struct MountedVolumeReader {
    drive_letter: char,
    geometry: VolumeGeometry,
    volume_len: u64,
    #[cfg(windows)]
    handle: windows::Win32::Foundation::HANDLE,
}

impl fmt::Debug for MountedVolumeReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountedVolumeReader")
            .field("drive_letter", &self.drive_letter)
            .field("geometry", &self.geometry)
            .finish()
    }
}

impl MountedVolumeReader {
    /// Open `\\.\<drive_letter>:`, trying progressively narrower access
    /// rights on `SharingViolation` before giving up.
    #[cfg(windows)]
    pub fn open(drive_letter: char) -> Result<Self> {
        let vol_path = format!("\\\\.\\{}:", drive_letter);
        let mut last_err = None;
        let mut handle = None;
        for rights in imp::RIGHTS_LADDER {
            match imp::open_with_rights(&vol_path, rights) {
                Ok(h) => {
                    handle = Some(h);
                    break;
                }
                Err(e) => last_err = Some(e),
            }
        }
        let handle = handle.ok_or_else(|| OrcError::AccessDenied {
            path: vol_path.clone().into(),
        })?;
        let _ = last_err;

        let boot = imp::read_at_offset(handle, 0, 512).map_err(|e| OrcError::Io {
            path: vol_path.clone().into(),
            source: std::io::Error::other(e.to_string()),
        })?;
        let geometry = boot_sector::parse_boot_sector(&boot)?;

        // A mounted NTFS volume's length is not directly exposed here; the
        // engine only ever needs to address up to the end of the MFT plus
        // whatever attribute data callers request, so we report geometry's
        // cluster_count * bytes_per_cluster as the addressable bound.
        let volume_len = geometry.cluster_count * geometry.bytes_per_cluster() as u64;

        Ok(Self {
            drive_letter,
            geometry,
            volume_len,
            handle,
        })
    }
}

#[cfg(windows)]
impl Drop for MountedVolumeReader {
    fn drop(&mut self) {
        imp::close(self.handle);
    }
}

#[cfg(windows)]
impl VolumeReader for MountedVolumeReader {
    fn read_at(&self, byte_offset: u64, len: u64) -> Result<Vec<u8>> {
        check_bounds(byte_offset, len, self.volume_len)?;
        let vol_path = format!("\\\\.\\{}:", self.drive_letter);
        imp::read_at_offset(self.handle, byte_offset, len as u32).map_err(|e| OrcError::Io {
            path: vol_path.into(),
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
        VolumeKind::Mounted
    }

    fn snapshot_id(&self) -> Option<Uuid> {
        None
    }
}
