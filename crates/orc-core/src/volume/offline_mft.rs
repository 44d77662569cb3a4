/// The **Offline MFT** volume reader variant: the "volume" is a single file
/// holding a serialized MFT (its first record begins with the ASCII stamp
/// `"FILE"`, per the location grammar in spec §6). There is no real boot
/// sector to parse, so geometry is synthesized from a fixed-policy default
/// record size.
use super::{check_bounds, FsKind, VolumeGeometry, VolumeKind, VolumeReader};
use crate::error::{OrcError, Result};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Default record size assumed for offline MFT dumps when no boot sector is
/// available to report one (matches the common NTFS default).
pub const DEFAULT_RECORD_SIZE: u32 = 1024;
/// Default cluster size assumed for the same reason.
pub const DEFAULT_BYTES_PER_CLUSTER: u32 = 4096;

pub struct OfflineMftReader {
    file: Mutex<File>,
    path: PathBuf,
    len: u64,
}

impl std::fmt::Debug for OfflineMftReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineMftReader")
            .field("path", &self.path)
            .field("len", &self.len)
            .finish()
    }
}

impl OfflineMftReader {
    /// Open `path` as an offline MFT dump. Validates the `"FILE"` stamp of
    /// the first record per the location grammar, failing with
    /// [`OrcError::Config`] if absent.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path).map_err(|e| OrcError::Io {
            path: path.clone(),
            source: e,
        })?;

        let mut stamp = [0u8; 4];
        file.read_exact(&mut stamp).map_err(|e| OrcError::Io {
            path: path.clone(),
            source: e,
        })?;
        if &stamp != b"FILE" {
            return Err(OrcError::Config {
                reason: format!("{}: does not begin with the \"FILE\" record stamp", path.display()),
            });
        }

        let len = file
            .metadata()
            .map_err(|e| OrcError::Io {
                path: path.clone(),
                source: e,
            })?
            .len();

        Ok(Self {
            file: Mutex::new(file),
            path,
            len,
        })
    }

    pub fn geometry(&self) -> VolumeGeometry {
        VolumeGeometry {
            fs_kind: FsKind::Ntfs,
            bytes_per_sector: 512,
            sectors_per_cluster: DEFAULT_BYTES_PER_CLUSTER / 512,
            cluster_count: self.len / DEFAULT_BYTES_PER_CLUSTER as u64,
            mft_start_lcn: 0,
            mft_record_size: DEFAULT_RECORD_SIZE,
            serial: 0,
        }
    }
}

impl VolumeReader for OfflineMftReader {
    fn read_at(&self, byte_offset: u64, len: u64) -> Result<Vec<u8>> {
        check_bounds(byte_offset, len, self.len)?;
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(byte_offset)).map_err(|e| OrcError::Io {
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
        self.len
    }

    fn serial(&self) -> u64 {
        0
    }

    fn fs_type(&self) -> FsKind {
        FsKind::Ntfs
    }

    fn bytes_per_cluster(&self) -> u32 {
        DEFAULT_BYTES_PER_CLUSTER
    }

    fn mft_start_lcn(&self) -> u64 {
        0
    }

    fn record_size(&self) -> u32 {
        DEFAULT_RECORD_SIZE
    }

    fn kind(&self) -> VolumeKind {
        VolumeKind::OfflineMft
    }

    fn snapshot_id(&self) -> Option<Uuid> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn opens_valid_offline_dump() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        let mut data = vec![0u8; 1024 * 4];
        data[0..4].copy_from_slice(b"FILE");
        f.write_all(&data).unwrap();
        f.flush().unwrap();

        let reader = OfflineMftReader::open(f.path()).unwrap();
        assert_eq!(reader.kind(), VolumeKind::OfflineMft);
        assert_eq!(reader.record_size(), DEFAULT_RECORD_SIZE);
        assert_eq!(reader.len(), 4096);
    }

    #[test]
    fn rejects_missing_stamp() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&[0u8; 16]).unwrap();
        f.flush().unwrap();
        let err = OfflineMftReader::open(f.path()).unwrap_err();
        assert!(matches!(err, OrcError::Config { .. }));
    }
}
