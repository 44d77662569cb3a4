/// A stream buffer backed first by memory, then by disk once a configured
/// cap is exceeded — used to drain redirected child-process output without
/// unbounded heap growth, per §4.8 step 2 ("bind an overlapped I/O
/// completion callback that drains into a temporary stream backed first by
/// memory (up to a cap) then by disk").
use crate::error::{OrcError, Result};
use std::io::{Seek, SeekFrom, Write};
use tempfile::NamedTempFile;

pub enum SpillBuffer {
    Memory(Vec<u8>),
    Disk { file: NamedTempFile, len: u64 },
}

impl SpillBuffer {
    pub fn new() -> Self {
        Self::Memory(Vec::new())
    }

    /// Append `data`, spilling to a temp file the moment the in-memory
    /// buffer would exceed `memory_cap_bytes`.
    pub fn write(&mut self, data: &[u8], memory_cap_bytes: u64) -> Result<()> {
        match self {
            Self::Memory(buf) => {
                if buf.len() as u64 + data.len() as u64 > memory_cap_bytes {
                    let mut file = NamedTempFile::new().map_err(|e| OrcError::Io {
                        path: std::env::temp_dir(),
                        source: e,
                    })?;
                    file.write_all(buf).map_err(|e| OrcError::Io {
                        path: file.path().to_path_buf(),
                        source: e,
                    })?;
                    file.write_all(data).map_err(|e| OrcError::Io {
                        path: file.path().to_path_buf(),
                        source: e,
                    })?;
                    let len = buf.len() as u64 + data.len() as u64;
                    *self = Self::Disk { file, len };
                } else {
                    buf.extend_from_slice(data);
                }
            }
            Self::Disk { file, len } => {
                file.write_all(data).map_err(|e| OrcError::Io {
                    path: file.path().to_path_buf(),
                    source: e,
                })?;
                *len += data.len() as u64;
            }
        }
        Ok(())
    }

    pub fn len(&self) -> u64 {
        match self {
            Self::Memory(buf) => buf.len() as u64,
            Self::Disk { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_spilled(&self) -> bool {
        matches!(self, Self::Disk { .. })
    }

    /// Read the whole contents back, regardless of which tier it landed in.
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            Self::Memory(buf) => Ok(buf),
            Self::Disk { mut file, len } => {
                file.as_file_mut()
                    .seek(SeekFrom::Start(0))
                    .map_err(|e| OrcError::Io { path: file.path().to_path_buf(), source: e })?;
                let mut buf = vec![0u8; len as usize];
                std::io::Read::read_exact(file.as_file_mut(), &mut buf).map_err(|e| OrcError::Io {
                    path: file.path().to_path_buf(),
                    source: e,
                })?;
                Ok(buf)
            }
        }
    }
}

impl Default for SpillBuffer {
    fn default() -> Self {
        Self::new()
    }
}
