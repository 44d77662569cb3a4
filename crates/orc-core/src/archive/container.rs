/// Container format selection and writing: uncompressed TAR, ZIP with
/// DEFLATE, or 7z with LZMA2, chosen by the archive's file extension,
/// per §6 "Archive container".
use crate::error::{OrcError, Result};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainerFormat {
    Tar,
    Zip,
    SevenZip,
}

impl ContainerFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("tar") => Ok(Self::Tar),
            Some("zip") => Ok(Self::Zip),
            Some("7z") => Ok(Self::SevenZip),
            other => Err(OrcError::Archive {
                reason: format!("unrecognized archive extension: {other:?}"),
            }),
        }
    }
}

/// `fast` / `normal` / `max` from §6, mapped per format when the writer is
/// built.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompressionLevel {
    Fast,
    Normal,
    Max,
}

impl CompressionLevel {
    pub fn parse(level: &str) -> Result<Self> {
        match level {
            "fast" => Ok(Self::Fast),
            "normal" => Ok(Self::Normal),
            "max" => Ok(Self::Max),
            other => Err(OrcError::Config {
                reason: format!("unknown compression level: {other}"),
            }),
        }
    }

    fn zip_deflate_level(self) -> i64 {
        match self {
            Self::Fast => 1,
            Self::Normal => 6,
            Self::Max => 9,
        }
    }
}

/// A single logical member added to a container: either file bytes read
/// from disk or an in-memory stream, paired with its in-archive name.
pub struct ContainerMember {
    pub name_in_archive: String,
    pub source: MemberSource,
}

pub enum MemberSource {
    HostFile(PathBuf),
    Bytes(Vec<u8>),
}

/// Writes members into `sink` in the chosen container format. Members must
/// already be ordered the way the caller wants them to appear (the archive
/// agent handles lexicographic directory ordering before calling this).
pub struct ContainerWriter<W: Write> {
    format: ContainerFormat,
    level: CompressionLevel,
    inner: ContainerInner<W>,
}

enum ContainerInner<W: Write> {
    Tar(tar::Builder<W>),
    Zip(zip::ZipWriter<W>),
    SevenZip {
        sink: Option<W>,
        entries: Vec<(String, Vec<u8>)>,
    },
}

impl<W: Write> ContainerWriter<W> {
    pub fn new(format: ContainerFormat, level: CompressionLevel, sink: W) -> Self {
        let inner = match format {
            ContainerFormat::Tar => ContainerInner::Tar(tar::Builder::new(sink)),
            ContainerFormat::Zip => ContainerInner::Zip(zip::ZipWriter::new(sink)),
            ContainerFormat::SevenZip => ContainerInner::SevenZip {
                sink: Some(sink),
                entries: Vec::new(),
            },
        };
        Self { format, level, inner }
    }

    pub fn add_member(&mut self, member: ContainerMember) -> Result<u64> {
        let bytes = match member.source {
            MemberSource::HostFile(path) => {
                let mut f = File::open(&path).map_err(|e| OrcError::Io {
                    path: path.clone(),
                    source: e,
                })?;
                let mut buf = Vec::new();
                f.read_to_end(&mut buf).map_err(|e| OrcError::Io { path, source: e })?;
                buf
            }
            MemberSource::Bytes(b) => b,
        };
        let size = bytes.len() as u64;

        match &mut self.inner {
            ContainerInner::Tar(builder) => {
                let mut header = tar::Header::new_gnu();
                header.set_size(size);
                header.set_mode(0o644);
                header.set_cksum();
                builder
                    .append_data(&mut header, &member.name_in_archive, bytes.as_slice())
                    .map_err(|e| OrcError::Archive { reason: e.to_string() })?;
            }
            ContainerInner::Zip(writer) => {
                let options: zip::write::FileOptions<()> = zip::write::FileOptions::default()
                    .compression_method(zip::CompressionMethod::Deflated)
                    .compression_level(Some(self.level.zip_deflate_level()));
                writer
                    .start_file(&member.name_in_archive, options)
                    .map_err(|e| OrcError::Archive { reason: e.to_string() })?;
                writer
                    .write_all(&bytes)
                    .map_err(|e| OrcError::Io { path: PathBuf::from(&member.name_in_archive), source: e })?;
            }
            ContainerInner::SevenZip { entries, .. } => {
                entries.push((member.name_in_archive, bytes));
            }
        }

        Ok(size)
    }

    /// Finalize the container, returning the sink.
    pub fn finish(self) -> Result<W> {
        match self.inner {
            ContainerInner::Tar(builder) => builder
                .into_inner()
                .map_err(|e| OrcError::Archive { reason: e.to_string() }),
            ContainerInner::Zip(writer) => writer
                .finish()
                .map_err(|e| OrcError::Archive { reason: e.to_string() }),
            ContainerInner::SevenZip { mut sink, entries } => {
                let sink = sink.take().expect("sink taken exactly once");
                write_sevenzip(sink, entries, self.level)
            }
        }
    }
}

fn write_sevenzip<W: Write>(mut sink: W, entries: Vec<(String, Vec<u8>)>, _level: CompressionLevel) -> Result<W> {
    // 7z writes a trailing header once the entries' compressed sizes are
    // known, which needs to seek back over the stream — `sink` (e.g. a
    // `HashingWriter<File>`) isn't seekable, so assemble into a real
    // temporary file first and copy the finished bytes into `sink`.
    let mut temp = tempfile::tempfile().map_err(|e| OrcError::Archive { reason: e.to_string() })?;
    {
        let mut writer = sevenz_rust::SevenZWriter::new(&mut temp)
            .map_err(|e| OrcError::Archive { reason: e.to_string() })?;
        for (name, bytes) in entries {
            writer
                .push_archive_entry(
                    sevenz_rust::SevenZArchiveEntry::from_path(Path::new(&name), name.clone()),
                    Some(std::io::Cursor::new(bytes)),
                )
                .map_err(|e| OrcError::Archive { reason: e.to_string() })?;
        }
        writer.finish().map_err(|e| OrcError::Archive { reason: e.to_string() })?;
    }

    temp.seek(SeekFrom::Start(0)).map_err(|e| OrcError::Archive { reason: e.to_string() })?;
    std::io::copy(&mut temp, &mut sink).map_err(|e| OrcError::Archive { reason: e.to_string() })?;
    Ok(sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn picks_format_from_extension() {
        assert_eq!(
            ContainerFormat::from_path(&PathBuf::from("out.tar")).unwrap(),
            ContainerFormat::Tar
        );
        assert_eq!(
            ContainerFormat::from_path(&PathBuf::from("out.zip")).unwrap(),
            ContainerFormat::Zip
        );
        assert_eq!(
            ContainerFormat::from_path(&PathBuf::from("out.7z")).unwrap(),
            ContainerFormat::SevenZip
        );
    }

    #[test]
    fn rejects_unknown_extension() {
        assert!(ContainerFormat::from_path(&PathBuf::from("out.rar")).is_err());
    }

    #[test]
    fn writes_sevenzip_member_through_a_non_seekable_sink() {
        // `Vec<u8>` is `Write` but not `Seek`, matching the real
        // `HashingWriter<File>` sink used by `ArchiveAgent`.
        let buf: Vec<u8> = Vec::new();
        let mut writer = ContainerWriter::new(ContainerFormat::SevenZip, CompressionLevel::Normal, buf);
        writer
            .add_member(ContainerMember {
                name_in_archive: "hello.txt".into(),
                source: MemberSource::Bytes(b"hi".to_vec()),
            })
            .unwrap();
        let out = writer.finish().unwrap();
        assert!(out.starts_with(&[b'7', b'z', 0xBC, 0xAF, 0x27, 0x1C]));
    }

    #[test]
    fn writes_uncompressed_tar_member() {
        let buf: Vec<u8> = Vec::new();
        let mut writer = ContainerWriter::new(ContainerFormat::Tar, CompressionLevel::Normal, buf);
        let size = writer
            .add_member(ContainerMember {
                name_in_archive: "hello.txt".into(),
                source: MemberSource::Bytes(b"hi".to_vec()),
            })
            .unwrap();
        assert_eq!(size, 2);
        let out = writer.finish().unwrap();
        assert!(!out.is_empty());
    }
}
