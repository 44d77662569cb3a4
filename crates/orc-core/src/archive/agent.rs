/// A single-threaded cooperative agent draining a bounded channel of
/// archive requests, per §4.7 and the concurrency model of §5 ("the
/// command agent and archive agent are cooperative agents — each runs on
/// its own thread... inside an agent, message handling is strictly
/// sequential").
use super::container::{CompressionLevel, ContainerFormat, ContainerMember, ContainerWriter, MemberSource};
use super::encryption::{encrypt_for_recipients, Recipient, ENCRYPTED_EXTENSION};
use super::hash::{hash_bytes, HashingWriter};
use crate::error::{OrcError, Result};
use crossbeam_channel::{Receiver, Sender};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub enum ArchiveRequest {
    Open {
        name: String,
        format: ContainerFormat,
        sink_path: PathBuf,
        compression_level: CompressionLevel,
    },
    AddFile {
        name_in_archive: String,
        host_path: PathBuf,
        delete_when_done: bool,
        hash: bool,
    },
    AddDirectory {
        name_in_archive: String,
        host_dir: PathBuf,
        glob: String,
    },
    AddStream {
        name_in_archive: String,
        bytes: Vec<u8>,
    },
    FlushQueue,
    Complete,
}

#[derive(Debug, Clone)]
pub enum ArchiveNotification {
    ArchiveStarted { final_name: String },
    FileAddition { name: String, size: u64 },
    DirectoryAddition { name: String, file_count: usize },
    StreamAddition { name: String, size: u64 },
    ArchiveComplete { total_size: u64, sha1: String },
    Error { reason: String },
}

pub struct ArchiveAgent {
    requests: Receiver<ArchiveRequest>,
    notifications: Sender<ArchiveNotification>,
    recipients: Vec<Recipient>,
}

impl ArchiveAgent {
    pub fn new(
        requests: Receiver<ArchiveRequest>,
        notifications: Sender<ArchiveNotification>,
        recipients: Vec<Recipient>,
    ) -> Self {
        Self {
            requests,
            notifications,
            recipients,
        }
    }

    /// Drains requests in arrival order until `Complete`, or the channel
    /// closes. `AddDirectory` expands to file additions in lexicographic,
    /// locale-insensitive order, as required by §4.7.
    pub fn run(mut self) {
        let mut writer: Option<ContainerWriter<HashingWriter<File>>> = None;
        let mut sink_path = PathBuf::new();
        let mut format = ContainerFormat::Zip;
        let mut total_added = 0u64;
        let mut to_delete: Vec<PathBuf> = Vec::new();

        while let Ok(request) = self.requests.recv() {
            match request {
                ArchiveRequest::Open {
                    name,
                    format: fmt,
                    sink_path: path,
                    compression_level,
                } => {
                    format = fmt;
                    sink_path = path.clone();
                    match File::create(&path) {
                        Ok(file) => {
                            writer = Some(ContainerWriter::new(format, compression_level, HashingWriter::new(file)));
                            let _ = self
                                .notifications
                                .send(ArchiveNotification::ArchiveStarted { final_name: name });
                        }
                        Err(e) => {
                            let _ = self.notifications.send(ArchiveNotification::Error {
                                reason: format!("failed to create archive at {}: {e}", path.display()),
                            });
                        }
                    }
                }

                ArchiveRequest::AddFile {
                    name_in_archive,
                    host_path,
                    delete_when_done,
                    hash: _hash,
                } => {
                    if let Some(w) = writer.as_mut() {
                        match w.add_member(ContainerMember {
                            name_in_archive: name_in_archive.clone(),
                            source: MemberSource::HostFile(host_path.clone()),
                        }) {
                            Ok(size) => {
                                total_added += size;
                                if delete_when_done {
                                    to_delete.push(host_path);
                                }
                                let _ = self.notifications.send(ArchiveNotification::FileAddition {
                                    name: name_in_archive,
                                    size,
                                });
                            }
                            Err(e) => {
                                let _ = self
                                    .notifications
                                    .send(ArchiveNotification::Error { reason: e.to_string() });
                            }
                        }
                    }
                }

                ArchiveRequest::AddDirectory {
                    name_in_archive,
                    host_dir,
                    glob,
                } => {
                    let files = expand_directory(&host_dir, &glob);
                    let mut count = 0usize;
                    if let Some(w) = writer.as_mut() {
                        for file in &files {
                            let rel = file.strip_prefix(&host_dir).unwrap_or(file);
                            let member_name = format!("{name_in_archive}/{}", rel.display());
                            if w.add_member(ContainerMember {
                                name_in_archive: member_name,
                                source: MemberSource::HostFile(file.clone()),
                            })
                            .is_ok()
                            {
                                count += 1;
                            }
                        }
                    }
                    let _ = self.notifications.send(ArchiveNotification::DirectoryAddition {
                        name: name_in_archive,
                        file_count: count,
                    });
                }

                ArchiveRequest::AddStream { name_in_archive, bytes } => {
                    let size = bytes.len() as u64;
                    if let Some(w) = writer.as_mut() {
                        if w.add_member(ContainerMember {
                            name_in_archive: name_in_archive.clone(),
                            source: MemberSource::Bytes(bytes),
                        })
                        .is_ok()
                        {
                            total_added += size;
                        }
                    }
                    let _ = self
                        .notifications
                        .send(ArchiveNotification::StreamAddition { name: name_in_archive, size });
                }

                ArchiveRequest::FlushQueue => {
                    // Container writers in this implementation are
                    // unbuffered past the OS page cache; nothing to drain
                    // explicitly here, but the request is acknowledged so
                    // callers can synchronize before `Complete`.
                }

                ArchiveRequest::Complete => {
                    if let Some(w) = writer.take() {
                        match self.finalize(w, &sink_path) {
                            Ok((total_size, sha1)) => {
                                let _ = self
                                    .notifications
                                    .send(ArchiveNotification::ArchiveComplete { total_size, sha1 });
                            }
                            Err(e) => {
                                let _ = self
                                    .notifications
                                    .send(ArchiveNotification::Error { reason: e.to_string() });
                            }
                        }
                    }
                    for path in to_delete.drain(..) {
                        if let Err(e) = std::fs::remove_file(&path) {
                            warn!(path = %path.display(), error = %e, "failed to delete source after archival");
                        }
                    }
                    info!(bytes = total_added, "archive agent completed");
                    break;
                }
            }
        }
    }

    fn finalize(&self, writer: ContainerWriter<HashingWriter<File>>, sink_path: &Path) -> Result<(u64, String)> {
        let hashing = writer.finish()?;
        let (_, plaintext_sha1) = hashing.finish();

        if !self.recipients.is_empty() {
            let plaintext = std::fs::read(sink_path).map_err(|e| OrcError::Io {
                path: sink_path.to_path_buf(),
                source: e,
            })?;
            let enveloped = encrypt_for_recipients(&plaintext, &self.recipients)?;
            let encrypted_path = sink_path.with_extension(ENCRYPTED_EXTENSION);
            std::fs::write(&encrypted_path, &enveloped).map_err(|e| OrcError::Io {
                path: encrypted_path.clone(),
                source: e,
            })?;
            // §4.7/§8: `ArchiveComplete`'s SHA-1 is of the produced
            // container — for an encrypted archive that's the `.p7b`
            // ciphertext, not the pre-encryption plaintext hashed above.
            let encrypted_size = enveloped.len() as u64;
            let encrypted_sha1 = hash_bytes(&enveloped);
            return Ok((encrypted_size, encrypted_sha1));
        }

        let total_size = std::fs::metadata(sink_path)
            .map_err(|e| OrcError::Io { path: sink_path.to_path_buf(), source: e })?
            .len();
        Ok((total_size, plaintext_sha1))
    }
}

/// Enumerate files under `dir` in lexicographic, locale-insensitive order,
/// filtered by a simple glob suffix match (the only pattern shape the
/// archive agent needs — full glob semantics are out of scope).
fn expand_directory(dir: &Path, glob: &str) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let Ok(read_dir) = std::fs::read_dir(dir) else {
        return out;
    };
    for entry in read_dir.flatten() {
        let path = entry.path();
        if path.is_file() && matches_glob(&path, glob) {
            out.push(path);
        } else if path.is_dir() {
            out.extend(expand_directory(&path, glob));
        }
    }
    out.sort();
    out
}

fn matches_glob(path: &Path, glob: &str) -> bool {
    if glob == "*" || glob.is_empty() {
        return true;
    }
    if let Some(suffix) = glob.strip_prefix('*') {
        return path.to_string_lossy().ends_with(suffix);
    }
    path.file_name().map(|n| n == glob).unwrap_or(false)
}
