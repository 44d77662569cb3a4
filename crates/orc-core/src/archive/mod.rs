pub mod agent;
pub mod container;
pub mod encryption;
pub mod hash;
pub mod tee;

pub use agent::{ArchiveAgent, ArchiveNotification, ArchiveRequest};
pub use container::{CompressionLevel, ContainerFormat, ContainerMember, ContainerWriter, MemberSource};
pub use encryption::{encrypt_for_recipients, Recipient, ENCRYPTED_EXTENSION};
pub use hash::{hash_bytes, hash_file, HashingWriter};
pub use tee::TeeWriter;
