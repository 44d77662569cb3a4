/// Caches decoded records read from a [`VolumeReader`], verifying fix-up
/// stamps on read-through and keeping two bounded attribute-reassembly
/// caches for `$ATTRIBUTE_LIST` chasing (§4.2).
use super::attribute::{AttributeAssembler, LogicalAttributes};
use super::frn::Frn;
use super::record::MftRecord;
use crate::error::Result;
use crate::volume::VolumeReader;
use compact_str::CompactString;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

const DEFAULT_RECORD_CACHE_SIZE: usize = 4096;
const DEFAULT_ATTRIBUTE_CACHE_SIZE: usize = 1024;

/// Key for the cross-record `$ATTRIBUTE_LIST` continuation cache —
/// `(TypeCode, NameHash, Instance)` per §4.2.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct AttributeCacheKey {
    type_code: u32,
    name_hash: u64,
    instance: u16,
}

fn hash_name(name: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    name.hash(&mut hasher);
    hasher.finish()
}

pub struct MftStore {
    volume: Arc<dyn VolumeReader>,
    // Keyed by segment number only — sequence mismatches are surfaced to
    // the caller rather than silently treated as cache misses.
    records: Mutex<LruCache<u64, MftRecord>>,
    attributes: Mutex<LruCache<u64, LogicalAttributes>>,
    #[allow(dead_code)]
    attribute_list_cache: Mutex<LruCache<AttributeCacheKey, Frn>>,
}

impl MftStore {
    pub fn new(volume: Arc<dyn VolumeReader>) -> Self {
        Self::with_capacity(
            volume,
            DEFAULT_RECORD_CACHE_SIZE,
            DEFAULT_ATTRIBUTE_CACHE_SIZE,
        )
    }

    pub fn with_capacity(volume: Arc<dyn VolumeReader>, record_cap: usize, attribute_cap: usize) -> Self {
        let record_cap = NonZeroUsize::new(record_cap).unwrap_or(NonZeroUsize::new(1).unwrap());
        let attribute_cap = NonZeroUsize::new(attribute_cap).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            volume,
            records: Mutex::new(LruCache::new(record_cap)),
            attributes: Mutex::new(LruCache::new(attribute_cap)),
            attribute_list_cache: Mutex::new(LruCache::new(attribute_cap)),
        }
    }

    /// Read and fix-up-verify the record at `segment`, from cache if present.
    pub fn record(&self, segment: u64) -> Result<MftRecord> {
        if let Some(rec) = self.records.lock().get(&segment) {
            return Ok(rec.clone());
        }
        let record_size = self.volume.record_size() as u64;
        let mft_offset = self.volume.mft_start_lcn() * self.volume.bytes_per_cluster() as u64;
        let byte_offset = mft_offset + segment * record_size;
        let raw = self.volume.read_at(byte_offset, record_size)?;
        let rec = MftRecord::parse(segment, &raw)?;
        self.records.lock().put(segment, rec.clone());
        Ok(rec)
    }

    /// Assemble (and cache) the logical attribute view for `frn`'s base
    /// record, fetching any `$ATTRIBUTE_LIST` continuations through `self`.
    pub fn attributes(&self, frn: Frn) -> Result<LogicalAttributes> {
        let segment = frn.segment();
        if let Some(attrs) = self.attributes.lock().get(&segment) {
            return Ok(attrs.clone());
        }
        let base = self.record(segment)?;
        let assembled = AttributeAssembler::assemble(&base, |continuation_frn| {
            self.record(continuation_frn.segment())
        })?;
        self.attributes.lock().put(segment, assembled.clone());
        Ok(assembled)
    }

    pub fn volume(&self) -> &Arc<dyn VolumeReader> {
        &self.volume
    }

    #[allow(dead_code)]
    fn cache_key(type_code: u32, name: &str, instance: u16) -> AttributeCacheKey {
        AttributeCacheKey {
            type_code,
            name_hash: hash_name(name),
            instance,
        }
    }
}

/// Convenience used by the path resolver and walker for compact-string
/// comparisons without re-allocating — kept near the store since both
/// consume its output.
pub fn compact(s: &str) -> CompactString {
    CompactString::new(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::{FsKind, VolumeKind};
    use std::sync::Arc;

    #[derive(Debug)]
    struct FakeVolume {
        data: Vec<u8>,
        record_size: u32,
    }

    impl VolumeReader for FakeVolume {
        fn read_at(&self, byte_offset: u64, len: u64) -> Result<Vec<u8>> {
            let start = byte_offset as usize;
            let end = start + len as usize;
            Ok(self.data[start..end].to_vec())
        }
        fn len(&self) -> u64 {
            self.data.len() as u64
        }
        fn serial(&self) -> u64 {
            1
        }
        fn fs_type(&self) -> FsKind {
            FsKind::Ntfs
        }
        fn bytes_per_cluster(&self) -> u32 {
            4096
        }
        fn mft_start_lcn(&self) -> u64 {
            0
        }
        fn record_size(&self) -> u32 {
            self.record_size
        }
        fn kind(&self) -> VolumeKind {
            VolumeKind::OfflineMft
        }
    }

    fn minimal_record(segment_index: u64, record_size: usize) -> Vec<u8> {
        let mut b = vec![0u8; record_size];
        b[0..4].copy_from_slice(b"FILE");
        let usa_offset = 48u16;
        let n_subsectors = (record_size / 512).max(1) as u16;
        let usa_count = n_subsectors + 1;
        b[4..6].copy_from_slice(&usa_offset.to_le_bytes());
        b[6..8].copy_from_slice(&usa_count.to_le_bytes());
        b[16..18].copy_from_slice(&(segment_index as u16).to_le_bytes());
        b[20..22].copy_from_slice(&56u16.to_le_bytes());
        b[22..24].copy_from_slice(&1u16.to_le_bytes()); // in-use
        b[24..28].copy_from_slice(&(record_size as u32).to_le_bytes());
        b[28..32].copy_from_slice(&(record_size as u32).to_le_bytes());
        b[56..60].copy_from_slice(&0xFFFF_FFFFu32.to_le_bytes()); // no attributes
        let stamp: u16 = 0x5151;
        b[usa_offset as usize..usa_offset as usize + 2].copy_from_slice(&stamp.to_le_bytes());
        for i in 0..n_subsectors as usize {
            let tail = (i + 1) * 512 - 2;
            b[tail..tail + 2].copy_from_slice(&stamp.to_le_bytes());
        }
        b
    }

    #[test]
    fn reads_and_caches_record() {
        let record_size = 1024usize;
        let data = minimal_record(0, record_size);
        let volume: Arc<dyn VolumeReader> = Arc::new(FakeVolume {
            data,
            record_size: record_size as u32,
        });
        let store = MftStore::new(volume);
        let rec1 = store.record(0).unwrap();
        let rec2 = store.record(0).unwrap();
        assert_eq!(rec1.frn.segment(), rec2.frn.segment());
        assert!(rec1.header.in_use());
    }
}
