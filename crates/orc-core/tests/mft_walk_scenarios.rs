//! End-to-end walk scenarios against small hand-built NTFS-shaped MFTs,
//! mirroring the two MFT scenarios above the unit-test level: a clean
//! single-file volume, and the same volume after the file is deleted and
//! walked again in best-effort resurrection mode.
use orc_core::mft::{MftStore, MftWalker, PathResolver, ResurrectMode, WalkSink};
use orc_core::mft::{AttributeEntry, FileNameAttribute, MftRecord};
use orc_core::volume::{FsKind, VolumeKind, VolumeReader};
use std::sync::Arc;

const RECORD_SIZE: usize = 1024;

#[derive(Debug)]
struct FakeVolume {
    data: Vec<u8>,
}

impl VolumeReader for FakeVolume {
    fn read_at(&self, byte_offset: u64, len: u64) -> orc_core::error::Result<Vec<u8>> {
        let start = byte_offset as usize;
        let end = start + len as usize;
        Ok(self.data[start..end].to_vec())
    }
    fn len(&self) -> u64 {
        self.data.len() as u64
    }
    fn serial(&self) -> u64 {
        0xF00D
    }
    fn fs_type(&self) -> FsKind {
        FsKind::Ntfs
    }
    fn bytes_per_cluster(&self) -> u32 {
        1024 * 1024 // 1 MiB clusters, per scenario 1
    }
    fn mft_start_lcn(&self) -> u64 {
        0
    }
    fn record_size(&self) -> u32 {
        RECORD_SIZE as u32
    }
    fn kind(&self) -> VolumeKind {
        VolumeKind::Image
    }
}

fn fixup_record(mut b: Vec<u8>) -> Vec<u8> {
    let usa_offset = 48usize;
    let n_subsectors = (b.len() / 512).max(1);
    let usa_count = (n_subsectors + 1) as u16;
    b[6..8].copy_from_slice(&usa_count.to_le_bytes());
    let stamp: u16 = 0xABCD;
    b[usa_offset..usa_offset + 2].copy_from_slice(&stamp.to_le_bytes());
    for i in 0..n_subsectors {
        let tail = (i + 1) * 512 - 2;
        let real = [0x11u8, 0x22u8];
        let repl_off = usa_offset + 2 + i * 2;
        b[repl_off..repl_off + 2].copy_from_slice(&real);
        b[tail..tail + 2].copy_from_slice(&stamp.to_le_bytes());
    }
    b
}

/// An empty in-use (or deleted) record with no attributes — used for the
/// filler segments below the root.
fn empty_record(segment: u64, in_use: bool) -> Vec<u8> {
    let mut b = vec![0u8; RECORD_SIZE];
    b[0..4].copy_from_slice(b"FILE");
    b[4..6].copy_from_slice(&48u16.to_le_bytes());
    b[16..18].copy_from_slice(&(segment as u16).to_le_bytes());
    b[20..22].copy_from_slice(&56u16.to_le_bytes());
    let flags: u16 = if in_use { 0x0001 } else { 0 };
    b[22..24].copy_from_slice(&flags.to_le_bytes());
    b[24..28].copy_from_slice(&(RECORD_SIZE as u32).to_le_bytes());
    b[28..32].copy_from_slice(&(RECORD_SIZE as u32).to_le_bytes());
    b[56..60].copy_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
    fixup_record(b)
}

fn resident_attribute(type_code: u32, body: &[u8]) -> Vec<u8> {
    let content_offset = 24u16;
    let content_size = body.len() as u32;
    let attr_len = content_offset as u32 + content_size;
    let mut out = vec![0u8; attr_len as usize];
    out[0..4].copy_from_slice(&type_code.to_le_bytes());
    out[4..8].copy_from_slice(&attr_len.to_le_bytes());
    out[8] = 0; // resident
    out[9] = 0; // unnamed
    out[16..20].copy_from_slice(&content_size.to_le_bytes());
    out[20..22].copy_from_slice(&content_offset.to_le_bytes());
    out[content_offset as usize..].copy_from_slice(body);
    out
}

fn file_name_body(parent: u64, name: &str) -> Vec<u8> {
    let name_utf16: Vec<u8> = name.encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
    let mut body = vec![0u8; 66 + name_utf16.len()];
    body[0..8].copy_from_slice(&parent.to_le_bytes());
    body[64] = (name_utf16.len() / 2) as u8;
    body[65] = 1; // Win32 namespace
    body[66..].copy_from_slice(&name_utf16);
    body
}

/// The root directory record (segment 5): in-use, directory flag set, no
/// attributes of interest for this walk.
fn root_record() -> Vec<u8> {
    let mut b = vec![0u8; RECORD_SIZE];
    b[0..4].copy_from_slice(b"FILE");
    b[4..6].copy_from_slice(&48u16.to_le_bytes());
    b[16..18].copy_from_slice(&0u16.to_le_bytes());
    b[20..22].copy_from_slice(&56u16.to_le_bytes());
    b[22..24].copy_from_slice(&0x0003u16.to_le_bytes()); // in-use | directory
    b[24..28].copy_from_slice(&(RECORD_SIZE as u32).to_le_bytes());
    b[28..32].copy_from_slice(&(RECORD_SIZE as u32).to_le_bytes());
    b[56..60].copy_from_slice(&0xFFFF_FFFFu32.to_le_bytes());
    fixup_record(b)
}

/// `\A.txt`, FRN 6, parented at the root, carrying a 3-byte unnamed `$DATA`.
fn a_txt_record(in_use: bool) -> Vec<u8> {
    let file_name_attr = resident_attribute(0x30, &file_name_body(5, "A.txt"));
    let data_attr = resident_attribute(0x80, b"abc");

    let mut attrs = Vec::new();
    attrs.extend(file_name_attr);
    attrs.extend(data_attr);
    attrs.extend(0xFFFF_FFFFu32.to_le_bytes());

    let mut b = vec![0u8; RECORD_SIZE];
    b[0..4].copy_from_slice(b"FILE");
    b[4..6].copy_from_slice(&48u16.to_le_bytes());
    b[16..18].copy_from_slice(&0u16.to_le_bytes());
    b[20..22].copy_from_slice(&56u16.to_le_bytes());
    let flags: u16 = if in_use { 0x0001 } else { 0 };
    b[22..24].copy_from_slice(&flags.to_le_bytes());
    b[24..28].copy_from_slice(&(RECORD_SIZE as u32).to_le_bytes());
    b[28..32].copy_from_slice(&(RECORD_SIZE as u32).to_le_bytes());
    b[56..56 + attrs.len()].copy_from_slice(&attrs);
    fixup_record(b)
}

#[derive(Default)]
struct RecordingSink {
    elements: Vec<u64>,
    file_names: Vec<(u64, String, String)>,
    file_name_and_data: Vec<(u64, u64)>,
    i30_entries: Vec<(u64, String, bool)>,
    security_descriptors: Vec<(u64, u32)>,
}

impl WalkSink for RecordingSink {
    fn on_element(&mut self, record: &MftRecord) {
        self.elements.push(record.frn.segment());
    }

    fn on_file_name(&mut self, record: &MftRecord, file_name: &FileNameAttribute, path: &str) {
        self.file_names
            .push((record.frn.segment(), file_name.name.to_string(), path.to_string()));
    }

    fn on_file_name_and_data(&mut self, record: &MftRecord, _file_name: &FileNameAttribute, data_attr: &AttributeEntry) {
        let len = match &data_attr.form {
            orc_core::mft::AttributeForm::Resident(bytes) => bytes.len() as u64,
            orc_core::mft::AttributeForm::NonResident { real_size, .. } => *real_size,
        };
        self.file_name_and_data.push((record.frn.segment(), len));
    }

    fn on_i30_entry(&mut self, record: &MftRecord, file_name: &FileNameAttribute, is_carved: bool) {
        self.i30_entries
            .push((record.frn.segment(), file_name.name.to_string(), is_carved));
    }

    fn on_security_descriptor(&mut self, record: &MftRecord, sec_id: u32) {
        self.security_descriptors.push((record.frn.segment(), sec_id));
    }
}

fn standard_information_body(security_id: u32) -> Vec<u8> {
    let mut body = vec![0u8; 56];
    body[52..56].copy_from_slice(&security_id.to_le_bytes());
    body
}

/// A resident `$INDEX_ROOT` body for the `$I30` filename index, holding one
/// real entry (embedding `key_body`, e.g. a `$FILE_NAME`) followed by the
/// node's last-entry marker.
fn index_root_body(key_body: &[u8]) -> Vec<u8> {
    const ENTRY_HEADER_LEN: usize = 16;
    let entry_len = ENTRY_HEADER_LEN + key_body.len();
    let last_entry_len = ENTRY_HEADER_LEN;
    let entries_len = entry_len + last_entry_len;
    let index_length = ENTRY_HEADER_LEN + entries_len; // header + entries

    let mut body = vec![0u8; 16 + 16 + entries_len];
    body[0..4].copy_from_slice(&0x30u32.to_le_bytes()); // indexed attribute: $FILE_NAME
    body[12] = 1; // clusters_per_index_record

    // INDEX_HEADER at offset 16.
    body[16..20].copy_from_slice(&16u32.to_le_bytes()); // entries_offset (from start of header)
    body[20..24].copy_from_slice(&(index_length as u32).to_le_bytes());
    body[24..28].copy_from_slice(&(index_length as u32).to_le_bytes()); // allocated_size

    let mut pos = 32usize;
    body[pos..pos + 8].copy_from_slice(&7u64.to_le_bytes()); // file_reference
    body[pos + 8..pos + 10].copy_from_slice(&(entry_len as u16).to_le_bytes());
    body[pos + 10..pos + 12].copy_from_slice(&(key_body.len() as u16).to_le_bytes());
    body[pos + 12..pos + 14].copy_from_slice(&0u16.to_le_bytes()); // flags: not last
    body[pos + ENTRY_HEADER_LEN..pos + ENTRY_HEADER_LEN + key_body.len()].copy_from_slice(key_body);
    pos += entry_len;

    body[pos + 8..pos + 10].copy_from_slice(&(last_entry_len as u16).to_le_bytes());
    body[pos + 12..pos + 14].copy_from_slice(&0x0002u16.to_le_bytes()); // flags: LAST

    body
}

/// An in-use directory record (segment 5, self-parented) carrying
/// `$STANDARD_INFORMATION`, its own `$FILE_NAME`, and a resident
/// `$INDEX_ROOT` describing one child, `Child.txt`.
fn directory_record_with_index() -> Vec<u8> {
    let si_attr = resident_attribute(0x10, &standard_information_body(777));
    let file_name_attr = resident_attribute(0x30, &file_name_body(5, "Dir"));
    let index_root_attr = resident_attribute(0x90, &index_root_body(&file_name_body(5, "Child.txt")));

    let mut attrs = Vec::new();
    attrs.extend(si_attr);
    attrs.extend(file_name_attr);
    attrs.extend(index_root_attr);
    attrs.extend(0xFFFF_FFFFu32.to_le_bytes());

    let mut b = vec![0u8; RECORD_SIZE];
    b[0..4].copy_from_slice(b"FILE");
    b[4..6].copy_from_slice(&48u16.to_le_bytes());
    b[16..18].copy_from_slice(&5u16.to_le_bytes());
    b[20..22].copy_from_slice(&56u16.to_le_bytes());
    b[22..24].copy_from_slice(&0x0003u16.to_le_bytes()); // in-use | directory
    b[24..28].copy_from_slice(&(RECORD_SIZE as u32).to_le_bytes());
    b[28..32].copy_from_slice(&(RECORD_SIZE as u32).to_le_bytes());
    b[56..56 + attrs.len()].copy_from_slice(&attrs);
    fixup_record(b)
}

fn build_volume(a_txt_in_use: bool) -> (MftStore, u64) {
    let mut data = Vec::new();
    for segment in 0..5u64 {
        data.extend(empty_record(segment, false));
    }
    data.extend(root_record());
    data.extend(a_txt_record(a_txt_in_use));
    let total_records = (data.len() / RECORD_SIZE) as u64;

    let volume: Arc<dyn VolumeReader> = Arc::new(FakeVolume { data });
    (MftStore::new(volume), total_records)
}

#[test]
fn walks_blank_volume_single_file() {
    let (store, total_records) = build_volume(true);
    let mut resolver = PathResolver::new("Volume{0}");
    let mut walker = MftWalker::new(&store, &mut resolver, ResurrectMode::NoDeleted);
    let mut sink = RecordingSink::default();
    let summary = walker.walk(total_records, &mut sink);

    assert!(summary.fatal_error.is_none());
    assert_eq!(summary.records_processed, 2); // root + A.txt
    assert!(sink.elements.contains(&5));
    assert!(sink.elements.contains(&6));

    let (_, name, path) = sink
        .file_names
        .iter()
        .find(|(seg, _, _)| *seg == 6)
        .expect("A.txt file-name callback");
    assert_eq!(name, "A.txt");
    assert_eq!(path, "\\\\.\\Volume{0}\\A.txt");

    let (_, len) = sink
        .file_name_and_data
        .iter()
        .find(|(seg, _)| *seg == 6)
        .expect("A.txt data callback");
    assert_eq!(*len, 3);
}

#[test]
fn resurrects_deleted_file_in_best_effort_mode() {
    let (store, total_records) = build_volume(false);
    let mut resolver = PathResolver::new("Volume{0}");

    // First walk, no-deleted: the deleted A.txt record is invisible.
    {
        let mut walker = MftWalker::new(&store, &mut resolver, ResurrectMode::NoDeleted);
        let mut sink = RecordingSink::default();
        let summary = walker.walk(total_records, &mut sink);
        assert_eq!(summary.records_processed, 1); // root only
        assert!(!sink.elements.contains(&6));
    }

    // Second walk, best-effort: the deleted record resurfaces with its
    // previous path still resolvable (root was indexed by the first walk).
    let mut walker = MftWalker::new(&store, &mut resolver, ResurrectMode::BestEffort);
    let mut sink = RecordingSink::default();
    let summary = walker.walk(total_records, &mut sink);

    assert_eq!(summary.records_processed, 2);
    let (_, name, path) = sink
        .file_names
        .iter()
        .find(|(seg, _, _)| *seg == 6)
        .expect("resurrected A.txt file-name callback");
    assert_eq!(name, "A.txt");
    assert_eq!(path, "\\\\.\\Volume{0}\\A.txt");
}

#[test]
fn fires_i30_and_security_descriptor_callbacks_for_a_directory() {
    let mut data = Vec::new();
    for segment in 0..5u64 {
        data.extend(empty_record(segment, false));
    }
    data.extend(directory_record_with_index());
    let total_records = (data.len() / RECORD_SIZE) as u64;

    let volume: Arc<dyn VolumeReader> = Arc::new(FakeVolume { data });
    let store = MftStore::new(volume);
    let mut resolver = PathResolver::new("Volume{0}");
    let mut walker = MftWalker::new(&store, &mut resolver, ResurrectMode::NoDeleted);
    let mut sink = RecordingSink::default();
    let summary = walker.walk(total_records, &mut sink);

    assert!(summary.fatal_error.is_none());
    assert_eq!(
        sink.i30_entries,
        vec![(5, "Child.txt".to_string(), false)],
        "the one real index entry in $INDEX_ROOT should fire on_i30_entry, the last-entry marker should not"
    );
    assert_eq!(sink.security_descriptors, vec![(5, 777)]);
}
