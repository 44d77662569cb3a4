/// Output redirection for a spawned child: named-pipe plumbing on Windows,
/// draining into a [`super::spill_buffer::SpillBuffer`] per stream, per
/// §4.8 step 2. Grounded on the teacher's `std::process::Command` spawn
/// pattern in `scanner::mft`, generalized from a fire-and-forget call into
/// a tracked, drainable handle.
use super::spill_buffer::SpillBuffer;
use compact_str::CompactString;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RedirectionKind {
    StdOut,
    StdErr,
    StdOutErr,
    StdIn,
}

/// What happens to a redirection stream's captured bytes once the command
/// completes, per §4.8 step 5 ("forward redirection streams to the archive
/// with an OnComplete action chain").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OnComplete {
    ArchiveAndDelete,
    DeleteOnly,
}

pub struct Redirection {
    pub kind: RedirectionKind,
    pub pipe_name: CompactString,
    pub on_complete: OnComplete,
    buffer: SpillBuffer,
}

impl Redirection {
    pub fn new(kind: RedirectionKind, keyword: &str, on_complete: OnComplete) -> Self {
        let suffix = uuid::Uuid::new_v4();
        let pipe_name = CompactString::from(format!("\\\\.\\pipe\\orc-{keyword}-{suffix}"));
        Self {
            kind,
            pipe_name,
            on_complete,
            buffer: SpillBuffer::new(),
        }
    }

    /// Append a chunk drained from the pipe's I/O completion callback.
    pub fn drain_chunk(&mut self, data: &[u8], memory_cap_bytes: u64) -> crate::error::Result<()> {
        self.buffer.write(data, memory_cap_bytes)
    }

    pub fn bytes_captured(&self) -> u64 {
        self.buffer.len()
    }

    pub fn into_bytes(self) -> crate::error::Result<Vec<u8>> {
        self.buffer.into_bytes()
    }
}
