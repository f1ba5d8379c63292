use thiserror::Error;

use crate::snapshot::{HeapId, Id};

/// Buffer geometry or encoding that does not match what the snapshot
/// layout says should be there.
///
/// These are local to the decode that hit them: the owning class or
/// instance is skipped, the rest of the snapshot stays usable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedDump {
    #[error("read of {needed} bytes at offset {offset} overruns a dump buffer of {len} bytes")]
    BufferOverrun {
        offset: usize,
        needed: usize,
        len: usize,
    },
    #[error("unknown basic type tag {tag} at offset {offset}")]
    UnknownTypeTag { tag: u8, offset: usize },
    #[error("class 0x{class_id:x} records {recorded} static fields but declares {declared}")]
    StaticFieldCount {
        class_id: Id,
        recorded: usize,
        declared: usize,
    },
    #[error("identifier size must be 4 or 8 bytes, got {0}")]
    InvalidIdSize(u8),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeapError {
    #[error("malformed dump: {0}")]
    MalformedDump(#[from] MalformedDump),
    #[error("superclass chain starting at 0x{class_id:x} revisits class 0x{revisited:x}")]
    CyclicHierarchy { class_id: Id, revisited: Id },
    #[error("no heap with id {0}")]
    UnknownHeap(HeapId),
    #[error("heap {heap} is already named {existing}, not {requested}")]
    HeapNameConflict {
        heap: HeapId,
        existing: String,
        requested: String,
    },
    #[error("id 0x{0:x} is already registered")]
    DuplicateId(Id),
}

impl HeapError {
    pub fn is_malformed_dump(&self) -> bool {
        matches!(self, HeapError::MalformedDump(_))
    }
}

pub type Result<T, E = HeapError> = std::result::Result<T, E>;
