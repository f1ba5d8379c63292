use super::{HeapId, Id, Instance, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootType {
    Unknown,
    JniGlobal,
    JniLocal,
    JavaLocal,
    NativeStack,
    SystemClass,
    ThreadBlock,
    BusyMonitor,
    ThreadObject,
    InternedString,
    Finalizing,
    Debugger,
    ReferenceCleanup,
    VmInternal,
    JniMonitor,
}

/// A GC root: an id the runtime keeps alive regardless of references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootObj {
    pub kind: RootType,
    pub referenced_id: Id,
    pub heap: HeapId,
    pub thread_serial: Option<u32>,
}

impl RootObj {
    pub fn new(kind: RootType, referenced_id: Id, heap: HeapId) -> Self {
        RootObj {
            kind,
            referenced_id,
            heap,
            thread_serial: None,
        }
    }

    pub fn with_thread(mut self, thread_serial: u32) -> Self {
        self.thread_serial = Some(thread_serial);
        self
    }

    /// The rooted instance. Absent when the dump filtered it out.
    pub fn referent<'s>(&self, snapshot: &'s Snapshot) -> Option<&'s Instance> {
        snapshot.find_reference(self.referenced_id)
    }
}
