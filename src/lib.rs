#[macro_use]
extern crate log;

mod analysis;
mod buffer;
pub mod cli;
mod constants;
mod error;
mod field;
mod snapshot;
mod visit;
pub mod workload;

pub use crate::analysis::{build_snapshot, print_classes, print_hierarchy, run_walks, WalkReport};
pub use crate::buffer::{BufferCursor, BufferWriter, DumpBuffer, IdSize, Type, Value};
pub use crate::cli::{Args, Commands, WorkloadChoice};
pub use crate::error::{HeapError, MalformedDump, Result};
pub use crate::field::Field;
pub use crate::snapshot::{
    ArrayInstance, ClassInstance, ClassObj, Heap, HeapId, Id, Instance, InstanceKind, RootObj,
    RootType, Snapshot, SnapshotBuilder, StackFrame, StackTrace,
};
pub use crate::visit::{
    par_reachable, reachable, reachable_from, seed_roots, walk, Epoch, HeapTally, Reachability,
    ReachabilityVisitor, Visitor, WalkStats, WorkList,
};
pub use crate::workload::Workload;
