//! Synthetic snapshots with a known shape, for exercising traversals
//! without a real dump at hand.

use crate::buffer::DumpBuffer;
use crate::error::Result;
use crate::snapshot::{HeapId, Snapshot, SnapshotBuilder};

mod hierarchy;
mod linked_list;
mod static_fanout;

pub use hierarchy::Hierarchy;
pub use linked_list::LinkedList;
pub use static_fanout::StaticFanout;

pub trait Workload {
    /// Builds the snapshot with its instances spread over `heaps` heaps
    /// (at least one).
    fn build(&self, heaps: usize) -> Result<Snapshot>;
}

const HEAP_NAMES: [&str; 4] = ["default", "image", "zygote", "app"];

/// Id used for field names in static blocks. Names are never resolved.
const FIELD_NAME_ID_BASE: u64 = 0x7f00_0000;

fn heap_name(id: HeapId) -> String {
    match HEAP_NAMES.get(id as usize) {
        Some(name) => name.to_string(),
        None => format!("heap{}", id),
    }
}

fn builder_with_heaps(buffer: DumpBuffer, heaps: usize) -> Result<SnapshotBuilder> {
    let mut builder = SnapshotBuilder::new(buffer);
    for id in 0..heaps.max(1) as HeapId {
        builder.add_heap(id, &heap_name(id))?;
    }
    Ok(builder)
}

/// Round-robin placement of the `index`th object.
fn heap_of(index: u64, heaps: usize) -> HeapId {
    (index % heaps.max(1) as u64) as HeapId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_names() {
        assert_eq!(heap_name(0), "default");
        assert_eq!(heap_name(3), "app");
        assert_eq!(heap_name(9), "heap9");
        assert_eq!(heap_of(5, 0), 0);
        assert_eq!(heap_of(5, 3), 2);
    }

    #[test]
    fn test_zero_heaps_means_one() {
        let snapshot = LinkedList::new(4).build(0).unwrap();
        assert_eq!(snapshot.heaps().len(), 1);
        assert_eq!(snapshot.heaps()[0].name(), "default");
    }
}
