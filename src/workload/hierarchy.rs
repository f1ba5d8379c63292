use super::{builder_with_heaps, heap_of, Workload};
use crate::buffer::{BufferWriter, IdSize, Type, Value};
use crate::error::Result;
use crate::field::Field;
use crate::snapshot::{ClassObj, Id, Instance, RootObj, RootType, Snapshot};

const LEVEL_CLASS_BASE_ID: Id = 0x10;
const INSTANCE_BASE_ID: Id = 0x1000;
const CLASS_SIZE: u64 = 48;
const FIELD_SIZE: u64 = 4;

/// A single inheritance chain `Level0 <- Level1 <- ... <- LevelN-1`, with
/// one rooted instance of every level. Each level declares one int field.
///
/// With `cyclic` set, `Level0` names the deepest level as its superclass,
/// which no well-formed dump does. Instance field decoding then fails with
/// a cyclic hierarchy error.
pub struct Hierarchy {
    depth: usize,
    cyclic: bool,
}

impl Hierarchy {
    pub fn new(depth: usize) -> Self {
        Hierarchy {
            depth: depth.max(1),
            cyclic: false,
        }
    }

    pub fn cyclic(mut self, cyclic: bool) -> Self {
        self.cyclic = cyclic;
        self
    }

    pub fn class_id(level: usize) -> Id {
        LEVEL_CLASS_BASE_ID + level as Id
    }

    pub fn class_name(level: usize) -> String {
        format!("heapgraph/Level{}", level)
    }

    pub fn instance_id(level: usize) -> Id {
        INSTANCE_BASE_ID + level as Id
    }
}

impl Workload for Hierarchy {
    fn build(&self, heaps: usize) -> Result<Snapshot> {
        info!(
            "Synthesizing a{} class hierarchy {} levels deep",
            if self.cyclic { " cyclic" } else { "" },
            self.depth
        );
        let mut w = BufferWriter::new(IdSize::LONG);
        let statics = w.write_static_block(&[]);
        // Own fields first, then those of each superclass
        let bodies: Vec<usize> = (0..self.depth)
            .map(|level| {
                let values: Vec<Value> = (0..=level).rev().map(|l| Value::Int(l as i32)).collect();
                w.write_values(&values)
            })
            .collect();

        let mut builder = builder_with_heaps(w.finish(), heaps)?;
        for level in 0..self.depth {
            let mut class = ClassObj::new(Self::class_id(level), Self::class_name(level), statics);
            if level > 0 {
                class.set_super_class_id(Self::class_id(level - 1));
            } else if self.cyclic {
                class.set_super_class_id(Self::class_id(self.depth - 1));
            }
            class.set_fields(vec![Field::new(Type::Int, format!("depth{}", level))]);
            class.set_instance_size(((level + 1) as u64 * FIELD_SIZE) as u32);
            let heap = heap_of(level as u64, heaps);
            builder.add_class(heap, class, CLASS_SIZE)?;
            builder.add_root(RootObj::new(RootType::SystemClass, Self::class_id(level), heap));
        }
        for (level, offset) in bodies.into_iter().enumerate() {
            let heap = heap_of(level as u64, heaps);
            let instance = Instance::object(Self::instance_id(level), Self::class_id(level), offset)
                .with_size((level + 1) as u64 * FIELD_SIZE);
            builder.add_instance(heap, instance)?;
            builder.add_root(
                RootObj::new(RootType::JavaLocal, Self::instance_id(level), heap).with_thread(1),
            );
        }
        Ok(builder.build())
    }
}
