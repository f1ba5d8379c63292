use super::{builder_with_heaps, heap_of, Workload, FIELD_NAME_ID_BASE};
use crate::buffer::{BufferWriter, IdSize, Type, Value};
use crate::error::Result;
use crate::field::Field;
use crate::snapshot::{ClassObj, Id, Instance, RootObj, RootType, Snapshot};

const PAYLOAD_CLASS_ID: Id = 0x10;
const PAYLOAD_ARRAY_CLASS_ID: Id = 0x11;
const HOLDER_CLASS_BASE_ID: Id = 0x100;
const PAYLOAD_BASE_ID: Id = 0x10_0000;
const ALL_PAYLOADS_ID: Id = 0x0f_ffff;
const PAYLOAD_SIZE: u64 = 24;
const CLASS_SIZE: u64 = 64;
const ARRAY_HEADER_SIZE: u64 = 16;

/// Many rooted holder classes whose statics point into one shared ring of
/// payload objects. Most payloads are offered by several referrers, which
/// is what the epoch marks have to deduplicate.
pub struct StaticFanout {
    num_classes: usize,
    num_objects: usize,
}

impl StaticFanout {
    pub fn new(num_classes: usize, num_objects: usize) -> Self {
        StaticFanout {
            num_classes,
            num_objects,
        }
    }

    pub fn payload_id(&self, j: usize) -> Id {
        PAYLOAD_BASE_ID + j as Id
    }

    pub fn holder_class_id(i: usize) -> Id {
        HOLDER_CLASS_BASE_ID + i as Id
    }

    /// The two payloads holder `i` refers to, null when there are none.
    fn targets(&self, i: usize) -> (Id, Id) {
        if self.num_objects == 0 {
            return (0, 0);
        }
        (
            self.payload_id(i % self.num_objects),
            self.payload_id((i * 7 + 1) % self.num_objects),
        )
    }
}

impl Workload for StaticFanout {
    fn build(&self, heaps: usize) -> Result<Snapshot> {
        info!(
            "Synthesizing {} holder classes over {} shared payloads",
            self.num_classes, self.num_objects
        );
        let mut w = BufferWriter::new(IdSize::LONG);
        let all = if self.num_objects == 0 {
            0
        } else {
            ALL_PAYLOADS_ID
        };
        let payload_statics = w.write_static_block(&[(FIELD_NAME_ID_BASE, Value::Object(all))]);
        let array_statics = w.write_static_block(&[]);
        let holder_statics: Vec<usize> = (0..self.num_classes)
            .map(|i| {
                let (first, second) = self.targets(i);
                w.write_static_block(&[
                    (FIELD_NAME_ID_BASE + 1, Value::Object(first)),
                    (FIELD_NAME_ID_BASE + 2, Value::Object(second)),
                    (FIELD_NAME_ID_BASE + 3, Value::Int(i as i32)),
                ])
            })
            .collect();
        let payloads: Vec<usize> = (0..self.num_objects)
            .map(|j| {
                let next = self.payload_id((j + 1) % self.num_objects);
                w.write_values(&[Value::Object(next), Value::Long(j as i64)])
            })
            .collect();
        let elements: Vec<Value> = (0..self.num_objects)
            .map(|j| Value::Object(self.payload_id(j)))
            .collect();
        let all_payloads = w.write_values(&elements);

        let mut payload = ClassObj::new(PAYLOAD_CLASS_ID, "heapgraph/Payload", payload_statics);
        payload.set_fields(vec![
            Field::new(Type::Object, "next"),
            Field::new(Type::Long, "weight"),
        ]);
        payload.set_static_fields(vec![Field::new(Type::Object, "ALL")]);
        payload.set_instance_size(PAYLOAD_SIZE as u32);
        let payload_array = ClassObj::new(
            PAYLOAD_ARRAY_CLASS_ID,
            "heapgraph/Payload[]",
            array_statics,
        );

        let mut builder = builder_with_heaps(w.finish(), heaps)?;
        builder.add_class(0, payload, CLASS_SIZE)?;
        builder.add_class(0, payload_array, CLASS_SIZE)?;
        builder.add_root(RootObj::new(RootType::SystemClass, PAYLOAD_CLASS_ID, 0));
        builder.add_root(RootObj::new(RootType::SystemClass, PAYLOAD_ARRAY_CLASS_ID, 0));
        for (i, offset) in holder_statics.into_iter().enumerate() {
            let id = Self::holder_class_id(i);
            let heap = heap_of(i as u64, heaps);
            let mut holder = ClassObj::new(id, format!("heapgraph/Holder{}", i), offset);
            holder.set_static_fields(vec![
                Field::new(Type::Object, "FIRST"),
                Field::new(Type::Object, "SECOND"),
                Field::new(Type::Int, "INDEX"),
            ]);
            builder.add_class(heap, holder, CLASS_SIZE)?;
            builder.add_root(RootObj::new(RootType::SystemClass, id, heap));
        }
        for (j, offset) in payloads.into_iter().enumerate() {
            let instance = Instance::object(self.payload_id(j), PAYLOAD_CLASS_ID, offset)
                .with_size(PAYLOAD_SIZE);
            builder.add_instance(heap_of(j as u64, heaps), instance)?;
        }
        if self.num_objects != 0 {
            let length = self.num_objects as u32;
            let array = Instance::array(ALL_PAYLOADS_ID, Type::Object, length, all_payloads)
                .with_array_class(PAYLOAD_ARRAY_CLASS_ID)
                .with_size(ARRAY_HEADER_SIZE + 8 * length as u64);
            builder.add_instance(0, array)?;
        }
        Ok(builder.build())
    }
}
