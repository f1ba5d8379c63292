use harness::{bench, Bencher};
use heapgraph::workload::{LinkedList, Workload};
use heapgraph::Snapshot;
use std::sync::Mutex;

static SNAPSHOT: Mutex<Option<Snapshot>> = Mutex::new(None);

fn startup() {
    let nodes = std::env::var("NODES")
        .ok()
        .and_then(|x| x.parse().ok())
        .unwrap_or(1 << 20);
    let snapshot = LinkedList::new(nodes).build(2).unwrap();
    *SNAPSHOT.lock().unwrap() = Some(snapshot);
}

fn teardown() {
    let _snapshot = SNAPSHOT.lock().unwrap().take().unwrap();
}

#[bench(startup=startup, teardown=teardown)]
fn linked_list(b: &Bencher) {
    let guard = SNAPSHOT.lock().unwrap();
    let snapshot = guard.as_ref().unwrap();
    let mut result = None;
    b.time(|| {
        result = Some(heapgraph::reachable(snapshot));
    });
    let result = result.unwrap();
    b.add_stat("objects", result.objects);
    b.add_stat("shallow_size", result.shallow_size);
    b.add_stat("malformed", result.malformed.len() as u64);
}
