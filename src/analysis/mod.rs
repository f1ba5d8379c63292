use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};

use crate::cli::{Args, WalkArgs, WorkloadChoice};
use crate::error::HeapError;
use crate::snapshot::Snapshot;
use crate::visit::{par_reachable, reachable, Reachability};
use crate::workload::{Hierarchy, LinkedList, StaticFanout, Workload};

mod stats;

pub use stats::WalkReport;

/// Holders per payload in the fan-out workload.
const FANOUT_CLASS_RATIO: usize = 16;
/// Deepest hierarchy built. Instance bodies and field decoding both grow
/// with the square of the depth.
pub const MAX_HIERARCHY_DEPTH: usize = 1 << 10;

fn hierarchy_depth(size: usize) -> usize {
    if size > MAX_HIERARCHY_DEPTH {
        warn!(
            "Hierarchy depth {} clamped to {}",
            size, MAX_HIERARCHY_DEPTH
        );
    }
    size.min(MAX_HIERARCHY_DEPTH)
}

pub fn build_snapshot(args: &Args) -> Result<Snapshot> {
    let start = Instant::now();
    let snapshot = match args.workload {
        WorkloadChoice::LinkedList => LinkedList::new(args.size).build(args.heaps)?,
        WorkloadChoice::StaticFanout => {
            let classes = (args.size / FANOUT_CLASS_RATIO).max(1);
            StaticFanout::new(classes, args.size).build(args.heaps)?
        }
        WorkloadChoice::Hierarchy => Hierarchy::new(hierarchy_depth(args.size)).build(args.heaps)?,
        WorkloadChoice::CyclicHierarchy => Hierarchy::new(hierarchy_depth(args.size))
            .cyclic(true)
            .build(args.heaps)?,
    };
    info!(
        "Synthesized {:?} with {} instances in {} ms",
        args.workload,
        snapshot.instances_count(),
        start.elapsed().as_micros() as f64 / 1000f64
    );
    Ok(snapshot)
}

fn num_threads() -> Result<usize> {
    match std::env::var("THREADS") {
        Ok(x) => Ok(x.parse()?),
        Err(_) => Ok(num_cpus::get()),
    }
}

fn reachable_once(snapshot: &Snapshot, threads: Option<usize>) -> Reachability {
    match threads {
        Some(threads) => par_reachable(snapshot, threads),
        None => reachable(snapshot),
    }
}

/// Runs `iterations` reachability walks, each in its own epoch. Every walk
/// has to find the same graph; the last one is reported.
pub fn run_walks(snapshot: &Snapshot, walk_args: WalkArgs) -> Result<WalkReport> {
    let threads = if walk_args.parallel && !cfg!(feature = "single_thread") {
        Some(num_threads()?)
    } else {
        None
    };
    let mut report = WalkReport {
        threads: threads.unwrap_or(1),
        ..Default::default()
    };
    let mut elapsed = Duration::ZERO;
    for i in 0..walk_args.iterations {
        let start = Instant::now();
        let result = reachable_once(snapshot, threads);
        elapsed = start.elapsed();
        let millis = elapsed.as_micros() as f64 / 1000f64;
        info!(
            "Walk {} reached {} objects ({} bytes) from {} roots in {:.3} ms",
            i, result.objects, result.shallow_size, result.roots, millis
        );
        if millis > 0f64 {
            debug!("That is, {:.1} objects/ms", result.objects as f64 / millis);
        }
        if let Some(previous) = &report.result {
            if previous.objects != result.objects {
                return Err(anyhow!(
                    "walk {} reached {} objects, earlier walks reached {}",
                    i,
                    result.objects,
                    previous.objects
                ));
            }
        }
        report.iterations += 1;
        report.result = Some(result);
    }
    report.time = elapsed;
    info!(
        "Final iteration {} ms",
        elapsed.as_micros() as f64 / 1000f64
    );
    Ok(report)
}

pub fn print_classes(snapshot: &Snapshot) {
    let mut classes: Vec<_> = snapshot.classes().collect();
    classes.sort();
    println!("============================ Tabulate Statistics ============================");
    print!("class\tinstances\tsize");
    for heap in snapshot.heaps() {
        print!("\tinstances.{}\tsize.{}", heap.name(), heap.name());
    }
    println!();
    for class in classes {
        print!(
            "{}\t{}\t{}",
            class,
            class.instance_count(),
            class.shallow_size()
        );
        for heap in snapshot.heaps() {
            let size: u64 = class
                .heap_instances(heap.id(), snapshot)
                .iter()
                .map(|i| i.size())
                .sum();
            print!("\t{}\t{}", class.heap_instances_count(heap.id()), size);
        }
        println!();
    }
    println!("-------------------------- End Tabulate Statistics --------------------------");
}

pub fn print_hierarchy(snapshot: &Snapshot, class_name: &str) -> Result<()> {
    let class = snapshot
        .find_class_by_name(class_name)
        .ok_or_else(|| anyhow!("no class named {}", class_name))?;
    let chain = match class.super_chain(snapshot) {
        Ok(chain) => chain,
        Err(e @ HeapError::CyclicHierarchy { .. }) => {
            error!("Cannot resolve the superclasses of {}: {}", class, e);
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };
    for (depth, clazz) in chain.iter().enumerate() {
        println!(
            "{}{} (0x{:x}): {} fields, {} instances",
            "  ".repeat(depth),
            clazz,
            clazz.id(),
            clazz.fields().len(),
            clazz.instance_count()
        );
    }
    println!("{} fields in total", class.all_fields_count(snapshot)?);
    for subclass in class.subclasses(snapshot) {
        println!("subclass {} (0x{:x})", subclass, subclass.id());
    }
    debug!("{}", class.describe(snapshot)?);
    Ok(())
}
