use clap::{Parser, Subcommand, ValueEnum};

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum, Debug)]
#[clap(rename_all = "verbatim")]
pub enum WorkloadChoice {
    LinkedList,
    StaticFanout,
    Hierarchy,
    CyclicHierarchy,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[arg(short, long, value_enum, default_value_t = WorkloadChoice::LinkedList)]
    pub workload: WorkloadChoice,

    /// Nodes of the linked list, payloads of the fan-out, or levels of the
    /// hierarchy
    #[arg(short, long, default_value_t = 1 << 20)]
    pub size: usize,

    #[arg(long, default_value_t = 2)]
    pub heaps: usize,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Parser, Debug, Clone, Copy)]
pub struct WalkArgs {
    #[arg(short, long, default_value_t = 5)]
    pub iterations: usize,
    #[arg(short, long, default_value_t = false)]
    pub parallel: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct HierarchyArgs {
    /// Class name, slash separated, e.g. heapgraph/Level3
    #[arg(short, long)]
    pub class: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reachability from the GC roots, once per iteration
    Walk(WalkArgs),
    /// Per class instance counts and shallow sizes, by heap
    Classes,
    /// Superclass chain of one class
    Hierarchy(HierarchyArgs),
}
