use std::time::Instant;

use anyhow::Result;
use clap::Parser;

use heapgraph::*;

#[macro_use]
extern crate log;

pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

fn get_git_info() -> String {
    match (built_info::GIT_COMMIT_HASH, built_info::GIT_DIRTY) {
        (Some(hash), Some(dirty)) => format!(
            "{}{}",
            hash.split_at(7).0,
            if dirty { "-dirty" } else { "" }
        ),
        (Some(hash), None) => format!("{}{}", hash.split_at(7).0, "-?"),
        _ => "unknown-git-version".to_string(),
    }
}

pub fn main() -> Result<()> {
    env_logger::init();
    println!("heapgraph {}", get_git_info());
    let args = Args::parse();
    let snapshot = build_snapshot(&args)?;
    let start = Instant::now();
    match &args.command {
        Commands::Walk(walk_args) => run_walks(&snapshot, *walk_args)?.print(),
        Commands::Classes => print_classes(&snapshot),
        Commands::Hierarchy(hierarchy_args) => print_hierarchy(&snapshot, &hierarchy_args.class)?,
    }
    debug!(
        "{:?} finished in {} ms",
        args.command,
        start.elapsed().as_micros() as f64 / 1000f64
    );
    Ok(())
}
