//! Runs the allocation workloads against the system allocator and against
//! both `blockmem` engines, and prints a comparison table.

mod diagnostics;
mod errors;
mod workloads;

use std::alloc::Layout;
use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use argh::FromArgs;
use blockmem::{BitmemHeap, BuddyHeap};

use diagnostics::current_usage;
use workloads::{run, Allocator, TEST_COUNT, TEST_NAMES};

#[derive(FromArgs)]
/// compares blockmem's buddy and bitmem allocators against the system allocator
struct App {
    /// which strategy to benchmark: system, buddy, bitmem, or all (default)
    #[argh(option, short = 's', default = "String::from(\"all\")")]
    strategy: String,

    /// print each workload's memory-usage delta as it runs
    #[argh(switch, short = 'v')]
    verbose: bool,
}

struct Report {
    label: &'static str,
    times: [Duration; TEST_COUNT],
}

/// Adapts `std::alloc`'s global allocator to the [`Allocator`] trait. Unlike
/// `blockmem`'s engines, `GlobalAlloc::dealloc` needs the original `Layout`
/// back, so this tracks one per live pointer.
struct SystemAllocator {
    layouts: HashMap<usize, Layout>,
}

impl SystemAllocator {
    fn new() -> Self {
        Self {
            layouts: HashMap::new(),
        }
    }
}

impl Allocator for SystemAllocator {
    fn allocate(&mut self, size: usize) -> *mut u8 {
        let layout = Layout::from_size_align(size, 8).expect("valid layout");
        let p = unsafe { std::alloc::alloc(layout) };
        if !p.is_null() {
            self.layouts.insert(p as usize, layout);
        }
        p
    }

    fn free(&mut self, ptr: *mut u8) {
        if let Some(layout) = self.layouts.remove(&(ptr as usize)) {
            unsafe { std::alloc::dealloc(ptr, layout) };
        }
    }
}

fn main() -> Result<()> {
    let app: App = argh::from_env();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let mut reports = Vec::new();

    if matches!(app.strategy.as_str(), "all" | "system") {
        reports.push(bench_system(app.verbose).context("benchmarking the system allocator")?);
    }
    if matches!(app.strategy.as_str(), "all" | "buddy") {
        reports.push(bench_buddy(app.verbose).context("benchmarking the buddy allocator")?);
    }
    if matches!(app.strategy.as_str(), "all" | "bitmem") {
        reports.push(bench_bitmem(app.verbose).context("benchmarking the bitmem allocator")?);
    }

    if reports.is_empty() {
        anyhow::bail!(
            "unknown strategy {:?}; expected system, buddy, bitmem, or all",
            app.strategy
        );
    }

    print_table(&reports);
    Ok(())
}

fn bench_system(verbose: bool) -> Result<Report> {
    let mut allocator = SystemAllocator::new();
    let before = current_usage();
    let times = run(&mut allocator)?;

    if verbose {
        log::info!("system: memory delta {:?}", diagnostics::delta(before, current_usage()));
    }

    Ok(Report {
        label: "default",
        times,
    })
}

fn bench_buddy(verbose: bool) -> Result<Report> {
    let mut heap = BuddyHeap::new();
    let before = current_usage();
    let times = run(&mut heap)?;

    if verbose {
        log::info!(
            "buddy: memory delta {:?}, pages mapped {}",
            diagnostics::delta(before, current_usage()),
            heap.pages_mapped()
        );
    }

    Ok(Report {
        label: "buddy",
        times,
    })
}

fn bench_bitmem(verbose: bool) -> Result<Report> {
    let mut heap = BitmemHeap::new();
    let before = current_usage();
    let times = run(&mut heap)?;

    if verbose {
        log::info!(
            "bitmem: memory delta {:?}, pages mapped {}",
            diagnostics::delta(before, current_usage()),
            heap.pages_mapped()
        );
    }

    Ok(Report {
        label: "bitmem",
        times,
    })
}

fn print_table(reports: &[Report]) {
    print!("{:<28}", "test");
    for report in reports {
        print!(" || {:>12}", report.label);
    }
    println!();

    for (i, name) in TEST_NAMES.iter().enumerate() {
        print!("{name:<28}");
        for report in reports {
            print!(" || {:>10.2?}", report.times[i]);
        }
        println!();
    }

    print!("{:<28}", "total time");
    for report in reports {
        let total: Duration = report.times.iter().sum();
        print!(" || {total:>10.2?}");
    }
    println!();
}
