//! Human readable output of run summaries and plans.

use std::fmt;
use std::time::Duration;

use bytesize::ByteSize;
use iosoak_engine::RunSummary;
use iosoak_engine::bench::OperationClass;
use iosoak_engine::plan::{ByteTargets, IterationPlan};
use sketches_ddsketch::DDSketch;
use yansi::Paint;

const OPERATIONS: [OperationClass; 4] = [
    OperationClass::Write,
    OperationClass::Read,
    OperationClass::Delete,
    OperationClass::Crud,
];

pub fn print_summary(summary: &RunSummary) {
    println!();
    println!(
        "{} {} ({} iterations in {:.0?})",
        "## Soak run".bold(),
        summary.bucket.bold().blue(),
        summary.iterations.bold(),
        summary.elapsed,
    );

    for operation in OPERATIONS {
        let sketch = summary.timings.sketch(operation);
        if sketch.count() == 0 {
            continue;
        }

        println!(
            "{} ({} invocations)",
            format!("{}:", operation.as_str().to_uppercase())
                .bold()
                .green(),
            sketch.count().bold()
        );
        print_throughput(summary.bytes(operation), summary.elapsed);
        print_percentiles(sketch, Duration::from_secs_f64);
    }

    println!(
        "{} {} cleanups, {} left in ledger",
        "STORAGE:".bold().green(),
        summary.cleanups.bold(),
        format_ledger(summary.final_ledger).bold(),
    );
}

pub fn print_plan(targets: &ByteTargets, plan: Option<&IterationPlan>) {
    println!("{}", "## Plan".bold());
    println!("  total capacity: {}", ByteSize::b(targets.total).bold());
    for operation in &OPERATIONS[..3] {
        let target = targets.for_operation(*operation);
        print!(
            "  {:<7} target: {}",
            operation.as_str(),
            ByteSize::b(target).bold()
        );
        match plan {
            Some(plan) => println!(" ({} samples)", plan.samples(*operation).bold()),
            None => println!(),
        }
    }
    println!(
        "  cleanup trigger: {}",
        ByteSize::b(targets.cleanup).bold().yellow()
    );
}

fn format_ledger(bytes: i64) -> String {
    let size = ByteSize::b(bytes.unsigned_abs());
    if bytes < 0 {
        format!("-{size}")
    } else {
        size.to_string()
    }
}

fn print_throughput(total: u64, duration: Duration) {
    let throughput = (total as f64 / duration.as_secs_f64().max(f64::EPSILON)) as u64;
    println!(
        "  {} covered, {:.2}/s",
        ByteSize::b(total).bold(),
        ByteSize::b(throughput)
    );
}

fn print_percentiles<T: fmt::Debug>(sketch: &DDSketch, map: impl Fn(f64) -> T) {
    let quantile = |q| sketch.quantile(q).ok().flatten().unwrap_or_default();
    let ops = sketch.count();
    let avg = map(sketch.sum().unwrap_or_default() / ops as f64);
    let p50 = map(quantile(0.5));
    let p90 = map(quantile(0.9));
    let p99 = map(quantile(0.99));
    println!(
        "  avg: {:.2?}; p50: {p50:.2?}; p90: {p90:.2?}; p99: {p99:.2?}",
        avg.bold()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_ledger_keeps_sign() {
        assert_eq!(format_ledger(-2048), format!("-{}", ByteSize::kib(2)));
        assert_eq!(format_ledger(2048), ByteSize::kib(2).to_string());
        assert_eq!(format_ledger(0), ByteSize::b(0).to_string());
    }
}
