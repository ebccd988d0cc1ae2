use crate::types::{LoadConfig, RunSummary};

pub fn print_summary(summary: &RunSummary, config: &LoadConfig) {
    println!("\n{}", "=".repeat(50));
    println!("{:^50}", "Load Test Results");
    println!("{}", "=".repeat(50));

    println!("\nTarget:            {}", config.target.url);
    println!(
        "Methods:           {} (suggested {}, {})",
        summary.resolution.supported.join(", "),
        summary.resolution.chosen,
        summary.resolution.source.as_str()
    );
    println!(
        "Load:              {} workers x {} rps for {:?}",
        config.workers, config.rps, config.duration
    );

    println!("\nRequests:");
    println!("  Total Attempted: {:>12}", summary.total_attempted);
    println!("  Successful:      {:>12}", summary.successful);
    println!("  Unreachable:     {:>12}", summary.unreachable);

    println!("\nDispatch:");
    println!("  Ticks:           {:>12}", summary.ticks);
    println!("  Enqueued:        {:>12}", summary.enqueued);
    println!("  Dropped:         {:>12}", summary.dropped);
    println!("  Stopped By:      {:>12}", summary.stop.as_str());
    println!("  Elapsed:         {:>11.2}s", summary.elapsed.as_secs_f64());

    if !summary.unreachable_by_kind.is_empty() {
        println!("\nUnreachable By Kind:");
        let mut kinds: Vec<_> = summary.unreachable_by_kind.iter().collect();
        kinds.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));
        for (kind, count) in kinds {
            println!("  {:<16} {:>12}", format!("{}:", kind.as_str()), count);
        }
    }

    if summary.target_never_reached() {
        println!("\nTarget was never reached.");
    }

    println!();
}
