//! Console rendering.
//!
//! Tables go to stdout; logs go to stderr through `tracing`.

use std::time::Duration;

use chrono::Local;
use colored::{ColoredString, Colorize};
use indicatif::{ProgressBar, ProgressStyle};

use crate::launch::LaunchOutcome;
use crate::providers::traits::{Instance, InstanceType};
use crate::retry::RetryObserver;
use crate::terminate::TerminationResult;

/// Width of section rules.
const RULE_WIDTH: usize = 80;

/// Which instance types to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum AvailabilityFilter {
    /// Every type.
    #[default]
    All,
    /// Types with capacity somewhere.
    Available,
    /// Types with no capacity anywhere.
    Unavailable,
}

/// Print a section header.
pub fn print_section(title: &str) {
    println!();
    println!("{}", "═".repeat(RULE_WIDTH).bright_black());
    println!("{}", title.cyan().bold());
    println!("{}", "═".repeat(RULE_WIDTH).bright_black());
}

/// Print a success message.
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message.green());
}

/// Print a warning message.
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message.yellow());
}

/// Print an error message.
pub fn print_error(message: &str) {
    println!("{} {}", "✗".red().bold(), message.red());
}

/// Print an info message.
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Print a dimmed hint.
pub fn print_hint(message: &str) {
    println!("{}", message.bright_black());
}

/// Format a duration as `42s` or `3m 5s`.
#[must_use]
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{secs}s")
    }
}

/// Colour an instance status.
#[must_use]
pub fn status_badge(status: &str) -> ColoredString {
    let text = format!("● {status}");
    match status.to_lowercase().as_str() {
        "active" => text.green(),
        "booting" | "provisioning" => text.yellow(),
        "terminating" | "terminated" | "unhealthy" => text.red(),
        _ => text.bright_black(),
    }
}

/// One-line summary of an instance, used in lists and pickers.
#[must_use]
pub fn format_instance_line(instance: &Instance) -> String {
    format!(
        "{}  •  {:<25}  •  {:<20}  •  {:<14}  •  {}",
        instance.id,
        instance.instance_type,
        instance.name.as_deref().unwrap_or("no name"),
        instance.region,
        instance.ip.as_deref().unwrap_or("no IP"),
    )
}

/// Print running instances in detail.
pub fn print_instances(instances: &[Instance]) {
    if instances.is_empty() {
        print_info("No running instances found.");
        return;
    }

    print_section("RUNNING INSTANCES");
    for instance in instances {
        println!(
            "\n{} {}",
            instance.name.as_deref().unwrap_or("Unnamed").bold(),
            format!("(ID: {})", instance.id).bright_black()
        );
        println!("  Status:     {}", status_badge(&instance.status));
        println!("  Type:       {}", instance.instance_type);
        println!("  Region:     {}", instance.region);
        println!("  Public IP:  {}", instance.ip.as_deref().unwrap_or("N/A"));
        println!(
            "  Private IP: {}",
            instance.private_ip.as_deref().unwrap_or("N/A")
        );
        println!("  SSH Keys:   {}", instance.ssh_key_names.join(", "));
        if let Some(url) = &instance.jupyter_url {
            println!("  Jupyter:    {url}");
        }
        println!(
            "  Cost:       ${:.2}/hour",
            f64::from(instance.price_cents_per_hour) / 100.0
        );
    }
    println!();
}

/// Types matching `name_filter` (case-insensitive substring) and `show`.
///
/// Also returns the available/unavailable counts among name matches.
#[must_use]
pub fn filter_types<'a>(
    types: &'a [InstanceType],
    name_filter: Option<&str>,
    show: AvailabilityFilter,
) -> (Vec<&'a InstanceType>, usize, usize) {
    let needle = name_filter.map(str::to_lowercase);
    let matching: Vec<&InstanceType> = types
        .iter()
        .filter(|t| {
            needle
                .as_deref()
                .map_or(true, |n| t.name.to_lowercase().contains(n))
        })
        .collect();

    let available = matching.iter().filter(|t| t.has_capacity()).count();
    let unavailable = matching.len() - available;

    let shown = matching
        .into_iter()
        .filter(|t| match show {
            AvailabilityFilter::All => true,
            AvailabilityFilter::Available => t.has_capacity(),
            AvailabilityFilter::Unavailable => !t.has_capacity(),
        })
        .collect();

    (shown, available, unavailable)
}

/// Print instance types with their availability.
pub fn print_instance_types(
    types: &[InstanceType],
    name_filter: Option<&str>,
    show: AvailabilityFilter,
) {
    let title = match show {
        AvailabilityFilter::All => "ALL INSTANCE TYPES",
        AvailabilityFilter::Available => "AVAILABLE INSTANCE TYPES",
        AvailabilityFilter::Unavailable => "UNAVAILABLE INSTANCE TYPES",
    };
    print_section(title);

    let (shown, available, unavailable) = filter_types(types, name_filter, show);
    for t in &shown {
        println!("\n{}", t.name.bold());
        println!("  Description: {}", t.description);
        println!("  GPU:         {}", t.gpu_description);
        println!(
            "  Specs:       {} GPUs, {} vCPUs, {} GiB RAM, {} GiB Storage",
            t.specs.gpus, t.specs.vcpus, t.specs.memory_gib, t.specs.storage_gib
        );
        println!("  Cost:        ${:.2}/hour", t.price_per_hour());

        let regions: Vec<&str> = t
            .regions
            .iter()
            .filter(|r| r.available)
            .map(|r| r.region.as_str())
            .collect();
        if regions.is_empty() {
            println!(
                "  Status:      {}",
                "✗ UNAVAILABLE (no capacity in any region)".red()
            );
        } else {
            println!(
                "  Status:      {}",
                format!("✓ AVAILABLE in {} region(s)", regions.len()).green()
            );
            println!("  Regions:     {}", regions.join(", "));
        }
    }

    println!("\n{}", "═".repeat(RULE_WIDTH).bright_black());
    let total = available + unavailable;
    if show == AvailabilityFilter::All {
        println!("Summary: {available}/{total} instance types have available capacity");
    } else {
        println!("Showing: {} instance type(s)", shown.len());
        println!("Total: {available} available, {unavailable} unavailable");
    }
}

/// Fixed-width row for the instance type picker.
#[must_use]
pub fn format_type_choice(t: &InstanceType) -> String {
    let available = t.regions.iter().filter(|r| r.available).count();
    let status = if available > 0 {
        format!("✓ Available ({available})")
    } else {
        "✗ Unavailable".to_string()
    };

    format!(
        "{:<25} │ {:>10} │ {:>12} │ {:<24} │ {:>13} │ {:>11} │ {:>15}",
        t.name,
        format!("{} vCPUs", t.specs.vcpus),
        format!("{} GB RAM", t.specs.memory_gib),
        format!("{}x {}", t.specs.gpus, t.gpu_description),
        format!("{} GB SSD", t.specs.storage_gib),
        format!("${:.2}/hr", t.price_per_hour()),
        status,
    )
}

/// Header matching [`format_type_choice`] columns.
#[must_use]
pub fn type_choice_header() -> String {
    format!(
        "  {:<25} │ {:>10} │ {:>12} │ {:<24} │ {:>13} │ {:>11} │ {:>15}",
        "Instance Type", "CPUs", "RAM", "GPU", "Storage", "Price", "Status"
    )
}

/// Print launched instance IDs.
pub fn print_launched(region: &str, instance_ids: &[String]) {
    println!();
    print_success(&format!(
        "Successfully launched {} instance(s) in {region}:",
        instance_ids.len()
    ));
    for id in instance_ids {
        println!("  {} {id}", "•".green());
    }
}

/// Print per-instance termination results.
pub fn print_termination_results(results: &[TerminationResult]) {
    if results.is_empty() {
        print_info("No instances were terminated.");
        return;
    }

    for result in results {
        match result {
            TerminationResult::Terminated { id } => print_success(&format!("{id} terminated")),
            TerminationResult::NotFound { id } => {
                print_warning(&format!("{id} not found or not running"));
            }
            TerminationResult::Failed { id, error } => print_error(&format!("{id}: {error}")),
        }
    }

    let terminated = results.iter().filter(|r| r.is_terminated()).count();
    println!("\nTerminated {terminated}/{} instance(s)", results.len());
}

/// [`RetryObserver`] that prints each attempt and spins while waiting.
pub struct ConsoleObserver {
    spinner: Option<ProgressBar>,
}

impl ConsoleObserver {
    /// Create an observer with no active spinner.
    #[must_use]
    pub fn new() -> Self {
        Self { spinner: None }
    }

    fn clear_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }
}

impl Default for ConsoleObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryObserver for ConsoleObserver {
    fn attempt_started(&mut self, attempt: u32, elapsed: Duration) {
        self.clear_spinner();
        println!(
            "{} Attempt {} (elapsed: {})",
            Local::now().format("%H:%M:%S").to_string().cyan(),
            format!("#{attempt}").bold(),
            format_elapsed(elapsed)
        );
    }

    fn attempt_finished(&mut self, _attempt: u32, outcome: &LaunchOutcome) {
        match outcome {
            LaunchOutcome::Launched { region, .. } => {
                println!("  {} Capacity found in '{}'", "✓".green(), region.bold());
            }
            LaunchOutcome::Unavailable { reason } => println!("  {} {reason}", "✗".red()),
            LaunchOutcome::Failed { error } => println!("  {} {error}", "✗".red()),
        }
    }

    fn waiting(&mut self, interval: Duration) {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("  {spinner:.yellow} {msg} ({elapsed})") {
            spinner.set_style(style);
        }
        spinner.set_message(format!(
            "Waiting {} before next attempt...",
            format_elapsed(interval)
        ));
        spinner.enable_steady_tick(Duration::from_millis(100));
        self.spinner = Some(spinner);
    }
}

impl Drop for ConsoleObserver {
    fn drop(&mut self) {
        self.clear_spinner();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::instance_type;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_secs(0)), "0s");
        assert_eq!(format_elapsed(Duration::from_secs(59)), "59s");
        assert_eq!(format_elapsed(Duration::from_secs(65)), "1m 5s");
        assert_eq!(format_elapsed(Duration::from_secs(3600)), "60m 0s");
    }

    #[test]
    fn test_filter_types_by_name_and_availability() {
        let types = vec![
            instance_type("gpu_1x_h100_pcie", &[("us-west-1", true)]),
            instance_type("gpu_8x_h100_sxm5", &[("us-west-1", false)]),
            instance_type("gpu_1x_a10", &[("us-east-1", true)]),
        ];

        let (shown, available, unavailable) =
            filter_types(&types, Some("H100"), AvailabilityFilter::All);
        assert_eq!(shown.len(), 2);
        assert_eq!((available, unavailable), (1, 1));

        let (shown, _, _) = filter_types(&types, None, AvailabilityFilter::Unavailable);
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].name, "gpu_8x_h100_sxm5");

        let (shown, available, _) = filter_types(&types, None, AvailabilityFilter::Available);
        assert_eq!(shown.len(), 2);
        assert_eq!(available, 2);
    }

    #[test]
    fn test_type_choice_marks_availability() {
        let up = instance_type("gpu_1x_a10", &[("us-east-1", true), ("us-west-1", true)]);
        let down = instance_type("gpu_1x_a10", &[("us-east-1", false)]);

        assert!(format_type_choice(&up).contains("✓ Available (2)"));
        assert!(format_type_choice(&down).contains("✗ Unavailable"));
        assert!(format_type_choice(&up).starts_with("gpu_1x_a10"));
    }
}
