//! Output formatting for the step's result.

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use kubedeploy_reconcile::{DesiredWorkload, Outcome};
use serde::Serialize;

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Table,
    /// JSON format.
    Json,
}

#[derive(Debug, Serialize)]
struct Plan<'a> {
    dry_run: bool,
    name: &'a str,
    namespace: &'a str,
    replicas: i32,
    images: Vec<&'a str>,
    manifest: k8s_openapi::api::apps::v1::Deployment,
}

/// Print the result of a reconciliation.
pub fn print_outcome(outcome: &Outcome, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(outcome)?),
        OutputFormat::Table => {
            print_success(&format!("{} in {}", outcome, outcome.namespace));
        }
    }
    Ok(())
}

/// Print a decoded manifest without applying it.
pub fn print_plan(desired: &DesiredWorkload, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let plan = Plan {
                dry_run: true,
                name: desired.name(),
                namespace: desired.namespace(),
                replicas: desired.replicas(),
                images: desired.images(),
                manifest: desired.to_deployment(),
            };
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        OutputFormat::Table => {
            print_info("Plan (dry-run):");
            println!("- validate config: ok");
            println!("- render template: ok");
            println!(
                "- decode manifest: deployment {} ({} replica(s), images: {})",
                desired.name(),
                desired.replicas(),
                desired.images().join(", ")
            );
            println!();
            print!("{}", serde_yaml::to_string(&desired.to_deployment())?);
        }
    }
    Ok(())
}

/// Print a success message.
pub fn print_success(message: &str) {
    println!("{} {}", "Success:".green().bold(), message);
}

/// Print an info message.
pub fn print_info(message: &str) {
    println!("{} {}", "Info:".blue().bold(), message);
}
