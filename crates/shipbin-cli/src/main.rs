//! shipbin CLI

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use shipbin_cli::config::{Environment, InstallConfig};
use shipbin_cli::ops::{InstallPlan, install};
use shipbin_cli::{Cli, default_log_level};
use shipbin_core::Verification;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_level(cli.quiet, cli.verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let env = Environment::capture();
    install::preflight(&env)?;
    let config = InstallConfig::from_args(&cli.install, env)?;

    if cli.dry_run {
        let plan = install::plan(&config).await?;
        print_plan(&plan);
        return Ok(());
    }

    let outcome = tokio::select! {
        outcome = install::run(&config) => outcome?,
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl-C")?;
            anyhow::bail!("Install interrupted");
        }
    };

    if let Verification::Skipped(reason) = &outcome.verification {
        tracing::warn!("Installed without checksum verification: {reason}");
    }
    println!(
        "Installed {} {} to {}",
        outcome.name,
        outcome.version,
        outcome.path.display()
    );
    Ok(())
}

fn print_plan(plan: &InstallPlan) {
    println!("Would install {} {}", plan.release.repository, plan.release.version);
    println!("  platform:  {}", plan.naming.target());
    println!("  archive:   {}", plan.release.assets.binary_archive_url);
    println!("  checksums: {}", plan.release.assets.checksum_manifest_url);
    println!("  policy:    {}", plan.checksum_policy);
    println!("  target:    {}", plan.target.final_path.display());
    for candidate in &plan.target.candidates {
        println!("  candidate: {}", candidate.display());
    }
}
