// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use std::env;

use fact_dashboard::{load_inputs, DashboardConfig, DashboardReport, Pipeline, PipelineOptions};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    let config = DashboardConfig::from_env().context("Failed to load configuration")?;

    match args.get(1).map(String::as_str) {
        Some("summary") => run_summary(&config),
        Some("json") => run_json(&config),
        Some(other) if other != "ui" => {
            eprintln!("Unknown command: {}", other);
            eprintln!("Usage: fact-dashboard [summary | json | ui]");
            std::process::exit(2);
        }
        _ => run_ui_mode(&config),
    }
}

fn build_report(config: &DashboardConfig) -> Result<DashboardReport> {
    let (facts, dims) = load_inputs(config).with_context(|| {
        format!("Failed to load input tables from {}", config.data_dir.display())
    })?;

    let pipeline = Pipeline::new(PipelineOptions::from(config));
    let (_, report) = pipeline.run(facts, &dims).context("Pipeline run failed")?;
    Ok(report)
}

fn run_summary(config: &DashboardConfig) -> Result<()> {
    let report = build_report(config)?;

    println!("📊 Fact Dashboard - Summary");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("  {}", report.reconciliation.summary());
    println!();
    println!("  Total amount:  {:>16.2}", report.kpis.total_amount);
    println!("  Mean amount:   {:>16.2}", report.kpis.mean_amount);
    println!("  Total fee:     {:>16.2}", report.kpis.total_fee);
    println!("  Transactions:  {:>16}", report.kpis.count);

    if report.kpis.count == 0 {
        println!("\n⚠️  Fact table is empty - nothing to chart.");
        return Ok(());
    }

    println!("\n  Region                    Sum            Mean   Count  Trend");
    println!("  ──────────────────────────────────────────────────────────────");
    for row in &report.regions {
        println!(
            "  {:<18} {:>12.2} {:>12.2} {:>8}  {}",
            row.region_name, row.sum, row.mean, row.count, row.sparkline
        );
    }

    Ok(())
}

fn run_json(config: &DashboardConfig) -> Result<()> {
    let report = build_report(config)?;
    let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
    println!("{}", json);
    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: &DashboardConfig) -> Result<()> {
    println!("🖥️  Loading Fact Dashboard...\n");

    let report = build_report(config)?;
    println!("✓ {}\n", report.summary());
    println!("Starting UI... (Press 'q' to quit)\n");

    let mut app = ui::App::new(report);
    ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: &DashboardConfig) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use: fact-dashboard summary | json");
    eprintln!("   Or the API: cargo run --bin dashboard-server --features server");
    std::process::exit(1);
}
