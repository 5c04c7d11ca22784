//! Run a single search cycle with the configured sources and print the report.

use job_radar::bootstrap::build_runner;
use job_radar::config::AppConfig;
use job_radar::format_report;
use job_radar::sources::SourceRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    job_radar::init_tracing();

    let cfg = AppConfig::load_default()?;
    let runner = build_runner(&cfg, &SourceRegistry::with_builtin())?;
    let report = runner.run_cycle().await?;

    println!("{}", format_report(&report));
    Ok(())
}
