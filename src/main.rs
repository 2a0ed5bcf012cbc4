use classopt::infrastructure::{init_logging, write_lp, Cli};
use classopt::{OptimizationService, Reporter};
use clap::Parser;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.log.as_deref())?;

    // Build the scenario with command-line overrides
    let scenario = cli.scenario()?;

    if let Some(path) = &cli.write_lp {
        let mut file = BufWriter::new(File::create(path)?);
        write_lp(&scenario.model, &mut file)?;
        file.flush()?;
        info!(path = %path.display(), "model written in LP format");
    }

    // Solve; infeasible and unbounded outcomes are reported, not errors
    let service = OptimizationService::new();
    let solution = service
        .solve_with_time_limit(scenario.model.clone(), scenario.options.clone())
        .await?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    Reporter::new(scenario.format).report(&solution, &scenario.model, &mut out)?;
    out.flush()?;

    Ok(())
}
