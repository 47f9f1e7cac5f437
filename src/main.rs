// src/main.rs

use dagrun::{cli, logging, run};

#[tokio::main]
async fn main() {
    match run_main().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            eprintln!("dagrun error: {err:?}");
            std::process::exit(1);
        }
    }
}

/// `Ok(false)` when the run finished but some job did not succeed.
async fn run_main() -> anyhow::Result<bool> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;

    let Some(report) = run(args).await? else {
        return Ok(true);
    };

    for (job, record) in report.iter() {
        if !record.outcome.is_success() {
            eprintln!("{job}: {:?}", record.outcome);
        }
    }
    Ok(report.is_success())
}
