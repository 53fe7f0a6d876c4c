use std::process::ExitCode;

mod config;
mod soak;

#[tokio::main]
async fn main() -> ExitCode {
    let config = config::Config::from_args();

    if let Err(err) = mapcache::observability::init_tracing() {
        eprintln!("failed to install tracing subscriber: {err}");
    }
    let metrics = mapcache::metrics::init_metrics();

    let outcome = soak::run(&config).await;

    if config.print_metrics {
        if let Some(handle) = metrics {
            println!("{}", handle.render());
        }
    }

    match outcome {
        Ok(report) => {
            tracing::info!(
                written = report.written,
                persistent = report.persistent,
                remaining = report.remaining,
                "soak run passed"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, "soak run failed");
            ExitCode::FAILURE
        }
    }
}
