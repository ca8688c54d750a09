use bolt::cli::{self, Args, LogFormat};
use bolt::signals;
use bolt::status::ExitStatus;
use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_logging(args: &Args) {
    let default_level = match args.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env("BOLT_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);

    let result = match args.log_format.unwrap_or_default() {
        LogFormat::Json => registry.with(fmt::layer().json().with_writer(std::io::stderr)).try_init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init(),
    };
    if let Err(e) = result {
        eprintln!("Warning: failed to initialize logging: {}", e);
    }
}

fn main() -> ExitStatus {
    let args = Args::parse();
    init_logging(&args);

    // First Ctrl+C stops the run at the next request boundary
    ctrlc::set_handler(move || {
        let again = signals::set_interrupted();
        eprintln!("\nInterrupted");
        if again {
            std::process::exit(ExitStatus::Interrupted as i32);
        }
    })
    .ok();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("error: failed to start runtime: {}", e);
            return ExitStatus::Error;
        }
    };

    let status = runtime.block_on(cli::run(args));
    if signals::was_interrupted() {
        return ExitStatus::Interrupted;
    }
    status
}
