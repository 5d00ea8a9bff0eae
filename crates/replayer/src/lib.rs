pub mod arguments;
pub mod loader;
pub mod run;
pub mod writer;

use clap::Parser;

/// Entry point shared by the binary and tests. Parses arguments, installs
/// tracing and exits non-zero on any replay failure.
pub async fn start(args: impl Iterator<Item = String>) {
    let args = arguments::Arguments::parse_from(args);
    observe::tracing::initialize(&args.log_filter);
    if let Err(err) = run::execute(args).await {
        tracing::error!(?err, "replayer failed");
        std::process::exit(1);
    }
}
