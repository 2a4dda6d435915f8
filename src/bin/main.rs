use claimtrie::{cli, config, telemetry};

fn main() {
    let cli = cli::parse_from(std::env::args_os());
    let config = config::load_or_default(cli.config.as_deref());
    let _telemetry_guard = telemetry::init(cli.verbose, &config.logging);

    if let Err(e) = cli::run(cli, config) {
        tracing::error!("error: {e}");
        std::process::exit(1);
    }
}
