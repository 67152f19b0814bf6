fn main() {
    use clap::Parser;
    use std::error::Error;
    let args = web2reader::cli::Args::parse();
    init_tracing(web2reader::cli::default_log_level(&args));
    if let Err(e) = web2reader::cli::run(&args) {
        eprintln!("{}", e);
        if args.verbose {
            let mut source = e.source();
            while let Some(s) = source {
                eprintln!("  cause: {}", s);
                source = s.source();
            }
        }
        std::process::exit(e.exit_code());
    }
}

/// RUST_LOG wins over the level implied by --quiet/--verbose.
fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(filter)
        .try_init();
}
