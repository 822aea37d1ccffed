use tracing_subscriber::EnvFilter;

fn main() {
    use layout_include_graph::cli::parse;
    let cli = parse();

    let default_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let code = layout_include_graph::app::run_cli(cli);
    if code != 0 {
        std::process::exit(code);
    }
}
