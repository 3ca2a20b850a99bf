//! tripgate CLI binary entry point.

use clap::Parser;
use tripgate::cli::commands::{handle_cache, handle_config, handle_search, load_config};
use tripgate::cli::logging::init_tracing;
use tripgate::cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.json);

    let config = match load_config(cli.config_file.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Search(args) => handle_search(&config, args.command).await,
        Commands::Cache(args) => handle_cache(&config, args.command).await,
        Commands::Config => handle_config(&config),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
