use localbox::cli::commands::{CliArgs, Commands, ModelsCommand};
use localbox::cli::handlers::{
    handle_catalog, handle_models_delete, handle_models_list, handle_profile, handle_setup,
};
use localbox::util::{init_logging, parse_level, LoggingConfig};
use localbox::VERSION;

use clap::Parser;
use std::env;
use tracing::{debug, Level};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("localbox v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match &args.command {
        Commands::Setup(setup_args) => handle_setup(setup_args, args.quiet).await,
        Commands::Models { command } => match command {
            ModelsCommand::List(list_args) => handle_models_list(list_args),
            ModelsCommand::Delete(delete_args) => handle_models_delete(delete_args),
        },
        Commands::Profile(profile_args) => handle_profile(profile_args),
        Commands::Catalog(catalog_args) => handle_catalog(catalog_args),
    };

    std::process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs) {
    let level = if let Some(level_str) = &args.log_level {
        level_or_info(level_str)
    } else if args.verbose {
        Level::DEBUG
    } else if args.quiet {
        Level::ERROR
    } else {
        let level_str = env::var("LOCALBOX_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        level_or_info(&level_str)
    };

    let config = if args.verbose {
        LoggingConfig::debugging()
    } else {
        LoggingConfig::with_level(level)
    };

    init_logging(config.json(args.log_json));
}

fn level_or_info(level_str: &str) -> Level {
    parse_level(level_str).unwrap_or_else(|| {
        eprintln!(
            "Invalid log level '{}', defaulting to INFO. Valid levels: trace, debug, info, warn, error",
            level_str
        );
        Level::INFO
    })
}
