//! Command handlers. Each returns the process exit code.

use super::commands::{CatalogArgs, DeleteArgs, ListArgs, ModelsDirArg, ProfileArgs, SetupArgs};
use super::output::{OutputFormat, OutputFormatter};
use crate::backend::{
    HardwareProfiler, InstalledModels, ModelCatalog, ModelSpec, SupervisedProcess,
};
use crate::config::LocalboxConfig;
use crate::progress::{LoggingHandler, ProgressHandler, TerminalHandler};
use crate::provider::ProviderKind;
use crate::session::{LocalSetup, SetupError};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

fn load_config(dir: &ModelsDirArg) -> Result<LocalboxConfig, i32> {
    let mut config = LocalboxConfig::default();
    if let Some(models_dir) = &dir.models_dir {
        config = config.with_models_dir(models_dir.clone());
    }

    config.validate().map_err(|e| {
        eprintln!("Error: {}", e);
        1
    })?;
    Ok(config)
}

fn print_formatted(result: anyhow::Result<String>) -> i32 {
    match result {
        Ok(output) => {
            print!("{}", output);
            0
        }
        Err(e) => {
            error!("Failed to format output: {:#}", e);
            eprintln!("Error: {:#}", e);
            1
        }
    }
}

fn report(err: &SetupError) {
    if matches!(err, SetupError::UserAborted) {
        debug!("Setup aborted by user");
        return;
    }

    eprintln!("Error: {}", err);
    if let Some(help) = err.help_message() {
        eprintln!("\n{}", help);
    }
}

pub async fn handle_setup(args: &SetupArgs, quiet: bool) -> i32 {
    let mut config = match load_config(&args.dir) {
        Ok(config) => config,
        Err(code) => return code,
    };
    if let Some(timeout) = args.timeout {
        config = config.with_ready_timeout_secs(timeout);
        if let Err(e) = config.validate() {
            eprintln!("Error: {}", e);
            return 1;
        }
    }

    let progress: Arc<dyn ProgressHandler> = if quiet {
        Arc::new(LoggingHandler)
    } else {
        Arc::new(TerminalHandler::new())
    };
    let setup = LocalSetup::new(config).with_progress(progress);

    let mut provider = match args.provider {
        Some(kind) => kind.into_provider(args.model.clone()),
        None => match setup.select_provider(&[]) {
            Ok(selected) => selected.kind().into_provider(args.model.clone()),
            Err(e) => {
                report(&e);
                return e.exit_code();
            }
        },
    };

    let outcome = loop {
        match setup.run(provider.clone()).await {
            Ok(outcome) => break outcome,
            Err(e @ SetupError::NoViableModel { .. }) if provider.kind().is_artifact_based() => {
                report(&e);
                provider = match setup.select_provider(&[ProviderKind::Llamafile]) {
                    Ok(alternative) => alternative,
                    Err(e) => {
                        report(&e);
                        return e.exit_code();
                    }
                };
            }
            Err(e) => {
                report(&e);
                return e.exit_code();
            }
        }
    };

    let code = print_formatted(
        OutputFormatter::new(OutputFormat::from(args.format)).format_config(&outcome.config),
    );

    if let Some(process) = outcome.process {
        if args.no_wait {
            process.terminate().await;
        } else {
            keep_alive(process).await;
        }
    }

    code
}

/// Hold the backend until Ctrl-C or until it exits on its own
async fn keep_alive(mut process: SupervisedProcess) {
    eprintln!(
        "\nBackend running as pid {}. Press Ctrl-C to stop it.",
        process.pid()
    );

    let exited = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!("Could not listen for Ctrl-C: {}", e);
            }
            false
        }
        status = process.wait() => {
            match status {
                Ok(status) => warn!("Backend exited on its own: {}", status),
                Err(e) => warn!("Lost track of the backend process: {}", e),
            }
            true
        }
    };

    if !exited {
        info!("Stopping backend {}", process.pid());
        process.terminate().await;
    }
}

pub fn handle_models_list(args: &ListArgs) -> i32 {
    let config = match load_config(&args.dir) {
        Ok(config) => config,
        Err(code) => return code,
    };

    match InstalledModels::scan(&config.models_dir) {
        Ok(installed) => print_formatted(
            OutputFormatter::new(OutputFormat::from(args.format)).format_installed(&installed),
        ),
        Err(e) => {
            eprintln!(
                "Error: failed to read {}: {}",
                config.models_dir.display(),
                e
            );
            1
        }
    }
}

pub fn handle_models_delete(args: &DeleteArgs) -> i32 {
    let config = match load_config(&args.dir) {
        Ok(config) => config,
        Err(code) => return code,
    };

    match InstalledModels::remove(&config.models_dir, &args.file_name) {
        Ok(removed) => {
            info!("Deleted {}", removed.local_path.display());
            println!("Deleted {}", removed.file_name);
            0
        }
        Err(e) => {
            eprintln!("Error: could not delete {}: {}", args.file_name, e);
            1
        }
    }
}

pub fn handle_profile(args: &ProfileArgs) -> i32 {
    let config = match load_config(&args.dir) {
        Ok(config) => config,
        Err(code) => return code,
    };

    let profile = HardwareProfiler::profile(&config.models_dir);
    print_formatted(
        OutputFormatter::new(OutputFormat::from(args.format))
            .format_profile(&profile, ModelCatalog::tier_hint(&profile)),
    )
}

pub fn handle_catalog(args: &CatalogArgs) -> i32 {
    let config = match load_config(&args.dir) {
        Ok(config) => config,
        Err(code) => return code,
    };

    let catalog = ModelCatalog::builtin();
    let entries: Vec<&ModelSpec> = if args.all {
        catalog.entries().iter().collect()
    } else {
        let installed = match InstalledModels::scan(&config.models_dir) {
            Ok(installed) => installed,
            Err(e) => {
                eprintln!(
                    "Error: failed to read {}: {}",
                    config.models_dir.display(),
                    e
                );
                return 1;
            }
        };
        let profile = HardwareProfiler::profile(&config.models_dir);
        catalog.recommend(&profile, &installed.file_names())
    };

    print_formatted(OutputFormatter::new(OutputFormat::from(args.format)).format_catalog(&entries))
}
