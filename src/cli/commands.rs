use crate::provider::ProviderKind;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Set up a local LLM backend for applications that speak the OpenAI API
#[derive(Parser, Debug)]
#[command(
    name = "localbox",
    about = "Set up a local LLM backend instead of a cloud API",
    version,
    author,
    long_about = "localbox profiles this machine, recommends llamafile models that fit on it, \
                  downloads and launches them, and prints the client configuration to use. \
                  It also configures Ollama, LM Studio and Jan backends."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,

    #[arg(long, global = true, help = "Emit logs as JSON lines")]
    pub log_json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Configure a local backend",
        long_about = "Selects a provider, prepares its backend and prints the resulting client \
                      configuration. For llamafiles the backend keeps running until Ctrl-C.\n\n\
                      Examples:\n  \
                      localbox setup\n  \
                      localbox setup --provider llamafile\n  \
                      localbox setup --provider ollama --model llama3 --format json\n  \
                      localbox setup --provider jan --model mistral-ins-7b-q4"
    )]
    Setup(SetupArgs),

    #[command(about = "Manage downloaded llamafiles")]
    Models {
        #[command(subcommand)]
        command: ModelsCommand,
    },

    #[command(
        about = "Show this machine's memory and free disk",
        long_about = "Prints the hardware profile used for model recommendations, with \
                      guidance on which model sizes suit this machine."
    )]
    Profile(ProfileArgs),

    #[command(
        about = "List catalog models",
        long_about = "Lists llamafile models that can be downloaded on this machine. Models \
                      already installed or larger than the free disk space are left out unless \
                      --all is given.\n\n\
                      Examples:\n  \
                      localbox catalog\n  \
                      localbox catalog --all --format yaml"
    )]
    Catalog(CatalogArgs),
}

#[derive(Subcommand, Debug)]
pub enum ModelsCommand {
    #[command(about = "List downloaded llamafiles")]
    List(ListArgs),

    #[command(about = "Delete a downloaded llamafile")]
    Delete(DeleteArgs),
}

/// Options shared by commands that touch the models directory
#[derive(Args, Debug, Clone, Default)]
pub struct ModelsDirArg {
    #[arg(
        long,
        value_name = "DIR",
        help = "Models directory (overrides LOCALBOX_MODELS_DIR)"
    )]
    pub models_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct SetupArgs {
    #[arg(
        short = 'p',
        long,
        value_enum,
        help = "Provider to configure (asked interactively when omitted)"
    )]
    pub provider: Option<ProviderKind>,

    #[arg(
        short = 'm',
        long,
        value_name = "MODEL",
        help = "Model to use: llamafile file or catalog name, Ollama model or Jan model id"
    )]
    pub model: Option<String>,

    #[command(flatten)]
    pub dir: ModelsDirArg,

    #[arg(
        long,
        value_name = "SECONDS",
        help = "Seconds to wait for a launched model to become ready (overrides LOCALBOX_READY_TIMEOUT)"
    )]
    pub timeout: Option<u64>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,

    #[arg(long, help = "Exit after printing the configuration, stopping a launched backend")]
    pub no_wait: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    #[command(flatten)]
    pub dir: ModelsDirArg,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    #[arg(value_name = "FILE", help = "File name of the llamafile to delete")]
    pub file_name: String,

    #[command(flatten)]
    pub dir: ModelsDirArg,
}

#[derive(Args, Debug, Clone)]
pub struct ProfileArgs {
    #[command(flatten)]
    pub dir: ModelsDirArg,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(Args, Debug, Clone)]
pub struct CatalogArgs {
    #[command(flatten)]
    pub dir: ModelsDirArg,

    #[arg(long, help = "Show every catalog entry, not just downloadable ones")]
    pub all: bool,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Yaml,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Yaml => super::output::OutputFormat::Yaml,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}
