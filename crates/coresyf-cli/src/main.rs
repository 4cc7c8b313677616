use clap::{Parser, Subcommand};
use coresyf::{
    commands::{
        config::{self, ConfigAction},
        pack, run, test, validate,
    },
    common::{init_tracing, TraceOutput},
    logger, GlobalOpts,
};

const RUN_LOG_FILE: &str = "coresyf-run.log";

#[derive(Parser)]
#[command(name = "coresyf")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Run, validate, test and package manifest-described tools",
    long_about = "coresyf wraps command-line tools described by a JSON manifest: it parses \
                  their arguments, stages inputs, runs the command and checks outputs. It also \
                  tests a tool bundle's examples and packages the bundle as a zip archive."
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the tool described by a bundle's manifest
    Run(run::RunCommand),
    /// Check a bundle's manifest and show its arguments
    Validate(validate::ValidateCommand),
    /// Run a bundle's examples
    Test(test::TestCommand),
    /// Test a bundle and archive it
    Pack(pack::PackCommand),
    /// Show or change the coresyf configuration
    #[command(subcommand_required = false, arg_required_else_help = false)]
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

fn main() {
    let cli = Cli::parse();
    let is_run = matches!(cli.command, Commands::Run(_));

    // A tool run keeps stderr for failures only
    let output = if is_run {
        TraceOutput::Stdout
    } else {
        TraceOutput::Stderr
    };
    init_tracing(&cli.global, output);

    let verbosity = cli.global.verbosity_level();
    let logger_init = if is_run {
        logger::init_with_file_name(verbosity, RUN_LOG_FILE)
    } else {
        logger::init_with_verbosity(verbosity)
    };
    if let Err(e) = logger_init {
        tracing::warn!("Failed to initialize logger: {}", e);
    }

    let result = match cli.command {
        Commands::Run(cmd) => run::handle_run(cmd, &cli.global),
        Commands::Validate(cmd) => validate::handle_validate(cmd, &cli.global),
        Commands::Test(cmd) => test::handle_test(cmd, &cli.global),
        Commands::Pack(cmd) => pack::handle_pack(cmd, &cli.global),
        Commands::Config { action } => config::handle_config(action, &cli.global),
    };

    if let Err(e) = result {
        logger::error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
