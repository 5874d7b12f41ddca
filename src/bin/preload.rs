//! Preload CLI - eagerly load a project's source files.

use std::path::PathBuf;

use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use preload::errors::{exit_code, PreloadError};
use preload::filter::DEFAULT_EXTENSION;
use preload::loader::{CommandLoader, FileLoader, NoopLoader, ReadLoader};
use preload::report::{format_report, OutputFormat};
use preload::{PreloadOptions, Preloader};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "preload")]
#[command(about = "Warm up an interpreter's source cache by loading project files")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load every matching file and print what was included
    Run {
        #[command(flatten)]
        common: CommonArgs,

        /// Hand each file to this command, e.g. "php -l"
        #[arg(long, value_name = "COMMAND", value_parser = CommandLoader::parse)]
        exec: Option<CommandLoader>,
    },

    /// Show which files would be loaded, without loading them
    List {
        #[command(flatten)]
        common: CommonArgs,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// Files or directories to preload
    paths: Vec<PathBuf>,

    /// Skip files whose path starts with this prefix (must exist)
    #[arg(short, long = "ignore", value_name = "PATH")]
    ignores: Vec<PathBuf>,

    /// Source file extension to load
    #[arg(long, default_value = DEFAULT_EXTENSION)]
    extension: String,

    /// Class map to read extra roots from [default: vendor/composer/autoload_classmap.php]
    #[arg(long, value_name = "FILE", conflicts_with = "no_class_map")]
    class_map: Option<PathBuf>,

    /// Do not read a class map
    #[arg(long)]
    no_class_map: bool,

    /// Visit directory entries in name order
    #[arg(long)]
    sort: bool,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

impl CommonArgs {
    fn options(&self) -> PreloadOptions {
        let mut options = PreloadOptions::default()
            .extension(self.extension.clone())
            .sort_entries(self.sort);
        if self.no_class_map {
            options = options.no_class_map();
        } else if let Some(path) = &self.class_map {
            options = options.class_map(path.clone());
        }
        options
    }

    fn format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let json_output = json_flag(&cli.command);

    let result = match cli.command {
        Commands::Run { common, exec } => {
            let loader: Box<dyn FileLoader> = match exec {
                Some(command) => Box::new(command),
                None => Box::new(ReadLoader::new()),
            };
            run_preload(common, loader)
        }
        Commands::List { common } => run_preload(common, NoopLoader),
        Commands::Completions { shell } => {
            generate(shell, &mut Cli::command(), "preload", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        if json_output {
            #[derive(Serialize)]
            struct ErrorOutput {
                error: String,
            }

            let payload = ErrorOutput {
                error: e.to_string(),
            };

            let json = serde_json::to_string(&payload)
                .unwrap_or_else(|_| "{\"error\":\"serialization failed\"}".to_string());
            eprintln!("{json}");
        } else {
            eprintln!("error: {}", e);
        }
        std::process::exit(exit_code(&e));
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_target(false)
        .format_timestamp(None)
        .init();
}

fn json_flag(cmd: &Commands) -> bool {
    match cmd {
        Commands::Run { common, .. } => common.json,
        Commands::List { common } => common.json,
        Commands::Completions { .. } => false,
    }
}

// --- Run / List commands ---

fn run_preload<L: FileLoader>(common: CommonArgs, loader: L) -> Result<(), PreloadError> {
    let preloader = Preloader::with_options(loader, common.paths.clone(), common.options())?;
    if preloader.roots().is_empty() {
        return Err(PreloadError::NoPaths);
    }

    let mut preloader = preloader.ignore(common.ignores.clone());
    preloader.load();

    let output = format_report(&preloader.report(), common.format())?;
    print!("{}", output);

    Ok(())
}
