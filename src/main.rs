use clap::{Parser, Subcommand, ValueEnum};
use log::{error, LevelFilter};
use std::path::PathBuf;
use std::process::ExitCode;
use zeptoblog::build::compile;
use zeptoblog::config::Config;
use zeptoblog::format::FormatRegistry;
use zeptoblog::generator::GeneratorRegistry;

#[derive(Parser)]
#[command(name = "zeptoblog")]
#[command(about = "A minimal static blog compiler")]
#[command(version)]
struct Cli {
    /// Logging level (overridden by RUST_LOG)
    #[arg(long, value_enum, default_value_t = Verbosity::Info, global = true)]
    verbose: Verbosity,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run generators, parse posts, and render the blog
    Compile {
        /// The project file; defaults to the nearest zeptoblog.yaml
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// List the available post formats
    Formats,
    /// List the available generators
    Generators,
}

#[derive(Clone, Copy, ValueEnum)]
enum Verbosity {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<Verbosity> for LevelFilter {
    fn from(verbosity: Verbosity) -> LevelFilter {
        match verbosity {
            Verbosity::Error => LevelFilter::Error,
            Verbosity::Warn => LevelFilter::Warn,
            Verbosity::Info => LevelFilter::Info,
            Verbosity::Debug => LevelFilter::Debug,
            Verbosity::Trace => LevelFilter::Trace,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.verbose.into())
        .parse_default_env()
        .init();

    match cli.command {
        Command::Compile { config } => run_compile(config),
        Command::Formats => {
            for format in FormatRegistry::with_defaults().available() {
                println!("{} : {}", format.name(), format.description());
            }
            ExitCode::SUCCESS
        }
        Command::Generators => {
            let formats = std::rc::Rc::new(FormatRegistry::with_defaults());
            for generator in GeneratorRegistry::with_defaults(formats).available() {
                println!("{} : {}", generator.name(), generator.description());
            }
            ExitCode::SUCCESS
        }
    }
}

fn run_compile(config: Option<PathBuf>) -> ExitCode {
    let loaded = match config {
        Some(path) => Config::from_project_file(&path),
        None => std::env::current_dir()
            .map_err(anyhow::Error::from)
            .and_then(|dir| Config::from_directory(&dir)),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match compile(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(errors) => {
            for e in &errors {
                error!("{}", e);
            }
            error!("{} error(s)", errors.len());
            ExitCode::FAILURE
        }
    }
}
