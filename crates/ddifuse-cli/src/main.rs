#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use output::OutputMode;
use std::env;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "ddifuse: evidence fusion for drug-pair interaction context",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    const fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Fuse a recorded evidence bundle into prompt blocks",
        after_help = "EXAMPLES:\n    # Doctor-mode blocks for the pair recorded in the bundle\n    ddifuse fuse --input bundle.json --mode doctor\n\n    # Full context as JSON, bypassing the cache\n    ddifuse fuse --input bundle.json --context --no-cache --json"
    )]
    Fuse(cmd::fuse::FuseArgs),

    #[command(
        about = "Print the context cache key for a drug pair",
        after_help = "EXAMPLES:\n    ddifuse key warfarin fluconazole"
    )]
    Key(cmd::key::KeyArgs),

    #[command(
        about = "Resolve a free-text drug name against a bundle's drug index",
        after_help = "EXAMPLES:\n    ddifuse resolve --input bundle.json \"Warfarin Sodium\"\n\n    # Try a known synonym as well\n    ddifuse resolve -i bundle.json coumadin --synonym warfarin --json"
    )]
    Resolve(cmd::resolve::ResolveArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("DDIFUSE_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "ddifuse=debug,info"
        } else {
            "ddifuse=info,warn"
        })
    });

    let format = env::var("DDIFUSE_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry.with(fmt::layer().compact().with_writer(std::io::stderr)).init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let project_root = env::current_dir()?;
    let output = cli.output_mode();

    match cli.command {
        Commands::Fuse(ref args) => cmd::fuse::run_fuse(args, output, &project_root),
        Commands::Key(ref args) => cmd::key::run_key(args, output, &project_root),
        Commands::Resolve(ref args) => cmd::resolve::run_resolve(args, output, &project_root),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn json_flag_parses_after_subcommand() {
        let cli = Cli::parse_from(["ddifuse", "key", "a", "b", "--json"]);
        assert_eq!(cli.output_mode(), OutputMode::Json);
        assert!(matches!(cli.command, Commands::Key(ref k) if k.drug_a == "a" && k.drug_b == "b"));
    }

    #[test]
    fn fuse_defaults_to_patient_mode_with_cache() {
        let cli = Cli::parse_from(["ddifuse", "fuse", "--input", "bundle.json"]);
        let Commands::Fuse(args) = cli.command else {
            panic!("expected fuse");
        };
        assert_eq!(args.mode, "patient");
        assert!(!args.no_cache);
        assert!(args.drug_a.is_none());
    }

    #[test]
    fn drug_flags_must_come_together() {
        let err = Cli::try_parse_from(["ddifuse", "fuse", "-i", "b.json", "--drug-a", "x"]);
        assert!(err.is_err());
    }

    #[test]
    fn refresh_conflicts_with_no_cache() {
        let err = Cli::try_parse_from(["ddifuse", "fuse", "-i", "b.json", "--no-cache", "--refresh"]);
        assert!(err.is_err());
    }

    #[test]
    fn resolve_collects_repeated_synonyms() {
        let cli = Cli::parse_from([
            "ddifuse", "resolve", "-i", "b.json", "coumadin", "--synonym", "warfarin", "--synonym", "jantoven",
        ]);
        let Commands::Resolve(args) = cli.command else {
            panic!("expected resolve");
        };
        assert_eq!(args.name, "coumadin");
        assert_eq!(args.synonyms, vec!["warfarin", "jantoven"]);
    }
}
