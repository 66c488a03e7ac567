//! octagnosis CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use octagnosis_core::model::{AgeRange, Gender};

mod commands;

#[derive(Parser)]
#[command(name = "octagnosis", version, about = "Paginated personality quiz")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Take a quiz interactively, one answer per line
    Take {
        /// Gender: male or female
        #[arg(long)]
        gender: Gender,

        /// Age range: under18, 19-25, 26-50, over51
        #[arg(long)]
        age_range: AgeRange,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,

        /// Save the result as JSON to this path
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Fetch the stored result of a submitted attempt
    Result {
        /// Attempt id (UUID v4)
        #[arg(long)]
        attempt_id: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format: text, json, markdown
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Score an answer sheet against a question bank locally
    Score {
        /// Question bank TOML file
        #[arg(long)]
        bank: PathBuf,

        /// Answer sheet TOML file
        #[arg(long)]
        answers: PathBuf,

        /// Output format: text, json, markdown
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Validate a question bank TOML file
    Validate {
        /// Path to the question bank
        #[arg(long)]
        bank: PathBuf,
    },

    /// Create starter config and sample question bank
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("octagnosis=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Take {
            gender,
            age_range,
            config,
            output,
        } => commands::take::execute(gender, age_range, config, output).await,
        Commands::Result {
            attempt_id,
            config,
            format,
        } => commands::result::execute(attempt_id, config, format).await,
        Commands::Score {
            bank,
            answers,
            format,
        } => commands::score::execute(bank, answers, format),
        Commands::Validate { bank } => commands::validate::execute(bank),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
