mod archive;
mod commands;
mod errors;
mod judge;
mod languages;
mod runner;
mod settings;
mod store;
mod tester;
mod text;

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands::App;

#[derive(Parser)]
#[command(
    name = "ojx",
    version,
    about = "Build, test and submit competitive-programming solutions from one place"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile and run the source file here (stdin stays interactive)
    #[command(visible_alias = "r")]
    Run {
        /// Language to run as
        #[arg(short, long)]
        language: Option<String>,
    },
    /// Test the source against a problem's sample cases
    #[command(visible_alias = "t")]
    Test {
        /// Problem ID in the local store
        problem_id: String,
        /// Language to test in
        #[arg(short, long)]
        language: Option<String>,
        /// Run only this sample case (1-indexed)
        #[arg(short, long)]
        case: Option<usize>,
    },
    /// Download the sample cases behind a problem or contest URL
    #[command(visible_alias = "f")]
    Fetch {
        /// Problem or problem-set page URL
        url: String,
    },
    /// Submit the source file here
    #[command(visible_alias = "s")]
    Submit {
        /// Problem ID in the local store
        problem_id: String,
        /// Language to submit as
        #[arg(short, long)]
        language: Option<String>,
    },
    /// Show a stored problem, or list all of them
    #[command(visible_alias = "v")]
    View {
        /// Problem ID; omit to list everything
        problem_id: Option<String>,
    },
    /// Print the source after the configured processing command
    #[command(visible_alias = "p")]
    Process {
        /// Language whose source to process
        #[arg(short, long)]
        language: Option<String>,
    },
    /// Watch every submission of a Codeforces contest until judging settles
    CfSubmissions {
        /// Contest ID, e.g. 1038
        contest_id: u32,
    },
}

async fn dispatch(cli: Cli) -> Result<()> {
    let mut app = App::init()?;
    match cli.command {
        Command::Run { language } => app.run(language.as_deref()).await,
        Command::Test {
            problem_id,
            language,
            case,
        } => app.test(&problem_id, language.as_deref(), case).await,
        Command::Fetch { url } => app.fetch(&url).await,
        Command::Submit {
            problem_id,
            language,
        } => app.submit(&problem_id, language.as_deref()).await,
        Command::View { problem_id } => app.view(problem_id.as_deref()),
        Command::Process { language } => app.process(language.as_deref()).await,
        Command::CfSubmissions { contest_id } => app.cf_submissions(contest_id).await,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let filter = tracing_subscriber::EnvFilter::from_default_env();
    let filter = match "ojx=info".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    match dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
