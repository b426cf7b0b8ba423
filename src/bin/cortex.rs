//! Command-line client for the job API.

use clap::{Parser, Subcommand};
use cortex::adapters::client::HttpJobClient;
use cortex::application::polling::PollPolicy;
use cortex::domain::jobs::{JobRecord, JobStatus};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cortex", about = "Submit videos for analysis and fetch their reports")]
struct Cli {
    /// Base URL of the job API
    #[arg(long, env = "CORTEX_URL", default_value = "http://127.0.0.1:8000")]
    server: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload a video and print the job id
    Submit {
        #[arg(long)]
        video: PathBuf,
        #[arg(long, env = "VISION_API_KEY", hide_env_values = true)]
        vision_api_key: Option<String>,
        #[arg(long, env = "SYNTHESIS_API_KEY", hide_env_values = true)]
        synthesis_api_key: Option<String>,
        /// Wait for the job and print the report
        #[arg(long)]
        wait: bool,
        /// Give up waiting after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Print the job record
    Status { job_id: String },
    /// Print the final report
    Report { job_id: String },
}

fn print_record(record: &JobRecord) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(record)?);
    Ok(())
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let client = HttpJobClient::new(cli.server);

    match cli.command {
        Command::Submit {
            video,
            vision_api_key,
            synthesis_api_key,
            wait,
            timeout,
        } => {
            let submission = client
                .submit(
                    &video,
                    vision_api_key.as_deref(),
                    synthesis_api_key.as_deref(),
                )
                .await?;
            println!("{}", serde_json::to_string_pretty(&submission)?);
            if !wait {
                return Ok(());
            }

            let mut policy = PollPolicy::default();
            if let Some(seconds) = timeout {
                policy = policy.with_deadline(Duration::from_secs(seconds));
            }
            let record = client.wait(&submission.job_id, &policy).await?;
            match record.status {
                JobStatus::Success => {
                    for warning in record.result.iter().flat_map(|r| &r.warnings) {
                        eprintln!("warning: {}", warning);
                    }
                    println!("{}", client.report(&record.id).await?);
                }
                _ => {
                    print_record(&record)?;
                    return Err("job failed".into());
                }
            }
        }
        Command::Status { job_id } => print_record(&client.status(&job_id).await?)?,
        Command::Report { job_id } => println!("{}", client.report(&job_id).await?),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
