// src/bin/quizly-cli.rs

use std::io::{self, BufRead, Write};

use clap::Parser;
use quizly::{
    config::{PipelineConfig, TRANSCRIPT_PREVIEW_CHARS},
    console::{preview_transcript, run_quiz},
    services::QuizPipeline,
};
use tracing_subscriber::EnvFilter;

/// Turn a YouTube video into a quiz and take it in the terminal.
#[derive(Debug, Parser)]
#[command(name = "quizly-cli", version)]
struct Cli {
    /// YouTube URL; prompted for when omitted
    url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let config = PipelineConfig::from_env()?;
    let pipeline = QuizPipeline::from_config(&config, reqwest::Client::new());

    let url = match cli.url {
        Some(url) => url,
        None => {
            print!("Enter YouTube URL: ");
            io::stdout().flush()?;
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line)?;
            line.trim().to_string()
        }
    };

    println!("Downloading and transcribing...");
    let transcript = pipeline.transcript(&url).await?;

    println!("\nTranscript:\n");
    println!("{}", preview_transcript(&transcript, TRANSCRIPT_PREVIEW_CHARS));

    println!("\nGenerating quiz...");
    let draft = pipeline.generate(&transcript).await?;
    println!(
        "Quiz '{}' with {} questions generated!",
        draft.title,
        draft.questions.len()
    );

    run_quiz(&draft, io::stdin().lock(), io::stdout())?;

    Ok(())
}
