use std::process::ExitCode;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use embert::core::device::print_device_info;
use embert::core::utils::embedding_head;
use embert::SentenceTransformer;

/// Sentences timed by the benchmark, in print order.
const SENTENCES: [&str; 3] = [
    "This is a test sentence.",
    "Let's see how fast we can generate embeddings.",
    "Performance testing is crucial for optimization.",
];

/// Time embedding generation for a fixed set of sentences.
#[derive(Debug, Parser)]
struct App {
    /// Hugging Face model repository, optionally `repo:revision`.
    #[clap(short, long, default_value = "sentence-transformers/all-MiniLM-L6-v2")]
    model_repo: String,
}

fn main() -> Result<ExitCode> {
    let args = App::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "embert=info,bench=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    print_device_info();

    // Load once and reuse: model setup dwarfs per-sentence inference.
    let encoder = SentenceTransformer::from_repo_string(&args.model_repo)?;

    let start = Instant::now();

    for sentence in SENTENCES {
        let embedding = encoder.encode(sentence, true)?;

        println!("Sentence: {sentence}");
        println!("Embedding: {:?}...", embedding_head(&embedding, 5));
    }

    let elapsed = start.elapsed();
    println!(
        "Total time taken for embedding {} sentences: {} seconds",
        SENTENCES.len(),
        elapsed.as_secs_f64()
    );

    Ok(ExitCode::SUCCESS)
}
