use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use embert::core::device::print_device_info;
use embert::export::export_onnx;
use embert::ModelRepo;

/// Convert a pretrained sentence-transformer to a portable ONNX artifact.
#[derive(Debug, Parser)]
struct App {
    /// Hugging Face model repository, optionally `repo:revision`.
    #[clap(short, long, default_value = "sentence-transformers/all-MiniLM-L6-v2")]
    model_repo: String,

    /// Destination file for the exported graph and weights.
    #[clap(short, long, default_value = "sentence_transformer.onnx")]
    output: PathBuf,
}

fn main() -> Result<ExitCode> {
    let args = App::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "embert=info,export=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    print_device_info();

    let repo = ModelRepo::from_repo_string(&args.model_repo)?;
    let report = export_onnx(&repo, &args.output)?;

    tracing::debug!(
        nodes = report.nodes,
        initializers = report.initializers,
        bytes = report.bytes,
        "export finished"
    );
    println!(
        "Model has been converted to ONNX and saved as '{}'",
        args.output.display()
    );

    Ok(ExitCode::SUCCESS)
}
