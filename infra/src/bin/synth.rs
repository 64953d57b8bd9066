use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use upload_classifier_infra::{Stack, StackConfig};

/// Render the upload classifier stack as a CloudFormation template.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[arg(long, default_value = "UploadClassifierStack")]
    stack_name: String,

    /// Account id and region are appended to this prefix
    #[arg(long, default_value = "upload-classifier-bucket")]
    bucket_prefix: String,

    #[arg(long, default_value = "FileProcessorFunction")]
    function_name: String,

    /// Only keys with this suffix trigger the function
    #[arg(long, default_value = ".txt")]
    key_suffix: String,

    /// Keep the bucket's objects (and so the bucket) when the stack is deleted
    #[arg(long)]
    retain_objects: bool,

    /// Write the template here instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,
}

impl Args {
    fn stack_config(&self) -> StackConfig {
        StackConfig {
            stack_name: self.stack_name.clone(),
            bucket_prefix: self.bucket_prefix.clone(),
            function_name: self.function_name.clone(),
            key_suffix: self.key_suffix.clone(),
            auto_delete_objects: !self.retain_objects,
            ..StackConfig::default()
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let stack = Stack::new(args.stack_config());
    let template = serde_json::to_string_pretty(&stack.synth())?;

    match args.output {
        Some(path) => fs::write(&path, template)
            .with_context(|| format!("writing template to {}", path.display()))?,
        None => {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{template}").context("writing template to stdout")?;
        }
    }
    Ok(())
}
