//! CLI argument parsing with clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::catalog::Placeholder;

/// Ad creative renderer: platform variants and product-into-template composition.
#[derive(Parser, Debug)]
#[command(name = "adcraft", version, about)]
pub struct Cli {
    /// Config file path override.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Debug logging on stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// What to render.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Crop and resize one source image into every size of the given platforms.
    Variants(VariantsArgs),
    /// Place a product image into an ad template.
    Compose(ComposeArgs),
}

/// Arguments for `variants`.
#[derive(Args, Debug)]
pub struct VariantsArgs {
    /// Source image locator (local path, `s3://`, or URL).
    pub source: String,

    /// Target platform; repeatable.
    #[arg(short, long = "platform", required = true)]
    pub platforms: Vec<String>,

    /// Write variants into this directory.
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Upload variants to the configured bucket.
    #[arg(long)]
    pub upload: bool,

    /// Include base64 data URLs in the report.
    #[arg(long)]
    pub inline: bool,
}

/// Arguments for `compose`.
#[derive(Args, Debug)]
pub struct ComposeArgs {
    /// Product image locator.
    #[arg(long)]
    pub product: String,

    /// Template image locator.
    #[arg(long, requires = "placeholder", conflicts_with = "template_ref")]
    pub template: Option<String>,

    /// Placeholder rectangle as `LEFT,TOP,RIGHT,BOTTOM`.
    #[arg(long, value_parser = parse_placeholder, requires = "template")]
    pub placeholder: Option<Placeholder>,

    /// Configured template as `PLATFORM/WxH/VERSION`.
    #[arg(long, conflicts_with_all = ["template", "placeholder"])]
    pub template_ref: Option<String>,

    /// Custom instruction for the generator.
    #[arg(long, conflicts_with = "prompt_file")]
    pub prompt: Option<String>,

    /// File containing the instruction.
    #[arg(long, conflicts_with = "prompt")]
    pub prompt_file: Option<PathBuf>,

    /// Model name or short alias; defaults to the configured model.
    #[arg(short, long)]
    pub model: Option<String>,

    /// Output file path (auto-generated if not specified).
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Also upload the result to the configured bucket.
    #[arg(long)]
    pub upload: bool,
}

impl ComposeArgs {
    /// The custom instruction, if one was given inline or by file.
    ///
    /// # Errors
    ///
    /// Returns an error if the prompt file cannot be read.
    pub fn resolve_prompt(&self) -> Result<Option<String>, std::io::Error> {
        if let Some(text) = &self.prompt {
            Ok(Some(text.clone()))
        } else if let Some(path) = &self.prompt_file {
            std::fs::read_to_string(path).map(|s| Some(s.trim().to_string()))
        } else {
            Ok(None)
        }
    }
}

fn parse_placeholder(s: &str) -> Result<Placeholder, String> {
    s.parse()
}
