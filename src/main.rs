//! Adcraft - ad creative renderer.

mod adapters;
mod cassette;
mod catalog;
mod cli;
mod compositor;
mod config;
mod context;
mod error;
mod fanout;
mod imaging;
mod model;
mod ports;
mod sink;

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::catalog::resolve_template;
use crate::cli::{Cli, Command, ComposeArgs, VariantsArgs};
use crate::compositor::{CompositionRequest, CompositionStatus, Compositor, CompositorConfig};
use crate::config::Config;
use crate::context::{ServiceContext, Storage};
use crate::error::AdError;
use crate::fanout::{VariantPipeline, VariantRequest};
use crate::imaging::OutputFormat;
use crate::model::{detect_provider, resolve_model};
use crate::sink::{auto_filename, AssetSink, Destinations, LocalTarget};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "adcraft=debug" } else { "adcraft=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

async fn run(cli: Cli) -> Result<(), AdError> {
    let config_path = config::discover_config_path(cli.config.as_deref());
    let config = Config::load(&config_path).map_err(AdError::Config)?;

    match cli.command {
        Command::Variants(args) => variants(args, &config).await,
        Command::Compose(args) => compose(args, &config).await,
    }
}

async fn variants(args: VariantsArgs, config: &Config) -> Result<(), AdError> {
    let catalog = config.platform_catalog().map_err(AdError::Config)?;
    let storage = Storage::live(config)?;
    let sink = Arc::new(AssetSink::new(Some(Arc::clone(&storage.store)), &config.storage));
    let pipeline = VariantPipeline::new(storage.source, sink, Arc::new(catalog), config.render.clone());

    let request = VariantRequest {
        source: args.source,
        platforms: args.platforms,
        destinations: Destinations {
            local: args.out_dir.map(LocalTarget::Dir),
            object_store: args.upload,
            inline: args.inline,
            batch: batch_id(),
        },
    };
    let report = pipeline.run(&request).await?;
    print_json(&report)
}

async fn compose(args: ComposeArgs, config: &Config) -> Result<(), AdError> {
    let instruction = args.resolve_prompt()?;
    let model = resolve_model(args.model.as_deref().unwrap_or(&config.generation.model));
    let provider = detect_provider(&model).map_err(AdError::Validation)?;
    info!(%model, %provider, "composing");

    let (template_locator, placeholder) = match (&args.template_ref, &args.template, args.placeholder) {
        (Some(reference), _, _) => {
            let entry = resolve_template(&config.templates, reference).map_err(AdError::Validation)?;
            (entry.url.clone(), entry.placeholder())
        }
        (None, Some(template), Some(placeholder)) => (template.clone(), placeholder),
        _ => {
            return Err(AdError::Validation(
                "Provide --template with --placeholder, or --template-ref".to_string(),
            ))
        }
    };

    let (ctx, recording) = ServiceContext::from_env(provider, config, &args.product)?;
    let product = ctx.storage.source.fetch(&args.product).await?;
    let template = ctx.storage.source.fetch(&template_locator).await?;

    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(auto_filename(&args.product, OutputFormat::Png)));
    let destinations = Destinations {
        local: Some(LocalTarget::File(output)),
        object_store: args.upload,
        inline: true,
        batch: batch_id(),
    };

    let sink = Arc::new(AssetSink::new(Some(Arc::clone(&ctx.storage.store)), &config.storage));
    let compositor = Compositor::new(
        Arc::clone(&ctx.generator),
        sink,
        CompositorConfig { model, timeout: config.generation.timeout() },
    );
    let request = CompositionRequest { product, template, placeholder, instruction };
    let result = compositor.compose(&request, &destinations).await;

    // The recorder is shared with the generator; release it before finishing.
    drop(compositor);
    drop(ctx);
    if let Some(session) = recording {
        match session.finish() {
            Ok(path) => info!(path = %path.display(), "cassette saved"),
            Err(e) => warn!("failed to save cassette: {e}"),
        }
    }

    let result = result?;
    if let Some(rendered) = &result.rendered {
        let written = result.destinations.iter().filter(|d| d.is_ok()).count();
        info!(
            status = ?result.status,
            format = rendered.format.extension(),
            bytes = rendered.bytes.len(),
            written,
            of = result.destinations.len(),
            "creative ready"
        );
    }
    print_json(&result)?;
    if result.status == CompositionStatus::Failed {
        return Err(AdError::Generation("Composition failed; no image was produced".to_string()));
    }
    Ok(())
}

/// Groups the uploads of one invocation under a common key segment.
fn batch_id() -> String {
    chrono::Utc::now().format("%Y%m%dT%H%M%S").to_string()
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AdError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| AdError::Encode(format!("Report: {e}")))?;
    println!("{json}");
    Ok(())
}
