use anyhow::Context;
use cdn_origin::cancel::Cancellation;
use cdn_origin::config::Config;
use cdn_origin::origin::{RequestResolver, ResolvedFile};
use clap::Parser;
use serde_json::json;
use std::path::PathBuf;
use tracing::Instrument;

/// cdn-origin - resolve request paths the way the origin would serve them
#[derive(Parser, Debug)]
#[command(name = "cdn-origin")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override origin.data_root from the configuration
    #[arg(long)]
    data_root: Option<PathBuf>,

    /// Accept-Encoding value used for negotiation
    #[arg(long, default_value = "")]
    accept_encoding: String,

    /// Test configuration and exit
    #[arg(long)]
    test: bool,

    /// Request paths to resolve
    paths: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(root) = args.data_root {
        config.origin.data_root = root;
    }
    config.validate().context("Invalid configuration")?;

    cdn_origin::logging::init_subscriber(&config.logging)
        .context("Failed to initialize logging subsystem")?;

    tracing::info!(
        data_root = %config.origin.data_root.display(),
        cache_backend = %config.cache.backend,
        compression = config.compression.enabled,
        "Configuration loaded successfully"
    );
    if args.test {
        println!("configuration OK");
        return Ok(());
    }

    let resolver = RequestResolver::from_config(&config).context("Failed to build cache")?;
    let cancel = Cancellation::never();

    for path in &args.paths {
        let outcome = resolver
            .serve(path, &args.accept_encoding, &cancel)
            .instrument(cdn_origin::logging::request_span(path))
            .await;
        let summary = match outcome {
            Ok(Some(resolved)) => summarize(path, &resolved),
            Ok(None) => json!({ "path": path, "result": "not_found" }),
            Err(e) => json!({ "path": path, "result": "error", "error": e.to_string() }),
        };
        println!("{}", serde_json::to_string(&summary)?);
    }

    let stats = resolver.cache().stats().await;
    tracing::info!(
        hits = stats.hits,
        misses = stats.misses,
        items = stats.current_item_count,
        "Cache statistics"
    );
    resolver.cache().shutdown().await;
    Ok(())
}

fn summarize(path: &str, resolved: &ResolvedFile) -> serde_json::Value {
    match resolved {
        ResolvedFile::Regular(entry) => json!({
            "path": path,
            "result": "regular",
            "content_type": entry.mime_type.media_type(),
            "content_encoding": entry.compression.wire_name(),
            "content_length": entry.content.len(),
            "uncompressed_size": entry.uncompressed_size,
            "last_modified": entry.last_modified.to_rfc3339(),
        }),
        ResolvedFile::Streamed(file) => json!({
            "path": path,
            "result": "streamed",
            "file": file.path.display().to_string(),
            "content_type": file.mime_type.media_type(),
            "content_encoding": file.compression.wire_name(),
            "content_length": file.size,
            "last_modified": file.last_modified.to_rfc3339(),
        }),
        ResolvedFile::Redirect {
            location,
            permanent,
        } => json!({
            "path": path,
            "result": "redirect",
            "location": location,
            "permanent": permanent,
        }),
    }
}
