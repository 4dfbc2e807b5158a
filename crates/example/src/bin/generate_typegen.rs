//! Generates the typegen file for the example blog schema.
//!
//! Usage: `generate-typegen [OUT_FILE]` (default: `generated/typegen.ts`).
//! Set `RUST_LOG=backing_typegen=debug` to see every resolution decision.

use std::env;
use std::fs;
use std::process::ExitCode;
use std::sync::Arc;

use backing_typegen::{SchemaMetadataStore, TypegenMetadata};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use typegen_example::{blog_schema, fixtures_dir, output_path, typegen_config};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Typegen failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let out_file = output_path(env::args().nth(1).as_deref())?;

    let fixtures = fixtures_dir();
    let schema = blog_schema(&fixtures)?;
    let store = Arc::new(SchemaMetadataStore::new());
    let config = store.attach(&schema, typegen_config(&fixtures, &out_file))?;

    let metadata = TypegenMetadata::with_fs(Arc::clone(&schema), store);
    let info = metadata.get_typegen_info(None).await?;
    for binding in info.unresolved() {
        info!(type_name = %binding.schema_type_name, "No backing type found");
    }
    let code = metadata.print_typegen(None).await?;

    if !config.outputs_enabled {
        println!("{code}");
        return Ok(());
    }
    if let Some(parent) = out_file.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&out_file, code)?;
    info!(path = %out_file.display(), "Wrote typegen file");
    Ok(())
}
