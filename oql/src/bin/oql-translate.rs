//! Translate one prompt from the command line and print the result.

use std::process::ExitCode;
use std::sync::Arc;

use tracing::error;

use oql::cache::LruResultCache;
use oql::catalog::{EntitySchemaCatalog, HttpSchemaSource};
use oql::config::TranslatorConfig;
use oql::llm::create_provider;
use oql::resolver::HttpEntitySearch;
use oql::Translator;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let Some(prompt) = std::env::args().nth(1) else {
        eprintln!("usage: oql-translate <prompt>");
        return ExitCode::from(2);
    };

    let config = TranslatorConfig::from_env();

    let catalog = EntitySchemaCatalog::new(HttpSchemaSource::new(&config.api_base_url));
    let registry = match catalog.load().await {
        Ok(registry) => registry,
        Err(e) => {
            error!(error = %e, "failed to load the entity schema catalog");
            return ExitCode::FAILURE;
        }
    };

    let provider = match create_provider(&config.llm) {
        Ok(provider) => provider,
        Err(e) => {
            error!(error = %e, "failed to build the language collaborator");
            return ExitCode::FAILURE;
        }
    };
    let search = Arc::new(HttpEntitySearch::new(&config.api_base_url));
    let translator = Translator::new(
        registry,
        provider,
        search,
        Arc::new(LruResultCache::new(config.cache_capacity)),
        &config,
    );

    match translator.translate(&prompt).await {
        Ok(result) => match serde_json::to_string_pretty(&result) {
            Ok(rendered) => {
                println!("{rendered}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!(error = %e, "failed to render the result");
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            error!(error = %e, "translation failed");
            ExitCode::FAILURE
        }
    }
}
