use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use mineral_rag::models::{CollectionKind, Environment};
use mineral_rag::rag::embeddings::build_embedder;
use mineral_rag::rag::retrieval::format_usd;
use mineral_rag::{BulkLoader, Settings, StoreRegistry};

#[derive(Parser, Debug)]
#[command(name = "rag-loader")]
#[command(about = "Seed the mineral, deal and KYC collections")]
struct Args {
    /// Load into the isolated test environment
    #[arg(long)]
    test: bool,

    /// Mineral catalog JSON (production only)
    #[arg(long, env = "MINERAL_RAG_CATALOG")]
    catalog: Option<PathBuf>,

    /// Purge the test environment before loading
    #[arg(long, requires = "test")]
    fresh: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Arc::new(Settings::load()?);
    mineral_rag::init_tracing();

    let args = Args::parse();
    let environment = if args.test { Environment::Test } else { Environment::Production };
    let catalog_path = args.catalog.unwrap_or_else(|| settings.loader.catalog_path.clone());

    println!("Initializing embedder ({:?})...", settings.embedding.provider);
    let embedder = build_embedder(&settings.embedding)?;
    let registry = Arc::new(StoreRegistry::new(settings.clone(), embedder));

    println!("Opening {} store...", environment);
    let store = registry.open_store(environment).await?;

    if args.fresh {
        println!("Purging test environment...");
        registry.purge(Environment::Test).await?;
    }

    let loader = BulkLoader::new(registry.clone(), catalog_path);

    let pb = ProgressBar::new(CollectionKind::ALL.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let report = loader
        .load_all_with(environment, |outcome| {
            pb.set_message(format!("{}", outcome.collection));
            pb.inc(1);
        })
        .await?;

    pb.finish_with_message("done");

    println!("\nLoad complete ({} environment)", environment);
    for outcome in &report.domains {
        match outcome.error {
            None => println!("  {:<9} {} documents", outcome.collection.as_str(), outcome.loaded),
            Some(ref err) => println!("  {:<9} FAILED: {}", outcome.collection.as_str(), err),
        }
    }

    let stats = store.stats().await?;
    println!("\nCollection statistics:");
    println!("  Minerals:       {}", stats.minerals);
    println!("  Deals:          {}", stats.deals);
    println!("  KYC:            {}", stats.kyc);
    println!("  Total vectors:  {}", stats.total_vectors);
    if !environment.is_test() {
        println!("  Deals value:    {}", format_usd(stats.deals_value_usd));
        println!("  Confirmed:      {}", stats.confirmed_deals);
    }

    report.ensure_complete()?;
    Ok(())
}
