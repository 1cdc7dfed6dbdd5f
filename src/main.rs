// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Context, Result};
use rand::thread_rng;
use redis::aio::ConnectionManager;
use std::env;
use std::path::Path;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{info, warn};

// Use library instead of local modules
use banking_workshop::generator::generate_random_transaction;
use banking_workshop::modules::search;
use banking_workshop::{load_csv, logging, redis_client, status, stream, Config, Processor};

const DEFAULT_GENERATE_COUNT: usize = 100;
const DEFAULT_GENERATE_INTERVAL_MS: u64 = 500;

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let config = Config::from_env();

    match args.get(1).map(String::as_str) {
        None | Some("ui") => run_ui_mode(&config)?,
        Some("process") => run_processor(&config)?,
        Some("generate") => {
            let count = parse_arg(&args, 2, DEFAULT_GENERATE_COUNT)?;
            let interval_ms = parse_arg(&args, 3, DEFAULT_GENERATE_INTERVAL_MS)?;
            run_generate(&config, count, interval_ms)?;
        }
        Some("import") => {
            let Some(csv_path) = args.get(2) else {
                bail!("Usage: banking-workshop import <file.csv>");
            };
            run_import(&config, Path::new(csv_path))?;
        }
        Some("index") => run_index(&config)?,
        Some("status") => run_status(&config)?,
        Some("help") | Some("--help") | Some("-h") => print_usage(),
        Some(other) => {
            print_usage();
            bail!("Unknown command: {other}");
        }
    }

    Ok(())
}

fn print_usage() {
    println!("🏦 Banking Workshop v{}", banking_workshop::VERSION);
    println!();
    println!("Usage: banking-workshop [command]");
    println!();
    println!("  ui                          Terminal dashboard (default)");
    println!("  process                     Consume the transaction stream");
    println!("  generate [count] [ms]       Publish random transactions");
    println!("  import <file.csv>           Publish transactions from a CSV file");
    println!("  index                       Create the search index");
    println!("  status                      Show which UI sections are unlocked");
}

fn parse_arg<T: std::str::FromStr>(args: &[String], position: usize, default: T) -> Result<T> {
    match args.get(position) {
        Some(raw) => raw
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid argument {position}: {raw:?}")),
        None => Ok(default),
    }
}

fn runtime() -> Result<Runtime> {
    Runtime::new().context("Failed to start async runtime")
}

async fn connect(config: &Config) -> Result<ConnectionManager> {
    Ok(redis_client::connect(&config.redis).await?)
}

fn run_processor(config: &Config) -> Result<()> {
    logging::init_logging("info");

    println!("⚙️  Transaction Processor");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let rt = runtime()?;
    let stats = rt.block_on(async {
        let conn = connect(config).await?;
        let processor = Processor::new(conn, config);

        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl+C: {e}");
                std::future::pending::<()>().await;
            }
        };

        processor.run(shutdown).await.map_err(anyhow::Error::from)
    })?;

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✓ Processed:  {}", stats.processed);
    println!("✓ Duplicates: {}", stats.duplicates);
    println!("✓ Invalid:    {}", stats.invalid);
    if stats.failed > 0 {
        println!("⚠️  Failed (left pending): {}", stats.failed);
    }

    Ok(())
}

fn run_generate(config: &Config, count: usize, interval_ms: u64) -> Result<()> {
    logging::init_logging("info");

    println!("🎲 Generating {count} transactions every {interval_ms}ms");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let rt = runtime()?;
    let published = rt.block_on(async {
        let mut conn = connect(config).await?;
        let mut rng = thread_rng();
        let mut published = 0usize;

        while published < count {
            let tx = generate_random_transaction(&mut rng);
            stream::publish(&mut conn, &config.stream_key, config.stream_maxlen, &tx).await?;
            published += 1;

            info!(
                "{} {:>8.2} {} ({})",
                tx.transaction_id,
                tx.amount,
                tx.merchant_or_unknown(),
                tx.category.as_deref().unwrap_or("-")
            );

            if published < count {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(interval_ms)) => {}
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
        }

        Ok::<_, anyhow::Error>(published)
    })?;

    println!("\n✅ Published {published} transactions to {}", config.stream_key);

    Ok(())
}

fn run_import(config: &Config, csv_path: &Path) -> Result<()> {
    logging::init_logging("info");

    println!("📥 CSV Import → {}", config.stream_key);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // 1. Load CSV
    println!("\n📂 Loading CSV...");
    let transactions = load_csv(csv_path)?;
    println!("✓ Loaded {} transactions from {}", transactions.len(), csv_path.display());

    // 2. Publish
    println!("\n📤 Publishing to stream...");
    let rt = runtime()?;
    let stream_length = rt.block_on(async {
        let mut conn = connect(config).await?;

        for tx in &transactions {
            stream::publish(&mut conn, &config.stream_key, config.stream_maxlen, tx).await?;
        }

        Ok::<_, anyhow::Error>(stream::length(&mut conn, &config.stream_key).await?)
    })?;

    println!("✓ Published {} transactions", transactions.len());
    println!("✓ Stream now holds {stream_length} entries");
    println!("\n💡 Run `banking-workshop process` to process them.");

    Ok(())
}

fn run_index(config: &Config) -> Result<()> {
    logging::init_logging("info");

    let rt = runtime()?;
    let created = rt.block_on(async {
        let mut conn = connect(config).await?;
        Ok::<_, anyhow::Error>(search::ensure_index(&mut conn).await?)
    })?;

    if created {
        println!("✅ Search index created");
    } else {
        println!("✓ Search index already exists");
    }

    Ok(())
}

fn run_status(config: &Config) -> Result<()> {
    logging::init_logging("warn");

    let rt = runtime()?;
    let (unlocked, stream_length) = rt.block_on(async {
        let mut conn = connect(config).await?;
        let unlocked = status::unlock_status(&mut conn).await;
        let stream_length = stream::length(&mut conn, &config.stream_key).await?;
        Ok::<_, anyhow::Error>((unlocked, stream_length))
    })?;

    let mark = |flag: bool| if flag { "🔓 unlocked" } else { "🔒 locked" };

    println!("📊 Workshop status");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Stream entries:  {stream_length}");
    println!("Transactions:    {}", mark(unlocked.transactions_unlocked));
    println!("Categories:      {}", mark(unlocked.categories_unlocked));
    println!("Time series:     {}", mark(unlocked.timeseries_unlocked));
    println!("Search:          {}", mark(unlocked.search_unlocked));

    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: &Config) -> Result<()> {
    use banking_workshop::dashboard;

    println!("🖥️  Loading Banking Workshop dashboard...\n");

    let rt = runtime()?;
    let mut conn = match rt.block_on(redis_client::connect(&config.redis)) {
        Ok(conn) => conn,
        Err(e) => {
            eprintln!("❌ {e}");
            eprintln!("   Check REDIS_HOST / REDIS_PORT in your environment or .env");
            std::process::exit(1);
        }
    };

    // Load data
    println!("📊 Loading data from Redis...");
    let data = rt.block_on(dashboard::load(&mut conn, &config.stream_key))?;
    println!("✓ Loaded {} recent transactions\n", data.transactions.len());
    println!("Starting UI... (Press 'q' to quit)\n");

    // Create and run app
    let mut app = ui::App::new(data);
    ui::run_ui(&mut app, || {
        rt.block_on(dashboard::load(&mut conn, &config.stream_key))
            .map_err(anyhow::Error::from)
    })?;

    println!("\n✅ UI closed successfully");

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: &Config) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the API server: cargo run --bin workshop-server --features server");
    std::process::exit(1);
}
