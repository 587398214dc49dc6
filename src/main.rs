use checkout_flow::application::checkout::CheckoutService;
use checkout_flow::config::CheckoutConfig;
use checkout_flow::domain::ports::{CheckoutView, KeyValueStoreBox};
use checkout_flow::domain::validation::FormData;
use checkout_flow::infrastructure::clock::SystemClock;
use checkout_flow::infrastructure::headless_view::HeadlessView;
use checkout_flow::infrastructure::in_memory::InMemoryStore;
use checkout_flow::interfaces::csv::payment_writer::PaymentWriter;
use checkout_flow::interfaces::json::scenario_reader::{ScenarioReader, ScenarioStep};
use checkout_flow::telemetry::setup_tracing;
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Checkout scenario (JSON array of steps)
    scenario: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// JSON file overriding the default checkout settings
    #[arg(long)]
    config: Option<PathBuf>,
}

#[cfg(feature = "storage-rocksdb")]
fn open_store(db_path: Option<PathBuf>) -> Result<KeyValueStoreBox> {
    use checkout_flow::infrastructure::rocksdb::RocksDBStore;

    match db_path {
        Some(path) => Ok(Box::new(RocksDBStore::open(path).into_diagnostic()?)),
        None => Ok(Box::new(InMemoryStore::new())),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_store(db_path: Option<PathBuf>) -> Result<KeyValueStoreBox> {
    if db_path.is_some() {
        eprintln!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(Box::new(InMemoryStore::new()))
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_tracing();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => CheckoutConfig::from_json_file(path).into_diagnostic()?,
        None => CheckoutConfig::default(),
    };
    let store = open_store(cli.db_path)?;
    let view = Arc::new(HeadlessView::new());
    let service = CheckoutService::new(&config, store, Arc::new(SystemClock), view.clone())
        .into_diagnostic()?;

    let file = File::open(&cli.scenario).into_diagnostic()?;
    let reader = ScenarioReader::new(BufReader::new(file)).into_diagnostic()?;
    info!(steps = reader.len(), "Running checkout scenario");

    // Masked keystrokes accumulate here until the next submit or dismiss.
    let mut typed = FormData::new();
    for step in reader.steps() {
        let step = match step {
            Ok(step) => step,
            Err(e) => {
                eprintln!("Error reading step: {}", e);
                continue;
            }
        };
        match step {
            ScenarioStep::Purchase { product } => {
                typed = FormData::new();
                service.purchase(product).await;
            }
            ScenarioStep::Input { field, value } => {
                let masked = service.on_input(&field, &value);
                typed.set(field, masked);
            }
            ScenarioStep::Blur { field } => {
                if let Some(result) = service.on_blur(&field, typed.get(&field)) {
                    match result.first_error() {
                        Some(message) => eprintln!("[field] {}: {}", field, message),
                        None => info!(field = %field, "Field valid"),
                    }
                }
            }
            ScenarioStep::Submit {
                payment_method,
                fields,
            } => {
                let mut form = typed.clone();
                form.merge(fields);
                service.submit(payment_method.as_deref(), form).await;
            }
            ScenarioStep::Dismiss => {
                typed = FormData::new();
                service.dismiss().await;
            }
        }
        info!(phase = %service.phase(), modal_open = view.is_modal_open(), "Step done");
    }

    info!(pending = service.notifier().pending(), "Waiting for delayed notices");
    service.notifier().settle().await;
    for notice in service.notifier().history() {
        eprintln!("[{}] {}", notice.severity, notice.message);
    }

    let records = service.payment_log().all().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = PaymentWriter::new(stdout.lock());
    writer.write_records(&records).into_diagnostic()?;

    Ok(())
}
