//! block-audit CLI: validate, fetch, verify.

use block_audit::chain::{validate_endpoint, ClientConfig, RemoteLedgerClient};
use block_audit::fetch::{
    verify_artifact_checksum, ChecksumStatus, FetchConfig, Fetcher, ProgressTracker,
};
use block_audit::verify::{ResultStore, VerificationEngine, VerificationSummary, VerifyError};
use block_audit::ReportData;
use block_audit_report::render_report;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .init();
    let cli = Cli::parse();
    match cli.command {
        Command::Validate(args) => run_validate(args),
        Command::Fetch(args) => run_fetch(args),
        Command::Verify(args) => run_verify(args),
    }
}

#[derive(Parser)]
#[command(name = "block-audit")]
#[command(author = "gorusys <goru.connector@outlook.com>")]
#[command(about = "Fetch ledger blocks and re-verify saved batches against the live chain")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check that the endpoint answers for a known block.
    Validate(ValidateArgs),
    /// Fetch an inclusive block range and save it as one batch file.
    Fetch(FetchArgs),
    /// Re-verify a saved batch against the live chain.
    Verify(VerifyArgs),
}

#[derive(Args)]
struct EndpointArgs {
    /// get_block URL, e.g. https://node.example/v1/chain/get_block
    #[arg(long)]
    endpoint: String,
    #[arg(long, default_value_t = 30_000)]
    timeout_ms: u64,
}

impl EndpointArgs {
    fn client(&self) -> Result<RemoteLedgerClient, Box<dyn std::error::Error>> {
        Ok(RemoteLedgerClient::new(ClientConfig {
            endpoint: self.endpoint.clone(),
            timeout_ms: self.timeout_ms,
        })?)
    }
}

#[derive(Parser)]
struct ValidateArgs {
    #[command(flatten)]
    endpoint: EndpointArgs,
    #[arg(long, default_value_t = 1_000_000)]
    probe_block: u64,
}

#[derive(Parser)]
struct FetchArgs {
    #[command(flatten)]
    endpoint: EndpointArgs,
    #[arg(long)]
    start: u64,
    #[arg(long)]
    end: u64,
    #[arg(long, default_value = "./block_data")]
    out_dir: PathBuf,
    #[arg(long, default_value_t = 1_000_000)]
    probe_block: u64,
}

#[derive(Parser)]
struct VerifyArgs {
    #[command(flatten)]
    endpoint: EndpointArgs,
    /// Saved batch: array of blocks, {"blocks": [...]}, or a single block.
    #[arg(long)]
    batch: PathBuf,
    /// Write an HTML report here.
    #[arg(long)]
    report: Option<PathBuf>,
    /// Write the results as JSON here.
    #[arg(long)]
    json: Option<PathBuf>,
}

const POLL_INTERVAL: Duration = Duration::from_secs(2);

fn run_validate(args: ValidateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let client = args.endpoint.client()?;
    let rt = tokio::runtime::Runtime::new()?;
    let block = rt.block_on(validate_endpoint(&client, args.probe_block))?;
    println!("OK\t{}\t#{}\t{}", client.endpoint(), block.number, block.id);
    Ok(())
}

fn run_fetch(args: FetchArgs) -> Result<(), Box<dyn std::error::Error>> {
    let client = args.endpoint.client()?;
    let tracker = Arc::new(ProgressTracker::new());
    let config = FetchConfig {
        output_dir: args.out_dir,
        probe_block: args.probe_block,
        ..Default::default()
    };
    let fetcher = Fetcher::new(config, Arc::clone(&tracker));
    let cancel = fetcher.cancellation();

    let rt = tokio::runtime::Runtime::new()?;
    let outcome = rt.block_on(async {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, stopping after current attempt");
                cancel.cancel();
            }
        });
        let poller = {
            let tracker = Arc::clone(&tracker);
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(POLL_INTERVAL).await;
                    let p = tracker.snapshot();
                    info!(
                        processed = p.processed_count,
                        total = p.total_count,
                        current = ?p.current_block_number,
                        has_error = p.has_error,
                        "fetch progress"
                    );
                }
            })
        };
        let out = fetcher.run(&client, args.start, args.end).await;
        poller.abort();
        out
    })?;

    info!(requests = client.request_count(), retried = outcome.retried, "fetch complete");
    if let Some(artifact) = outcome.artifact {
        println!("{}\t{}", artifact.sha256, artifact.path.display());
    }
    Ok(())
}

fn run_verify(args: VerifyArgs) -> Result<(), Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(&args.batch)?;
    match verify_artifact_checksum(&args.batch)? {
        ChecksumStatus::Match => info!(batch = %args.batch.display(), "batch checksum ok"),
        ChecksumStatus::Mismatch { expected, actual } => warn!(
            batch = %args.batch.display(),
            %expected,
            %actual,
            "batch file does not match its .sha256 sidecar"
        ),
        ChecksumStatus::NoSidecar => {}
    }

    let client = Arc::new(args.endpoint.client()?);
    let store = ResultStore::new();
    let engine = VerificationEngine::new(Arc::clone(&store));

    let rt = tokio::runtime::Runtime::new()?;
    let results = rt.block_on(async {
        let handle = engine.start(content, Arc::clone(&client))?;
        let poller = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(POLL_INTERVAL).await;
                    let p = store.progress();
                    info!(
                        verified = p.verified_count,
                        total = p.total_count,
                        current = ?p.current_block_number,
                        "verify progress"
                    );
                }
            })
        };
        let out = handle.await;
        poller.abort();
        Ok::<_, VerifyError>(out??)
    })?;

    let summary = VerificationSummary::from_results(&results);
    for r in results.iter().filter(|r| !r.is_clean()) {
        println!(
            "#{}\tlocal_continuous={}\tchain_continuous={}\t{}",
            r.block_number, r.is_local_continuous, r.is_chain_continuous, r.message
        );
    }

    if let Some(path) = &args.json {
        std::fs::write(path, serde_json::to_string_pretty(&store.results())?)?;
    }
    if let Some(path) = &args.report {
        let batch_name = args
            .batch
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .into_owned();
        let data = ReportData::new(client.endpoint().to_string(), batch_name, store.progress());
        render_report(&data, path)?;
        info!(report = %path.display(), "report written");
    }

    if summary.all_clean() {
        println!("OK\t{} blocks verified", summary.total);
    } else {
        eprintln!(
            "MISMATCH\tverified={}/{}\tdata={}\thash={}\tlocal_breaks={}\tchain_breaks={}\tfetch_failures={}",
            summary.verified,
            summary.total,
            summary.data_mismatches,
            summary.hash_mismatches,
            summary.local_breaks,
            summary.chain_breaks,
            summary.fetch_failures
        );
        std::process::exit(1);
    }
    Ok(())
}
