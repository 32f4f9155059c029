use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use visited_domains::utils::{
    configure_workers, format_number, redact_domain, setup_logging, validate_args,
};
use visited_domains::{
    server, AppState, Args, BucketStore, Command, DomainScanner, MemoryStore, SqliteStore,
    SystemClock, VisitRecorder,
};

fn open_store(args: &Args) -> Result<Arc<dyn BucketStore>> {
    if args.in_memory {
        info!(action = "open", component = "memory_store", "Using in-memory visit store");
        return Ok(Arc::new(MemoryStore::new()));
    }
    Ok(Arc::new(SqliteStore::open(&args.database)?))
}

fn print_domains(from: &str, to: &str, domains: &[String], redact: bool) {
    println!("\n--- Domains visited from {} to {} ---", from, to);
    println!(
        "Total unique domains found: {}",
        format_number(domains.len())
    );
    for domain in domains {
        let display_domain = if redact {
            redact_domain(domain)
        } else {
            domain.to_string()
        };
        println!("- {}", display_domain);
    }
}

async fn run(args: Args) -> Result<()> {
    let workers = configure_workers(args.workers)?;
    info!(action = "configure", component = "domain_scan", worker_count = workers, "Using workers for domain extraction");

    let store = open_store(&args)?;

    match &args.command {
        Command::Serve { bind } => {
            let state = AppState::new(store, Arc::new(SystemClock));
            server::serve(state, bind).await
        }
        Command::Record { links } => {
            let recorder = VisitRecorder::new(store, Arc::new(SystemClock));
            let ack = recorder
                .record(links)
                .context("Failed to record visited links")?;
            println!(
                "Recorded {} links at {}",
                format_number(ack.links),
                ack.timestamp
            );
            Ok(())
        }
        Command::Domains { from, to, redact } => {
            let scanner = DomainScanner::new(store);
            let scan = scanner.scan_domains(Some(from.as_str()), Some(to.as_str()))?;
            print_domains(from, to, &scan.sorted_domains(), *redact);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.verbose);
    validate_args(&args)?;

    if let Err(e) = run(args).await {
        error!(action = "exit", component = "main", error = %e, "Command failed");
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
    Ok(())
}
