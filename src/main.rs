use clap::Parser;
use dynamo_purge::{ConnectOptions, PurgeConfig, Purger, RetryConfig, connect};
use std::process::ExitCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Delete every item from a DynamoDB table, keeping the table itself
#[derive(Debug, Parser)]
#[command(name = "dynamo-purge", version)]
struct Args {
    /// The name of the table to empty
    #[arg(short = 't', long = "tableName", visible_alias = "table-name")]
    table_name: String,

    /// The name of the AWS profile to use
    #[arg(short = 'p', long)]
    profile: String,

    /// The name of the AWS region to use
    #[arg(short = 'r', long, default_value = "eu-west-1")]
    region: String,

    /// Custom DynamoDB endpoint, e.g. DynamoDB Local
    #[arg(long, env = "DYNAMO_PURGE_ENDPOINT_URL")]
    endpoint_url: Option<String>,

    /// Number of delete batches in flight at once
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..=10))]
    concurrency: u16,

    /// Maximum number of items per scan page
    #[arg(long, value_parser = clap::value_parser!(i32).range(1..))]
    page_size: Option<i32>,

    /// Resubmissions of unprocessed items per batch
    #[arg(long, default_value_t = 5)]
    max_retries: usize,

    /// Timeout for each DynamoDB request, in seconds
    #[arg(long, default_value_t = 30)]
    request_timeout: u64,
}

impl Args {
    fn purge_config(&self) -> PurgeConfig {
        PurgeConfig {
            page_size: self.page_size,
            concurrency: usize::from(self.concurrency),
            retry: RetryConfig {
                max_retries: self.max_retries,
                ..RetryConfig::default()
            },
            request_timeout: Duration::from_secs(self.request_timeout),
            ..PurgeConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    println!(
        "Deleting contents of table {} using AWS region {} and profile {}",
        args.table_name, args.region, args.profile
    );

    let client = connect(&ConnectOptions {
        profile: Some(args.profile.clone()),
        region: Some(args.region.clone()),
        endpoint_url: args.endpoint_url.clone(),
    })
    .await;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, abandoning in-flight requests");
            on_interrupt.cancel();
        }
    });

    let purger = Purger::with_config(client, args.purge_config());

    match purger.purge_with_cancel(&args.table_name, cancel).await {
        Ok(result) => {
            println!(
                "Deleted {} items in {} batches",
                result.deleted, result.batches
            );
            println!("Success");
            ExitCode::SUCCESS
        }
        Err(err) => {
            println!("{}", err);
            println!("Failure");
            ExitCode::FAILURE
        }
    }
}
