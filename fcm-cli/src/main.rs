//! Submit a fuzzy c-means clustering request from the command line.

use anyhow::{Context, Result};
use fcm_client::{
    AlgorithmVariant, Client, ClientOptions, ClusteringResult, Session, DEFAULT_ENDPOINT,
};
use std::{path::PathBuf, process, time::Duration};
use structopt::StructOpt;
use tokio::fs;
use tracing::debug;
use tracing_subscriber::{fmt::Subscriber, prelude::*, EnvFilter};

mod param_assignment;

use param_assignment::ParamAssignment;

/// Our command-line arguments.
#[derive(Debug, StructOpt)]
#[structopt(
    name = "fcm-submit",
    about = "Submit a fuzzy c-means clustering request and print the result."
)]
struct Opt {
    /// A CSV file containing the data points to cluster.
    #[structopt(short = "d", long = "data", value_name = "FILE", parse(from_os_str))]
    data: PathBuf,

    /// The algorithm to run: "Unsupervised FCM", "Semi-Supervised FCM" or
    /// "Entropy Regularized FCM" (or "unsupervised", "semi-supervised",
    /// "entropy").
    #[structopt(short = "a", long = "algorithm", default_value = "Unsupervised FCM")]
    algorithm: AlgorithmVariant,

    /// Set a parameter. May be repeated. Keys are clusters, m, eps, lmax,
    /// alpha and beta.
    #[structopt(short = "p", long = "param", value_name = "KEY=VALUE")]
    params: Vec<ParamAssignment>,

    /// A supervised membership matrix, as JSON. Ignored by unsupervised FCM.
    #[structopt(long = "membership", value_name = "JSON")]
    membership: Option<String>,

    /// A file containing a supervised membership matrix, as JSON.
    #[structopt(
        long = "membership-file",
        value_name = "FILE",
        parse(from_os_str),
        conflicts_with = "membership"
    )]
    membership_file: Option<PathBuf>,

    /// The clustering service endpoint. Defaults to
    /// http://127.0.0.1:5000/run_fcm.
    #[structopt(long = "endpoint", value_name = "URL", env = "FCM_ENDPOINT")]
    endpoint: Option<String>,

    /// Give up on the service after this many seconds.
    #[structopt(long = "timeout", value_name = "SECS")]
    timeout: Option<u64>,

    /// Print the request that would be sent, without sending it.
    #[structopt(long = "dry-run")]
    dry_run: bool,

    /// Print cluster centers and sizes instead of the raw response.
    #[structopt(long = "summary")]
    summary: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Configure tracing.
    let filter = EnvFilter::from_default_env();
    Subscriber::builder()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .finish()
        .init();

    let opt = Opt::from_args();
    debug!("Args: {:?}", opt);

    if let Err(err) = run(opt).await {
        eprint!("ERROR");
        for e in err.chain() {
            eprint!(": {}", e);
        }
        eprintln!();
        process::exit(1);
    }
}

/// Our real `main` function, which can return an error.
async fn run(opt: Opt) -> Result<()> {
    let mut session = Session::new();
    session
        .select_file(&opt.data)
        .await
        .context("could not load dataset")?;
    let input = session.collector_mut();
    input.set_variant(opt.algorithm);
    for param in &opt.params {
        input
            .set_field(param.field, &param.value)
            .with_context(|| format!("could not set {}", param.field))?;
    }
    if let Some(membership) = &opt.membership {
        input.set_supervised_membership_text(membership.as_str());
    } else if let Some(path) = &opt.membership_file {
        let text = fs::read_to_string(path)
            .await
            .with_context(|| format!("could not read {}", path.display()))?;
        input.set_supervised_membership_text(text);
    }
    for advisory in input.validate() {
        eprintln!("warning: {}", advisory);
    }

    if opt.dry_run {
        let request = session
            .preview_request()
            .context("could not build request")?;
        println!("{}", serde_json::to_string_pretty(&request)?);
        return Ok(());
    }

    let options = ClientOptions::default().timeout(opt.timeout.map(Duration::from_secs));
    let endpoint = opt.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT);
    let client = Client::with_options(endpoint, &options)?;

    let result = session
        .submit(&client)
        .await
        .context("clustering request failed")?;
    if opt.summary {
        print_summary(result);
    } else {
        println!("{}", serde_json::to_string_pretty(result.as_json())?);
    }
    Ok(())
}

/// Print a short, human-readable description of `result`.
fn print_summary(result: &ClusteringResult) {
    match result.summary() {
        Some(summary) => {
            let sizes = summary.cluster_sizes();
            for (i, center) in summary.centers.iter().enumerate() {
                let center = center
                    .iter()
                    .map(|x| format!("{:.4}", x))
                    .collect::<Vec<_>>()
                    .join(", ");
                let size = sizes.get(i).copied().unwrap_or(0);
                println!("cluster {}: {} points, center [{}]", i, size, center);
            }
        }
        None => {
            eprintln!("warning: unexpected response shape, printing it as-is");
            println!("{}", result.as_json());
        }
    }
}
