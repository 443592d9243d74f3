//! image-loader - fetch, decode and report images from the command line.
//!
//! This binary wires an [`ImageLoader`] to the HTTP transport and the
//! built-in stylers, then loads every URL given on the command line.

use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use image_loader::{
    config::{Config, OutputFormat},
    ImageLoader, ImageRequest, LoadOutcome, RequestOutcome, Waiter,
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!(
        "Loading {} URL(s), style: {}, {} request(s) each, {} worker(s)",
        config.urls.len(),
        config.style.as_deref().unwrap_or("default"),
        config.repeat,
        config.workers
    );

    let loader = ImageLoader::builder(config.transport())
        .stylers(config.stylers())
        .options(config.loader_options())
        .build();

    let reports = run_requests(&loader, &config).await;

    print_reports(&reports, config.format);

    let stats = loader.stats();
    info!(
        "Done: {} cached variant(s), {} fetch(es) still pending",
        stats.cached, stats.pending
    );

    if reports.iter().any(|r| r.error.is_some()) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Per-URL summary of what the loader did.
#[derive(Debug, Serialize)]
struct Report {
    url: String,
    style: Option<String>,
    requests: usize,
    fetches_started: usize,
    joined: usize,
    cache_hits: usize,
    width: Option<u32>,
    height: Option<u32>,
    color: Option<String>,
    error: Option<String>,
}

impl Report {
    fn new(request: &ImageRequest) -> Self {
        Self {
            url: request.url.to_string(),
            style: request.style.clone(),
            requests: 0,
            fetches_started: 0,
            joined: 0,
            cache_hits: 0,
            width: None,
            height: None,
            color: None,
            error: None,
        }
    }

    fn record_request(&mut self, outcome: RequestOutcome) {
        self.requests += 1;
        match outcome {
            RequestOutcome::Started => self.fetches_started += 1,
            RequestOutcome::Joined => self.joined += 1,
            RequestOutcome::CacheHit => self.cache_hits += 1,
        }
    }

    fn record_result(&mut self, outcome: &LoadOutcome) {
        match &outcome.result {
            Ok(image) => {
                self.width = Some(image.width());
                self.height = Some(image.height());
                self.color = Some(format!("{:?}", image.color()));
            }
            Err(e) => self.error = Some(e.to_string()),
        }
    }
}

/// Issue every request at once and collect one report per URL.
async fn run_requests(loader: &ImageLoader, config: &Config) -> Vec<Report> {
    let (tx, mut rx) = mpsc::unbounded_channel::<(usize, LoadOutcome)>();
    let mut reports = Vec::with_capacity(config.urls.len());
    let mut expected = 0;

    for (index, url) in config.urls.iter().enumerate() {
        let mut request = ImageRequest::new(url.clone());
        request.style = config.style.clone();

        let mut report = Report::new(&request);
        for _ in 0..config.repeat {
            let tx = tx.clone();
            let waiter = Waiter::callback(move |outcome: LoadOutcome| {
                let _ = tx.send((index, outcome));
            });
            report.record_request(loader.request_image(request.clone(), waiter));
            expected += 1;
        }
        reports.push(report);
    }
    drop(tx);

    let mut received = 0;
    while let Some((index, outcome)) = rx.recv().await {
        reports[index].record_result(&outcome);
        received += 1;
        if received == expected {
            break;
        }
    }

    reports
}

fn print_reports(reports: &[Report], format: OutputFormat) {
    match format {
        OutputFormat::Text => {
            for report in reports {
                let variant = report.style.as_deref().unwrap_or("default");
                let status = match (&report.error, report.width, report.height) {
                    (Some(e), _, _) => format!("error: {}", e),
                    (None, Some(w), Some(h)) => format!(
                        "{}x{} {}",
                        w,
                        h,
                        report.color.as_deref().unwrap_or("?")
                    ),
                    _ => "no result".to_string(),
                };
                println!(
                    "{} [{}] {} (requests: {}, fetched: {}, joined: {}, cache hits: {})",
                    report.url,
                    variant,
                    status,
                    report.requests,
                    report.fetches_started,
                    report.joined,
                    report.cache_hits
                );
            }
        }
        OutputFormat::Json => match serde_json::to_string_pretty(reports) {
            Ok(json) => println!("{}", json),
            Err(e) => error!("Failed to serialize reports: {}", e),
        },
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "image_loader=debug"
    } else {
        "image_loader=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
