mod cli;

use clap::Parser;
use hlspoll::{
    error::AppError,
    input::{input_handler, join_input_task},
    output::create_sink,
    progress::describe,
};
use hlspoll::utils::{merge_headers, parse_headers};
use hlspoll_engine::{DownloadEvent, DownloaderConfig, HlsConfig, HlsDownloader, ProxyConfig};
use indicatif::{HumanBytes, ProgressStyle};
use std::io::IsTerminal;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info, info_span, warn};
use tracing_indicatif::IndicatifLayer;
use tracing_indicatif::span_ext::IndicatifSpanExt;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::cli::Args;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    if let Err(e) = run(args).await {
        error!("Application error: {e}");
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    let indicatif_layer = IndicatifLayer::new();

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(verbose)
                .with_writer(indicatif_layer.get_stderr_writer()),
        )
        .with(indicatif_layer)
        .init();
}

fn downloader_config(args: &Args) -> Result<DownloaderConfig, AppError> {
    let proxy = match &args.proxy {
        Some(url) => {
            let config = ProxyConfig::new(url.as_str(), args.proxy_type);
            match (&args.proxy_user, &args.proxy_pass) {
                (Some(username), Some(password)) => Some(config.with_auth(username, password)),
                (None, None) => Some(config),
                _ => {
                    return Err(AppError::InvalidInput(
                        "--proxy-user and --proxy-pass must be given together".to_string(),
                    ));
                }
            }
        }
        None => None,
    };

    Ok(DownloaderConfig {
        timeout: Duration::from_secs(args.timeout),
        connect_timeout: Duration::from_secs(args.connect_timeout),
        proxy,
        use_system_proxy: !args.no_system_proxy,
        ..DownloaderConfig::default()
    })
}

async fn run(args: Args) -> Result<(), AppError> {
    let headers = merge_headers(HlsConfig::default_headers(), parse_headers(&args.headers)?)?;
    let config = HlsConfig::builder(args.url.as_str())
        .headers(headers)
        .min_res(args.min_res)
        .max_res(args.max_res)
        .sorting(args.sorting)
        .retries(args.retries)
        .retry_delay(Duration::from_millis(args.retry_delay))
        .offload_decryption(!args.no_offload)
        .build()?;
    let http = downloader_config(&args)?;
    let sink = create_sink(args.output_format, args.output.as_deref())?;

    info!(
        url = %config.url,
        sorting = %config.sorting,
        min_res = config.min_res,
        max_res = config.max_res,
        output = %args.output_format,
        "Starting HLS download"
    );

    let span = info_span!("hlspoll");
    if let Ok(style) =
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")
    {
        span.pb_set_style(&style);
    }
    span.pb_set_message("resolving playlist");
    span.pb_start();

    let progress = span.clone();
    let written = Arc::new(AtomicU64::new(0));
    let counter = written.clone();
    let mut downloader = HlsDownloader::with_http(config, &http, sink)?.with_event_callback(
        move |event| {
            if let DownloadEvent::BatchWritten { bytes, .. } = &event {
                counter.fetch_add(*bytes, Ordering::Relaxed);
            }
            progress.pb_set_message(&describe(&event, counter.load(Ordering::Relaxed)));
        },
    );
    let stop = downloader.stop_handle();

    let signal_stop = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, stopping after the current iteration");
            signal_stop.stop();
        }
    });

    let done = CancellationToken::new();
    let input_task = std::io::stdin().is_terminal().then(|| {
        let stop = stop.clone();
        let done = done.clone();
        tokio::task::spawn_blocking(move || input_handler(stop, done))
    });

    let start = Instant::now();
    let result = downloader.run().await;

    done.cancel();
    if let Some(task) = input_task {
        join_input_task(task).await;
    }
    drop(span);

    let summary = result?;
    info!(
        batches = summary.batches,
        segments = summary.segments,
        bytes = %HumanBytes(summary.bytes),
        duration = ?start.elapsed(),
        "HLS download complete"
    );
    Ok(())
}
