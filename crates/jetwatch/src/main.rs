mod cli;
mod output;

use clap::Parser;
use cli::{Input, SourceSpec};
use output::JsonLinesSink;
use std::sync::Arc;
use std::time::Duration;
use watch1090::prelude::*;

#[derive(Debug, Parser)]
#[command(
    name = "jetwatch",
    version,
    about = "Track aircraft from dump1090 AVR, SBS1 and Beast feeds"
)]
struct Options {
    /// Sources: avr://host[:port], sbs1://host[:port],
    /// beast://host[:port] or file:path?format=avr|sbs1|beast.
    /// Append ?ref=lat,lon for a per-source receiver position.
    #[arg(required = true)]
    sources: Vec<SourceSpec>,

    /// Receiver latitude for sources without their own reference
    #[arg(long)]
    ref_lat: Option<f64>,

    /// Receiver longitude for sources without their own reference
    #[arg(long)]
    ref_lon: Option<f64>,

    /// Append events as JSON lines to this file instead of stdout
    #[arg(short, long)]
    output: Option<String>,

    /// Include raw frame events in the output
    #[arg(long, default_value = "false")]
    frames: bool,

    /// Suppress duplicate frames arriving within this window
    #[arg(long, value_name = "SECONDS")]
    dedup: Option<f64>,

    /// Decode worker count, defaults to the CPU count
    #[arg(long)]
    workers: Option<usize>,

    /// Seconds between registry pruning scans
    #[arg(long, default_value = "30")]
    prune_tick: u64,

    /// Seconds after which a silent aircraft is dropped
    #[arg(long, default_value = "300")]
    prune_after: u64,

    /// Capacity of the decoding queue
    #[arg(long, default_value = "256")]
    queue_size: usize,

    /// Capacity of each sink mailbox
    #[arg(long, default_value = "1024")]
    mailbox_size: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let options = Options::parse();

    let reference = match (options.ref_lat, options.ref_lon) {
        (Some(latitude), Some(longitude)) => Some(Position {
            latitude,
            longitude,
        }),
        (None, None) => None,
        _ => {
            return Err("--ref-lat and --ref-lon go together".into());
        }
    };

    let mut config = PipelineConfig {
        decoding_queue_size: options.queue_size,
        sink_mailbox_size: options.mailbox_size,
        prune_tick: Duration::from_secs(options.prune_tick),
        prune_after: Duration::from_secs(options.prune_after),
        ..PipelineConfig::default()
    };
    if let Some(workers) = options.workers {
        config.decode_worker_count = workers;
    }

    let mut pipeline = Pipeline::new(config);

    let sink: Arc<dyn Sink> = match &options.output {
        Some(path) => {
            Arc::new(JsonLinesSink::file(path, options.frames).await?)
        }
        None => Arc::new(JsonLinesSink::stdout(options.frames)),
    };
    pipeline.add_sink(sink);

    if let Some(window) = options.dedup {
        pipeline.add_middleware(Dedup::new(window));
    }

    let mut live = false;
    for spec in &options.sources {
        let tag = spec.tag(reference);
        match &spec.input {
            Input::Tcp(address) => {
                live = true;
                pipeline.add_producer(TcpProducer::new(address.clone(), tag));
            }
            Input::File(path) => {
                pipeline.add_producer(FileProducer::new(path, tag));
            }
        }
    }

    let running = pipeline.start();
    if live {
        // live feeds run until interrupted, then drain within the
        // shutdown grace
        tokio::signal::ctrl_c().await?;
        tracing::info!("interrupted, shutting down");
        running.stop().await;
    } else {
        running.wait().await;
    }

    Ok(())
}
