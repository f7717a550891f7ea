//! vsr-enrich - Variant report enrichment
//!
//! Reads one or more report JSON files, annotates every variant from the
//! lookup service, classifies sample signatures, writes the enriched report
//! and its failure log, then hands both downstream.
//!
//! Exit status is non-zero only when a whole report is lost (unreadable
//! input, failed delivery). Per-variant failures are logged and written to
//! the failure log.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vsr_common::config::{self, EnrichmentProfile, Overrides, Settings};
use vsr_common::{Report, SampleState};
use vsr_enrich::delivery::{
    CommandMessageGenerator, GatewayClient, HttpReportSender, HttpSignatureRegistrar,
    ReportDispatcher,
};
use vsr_enrich::output;
use vsr_enrich::{
    AnnotationEnricher, HttpLookupClient, PipelineConfig, ReportPipeline, SignatureContext,
};

/// Command-line arguments for vsr-enrich
#[derive(Parser, Debug)]
#[command(name = "vsr-enrich")]
#[command(about = "Enrich variant reports with lookup annotations and signature statuses")]
#[command(version)]
struct Args {
    /// Report JSON files, processed in order
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory for enriched reports and failure logs
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// JSON file with the sample's extensible fields (`extraField`); single input only
    #[arg(long, requires = "evaluation_id")]
    sample_fields: Option<PathBuf>,

    /// Evaluation identifier attached to signature classifications
    #[arg(short, long, requires = "sample_fields")]
    evaluation_id: Option<i64>,

    /// Annotations to derive: allele-fraction, split-read or full
    #[arg(long)]
    profile: Option<EnrichmentProfile>,

    /// Concurrent per-variant lookups
    #[arg(long)]
    workers: Option<usize>,

    /// Per-report deadline in seconds (0 disables)
    #[arg(long)]
    deadline_secs: Option<u64>,

    /// Lookup service base URL
    #[arg(long)]
    lookup_url: Option<String>,

    /// Gateway endpoint receiving the enriched report
    #[arg(long)]
    gateway_url: Option<String>,

    /// Gateway endpoint receiving signature classifications
    #[arg(long)]
    signature_url: Option<String>,

    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Only write files; do not contact the gateway
    #[arg(long)]
    no_send: bool,

    /// Run the configured message generator for each report
    #[arg(long)]
    generate: bool,
}

impl Args {
    /// Checks clap cannot express
    fn validate(&self) -> Result<()> {
        // Sample fields belong to exactly one report
        if self.sample_fields.is_some() && self.inputs.len() > 1 {
            bail!(
                "--sample-fields applies to a single report, but {} inputs were given",
                self.inputs.len()
            );
        }
        Ok(())
    }

    fn overrides(&self) -> Overrides {
        Overrides {
            lookup_url: self.lookup_url.clone(),
            gateway_url: self.gateway_url.clone(),
            signature_url: self.signature_url.clone(),
            workers: self.workers,
            deadline_secs: self.deadline_secs,
            profile: self.profile,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    args.validate()?;

    let toml_config = config::load_or_default(args.config.as_deref())?;
    let settings = Settings::resolve(&toml_config, &args.overrides())?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "vsr_enrich={level},vsr_common={level}",
                    level = settings.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting vsr-enrich {}", env!("CARGO_PKG_VERSION"));
    info!(
        lookup = %settings.lookup_url,
        profile = %settings.profile,
        workers = settings.workers,
        deadline = ?settings.deadline,
        "Settings resolved"
    );

    let lookup = HttpLookupClient::new(
        &settings.lookup_url,
        settings.lookup_timeout,
        settings.lookup_connect_timeout,
    )
    .context("Failed to create lookup client")?;
    let enricher = Arc::new(AnnotationEnricher::new(Arc::new(lookup), settings.profile));
    let pipeline = ReportPipeline::new(
        enricher,
        PipelineConfig {
            workers: settings.workers,
            deadline: settings.deadline,
        },
    );
    let dispatcher = build_dispatcher(&args, &settings)?;

    let sample = match &args.sample_fields {
        Some(path) => Some(load_sample(path)?),
        None => None,
    };
    let signatures = match (&sample, args.evaluation_id) {
        (Some(sample), Some(evaluation_id)) => Some(SignatureContext {
            sample,
            evaluation_id,
        }),
        _ => None,
    };

    std::fs::create_dir_all(&args.output_dir).with_context(|| {
        format!("Failed to create output directory {}", args.output_dir.display())
    })?;

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    let mut failed_reports = 0;
    for input in &args.inputs {
        if cancel.is_cancelled() {
            warn!("Cancelled; remaining reports not processed");
            break;
        }

        if let Err(e) =
            process_report(input, &args.output_dir, &pipeline, &dispatcher, signatures, &cancel).await
        {
            error!(input = %input.display(), error = ?e, "Report failed");
            failed_reports += 1;
        }
    }

    if failed_reports > 0 {
        bail!("{} of {} reports failed", failed_reports, args.inputs.len());
    }

    Ok(())
}

/// Read, enrich, write and deliver one report
async fn process_report(
    input: &Path,
    output_dir: &Path,
    pipeline: &ReportPipeline,
    dispatcher: &ReportDispatcher,
    signatures: Option<SignatureContext<'_>>,
    cancel: &CancellationToken,
) -> Result<()> {
    info!(input = %input.display(), "Processing report");

    let json = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let report =
        Report::from_json(&json).with_context(|| format!("Failed to parse report {}", input.display()))?;

    let mut result = pipeline.run(report, signatures, cancel).await;

    let (report_path, failures_path) = output::output_paths(input, output_dir);
    output::write_report(&report_path, &result.report)
        .with_context(|| format!("Failed to write {}", report_path.display()))?;

    let delivery = dispatcher.deliver(&mut result).await;

    // Written after delivery so signature registration failures are included
    output::write_failures(&failures_path, &result.failures)
        .with_context(|| format!("Failed to write {}", failures_path.display()))?;
    delivery.with_context(|| format!("Failed to deliver report {}", result.report.sample_id))?;

    info!(
        output = %report_path.display(),
        failures = result.failures.len(),
        interrupted = result.interrupted(),
        "Report written"
    );
    Ok(())
}

fn build_dispatcher(args: &Args, settings: &Settings) -> Result<ReportDispatcher> {
    let mut dispatcher = ReportDispatcher::new();

    if !args.no_send {
        let reports = GatewayClient::new(&settings.report_url, settings.gateway_timeout)?;
        let signatures = GatewayClient::new(&settings.signature_url, settings.gateway_timeout)?;
        dispatcher = dispatcher
            .with_sender(Arc::new(HttpReportSender::new(reports)))
            .with_registrar(Arc::new(HttpSignatureRegistrar::new(signatures)));
    }

    if args.generate {
        let Some(generator) = &settings.generator else {
            bail!("--generate requires a [generator] section in the config file");
        };
        dispatcher =
            dispatcher.with_generator(Arc::new(CommandMessageGenerator::from_config(generator)));
    }

    Ok(dispatcher)
}

fn load_sample(path: &Path) -> Result<SampleState> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read sample fields {}", path.display()))?;
    SampleState::from_json(&json)
        .with_context(|| format!("Failed to parse sample fields {}", path.display()))
}

/// Cancel in-flight work on Ctrl+C
async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            warn!("Ctrl+C received, cancelling");
            cancel.cancel();
        }
        Err(e) => warn!("Failed to install Ctrl+C handler: {}", e),
    }
}
