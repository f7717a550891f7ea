//! Downstream delivery
//!
//! Collaborators receiving the pipeline's output:
//! - [`ReportSender`]: posts the enriched report to the messaging gateway
//! - [`SignatureRegistrar`]: registers each signature classification
//! - [`MessageGenerator`]: external message-generation command
//!
//! Every send returns an explicit result. Signature registration failures are
//! recorded per item; a failed generator or report send loses the whole
//! output and is returned to the caller.

use crate::error::{DeliveryError, EnrichError, FailureRecord};
use crate::pipeline::PipelineOutput;
use crate::signature::SignatureClassification;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{error, info, warn};
use vsr_common::config::GeneratorConfig;
use vsr_common::Report;

/// Sends the enriched report downstream
#[async_trait]
pub trait ReportSender: Send + Sync {
    async fn send(&self, report: &Report) -> Result<(), DeliveryError>;
}

/// Registers a signature classification downstream
#[async_trait]
pub trait SignatureRegistrar: Send + Sync {
    async fn register(&self, classification: &SignatureClassification) -> Result<(), DeliveryError>;
}

/// Generates the outbound clinical message from a report
#[async_trait]
pub trait MessageGenerator: Send + Sync {
    async fn generate(&self, report: &Report) -> Result<(), DeliveryError>;
}

/// JSON POST helper shared by the gateway collaborators
#[derive(Clone)]
pub struct GatewayClient {
    http_client: Client,
    url: String,
}

impl GatewayClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, DeliveryError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeliveryError::Unreachable(e.to_string()))?;

        Ok(Self {
            http_client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post_json<T: Serialize + Sync>(&self, payload: &T) -> Result<(), DeliveryError> {
        let response = self
            .http_client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| DeliveryError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

/// Posts the report JSON to the gateway's receive endpoint
pub struct HttpReportSender {
    gateway: GatewayClient,
}

impl HttpReportSender {
    pub fn new(gateway: GatewayClient) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl ReportSender for HttpReportSender {
    async fn send(&self, report: &Report) -> Result<(), DeliveryError> {
        self.gateway.post_json(report).await?;
        info!(sample_id = %report.sample_id, url = %self.gateway.url(), "Report delivered");
        Ok(())
    }
}

/// Posts signature classifications to the gateway
pub struct HttpSignatureRegistrar {
    gateway: GatewayClient,
}

impl HttpSignatureRegistrar {
    pub fn new(gateway: GatewayClient) -> Self {
        Self { gateway }
    }
}

#[async_trait]
impl SignatureRegistrar for HttpSignatureRegistrar {
    async fn register(&self, classification: &SignatureClassification) -> Result<(), DeliveryError> {
        self.gateway.post_json(classification).await?;
        info!(
            signature = %classification.signature,
            status = ?classification.status,
            "Signature registered"
        );
        Ok(())
    }
}

/// Runs an external program with the report JSON as its last argument
pub struct CommandMessageGenerator {
    program: String,
    args: Vec<String>,
}

impl CommandMessageGenerator {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &GeneratorConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone())
    }
}

#[async_trait]
impl MessageGenerator for CommandMessageGenerator {
    async fn generate(&self, report: &Report) -> Result<(), DeliveryError> {
        let payload = serde_json::to_string(report)?;
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(payload)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| DeliveryError::Generator(format!("{}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(DeliveryError::Generator(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        info!(
            program = %self.program,
            output = %String::from_utf8_lossy(&output.stdout).trim(),
            "Message generator completed"
        );
        Ok(())
    }
}

/// Sequences delivery of one pipeline output
#[derive(Default, Clone)]
pub struct ReportDispatcher {
    sender: Option<Arc<dyn ReportSender>>,
    registrar: Option<Arc<dyn SignatureRegistrar>>,
    generator: Option<Arc<dyn MessageGenerator>>,
}

impl ReportDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sender(mut self, sender: Arc<dyn ReportSender>) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn with_registrar(mut self, registrar: Arc<dyn SignatureRegistrar>) -> Self {
        self.registrar = Some(registrar);
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn MessageGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Deliver signatures, run the generator, then send the report
    ///
    /// Signature failures are appended to `output.failures`.
    pub async fn deliver(&self, output: &mut PipelineOutput) -> Result<(), DeliveryError> {
        if let Some(registrar) = &self.registrar {
            for classification in &output.classifications {
                if let Err(e) = registrar.register(classification).await {
                    warn!(
                        signature = %classification.signature,
                        error = %e,
                        "Signature registration failed"
                    );
                    output.failures.push(FailureRecord::new(
                        classification.signature.name(),
                        &EnrichError::Transport(e.to_string()),
                    ));
                }
            }
        }

        if let Some(generator) = &self.generator {
            generator.generate(&output.report).await.inspect_err(|e| {
                error!(sample_id = %output.report.sample_id, error = %e, "Message generation failed");
            })?;
        }

        if let Some(sender) = &self.sender {
            sender.send(&output.report).await.inspect_err(|e| {
                error!(sample_id = %output.report.sample_id, error = %e, "Report delivery failed");
            })?;
        }

        Ok(())
    }
}
