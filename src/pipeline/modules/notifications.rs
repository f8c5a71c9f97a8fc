use std::sync::Arc;

use super::ClientFailures;
use crate::config::Config;
use crate::delivery::{DeliveryOutcome, StatusInput, compose_status, deliver_client};
use crate::error::{AppError, AppResult};
use crate::mail::{DeliveryMode, MailClient};
use crate::pipeline::orchestrator::{Module, ModuleContext, StepStatus};

/// One message per client report, addressed to every recipient of the client.
pub struct CreateEmailDrafts {
    config: Arc<Config>,
    mail: Arc<dyn MailClient>,
}

impl CreateEmailDrafts {
    pub fn new(config: Arc<Config>, mail: Arc<dyn MailClient>) -> Self {
        Self { config, mail }
    }
}

#[async_trait::async_trait]
impl Module for CreateEmailDrafts {
    fn name(&self) -> &str {
        "create_email_drafts"
    }

    #[tracing::instrument(
        name = "module create_email_drafts",
        skip_all,
        fields(delivery.mode = self.config.delivery_mode.as_str(), delivery.delivered, delivery.skipped)
    )]
    async fn run(&self, ctx: &mut ModuleContext<'_>) -> AppResult<String> {
        let mut failures = ClientFailures::default();
        let mut delivered = 0;
        let mut skipped = 0;

        for client in &self.config.clients {
            let recipients = self.config.recipients.recipients_for(&client.name);
            let workspace = ctx.state.workspace_mut(&client.name);

            let outcome = match workspace.report.as_ref() {
                None if recipients.is_empty() => Ok(DeliveryOutcome::Skipped {
                    reason: "no recipients configured".to_string(),
                }),
                None => Err(AppError::Delivery("no rendered report".to_string())),
                Some(report) => {
                    deliver_client(
                        self.mail.as_ref(),
                        &client.name,
                        recipients,
                        report,
                        &self.config.sender_email,
                        self.config.delivery_mode,
                    )
                    .await
                }
            };

            let outcome = match outcome {
                Ok(outcome) => outcome,
                Err(e) => {
                    let error = e.to_string();
                    failures.record(&client.name, e)?;
                    DeliveryOutcome::Failed { error }
                }
            };
            match &outcome {
                DeliveryOutcome::Delivered { .. } => delivered += 1,
                DeliveryOutcome::Skipped { .. } => skipped += 1,
                DeliveryOutcome::Failed { .. } => {}
            }
            workspace.delivery = Some(outcome);
        }

        let span = tracing::Span::current();
        span.record("delivery.delivered", delivered);
        span.record("delivery.skipped", skipped);
        failures.finish(
            self.config.clients.len(),
            format!(
                "{delivered} {} created, {skipped} clients skipped",
                match self.config.delivery_mode {
                    DeliveryMode::Draft => "drafts",
                    DeliveryMode::Send => "messages",
                }
            ),
            AppError::Delivery,
        )
    }
}

/// Sends the operator a summary of every result recorded so far.
pub struct SendStatusEmail {
    config: Arc<Config>,
    mail: Arc<dyn MailClient>,
}

impl SendStatusEmail {
    pub fn new(config: Arc<Config>, mail: Arc<dyn MailClient>) -> Self {
        Self { config, mail }
    }
}

#[async_trait::async_trait]
impl Module for SendStatusEmail {
    fn name(&self) -> &str {
        "send_status_email"
    }

    #[tracing::instrument(name = "module send_status_email", skip_all, fields(status.failures))]
    async fn run(&self, ctx: &mut ModuleContext<'_>) -> AppResult<String> {
        let Some(recipient) = self.config.status_recipient.as_deref() else {
            tracing::warn!("STATUS_RECIPIENT not set, status email skipped");
            return Ok("no status recipient configured".to_string());
        };

        let deliveries = self
            .config
            .clients
            .iter()
            .filter_map(|client| {
                let outcome = ctx.state.workspace(&client.name)?.delivery.clone()?;
                Some((client.name.clone(), outcome))
            })
            .collect();
        let run_id = ctx.run_id.to_string();
        let input = StatusInput {
            run_id: &run_id,
            week: ctx.state.week,
            results: ctx.results,
            deliveries,
        };
        let message = compose_status(&input, &self.config.sender_email, recipient)?;
        tracing::Span::current().record(
            "status.failures",
            ctx.results
                .iter()
                .filter(|r| r.status == StepStatus::Failure)
                .count(),
        );

        let receipt = self.mail.send(&message).await?;
        Ok(format!("status email sent to {recipient} ({})", receipt.id))
    }
}
