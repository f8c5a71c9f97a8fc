use askama::Template;
use opentelemetry::KeyValue;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::mail::{DeliveryMode, MailClient, OutboundMessage};
use crate::pipeline::{StepResult, StepStatus};
use crate::report::RenderedReport;
use crate::telemetry::metrics::MESSAGES_CREATED;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Delivered {
        message_id: String,
        mode: DeliveryMode,
        recipients: usize,
    },
    Skipped {
        reason: String,
    },
    Failed {
        error: String,
    },
}

impl DeliveryOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            DeliveryOutcome::Delivered {
                mode: DeliveryMode::Draft,
                ..
            } => "draft created",
            DeliveryOutcome::Delivered {
                mode: DeliveryMode::Send,
                ..
            } => "sent",
            DeliveryOutcome::Skipped { .. } => "skipped",
            DeliveryOutcome::Failed { .. } => "failed",
        }
    }

    pub fn detail(&self) -> String {
        match self {
            DeliveryOutcome::Delivered { recipients, .. } => format!("{recipients} recipient(s)"),
            DeliveryOutcome::Skipped { reason } => reason.clone(),
            DeliveryOutcome::Failed { error } => error.clone(),
        }
    }
}

/// Creates the client's message. Clients without recipients are skipped, not
/// failed. Errors are returned so the caller can decide whether they abort.
#[tracing::instrument(
    name = "deliver client report",
    skip(mail, recipients, report, sender),
    fields(recipients = recipients.len(), delivery.mode = mode.as_str())
)]
pub async fn deliver_client(
    mail: &dyn MailClient,
    client: &str,
    recipients: &[String],
    report: &RenderedReport,
    sender: &str,
    mode: DeliveryMode,
) -> AppResult<DeliveryOutcome> {
    if recipients.is_empty() {
        tracing::info!(client, "no recipients configured, delivery skipped");
        return Ok(DeliveryOutcome::Skipped {
            reason: "no recipients configured".to_string(),
        });
    }

    let message = OutboundMessage {
        from: sender.to_string(),
        to: recipients.to_vec(),
        subject: report.subject.clone(),
        html: report.html.clone(),
    };
    let receipt = mail.deliver(&message, mode).await?;
    MESSAGES_CREATED.add(1, &[KeyValue::new("delivery.mode", mode.as_str())]);

    Ok(DeliveryOutcome::Delivered {
        message_id: receipt.id,
        mode,
        recipients: recipients.len(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepCounts {
    pub step: String,
    pub succeeded: usize,
    pub failed: usize,
}

/// Success and failure counts per step, in first-seen order.
pub fn step_counts(results: &[StepResult]) -> Vec<StepCounts> {
    let mut counts: Vec<StepCounts> = Vec::new();
    for result in results {
        let idx = match counts.iter().position(|c| c.step == result.step) {
            Some(idx) => idx,
            None => {
                counts.push(StepCounts {
                    step: result.step.clone(),
                    succeeded: 0,
                    failed: 0,
                });
                counts.len() - 1
            }
        };
        match result.status {
            StepStatus::Success => counts[idx].succeeded += 1,
            StepStatus::Failure => counts[idx].failed += 1,
        }
    }
    counts
}

pub fn status_label(results: &[StepResult]) -> String {
    let failed = results
        .iter()
        .filter(|r| r.status == StepStatus::Failure)
        .count();
    match failed {
        0 => "Success".to_string(),
        1 => "Completed with 1 failure".to_string(),
        n => format!("Completed with {n} failures"),
    }
}

pub fn status_subject(week: u32, results: &[StepResult]) -> String {
    format!(
        "Weekly SEO Reports Pipeline - Week {week:02}: {}",
        status_label(results)
    )
}

struct FailureLine {
    step: String,
    module: String,
    detail: String,
}

struct DeliveryLine {
    client: String,
    outcome: &'static str,
    detail: String,
}

#[derive(Template)]
#[template(path = "status.html")]
struct StatusTemplate<'a> {
    subject: &'a str,
    run_id: &'a str,
    week: u32,
    counts: Vec<StepCounts>,
    failures: Vec<FailureLine>,
    deliveries: Vec<DeliveryLine>,
}

/// Everything the operator status message reports on.
pub struct StatusInput<'a> {
    pub run_id: &'a str,
    pub week: u32,
    pub results: &'a [StepResult],
    pub deliveries: Vec<(String, DeliveryOutcome)>,
}

pub fn compose_status(input: &StatusInput<'_>, from: &str, to: &str) -> AppResult<OutboundMessage> {
    let subject = status_subject(input.week, input.results);
    let template = StatusTemplate {
        subject: &subject,
        run_id: input.run_id,
        week: input.week,
        counts: step_counts(input.results),
        failures: input
            .results
            .iter()
            .filter(|r| r.status == StepStatus::Failure)
            .map(|r| FailureLine {
                step: r.step.clone(),
                module: r.module.clone(),
                detail: r.detail.clone().unwrap_or_else(|| "no detail".to_string()),
            })
            .collect(),
        deliveries: input
            .deliveries
            .iter()
            .map(|(client, outcome)| DeliveryLine {
                client: client.clone(),
                outcome: outcome.label(),
                detail: outcome.detail(),
            })
            .collect(),
    };

    Ok(OutboundMessage {
        from: from.to_string(),
        to: vec![to.to_string()],
        html: template.render()?,
        subject,
    })
}
