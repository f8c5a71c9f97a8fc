use std::sync::Arc;

use crate::config::Config;
use crate::error::AppResult;
use crate::models::ComparisonKind;
use crate::pipeline::orchestrator::{Module, ModuleContext};
use crate::summary::{SummaryGenerator, SummaryOrigin, SummaryRequest};

/// One narrative per client and comparison kind that has records. Never fails
/// on summarizer trouble: the generator falls back to a template.
pub struct SummaryWriter {
    config: Arc<Config>,
    generator: Arc<SummaryGenerator>,
}

impl SummaryWriter {
    pub fn new(config: Arc<Config>, generator: Arc<SummaryGenerator>) -> Self {
        Self { config, generator }
    }
}

#[async_trait::async_trait]
impl Module for SummaryWriter {
    fn name(&self) -> &str {
        "summary_writer"
    }

    #[tracing::instrument(
        name = "module summary_writer",
        skip_all,
        fields(summary.count, summary.fallbacks)
    )]
    async fn run(&self, ctx: &mut ModuleContext<'_>) -> AppResult<String> {
        let kinds: Vec<ComparisonKind> = ComparisonKind::ALL
            .into_iter()
            .filter(|kind| ctx.state.windows.comparison(*kind).is_some())
            .collect();
        let mut written = 0;
        let mut fallbacks = 0;

        for client in &self.config.clients {
            let Some(workspace) = ctx.state.clients.get_mut(&client.name) else {
                continue;
            };
            workspace.summaries.clear();
            for &kind in &kinds {
                let records = workspace.comparisons.for_kind(kind);
                if records.is_empty() {
                    continue;
                }
                let request = SummaryRequest {
                    client: client.name.clone(),
                    kind,
                    records,
                };
                let summary = self.generator.generate(&request).await;
                if summary.origin == SummaryOrigin::Fallback {
                    fallbacks += 1;
                }
                workspace.summaries.push(summary);
                written += 1;
            }
        }

        let span = tracing::Span::current();
        span.record("summary.count", written);
        span.record("summary.fallbacks", fallbacks);
        Ok(format!("{written} summaries written, {fallbacks} from the fallback template"))
    }
}
