use std::sync::Arc;

use super::ClientFailures;
use super::rendering::write_client_report;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::pipeline::orchestrator::{Module, ModuleContext};
use crate::publish::Publisher;

/// Uploads chart images and re-renders reports so they reference the public
/// URLs instead of local paths.
pub struct UploadAssets {
    config: Arc<Config>,
    publisher: Option<Arc<dyn Publisher>>,
}

impl UploadAssets {
    pub fn new(config: Arc<Config>, publisher: Option<Arc<dyn Publisher>>) -> Self {
        Self { config, publisher }
    }
}

#[async_trait::async_trait]
impl Module for UploadAssets {
    fn name(&self) -> &str {
        "upload_assets"
    }

    #[tracing::instrument(name = "module upload_assets", skip_all, fields(assets.uploaded))]
    async fn run(&self, ctx: &mut ModuleContext<'_>) -> AppResult<String> {
        let Some(publisher) = &self.publisher else {
            tracing::warn!("UPLOAD_URL or IMAGE_HOST_URL not set, charts stay local");
            return Ok("upload not configured, reports keep local chart paths".to_string());
        };

        let mut failures = ClientFailures::default();
        let mut uploaded = 0;

        for client in &self.config.clients {
            let Some(workspace) = ctx.state.clients.get_mut(&client.name) else {
                continue;
            };
            let mut changed = false;
            for chart in workspace.charts.iter_mut().filter(|c| c.public_url.is_none()) {
                match publisher.upload(&chart.path).await {
                    Ok(url) => {
                        chart.public_url = Some(url);
                        changed = true;
                        uploaded += 1;
                    }
                    Err(e) => failures.record(&client.name, e)?,
                }
            }

            if changed && let Err(e) = write_client_report(&self.config, ctx.state, client).await {
                failures.record(&client.name, e)?;
            }
        }

        tracing::Span::current().record("assets.uploaded", uploaded);
        failures.finish(
            self.config.clients.len(),
            format!("{uploaded} assets uploaded"),
            AppError::Transfer,
        )
    }
}
