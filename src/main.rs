use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use seo_report_pipeline::auth::{StoredTokenProvider, TokenProvider};
use seo_report_pipeline::charts::SvgChartRenderer;
use seo_report_pipeline::config::Config;
use seo_report_pipeline::error::AppError;
use seo_report_pipeline::llm::{LlmClient, openai::OpenAIProvider};
use seo_report_pipeline::mail::GmailClient;
use seo_report_pipeline::pipeline::{
    Collaborators, Orchestrator, PipelineDefinition, RunOptions, RunState, registry,
};
use seo_report_pipeline::processing::ReportWindows;
use seo_report_pipeline::publish::{HttpPublisher, Publisher};
use seo_report_pipeline::sources::{AnalyticsDataClient, SearchConsoleClient};
use seo_report_pipeline::summary::{
    LlmSummarizer, Summarizer, SummaryGenerator, UnavailableSummarizer,
};
use seo_report_pipeline::telemetry::init_telemetry;

/// Weekly SEO report pipeline.
#[derive(Debug, Parser)]
#[command(name = "seo-reports", version, about)]
struct Cli {
    /// Log the planned module invocations without running them.
    #[arg(long)]
    dry_run: bool,

    /// Run only the named step. Repeatable; table order is kept.
    #[arg(long = "step", value_name = "NAME")]
    steps: Vec<String>,

    /// Print the step table and exit.
    #[arg(long)]
    list_steps: bool,

    /// Step table file, overriding PIPELINE_CONFIG_FILE.
    #[arg(long, value_name = "PATH")]
    pipeline_config: Option<PathBuf>,
}

const EXIT_FAILURES: u8 = 1;
const EXIT_CONFIG: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };
    if let Some(path) = cli.pipeline_config.clone() {
        config.pipeline_config_file = path;
    }

    let telemetry_guard = match init_telemetry(&config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize telemetry: {e}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    tracing::info!(
        environment = %config.environment,
        clients = config.clients.len(),
        delivery_mode = config.delivery_mode.as_str(),
        "Starting seo-report-pipeline"
    );

    let code = match run(cli, Arc::new(config)).await {
        Ok(code) => code,
        Err(e) => {
            let config_error = matches!(e.downcast_ref::<AppError>(), Some(AppError::Config(_)));
            tracing::error!(error = %e, "pipeline aborted before execution");
            if config_error {
                ExitCode::from(EXIT_CONFIG)
            } else {
                ExitCode::from(EXIT_FAILURES)
            }
        }
    };

    telemetry_guard.shutdown();
    code
}

async fn run(cli: Cli, config: Arc<Config>) -> anyhow::Result<ExitCode> {
    let definition = PipelineDefinition::load(&config.pipeline_config_file)?;
    if cli.list_steps {
        for step in &definition.steps {
            println!(
                "{:<20} {:<12} {}",
                step.name,
                step.phase.as_str(),
                step.modules.join(", ")
            );
        }
        return Ok(ExitCode::SUCCESS);
    }

    let http = reqwest::Client::builder()
        .timeout(config.external_call_timeout)
        .build()?;
    let tokens: Arc<dyn TokenProvider> =
        Arc::new(StoredTokenProvider::from_config(http.clone(), &config));

    let summarizer: Arc<dyn Summarizer> = match config.openai_api_key.as_deref() {
        Some(api_key) => {
            let provider = OpenAIProvider::new(api_key, config.openai_base_url.as_deref());
            Arc::new(LlmSummarizer {
                client: LlmClient::new(Arc::new(provider), config.llm_max_retries),
                model: config.llm_model.clone(),
                temperature: config.llm_temperature,
                max_tokens: config.llm_max_tokens,
                min_chars: config.analysis_min_chars,
            })
        }
        None => {
            tracing::warn!("OPENAI_API_KEY not set, summaries use the fallback template");
            Arc::new(UnavailableSummarizer)
        }
    };

    let publisher = HttpPublisher::from_config(http.clone(), &config)
        .map(|p| Arc::new(p) as Arc<dyn Publisher>);

    let collaborators = Collaborators {
        gsc: Arc::new(SearchConsoleClient::new(
            http.clone(),
            config.gsc_api_base.clone(),
            tokens.clone(),
            config.gsc_row_limit,
        )),
        ga4: Arc::new(AnalyticsDataClient::new(
            http.clone(),
            config.ga4_api_base.clone(),
            tokens.clone(),
        )),
        summaries: Arc::new(SummaryGenerator::new(
            summarizer,
            config.analysis_max_chars,
            config.external_call_timeout,
        )),
        charts: Arc::new(SvgChartRenderer::new(&config.graphs_dir)),
        publisher,
        mail: Arc::new(GmailClient::new(http, config.gmail_api_base.clone(), tokens)),
    };

    let modules = registry(config.clone(), collaborators);
    let orchestrator = Orchestrator::new(definition.build(&modules)?)?;
    // unknown step names abort here, before anything runs
    orchestrator.plan(&cli.steps)?;

    let state_path = config.run_state_path();
    let mut state = if !cli.steps.is_empty() && state_path.exists() {
        tracing::info!(path = %state_path.display(), "continuing from saved run state");
        RunState::load(&state_path).await?
    } else {
        let run_date = chrono::Local::now().date_naive();
        let windows = ReportWindows::compute(
            run_date,
            config.report_lookback_days,
            config.comparison_lookback_days,
            config.year_over_year,
        )?;
        RunState::new(run_date, windows)
    };

    let options = RunOptions {
        steps: cli.steps,
        dry_run: cli.dry_run,
    };
    let report = orchestrator.run(&mut state, &options).await?;

    if report.dry_run {
        tracing::info!(invocations = report.plan.len(), "dry run complete");
        return Ok(ExitCode::SUCCESS);
    }

    let mut persisted = true;
    if let Err(e) = state.save(&state_path).await {
        tracing::error!(error = %e, path = %state_path.display(), "failed to save run state");
        persisted = false;
    }
    match report.write_json(&config.logs_dir).await {
        Ok(path) => tracing::info!(path = %path.display(), "run report written"),
        Err(e) => {
            tracing::error!(error = %e, "failed to write run report");
            persisted = false;
        }
    }

    for failure in report.failures() {
        tracing::warn!(
            step = %failure.step,
            module = %failure.module,
            detail = failure.detail.as_deref().unwrap_or(""),
            "module failed"
        );
    }
    tracing::info!(
        run_id = %report.run_id,
        trace_id = %report.trace_id,
        modules = report.results.len(),
        failures = report.failures().count(),
        "pipeline finished"
    );

    if report.has_failures() || !persisted {
        Ok(ExitCode::from(EXIT_FAILURES))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
