use opentelemetry::{
    global,
    metrics::{Counter, Histogram, Meter},
};
use std::sync::LazyLock;

pub static METER: LazyLock<Meter> = LazyLock::new(|| global::meter("seo-report-pipeline"));

// --- LLM client metrics ---

pub static GEN_AI_TOKEN_USAGE: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("gen_ai.client.token.usage")
        .with_description("Number of tokens used per LLM call")
        .with_unit("{token}")
        .build()
});

pub static GEN_AI_OPERATION_DURATION: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("gen_ai.client.operation.duration")
        .with_description("Duration of LLM operations in seconds")
        .with_unit("s")
        .build()
});

pub static GEN_AI_RETRY_COUNT: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("gen_ai.client.retry.count")
        .with_description("Number of LLM call retries")
        .with_unit("{retry}")
        .build()
});

pub static GEN_AI_ERROR_COUNT: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("gen_ai.client.error.count")
        .with_description("Number of LLM call errors")
        .with_unit("{error}")
        .build()
});

// --- Pipeline metrics ---

pub static PIPELINE_MODULE_DURATION: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("pipeline.module.duration")
        .with_description("Duration of a pipeline module invocation in seconds")
        .with_unit("s")
        .build()
});

pub static PIPELINE_MODULE_FAILURES: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("pipeline.module.failures")
        .with_description("Number of failed pipeline module invocations")
        .with_unit("{failure}")
        .build()
});

pub static SUMMARY_FALLBACK_COUNT: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("report.summary.fallback.count")
        .with_description("Number of summaries produced by the fallback template")
        .with_unit("{summary}")
        .build()
});

pub static REPORTS_RENDERED: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("report.rendered.count")
        .with_description("Number of client reports rendered")
        .with_unit("{report}")
        .build()
});

pub static REPORT_PLACEHOLDERS: LazyLock<Histogram<f64>> = LazyLock::new(|| {
    METER
        .f64_histogram("report.placeholders")
        .with_description("Number of missing-data placeholders per rendered report")
        .with_unit("{section}")
        .build()
});

pub static MESSAGES_CREATED: LazyLock<Counter<u64>> = LazyLock::new(|| {
    METER
        .u64_counter("delivery.messages.count")
        .with_description("Number of email drafts or messages created")
        .with_unit("{message}")
        .build()
});
