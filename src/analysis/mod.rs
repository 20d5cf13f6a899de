//! Coordinador multi-dimensión
//!
//! Cada dimensión de análisis es una fila de configuración, no una clase:
//! mismo pipeline, distinto prompt. El coordinador lanza las dimensiones
//! habilitadas en paralelo o en secuencia, envuelve cada una en la capa de
//! resiliencia y compone un resultado agregado en el que toda dimensión
//! habilitada está presente aunque haya fallado.

use crate::config::ResilienceConfig;
use crate::prompts::build_dimension_prompt;
use crate::provider::{GenerationOptions, TextGenerator};
use crate::recovery::{recover_structured_with_repair, DecodeResult, DecodeStrategy};
use crate::resilience::ResilientExecutor;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// How enabled dimensions are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    Parallel,
    Sequential,
}

/// Configuration row for one analysis dimension
pub struct DimensionSpec {
    pub name: &'static str,
    /// What the reviewer prompt asks the model to focus on
    pub focus: &'static str,
}

/// All known dimensions, in presentation order
pub const DIMENSIONS: &[DimensionSpec] = &[
    DimensionSpec {
        name: "syntax",
        focus: "syntactic correctness and SQL standard conformance",
    },
    DimensionSpec {
        name: "performance",
        focus: "performance: index usage, full table scans, join strategy, SELECT *",
    },
    DimensionSpec {
        name: "security",
        focus: "security: injection surface, privilege usage, sensitive data exposure",
    },
    DimensionSpec {
        name: "maintainability",
        focus: "maintainability: readability, naming, nesting depth, dead clauses",
    },
];

pub fn dimension(name: &str) -> Option<&'static DimensionSpec> {
    DIMENSIONS.iter().find(|d| d.name == name)
}

/// Outcome of one dimension run. Failed runs carry the declared default
/// payload so downstream consumers never branch on missing keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionResult {
    pub dimension: String,
    pub success: bool,
    pub data: Value,
    pub confidence: f32,
    pub strategy: Option<DecodeStrategy>,
    pub error: Option<String>,
}

impl DimensionResult {
    fn defaulted(spec: &DimensionSpec, error: Option<String>) -> Self {
        Self {
            dimension: spec.name.to_string(),
            success: false,
            data: default_payload(),
            confidence: 0.0,
            strategy: None,
            error,
        }
    }
}

fn default_payload() -> Value {
    json!({
        "score": 0,
        "confidence": 0.0,
        "issues": [],
        "summary": "analysis unavailable",
    })
}

/// Aggregate over all enabled dimensions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeResult {
    pub results: BTreeMap<String, DimensionResult>,
    /// Mean confidence over succeeding dimensions; 0.0 when none succeeded
    pub aggregate_confidence: f32,
    pub enabled_dimensions: Vec<String>,
}

impl CompositeResult {
    pub fn succeeded(&self) -> usize {
        self.results.values().filter(|r| r.success).count()
    }
}

pub struct Coordinator {
    generator: Arc<dyn TextGenerator>,
    executor: Arc<ResilientExecutor>,
    overall_timeout: Duration,
}

impl Coordinator {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        executor: Arc<ResilientExecutor>,
        config: &ResilienceConfig,
    ) -> Self {
        Self {
            generator,
            executor,
            overall_timeout: Duration::from_secs(config.operation_timeout_secs),
        }
    }

    pub fn with_overall_timeout(mut self, overall_timeout: Duration) -> Self {
        self.overall_timeout = overall_timeout;
        self
    }

    /// Run the enabled dimensions over one SQL text.
    ///
    /// `enabled` filters [`DIMENSIONS`] by name; an empty list enables all of
    /// them, unknown names are skipped with a warning. Every resolved
    /// dimension appears in the composite result: a run that exhausts its
    /// retries contributes its default payload instead of aborting siblings.
    pub async fn analyze(
        &self,
        sql: &str,
        enabled: &[String],
        mode: AnalysisMode,
    ) -> CompositeResult {
        let specs = resolve(enabled);
        let enabled_dimensions: Vec<String> =
            specs.iter().map(|s| s.name.to_string()).collect();

        tracing::info!(
            dimensions = ?enabled_dimensions,
            ?mode,
            "starting analysis"
        );

        let outcomes = match mode {
            AnalysisMode::Parallel => self.run_parallel(sql, &specs).await,
            AnalysisMode::Sequential => self.run_sequential(sql, &specs).await,
        };

        let mut results = BTreeMap::new();
        for outcome in outcomes {
            results.insert(outcome.dimension.clone(), outcome);
        }

        let aggregate_confidence = aggregate_confidence(&results);

        CompositeResult {
            results,
            aggregate_confidence,
            enabled_dimensions,
        }
    }

    async fn run_parallel(
        &self,
        sql: &str,
        specs: &[&'static DimensionSpec],
    ) -> Vec<DimensionResult> {
        let handles: Vec<_> = specs
            .iter()
            .map(|spec| {
                let generator = self.generator.clone();
                let executor = self.executor.clone();
                let sql = sql.to_string();
                let spec: &'static DimensionSpec = spec;
                tokio::spawn(async move { run_dimension(generator, executor, spec, &sql).await })
            })
            .collect();

        match timeout(self.overall_timeout, join_all(handles)).await {
            Ok(joined) => joined
                .into_iter()
                .zip(specs)
                .map(|(joined, spec)| match joined {
                    Ok(result) => result,
                    Err(e) => {
                        tracing::error!(dimension = spec.name, "analysis task failed: {e}");
                        DimensionResult::defaulted(
                            spec,
                            Some("analysis task failed unexpectedly".to_string()),
                        )
                    }
                })
                .collect(),
            Err(_) => {
                tracing::error!(
                    timeout_secs = self.overall_timeout.as_secs(),
                    "overall analysis deadline exceeded"
                );
                specs
                    .iter()
                    .map(|spec| {
                        DimensionResult::defaulted(
                            spec,
                            Some("overall analysis deadline exceeded".to_string()),
                        )
                    })
                    .collect()
            }
        }
    }

    async fn run_sequential(
        &self,
        sql: &str,
        specs: &[&'static DimensionSpec],
    ) -> Vec<DimensionResult> {
        let mut results = Vec::with_capacity(specs.len());
        for spec in specs {
            results
                .push(run_dimension(self.generator.clone(), self.executor.clone(), spec, sql).await);
        }
        results
    }
}

fn resolve(enabled: &[String]) -> Vec<&'static DimensionSpec> {
    if enabled.is_empty() {
        return DIMENSIONS.iter().collect();
    }

    let mut specs = Vec::new();
    for name in enabled {
        match dimension(name) {
            Some(spec) if specs.iter().any(|s: &&DimensionSpec| s.name == spec.name) => {}
            Some(spec) => specs.push(spec),
            None => tracing::warn!(dimension = %name, "unknown analysis dimension, skipping"),
        }
    }
    specs
}

/// Plain mean over succeeding dimensions only
fn aggregate_confidence(results: &BTreeMap<String, DimensionResult>) -> f32 {
    let succeeded: Vec<f32> = results
        .values()
        .filter(|r| r.success)
        .map(|r| r.confidence)
        .collect();

    if succeeded.is_empty() {
        0.0
    } else {
        succeeded.iter().sum::<f32>() / succeeded.len() as f32
    }
}

async fn run_dimension(
    generator: Arc<dyn TextGenerator>,
    executor: Arc<ResilientExecutor>,
    spec: &'static DimensionSpec,
    sql: &str,
) -> DimensionResult {
    let options = executor.options(format!("analyze_{}", spec.name));

    let outcome = executor
        .execute_with_fallback(
            &options,
            |token| {
                let generator = generator.clone();
                let sql = sql.to_string();
                async move {
                    let messages = build_dimension_prompt(spec.focus, &sql);
                    let options = GenerationOptions {
                        temperature: Some(0.2),
                        max_tokens: None,
                    };

                    let raw = tokio::select! {
                        result = generator.invoke(&messages, &options) => result?,
                        _ = token.cancelled() => anyhow::bail!("generation cancelled"),
                    };

                    let decoded =
                        recover_structured_with_repair(&raw, generator.as_ref()).await?;
                    Ok(decoded)
                }
            },
            || {
                DecodeResult::failure(
                    "analysis fell back to its default result after repeated failures",
                    Vec::new(),
                )
            },
        )
        .await;

    match outcome {
        Ok(decoded) if decoded.success => DimensionResult {
            dimension: spec.name.to_string(),
            success: true,
            data: decoded.data.unwrap_or_else(default_payload),
            confidence: decoded.confidence,
            strategy: decoded.strategy,
            error: None,
        },
        Ok(decoded) => {
            tracing::warn!(
                dimension = spec.name,
                "analysis produced no decodable result: {:?}",
                decoded.error
            );
            DimensionResult::defaulted(spec, decoded.error)
        }
        Err(e) => {
            tracing::warn!(dimension = spec.name, "analysis failed: {e}");
            DimensionResult::defaulted(spec, Some(e.classification.user_message))
        }
    }
}
