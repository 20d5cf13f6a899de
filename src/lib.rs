//! SqlSage - Analizador de SQL asistido por modelos de lenguaje
//!
//! SqlSage delega el juicio sobre una consulta SQL a un modelo de lenguaje
//! remoto y se concentra en el problema real: recuperar un resultado
//! estructurado fiable a partir de texto poco fiable.
//!
//! # Arquitectura
//!
//! - **Recovery Pipeline**: adaptador de respuesta, limpiador de texto,
//!   decodificador escalonado y reparación asistida por el modelo
//! - **Resilience Layer**: timeout, reintentos con backoff y jitter,
//!   circuit breaker y fallback por operación
//! - **Multi-Dimension Coordinator**: dimensiones de análisis como filas de
//!   configuración ejecutadas en paralelo o en secuencia
//!
//! # Módulos Principales
//!
//! - [`provider`] - Colaborador de generación de texto (Ollama, OpenAI,
//!   Anthropic, Groq)
//! - [`recovery`] - Recuperación de JSON estructurado desde texto ruidoso
//! - [`errors`] - Clasificación ordenada de errores con redacción
//! - [`resilience`] - Ejecución resiliente de las llamadas al modelo
//! - [`analysis`] - Coordinación de dimensiones y resultado compuesto
//!
//! # Ejemplo de Uso
//!
//! ```rust,no_run
//! use sqlsage::analysis::{AnalysisMode, Coordinator};
//! use sqlsage::config::AppConfig;
//! use sqlsage::provider::HttpTextGenerator;
//! use sqlsage::resilience::ResilientExecutor;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = AppConfig::load(None)?;
//! let generator = Arc::new(HttpTextGenerator::new(config.model.clone())?);
//! let executor = Arc::new(ResilientExecutor::new(
//!     config.resilience.clone(),
//!     config.breaker.clone(),
//! ));
//!
//! let coordinator = Coordinator::new(generator, executor, &config.resilience);
//! let report = coordinator
//!     .analyze("SELECT * FROM users", &[], AnalysisMode::Parallel)
//!     .await;
//! println!("{}", serde_json::to_string_pretty(&report)?);
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod config;
pub mod errors;
pub mod logging;
pub mod prompts;
pub mod provider;
pub mod recovery;
pub mod resilience;

pub use analysis::{AnalysisMode, CompositeResult, Coordinator, DimensionResult};
pub use provider::{HttpTextGenerator, TextGenerator};
pub use recovery::{recover_structured, recover_structured_with_repair, DecodeResult};
pub use resilience::ResilientExecutor;
