//! Capa de resiliencia
//!
//! Timeout, reintentos, circuit breaking y fallback para las llamadas al
//! proveedor de modelos. El estado mutable (breakers, registros de
//! operaciones) vive dentro de [`ResilientExecutor`], que se crea una vez y
//! se comparte.

pub mod breaker;
pub mod executor;

pub use breaker::{BreakerError, BreakerRegistry, BreakerState, CircuitBreaker};
pub use executor::{
    EnrichedError, ExecutionOptions, OperationRecord, OperationStatus, ResilientExecutor,
};
