//! # Tally
//!
//! A declarative measure-calculation engine with dependency-aware batch
//! execution.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │          Measure Definitions (TOML or code)              │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [loader + validation]
//! ┌─────────────────────────────────────────────────────────┐
//! │                  MeasureRegistry                         │
//! │        + DependencyGraph (closure, order, levels)        │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [orchestrator]
//! ┌─────────────────────────────────────────────────────────┐
//! │     Level-sequential / measure-parallel scheduling       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [engine]
//! ┌─────────────────────────────────────────────────────────┐
//! │   Component composition · stock cover · date lookup      │
//! │   (table executor, filter evaluator, time windows)       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │          TableSource / CodeLookup (external)             │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Measures are declared as ordered compositions of table-sourced or
//! measure-sourced components. A batch request expands to the transitive
//! dependency closure, orders it topologically, groups it into levels, and
//! executes level by level — measures within a level run concurrently,
//! failures are isolated to a NaN sentinel, and only the requested keys
//! are returned.

pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod model;
pub mod registry;
pub mod source;
pub mod time;
pub mod validation;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::config::EngineSettings;
    pub use crate::engine::{
        CalculationEngine, CalculationOrchestrator, ExecutionPlan, ValueCache, VisitChain,
    };
    pub use crate::error::{EngineError, EngineResult};
    pub use crate::model::{
        Aggregation, CalculationKind, ComponentSource, CompositionStrategy, DateRange,
        ExecutionContext, ExecutionFilters, FilterCondition, FilterLogic, FilterMode,
        FilterOperator, FilterValue, Measure, MeasureCategory, MeasureComponent, MeasureMetadata,
        Operation, Threshold, TimeIntelligence, TimeIntelligenceKind, Unit,
    };
    pub use crate::registry::{DependencyGraph, MeasureRegistry};
    pub use crate::source::{
        CodeLookup, Record, SourceError, SourceResult, StaticCodeLookup, StaticTableSource,
        TableSource,
    };
}

// Also export the core surface at the crate root for convenience.
pub use engine::{CalculationEngine, CalculationOrchestrator, ExecutionPlan};
pub use error::{EngineError, EngineResult};
pub use model::{ExecutionContext, ExecutionFilters, Measure};
pub use registry::MeasureRegistry;
pub use source::{CodeLookup, Record, TableSource};
