//! Measure model types.
//!
//! Everything a measure definition is made of: component sources, filter
//! logic, time windows, execution context, and the TOML loader for static
//! definition files.

pub mod context;
pub mod filter;
pub mod loader;
pub mod measure;
pub mod types;

pub use context::{ExecutionContext, ExecutionFilters, COUNTRY_FIELD, SKU_FIELD};
pub use filter::{FilterCondition, FilterLogic, FilterMode, FilterOperator, FilterValue};
pub use loader::{registry_from_path, registry_from_toml, LoadError};
pub use measure::{
    CalculationKind, ComponentSource, CompositionStrategy, Measure, MeasureComponent,
    MeasureMetadata,
};
pub use types::{
    Aggregation, DateRange, MeasureCategory, Operation, Threshold, TimeIntelligence,
    TimeIntelligenceKind, Unit,
};
