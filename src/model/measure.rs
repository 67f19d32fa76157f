// src/model/measure.rs
//! Measure definitions: ordered component compositions plus the flags that
//! select non-generic calculation paths.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::model::filter::FilterLogic;
use crate::model::types::{
    Aggregation, MeasureCategory, Operation, Threshold, TimeIntelligence, Unit,
};

/// Where a component's number comes from.
///
/// A closed tagged union: the engine matches it exhaustively, so there is
/// no runtime "unknown source type" failure mode. `Conditional` branches
/// may not nest further conditionals; validation rejects that shape and the
/// engine refuses it if one slips through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ComponentSource {
    /// Aggregate a field over the matching rows of an external table.
    #[serde(rename_all = "camelCase")]
    Table {
        table_key: String,
        field_name: String,
    },
    /// The computed value of another measure.
    #[serde(rename_all = "camelCase")]
    Measure { measure_key: String },
    /// Choose between two sources based on the execution context.
    #[serde(rename_all = "camelCase")]
    Conditional {
        conditions: FilterLogic,
        primary: Box<ComponentSource>,
        fallback: Box<ComponentSource>,
    },
}

impl ComponentSource {
    pub fn table(table_key: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self::Table {
            table_key: table_key.into(),
            field_name: field_name.into(),
        }
    }

    pub fn measure(measure_key: impl Into<String>) -> Self {
        Self::Measure {
            measure_key: measure_key.into(),
        }
    }

    /// Collect every measure key this source can resolve through.
    pub(crate) fn collect_measure_keys(&self, keys: &mut BTreeSet<String>) {
        match self {
            ComponentSource::Table { .. } => {}
            ComponentSource::Measure { measure_key } => {
                keys.insert(measure_key.clone());
            }
            ComponentSource::Conditional {
                primary, fallback, ..
            } => {
                primary.collect_measure_keys(keys);
                fallback.collect_measure_keys(keys);
            }
        }
    }
}

/// One term in a measure's composition.
///
/// Components evaluate strictly in ascending `sort_order`; the component
/// with the lowest order seeds the running result and its operation is
/// never applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasureComponent {
    pub id: String,
    pub source: ComponentSource,
    #[serde(default)]
    pub aggregation: Option<Aggregation>,
    #[serde(default)]
    pub filters: Option<FilterLogic>,
    #[serde(default)]
    pub time_intelligence: Option<TimeIntelligence>,
    #[serde(default)]
    pub operation: Operation,
    #[serde(default)]
    pub sort_order: i32,
}

impl MeasureComponent {
    pub fn new(id: impl Into<String>, source: ComponentSource) -> Self {
        Self {
            id: id.into(),
            source,
            aggregation: None,
            filters: None,
            time_intelligence: None,
            operation: Operation::Add,
            sort_order: 0,
        }
    }

    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operation = operation;
        self
    }

    pub fn with_sort_order(mut self, sort_order: i32) -> Self {
        self.sort_order = sort_order;
        self
    }

    pub fn with_aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = Some(aggregation);
        self
    }

    pub fn with_filters(mut self, filters: FilterLogic) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn with_time_intelligence(mut self, time_intelligence: TimeIntelligence) -> Self {
        self.time_intelligence = Some(time_intelligence);
        self
    }
}

/// Which calculation path executes a measure.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CalculationKind {
    /// Generic component composition.
    #[default]
    Composition,
    /// Forward-projecting months-of-stock-cover: how many future months of
    /// issuance the stock measure's value sustains.
    #[serde(rename_all = "camelCase")]
    StockCover {
        stock_measure: String,
        issues_measure: String,
    },
    /// Scan an append-only raw-event table, newest first, for the latest
    /// event with a non-zero quantity.
    #[serde(rename_all = "camelCase")]
    DateLookup {
        table_key: String,
        date_field: String,
        quantity_field: String,
    },
}

/// Non-generic composition behaviors, declared on the measure instead of
/// being inferred from its key or category at run time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CompositionStrategy {
    /// Plain left-fold over the component operations.
    #[default]
    Standard,
    /// For a multiply at the second component: when the seed is zero or
    /// NaN but the multiplier is not zero, substitute multiplier times the
    /// named margin measure for the literal product.
    #[serde(rename_all = "camelCase")]
    MarginSubstitution { margin_measure: String },
    /// Ratio composition for percentage measures. `growth` computes
    /// (current - baseline) / baseline; plain computes current / baseline.
    /// A zero or non-finite baseline yields 0.
    Ratio { growth: bool },
}

/// Display and classification metadata carried on a measure.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MeasureMetadata {
    pub unit: Unit,
    pub category: MeasureCategory,
    pub thresholds: Vec<Threshold>,
    pub description: Option<String>,
}

/// A named, declaratively composed business metric.
///
/// Immutable after registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measure {
    pub key: String,
    #[serde(default)]
    pub components: Vec<MeasureComponent>,
    #[serde(default)]
    pub time_intelligence: Option<TimeIntelligence>,
    #[serde(default)]
    pub metadata: MeasureMetadata,
    #[serde(default)]
    pub calculation: CalculationKind,
    #[serde(default)]
    pub composition: CompositionStrategy,
}

impl Measure {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            components: Vec::new(),
            time_intelligence: None,
            metadata: MeasureMetadata::default(),
            calculation: CalculationKind::Composition,
            composition: CompositionStrategy::Standard,
        }
    }

    pub fn with_component(mut self, component: MeasureComponent) -> Self {
        self.components.push(component);
        self
    }

    pub fn with_time_intelligence(mut self, time_intelligence: TimeIntelligence) -> Self {
        self.time_intelligence = Some(time_intelligence);
        self
    }

    pub fn with_metadata(mut self, metadata: MeasureMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_calculation(mut self, calculation: CalculationKind) -> Self {
        self.calculation = calculation;
        self
    }

    pub fn with_composition(mut self, composition: CompositionStrategy) -> Self {
        self.composition = composition;
        self
    }

    /// Components in evaluation order (ascending `sort_order`, stable for
    /// equal orders).
    pub fn ordered_components(&self) -> Vec<&MeasureComponent> {
        let mut ordered: Vec<&MeasureComponent> = self.components.iter().collect();
        ordered.sort_by_key(|c| c.sort_order);
        ordered
    }

    /// Every measure key this measure can resolve through: component
    /// sources (both branches of a conditional), the stock-cover pair, and
    /// the substitution margin measure.
    pub fn referenced_measures(&self) -> BTreeSet<String> {
        let mut keys = BTreeSet::new();
        for component in &self.components {
            component.source.collect_measure_keys(&mut keys);
        }
        if let CalculationKind::StockCover {
            stock_measure,
            issues_measure,
        } = &self.calculation
        {
            keys.insert(stock_measure.clone());
            keys.insert(issues_measure.clone());
        }
        if let CompositionStrategy::MarginSubstitution { margin_measure } = &self.composition {
            keys.insert(margin_measure.clone());
        }
        keys
    }
}
