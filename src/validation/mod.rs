//! Pre-flight validation of a loaded measure registry.
//!
//! Catches definition mistakes before the engine trips over them at run
//! time. Diagnostics are plain data: errors for shapes the engine will
//! refuse or fail on, warnings for shapes that execute but rarely mean
//! what the author intended.

use std::collections::HashSet;
use std::fmt;

use crate::model::measure::{
    CalculationKind, ComponentSource, CompositionStrategy, Measure,
};
use crate::model::types::{Operation, Unit};
use crate::registry::MeasureRegistry;

/// A definition mistake the engine will fail on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A component, stock-cover pair, or margin strategy references a
    /// measure key that is not registered.
    UnknownMeasureReference { measure: String, reference: String },

    /// A conditional source nests another conditional.
    NestedConditional { measure: String, component: String },

    /// Two components of one measure share a sort order; evaluation order
    /// between them would be arbitrary.
    DuplicateSortOrder { measure: String, sort_order: i32 },

    /// A composition measure with no components computes nothing.
    EmptyComposition { measure: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::UnknownMeasureReference { measure, reference } => {
                write!(
                    f,
                    "measure '{}' references unregistered measure '{}'",
                    measure, reference
                )
            }
            ValidationError::NestedConditional { measure, component } => {
                write!(
                    f,
                    "measure '{}' component '{}' nests a conditional source",
                    measure, component
                )
            }
            ValidationError::DuplicateSortOrder { measure, sort_order } => {
                write!(
                    f,
                    "measure '{}' has multiple components with sort order {}",
                    measure, sort_order
                )
            }
            ValidationError::EmptyComposition { measure } => {
                write!(f, "measure '{}' has no components", measure)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// A suspicious-but-executable definition shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationWarning {
    /// A percentage measure dividing without a ratio strategy composes as
    /// a plain quotient.
    PercentageWithoutRatio { measure: String },

    /// The first component's operation is never applied; anything but the
    /// default is probably a mistake.
    SeedOperationIgnored { measure: String, component: String },
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationWarning::PercentageWithoutRatio { measure } => {
                write!(
                    f,
                    "percentage measure '{}' divides without a ratio strategy",
                    measure
                )
            }
            ValidationWarning::SeedOperationIgnored { measure, component } => {
                write!(
                    f,
                    "measure '{}' component '{}' seeds the result; its operation is ignored",
                    measure, component
                )
            }
        }
    }
}

/// Outcome of validating a registry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate every definition in a registry.
pub fn validate(registry: &MeasureRegistry) -> ValidationReport {
    let mut report = ValidationReport::default();
    let mut measures: Vec<&Measure> = registry.measures().collect();
    measures.sort_by(|a, b| a.key.cmp(&b.key));

    for measure in measures {
        validate_references(registry, measure, &mut report);
        validate_components(measure, &mut report);
    }
    report
}

fn validate_references(
    registry: &MeasureRegistry,
    measure: &Measure,
    report: &mut ValidationReport,
) {
    for reference in measure.referenced_measures() {
        if !registry.contains(&reference) {
            report.errors.push(ValidationError::UnknownMeasureReference {
                measure: measure.key.clone(),
                reference,
            });
        }
    }
}

fn validate_components(measure: &Measure, report: &mut ValidationReport) {
    if measure.components.is_empty() {
        if matches!(measure.calculation, CalculationKind::Composition) {
            report.errors.push(ValidationError::EmptyComposition {
                measure: measure.key.clone(),
            });
        }
        return;
    }

    let mut seen_orders = HashSet::new();
    for component in &measure.components {
        if !seen_orders.insert(component.sort_order) {
            report.errors.push(ValidationError::DuplicateSortOrder {
                measure: measure.key.clone(),
                sort_order: component.sort_order,
            });
        }

        if let ComponentSource::Conditional {
            primary, fallback, ..
        } = &component.source
        {
            let nested = matches!(primary.as_ref(), ComponentSource::Conditional { .. })
                || matches!(fallback.as_ref(), ComponentSource::Conditional { .. });
            if nested {
                report.errors.push(ValidationError::NestedConditional {
                    measure: measure.key.clone(),
                    component: component.id.clone(),
                });
            }
        }
    }

    let ordered = measure.ordered_components();
    if let Some(seed) = ordered.first() {
        if seed.operation != Operation::Add {
            report.warnings.push(ValidationWarning::SeedOperationIgnored {
                measure: measure.key.clone(),
                component: seed.id.clone(),
            });
        }
    }

    let divides = ordered.iter().skip(1).any(|c| c.operation == Operation::Divide);
    let has_ratio = matches!(measure.composition, CompositionStrategy::Ratio { .. });
    if measure.metadata.unit == Unit::Percentage && divides && !has_ratio {
        report.warnings.push(ValidationWarning::PercentageWithoutRatio {
            measure: measure.key.clone(),
        });
    }
}
