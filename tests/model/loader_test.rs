use tally::model::{
    registry_from_toml, Aggregation, CalculationKind, ComponentSource, CompositionStrategy,
    FilterOperator, LoadError, Operation, TimeIntelligenceKind, Unit,
};
use tally::validation;

const DEFINITIONS: &str = r#"
[[measures]]
key = "closingStock"

[measures.metadata]
unit = "quantity"
category = "stock"

[[measures.metadata.thresholds]]
label = "critical"
value = 100.0

[[measures.components]]
id = "onHand"
source = { type = "table", tableKey = "stockLevels", fieldName = "quantity" }
aggregation = "sum"

[[measures]]
key = "averageIssues"
timeIntelligence = { kind = "rolling", months = 6 }

[[measures.components]]
id = "issued"
source = { type = "table", tableKey = "movements", fieldName = "quantity" }
aggregation = "avg"
operation = "sum"

[measures.components.filters]
logic = "and"

[[measures.components.filters.conditions]]
column = "documentType"
operator = "eq"
value = "Goods Issue"

[[measures]]
key = "netIssues"

[[measures.components]]
id = "gross"
source = { type = "measure", measureKey = "averageIssues" }
sortOrder = 0

[[measures.components]]
id = "stock"
source = { type = "measure", measureKey = "closingStock" }
operation = "divide"
sortOrder = 1

[[measures]]
key = "monthsCover"
calculation = { type = "stockcover", stockMeasure = "closingStock", issuesMeasure = "averageIssues" }

[measures.metadata]
unit = "months"

[[measures]]
key = "issueRate"
composition = { type = "ratio", growth = true }

[measures.metadata]
unit = "percentage"

[[measures.components]]
id = "current"
source = { type = "table", tableKey = "movements", fieldName = "quantity" }
sortOrder = 0

[[measures.components]]
id = "baseline"
source = { type = "table", tableKey = "movements", fieldName = "quantity" }
operation = "divide"
timeIntelligence = { kind = "sameperiodlastyear" }
sortOrder = 1
"#;

#[test]
fn test_loads_full_definition_file() {
    let registry = registry_from_toml(DEFINITIONS).unwrap();
    assert_eq!(registry.len(), 5);

    let stock = registry.get("closingStock").unwrap();
    assert_eq!(stock.metadata.unit, Unit::Quantity);
    assert_eq!(stock.metadata.thresholds.len(), 1);
    assert_eq!(stock.components.len(), 1);
    assert_eq!(stock.components[0].aggregation, Some(Aggregation::Sum));
    assert!(matches!(
        &stock.components[0].source,
        ComponentSource::Table { table_key, field_name }
            if table_key == "stockLevels" && field_name == "quantity"
    ));
}

#[test]
fn test_wire_aliases_and_windows() {
    let registry = registry_from_toml(DEFINITIONS).unwrap();

    let average = registry.get("averageIssues").unwrap();
    // "avg" resolves to Average, "sum" is an alias for Add.
    assert_eq!(average.components[0].aggregation, Some(Aggregation::Average));
    assert_eq!(average.components[0].operation, Operation::Add);

    let window = average.time_intelligence.unwrap();
    assert_eq!(window.kind, TimeIntelligenceKind::Rolling);
    assert_eq!(window.months, Some(6));

    let filters = average.components[0].filters.as_ref().unwrap();
    assert_eq!(filters.conditions[0].operator, FilterOperator::Eq);
}

#[test]
fn test_calculation_and_composition_tags() {
    let registry = registry_from_toml(DEFINITIONS).unwrap();

    assert!(matches!(
        &registry.get("monthsCover").unwrap().calculation,
        CalculationKind::StockCover { stock_measure, issues_measure }
            if stock_measure == "closingStock" && issues_measure == "averageIssues"
    ));
    assert!(matches!(
        registry.get("issueRate").unwrap().composition,
        CompositionStrategy::Ratio { growth: true }
    ));
}

#[test]
fn test_unknown_aggregation_coerces_to_sum() {
    let registry = registry_from_toml(
        r#"
        [[measures]]
        key = "m"

        [[measures.components]]
        id = "c"
        source = { type = "table", tableKey = "t", fieldName = "f" }
        aggregation = "exoticAggregate"
        "#,
    )
    .unwrap();

    assert_eq!(
        registry.get("m").unwrap().components[0].aggregation,
        Some(Aggregation::Sum)
    );
}

#[test]
fn test_duplicate_keys_are_rejected() {
    let err = registry_from_toml(
        r#"
        [[measures]]
        key = "twice"

        [[measures.components]]
        id = "c"
        source = { type = "table", tableKey = "t", fieldName = "f" }

        [[measures]]
        key = "twice"

        [[measures.components]]
        id = "c"
        source = { type = "table", tableKey = "t", fieldName = "f" }
        "#,
    )
    .unwrap_err();

    assert!(matches!(err, LoadError::DuplicateKey(key) if key == "twice"));
}

#[test]
fn test_loaded_registry_validates_cleanly() {
    let registry = registry_from_toml(DEFINITIONS).unwrap();
    let report = validation::validate(&registry);
    assert!(report.is_ok(), "unexpected errors: {:?}", report.errors);
}

#[test]
fn test_validation_flags_broken_reference() {
    let registry = registry_from_toml(
        r#"
        [[measures]]
        key = "orphan"

        [[measures.components]]
        id = "dep"
        source = { type = "measure", measureKey = "noSuchMeasure" }
        "#,
    )
    .unwrap();

    let report = validation::validate(&registry);
    assert!(!report.is_ok());
}
