use std::sync::Arc;

use tally::engine::CalculationEngine;
use tally::error::EngineError;
use tally::model::{
    CalculationKind, ComponentSource, CompositionStrategy, ExecutionContext, ExecutionFilters,
    FilterCondition, FilterLogic, FilterOperator, Measure, MeasureComponent, MeasureMetadata,
    Operation, TimeIntelligence, TimeIntelligenceKind, Unit,
};
use tally::registry::MeasureRegistry;
use tally::source::{Record, StaticCodeLookup, StaticTableSource};

fn engine(
    measures: Vec<Measure>,
    source: StaticTableSource,
) -> CalculationEngine<StaticTableSource> {
    CalculationEngine::new(
        Arc::new(MeasureRegistry::from_measures(measures)),
        Arc::new(source),
        Arc::new(StaticCodeLookup::new()),
    )
}

fn march() -> ExecutionContext {
    ExecutionContext::new().with_month(2024, 3)
}

fn no_filters() -> ExecutionFilters {
    ExecutionFilters::new()
}

/// A dated row with a quantity.
fn row(date: &str, quantity: f64) -> Record {
    Record::new().with("date", date).with("quantity", quantity)
}

/// A measure summing `quantity` over one table.
fn summing(key: &str, table: &str) -> Measure {
    Measure::new(key).with_component(MeasureComponent::new(
        "seed",
        ComponentSource::table(table, "quantity"),
    ))
}

#[tokio::test]
async fn test_table_component_sums_target_month() {
    let source = StaticTableSource::new().with_table(
        "stockLevels",
        vec![
            row("2024-03-05", 120.0),
            row("2024-03-21", 80.0),
            // Outside the derived month range.
            row("2024-02-28", 999.0),
            row("2024-04-01", 999.0),
        ],
    );
    let engine = engine(vec![summing("closingStock", "stockLevels")], source);

    let value = engine
        .execute("closingStock", &no_filters(), &march())
        .await
        .unwrap();
    assert_eq!(value, 200.0);
}

#[tokio::test]
async fn test_subtract_and_multiply_chain() {
    let source = StaticTableSource::new()
        .with_table("inflow", vec![row("2024-03-01", 100.0)])
        .with_table("outflow", vec![row("2024-03-01", 30.0)])
        .with_table("factor", vec![row("2024-03-01", 2.0)]);

    let measure = Measure::new("netDoubled")
        .with_component(
            MeasureComponent::new("in", ComponentSource::table("inflow", "quantity"))
                .with_sort_order(0),
        )
        .with_component(
            MeasureComponent::new("out", ComponentSource::table("outflow", "quantity"))
                .with_operation(Operation::Subtract)
                .with_sort_order(1),
        )
        .with_component(
            MeasureComponent::new("scale", ComponentSource::table("factor", "quantity"))
                .with_operation(Operation::Multiply)
                .with_sort_order(2),
        );

    let engine = engine(vec![measure], source);
    let value = engine
        .execute("netDoubled", &no_filters(), &march())
        .await
        .unwrap();
    assert_eq!(value, 140.0);
}

#[tokio::test]
async fn test_components_compose_in_sort_order_not_declaration_order() {
    let source = StaticTableSource::new()
        .with_table("a", vec![row("2024-03-01", 10.0)])
        .with_table("b", vec![row("2024-03-01", 4.0)]);

    // Declared subtrahend-first; sort order still makes "a" the seed.
    let measure = Measure::new("ordered")
        .with_component(
            MeasureComponent::new("second", ComponentSource::table("b", "quantity"))
                .with_operation(Operation::Subtract)
                .with_sort_order(5),
        )
        .with_component(
            MeasureComponent::new("first", ComponentSource::table("a", "quantity"))
                .with_sort_order(1),
        );

    let engine = engine(vec![measure], source);
    let value = engine
        .execute("ordered", &no_filters(), &march())
        .await
        .unwrap();
    assert_eq!(value, 6.0);
}

#[tokio::test]
async fn test_divide_by_zero_yields_zero() {
    let source = StaticTableSource::new()
        .with_table("numerator", vec![row("2024-03-01", 100.0)])
        .with_table("denominator", vec![]);

    let measure = Measure::new("ratio")
        .with_component(
            MeasureComponent::new("num", ComponentSource::table("numerator", "quantity"))
                .with_sort_order(0),
        )
        .with_component(
            MeasureComponent::new("den", ComponentSource::table("denominator", "quantity"))
                .with_operation(Operation::Divide)
                .with_sort_order(1),
        );

    let engine = engine(vec![measure], source);
    let value = engine
        .execute("ratio", &no_filters(), &march())
        .await
        .unwrap();
    assert_eq!(value, 0.0);
}

#[tokio::test]
async fn test_fallback_prefers_well_defined_result() {
    let source = StaticTableSource::new()
        .with_table("primary", vec![row("2024-03-01", 7.0)])
        .with_table("secondary", vec![row("2024-03-01", 42.0)]);

    let measure = Measure::new("withFallback")
        .with_component(
            MeasureComponent::new("main", ComponentSource::table("primary", "quantity"))
                .with_sort_order(0),
        )
        .with_component(
            MeasureComponent::new("alt", ComponentSource::table("secondary", "quantity"))
                .with_operation(Operation::Fallback)
                .with_sort_order(1),
        );

    let engine = engine(vec![measure], source);
    let value = engine
        .execute("withFallback", &no_filters(), &march())
        .await
        .unwrap();
    assert_eq!(value, 7.0);
}

#[tokio::test]
async fn test_fallback_replaces_zero_result() {
    let source = StaticTableSource::new()
        .with_table("primary", vec![])
        .with_table("secondary", vec![row("2024-03-01", 42.0)]);

    let measure = Measure::new("withFallback")
        .with_component(
            MeasureComponent::new("main", ComponentSource::table("primary", "quantity"))
                .with_sort_order(0),
        )
        .with_component(
            MeasureComponent::new("alt", ComponentSource::table("secondary", "quantity"))
                .with_operation(Operation::Fallback)
                .with_sort_order(1),
        );

    let engine = engine(vec![measure], source);
    let value = engine
        .execute("withFallback", &no_filters(), &march())
        .await
        .unwrap();
    assert_eq!(value, 42.0);
}

fn sales_row(date: &str, amount: f64) -> Record {
    Record::new().with("date", date).with("amount", amount)
}

fn ratio_measure(key: &str, growth: bool) -> Measure {
    Measure::new(key)
        .with_component(
            MeasureComponent::new("current", ComponentSource::table("sales", "amount"))
                .with_sort_order(0),
        )
        .with_component(
            MeasureComponent::new("baseline", ComponentSource::table("sales", "amount"))
                .with_operation(Operation::Divide)
                .with_time_intelligence(TimeIntelligence::of(
                    TimeIntelligenceKind::SamePeriodLastYear,
                ))
                .with_sort_order(1),
        )
        .with_composition(CompositionStrategy::Ratio { growth })
        .with_metadata(MeasureMetadata {
            unit: Unit::Percentage,
            ..MeasureMetadata::default()
        })
}

#[tokio::test]
async fn test_growth_ratio_composition() {
    let source = StaticTableSource::new().with_table(
        "sales",
        vec![sales_row("2024-03-10", 250.0), sales_row("2023-03-10", 200.0)],
    );
    let engine = engine(vec![ratio_measure("salesGrowth", true)], source);

    let value = engine
        .execute("salesGrowth", &no_filters(), &march())
        .await
        .unwrap();
    assert!((value - 0.25).abs() < 1e-9);
}

#[tokio::test]
async fn test_plain_ratio_composition() {
    let source = StaticTableSource::new().with_table(
        "sales",
        vec![sales_row("2024-03-10", 250.0), sales_row("2023-03-10", 200.0)],
    );
    let engine = engine(vec![ratio_measure("salesIndex", false)], source);

    let value = engine
        .execute("salesIndex", &no_filters(), &march())
        .await
        .unwrap();
    assert!((value - 1.25).abs() < 1e-9);
}

#[tokio::test]
async fn test_ratio_guards_zero_baseline() {
    let source = StaticTableSource::new()
        .with_table("sales", vec![sales_row("2024-03-10", 250.0)]);
    let engine = engine(vec![ratio_measure("salesGrowth", true)], source);

    let value = engine
        .execute("salesGrowth", &no_filters(), &march())
        .await
        .unwrap();
    assert_eq!(value, 0.0);
}

#[tokio::test]
async fn test_margin_substitution_on_empty_seed() {
    let sku_row = |date: &str, qty: f64| {
        Record::new()
            .with("date", date)
            .with("countryId", "DE")
            .with("skuId", "S1")
            .with("quantity", qty)
    };
    let source = StaticTableSource::new()
        // No issue movements at all: the seed aggregates to zero.
        .with_table("movements", vec![])
        .with_table("openOrders", vec![sku_row("2024-03-12", 40.0)])
        // Margin rows carry no sku: the table is country-scoped.
        .with_table(
            "procurementMargins",
            vec![Record::new().with("countryId", "DE").with("margin", 1.2)],
        );

    let issues = Measure::new("issuesFromStock")
        .with_component(
            MeasureComponent::new("issued", ComponentSource::table("movements", "quantity"))
                .with_sort_order(0),
        )
        .with_component(
            MeasureComponent::new("ordered", ComponentSource::table("openOrders", "quantity"))
                .with_operation(Operation::Multiply)
                .with_sort_order(1),
        )
        .with_composition(CompositionStrategy::MarginSubstitution {
            margin_measure: "procurementSafeMargin".to_string(),
        });
    let margin = Measure::new("procurementSafeMargin").with_component(MeasureComponent::new(
        "seed",
        ComponentSource::table("procurementMargins", "margin"),
    ));

    let engine = engine(vec![issues, margin], source);
    let context = march().with_country("DE").with_sku("S1");

    let value = engine
        .execute("issuesFromStock", &no_filters(), &context)
        .await
        .unwrap();
    assert!((value - 48.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_margin_substitution_skipped_when_seed_present() {
    let source = StaticTableSource::new()
        .with_table("movements", vec![row("2024-03-02", 10.0)])
        .with_table("openOrders", vec![row("2024-03-12", 40.0)])
        .with_table(
            "procurementMargins",
            vec![Record::new().with("margin", 1.2)],
        );

    let issues = Measure::new("issuesFromStock")
        .with_component(
            MeasureComponent::new("issued", ComponentSource::table("movements", "quantity"))
                .with_sort_order(0),
        )
        .with_component(
            MeasureComponent::new("ordered", ComponentSource::table("openOrders", "quantity"))
                .with_operation(Operation::Multiply)
                .with_sort_order(1),
        )
        .with_composition(CompositionStrategy::MarginSubstitution {
            margin_measure: "procurementSafeMargin".to_string(),
        });
    let margin = Measure::new("procurementSafeMargin").with_component(MeasureComponent::new(
        "seed",
        ComponentSource::table("procurementMargins", "margin"),
    ));

    let engine = engine(vec![issues, margin], source);
    let value = engine
        .execute("issuesFromStock", &no_filters(), &march())
        .await
        .unwrap();
    // Ordinary multiply: 10 * 40.
    assert_eq!(value, 400.0);
}

#[tokio::test]
async fn test_conditional_source_branches_on_context() {
    let sku_demand = Record::new()
        .with("date", "2024-03-10")
        .with("countryId", "DE")
        .with("skuId", "S1")
        .with("quantity", 10.0);
    let country_demand = Record::new()
        .with("date", "2024-03-10")
        .with("countryId", "DE")
        .with("quantity", 99.0);

    let source = StaticTableSource::new()
        .with_table("skuDemand", vec![sku_demand])
        .with_table("countryDemand", vec![country_demand]);

    let measure = Measure::new("demand").with_component(MeasureComponent::new(
        "seed",
        ComponentSource::Conditional {
            conditions: FilterLogic::all(vec![FilterCondition::bare(
                "skuId",
                FilterOperator::IsNotNull,
            )]),
            primary: Box::new(ComponentSource::table("skuDemand", "quantity")),
            fallback: Box::new(ComponentSource::table("countryDemand", "quantity")),
        },
    ));

    let engine = engine(vec![measure], source);

    let sku_scoped = march().with_country("DE").with_sku("S1");
    let value = engine
        .execute("demand", &no_filters(), &sku_scoped)
        .await
        .unwrap();
    assert_eq!(value, 10.0);

    let country_scoped = march().with_country("DE");
    let value = engine
        .execute("demand", &no_filters(), &country_scoped)
        .await
        .unwrap();
    assert_eq!(value, 99.0);
}

#[tokio::test]
async fn test_measure_level_time_intelligence_scopes_components() {
    let source = StaticTableSource::new().with_table(
        "sales",
        vec![
            sales_row("2024-01-05", 100.0),
            sales_row("2024-02-05", 50.0),
            sales_row("2024-03-05", 25.0),
            sales_row("2023-12-05", 999.0),
        ],
    );

    let measure = Measure::new("ytdSales")
        .with_component(MeasureComponent::new(
            "seed",
            ComponentSource::table("sales", "amount"),
        ))
        .with_time_intelligence(TimeIntelligence::of(TimeIntelligenceKind::Ytd));

    let engine = engine(vec![measure], source);
    let value = engine
        .execute("ytdSales", &no_filters(), &march())
        .await
        .unwrap();
    assert_eq!(value, 175.0);
}

#[tokio::test]
async fn test_date_lookup_returns_latest_nonzero_event() {
    let source = StaticTableSource::new().with_table(
        "movements",
        vec![
            row("2024-03-05", 0.0),
            row("2024-02-20", 5.0),
            row("2024-01-10", 3.0),
        ],
    );

    let measure = Measure::new("lastIssueDate").with_calculation(CalculationKind::DateLookup {
        table_key: "movements".to_string(),
        date_field: "date".to_string(),
        quantity_field: "quantity".to_string(),
    });

    let engine = engine(vec![measure], source);
    let value = engine
        .execute("lastIssueDate", &no_filters(), &march())
        .await
        .unwrap();
    assert_eq!(value, 20240220.0);
}

#[tokio::test]
async fn test_date_lookup_without_qualifying_event_is_nan() {
    let source = StaticTableSource::new().with_table("movements", vec![row("2024-03-05", 0.0)]);

    let measure = Measure::new("lastIssueDate").with_calculation(CalculationKind::DateLookup {
        table_key: "movements".to_string(),
        date_field: "date".to_string(),
        quantity_field: "quantity".to_string(),
    });

    let engine = engine(vec![measure], source);
    let value = engine
        .execute("lastIssueDate", &no_filters(), &march())
        .await
        .unwrap();
    assert!(value.is_nan());
}

#[tokio::test]
async fn test_table_fetch_errors_propagate() {
    let failing = CalculationEngine::new(
        Arc::new(MeasureRegistry::from_measures(vec![summing(
            "closingStock",
            "stockLevels",
        )])),
        Arc::new(tally::source::FailingTableSource),
        Arc::new(StaticCodeLookup::new()),
    );

    let err = failing
        .execute("closingStock", &no_filters(), &march())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::TableFetch { .. }));
}

#[tokio::test]
async fn test_missing_measure_fails() {
    let engine = engine(vec![], StaticTableSource::new());
    let err = engine
        .execute("ghost", &no_filters(), &march())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::MeasureNotFound { .. }));
}

#[tokio::test]
async fn test_recursive_cycle_reports_chain() {
    let a = Measure::new("a").with_component(MeasureComponent::new(
        "dep",
        ComponentSource::measure("b"),
    ));
    let b = Measure::new("b").with_component(MeasureComponent::new(
        "dep",
        ComponentSource::measure("a"),
    ));

    let engine = engine(vec![a, b], StaticTableSource::new());
    let err = engine
        .execute("a", &no_filters(), &march())
        .await
        .unwrap_err();

    match err {
        EngineError::CircularDependency { chain } => {
            assert_eq!(chain, vec!["a", "b", "a"]);
        }
        other => panic!("expected CircularDependency, got {other:?}"),
    }
}

#[tokio::test]
async fn test_values_are_cached_per_context() {
    let source = StaticTableSource::new()
        .with_table("stockLevels", vec![row("2024-03-05", 120.0)]);
    let engine = engine(vec![summing("closingStock", "stockLevels")], source);

    assert_eq!(engine.cached_values(), 0);
    engine
        .execute("closingStock", &no_filters(), &march())
        .await
        .unwrap();
    assert_eq!(engine.cached_values(), 1);

    // A different context is a different entry.
    let april = ExecutionContext::new().with_month(2024, 4);
    engine
        .execute("closingStock", &no_filters(), &april)
        .await
        .unwrap();
    assert_eq!(engine.cached_values(), 2);

    engine.clear_cache();
    assert_eq!(engine.cached_values(), 0);
}
