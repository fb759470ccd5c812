mod common;

use common::{USAGE_FIXTURE, fixture_path, usage_table};
use proptest::prelude::*;
use usage_series::{
    Aggregation, CompanySelection, Mode, Pipeline, RawCell, RawTable, Selection, StructuralError,
    config::{MissingMetricPolicy, MissingTotalPolicy, PipelineConfig},
    io_utils,
};

fn acme_january() -> RawTable {
    usage_table(&[
        ("Acme", "1era semana", "35%", 1, 2026),
        ("Acme", "2da semana", "40%", 1, 2026),
        ("Acme", "mes total", "38%", 1, 2026),
    ])
}

fn acme_selection(mode: Mode) -> Selection {
    Selection::new(CompanySelection::parse("Acme"))
        .with_years([2026])
        .with_months([1])
        .with_mode(mode)
}

fn ranked_values(pipeline: &Pipeline, table: &RawTable, selection: &Selection) -> Vec<(u8, f64)> {
    pipeline
        .run(table, selection)
        .expect("pipeline run")
        .points
        .iter()
        .map(|p| (p.period_rank, p.value))
        .collect()
}

fn load_fixture() -> RawTable {
    let encoding = io_utils::resolve_encoding(None).expect("utf-8");
    io_utils::read_raw_table_from_path(&fixture_path(USAGE_FIXTURE), None, encoding)
        .expect("fixture loads")
}

#[test]
fn detail_and_totals_views_of_one_month() {
    let table = acme_january();
    let pipeline = Pipeline::default();
    assert_eq!(
        ranked_values(&pipeline, &table, &acme_selection(Mode::Detail)),
        [(1, 0.35), (2, 0.40)]
    );
    assert_eq!(
        ranked_values(&pipeline, &table, &acme_selection(Mode::Totals)),
        [(6, 0.38)]
    );
}

#[test]
fn runs_are_idempotent() {
    let table = acme_january();
    let pipeline = Pipeline::default();
    for mode in [Mode::Totals, Mode::Detail, Mode::Everything] {
        let selection = acme_selection(mode);
        let first = pipeline.run(&table, &selection).expect("first run");
        let second = pipeline.run(&table, &selection).expect("second run");
        assert_eq!(first, second);
    }
}

#[test]
fn corrupted_years_are_excluded_and_counted() {
    let table = usage_table(&[
        ("Acme", "mes total", "38%", 1, 2026),
        ("Acme", "mes total", "90%", 1, 1899),
    ]);
    let report = Pipeline::default()
        .run(&table, &Selection::new(CompanySelection::All))
        .expect("run");
    assert_eq!(report.points.len(), 1);
    assert_eq!(report.points[0].year, 2026);
    assert_eq!(report.points[0].value, 0.38);
    assert_eq!(report.diagnostics.excluded_invalid_year, 1);
}

#[test]
fn unbindable_layout_is_structural() {
    let table = RawTable::new(["Empresa", "Semana"]);
    let err = Pipeline::default()
        .run(&table, &Selection::new(CompanySelection::All))
        .expect_err("too few columns");
    assert!(matches!(err, StructuralError::MissingRole { .. }));

    let err = Pipeline::default()
        .run(&RawTable::default(), &Selection::new(CompanySelection::All))
        .expect_err("no columns");
    assert_eq!(err, StructuralError::NoColumns);
}

#[test]
fn fixture_binds_every_role() {
    let table = load_fixture();
    let binding = Pipeline::default().bind(&table).expect("binding");
    assert_eq!(binding.company.label, "Empresa");
    assert_eq!(binding.period_label.label, "Semana");
    assert_eq!(binding.metric.label, "% Usabilidad");
    assert_eq!(binding.month.label, "Mes");
    assert_eq!(binding.year.label, "Año");
    assert_eq!(binding.numerator.as_ref().map(|c| c.index), Some(4));
    assert_eq!(binding.denominator.as_ref().map(|c| c.index), Some(5));
}

#[test]
fn fixture_totals_for_all_companies() {
    let table = load_fixture();
    let pipeline = Pipeline::default();
    let selection = Selection::new(CompanySelection::All).with_years([2026]);

    let mean = pipeline.run(&table, &selection).expect("mean");
    assert_eq!(mean.points.len(), 1);
    assert!((mean.points[0].value - 0.34).abs() < 1e-12);
    assert_eq!(mean.points[0].count, 2);
    assert_eq!(mean.diagnostics.unknown_company, 1);
    assert_eq!(mean.diagnostics.unparseable_metric, 1);

    let weighted = pipeline
        .run(&table, &selection.clone().with_aggregation(Aggregation::Weighted))
        .expect("weighted");
    assert!((weighted.points[0].value - 128.0 / 400.0).abs() < 1e-12);
}

#[test]
fn fixture_detail_merges_labels_across_companies() {
    let table = load_fixture();
    let selection = Selection::new(CompanySelection::All)
        .with_months([1])
        .with_mode(Mode::Detail);
    let report = Pipeline::default().run(&table, &selection).expect("run");
    let points: Vec<(u8, f64, usize)> = report
        .points
        .iter()
        .map(|p| (p.period_rank, p.value, p.count))
        .collect();
    assert_eq!(points.len(), 2);
    assert_eq!(points[0].0, 1);
    assert!((points[0].1 - 0.275).abs() < 1e-12);
    assert_eq!(points[0].2, 2);
    assert_eq!(points[1].0, 2);
    assert!((points[1].1 - 0.40).abs() < 1e-12);
}

#[test]
fn fixture_missing_total_policies() {
    let table = load_fixture();
    let selection = Selection::new(CompanySelection::parse("Acme")).with_years([2026]);

    let omitted = Pipeline::default().run(&table, &selection).expect("omit");
    let months: Vec<i32> = omitted.points.iter().map(|p| p.month).collect();
    assert_eq!(months, [1]);

    let config = PipelineConfig {
        missing_total: MissingTotalPolicy::LastSubPeriod,
        missing_metric: MissingMetricPolicy::Exclude,
        ..PipelineConfig::default()
    };
    let synthesized = Pipeline::new(config).run(&table, &selection).expect("synth");
    assert_eq!(synthesized.diagnostics.aggregation.synthesized_totals, 1);
    // February's last week has no usable metric, so its first week stands in.
    assert_eq!(synthesized.diagnostics.aggregation.excluded_degraded_metric, 0);
    let series: Vec<(i32, f64, bool)> = synthesized
        .points
        .iter()
        .map(|p| (p.month, p.value, p.synthetic))
        .collect();
    assert_eq!(series, [(1, 0.38, false), (2, 0.50, true)]);
}

#[test]
fn sheets_concatenate_before_binding() {
    let january = acme_january();
    let february = usage_table(&[("Acme", "mes total", "41%", 2, 2026)]);
    let table = RawTable::concat([january, february]);
    let report = Pipeline::default()
        .run(&table, &Selection::new(CompanySelection::parse("Acme")))
        .expect("run");
    let series: Vec<(i32, f64)> = report.points.iter().map(|p| (p.month, p.value)).collect();
    assert_eq!(series, [(1, 0.38), (2, 0.41)]);
}

#[test]
fn unlabeled_sheets_fall_back_to_positions() {
    let headers: Vec<String> = (0..12).map(|i| format!("col{i}")).collect();
    let mut table = RawTable::new(&headers);
    let mut row = vec![RawCell::Empty; 12];
    row[0] = RawCell::from("Acme");
    row[1] = RawCell::from("mes total");
    row[7] = RawCell::from("0.5");
    row[9] = RawCell::from(3);
    row[11] = RawCell::from(2026);
    table.push_row(row);

    let report = Pipeline::default()
        .run(&table, &Selection::new(CompanySelection::All))
        .expect("run");
    assert_eq!(report.points.len(), 1);
    assert_eq!((report.points[0].month, report.points[0].value), (3, 0.5));
}

fn arbitrary_cell() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just("nan".to_string()),
        Just("None".to_string()),
        Just("mes total".to_string()),
        Just("2da semana".to_string()),
        "[0-9]{1,4}([.,][0-9]{1,3})?%?",
        "\\PC{0,10}",
    ]
}

proptest! {
    #[test]
    fn any_cell_content_completes(
        rows in proptest::collection::vec(proptest::collection::vec(arbitrary_cell(), 5), 0..25),
        mode in prop_oneof![Just(Mode::Totals), Just(Mode::Detail), Just(Mode::Everything)],
    ) {
        let mut table = RawTable::new(["Empresa", "Semana", "%", "Mes", "Año"]);
        for row in &rows {
            table.push_row(row.iter().map(|cell| RawCell::from(cell.as_str())));
        }
        let selection = Selection::new(CompanySelection::All).with_mode(mode);
        let report = Pipeline::default().run(&table, &selection);
        prop_assert!(report.is_ok());
        let report = report.unwrap();
        prop_assert_eq!(report.diagnostics.total_rows, rows.len());
        prop_assert_eq!(report.warning.is_some(), report.points.is_empty());
        let ordered = report.points.windows(2).all(|w| {
            (w[0].year, w[0].month, w[0].period_rank) <= (w[1].year, w[1].month, w[1].period_rank)
        });
        prop_assert!(ordered);
    }
}
