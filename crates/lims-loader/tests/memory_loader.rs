//! Tests for the in-memory loader answering store requests directly.

mod common;

use std::collections::BTreeSet;

use common::{blood_loader, blood_model, blood_query, keys, model};
use lims_loader::{LoaderOp, MemoryLoader, Phase};
use lims_model::{Filter, FilterOperator, QueryConfig, SchemaQuery, Sort};
use lims_store::{LoaderError, QueryModelLoader};

#[tokio::test]
async fn query_info_lists_columns_and_views() {
    let loader = blood_loader(5);
    let info = loader
        .load_query_info(&blood_model())
        .await
        .expect("query info");

    let names: Vec<&str> = info.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["RowId", "Name", "Status", "Volume"]);
    assert_eq!(info.pk_columns()[0].name, "RowId");
    assert!(info.view(Some("recent")).is_some());
    assert!(info.view(None).is_some());
}

#[tokio::test]
async fn unknown_queries_and_views_are_not_found() {
    let loader = blood_loader(5);
    let missing = model(QueryConfig::new(
        SchemaQuery::new("samples", "Urine").expect("schema query"),
    ));
    assert!(matches!(
        loader.load_query_info(&missing).await,
        Err(LoaderError::NotFound { .. })
    ));

    let mut with_view = blood_model();
    with_view.schema_query = blood_query().with_view(Some("Archive".to_string()));
    let error = loader.load_rows(&with_view).await.expect_err("no such view");
    assert_eq!(error.to_string(), "view Archive not found");
}

#[tokio::test]
async fn rows_are_filtered_sorted_and_paged() {
    let loader = blood_loader(25);
    let mut model = model(
        QueryConfig::new(blood_query())
            .with_max_rows(5)
            .with_sorts(vec![Sort::desc("RowId")]),
    );
    model.filters = vec![Filter::equal("Status", "active")];
    model.offset = 10;

    let page = loader.load_rows(&model).await.expect("rows");
    assert_eq!(page.row_count, 12);
    assert_eq!(page.ordered_rows, keys([4, 2]));
    assert_eq!(page.rows.len(), 2);
}

#[tokio::test]
async fn unpaged_models_get_every_row() {
    let loader = blood_loader(25);
    let model = model(QueryConfig::new(blood_query()).with_max_rows(0));
    let page = loader.load_rows(&model).await.expect("rows");
    assert_eq!(page.ordered_rows.len(), 25);
    assert_eq!(page.row_count, 25);
}

#[tokio::test]
async fn view_supplies_filters_and_default_sorts() {
    let loader = blood_loader(10);
    let mut model = blood_model();
    model.schema_query = blood_query().with_view(Some("Recent".to_string()));

    let page = loader.load_rows(&model).await.expect("rows");
    assert_eq!(page.ordered_rows, keys([10, 8, 6, 4, 2]));

    model.sorts = vec![Sort::asc("RowId")];
    let page = loader.load_rows(&model).await.expect("rows");
    assert_eq!(page.ordered_rows, keys([2, 4, 6, 8, 10]));
}

#[tokio::test]
async fn base_and_search_filters_apply() {
    let loader = blood_loader(25);
    let mut model = model(
        QueryConfig::new(blood_query())
            .with_base_filters(vec![Filter::without_value("Volume", FilterOperator::IsBlank)]),
    );
    let page = loader.load_rows(&model).await.expect("rows");
    assert_eq!(page.ordered_rows, keys([5, 10, 15, 20, 25]));

    model.filters = vec![Filter::search("sample 1")];
    let page = loader.load_rows(&model).await.expect("rows");
    assert_eq!(page.ordered_rows, keys([10, 15]));
}

#[tokio::test]
async fn selections_follow_mutations() {
    let loader = blood_loader(10);
    let model = blood_model();

    loader
        .set_selections(&model, true, &keys([1, 2, 3]))
        .await
        .expect("select");
    loader
        .set_selections(&model, false, &keys([2]))
        .await
        .expect("deselect");
    assert_eq!(
        loader.load_selections(&model).await.expect("load"),
        keys([1, 3]).into_iter().collect::<BTreeSet<_>>()
    );

    loader
        .replace_selections(&model, &keys([7]))
        .await
        .expect("replace");
    assert_eq!(loader.selections("blood"), BTreeSet::from(["7".to_string()]));

    loader.clear_selections(&model).await.expect("clear");
    assert!(loader.selections("blood").is_empty());
}

#[tokio::test]
async fn select_all_honours_filters() {
    let loader = blood_loader(10);
    loader.seed_selections("blood", ["1"]);
    let mut model = blood_model();
    model.filters = vec![Filter::equal("Status", "Active")];

    let selected = loader.select_all_rows(&model).await.expect("select all");
    assert_eq!(
        selected,
        keys([1, 2, 4, 6, 8, 10]).into_iter().collect::<BTreeSet<_>>()
    );
}

#[tokio::test]
async fn charts_hide_sample_comparisons_unless_asked() {
    let loader = blood_loader(3);
    let model = blood_model();

    let charts = loader.load_charts(&model, false).await.expect("charts");
    assert_eq!(charts.len(), 1);
    assert_eq!(charts[0].report_id, "db:1");

    let charts = loader.load_charts(&model, true).await.expect("charts");
    assert_eq!(charts.len(), 2);
}

#[tokio::test]
async fn injected_failures_are_server_errors() {
    let loader = blood_loader(3);
    let model = blood_model();
    loader.fail(LoaderOp::LoadRows, "database offline");

    let error = loader.load_rows(&model).await.expect_err("failure");
    assert_eq!(error.to_string(), "Server error (500): database offline");

    loader.recover(LoaderOp::LoadRows);
    assert!(loader.load_rows(&model).await.is_ok());

    let journal = loader.journal();
    assert_eq!(journal.count(LoaderOp::LoadRows), 2);
    assert!(
        journal.position(LoaderOp::LoadRows, "blood", Phase::Started)
            < journal.position(LoaderOp::LoadRows, "blood", Phase::Finished)
    );
}

#[tokio::test]
async fn empty_loader_has_no_tables() {
    let loader = MemoryLoader::new();
    assert!(matches!(
        loader.load_charts(&blood_model(), true).await,
        Err(LoaderError::NotFound { .. })
    ));
    assert_eq!(loader.journal().entries().len(), 2);
}
