//! Sample tables shared by the loader tests.

#![allow(dead_code)]

use std::fmt::Write as _;

use lims_loader::{MemoryLoader, TableSource};
use lims_model::{
    Chart, ChartKind, ModelDefaults, QueryConfig, QueryModel, SchemaQuery, Sort, ViewInfo,
};

pub fn blood_query() -> SchemaQuery {
    SchemaQuery::new("samples", "Blood").expect("valid schema query")
}

/// `total` samples keyed `1..=total`. Even rows are Active, odd rows are
/// Archived, and every fifth row has no volume.
pub fn blood_csv(total: usize) -> String {
    let mut csv = String::from("RowId,Name,Status,Volume\n");
    for index in 1..=total {
        let status = if index % 2 == 0 { "Active" } else { "Archived" };
        let volume = if index % 5 == 0 {
            String::new()
        } else {
            format!("{}.5", index % 7)
        };
        writeln!(csv, "{index},Sample {index:02},{status},{volume}").expect("write row");
    }
    csv
}

pub fn blood_table(total: usize) -> TableSource {
    TableSource::from_csv_str(blood_query(), &blood_csv(total), "RowId")
        .expect("valid csv")
        .with_view(
            ViewInfo::named("Recent")
                .with_sorts(vec![Sort::desc("RowId")])
                .with_filters(vec![lims_model::Filter::equal("Status", "Active")]),
        )
}

pub fn chart(report_id: &str, is_sample_comparison: bool) -> Chart {
    Chart {
        report_id: report_id.to_string(),
        name: format!("Chart {report_id}"),
        kind: ChartKind::Bar,
        schema_query: blood_query(),
        is_sample_comparison,
    }
}

pub fn blood_loader(total: usize) -> MemoryLoader {
    let loader = MemoryLoader::new().with_table(blood_table(total));
    loader.add_chart(chart("db:1", false));
    loader.add_chart(chart("db:2", true));
    loader
}

pub fn model(config: QueryConfig) -> QueryModel {
    QueryModel::from_config("blood", config, &ModelDefaults::default())
}

pub fn blood_model() -> QueryModel {
    model(QueryConfig::new(blood_query()))
}

pub fn keys<I: IntoIterator<Item = usize>>(range: I) -> Vec<String> {
    range.into_iter().map(|i| i.to_string()).collect()
}
