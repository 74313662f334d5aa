pub mod chart;
pub mod config;
pub mod error;
pub mod filter;
pub mod loading;
pub mod model;
pub mod query_info;
pub mod row;
pub mod schema_query;
pub mod sort;

pub use chart::{Chart, ChartKind};
pub use config::{
    ContainerFilter, DEFAULT_MAX_ROWS, DEFAULT_URL_PREFIX, ModelDefaults, QueryConfig,
};
pub use error::{ModelError, Result};
pub use filter::{Filter, FilterOperator, filters_equal};
pub use loading::{LoadingState, Slice, SliceStatus};
pub use model::{QueryModel, SelectedState};
pub use query_info::{JsonType, LookupInfo, QueryColumn, QueryInfo, ViewInfo};
pub use row::{CellValue, FieldValue, Row, RowMap};
pub use schema_query::SchemaQuery;
pub use sort::{Sort, SortDirection, parse_sorts, sorts_to_string};
