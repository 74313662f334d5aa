//! Shared fixtures: a synchronous fake server and an async loader over it.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lims_model::{
    CellValue, Chart, ChartKind, QueryColumn, QueryConfig, QueryInfo, QueryModel, Row, RowMap,
    SchemaQuery,
};
use lims_store::{
    Effects, LoaderCall, LoaderError, Outcome, QueryModelLoader, QueryModelStore, RowsResponse,
};

pub fn blood_query() -> SchemaQuery {
    SchemaQuery::new("samples", "Blood").expect("valid schema query")
}

pub fn blood_info() -> QueryInfo {
    QueryInfo::new(
        blood_query(),
        vec![
            QueryColumn::key("RowId"),
            QueryColumn::new("Name"),
            QueryColumn::new("Status"),
        ],
    )
}

pub fn blood_config(id: &str) -> QueryConfig {
    QueryConfig::new(blood_query()).with_id(id)
}

pub fn sample_row(index: usize) -> Row {
    Row::new()
        .with_cell("RowId", CellValue::new(index as i64))
        .with_cell("Name", CellValue::new(format!("Sample {index}")))
}

pub fn keys<I: IntoIterator<Item = usize>>(range: I) -> Vec<String> {
    range.into_iter().map(|i| i.to_string()).collect()
}

/// Answers loader calls from an in-memory table of `total` rows keyed
/// `1..=total`. Operations named in `failing` return an error.
#[derive(Debug, Clone)]
pub struct FakeServer {
    pub total: usize,
    pub info: QueryInfo,
    pub selections: BTreeSet<String>,
    pub failing: HashSet<&'static str>,
}

impl FakeServer {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            info: blood_info(),
            selections: BTreeSet::new(),
            failing: HashSet::new(),
        }
    }

    pub fn failing(mut self, op: &'static str) -> Self {
        self.failing.insert(op);
        self
    }

    pub fn page(&self, model: &QueryModel) -> RowsResponse {
        let start = model.offset.min(self.total);
        let end = if model.max_rows == 0 {
            self.total
        } else {
            (model.offset + model.max_rows).min(self.total)
        };
        let mut rows = RowMap::new();
        let mut ordered_rows = Vec::new();
        for index in start + 1..=end {
            rows.insert(index.to_string(), sample_row(index));
            ordered_rows.push(index.to_string());
        }
        RowsResponse {
            rows,
            ordered_rows,
            row_count: self.total,
            messages: Vec::new(),
        }
    }

    fn check(&self, op: &'static str) -> Result<(), String> {
        if self.failing.contains(op) {
            Err(format!("{op} failed"))
        } else {
            Ok(())
        }
    }

    pub fn answer(&mut self, call: &LoaderCall) -> Outcome {
        let request = call.request();
        let model_id = request.model_id.clone();
        let seq = request.seq;
        let checked = self.check(call.name());
        match call {
            LoaderCall::QueryInfo { followup, .. } => Outcome::QueryInfo {
                model_id,
                seq,
                followup: *followup,
                result: checked.map(|()| self.info.clone()),
            },
            LoaderCall::Rows { request } => Outcome::Rows {
                model_id,
                seq,
                result: checked.map(|()| self.page(&request.model)),
            },
            LoaderCall::Selections { .. } => Outcome::Selections {
                model_id,
                seq,
                result: checked.map(|()| self.selections.clone()),
            },
            LoaderCall::SelectAllRows { .. } => {
                if checked.is_ok() {
                    self.selections.extend(keys(1..=self.total));
                }
                Outcome::Selections {
                    model_id,
                    seq,
                    result: checked.map(|()| self.selections.clone()),
                }
            }
            LoaderCall::MutateSelections { op, .. } => {
                if checked.is_ok() {
                    op.apply_to(&mut self.selections);
                }
                Outcome::SelectionsMutated {
                    model_id,
                    seq,
                    op: op.clone(),
                    result: checked,
                }
            }
            LoaderCall::Charts { .. } => Outcome::Charts {
                model_id,
                seq,
                result: checked.map(|()| {
                    vec![Chart {
                        report_id: "db:1".to_string(),
                        name: "Volume".to_string(),
                        kind: ChartKind::Bar,
                        schema_query: blood_query(),
                        is_sample_comparison: false,
                    }]
                }),
            },
        }
    }
}

/// Answer every loader call, breadth first, until nothing is left.
/// Returns the operations in the order they were dispatched.
pub fn drain(
    store: &mut QueryModelStore,
    server: &mut FakeServer,
    effects: Effects,
) -> Vec<&'static str> {
    let mut dispatched = Vec::new();
    let mut queue: VecDeque<LoaderCall> = effects.loader_calls().cloned().collect();
    while let Some(call) = queue.pop_front() {
        dispatched.push(call.name());
        let outcome = server.answer(&call);
        let next = store.apply(outcome).expect("outcome applies");
        queue.extend(next.loader_calls().cloned());
    }
    dispatched
}

pub fn call_names(effects: &Effects) -> Vec<&'static str> {
    effects.loader_calls().map(LoaderCall::name).collect()
}

/// Store holding one fully loaded model `id`.
pub fn loaded_store(
    id: &str,
    config: QueryConfig,
    server: &mut FakeServer,
) -> QueryModelStore {
    let mut store = QueryModelStore::default();
    let (added, effects) = store.add_model(config, true, true);
    assert_eq!(added, id);
    drain(&mut store, server, effects);
    store
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Started(&'static str, String),
    Finished(&'static str, String),
}

/// Async loader over a [`FakeServer`], with per-operation latency and a
/// journal of start/finish events.
pub struct ScriptedLoader {
    server: Mutex<FakeServer>,
    journal: Mutex<Vec<Event>>,
    latency: Mutex<Vec<(&'static str, Duration)>>,
    panicking: Mutex<HashSet<&'static str>>,
}

impl ScriptedLoader {
    pub fn new(server: FakeServer) -> Arc<Self> {
        Arc::new(Self {
            server: Mutex::new(server),
            journal: Mutex::new(Vec::new()),
            latency: Mutex::new(Vec::new()),
            panicking: Mutex::new(HashSet::new()),
        })
    }

    pub fn set_latency(&self, op: &'static str, latency: Duration) {
        self.latency.lock().unwrap().push((op, latency));
    }

    /// Make every later call to `op` panic instead of answering.
    pub fn panic_on(&self, op: &'static str) {
        self.panicking.lock().unwrap().insert(op);
    }

    pub fn journal(&self) -> Vec<Event> {
        self.journal.lock().unwrap().clone()
    }

    pub fn server_selections(&self) -> BTreeSet<String> {
        self.server.lock().unwrap().selections.clone()
    }

    async fn call(&self, call: LoaderCall) -> Outcome {
        let op = call.name();
        let model_id = call.model_id().to_string();
        self.journal
            .lock()
            .unwrap()
            .push(Event::Started(op, model_id.clone()));
        let panics = self.panicking.lock().unwrap().contains(op);
        if panics {
            panic!("{op} blew up");
        }
        let latency = self
            .latency
            .lock()
            .unwrap()
            .iter()
            .find(|(name, _)| *name == op)
            .map(|(_, latency)| *latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let outcome = self.server.lock().unwrap().answer(&call);
        self.journal
            .lock()
            .unwrap()
            .push(Event::Finished(op, model_id));
        outcome
    }
}

fn request_for(model: &QueryModel) -> lims_store::LoadRequest {
    lims_store::LoadRequest {
        model_id: model.id.clone(),
        seq: 0,
        model: Arc::new(model.clone()),
    }
}

#[async_trait]
impl QueryModelLoader for ScriptedLoader {
    async fn load_query_info(&self, model: &QueryModel) -> Result<QueryInfo, LoaderError> {
        let call = LoaderCall::QueryInfo {
            request: request_for(model),
            followup: Default::default(),
        };
        match self.call(call).await {
            Outcome::QueryInfo { result, .. } => result.map_err(LoaderError::BadRequest),
            other => Err(LoaderError::BadRequest(format!("unexpected {other:?}"))),
        }
    }

    async fn load_rows(&self, model: &QueryModel) -> Result<RowsResponse, LoaderError> {
        let call = LoaderCall::Rows {
            request: request_for(model),
        };
        match self.call(call).await {
            Outcome::Rows { result, .. } => result.map_err(LoaderError::BadRequest),
            other => Err(LoaderError::BadRequest(format!("unexpected {other:?}"))),
        }
    }

    async fn load_selections(&self, model: &QueryModel) -> Result<BTreeSet<String>, LoaderError> {
        let call = LoaderCall::Selections {
            request: request_for(model),
        };
        match self.call(call).await {
            Outcome::Selections { result, .. } => result.map_err(LoaderError::BadRequest),
            other => Err(LoaderError::BadRequest(format!("unexpected {other:?}"))),
        }
    }

    async fn set_selections(
        &self,
        model: &QueryModel,
        checked: bool,
        keys: &[String],
    ) -> Result<(), LoaderError> {
        self.mutate(
            model,
            lims_store::SelectionOp::Set {
                checked,
                keys: keys.to_vec(),
            },
        )
        .await
    }

    async fn replace_selections(
        &self,
        model: &QueryModel,
        keys: &[String],
    ) -> Result<(), LoaderError> {
        self.mutate(model, lims_store::SelectionOp::Replace(keys.to_vec()))
            .await
    }

    async fn clear_selections(&self, model: &QueryModel) -> Result<(), LoaderError> {
        self.mutate(model, lims_store::SelectionOp::Clear).await
    }

    async fn select_all_rows(&self, model: &QueryModel) -> Result<BTreeSet<String>, LoaderError> {
        let call = LoaderCall::SelectAllRows {
            request: request_for(model),
        };
        match self.call(call).await {
            Outcome::Selections { result, .. } => result.map_err(LoaderError::BadRequest),
            other => Err(LoaderError::BadRequest(format!("unexpected {other:?}"))),
        }
    }

    async fn load_charts(
        &self,
        model: &QueryModel,
        include_sample_comparison: bool,
    ) -> Result<Vec<Chart>, LoaderError> {
        let call = LoaderCall::Charts {
            request: request_for(model),
            include_sample_comparison,
        };
        match self.call(call).await {
            Outcome::Charts { result, .. } => result.map_err(LoaderError::BadRequest),
            other => Err(LoaderError::BadRequest(format!("unexpected {other:?}"))),
        }
    }
}

impl ScriptedLoader {
    async fn mutate(
        &self,
        model: &QueryModel,
        op: lims_store::SelectionOp,
    ) -> Result<(), LoaderError> {
        let call = LoaderCall::MutateSelections {
            request: request_for(model),
            op,
        };
        match self.call(call).await {
            Outcome::SelectionsMutated { result, .. } => result.map_err(LoaderError::BadRequest),
            other => Err(LoaderError::BadRequest(format!("unexpected {other:?}"))),
        }
    }
}
