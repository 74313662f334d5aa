//! Effects emitted by store actions and the outcomes that feed back in.

use std::collections::BTreeSet;
use std::sync::Arc;

use lims_model::{Chart, QueryInfo, QueryModel, Slice};
use tracing::Instrument;

use crate::loader::{LoaderError, QueryModelLoader, RowsResponse, resolve_error_message};
use crate::selection::SelectionOp;
use crate::url::UrlQuery;

/// Snapshot of a model taken when a request is dispatched.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub model_id: String,
    /// Sequence number of the slice this request belongs to.
    pub seq: u64,
    pub model: Arc<QueryModel>,
}

/// Loads to start once query info has arrived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Followup {
    pub load_rows: bool,
    pub load_selections: bool,
}

/// A single loader invocation.
#[derive(Debug, Clone)]
pub enum LoaderCall {
    QueryInfo {
        request: LoadRequest,
        followup: Followup,
    },
    Rows {
        request: LoadRequest,
    },
    Selections {
        request: LoadRequest,
    },
    SelectAllRows {
        request: LoadRequest,
    },
    MutateSelections {
        request: LoadRequest,
        op: SelectionOp,
    },
    Charts {
        request: LoadRequest,
        include_sample_comparison: bool,
    },
}

impl LoaderCall {
    pub fn request(&self) -> &LoadRequest {
        match self {
            Self::QueryInfo { request, .. }
            | Self::Rows { request }
            | Self::Selections { request }
            | Self::SelectAllRows { request }
            | Self::MutateSelections { request, .. }
            | Self::Charts { request, .. } => request,
        }
    }

    pub fn model_id(&self) -> &str {
        &self.request().model_id
    }

    pub fn slice(&self) -> Slice {
        match self {
            Self::QueryInfo { .. } => Slice::QueryInfo,
            Self::Rows { .. } => Slice::Rows,
            Self::Selections { .. } | Self::SelectAllRows { .. } | Self::MutateSelections { .. } => {
                Slice::Selections
            }
            Self::Charts { .. } => Slice::Charts,
        }
    }

    /// Loader operation name, as used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::QueryInfo { .. } => "load_query_info",
            Self::Rows { .. } => "load_rows",
            Self::Selections { .. } => "load_selections",
            Self::SelectAllRows { .. } => "select_all_rows",
            Self::MutateSelections { op, .. } => match op {
                SelectionOp::Set { .. } => "set_selections",
                SelectionOp::Replace(_) => "replace_selections",
                SelectionOp::Clear => "clear_selections",
            },
            Self::Charts { .. } => "load_charts",
        }
    }

    /// Run the call against `loader` and package the result as an outcome.
    pub async fn run(self, loader: &dyn QueryModelLoader) -> Outcome {
        let span = tracing::debug_span!(
            "loader",
            model = %self.model_id(),
            op = self.name(),
            seq = self.request().seq,
        );
        self.execute(loader).instrument(span).await
    }

    async fn execute(self, loader: &dyn QueryModelLoader) -> Outcome {
        let slice = self.slice();
        match self {
            Self::QueryInfo { request, followup } => {
                let result = loader.load_query_info(&request.model).await;
                let result = resolve(slice, &request, result);
                Outcome::QueryInfo {
                    model_id: request.model_id,
                    seq: request.seq,
                    followup,
                    result,
                }
            }
            Self::Rows { request } => {
                let result = loader.load_rows(&request.model).await;
                let result = resolve(slice, &request, result);
                Outcome::Rows {
                    model_id: request.model_id,
                    seq: request.seq,
                    result,
                }
            }
            Self::Selections { request } => {
                let result = loader.load_selections(&request.model).await;
                let result = resolve(slice, &request, result);
                Outcome::Selections {
                    model_id: request.model_id,
                    seq: request.seq,
                    result,
                }
            }
            Self::SelectAllRows { request } => {
                let result = loader.select_all_rows(&request.model).await;
                let result = resolve(slice, &request, result);
                Outcome::Selections {
                    model_id: request.model_id,
                    seq: request.seq,
                    result,
                }
            }
            Self::MutateSelections { request, op } => {
                let result = match &op {
                    SelectionOp::Set { checked, keys } => {
                        loader.set_selections(&request.model, *checked, keys).await
                    }
                    SelectionOp::Replace(keys) => {
                        loader.replace_selections(&request.model, keys).await
                    }
                    SelectionOp::Clear => loader.clear_selections(&request.model).await,
                };
                let result = resolve(slice, &request, result);
                Outcome::SelectionsMutated {
                    model_id: request.model_id,
                    seq: request.seq,
                    op,
                    result,
                }
            }
            Self::Charts {
                request,
                include_sample_comparison,
            } => {
                let result = loader
                    .load_charts(&request.model, include_sample_comparison)
                    .await;
                let result = resolve(slice, &request, result);
                Outcome::Charts {
                    model_id: request.model_id,
                    seq: request.seq,
                    result,
                }
            }
        }
    }
}

impl LoaderCall {
    /// The outcome of this call failing with `error` before the loader
    /// could answer.
    pub fn failed(self, error: LoaderError) -> Outcome {
        let slice = self.slice();
        let message = resolve_error_message(slice, self.model_id(), &error);
        match self {
            Self::QueryInfo { request, followup } => Outcome::QueryInfo {
                model_id: request.model_id,
                seq: request.seq,
                followup,
                result: Err(message),
            },
            Self::Rows { request } => Outcome::Rows {
                model_id: request.model_id,
                seq: request.seq,
                result: Err(message),
            },
            Self::Selections { request } | Self::SelectAllRows { request } => {
                Outcome::Selections {
                    model_id: request.model_id,
                    seq: request.seq,
                    result: Err(message),
                }
            }
            Self::MutateSelections { request, op } => Outcome::SelectionsMutated {
                model_id: request.model_id,
                seq: request.seq,
                op,
                result: Err(message),
            },
            Self::Charts { request, .. } => Outcome::Charts {
                model_id: request.model_id,
                seq: request.seq,
                result: Err(message),
            },
        }
    }
}

fn resolve<T>(
    slice: Slice,
    request: &LoadRequest,
    result: Result<T, LoaderError>,
) -> Result<T, String> {
    result.map_err(|error| resolve_error_message(slice, &request.model_id, &error))
}

/// A loader result re-entering the store.
#[derive(Debug, Clone)]
pub enum Outcome {
    QueryInfo {
        model_id: String,
        seq: u64,
        followup: Followup,
        result: Result<QueryInfo, String>,
    },
    Rows {
        model_id: String,
        seq: u64,
        result: Result<RowsResponse, String>,
    },
    /// Full selection set from a load or a select-all.
    Selections {
        model_id: String,
        seq: u64,
        result: Result<BTreeSet<String>, String>,
    },
    SelectionsMutated {
        model_id: String,
        seq: u64,
        op: SelectionOp,
        result: Result<(), String>,
    },
    Charts {
        model_id: String,
        seq: u64,
        result: Result<Vec<Chart>, String>,
    },
}

impl Outcome {
    pub fn model_id(&self) -> &str {
        match self {
            Self::QueryInfo { model_id, .. }
            | Self::Rows { model_id, .. }
            | Self::Selections { model_id, .. }
            | Self::SelectionsMutated { model_id, .. }
            | Self::Charts { model_id, .. } => model_id,
        }
    }

    pub fn slice(&self) -> Slice {
        match self {
            Self::QueryInfo { .. } => Slice::QueryInfo,
            Self::Rows { .. } => Slice::Rows,
            Self::Selections { .. } | Self::SelectionsMutated { .. } => Slice::Selections,
            Self::Charts { .. } => Slice::Charts,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Effect {
    Load(LoaderCall),
    /// Replace the browser location with this query string.
    WriteUrl(UrlQuery),
}

/// Ordered effects produced by one state transition.
#[derive(Debug, Clone, Default)]
pub struct Effects(Vec<Effect>);

impl Effects {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn one(effect: Effect) -> Self {
        Self(vec![effect])
    }

    pub fn load(call: LoaderCall) -> Self {
        Self::one(Effect::Load(call))
    }

    pub fn push(&mut self, effect: Effect) {
        self.0.push(effect);
    }

    pub fn append(&mut self, other: Effects) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Effect> {
        self.0.iter()
    }

    pub fn loader_calls(&self) -> impl Iterator<Item = &LoaderCall> {
        self.0.iter().filter_map(|effect| match effect {
            Effect::Load(call) => Some(call),
            Effect::WriteUrl(_) => None,
        })
    }

    /// The last URL written, if any.
    pub fn url_write(&self) -> Option<&UrlQuery> {
        self.0.iter().rev().find_map(|effect| match effect {
            Effect::WriteUrl(query) => Some(query),
            Effect::Load(_) => None,
        })
    }
}

impl IntoIterator for Effects {
    type Item = Effect;
    type IntoIter = std::vec::IntoIter<Effect>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Effects {
    type Item = &'a Effect;
    type IntoIter = std::slice::Iter<'a, Effect>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
