//! The query model store.
//!
//! Every action is a synchronous state transition returning the [`Effects`]
//! it needs executed: loader calls and URL writes. Loader results come back
//! through [`QueryModelStore::apply`]. The store never awaits anything, so it
//! can be driven directly in tests or owned by the async runtime.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use lims_model::{
    Chart, FieldValue, Filter, ModelDefaults, QueryConfig, QueryInfo, QueryModel, Row, SchemaQuery,
    Slice, Sort, filters_equal,
};
use tracing::{debug, trace, warn};

use crate::action::Action;
use crate::effect::{Effect, Effects, Followup, LoadRequest, LoaderCall, Outcome};
use crate::error::{Result, StoreError};
use crate::loader::RowsResponse;
use crate::logging::{redact_keys, redact_value};
use crate::selection::{Enqueued, SelectionOp, SelectionQueue, SelectionTask};
use crate::settings::StoreSettings;
use crate::url::{UrlQuery, UrlState};

/// Models keyed by id. Each model is shared until it is next modified.
pub type ModelMap = BTreeMap<String, Arc<QueryModel>>;

#[derive(Debug, Clone)]
pub struct QueryModelStore {
    models: Arc<ModelMap>,
    selection_queues: HashMap<String, SelectionQueue>,
    location: UrlQuery,
    next_model_id: u64,
    defaults: ModelDefaults,
    load_selections_on_url_change: bool,
}

impl Default for QueryModelStore {
    fn default() -> Self {
        Self::new(&StoreSettings::default())
    }
}

impl QueryModelStore {
    pub fn new(settings: &StoreSettings) -> Self {
        Self {
            models: Arc::new(ModelMap::new()),
            selection_queues: HashMap::new(),
            location: UrlQuery::new(),
            next_model_id: 0,
            defaults: settings.model_defaults(),
            load_selections_on_url_change: settings.load_selections_on_url_change,
        }
    }

    /// Build a store from a TOML settings file; a missing file means defaults.
    pub fn from_settings_file(path: &Path) -> Result<Self> {
        let settings = StoreSettings::load_from(path)
            .map_err(|error| StoreError::Settings(error.to_string()))?;
        Ok(Self::new(&settings))
    }

    /// Start from an existing browser location.
    #[must_use]
    pub fn with_location(mut self, location: UrlQuery) -> Self {
        self.location = location;
        self
    }

    // =========================================================================
    // READ ACCESS
    // =========================================================================

    /// Consistent view of every model; cheap to clone and never mutated.
    pub fn snapshot(&self) -> Arc<ModelMap> {
        Arc::clone(&self.models)
    }

    pub fn model(&self, id: &str) -> Option<Arc<QueryModel>> {
        self.models.get(id).cloned()
    }

    pub fn model_ids(&self) -> Vec<String> {
        self.models.keys().cloned().collect()
    }

    pub fn location(&self) -> &UrlQuery {
        &self.location
    }

    /// True when no selection request is queued or in flight for `id`.
    pub fn selections_idle(&self, id: &str) -> bool {
        self.selection_queues
            .get(id)
            .is_none_or(SelectionQueue::is_idle)
    }

    // =========================================================================
    // DISPATCH
    // =========================================================================

    pub fn dispatch(&mut self, action: Action) -> Result<Effects> {
        match action {
            Action::AddModel {
                config,
                load,
                load_selections,
            } => Ok(self.add_model(config, load, load_selections).1),
            Action::RemoveModel { id } => self.remove_model(&id).map(|()| Effects::none()),
            Action::LoadModel {
                id,
                load_selections,
            } => self.load_model(&id, load_selections),
            Action::LoadAllModels { load_selections } => self.load_all_models(load_selections),
            Action::LoadQueryInfo { id } => self.load_query_info(&id),
            Action::LoadRows {
                id,
                load_selections,
            } => self.load_rows(&id, load_selections),
            Action::LoadSelections { id } => self.load_selections(&id),
            Action::LoadCharts {
                id,
                include_sample_comparison,
            } => self.load_charts(&id, include_sample_comparison),
            Action::LoadNextPage { id } => self.load_next_page(&id),
            Action::LoadPreviousPage { id } => self.load_previous_page(&id),
            Action::LoadFirstPage { id } => self.load_first_page(&id),
            Action::LoadLastPage { id } => self.load_last_page(&id),
            Action::SetOffset { id, offset } => self.set_offset(&id, offset),
            Action::SetMaxRows { id, max_rows } => self.set_max_rows(&id, max_rows),
            Action::SetFilters {
                id,
                filters,
                load_selections,
            } => self.set_filters(&id, filters, load_selections),
            Action::SetSorts { id, sorts } => self.set_sorts(&id, sorts),
            Action::SetSchemaQuery {
                id,
                schema_query,
                load_selections,
            } => self.set_schema_query(&id, schema_query, load_selections),
            Action::SetView {
                id,
                view_name,
                load_selections,
            } => self.set_view(&id, view_name, load_selections),
            Action::SetSelections { id, checked, keys } => {
                self.set_selections(&id, checked, keys)
            }
            Action::ReplaceSelections { id, keys } => self.replace_selections(&id, keys),
            Action::SelectAllRows { id } => self.select_all_rows(&id),
            Action::SelectRow { id, checked, row } => self.select_row(&id, checked, &row),
            Action::SelectPage { id, checked } => self.select_page(&id, checked),
            Action::ClearSelections { id } => self.clear_selections(&id),
            Action::SelectReport { id, report_id } => self.select_report(&id, report_id),
            Action::SetLocation { query } => self.set_location(query),
        }
    }

    // =========================================================================
    // MODEL LIFECYCLE
    // =========================================================================

    /// Register a model, replacing any model with the same id.
    ///
    /// Returns the id (generated when the config has none).
    pub fn add_model(
        &mut self,
        config: QueryConfig,
        load: bool,
        load_selections: bool,
    ) -> (String, Effects) {
        let id = match &config.id {
            Some(id) => id.clone(),
            None => self.generate_model_id(&config.schema_query),
        };
        let mut model = QueryModel::from_config(id.clone(), config, &self.defaults);

        if model.bind_url {
            UrlState::parse(&self.location, &model.url_prefix).apply_present(&mut model);
        }
        if let Some(previous) = self.models.get(&id) {
            debug!(model = %id, "Replacing existing model");
            model.supersede(previous);
        }

        Arc::make_mut(&mut self.models).insert(id.clone(), Arc::new(model));
        self.selection_queues.remove(&id);
        debug!(model = %id, load, load_selections, "Model added");

        let effects = if load {
            self.load_model(&id, load_selections).unwrap_or_default()
        } else {
            Effects::none()
        };
        (id, effects)
    }

    pub fn remove_model(&mut self, id: &str) -> Result<()> {
        Arc::make_mut(&mut self.models)
            .remove(id)
            .ok_or_else(|| StoreError::model_not_found(id))?;
        self.selection_queues.remove(id);
        debug!(model = id, "Model removed");
        Ok(())
    }

    fn generate_model_id(&mut self, schema_query: &SchemaQuery) -> String {
        self.next_model_id += 1;
        format!("{schema_query}#{}", self.next_model_id)
    }

    // =========================================================================
    // LOADING
    // =========================================================================

    /// Load query info; rows (and optionally selections) follow once it arrives.
    pub fn load_model(&mut self, id: &str, load_selections: bool) -> Result<Effects> {
        self.request_query_info(
            id,
            Followup {
                load_rows: true,
                load_selections,
            },
        )
    }

    pub fn load_all_models(&mut self, load_selections: bool) -> Result<Effects> {
        let mut effects = Effects::none();
        for id in self.model_ids() {
            effects.append(self.load_model(&id, load_selections)?);
        }
        Ok(effects)
    }

    /// Reload query info alone.
    pub fn load_query_info(&mut self, id: &str) -> Result<Effects> {
        self.request_query_info(id, Followup::default())
    }

    pub fn load_rows(&mut self, id: &str, load_selections: bool) -> Result<Effects> {
        let mut effects = self.request_rows(id)?;
        if load_selections {
            effects.append(self.load_selections(id)?);
        }
        Ok(effects)
    }

    pub fn load_selections(&mut self, id: &str) -> Result<Effects> {
        self.enqueue_selection(id, SelectionTask::Load)
    }

    pub fn load_charts(&mut self, id: &str, include_sample_comparison: bool) -> Result<Effects> {
        let seq = self.model_mut(id)?.charts_status.begin();
        let request = self.request(id, seq)?;
        Ok(Effects::load(LoaderCall::Charts {
            request,
            include_sample_comparison,
        }))
    }

    fn request_query_info(&mut self, id: &str, followup: Followup) -> Result<Effects> {
        let seq = self.model_mut(id)?.query_info_status.begin();
        let request = self.request(id, seq)?;
        debug!(model = id, seq, "Loading query info");
        Ok(Effects::load(LoaderCall::QueryInfo { request, followup }))
    }

    fn request_rows(&mut self, id: &str) -> Result<Effects> {
        let seq = self.model_mut(id)?.rows_status.begin();
        let request = self.request(id, seq)?;
        debug!(
            model = id,
            seq,
            offset = request.model.offset,
            max_rows = request.model.max_rows,
            "Loading rows"
        );
        Ok(Effects::load(LoaderCall::Rows { request }))
    }

    // =========================================================================
    // PAGINATION
    // =========================================================================

    pub fn load_next_page(&mut self, id: &str) -> Result<Effects> {
        let model = self.model_ref(id)?;
        let target = (!model.is_last_page()).then(|| model.offset + model.max_rows);
        self.move_to_offset(id, target)
    }

    pub fn load_previous_page(&mut self, id: &str) -> Result<Effects> {
        let model = self.model_ref(id)?;
        let target = (!model.is_first_page()).then(|| model.offset.saturating_sub(model.max_rows));
        self.move_to_offset(id, target)
    }

    pub fn load_first_page(&mut self, id: &str) -> Result<Effects> {
        self.move_to_offset(id, Some(0))
    }

    pub fn load_last_page(&mut self, id: &str) -> Result<Effects> {
        let target = self.model_ref(id)?.last_page_offset();
        self.move_to_offset(id, Some(target))
    }

    pub fn set_offset(&mut self, id: &str, offset: usize) -> Result<Effects> {
        self.move_to_offset(id, Some(offset))
    }

    /// Change the page size and return to the first page.
    pub fn set_max_rows(&mut self, id: &str, max_rows: usize) -> Result<Effects> {
        if self.model_ref(id)?.max_rows == max_rows {
            return Ok(Effects::none());
        }
        let model = self.model_mut(id)?;
        model.max_rows = max_rows;
        model.offset = 0;
        model.rows_status.invalidate();
        self.reload_rows(id)
    }

    fn move_to_offset(&mut self, id: &str, target: Option<usize>) -> Result<Effects> {
        let current = self.model_ref(id)?.offset;
        let Some(offset) = target.filter(|offset| *offset != current) else {
            trace!(model = id, offset = current, "Offset unchanged");
            return Ok(Effects::none());
        };
        let model = self.model_mut(id)?;
        model.offset = offset;
        model.rows_status.invalidate();
        self.reload_rows(id)
    }

    /// Rebind the URL, then request rows.
    fn reload_rows(&mut self, id: &str) -> Result<Effects> {
        let mut effects = self.bind_url(id)?;
        effects.append(self.request_rows(id)?);
        Ok(effects)
    }

    // =========================================================================
    // FILTERS, SORTS, QUERY AND VIEW
    // =========================================================================

    /// Replace the user filters. Selections reload only when asked, since
    /// the server keeps them across filter changes.
    pub fn set_filters(
        &mut self,
        id: &str,
        filters: Vec<Filter>,
        load_selections: bool,
    ) -> Result<Effects> {
        if filters_equal(&self.model_ref(id)?.filters, &filters) {
            return Ok(Effects::none());
        }
        for filter in &filters {
            trace!(
                model = id,
                column = %filter.column,
                operator = %filter.operator,
                value = redact_value(filter.value.as_deref().unwrap_or_default()),
                "Filter"
            );
        }
        let model = self.model_mut(id)?;
        model.filters = filters;
        model.reset_rows();
        self.load_rows_after_change(id, load_selections)
    }

    pub fn set_sorts(&mut self, id: &str, sorts: Vec<Sort>) -> Result<Effects> {
        if self.model_ref(id)?.sorts == sorts {
            return Ok(Effects::none());
        }
        let model = self.model_mut(id)?;
        model.sorts = sorts;
        model.rows_status.invalidate();
        self.reload_rows(id)
    }

    /// Point the model at another query: everything loaded is dropped and
    /// reloaded from query info down.
    pub fn set_schema_query(
        &mut self,
        id: &str,
        schema_query: SchemaQuery,
        load_selections: bool,
    ) -> Result<Effects> {
        if self.model_ref(id)?.schema_query == schema_query {
            return Ok(Effects::none());
        }
        let model = self.model_mut(id)?;
        model.schema_query = schema_query;
        model.selected_report_id = None;
        model.reset_query_info();
        model.reset_rows();
        model.reset_selections();
        model.reset_charts();

        let mut effects = self.bind_url(id)?;
        effects.append(self.load_model(id, load_selections)?);
        Ok(effects)
    }

    /// Switch views. Query info stays; rows and selections are reset.
    pub fn set_view(
        &mut self,
        id: &str,
        view_name: Option<String>,
        load_selections: bool,
    ) -> Result<Effects> {
        let current = &self.model_ref(id)?.schema_query;
        let schema_query = current.with_view(view_name);
        if schema_query == *current {
            return Ok(Effects::none());
        }
        let model = self.model_mut(id)?;
        model.schema_query = schema_query;
        model.selected_report_id = None;
        model.reset_rows();
        model.reset_selections();
        self.load_rows_after_change(id, load_selections)
    }

    fn load_rows_after_change(&mut self, id: &str, load_selections: bool) -> Result<Effects> {
        let mut effects = self.reload_rows(id)?;
        if load_selections {
            effects.append(self.load_selections(id)?);
        }
        Ok(effects)
    }

    // =========================================================================
    // SELECTIONS
    // =========================================================================

    pub fn set_selections(&mut self, id: &str, checked: bool, keys: Vec<String>) -> Result<Effects> {
        if keys.is_empty() {
            self.model_ref(id)?;
            return Ok(Effects::none());
        }
        trace!(model = id, checked, keys = %redact_keys(&keys), "Set selections");
        self.enqueue_selection(id, SelectionTask::Mutate(SelectionOp::Set { checked, keys }))
    }

    pub fn replace_selections(&mut self, id: &str, keys: Vec<String>) -> Result<Effects> {
        trace!(model = id, keys = %redact_keys(&keys), "Replace selections");
        self.enqueue_selection(id, SelectionTask::Mutate(SelectionOp::Replace(keys)))
    }

    pub fn clear_selections(&mut self, id: &str) -> Result<Effects> {
        self.enqueue_selection(id, SelectionTask::Mutate(SelectionOp::Clear))
    }

    pub fn select_all_rows(&mut self, id: &str) -> Result<Effects> {
        self.enqueue_selection(id, SelectionTask::SelectAll)
    }

    /// Select or deselect one row by its primary key. Only queries with a
    /// single key column are supported; anything else is logged and ignored.
    pub fn select_row(&mut self, id: &str, checked: bool, row: &Row) -> Result<Effects> {
        let model = self.model_ref(id)?;
        let Some(info) = model.query_info.as_deref() else {
            return Err(StoreError::QueryInfoRequired { id: id.to_string() });
        };
        let key_columns = info.pk_columns();
        let [key_column] = key_columns.as_slice() else {
            warn!(
                model = id,
                key_columns = key_columns.len(),
                "Cannot select row: query must have exactly one primary key column"
            );
            return Ok(Effects::none());
        };
        let Some(key) = row
            .value(&key_column.name)
            .and_then(FieldValue::to_key_string)
        else {
            warn!(model = id, column = %key_column.name, "Cannot select row: no primary key value");
            return Ok(Effects::none());
        };
        self.set_selections(id, checked, vec![key])
    }

    /// Select or deselect every row on the current page.
    pub fn select_page(&mut self, id: &str, checked: bool) -> Result<Effects> {
        let keys = self.model_ref(id)?.ordered_rows.clone().unwrap_or_default();
        self.set_selections(id, checked, keys)
    }

    fn enqueue_selection(&mut self, id: &str, task: SelectionTask) -> Result<Effects> {
        self.model_ref(id)?;
        let queue = self.selection_queues.entry(id.to_string()).or_default();
        match queue.push(task) {
            Enqueued::Dispatch(task) => self.dispatch_selection(id, task),
            Enqueued::Queued => {
                debug!(model = id, pending = queue.pending(), "Selection request queued");
                Ok(Effects::none())
            }
            Enqueued::Coalesced => {
                warn!(model = id, "Selections are already being loaded");
                Ok(Effects::none())
            }
        }
    }

    fn dispatch_selection(&mut self, id: &str, task: SelectionTask) -> Result<Effects> {
        let status = &mut self.model_mut(id)?.selections_status;
        let seq = match task {
            SelectionTask::Load | SelectionTask::SelectAll => status.begin(),
            SelectionTask::Mutate(_) => status.next_request(),
        };
        if let Some(queue) = self.selection_queues.get_mut(id) {
            queue.dispatched(seq);
        }
        let request = self.request(id, seq)?;
        let call = match task {
            SelectionTask::Load => LoaderCall::Selections { request },
            SelectionTask::SelectAll => LoaderCall::SelectAllRows { request },
            SelectionTask::Mutate(op) => LoaderCall::MutateSelections { request, op },
        };
        debug!(model = id, seq, op = call.name(), "Selection request dispatched");
        Ok(Effects::load(call))
    }

    /// Selection request `seq` resolved; start the next one if it was the
    /// request the model's queue is waiting on.
    fn next_selection(&mut self, id: &str, seq: u64) -> Result<Effects> {
        let Some(task) = self
            .selection_queues
            .get_mut(id)
            .and_then(|queue| queue.complete(seq))
        else {
            return Ok(Effects::none());
        };
        self.dispatch_selection(id, task)
    }

    // =========================================================================
    // REPORTS AND URL
    // =========================================================================

    pub fn select_report(&mut self, id: &str, report_id: Option<String>) -> Result<Effects> {
        if self.model_ref(id)?.selected_report_id == report_id {
            return Ok(Effects::none());
        }
        self.model_mut(id)?.selected_report_id = report_id;
        self.bind_url(id)
    }

    /// Write a bound model's parameters into the location.
    fn bind_url(&mut self, id: &str) -> Result<Effects> {
        let model = self.model_ref(id)?;
        if !model.bind_url {
            return Ok(Effects::none());
        }
        let mut location = self.location.clone();
        location.replace_prefixed(&model.url_prefix, model.url_query_params());
        if location == self.location {
            return Ok(Effects::none());
        }
        self.location = location.clone();
        Ok(Effects::one(Effect::WriteUrl(location)))
    }

    /// The browser location changed. Every bound model whose parameters now
    /// describe a different state moves to it and reloads its rows.
    pub fn set_location(&mut self, query: UrlQuery) -> Result<Effects> {
        self.location = query;
        let bound: Vec<String> = self
            .models
            .values()
            .filter(|model| model.bind_url)
            .map(|model| model.id.clone())
            .collect();

        let mut effects = Effects::none();
        for id in bound {
            let model = self.model_ref(&id)?;
            let target = UrlState::parse(&self.location, &model.url_prefix).target_for(model);
            if !target.differs_from(model) {
                continue;
            }
            let reload_selections = self.load_selections_on_url_change
                && (model.has_selections() || model.selections_status.error.is_some());

            let model = self.model_mut(&id)?;
            let view_changed = target.apply_to(model);
            if view_changed {
                model.reset_selections();
            }
            debug!(model = %id, view_changed, reload_selections, "Applied URL state");

            effects.append(self.request_rows(&id)?);
            if reload_selections || view_changed {
                effects.append(self.load_selections(&id)?);
            }
        }
        Ok(effects)
    }

    // =========================================================================
    // OUTCOMES
    // =========================================================================

    /// Apply a loader result. Responses for removed models or superseded
    /// requests are dropped.
    pub fn apply(&mut self, outcome: Outcome) -> Result<Effects> {
        match outcome {
            Outcome::QueryInfo {
                model_id,
                seq,
                followup,
                result,
            } => self.apply_query_info(&model_id, seq, followup, result),
            Outcome::Rows {
                model_id,
                seq,
                result,
            } => {
                self.apply_rows(&model_id, seq, result);
                Ok(Effects::none())
            }
            Outcome::Selections {
                model_id,
                seq,
                result,
            } => {
                if let Some(model) = self.current_model_mut(&model_id, Slice::Selections, seq) {
                    match result {
                        Ok(selections) => {
                            model.selections = selections;
                            model.selections_status.succeed();
                        }
                        Err(message) => model.selections_status.fail(message),
                    }
                }
                self.next_selection(&model_id, seq)
            }
            Outcome::SelectionsMutated {
                model_id,
                seq,
                op,
                result,
            } => {
                if let Some(model) = self.current_model_mut(&model_id, Slice::Selections, seq) {
                    match result {
                        Ok(()) => {
                            op.apply_to(&mut model.selections);
                            model.selections_status.error = None;
                        }
                        Err(message) => model.selections_status.error = Some(message),
                    }
                }
                self.next_selection(&model_id, seq)
            }
            Outcome::Charts {
                model_id,
                seq,
                result,
            } => {
                self.apply_charts(&model_id, seq, result);
                Ok(Effects::none())
            }
        }
    }

    fn apply_query_info(
        &mut self,
        id: &str,
        seq: u64,
        followup: Followup,
        result: std::result::Result<QueryInfo, String>,
    ) -> Result<Effects> {
        let Some(model) = self.current_model_mut(id, Slice::QueryInfo, seq) else {
            return Ok(Effects::none());
        };
        match result {
            Ok(info) => {
                model.query_info = Some(Arc::new(info));
                model.query_info_status.succeed();
            }
            Err(message) => {
                model.query_info_status.fail(message);
                return Ok(Effects::none());
            }
        }

        let mut effects = Effects::none();
        if followup.load_rows {
            effects.append(self.request_rows(id)?);
        }
        if followup.load_selections {
            effects.append(self.load_selections(id)?);
        }
        Ok(effects)
    }

    fn apply_rows(&mut self, id: &str, seq: u64, result: std::result::Result<RowsResponse, String>) {
        let Some(model) = self.current_model_mut(id, Slice::Rows, seq) else {
            return;
        };
        match result {
            Ok(response) => {
                model.rows = Some(Arc::new(response.rows));
                model.ordered_rows = Some(response.ordered_rows);
                model.row_count = Some(response.row_count);
                model.messages = response.messages;
                model.rows_status.succeed();
            }
            Err(message) => model.rows_status.fail(message),
        }
    }

    fn apply_charts(&mut self, id: &str, seq: u64, result: std::result::Result<Vec<Chart>, String>) {
        let Some(model) = self.current_model_mut(id, Slice::Charts, seq) else {
            return;
        };
        match result {
            Ok(charts) => {
                model.charts = Some(charts);
                model.charts_status.succeed();
            }
            Err(message) => model.charts_status.fail(message),
        }
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    fn model_ref(&self, id: &str) -> Result<&QueryModel> {
        self.models
            .get(id)
            .map(Arc::as_ref)
            .ok_or_else(|| StoreError::model_not_found(id))
    }

    fn model_mut(&mut self, id: &str) -> Result<&mut QueryModel> {
        let model = Arc::make_mut(&mut self.models)
            .get_mut(id)
            .ok_or_else(|| StoreError::model_not_found(id))?;
        Ok(Arc::make_mut(model))
    }

    /// The model, if `seq` is still the latest request for `slice`.
    fn current_model_mut(&mut self, id: &str, slice: Slice, seq: u64) -> Option<&mut QueryModel> {
        let Some(model) = self.models.get(id) else {
            debug!(model = id, slice = %slice, "Dropping response for removed model");
            return None;
        };
        if !model.status(slice).is_current(seq) {
            debug!(
                model = id,
                slice = %slice,
                seq,
                latest = model.status(slice).request_seq,
                "Discarding stale response"
            );
            return None;
        }
        self.model_mut(id).ok()
    }

    fn request(&self, id: &str, seq: u64) -> Result<LoadRequest> {
        let model = self
            .models
            .get(id)
            .ok_or_else(|| StoreError::model_not_found(id))?;
        Ok(LoadRequest {
            model_id: id.to_string(),
            seq,
            model: Arc::clone(model),
        })
    }
}

