//! Reactive store of query models.
//!
//! [`QueryModelStore`] holds the models and turns actions into state changes
//! plus [`Effects`]. [`spawn_store`] runs it on tokio against a
//! [`QueryModelLoader`], publishing snapshots to subscribers.

pub mod action;
pub mod effect;
pub mod error;
pub mod loader;
pub mod logging;
pub mod runtime;
pub mod selection;
pub mod settings;
pub mod store;
pub mod url;

pub use action::Action;
pub use effect::{Effect, Effects, Followup, LoadRequest, LoaderCall, Outcome};
pub use error::{Result, StoreError};
pub use loader::{LoaderError, QueryModelLoader, RowsResponse, resolve_error_message};
pub use logging::{LogConfig, LogFormat, init_logging, init_logging_with_writer};
pub use runtime::{StoreHandle, spawn_store};
pub use selection::{SelectionOp, SelectionQueue};
pub use settings::{LogSettings, SettingsError, StoreSettings};
pub use store::{ModelMap, QueryModelStore};
pub use url::{UrlQuery, UrlState};
