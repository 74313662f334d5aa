//! Async runtime owning a [`QueryModelStore`].
//!
//! A single task receives actions and loader outcomes on one channel and
//! applies them in arrival order. Loader calls run as separate tasks and
//! report back on the same channel, so the store itself is never shared.
//! Consumers read snapshots published on `watch` channels.

use std::sync::Arc;

use lims_model::{QueryConfig, QueryModel};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, warn};

use crate::action::Action;
use crate::effect::{Effect, Effects, LoaderCall, Outcome};
use crate::error::{Result, StoreError};
use crate::loader::{LoaderError, QueryModelLoader};
use crate::store::{ModelMap, QueryModelStore};
use crate::url::UrlQuery;

enum Command {
    Dispatch {
        action: Action,
        reply: oneshot::Sender<Result<()>>,
    },
    AddModel {
        config: QueryConfig,
        load: bool,
        load_selections: bool,
        reply: oneshot::Sender<String>,
    },
    Outcome(Outcome),
    WhenSettled(oneshot::Sender<()>),
}

/// Cloneable handle to a running store.
#[derive(Clone)]
pub struct StoreHandle {
    commands: mpsc::UnboundedSender<Command>,
    models: watch::Receiver<Arc<ModelMap>>,
    location: watch::Receiver<UrlQuery>,
}

/// Spawn the runtime on the current tokio runtime.
pub fn spawn_store(store: QueryModelStore, loader: Arc<dyn QueryModelLoader>) -> StoreHandle {
    let (commands, receiver) = mpsc::unbounded_channel();
    let (models_tx, models) = watch::channel(store.snapshot());
    let (location_tx, location) = watch::channel(store.location().clone());

    let runtime = StoreRuntime {
        store,
        loader,
        commands: commands.downgrade(),
        models_tx,
        location_tx,
        in_flight: 0,
        settled: Vec::new(),
    };
    tokio::spawn(runtime.run(receiver));

    StoreHandle {
        commands,
        models,
        location,
    }
}

impl StoreHandle {
    /// Apply an action. Resolves once the state change is published; loads
    /// it started may still be running.
    pub async fn dispatch(&self, action: Action) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Dispatch { action, reply })?;
        response.await.map_err(|_| StoreError::RuntimeStopped)?
    }

    /// Register a model and return its id.
    pub async fn add_model(
        &self,
        config: QueryConfig,
        load: bool,
        load_selections: bool,
    ) -> Result<String> {
        let (reply, response) = oneshot::channel();
        self.send(Command::AddModel {
            config,
            load,
            load_selections,
            reply,
        })?;
        response.await.map_err(|_| StoreError::RuntimeStopped)
    }

    /// Resolves once no action is queued and no loader call is running.
    pub async fn settled(&self) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.send(Command::WhenSettled(reply))?;
        response.await.map_err(|_| StoreError::RuntimeStopped)
    }

    pub fn snapshot(&self) -> Arc<ModelMap> {
        Arc::clone(&self.models.borrow())
    }

    pub fn model(&self, id: &str) -> Option<Arc<QueryModel>> {
        self.models.borrow().get(id).cloned()
    }

    pub fn location(&self) -> UrlQuery {
        self.location.borrow().clone()
    }

    /// Receiver notified on every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<ModelMap>> {
        self.models.clone()
    }

    pub fn subscribe_location(&self) -> watch::Receiver<UrlQuery> {
        self.location.clone()
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| StoreError::RuntimeStopped)
    }
}

struct StoreRuntime {
    store: QueryModelStore,
    loader: Arc<dyn QueryModelLoader>,
    // Weak so the runtime stops once every handle is dropped.
    commands: mpsc::WeakUnboundedSender<Command>,
    models_tx: watch::Sender<Arc<ModelMap>>,
    location_tx: watch::Sender<UrlQuery>,
    in_flight: usize,
    settled: Vec<oneshot::Sender<()>>,
}

impl StoreRuntime {
    async fn run(mut self, mut receiver: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = receiver.recv().await {
            self.handle(command);
            self.publish();
            if self.in_flight == 0 && receiver.is_empty() {
                for waiter in self.settled.drain(..) {
                    let _ = waiter.send(());
                }
            }
        }
        debug!("Store runtime stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Dispatch { action, reply } => {
                let result = match self.store.dispatch(action) {
                    Ok(effects) => {
                        self.execute(effects);
                        Ok(())
                    }
                    Err(error) => {
                        warn!(%error, "Action rejected");
                        Err(error)
                    }
                };
                self.publish();
                let _ = reply.send(result);
            }
            Command::AddModel {
                config,
                load,
                load_selections,
                reply,
            } => {
                let (id, effects) = self.store.add_model(config, load, load_selections);
                self.execute(effects);
                self.publish();
                let _ = reply.send(id);
            }
            Command::Outcome(outcome) => {
                self.in_flight = self.in_flight.saturating_sub(1);
                match self.store.apply(outcome) {
                    Ok(effects) => self.execute(effects),
                    Err(error) => warn!(%error, "Failed to apply loader outcome"),
                }
            }
            Command::WhenSettled(waiter) => self.settled.push(waiter),
        }
    }

    fn execute(&mut self, effects: Effects) {
        for effect in effects {
            match effect {
                Effect::Load(call) => self.spawn_call(call),
                Effect::WriteUrl(location) => {
                    self.location_tx.send_replace(location);
                }
            }
        }
    }

    fn spawn_call(&mut self, call: LoaderCall) {
        let Some(commands) = self.commands.upgrade() else {
            return;
        };
        let loader = Arc::clone(&self.loader);
        let fallback = call.clone();
        self.in_flight += 1;
        tokio::spawn(async move {
            // A panicking loader still has to report back, or the store
            // never settles.
            let task = tokio::spawn(async move { call.run(loader.as_ref()).await });
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(error) => {
                    warn!(
                        model = fallback.model_id(),
                        op = fallback.name(),
                        %error,
                        "Loader task failed"
                    );
                    fallback.failed(LoaderError::Other(anyhow::anyhow!("loader task failed")))
                }
            };
            let _ = commands.send(Command::Outcome(outcome));
        });
    }

    fn publish(&self) {
        let next = self.store.snapshot();
        self.models_tx.send_if_modified(|current| {
            if Arc::ptr_eq(current, &next) {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
