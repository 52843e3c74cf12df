//! crates/relevamiento_core/src/store/mod.rs
//!
//! The client state container. Named slices are composed into one snapshot;
//! every dispatch runs exactly one slice reducer and produces a new snapshot
//! in which all other slices are shared with the previous one.

pub mod persist;
pub mod slices;

use serde::{de::DeserializeOwned, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::{debug, warn};

//=========================================================================================
// Slices and Actions
//=========================================================================================

/// An independently-reducible named partition of the client state.
pub trait Slice: Send + Sync + 'static {
    const NAME: &'static str;
    type State: Clone + Default + Serialize + DeserializeOwned + Send + Sync + 'static;
    type Action: fmt::Debug + Send + Sync + 'static;

    fn reduce(state: &Self::State, action: &Self::Action) -> Self::State;
}

/// An action addressed to exactly one slice.
pub struct Action {
    slice: &'static str,
    payload: Box<dyn Any + Send + Sync>,
}

impl Action {
    pub fn new<S: Slice>(action: S::Action) -> Self {
        Self {
            slice: S::NAME,
            payload: Box::new(action),
        }
    }

    pub fn slice(&self) -> &'static str {
        self.slice
    }

    /// The payload, if this action targets `S`.
    pub fn payload<S: Slice>(&self) -> Option<&S::Action> {
        if self.slice != S::NAME {
            return None;
        }
        (*self.payload).downcast_ref::<S::Action>()
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action").field("slice", &self.slice).finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("slice '{0}' is registered more than once")]
    DuplicateSlice(&'static str),
    #[error("no slice named '{0}' is registered")]
    UnknownSlice(&'static str),
    #[error("state or action does not belong to slice '{0}'")]
    TypeMismatch(&'static str),
    #[error("the store was already rehydrated")]
    AlreadyRehydrated,
    #[error("rehydration must happen before the first dispatch")]
    RehydrateAfterDispatch,
    #[error("persisted state must be a JSON object")]
    MalformedSnapshot,
    #[error("failed to (de)serialize slice '{slice}': {source}")]
    Serde {
        slice: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

//=========================================================================================
// Type-erased reducers
//=========================================================================================

type SliceValue = Arc<dyn Any + Send + Sync>;

trait ErasedSlice: Send + Sync {
    fn name(&self) -> &'static str;
    fn initial(&self) -> SliceValue;
    fn reduce(&self, state: &SliceValue, action: &Action) -> Result<SliceValue, StoreError>;
    fn encode(&self, state: &SliceValue) -> Result<serde_json::Value, StoreError>;
    fn decode(&self, raw: serde_json::Value) -> Result<SliceValue, StoreError>;
}

struct Reducer<S>(PhantomData<fn() -> S>);

fn downcast<S: Slice>(state: &SliceValue) -> Result<&S::State, StoreError> {
    (**state)
        .downcast_ref::<S::State>()
        .ok_or(StoreError::TypeMismatch(S::NAME))
}

impl<S: Slice> ErasedSlice for Reducer<S> {
    fn name(&self) -> &'static str {
        S::NAME
    }

    fn initial(&self) -> SliceValue {
        Arc::new(S::State::default())
    }

    fn reduce(&self, state: &SliceValue, action: &Action) -> Result<SliceValue, StoreError> {
        let state = downcast::<S>(state)?;
        let action = action
            .payload::<S>()
            .ok_or(StoreError::TypeMismatch(S::NAME))?;
        Ok(Arc::new(S::reduce(state, action)))
    }

    fn encode(&self, state: &SliceValue) -> Result<serde_json::Value, StoreError> {
        serde_json::to_value(downcast::<S>(state)?)
            .map_err(|source| StoreError::Serde { slice: S::NAME, source })
    }

    fn decode(&self, raw: serde_json::Value) -> Result<SliceValue, StoreError> {
        let state: S::State = serde_json::from_value(raw)
            .map_err(|source| StoreError::Serde { slice: S::NAME, source })?;
        Ok(Arc::new(state))
    }
}

//=========================================================================================
// Snapshot
//=========================================================================================

#[derive(Clone)]
struct Entry {
    value: SliceValue,
    codec: Arc<dyn ErasedSlice>,
}

/// An immutable view of the whole state tree.
#[derive(Clone, Default)]
pub struct Snapshot {
    slices: BTreeMap<&'static str, Entry>,
}

impl Snapshot {
    /// The state of slice `S`, or `None` if `S` is not part of this store.
    pub fn get<S: Slice>(&self) -> Option<&S::State> {
        self.slices
            .get(S::NAME)
            .and_then(|entry| (*entry.value).downcast_ref::<S::State>())
    }

    pub fn slice_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.slices.keys().copied()
    }

    /// True when both snapshots hold the very same value for slice `name`.
    pub fn shares_slice(&self, other: &Snapshot, name: &str) -> bool {
        match (self.slices.get(name), other.slices.get(name)) {
            (Some(a), Some(b)) => Arc::ptr_eq(&a.value, &b.value),
            _ => false,
        }
    }

    /// Serializes every slice into one JSON object keyed by slice name.
    pub fn to_json(&self) -> Result<serde_json::Value, StoreError> {
        let mut tree = serde_json::Map::with_capacity(self.slices.len());
        for (name, entry) in &self.slices {
            tree.insert((*name).to_string(), entry.codec.encode(&entry.value)?);
        }
        Ok(serde_json::Value::Object(tree))
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.slices.keys()).finish()
    }
}

//=========================================================================================
// Store
//=========================================================================================

/// Observes every state transition. Runs synchronously inside `dispatch`,
/// after the new snapshot is computed. Must not dispatch.
pub trait DispatchHook: Send + Sync {
    fn after_dispatch(&self, previous: &Snapshot, action: &Action, next: &Snapshot);
}

struct Lifecycle {
    current: Arc<Snapshot>,
    dispatched: bool,
    rehydrated: bool,
}

pub struct Store {
    reducers: BTreeMap<&'static str, Arc<dyn ErasedSlice>>,
    hooks: Vec<Arc<dyn DispatchHook>>,
    lifecycle: Mutex<Lifecycle>,
    updates: watch::Sender<Arc<Snapshot>>,
}

#[derive(Default)]
pub struct StoreBuilder {
    reducers: Vec<Arc<dyn ErasedSlice>>,
    hooks: Vec<Arc<dyn DispatchHook>>,
}

impl StoreBuilder {
    pub fn slice<S: Slice>(mut self) -> Self {
        self.reducers.push(Arc::new(Reducer::<S>(PhantomData)));
        self
    }

    /// Hooks run in registration order.
    pub fn hook(mut self, hook: Arc<dyn DispatchHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn build(self) -> Result<Store, StoreError> {
        let mut reducers = BTreeMap::new();
        let mut initial = Snapshot::default();
        for reducer in self.reducers {
            let name = reducer.name();
            if reducers.contains_key(name) {
                return Err(StoreError::DuplicateSlice(name));
            }
            initial.slices.insert(
                name,
                Entry {
                    value: reducer.initial(),
                    codec: Arc::clone(&reducer),
                },
            );
            reducers.insert(name, reducer);
        }

        let initial = Arc::new(initial);
        let (updates, _) = watch::channel(Arc::clone(&initial));
        Ok(Store {
            reducers,
            hooks: self.hooks,
            lifecycle: Mutex::new(Lifecycle {
                current: initial,
                dispatched: false,
                rehydrated: false,
            }),
            updates,
        })
    }
}

impl Store {
    pub fn builder() -> StoreBuilder {
        StoreBuilder::default()
    }

    fn lifecycle(&self) -> std::sync::MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get_state(&self) -> Arc<Snapshot> {
        Arc::clone(&self.lifecycle().current)
    }

    /// Reads slice `S` through `f`. `None` if `S` is not registered.
    pub fn select<S: Slice, R>(&self, f: impl FnOnce(&S::State) -> R) -> Option<R> {
        self.get_state().get::<S>().map(f)
    }

    /// A receiver that observes every new snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.updates.subscribe()
    }

    /// Runs the reducer of the slice `action` targets and publishes the result.
    ///
    /// Dispatches are serialized; hooks observe each transition before the
    /// next dispatch can start.
    pub fn dispatch(&self, action: Action) -> Result<Arc<Snapshot>, StoreError> {
        let name = action.slice();
        let reducer = self
            .reducers
            .get(name)
            .ok_or(StoreError::UnknownSlice(name))?;

        let mut lifecycle = self.lifecycle();
        let previous = Arc::clone(&lifecycle.current);
        let entry = previous
            .slices
            .get(name)
            .ok_or(StoreError::UnknownSlice(name))?;
        let value = reducer.reduce(&entry.value, &action)?;

        let mut next = (*previous).clone();
        next.slices.insert(
            name,
            Entry {
                value,
                codec: Arc::clone(reducer),
            },
        );
        let next = Arc::new(next);
        lifecycle.current = Arc::clone(&next);
        lifecycle.dispatched = true;

        for hook in &self.hooks {
            hook.after_dispatch(&previous, &action, &next);
        }
        self.updates.send_replace(Arc::clone(&next));
        debug!(slice = name, "action dispatched");
        Ok(next)
    }

    /// Merges a persisted tree over the initial state.
    ///
    /// Allowed once, and only before the first dispatch. Slices absent from
    /// `persisted` keep their defaults; so do slices that fail to decode.
    pub fn rehydrate(&self, persisted: &serde_json::Value) -> Result<Arc<Snapshot>, StoreError> {
        let tree = persisted.as_object().ok_or(StoreError::MalformedSnapshot)?;

        let mut lifecycle = self.lifecycle();
        if lifecycle.rehydrated {
            return Err(StoreError::AlreadyRehydrated);
        }
        if lifecycle.dispatched {
            return Err(StoreError::RehydrateAfterDispatch);
        }

        let mut next = (*lifecycle.current).clone();
        for (name, reducer) in &self.reducers {
            let Some(raw) = tree.get(*name) else {
                continue;
            };
            match reducer.decode(raw.clone()) {
                Ok(value) => {
                    next.slices.insert(
                        *name,
                        Entry {
                            value,
                            codec: Arc::clone(reducer),
                        },
                    );
                }
                Err(err) => warn!(slice = *name, error = %err, "Keeping default state for slice"),
            }
        }

        let next = Arc::new(next);
        lifecycle.current = Arc::clone(&next);
        lifecycle.rehydrated = true;
        self.updates.send_replace(Arc::clone(&next));
        debug!(slices = tree.len(), "store rehydrated");
        Ok(next)
    }
}

/// The survey's state tree: every standard slice, plus `hooks`.
pub fn survey_store(hooks: Vec<Arc<dyn DispatchHook>>) -> Result<Store, StoreError> {
    use slices::*;

    let builder = Store::builder()
        .slice::<SchoolSpace>()
        .slice::<InstitutionSlice>()
        .slice::<Attachments>()
        .slice::<BasicServices>()
        .slice::<Transport>()
        .slice::<RiskFactors>()
        .slice::<Constructions>()
        .slice::<WaterService>()
        .slice::<Site>()
        .slice::<Visits>();
    hooks
        .into_iter()
        .fold(builder, |builder, hook| builder.hook(hook))
        .build()
}
