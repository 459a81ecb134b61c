//! Query execution with a response cache and in-flight deduplication.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use futures_util::{
    FutureExt,
    future::{BoxFuture, Shared},
};
use serde_json::Value;

use crate::{
    error::VaultError,
    graphql::{GraphqlRequest, Operation, Variables},
    identity::{Identity, IdentityProvider},
    transport::Transport,
};

/// How a query may use the local response cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestPolicy {
    /// Serve from cache when possible; identical concurrent misses share one request.
    #[default]
    CacheFirst,
    /// Always hit the network and refresh the cache entry on success.
    NetworkOnly,
}

/// Outcome of [`QueryExecutor::execute`]. Errors are values here; nothing
/// past the executor has to deal with a panic or a bare transport error.
#[derive(Debug, Clone, Default)]
pub struct OperationResult {
    pub data: Option<Value>,
    pub error: Option<Arc<VaultError>>,
    pub from_cache: bool,
}

impl OperationResult {
    fn settled(result: Result<Value, Arc<VaultError>>) -> Self {
        match result {
            Ok(data) => Self {
                data: Some(data),
                ..Self::default()
            },
            Err(error) => Self {
                error: Some(error),
                ..Self::default()
            },
        }
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none() && self.data.is_some()
    }

    pub fn into_result(self) -> Result<Value, Arc<VaultError>> {
        match (self.data, self.error) {
            (_, Some(error)) => Err(error),
            (Some(data), None) => Ok(data),
            (None, None) => Err(Arc::new(VaultError::MissingData("data"))),
        }
    }
}

/// Shared handle to a request several callers are waiting on
type SharedFetch = Shared<BoxFuture<'static, Result<Value, Arc<VaultError>>>>;

/// State behind every clone of a [`QueryExecutor`]
struct ExecutorInner {
    transport: Arc<dyn Transport>,
    identity: IdentityProvider,
    cache: Mutex<HashMap<String, Value>>,
    in_flight: Mutex<HashMap<String, SharedFetch>>,
}

/// Lock a mutex, recovering the data if a holder panicked
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Issues GraphQL operations with the identity header attached. Cheap to
/// clone; clones share cache and in-flight table.
#[derive(Clone)]
pub struct QueryExecutor {
    inner: Arc<ExecutorInner>,
}

impl QueryExecutor {
    pub fn new(transport: Arc<dyn Transport>, identity: IdentityProvider) -> Self {
        Self {
            inner: Arc::new(ExecutorInner {
                transport,
                identity,
                cache: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }

    #[must_use]
    pub fn identity(&self) -> &IdentityProvider {
        &self.inner.identity
    }

    #[must_use]
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner.transport
    }

    /// Run a query under the given cache policy.
    pub async fn execute(
        &self,
        operation: &Operation,
        variables: Variables,
        policy: RequestPolicy,
    ) -> OperationResult {
        let variables = normalize_variables(variables);
        let identity = self.inner.identity.get_identity();
        let key = cache_key(operation, &variables, identity.as_ref());

        match policy {
            RequestPolicy::NetworkOnly => {
                log::debug!("{} network-only", operation.name);
                OperationResult::settled(self.clone().fetch(*operation, variables, key, false).await)
            }
            RequestPolicy::CacheFirst => {
                if let Some(hit) = lock(&self.inner.cache).get(&key).cloned() {
                    log::debug!("{} served from cache", operation.name);
                    return OperationResult {
                        data: Some(hit),
                        error: None,
                        from_cache: true,
                    };
                }

                let pending = {
                    let mut in_flight = lock(&self.inner.in_flight);
                    if let Some(pending) = in_flight.get(&key) {
                        log::debug!("{} joined in-flight request", operation.name);
                        pending.clone()
                    } else {
                        log::debug!("{} cache miss", operation.name);
                        let pending = self
                            .clone()
                            .fetch(*operation, variables, key.clone(), true)
                            .boxed()
                            .shared();
                        in_flight.insert(key, pending.clone());
                        pending
                    }
                };
                OperationResult::settled(pending.await)
            }
        }
    }

    /// Send an operation without touching the cache. Used for mutations.
    pub async fn send(
        &self,
        operation: &Operation,
        variables: Variables,
    ) -> Result<Value, VaultError> {
        let request = GraphqlRequest::new(operation, normalize_variables(variables));
        let identity = self.inner.identity.get_identity();
        log::debug!(
            "sending {} {} (identity: {})",
            operation.kind,
            operation.name,
            identity.is_some()
        );
        self.inner
            .transport
            .execute(request, identity)
            .await?
            .into_result()
    }

    /// Network round trip that refreshes the cache on success
    async fn fetch(
        self,
        operation: Operation,
        variables: Variables,
        key: String,
        registered: bool,
    ) -> Result<Value, Arc<VaultError>> {
        let result = self.send(&operation, variables).await;
        if let Ok(ref data) = result {
            lock(&self.inner.cache).insert(key.clone(), data.clone());
        }
        if registered {
            lock(&self.inner.in_flight).remove(&key);
        }
        result.map_err(Arc::new)
    }

    /// Drop every cached response
    pub fn clear_cache(&self) {
        lock(&self.inner.cache).clear();
    }
}

impl std::fmt::Debug for QueryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryExecutor")
            .field("identity", &self.inner.identity)
            .field("cached", &lock(&self.inner.cache).len())
            .field("in_flight", &lock(&self.inner.in_flight).len())
            .finish_non_exhaustive()
    }
}

/// Blank strings become "no constraint": they, and nulls, are dropped from
/// the variables. Lists lose blank entries and vanish when nothing is left.
#[must_use]
pub fn normalize_variables(variables: Variables) -> Variables {
    variables
        .into_iter()
        .map(|(name, value)| (name, normalize_value(value)))
        .filter(|(_, value)| !value.is_null())
        .collect()
}

/// Normalize a single variable value
fn normalize_value(value: Value) -> Value {
    match value {
        Value::String(s) if s.trim().is_empty() => Value::Null,
        Value::Array(items) => {
            let items: Vec<Value> = items
                .into_iter()
                .map(normalize_value)
                .filter(|v| !v.is_null())
                .collect();
            if items.is_empty() {
                Value::Null
            } else {
                Value::Array(items)
            }
        }
        other => other,
    }
}

/// Stable key for an operation, its (normalized) variables and the identity
/// it is sent under. Answers fetched anonymously are never served to an identity.
fn cache_key(operation: &Operation, variables: &Variables, identity: Option<&Identity>) -> String {
    let sorted: BTreeMap<&String, &Value> = variables.iter().collect();
    let encoded = serde_json::to_string(&sorted).unwrap_or_default();
    let owner = identity.map_or("-", Identity::as_str);
    format!("{owner}:{}:{encoded}", operation.name)
}
