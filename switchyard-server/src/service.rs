//! Service descriptions: the contract a domain service satisfies to be
//! dispatched to.

use crate::error::{DispatchError, HandlerError};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use switchyard_protocol::{MethodId, ServiceId};

/// A method endpoint. Takes the decoded payload, returns a result to encode.
pub type Handler<P> = Arc<dyn Fn(P) -> Result<P, HandlerError> + Send + Sync>;

/// A service identifier together with its method table.
///
/// Built by the service author and moved into the registry, after which it is
/// only reachable through shared references and cannot change.
pub struct ServiceDescription<P> {
    id: ServiceId,
    name: Option<String>,
    endpoints: HashMap<MethodId, Handler<P>>,
}

impl<P> ServiceDescription<P> {
    /// Creates an empty description for `id`.
    pub fn new(id: impl Into<ServiceId>) -> Self {
        Self {
            id: id.into(),
            name: None,
            endpoints: HashMap::new(),
        }
    }

    /// Sets a human-readable name used in logs.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Adds a method. A later handler for the same method replaces the earlier one.
    pub fn with_method<F>(self, method: impl Into<MethodId>, handler: F) -> Self
    where
        F: Fn(P) -> Result<P, HandlerError> + Send + Sync + 'static,
    {
        self.with_handler(method, Arc::new(handler))
    }

    /// Adds an already shared handler.
    pub fn with_handler(mut self, method: impl Into<MethodId>, handler: Handler<P>) -> Self {
        self.endpoints.insert(method.into(), handler);
        self
    }

    pub fn id(&self) -> ServiceId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the registered method identifiers in ascending order.
    pub fn methods(&self) -> Vec<MethodId> {
        let mut methods: Vec<_> = self.endpoints.keys().copied().collect();
        methods.sort();
        methods
    }

    /// Looks up the handler for `method`.
    pub fn endpoint_handler(&self, method: MethodId) -> Result<Handler<P>, DispatchError> {
        self.endpoints
            .get(&method)
            .cloned()
            .ok_or(DispatchError::UnknownMethod {
                service: self.id,
                method,
            })
    }
}

impl<P> fmt::Debug for ServiceDescription<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescription")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("methods", &self.methods())
            .finish()
    }
}
