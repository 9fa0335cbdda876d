//! Service registry and endpoint resolution.

use crate::error::DispatchError;
use crate::service::{Handler, ServiceDescription};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use switchyard_protocol::{MethodId, ServiceId};

/// Maps service identifiers to their descriptions.
///
/// Registration takes the write lock; resolution takes the read lock and
/// returns a cloned handler, so no lock is held while a handler runs. Services
/// may therefore be registered while sessions are live.
pub struct Registry<P> {
    services: RwLock<HashMap<ServiceId, Arc<ServiceDescription<P>>>>,
}

impl<P> Registry<P> {
    pub fn new() -> Self {
        Self {
            services: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a service. Fails without touching existing state if the
    /// identifier is taken.
    pub fn register(&self, description: ServiceDescription<P>) -> Result<(), DispatchError> {
        let id = description.id();
        let mut services = self.services.write();
        if services.contains_key(&id) {
            return Err(DispatchError::DuplicateService(id));
        }

        tracing::debug!(
            "Registered service {} ({}) with {} method(s)",
            id,
            description.name().unwrap_or("unnamed"),
            description.methods().len()
        );
        services.insert(id, Arc::new(description));
        Ok(())
    }

    /// Resolves the handler for `method` on `service`.
    pub fn resolve(
        &self,
        service: ServiceId,
        method: MethodId,
    ) -> Result<Handler<P>, DispatchError> {
        let services = self.services.read();
        let description = services
            .get(&service)
            .ok_or(DispatchError::UnknownService(service))?;
        description.endpoint_handler(method)
    }

    /// Returns the description registered under `service`.
    pub fn get(&self, service: ServiceId) -> Option<Arc<ServiceDescription<P>>> {
        self.services.read().get(&service).cloned()
    }

    pub fn contains(&self, service: ServiceId) -> bool {
        self.services.read().contains_key(&service)
    }

    /// Returns all registered identifiers in ascending order.
    pub fn service_ids(&self) -> Vec<ServiceId> {
        let mut ids: Vec<_> = self.services.read().keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.services.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.read().is_empty()
    }
}

impl<P> Default for Registry<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;

    const ECHO: ServiceId = ServiceId::new([1, 0, 0]);
    const ECHO_METHOD: MethodId = MethodId::new([0, 0, 1]);

    fn echo_service() -> ServiceDescription<String> {
        ServiceDescription::new(ECHO).with_method(ECHO_METHOD, |payload: String| Ok(payload))
    }

    #[test]
    fn test_register_and_resolve() {
        let registry = Registry::new();
        registry.register(echo_service()).unwrap();

        let handler = registry.resolve(ECHO, ECHO_METHOD).unwrap();
        assert_eq!(handler("ping".to_string()).unwrap(), "ping");
        assert!(registry.contains(ECHO));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_resolve_returns_registered_handler() {
        let handler: Handler<String> = Arc::new(|payload: String| Ok(payload.to_uppercase()));
        let registry = Registry::new();
        registry
            .register(ServiceDescription::new(ECHO).with_handler(ECHO_METHOD, handler.clone()))
            .unwrap();

        let resolved = registry.resolve(ECHO, ECHO_METHOD).unwrap();
        assert!(Arc::ptr_eq(&resolved, &handler));
        assert_eq!(
            resolved("abc".to_string()).unwrap(),
            handler("abc".to_string()).unwrap()
        );
    }

    #[test]
    fn test_duplicate_registration_keeps_first() {
        let registry = Registry::new();
        registry.register(echo_service()).unwrap();

        let duplicate = ServiceDescription::new(ECHO)
            .with_method(ECHO_METHOD, |_: String| Err(HandlerError::new("second")));
        let err = registry.register(duplicate).unwrap_err();
        assert_eq!(err, DispatchError::DuplicateService(ECHO));

        let handler = registry.resolve(ECHO, ECHO_METHOD).unwrap();
        assert_eq!(handler("ping".to_string()).unwrap(), "ping");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unknown_service_and_method() {
        let registry = Registry::new();
        registry.register(echo_service()).unwrap();
        let before = registry.service_ids();

        let unknown = ServiceId::new([2, 0, 0]);
        assert_eq!(
            registry.resolve(unknown, ECHO_METHOD).err(),
            Some(DispatchError::UnknownService(unknown))
        );

        let missing = MethodId::new([0, 0, 2]);
        assert_eq!(
            registry.resolve(ECHO, missing).err(),
            Some(DispatchError::UnknownMethod {
                service: ECHO,
                method: missing,
            })
        );

        assert_eq!(registry.service_ids(), before);
    }

    #[test]
    fn test_same_method_id_in_two_services() {
        let registry = Registry::new();
        registry.register(echo_service()).unwrap();
        registry
            .register(
                ServiceDescription::new([3, 0, 0])
                    .with_method(ECHO_METHOD, |_: String| Ok("other".to_string())),
            )
            .unwrap();

        let first = registry.resolve(ECHO, ECHO_METHOD).unwrap();
        let second = registry
            .resolve(ServiceId::new([3, 0, 0]), ECHO_METHOD)
            .unwrap();
        assert_eq!(first("x".to_string()).unwrap(), "x");
        assert_eq!(second("x".to_string()).unwrap(), "other");
        assert_eq!(
            registry.service_ids(),
            vec![ECHO, ServiceId::new([3, 0, 0])]
        );
    }

    #[test]
    fn test_concurrent_resolution() {
        let registry = Arc::new(Registry::new());
        registry.register(echo_service()).unwrap();

        let threads: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    // Half the threads register new services while the rest resolve
                    if i % 2 == 0 {
                        registry
                            .register(ServiceDescription::new([10, 0, i as u8]))
                            .unwrap();
                    }
                    for _ in 0..100 {
                        let handler = registry.resolve(ECHO, ECHO_METHOD).unwrap();
                        assert_eq!(handler("ping".to_string()).unwrap(), "ping");
                    }
                })
            })
            .collect();

        for thread in threads {
            thread.join().unwrap();
        }
        assert_eq!(registry.len(), 5);
    }
}
