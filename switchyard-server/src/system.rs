//! Built-in `system` service for JSON-payload servers.
//!
//! | method   | id       | result                                   |
//! |----------|----------|------------------------------------------|
//! | ping     | `000001` | `"pong"`                                 |
//! | echo     | `000002` | the request payload                      |
//! | info     | `000003` | server name, version, registered services |

use crate::error::HandlerError;
use crate::registry::Registry;
use crate::service::ServiceDescription;
use serde_json::{json, Value};
use std::sync::{Arc, Weak};
use switchyard_protocol::{MethodId, ServiceId};

pub const SYSTEM_SERVICE: ServiceId = ServiceId::new([0x00, 0x00, 0x00]);
pub const PING: MethodId = MethodId::new([0x00, 0x00, 0x01]);
pub const ECHO: MethodId = MethodId::new([0x00, 0x00, 0x02]);
pub const INFO: MethodId = MethodId::new([0x00, 0x00, 0x03]);

/// Builds the system service. `info` reports on `registry`, which it holds
/// weakly since the service is normally registered in that same registry.
pub fn system_service(registry: &Arc<Registry<Value>>) -> ServiceDescription<Value> {
    let registry = Arc::downgrade(registry);

    ServiceDescription::new(SYSTEM_SERVICE)
        .with_name("system")
        .with_method(PING, |_: Value| Ok(json!("pong")))
        .with_method(ECHO, Ok)
        .with_method(INFO, move |_: Value| info(&registry))
}

fn info(registry: &Weak<Registry<Value>>) -> Result<Value, HandlerError> {
    let registry = registry
        .upgrade()
        .ok_or_else(|| HandlerError::new("server registry is gone"))?;

    let services: Vec<Value> = registry
        .service_ids()
        .into_iter()
        .filter_map(|id| registry.get(id))
        .map(|service| {
            json!({
                "id": service.id().to_string(),
                "name": service.name(),
                "methods": service
                    .methods()
                    .iter()
                    .map(|m| m.to_string())
                    .collect::<Vec<_>>(),
            })
        })
        .collect();

    Ok(json!({
        "name": "switchyard",
        "version": env!("CARGO_PKG_VERSION"),
        "services": services,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with_system() -> Arc<Registry<Value>> {
        let registry = Arc::new(Registry::new());
        registry.register(system_service(&registry)).unwrap();
        registry
    }

    #[test]
    fn test_ping_and_echo() {
        let registry = registry_with_system();

        let ping = registry.resolve(SYSTEM_SERVICE, PING).unwrap();
        assert_eq!(ping(Value::Null).unwrap(), json!("pong"));

        let echo = registry.resolve(SYSTEM_SERVICE, ECHO).unwrap();
        assert_eq!(echo(json!({"a": [1, 2]})).unwrap(), json!({"a": [1, 2]}));
    }

    #[test]
    fn test_info_lists_services() {
        let registry = registry_with_system();
        registry
            .register(ServiceDescription::new([1, 0, 0]).with_name("firewall"))
            .unwrap();

        let info = registry.resolve(SYSTEM_SERVICE, INFO).unwrap();
        let result = info(Value::Null).unwrap();

        assert_eq!(result["name"], "switchyard");
        let services = result["services"].as_array().unwrap();
        assert_eq!(services.len(), 2);
        assert_eq!(services[0]["id"], "000000");
        assert_eq!(services[0]["methods"], json!(["000001", "000002", "000003"]));
        assert_eq!(services[1]["name"], "firewall");
    }

    #[test]
    fn test_info_after_registry_dropped() {
        let registry = Arc::new(Registry::new());
        let service = system_service(&registry);
        drop(registry);

        let info = service.endpoint_handler(INFO).unwrap();
        assert_eq!(
            info(Value::Null).unwrap_err().message(),
            "server registry is gone"
        );
    }
}
