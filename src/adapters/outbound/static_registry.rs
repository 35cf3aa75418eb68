//! Static Backend Registry (configuration-backed)
//!
//! Registry adapter built once from configuration at startup.
//! Read-only afterwards, so no synchronization is needed.

use crate::config::ServiceConfig;
use crate::domain::entities::Backend;
use crate::domain::errors::GatewayError;
use crate::domain::ports::BackendRegistry;
use std::collections::HashMap;
use std::time::Duration;

/// Backend registry backed by the static service table from
/// configuration.
pub struct StaticBackendRegistry {
    backends: HashMap<String, Backend>,
}

impl StaticBackendRegistry {
    /// Build the registry from the configured service table.
    pub fn new(services: &[ServiceConfig]) -> Self {
        let backends = services
            .iter()
            .map(|svc| Backend {
                name: svc.name.clone(),
                base_url: svc.url.trim_end_matches('/').to_string(),
                api_key: svc.api_key.clone(),
                timeout: Some(Duration::from_millis(svc.timeout_ms)),
                retries: None,
            })
            .map(|b| (b.name.clone(), b))
            .collect();

        Self { backends }
    }

    /// Build the registry from explicit backend descriptors.
    pub fn from_backends(backends: Vec<Backend>) -> Self {
        Self {
            backends: backends.into_iter().map(|b| (b.name.clone(), b)).collect(),
        }
    }
}

impl BackendRegistry for StaticBackendRegistry {
    fn resolve(&self, name: &str) -> Result<Backend, GatewayError> {
        self.backends
            .get(name)
            .cloned()
            .ok_or_else(|| GatewayError::UnknownBackend(name.to_string()))
    }

    fn list(&self) -> Vec<Backend> {
        let mut backends: Vec<Backend> = self.backends.values().cloned().collect();
        backends.sort_by(|a, b| a.name.cmp(&b.name));
        backends
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_services() -> Vec<ServiceConfig> {
        vec![
            ServiceConfig {
                name: "affiliate".to_string(),
                url: "http://localhost:3001/".to_string(),
                api_key: Some("secret".to_string()),
                timeout_ms: 10_000,
            },
            ServiceConfig {
                name: "config".to_string(),
                url: "http://localhost:3002".to_string(),
                api_key: None,
                timeout_ms: 5_000,
            },
        ]
    }

    #[test]
    fn test_resolve_known_backend() {
        let registry = StaticBackendRegistry::new(&sample_services());
        let backend = registry.resolve("affiliate").unwrap();

        assert_eq!(backend.name, "affiliate");
        assert_eq!(backend.api_key, Some("secret".to_string()));
        assert_eq!(backend.timeout, Some(Duration::from_millis(10_000)));
    }

    #[test]
    fn test_resolve_strips_trailing_slash() {
        let registry = StaticBackendRegistry::new(&sample_services());
        let backend = registry.resolve("affiliate").unwrap();

        assert_eq!(backend.base_url, "http://localhost:3001");
    }

    #[test]
    fn test_resolve_unknown_backend() {
        let registry = StaticBackendRegistry::new(&sample_services());
        let err = registry.resolve("billing").unwrap_err();

        assert!(matches!(err, GatewayError::UnknownBackend(name) if name == "billing"));
    }

    #[test]
    fn test_list_sorted_by_name() {
        let registry = StaticBackendRegistry::new(&sample_services());
        let names: Vec<String> = registry.list().into_iter().map(|b| b.name).collect();

        assert_eq!(names, vec!["affiliate", "config"]);
    }

    #[test]
    fn test_from_backends() {
        let registry = StaticBackendRegistry::from_backends(vec![Backend {
            name: "affiliate".to_string(),
            base_url: "http://localhost:9000".to_string(),
            api_key: None,
            timeout: None,
            retries: Some(0),
        }]);

        assert!(registry.resolve("affiliate").is_ok());
        assert_eq!(registry.list().len(), 1);
    }
}
