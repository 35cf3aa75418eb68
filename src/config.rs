use std::fmt;

/// Cache backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    Redis,
    Memory,
    Disabled,
}

impl CacheBackend {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "memory" => Self::Memory,
            "disabled" | "off" | "none" => Self::Disabled,
            _ => Self::Redis,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Redis => "redis",
            Self::Memory => "memory",
            Self::Disabled => "disabled",
        }
    }
}

impl fmt::Display for CacheBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Connection settings for one backend service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub name: String,
    pub url: String,
    pub api_key: Option<String>,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone)]
pub struct Config {
    // Server settings
    pub listen_addr: String,
    pub debug: bool,

    // Response cache settings
    pub cache_backend: CacheBackend,
    pub redis_url: String,
    pub cache_reconnect_max_attempts: u32,
    pub cache_reconnect_base_ms: u64,
    pub cache_reconnect_max_ms: u64,

    // Forwarding defaults
    pub proxy_timeout_ms: u64,
    pub proxy_retries: u32,
    pub proxy_retry_delay_ms: u64,

    // Aggregation settings
    pub aggregation_enabled: bool,

    // Shutdown settings
    pub drain_timeout_secs: u64,

    // Backend services
    pub services: Vec<ServiceConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_string(),
            debug: false,
            cache_backend: CacheBackend::Redis,
            redis_url: "redis://localhost:6379".to_string(),
            cache_reconnect_max_attempts: 5,
            cache_reconnect_base_ms: 100,
            cache_reconnect_max_ms: 3000,
            proxy_timeout_ms: 30_000,
            proxy_retries: 3,
            proxy_retry_delay_ms: 1000,
            aggregation_enabled: true,
            drain_timeout_secs: 15,
            services: default_services(),
        }
    }
}

fn default_services() -> Vec<ServiceConfig> {
    vec![
        service_from_env("affiliate", "AFFILIATE", "http://localhost:3001"),
        service_from_env("config", "CONFIG", "http://localhost:3002"),
        service_from_env("mlm", "MLM", "http://localhost:3003"),
        service_from_env("commission", "COMMISSION", "http://localhost:3004"),
        service_from_env("data", "DATA", "http://localhost:3005"),
    ]
}

fn service_from_env(name: &str, env_prefix: &str, default_url: &str) -> ServiceConfig {
    let url = std::env::var(format!("{}_SERVICE_URL", env_prefix))
        .unwrap_or_else(|_| default_url.to_string());

    let api_key = std::env::var(format!("{}_SERVICE_API_KEY", env_prefix)).ok();

    let timeout_ms = std::env::var(format!("{}_SERVICE_TIMEOUT_MS", env_prefix))
        .unwrap_or_else(|_| "10000".to_string())
        .parse()
        .unwrap_or(10_000);

    ServiceConfig {
        name: name.to_string(),
        url,
        api_key,
        timeout_ms,
    }
}

pub fn load_config() -> anyhow::Result<Config> {
    let listen_addr =
        std::env::var("GATEWAY_LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

    let debug = std::env::var("DEBUG").is_ok();

    let cache_backend = CacheBackend::from_str(
        &std::env::var("GATEWAY_CACHE_BACKEND").unwrap_or_else(|_| "redis".to_string()),
    );

    let redis_url = std::env::var("GATEWAY_REDIS_URL")
        .unwrap_or_else(|_| "redis://localhost:6379".to_string());

    let cache_reconnect_max_attempts = std::env::var("GATEWAY_CACHE_RECONNECT_MAX_ATTEMPTS")
        .unwrap_or_else(|_| "5".to_string())
        .parse()
        .unwrap_or(5);

    let cache_reconnect_base_ms = std::env::var("GATEWAY_CACHE_RECONNECT_BASE_MS")
        .unwrap_or_else(|_| "100".to_string())
        .parse()
        .unwrap_or(100);

    let cache_reconnect_max_ms = std::env::var("GATEWAY_CACHE_RECONNECT_MAX_MS")
        .unwrap_or_else(|_| "3000".to_string())
        .parse()
        .unwrap_or(3000);

    let proxy_timeout_ms = std::env::var("GATEWAY_PROXY_TIMEOUT_MS")
        .unwrap_or_else(|_| "30000".to_string())
        .parse()
        .unwrap_or(30_000);

    let proxy_retries = std::env::var("GATEWAY_PROXY_RETRIES")
        .unwrap_or_else(|_| "3".to_string())
        .parse()
        .unwrap_or(3);

    let proxy_retry_delay_ms = std::env::var("GATEWAY_PROXY_RETRY_DELAY_MS")
        .unwrap_or_else(|_| "1000".to_string())
        .parse()
        .unwrap_or(1000);

    let aggregation_enabled = std::env::var("GATEWAY_AGGREGATION_ENABLED")
        .map(|v| v.to_lowercase() != "false")
        .unwrap_or(true);

    let drain_timeout_secs = std::env::var("GATEWAY_DRAIN_TIMEOUT_SECS")
        .unwrap_or_else(|_| "15".to_string())
        .parse()
        .unwrap_or(15);

    Ok(Config {
        listen_addr,
        debug,
        cache_backend,
        redis_url,
        cache_reconnect_max_attempts,
        cache_reconnect_base_ms,
        cache_reconnect_max_ms,
        proxy_timeout_ms,
        proxy_retries,
        proxy_retry_delay_ms,
        aggregation_enabled,
        drain_timeout_secs,
        services: default_services(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.listen_addr, "0.0.0.0:3000");
        assert_eq!(cfg.cache_backend, CacheBackend::Redis);
        assert_eq!(cfg.proxy_retries, 3);
        assert_eq!(cfg.services.len(), 5);
    }

    #[test]
    fn test_cache_backend_from_str() {
        assert_eq!(CacheBackend::from_str("redis"), CacheBackend::Redis);
        assert_eq!(CacheBackend::from_str("memory"), CacheBackend::Memory);
        assert_eq!(CacheBackend::from_str("MEMORY"), CacheBackend::Memory);
        assert_eq!(CacheBackend::from_str("disabled"), CacheBackend::Disabled);
        assert_eq!(CacheBackend::from_str("off"), CacheBackend::Disabled);
        assert_eq!(CacheBackend::from_str("anything"), CacheBackend::Redis);
    }

    #[test]
    fn test_cache_backend_display() {
        assert_eq!(CacheBackend::Redis.to_string(), "redis");
        assert_eq!(CacheBackend::Memory.to_string(), "memory");
        assert_eq!(CacheBackend::Disabled.to_string(), "disabled");
    }

    #[test]
    fn test_default_service_table() {
        let cfg = Config::default();
        let names: Vec<&str> = cfg.services.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["affiliate", "config", "mlm", "commission", "data"]);
    }

    #[test]
    fn test_load_config_with_custom_listen_addr() {
        std::env::set_var("GATEWAY_LISTEN_ADDR", "127.0.0.1:9000");
        let cfg = load_config().unwrap();
        assert_eq!(cfg.listen_addr, "127.0.0.1:9000");
        std::env::remove_var("GATEWAY_LISTEN_ADDR");
    }

    #[test]
    fn test_load_config_with_cache_backend() {
        std::env::set_var("GATEWAY_CACHE_BACKEND", "memory");
        let cfg = load_config().unwrap();
        assert_eq!(cfg.cache_backend, CacheBackend::Memory);
        std::env::remove_var("GATEWAY_CACHE_BACKEND");
    }

    #[test]
    fn test_load_config_with_proxy_settings() {
        std::env::set_var("GATEWAY_PROXY_RETRIES", "7");
        std::env::set_var("GATEWAY_PROXY_RETRY_DELAY_MS", "250");
        let cfg = load_config().unwrap();
        assert_eq!(cfg.proxy_retries, 7);
        assert_eq!(cfg.proxy_retry_delay_ms, 250);
        std::env::remove_var("GATEWAY_PROXY_RETRIES");
        std::env::remove_var("GATEWAY_PROXY_RETRY_DELAY_MS");
    }

    #[test]
    fn test_load_config_parse_error_uses_default() {
        std::env::set_var("GATEWAY_PROXY_TIMEOUT_MS", "not_a_number");
        let cfg = load_config().unwrap();
        assert_eq!(cfg.proxy_timeout_ms, 30_000);
        std::env::remove_var("GATEWAY_PROXY_TIMEOUT_MS");
    }

    #[test]
    fn test_load_config_aggregation_disabled() {
        std::env::set_var("GATEWAY_AGGREGATION_ENABLED", "false");
        let cfg = load_config().unwrap();
        assert!(!cfg.aggregation_enabled);
        std::env::remove_var("GATEWAY_AGGREGATION_ENABLED");
    }

    #[test]
    fn test_service_from_env_overrides() {
        std::env::set_var("COMMISSION_SERVICE_URL", "http://commission.internal:8080");
        std::env::set_var("COMMISSION_SERVICE_API_KEY", "commission-key");
        std::env::set_var("COMMISSION_SERVICE_TIMEOUT_MS", "2500");

        let svc = service_from_env("commission", "COMMISSION", "http://localhost:3004");
        assert_eq!(svc.url, "http://commission.internal:8080");
        assert_eq!(svc.api_key, Some("commission-key".to_string()));
        assert_eq!(svc.timeout_ms, 2500);

        std::env::remove_var("COMMISSION_SERVICE_URL");
        std::env::remove_var("COMMISSION_SERVICE_API_KEY");
        std::env::remove_var("COMMISSION_SERVICE_TIMEOUT_MS");
    }

    #[test]
    fn test_service_from_env_defaults() {
        let svc = service_from_env("mlm", "MLM_TEST_UNSET", "http://localhost:3003");
        assert_eq!(svc.url, "http://localhost:3003");
        assert_eq!(svc.api_key, None);
        assert_eq!(svc.timeout_ms, 10_000);
    }
}
