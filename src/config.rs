use std::time::Duration;
use url::Url;

pub const DEFAULT_WORKERS: usize = 30;
pub const DEFAULT_RETRIES: u32 = 10;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(1);
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(604800);
pub const DEFAULT_CACHE_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_CACHE_RESPONSE_TIMEOUT: Duration = Duration::from_secs(3);

/// Basic auth credentials for the registry.
#[derive(Clone, PartialEq, Debug)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Returns credentials only when both parts are non-empty, which is the
    /// only case where an `Authorization` header is sent.
    pub fn new(username: &str, password: &str) -> Option<Credentials> {
        if username.is_empty() || password.is_empty() {
            return None;
        }
        return Some(Credentials {
            username: username.to_string(),
            password: password.to_string(),
        });
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct HttpConfig {
    /// Extra attempts after the first one.
    pub retries: u32,
    /// Applies to each attempt separately.
    pub timeout: Duration,
    /// Attempt `n` waits `n * retry_backoff` before being sent.
    pub retry_backoff: Duration,
    /// Talk plain HTTP to the registry.
    pub insecure: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        return HttpConfig {
            retries: DEFAULT_RETRIES,
            timeout: DEFAULT_TIMEOUT,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            insecure: false,
        };
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct CacheConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub db: i64,
    /// Zero keeps entries forever.
    pub ttl: Duration,
    pub connect_timeout: Duration,
    /// Bounds every command sent once connected.
    pub response_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        return CacheConfig {
            host: "localhost".to_string(),
            port: 6379,
            password: "".to_string(),
            db: 0,
            ttl: DEFAULT_CACHE_TTL,
            connect_timeout: DEFAULT_CACHE_CONNECT_TIMEOUT,
            response_timeout: DEFAULT_CACHE_RESPONSE_TIMEOUT,
        };
    }
}

impl CacheConfig {
    pub fn url(&self) -> Result<Url, url::ParseError> {
        let host = if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        let mut url = Url::parse(&format!("redis://{}:{}/{}", host, self.port, self.db))?;
        if !self.password.is_empty() {
            // only fails for URLs that cannot carry credentials
            let _ = url.set_password(Some(&self.password));
        }
        return Ok(url);
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct Config {
    pub credentials: Option<Credentials>,
    pub workers: usize,
    pub http: HttpConfig,
    /// `None` disables caching.
    pub cache: Option<CacheConfig>,
}

impl Default for Config {
    fn default() -> Self {
        return Config {
            credentials: None,
            workers: DEFAULT_WORKERS,
            http: HttpConfig::default(),
            cache: None,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_requires_both_credential_parts() {
        assert_eq!(Credentials::new("", "secret"), None);
        assert_eq!(Credentials::new("user", ""), None);
        assert_eq!(
            Credentials::new("user", "secret"),
            Some(Credentials {
                username: "user".to_string(),
                password: "secret".to_string(),
            })
        );
    }

    #[test]
    fn it_builds_cache_urls() {
        let config = CacheConfig::default();
        assert_eq!(config.url().unwrap().as_str(), "redis://localhost:6379/0");

        let config = CacheConfig {
            host: "cache.internal".to_string(),
            port: 6380,
            password: "p@ss word".to_string(),
            db: 3,
            ..Default::default()
        };
        assert_eq!(
            config.url().unwrap().as_str(),
            "redis://:p%40ss%20word@cache.internal:6380/3"
        );
    }

    #[test]
    fn it_brackets_ipv6_hosts() {
        let config = CacheConfig {
            host: "::1".to_string(),
            ..Default::default()
        };
        assert_eq!(config.url().unwrap().as_str(), "redis://[::1]:6379/0");

        let config = CacheConfig {
            host: "[fe80::1]".to_string(),
            ..Default::default()
        };
        assert_eq!(config.url().unwrap().as_str(), "redis://[fe80::1]:6379/0");
    }
}
