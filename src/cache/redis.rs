use crate::cache::TagCache;
use crate::config::CacheConfig;
use crate::error::{Error, Result};
use ::redis::aio::MultiplexedConnection;
use ::redis::FromRedisValue;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::time::timeout;

/// Redis backed cache shared by all workers.
///
/// The connection is opened on first use, so an unreachable server only
/// shows up as failed lookups. Connecting and every command are bounded by
/// the configured timeouts, after which the lookup counts as a backend error.
pub struct RedisCache {
    client: ::redis::Client,
    connection: OnceCell<MultiplexedConnection>,
    connect_timeout: Duration,
    response_timeout: Duration,
}

impl RedisCache {
    pub fn new(config: &CacheConfig) -> Result<RedisCache> {
        let url = config
            .url()
            .map_err(|e| Error::CacheBackend(format!("invalid redis address: {}", e)))?;
        let client = ::redis::Client::open(url.as_str())?;
        return Ok(RedisCache {
            client,
            connection: OnceCell::new(),
            connect_timeout: config.connect_timeout,
            response_timeout: config.response_timeout,
        });
    }

    async fn connect(&self) -> Result<MultiplexedConnection> {
        let connecting = self.client.get_multiplexed_async_connection();
        return match timeout(self.connect_timeout, connecting).await {
            Ok(connection) => Ok(connection?),
            Err(_) => Err(Error::CacheBackend(format!(
                "no connection to redis within {:?}",
                self.connect_timeout
            ))),
        };
    }

    async fn connection(&self) -> Result<MultiplexedConnection> {
        let connection = self.connection.get_or_try_init(|| self.connect()).await?;
        return Ok(connection.clone());
    }

    async fn query<T: FromRedisValue>(&self, cmd: &::redis::Cmd) -> Result<T> {
        let mut connection = self.connection().await?;
        return match timeout(self.response_timeout, cmd.query_async::<_, T>(&mut connection)).await
        {
            Ok(value) => Ok(value?),
            Err(_) => Err(Error::CacheBackend(format!(
                "no reply from redis within {:?}",
                self.response_timeout
            ))),
        };
    }
}

/// `SET key value [EX secs]`; a zero TTL stores the key without expiry.
fn set_command(key: &str, value: &str, ttl: Duration) -> ::redis::Cmd {
    let mut cmd = ::redis::cmd("SET");
    cmd.arg(key).arg(value);
    if !ttl.is_zero() {
        cmd.arg("EX").arg(ttl.as_secs().max(1));
    }
    return cmd;
}

#[async_trait]
impl TagCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut cmd = ::redis::cmd("GET");
        cmd.arg(key);
        return self.query::<Option<String>>(&cmd).await;
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        return self.query::<()>(&set_command(key, value, ttl)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::cached_tag_date;
    use crate::registry::parse_timestamp;
    use std::time::Instant;
    use tokio::net::TcpListener;

    #[test]
    fn it_accepts_default_settings() {
        assert!(RedisCache::new(&CacheConfig::default()).is_ok());
    }

    #[test]
    fn it_sets_keys_with_an_expiry() {
        let mut expected = ::redis::cmd("SET");
        expected.arg("img:1.0").arg("v").arg("EX").arg(60u64);
        assert_eq!(
            set_command("img:1.0", "v", Duration::from_secs(60)).get_packed_command(),
            expected.get_packed_command()
        );
    }

    #[test]
    fn it_sets_keys_without_expiry_for_a_zero_ttl() {
        let mut expected = ::redis::cmd("SET");
        expected.arg("img:1.0").arg("v");
        assert_eq!(
            set_command("img:1.0", "v", Duration::ZERO).get_packed_command(),
            expected.get_packed_command()
        );
    }

    #[tokio::test]
    async fn it_degrades_when_redis_is_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let cache = RedisCache::new(&CacheConfig {
            host: "127.0.0.1".to_string(),
            port,
            ..Default::default()
        })
        .unwrap();
        assert!(matches!(cache.get("img:1.0").await, Err(Error::CacheBackend(_))));

        let date = cached_tag_date(&cache, "img:1.0", Duration::from_secs(60), || async {
            parse_timestamp("2021-06-01T00:00:00Z")
        })
        .await
        .unwrap();
        assert_eq!(date, parse_timestamp("2021-06-01T00:00:00Z").unwrap());
    }

    #[tokio::test]
    async fn it_gives_up_on_a_silent_server() {
        // accepts connections and never answers
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let cache = RedisCache::new(&CacheConfig {
            host: "127.0.0.1".to_string(),
            port,
            connect_timeout: Duration::from_millis(200),
            response_timeout: Duration::from_millis(200),
            ..Default::default()
        })
        .unwrap();

        let started = Instant::now();
        let lookup = cached_tag_date(&cache, "img:1.0", Duration::from_secs(60), || async {
            parse_timestamp("2021-06-01T00:00:00Z")
        });
        let date = tokio::time::timeout(Duration::from_secs(5), lookup)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(date, parse_timestamp("2021-06-01T00:00:00Z").unwrap());
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
