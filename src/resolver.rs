use crate::cache::{cache_key, cached_tag_date, RedisCache, TagCache};
use crate::config::{Config, DEFAULT_CACHE_TTL};
use crate::error::{Error, Result};
use crate::registry::{ImageReference, RegistryClient};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

/// Creation date of one tag.
#[derive(PartialEq, Clone, Debug)]
pub struct ResolvedTag {
    pub tag: String,
    pub created_at: DateTime<Utc>,
}

/// Everything a worker needs to date a tag of one image.
struct TagLookup {
    registry: Arc<RegistryClient>,
    cache: Option<Arc<dyn TagCache>>,
    cache_ttl: Duration,
    reference: ImageReference,
    image: String,
}

impl TagLookup {
    async fn date(&self, tag: &str) -> Result<DateTime<Utc>> {
        let fetch = || self.registry.tag_date(&self.reference, tag);
        return match &self.cache {
            Some(cache) => {
                let key = cache_key(&self.image, tag);
                cached_tag_date(cache.as_ref(), &key, self.cache_ttl, fetch).await
            }
            None => fetch().await,
        };
    }
}

/// Dates tags concurrently with a fixed number of workers.
pub struct Resolver {
    registry: Arc<RegistryClient>,
    cache: Option<Arc<dyn TagCache>>,
    cache_ttl: Duration,
    workers: usize,
}

impl Resolver {
    pub fn new(registry: RegistryClient, workers: usize) -> Resolver {
        return Resolver {
            registry: Arc::new(registry),
            cache: None,
            cache_ttl: DEFAULT_CACHE_TTL,
            workers,
        };
    }

    pub fn with_cache(mut self, cache: Arc<dyn TagCache>, ttl: Duration) -> Resolver {
        self.cache = Some(cache);
        self.cache_ttl = ttl;
        return self;
    }

    /// Builds a resolver from `config`. A cache that cannot be set up is
    /// logged and left out, since caching is never required for an answer.
    pub fn from_config(config: &Config) -> Resolver {
        let registry = RegistryClient::new(config.http.clone(), config.credentials.clone());
        let resolver = Resolver::new(registry, config.workers);
        let cache = match &config.cache {
            Some(cache) => cache,
            None => return resolver,
        };
        return match RedisCache::new(cache) {
            Ok(redis) => resolver.with_cache(Arc::new(redis), cache.ttl),
            Err(err) => {
                warn!("Running without cache: {}", err);
                resolver
            }
        };
    }

    pub fn registry(&self) -> &RegistryClient {
        return &self.registry;
    }

    fn lookup(&self, reference: &ImageReference, image: &str) -> TagLookup {
        return TagLookup {
            registry: self.registry.clone(),
            cache: self.cache.clone(),
            cache_ttl: self.cache_ttl,
            reference: reference.clone(),
            image: image.to_string(),
        };
    }

    /// Dates every tag, returning one `ResolvedTag` per input tag in no
    /// particular order.
    ///
    /// The first failed tag aborts the whole run; the remaining workers are
    /// cancelled and their results discarded.
    pub async fn resolve(
        &self,
        reference: &ImageReference,
        image: &str,
        tags: &[String],
    ) -> Result<Vec<ResolvedTag>> {
        if tags.is_empty() {
            return Err(Error::EmptyTagList {
                image: image.to_string(),
            });
        }

        let (job_tx, job_rx) = mpsc::channel(tags.len());
        for tag in tags {
            job_tx.try_send(tag.clone()).map_err(|_| Error::WorkerPool)?;
        }
        drop(job_tx);
        let jobs = Arc::new(Mutex::new(job_rx));

        let (result_tx, mut result_rx) = mpsc::channel(tags.len());
        let cancel = CancellationToken::new();
        // fires on every return path, including the first error
        let _stop_workers = cancel.clone().drop_guard();

        let lookup = Arc::new(self.lookup(reference, image));
        let workers = self.workers.clamp(1, tags.len());
        debug!("Resolving {} tags with {} workers", tags.len(), workers);

        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            handles.push(tokio::spawn(worker(
                lookup.clone(),
                jobs.clone(),
                result_tx.clone(),
                cancel.clone(),
            )));
        }
        drop(result_tx);

        let mut resolved = Vec::with_capacity(tags.len());
        while resolved.len() < tags.len() {
            match result_rx.recv().await {
                Some(Ok(tag)) => resolved.push(tag),
                Some(Err(err)) => {
                    debug!("Cancelling remaining tag lookups: {}", err);
                    return Err(err);
                }
                None => return Err(Error::WorkerPool),
            }
        }

        for handle in handles {
            if let Err(err) = handle.await {
                warn!("Worker did not shut down cleanly: {}", err);
            }
        }
        return Ok(resolved);
    }
}

async fn worker(
    lookup: Arc<TagLookup>,
    jobs: Arc<Mutex<mpsc::Receiver<String>>>,
    results: mpsc::Sender<Result<ResolvedTag>>,
    cancel: CancellationToken,
) {
    while !cancel.is_cancelled() {
        let tag = match jobs.lock().await.recv().await {
            Some(tag) => tag,
            None => break,
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = lookup.date(&tag) => result,
        };

        let resolved = result.map(|created_at| ResolvedTag { tag, created_at });
        if results.send(resolved).await.is_err() {
            break;
        }
    }
}
