use clap::Parser;
use log::LevelFilter;
use newest_tag::config::{CacheConfig, Config, Credentials, HttpConfig, DEFAULT_RETRY_BACKOFF};
use newest_tag::util;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

const LOG_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Find the most recently created tag of a container image
/// (registries serving Image Manifest Version 2, Schema 1).
#[derive(Parser, Debug)]
#[command(name = "newest-tag", version, about)]
struct Cli {
    /// Image name, e.g. `redis`, `grafana/grafana` or `registry.example.com/team/app`
    image: String,

    /// Username for container registry
    #[arg(short, long, default_value = "anonymous")]
    username: String,

    /// Password for container registry
    #[arg(short, long, default_value = "anonymous")]
    password: String,

    /// Path to file with password for container registry
    #[arg(long)]
    password_file: Option<PathBuf>,

    /// Verbose mode
    #[arg(short, long)]
    verbose: bool,

    /// Generate output in JSON format
    #[arg(short, long)]
    json_output: bool,

    /// Number of concurrent requests to the registry
    #[arg(long, default_value_t = newest_tag::config::DEFAULT_WORKERS)]
    threads: usize,

    /// Number of retries for a failed registry request
    #[arg(long, default_value_t = newest_tag::config::DEFAULT_RETRIES)]
    retries: u32,

    /// Timeout of a single registry request in seconds
    #[arg(long, default_value_t = 10)]
    timeout: u64,

    /// Talk to the registry over plain HTTP
    #[arg(long)]
    insecure_registry: bool,

    /// Use redis as a cache
    #[arg(long)]
    cache: bool,

    /// Redis host address
    #[arg(short = 'r', long, default_value = "localhost")]
    redis_host: String,

    /// Redis port
    #[arg(long, default_value_t = 6379)]
    redis_port: u16,

    /// Redis password
    #[arg(long, default_value = "")]
    redis_password: String,

    /// Redis database
    #[arg(short = 'd', long, default_value_t = 0)]
    redis_db: i64,

    /// Redis key TTL in seconds (0 keeps keys forever)
    #[arg(long, default_value_t = 604800)]
    redis_key_ttl: u64,
}

impl Cli {
    fn config(&self) -> miette::Result<Config> {
        let password = match &self.password_file {
            Some(path) => util::read_password_file(path)?,
            None => self.password.clone(),
        };
        let cache = self.cache.then(|| CacheConfig {
            host: self.redis_host.clone(),
            port: self.redis_port,
            password: self.redis_password.clone(),
            db: self.redis_db,
            ttl: Duration::from_secs(self.redis_key_ttl),
            ..Default::default()
        });
        return Ok(Config {
            credentials: Credentials::new(&self.username, &password),
            workers: self.threads,
            http: HttpConfig {
                retries: self.retries,
                timeout: Duration::from_secs(self.timeout),
                retry_backoff: DEFAULT_RETRY_BACKOFF,
                insecure: self.insecure_registry,
            },
            cache,
        });
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(LevelFilter::Warn)
        .filter_module("newest_tag", level)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}",
                chrono::Local::now().format(LOG_DATE_FORMAT),
                record.level(),
                record.args()
            )
        })
        .init();
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.config()?;
    let output = newest_tag::newest_tag(&cli.image, &config).await?;
    println!("{}", output.render(cli.json_output)?);
    return Ok(());
}
