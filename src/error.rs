use miette::Diagnostic;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    #[error("could not parse image reference {reference:?}")]
    #[diagnostic(
        code(newest_tag::reference),
        help("pass an image such as `redis`, `grafana/grafana` or `registry.example.com/team/app`")
    )]
    ReferenceParse { reference: String },

    #[error("request to {url} failed")]
    #[diagnostic(code(newest_tag::network))]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url}: HTTP response timeout")]
    #[diagnostic(code(newest_tag::timeout))]
    Timeout { url: String },

    #[error("{url}: HTTP response code: {status}")]
    #[diagnostic(code(newest_tag::http_status))]
    HttpStatus { url: String, status: u16 },

    #[error("could not decode {what}")]
    #[diagnostic(code(newest_tag::unmarshal))]
    Unmarshal {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("manifest for tag {tag} has schema version {version}, only version 1 is supported")]
    #[diagnostic(
        code(newest_tag::manifest_version),
        url("https://docs.docker.com/registry/spec/manifest-v2-1/")
    )]
    UnsupportedManifestVersion { tag: String, version: i64 },

    #[error("manifest for tag {tag} has no history entries")]
    #[diagnostic(code(newest_tag::empty_history))]
    EmptyHistory { tag: String },

    #[error("invalid timestamp {value:?}")]
    #[diagnostic(code(newest_tag::timestamp))]
    TimestampParse {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("image {image} has no tags")]
    #[diagnostic(code(newest_tag::empty_tag_list))]
    EmptyTagList { image: String },

    #[error("cache backend error: {0}")]
    #[diagnostic(code(newest_tag::cache))]
    CacheBackend(String),

    #[error("worker pool stopped before every tag was resolved")]
    #[diagnostic(code(newest_tag::worker_pool))]
    WorkerPool,

    #[error("could not read password file {path}")]
    #[diagnostic(code(newest_tag::password_file))]
    PasswordFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not render output")]
    #[diagnostic(code(newest_tag::render))]
    Render(#[source] serde_json::Error),
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        return Error::CacheBackend(err.to_string());
    }
}
