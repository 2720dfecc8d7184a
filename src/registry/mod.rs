pub mod http;
pub mod reference;

pub use http::HttpFetcher;
pub use reference::{ImageReference, DOCKER_HUB_REGISTRY};

use crate::config::{Credentials, HttpConfig};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use log::debug;
use serde::Deserialize;

/// Body of `GET /v2/<name>/tags/list`.
#[derive(Deserialize, PartialEq, Clone, Debug)]
pub struct TagList {
    pub name: String,
    // some registries answer `"tags": null` for repositories without tags
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<String>,
}

/// Image Manifest Version 2, Schema 1.
/// https://docs.docker.com/registry/spec/manifest-v2-1/
#[derive(Deserialize, PartialEq, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TagManifest {
    #[serde(default)]
    pub name: String,
    pub schema_version: i64,
    #[serde(default)]
    pub history: Vec<HistoryItem>,
}

#[derive(Deserialize, PartialEq, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct HistoryItem {
    /// JSON document embedded as a string.
    pub v1_compatibility: String,
}

#[derive(Deserialize, Debug)]
struct ManifestHistoryEntry {
    created: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let tags: Option<Vec<String>> = Option::deserialize(deserializer)?;
    return Ok(tags.unwrap_or_default());
}

pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    return DateTime::parse_from_rfc3339(value)
        .map(|date| date.with_timezone(&Utc))
        .map_err(|source| Error::TimestampParse {
            value: value.to_string(),
            source,
        });
}

/// Latest `created` date found in the manifest history.
pub fn newest_timestamp(tag: &str, manifest: &TagManifest) -> Result<DateTime<Utc>> {
    let mut newest: Option<DateTime<Utc>> = None;
    for item in &manifest.history {
        let entry: ManifestHistoryEntry =
            serde_json::from_str(&item.v1_compatibility).map_err(|source| Error::Unmarshal {
                what: format!("history entry of tag {}", tag),
                source,
            })?;
        let created = parse_timestamp(&entry.created)?;
        if newest.map_or(true, |n| created > n) {
            newest = Some(created);
        }
    }
    return newest.ok_or_else(|| Error::EmptyHistory {
        tag: tag.to_string(),
    });
}

/// Read-only client for the registry v2 API.
pub struct RegistryClient {
    fetcher: HttpFetcher,
}

impl RegistryClient {
    pub fn new(config: HttpConfig, credentials: Option<Credentials>) -> RegistryClient {
        return RegistryClient {
            fetcher: HttpFetcher::new(config, credentials),
        };
    }

    fn url(&self, reference: &ImageReference, rest: &str) -> String {
        let scheme = if self.fetcher.config().insecure {
            "http"
        } else {
            "https"
        };
        return format!("{}://{}/v2/{}/{}", scheme, reference.host, reference.path, rest);
    }

    pub async fn list_tags(&self, reference: &ImageReference) -> Result<TagList> {
        debug!(
            "Getting container registry tags list for {}/{}",
            reference.host, reference.path
        );
        let body = self.fetcher.get(&self.url(reference, "tags/list")).await?;
        return serde_json::from_str(&body).map_err(|source| Error::Unmarshal {
            what: format!("tag list of {}", reference.path),
            source,
        });
    }

    pub async fn fetch_manifest(&self, reference: &ImageReference, tag: &str) -> Result<TagManifest> {
        debug!("Getting container registry manifest for tag {}", tag);
        let url = self.url(reference, &format!("manifests/{}", tag));
        let body = self.fetcher.get(&url).await?;
        return serde_json::from_str(&body).map_err(|source| Error::Unmarshal {
            what: format!("manifest of tag {}", tag),
            source,
        });
    }

    /// Creation date of a tag, taken from its schema 1 manifest.
    pub async fn tag_date(&self, reference: &ImageReference, tag: &str) -> Result<DateTime<Utc>> {
        let manifest = self.fetch_manifest(reference, tag).await?;
        if manifest.schema_version != 1 {
            return Err(Error::UnsupportedManifestVersion {
                tag: tag.to_string(),
                version: manifest.schema_version,
            });
        }
        return newest_timestamp(tag, &manifest);
    }
}


#[cfg(test)]
mod tests {
    use super::test_util::manifest_body;
    use super::*;
    use std::time::Duration;

    fn client() -> RegistryClient {
        return RegistryClient::new(
            HttpConfig {
                retries: 0,
                timeout: Duration::from_secs(2),
                retry_backoff: Duration::from_millis(10),
                insecure: true,
            },
            None,
        );
    }

    fn reference(path: &str) -> ImageReference {
        return ImageReference {
            host: mockito::server_address().to_string(),
            path: path.to_string(),
        };
    }

    fn manifest(dates: &[&str]) -> TagManifest {
        return serde_json::from_str(&manifest_body(dates)).unwrap();
    }

    #[test]
    fn it_takes_the_newest_history_date() {
        let dates = [
            "2021-01-01T00:00:00Z",
            "2021-06-01T12:30:00.123456789Z",
            "2020-12-01T00:00:00Z",
        ];
        let expected = parse_timestamp("2021-06-01T12:30:00.123456789Z").unwrap();
        assert_eq!(newest_timestamp("t", &manifest(&dates)).unwrap(), expected);

        let mut reordered = dates;
        reordered.reverse();
        assert_eq!(newest_timestamp("t", &manifest(&reordered)).unwrap(), expected);
        reordered.rotate_left(1);
        assert_eq!(newest_timestamp("t", &manifest(&reordered)).unwrap(), expected);
    }

    #[test]
    fn it_compares_dates_across_offsets() {
        let dates = ["2021-01-01T10:00:00+02:00", "2021-01-01T09:00:00Z"];
        assert_eq!(
            newest_timestamp("t", &manifest(&dates)).unwrap(),
            parse_timestamp("2021-01-01T09:00:00Z").unwrap()
        );
    }

    #[test]
    fn it_rejects_empty_history() {
        assert!(matches!(
            newest_timestamp("t", &manifest(&[])),
            Err(Error::EmptyHistory { .. })
        ));
    }

    #[test]
    fn it_rejects_malformed_history() {
        let mut bad = manifest(&["2021-01-01T00:00:00Z"]);
        bad.history.push(HistoryItem {
            v1_compatibility: "not json".to_string(),
        });
        assert!(matches!(
            newest_timestamp("t", &bad),
            Err(Error::Unmarshal { .. })
        ));

        assert!(matches!(
            newest_timestamp("t", &manifest(&["yesterday"])),
            Err(Error::TimestampParse { .. })
        ));
    }

    #[test]
    fn it_decodes_null_tag_lists() {
        let list: TagList = serde_json::from_str(r#"{"name": "foo", "tags": null}"#).unwrap();
        assert!(list.tags.is_empty());
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn it_lists_tags() {
        let _mock = mockito::mock("GET", "/v2/acme/listing/tags/list")
            .with_status(200)
            .with_body(r#"{"name": "acme/listing", "tags": ["1.0", "latest"]}"#)
            .create();

        let list = client().list_tags(&reference("acme/listing")).await.unwrap();
        assert_eq!(
            list,
            TagList {
                name: "acme/listing".to_string(),
                tags: vec!["1.0".to_string(), "latest".to_string()],
            }
        );
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn it_reports_undecodable_tag_lists() {
        let _mock = mockito::mock("GET", "/v2/acme/garbage/tags/list")
            .with_status(200)
            .with_body("<html>")
            .create();

        let result = client().list_tags(&reference("acme/garbage")).await;
        assert!(matches!(result, Err(Error::Unmarshal { .. })));
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn it_dates_tags() {
        let _mock = mockito::mock("GET", "/v2/acme/dated/manifests/1.0")
            .with_status(200)
            .with_body(manifest_body(&["2021-01-01T00:00:00Z", "2021-03-04T05:06:07Z"]))
            .create();

        let date = client().tag_date(&reference("acme/dated"), "1.0").await.unwrap();
        assert_eq!(date, parse_timestamp("2021-03-04T05:06:07Z").unwrap());
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn it_rejects_schema_2_manifests() {
        let _mock = mockito::mock("GET", "/v2/acme/modern/manifests/latest")
            .with_status(200)
            .with_body(
                r#"{
                    "schemaVersion": 2,
                    "mediaType": "application/vnd.docker.distribution.manifest.v2+json",
                    "config": {"digest": "sha256:abc"},
                    "layers": []
                }"#,
            )
            .create();

        match client().tag_date(&reference("acme/modern"), "latest").await {
            Err(Error::UnsupportedManifestVersion { tag, version }) => {
                assert_eq!(tag, "latest");
                assert_eq!(version, 2);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
