use crate::error::{Error, Result};

pub const DOCKER_HUB_REGISTRY: &str = "registry-1.docker.io";

/// Where an image lives: the registry host and the repository path on it.
#[derive(PartialEq, Clone, Debug)]
pub struct ImageReference {
    pub host: String,
    pub path: String,
}

impl ImageReference {
    /// Splits an image name such as `postgres`, `grafana/grafana` or
    /// `ghcr.io/user/app` into registry host and repository path.
    ///
    /// Official images (no slash) live under `library/` on Docker Hub. A first
    /// segment containing a dot is taken to be a registry domain, anything
    /// else is a Docker Hub namespace.
    pub fn parse(raw: &str) -> Result<ImageReference> {
        if raw.trim().is_empty() {
            return Err(Error::ReferenceParse {
                reference: raw.to_string(),
            });
        }

        let segments: Vec<&str> = raw.split('/').collect();
        if segments.len() == 1 {
            return Ok(ImageReference {
                host: DOCKER_HUB_REGISTRY.to_string(),
                path: format!("library/{}", raw),
            });
        }

        if segments[0].contains('.') {
            return Ok(ImageReference {
                host: segments[0].to_string(),
                path: segments[1..].join("/"),
            });
        }

        return Ok(ImageReference {
            host: DOCKER_HUB_REGISTRY.to_string(),
            path: raw.to_string(),
        });
    }
}
