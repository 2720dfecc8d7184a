pub mod cache;
pub mod config;
pub mod error;
pub mod output;
pub mod registry;
pub mod resolver;
pub mod select;
pub mod util;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::output::Output;
use crate::registry::ImageReference;
use crate::resolver::Resolver;
use log::debug;

/// Lists the tags of `image` and returns the one created last.
pub async fn find_newest_tag(resolver: &Resolver, image: &str) -> Result<Output> {
    let reference = ImageReference::parse(image)?;
    let tag_list = resolver.registry().list_tags(&reference).await?;
    debug!("Found {} tags for {}", tag_list.tags.len(), image);

    let resolved = resolver.resolve(&reference, image, &tag_list.tags).await?;
    let newest = select::newest(&resolved).ok_or_else(|| Error::EmptyTagList {
        image: image.to_string(),
    })?;
    return Ok(Output::new(image, &newest.tag));
}

pub async fn newest_tag(image: &str, config: &Config) -> Result<Output> {
    let resolver = Resolver::from_config(config);
    return find_newest_tag(&resolver, image).await;
}
