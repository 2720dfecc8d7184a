use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, PartialEq, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Output {
    pub tag: String,
    pub image: String,
    pub image_with_tag: String,
}

impl Output {
    pub fn new(image: &str, tag: &str) -> Output {
        return Output {
            tag: tag.to_string(),
            image: image.to_string(),
            image_with_tag: format!("{}:{}", image, tag),
        };
    }

    /// Single line for stdout: JSON, or just `image:tag`.
    pub fn render(&self, json: bool) -> Result<String> {
        if json {
            return serde_json::to_string(self).map_err(Error::Render);
        }
        return Ok(self.image_with_tag.clone());
    }
}
