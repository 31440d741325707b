//! Playlist entries.
//!
//! Descriptors are reference data: sessions only keep the id and display name
//! of the videos a participant actually reached (see `VideoVisit`).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum VideoKind {
    VideoStream,
    File,
}

impl Default for VideoKind {
    fn default() -> Self {
        VideoKind::VideoStream
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoDescriptor {
    pub id: String,
    #[serde(alias = "title", default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: VideoKind,
    #[serde(alias = "source")]
    pub link: String,
}
