//! Stream identity and the context handed to actions and plugins.

use chrono::{DateTime, Utc};
use std::path::PathBuf;

use vidcat_core::RecordId;

/// Identity of a monitored stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub uri: String,
    pub title: String,
}

impl StreamInfo {
    pub fn new(uri: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            title: title.into(),
        }
    }
}

/// A finished segment file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentArtifact {
    pub path: PathBuf,
    pub size: u64,
}

impl SegmentArtifact {
    /// `file://` URI for the segment.
    pub fn uri(&self) -> String {
        format!("file://{}", self.path.display())
    }

    /// File name without its extension, used as the record title.
    pub fn title(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// What actions and plugins learn about the stream at a lifecycle point.
#[derive(Debug, Clone)]
pub struct StreamContext {
    pub stream: StreamInfo,
    /// The parent record, once one exists.
    pub parent_id: Option<RecordId>,
    /// Period the context refers to (the finished one for end hooks, the new
    /// one for creation hooks).
    pub period: u64,
    pub period_start: DateTime<Utc>,
    /// The finished segment, for end hooks only.
    pub segment: Option<SegmentArtifact>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_title_and_uri() {
        let artifact = SegmentArtifact {
            path: PathBuf::from("/data/segments/harbor-0001.ts"),
            size: 188,
        };
        assert_eq!(artifact.title(), "harbor-0001");
        assert_eq!(artifact.uri(), "file:///data/segments/harbor-0001.ts");
    }
}
