//! The [`RolloverAction`] trait turns a buffer snapshot into a durable
//! artifact.
//!
//! The engine calls it with the buffer lock released. A failed action leaves
//! the buffer untouched so the same bytes are offered again on the next
//! check.

use async_trait::async_trait;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use vidcat_core::{Error, Result};

use crate::buffer::SegmentData;
use crate::context::{SegmentArtifact, StreamContext};
use crate::filename::FilenameGenerator;

/// Persists one segment.
#[async_trait]
pub trait RolloverAction: Send + Sync {
    /// A short, human-readable name for logs.
    fn name(&self) -> &'static str;

    /// Write the segment and return where it went.
    async fn finalize(&self, segment: &SegmentData, ctx: &StreamContext)
        -> Result<SegmentArtifact>;

    /// Remove an artifact whose segment never made it into the catalog.
    async fn discard(&self, _artifact: &SegmentArtifact) -> Result<()> {
        Ok(())
    }
}

/// Writes each segment as a file in one directory.
///
/// Bytes go to a temporary file in the target directory first, are synced,
/// and the file is then renamed to its generated name. An existing file is
/// never overwritten: a taken name gets a `-N` suffix before its extension.
pub struct FileRolloverAction {
    dir: PathBuf,
    template: String,
    generator: Arc<dyn FilenameGenerator>,
}

impl FileRolloverAction {
    pub fn new(
        dir: impl Into<PathBuf>,
        template: impl Into<String>,
        generator: Arc<dyn FilenameGenerator>,
    ) -> Self {
        Self {
            dir: dir.into(),
            template: template.into(),
            generator,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl std::fmt::Debug for FileRolloverAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileRolloverAction")
            .field("dir", &self.dir)
            .field("template", &self.template)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RolloverAction for FileRolloverAction {
    fn name(&self) -> &'static str {
        "Write Segment File"
    }

    async fn finalize(
        &self,
        segment: &SegmentData,
        ctx: &StreamContext,
    ) -> Result<SegmentArtifact> {
        let name = self.generator.generate(&self.template, ctx);
        let dir = self.dir.clone();
        let bytes = segment.bytes.clone();

        tokio::task::spawn_blocking(move || write_segment(&dir, &name, &bytes))
            .await
            .map_err(|e| Error::rollover("finalize", format!("writer task failed: {e}")))?
    }

    async fn discard(&self, artifact: &SegmentArtifact) -> Result<()> {
        tokio::fs::remove_file(&artifact.path).await?;
        tracing::debug!(path = %artifact.path.display(), "Segment discarded");
        Ok(())
    }
}

/// Suffixed names tried for one segment before giving up.
const MAX_NAME_ATTEMPTS: u32 = 10_000;

fn write_segment(dir: &Path, name: &str, bytes: &[u8]) -> Result<SegmentArtifact> {
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;

    let mut path = dir.join(name);
    let mut attempt = 0;
    loop {
        match tmp.persist_noclobber(&path) {
            Ok(_) => break,
            Err(e)
                if e.error.kind() == io::ErrorKind::AlreadyExists
                    && attempt < MAX_NAME_ATTEMPTS =>
            {
                attempt += 1;
                tmp = e.file;
                path = dir.join(suffixed(name, attempt));
            }
            Err(e) => return Err(Error::from(e.error)),
        }
    }
    if attempt > 0 {
        tracing::debug!(name, path = %path.display(), "Segment name taken; used a suffix");
    }

    tracing::debug!(path = %path.display(), bytes = bytes.len(), "Segment written");
    Ok(SegmentArtifact {
        path,
        size: bytes.len() as u64,
    })
}

/// `seg.ts` → `seg-2.ts`; a name without extension just gains `-2`.
fn suffixed(name: &str, n: u32) -> String {
    let name = Path::new(name);
    let stem = name.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    match name.extension() {
        Some(ext) => format!("{stem}-{n}.{}", ext.to_string_lossy()),
        None => format!("{stem}-{n}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::PacketBuffer;
    use crate::context::StreamInfo;
    use crate::filename::TemplateFilenameGenerator;

    fn ctx() -> StreamContext {
        StreamContext {
            stream: StreamInfo::new("udp://127.0.0.1:50000", "test"),
            parent_id: None,
            period: 0,
            period_start: chrono::Utc::now(),
            segment: None,
        }
    }

    fn segment(bytes: &[u8]) -> SegmentData {
        let buffer = PacketBuffer::new();
        buffer.write(bytes);
        buffer.snapshot()
    }

    #[tokio::test]
    async fn writes_segment_file() {
        let dir = tempfile::tempdir().unwrap();
        let action = FileRolloverAction::new(
            dir.path().join("segments"),
            "seg-%{count}",
            Arc::new(TemplateFilenameGenerator::new()),
        );

        let artifact = action.finalize(&segment(b"\x47payload"), &ctx()).await.unwrap();

        assert_eq!(artifact.path, dir.path().join("segments").join("seg-1.ts"));
        assert_eq!(artifact.size, 8);
        assert_eq!(std::fs::read(&artifact.path).unwrap(), b"\x47payload");
    }

    #[tokio::test]
    async fn existing_file_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("fixed.ts"), b"old").unwrap();
        let action = FileRolloverAction::new(
            dir.path(),
            "fixed",
            Arc::new(TemplateFilenameGenerator::new()),
        );

        let artifact = action.finalize(&segment(b"new"), &ctx()).await.unwrap();

        assert_eq!(artifact.path, dir.path().join("fixed-1.ts"));
        assert_eq!(std::fs::read(dir.path().join("fixed.ts")).unwrap(), b"old");
        assert_eq!(std::fs::read(&artifact.path).unwrap(), b"new");
    }

    #[tokio::test]
    async fn fixed_template_keeps_writing_segments() {
        let dir = tempfile::tempdir().unwrap();
        let action = FileRolloverAction::new(
            dir.path(),
            "fixed",
            Arc::new(TemplateFilenameGenerator::new()),
        );

        let mut paths = Vec::new();
        for payload in [b"one", b"two", b"six"] {
            let artifact = action.finalize(&segment(payload), &ctx()).await.unwrap();
            paths.push(artifact.path);
        }

        assert_eq!(
            paths,
            vec![
                dir.path().join("fixed.ts"),
                dir.path().join("fixed-1.ts"),
                dir.path().join("fixed-2.ts"),
            ]
        );
        assert_eq!(std::fs::read(&paths[2]).unwrap(), b"six");
    }

    #[test]
    fn suffix_goes_before_extension() {
        assert_eq!(suffixed("seg.ts", 2), "seg-2.ts");
        assert_eq!(suffixed("seg", 3), "seg-3");
    }

    #[tokio::test]
    async fn discard_removes_segment_file() {
        let dir = tempfile::tempdir().unwrap();
        let action = FileRolloverAction::new(
            dir.path(),
            "seg-%{count}",
            Arc::new(TemplateFilenameGenerator::new()),
        );
        let artifact = action.finalize(&segment(b"orphan"), &ctx()).await.unwrap();

        action.discard(&artifact).await.unwrap();

        assert!(!artifact.path.exists());
        assert!(matches!(
            action.discard(&artifact).await.unwrap_err(),
            Error::Io { .. }
        ));
    }
}
