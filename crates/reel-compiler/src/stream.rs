//! Streamed compile output.
//!
//! `OutputStream` reads the encoded MP4 straight from the request's scratch
//! directory and removes that directory (plus any attached guards) as soon
//! as the stream hits EOF, fails, or is dropped.

use std::any::Any;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::fs::File;
use tokio::io::{AsyncRead, ReadBuf};
use tracing::debug;

use crate::scratch::ScratchDir;

pub struct OutputStream {
    file: Option<File>,
    scratch: Option<ScratchDir>,
    guards: Vec<Box<dyn Any + Send + Sync>>,
    scratch_path: PathBuf,
    len: u64,
    request_id: String,
}

impl OutputStream {
    pub fn new(file: File, scratch: ScratchDir, len: u64, request_id: impl Into<String>) -> Self {
        Self {
            file: Some(file),
            scratch_path: scratch.path().to_path_buf(),
            scratch: Some(scratch),
            guards: Vec::new(),
            len,
            request_id: request_id.into(),
        }
    }

    /// Keep `guard` alive until the stream is released.
    ///
    /// Used for resources the output depends on, such as the upload
    /// directory holding the media inputs.
    pub fn hold<G: Any + Send + Sync>(&mut self, guard: G) {
        self.guards.push(Box::new(guard));
    }

    /// Size of the encoded output in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Location of the scratch directory; gone once the stream is released.
    pub fn scratch_path(&self) -> &std::path::Path {
        &self.scratch_path
    }

    /// Whether the output and scratch directory have been released.
    pub fn is_released(&self) -> bool {
        self.file.is_none() && self.scratch.is_none()
    }

    fn release(&mut self, reason: &str) {
        if self.is_released() {
            return;
        }
        self.file = None;
        if let Some(scratch) = self.scratch.take() {
            scratch.close();
        }
        self.guards.clear();
        debug!(request_id = %self.request_id, "Output released ({})", reason);
    }
}

impl std::fmt::Debug for OutputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputStream")
            .field("request_id", &self.request_id)
            .field("len", &self.len)
            .field("scratch_path", &self.scratch_path)
            .field("guards", &self.guards.len())
            .field("released", &self.is_released())
            .finish()
    }
}

impl AsyncRead for OutputStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let Some(file) = this.file.as_mut() else {
            return Poll::Ready(Ok(()));
        };

        let had_room = buf.remaining() > 0;
        let before = buf.filled().len();
        match Pin::new(file).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                if had_room && buf.filled().len() == before {
                    this.release("eof");
                }
                Poll::Ready(Ok(()))
            }
            Poll::Ready(Err(e)) => {
                this.release("read error");
                Poll::Ready(Err(e))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for OutputStream {
    fn drop(&mut self) {
        self.release("dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    async fn stream_with(contents: &[u8]) -> (OutputStream, tempfile::TempDir) {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::create(Some(root.path()), "stream").unwrap();
        let output = scratch.path().join("output.mp4");
        std::fs::write(&output, contents).unwrap();
        let file = File::open(&output).await.unwrap();
        (
            OutputStream::new(file, scratch, contents.len() as u64, "stream"),
            root,
        )
    }

    #[tokio::test]
    async fn test_eof_removes_scratch() {
        let (mut stream, _root) = stream_with(b"mp4 bytes").await;
        let dir = stream.scratch_path().to_path_buf();
        assert!(dir.exists());

        let mut body = Vec::new();
        stream.read_to_end(&mut body).await.unwrap();

        assert_eq!(body, b"mp4 bytes");
        assert!(stream.is_released());
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_drop_removes_scratch_and_guards() {
        let (mut stream, _root) = stream_with(b"partial").await;
        let dir = stream.scratch_path().to_path_buf();
        let upload = tempfile::tempdir().unwrap();
        let upload_path = upload.path().to_path_buf();
        stream.hold(upload);

        let mut first = [0u8; 2];
        stream.read_exact(&mut first).await.unwrap();
        drop(stream);

        assert!(!dir.exists());
        assert!(!upload_path.exists());
    }

    #[tokio::test]
    async fn test_reads_after_release_are_empty() {
        let (mut stream, _root) = stream_with(b"x").await;
        let mut body = Vec::new();
        stream.read_to_end(&mut body).await.unwrap();

        let mut more = [0u8; 4];
        assert_eq!(stream.read(&mut more).await.unwrap(), 0);
        assert_eq!(stream.len(), 1);
    }
}
