//! Transport-agnostic upload streaming. Kept generic over `ByteSource` so
//! this crate does not depend on `axum`; the HTTP surface adapts a
//! `Multipart` field to this trait.

use std::path::Path;

use bytes::Bytes;
use tokio::io::AsyncWriteExt;

use crate::error::{IngestError, IngestResult};

/// One chunk at a time, `None` signaling end of stream. Mirrors the shape of
/// `axum::extract::multipart::Field::chunk()`.
pub trait ByteSource: Send {
    fn next_chunk(
        &mut self,
    ) -> impl std::future::Future<Output = std::io::Result<Option<Bytes>>> + Send;
}

/// Streams `source` to `dest_path`, counting bytes as it goes and aborting
/// (deleting the partial file) once `cap_bytes` is exceeded. Never buffers
/// the whole body in memory (spec §5 suspension points).
pub async fn stream_to_file(
    source: &mut impl ByteSource,
    dest_path: &Path,
    cap_bytes: u64,
) -> IngestResult<u64> {
    if let Some(parent) = dest_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut file = tokio::fs::File::create(dest_path).await?;
    let mut written: u64 = 0;

    loop {
        match source.next_chunk().await? {
            Some(chunk) => {
                written += chunk.len() as u64;
                if written > cap_bytes {
                    drop(file);
                    let _ = tokio::fs::remove_file(dest_path).await;
                    return Err(IngestError::TooLarge);
                }
                file.write_all(&chunk).await?;
            }
            None => break,
        }
    }

    file.flush().await?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct VecSource {
        chunks: Mutex<std::collections::VecDeque<Bytes>>,
    }

    impl VecSource {
        fn new(chunks: Vec<&'static [u8]>) -> Self {
            Self {
                chunks: Mutex::new(chunks.into_iter().map(Bytes::from_static).collect()),
            }
        }
    }

    impl ByteSource for VecSource {
        async fn next_chunk(&mut self) -> std::io::Result<Option<Bytes>> {
            Ok(self.chunks.lock().unwrap().pop_front())
        }
    }

    #[tokio::test]
    async fn writes_all_chunks_and_counts_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");
        let mut source = VecSource::new(vec![b"hello ", b"world"]);
        let written = stream_to_file(&mut source, &dest, 1_000).await.unwrap();
        assert_eq!(written, 11);
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn aborts_and_cleans_up_when_cap_exceeded() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.bin");
        let mut source = VecSource::new(vec![b"0123456789", b"0123456789"]);
        let err = stream_to_file(&mut source, &dest, 15).await.unwrap_err();
        assert!(matches!(err, IngestError::TooLarge));
        assert!(!dest.exists());
    }
}
