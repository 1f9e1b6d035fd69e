/// Writes response payloads back to the guest.
///
/// Payloads travel base64-encoded. An encoded payload that fits in one
/// chunk is staged with a single write; larger ones are appended chunk by
/// chunk. Either way the staged text is decoded into the result file and
/// only then is the readiness marker created.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::sync::Arc;

use super::channel::{ChannelResult, GuestChannel};
use super::layout::BridgeLayout;

pub const DEFAULT_CHUNK_SIZE: usize = 65536;

pub struct TransferEncoder {
    channel: Arc<dyn GuestChannel>,
    layout: BridgeLayout,
    chunk_size: usize,
}

impl TransferEncoder {
    pub fn new(channel: Arc<dyn GuestChannel>, layout: BridgeLayout, chunk_size: usize) -> Self {
        Self {
            channel,
            layout,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Deliver `payload` as the response for `id`
    pub async fn deliver(&self, id: &str, payload: &str) -> ChannelResult<()> {
        let encoded = BASE64.encode(payload.as_bytes());
        let staging = self.layout.staging_file(id);

        if encoded.len() <= self.chunk_size {
            self.channel.write_file(&staging, encoded.as_bytes()).await?;
        } else {
            // Truncate any leftover from an abandoned attempt before appending
            self.channel.write_file(&staging, b"").await?;
            for chunk in encoded.as_bytes().chunks(self.chunk_size) {
                self.channel.append_file(&staging, chunk).await?;
            }
            tracing::debug!(
                "Staged response {} in {} chunks",
                id,
                encoded.len().div_ceil(self.chunk_size)
            );
        }

        self.channel
            .decode_base64(&staging, &self.layout.response_file(id))
            .await?;
        if let Err(e) = self.channel.remove_file(&staging).await {
            tracing::warn!("Could not remove staging file for {}: {}", id, e);
        }

        // The marker is always last: its presence means the result is complete
        self.channel.touch(&self.layout.response_marker(id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::channel::FsChannel;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts appends while delegating to a real filesystem channel
    struct CountingChannel {
        inner: FsChannel,
        appends: AtomicUsize,
    }

    #[async_trait]
    impl GuestChannel for CountingChannel {
        async fn ensure_dir(&self, path: &str) -> ChannelResult<()> {
            self.inner.ensure_dir(path).await
        }
        async fn list_dir(&self, path: &str) -> ChannelResult<Vec<String>> {
            self.inner.list_dir(path).await
        }
        async fn read_file(&self, path: &str) -> ChannelResult<Vec<u8>> {
            self.inner.read_file(path).await
        }
        async fn write_file(&self, path: &str, data: &[u8]) -> ChannelResult<()> {
            self.inner.write_file(path, data).await
        }
        async fn append_file(&self, path: &str, data: &[u8]) -> ChannelResult<()> {
            self.appends.fetch_add(1, Ordering::SeqCst);
            self.inner.append_file(path, data).await
        }
        async fn decode_base64(&self, src: &str, dst: &str) -> ChannelResult<()> {
            self.inner.decode_base64(src, dst).await
        }
        async fn touch(&self, path: &str) -> ChannelResult<()> {
            self.inner.touch(path).await
        }
        async fn remove_file(&self, path: &str) -> ChannelResult<()> {
            self.inner.remove_file(path).await
        }
    }

    async fn setup(chunk_size: usize) -> (tempfile::TempDir, Arc<CountingChannel>, TransferEncoder) {
        let dir = tempfile::tempdir().unwrap();
        let channel = Arc::new(CountingChannel {
            inner: FsChannel::new(dir.path()),
            appends: AtomicUsize::new(0),
        });
        let layout = BridgeLayout::new("/tmp/bridge");
        channel.ensure_dir(&layout.responses_dir()).await.unwrap();
        let encoder = TransferEncoder::new(channel.clone(), layout, chunk_size);
        (dir, channel, encoder)
    }

    #[tokio::test]
    async fn test_single_shot_delivery() {
        let (dir, channel, encoder) = setup(DEFAULT_CHUNK_SIZE).await;
        encoder.deliver("small", "{\"ok\":true}").await.unwrap();

        let responses = dir.path().join("tmp/bridge/responses");
        assert_eq!(
            std::fs::read_to_string(responses.join("small.json")).unwrap(),
            "{\"ok\":true}"
        );
        assert!(responses.join("small.ready").exists());
        assert!(!dir.path().join("tmp/bridge/_resp_small.b64").exists());
        assert_eq!(channel.appends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_chunked_delivery_is_byte_identical() {
        // multi-byte characters make sure chunking happens on the encoded form
        let payload: String = "héllo wörld ✓ ".repeat(500);

        let (small_dir, small_channel, chunked) = setup(64).await;
        chunked.deliver("big", &payload).await.unwrap();
        assert!(small_channel.appends.load(Ordering::SeqCst) > 1);

        let (large_dir, _, single) = setup(DEFAULT_CHUNK_SIZE).await;
        single.deliver("big", &payload).await.unwrap();

        let a = std::fs::read(small_dir.path().join("tmp/bridge/responses/big.json")).unwrap();
        let b = std::fs::read(large_dir.path().join("tmp/bridge/responses/big.json")).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, payload.as_bytes());
    }
}
