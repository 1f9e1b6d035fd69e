/// Typed file operations against the guest filesystem
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("guest path rejected: {0}")]
    InvalidPath(String),

    #[error("{op} {path}: {source}")]
    Io {
        op: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("staged payload {0} is not valid base64")]
    Decode(String),
}

impl ChannelError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ChannelError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

pub type ChannelResult<T> = std::result::Result<T, ChannelError>;

/// The host's only view of the guest. All paths are absolute guest paths.
#[async_trait]
pub trait GuestChannel: Send + Sync {
    /// Create a directory and its parents; succeeds if it already exists
    async fn ensure_dir(&self, path: &str) -> ChannelResult<()>;

    /// File names (not paths) in a directory
    async fn list_dir(&self, path: &str) -> ChannelResult<Vec<String>>;

    async fn read_file(&self, path: &str) -> ChannelResult<Vec<u8>>;

    /// Create or truncate
    async fn write_file(&self, path: &str, data: &[u8]) -> ChannelResult<()>;

    async fn append_file(&self, path: &str, data: &[u8]) -> ChannelResult<()>;

    /// Decode base64 text staged at `src` into `dst`. The decoded file
    /// appears at `dst` whole or not at all.
    async fn decode_base64(&self, src: &str, dst: &str) -> ChannelResult<()>;

    /// Create an empty marker file
    async fn touch(&self, path: &str) -> ChannelResult<()>;

    /// Remove a file; removing a missing file is not an error
    async fn remove_file(&self, path: &str) -> ChannelResult<()>;
}

/// Channel over a host directory where the guest root filesystem is mounted
#[derive(Debug, Clone)]
pub struct FsChannel {
    root: PathBuf,
}

impl FsChannel {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map an absolute guest path onto the host, refusing anything that
    /// could escape the root
    pub fn resolve(&self, guest_path: &str) -> ChannelResult<PathBuf> {
        let rejected = || ChannelError::InvalidPath(guest_path.to_string());

        let relative = guest_path.strip_prefix('/').ok_or_else(rejected)?;
        let mut resolved = self.root.clone();
        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                _ => return Err(rejected()),
            }
        }
        Ok(resolved)
    }
}

fn io_err<'a>(op: &'static str, path: &'a Path) -> impl FnOnce(std::io::Error) -> ChannelError + 'a {
    move |source| ChannelError::Io {
        op,
        path: path.display().to_string(),
        source,
    }
}

#[async_trait]
impl GuestChannel for FsChannel {
    async fn ensure_dir(&self, path: &str) -> ChannelResult<()> {
        let host = self.resolve(path)?;
        fs::create_dir_all(&host).await.map_err(io_err("mkdir", &host))
    }

    async fn list_dir(&self, path: &str) -> ChannelResult<Vec<String>> {
        let host = self.resolve(path)?;
        let mut entries = fs::read_dir(&host).await.map_err(io_err("list", &host))?;

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err("list", &host))? {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    async fn read_file(&self, path: &str) -> ChannelResult<Vec<u8>> {
        let host = self.resolve(path)?;
        fs::read(&host).await.map_err(io_err("read", &host))
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> ChannelResult<()> {
        let host = self.resolve(path)?;
        fs::write(&host, data).await.map_err(io_err("write", &host))
    }

    async fn append_file(&self, path: &str, data: &[u8]) -> ChannelResult<()> {
        let host = self.resolve(path)?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&host)
            .await
            .map_err(io_err("append", &host))?;
        file.write_all(data).await.map_err(io_err("append", &host))?;
        file.flush().await.map_err(io_err("append", &host))
    }

    async fn decode_base64(&self, src: &str, dst: &str) -> ChannelResult<()> {
        let src_host = self.resolve(src)?;
        let dst_host = self.resolve(dst)?;

        let staged = fs::read(&src_host).await.map_err(io_err("read", &src_host))?;
        let encoded: Vec<u8> = staged.into_iter().filter(|b| !b.is_ascii_whitespace()).collect();
        let decoded = BASE64
            .decode(&encoded)
            .map_err(|_| ChannelError::Decode(src.to_string()))?;

        // Write beside the destination and rename so readers never see a
        // partially written file
        let mut partial = dst_host.clone().into_os_string();
        partial.push(".partial");
        let partial = PathBuf::from(partial);

        fs::write(&partial, &decoded).await.map_err(io_err("write", &partial))?;
        fs::rename(&partial, &dst_host).await.map_err(io_err("rename", &dst_host))
    }

    async fn touch(&self, path: &str) -> ChannelResult<()> {
        let host = self.resolve(path)?;
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&host)
            .await
            .map(|_| ())
            .map_err(io_err("touch", &host))
    }

    async fn remove_file(&self, path: &str) -> ChannelResult<()> {
        let host = self.resolve(path)?;
        match fs::remove_file(&host).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err("remove", &host)(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_stays_under_root() {
        let channel = FsChannel::new("/srv/guest");
        assert_eq!(
            channel.resolve("/tmp/bridge/requests/a.json").unwrap(),
            PathBuf::from("/srv/guest/tmp/bridge/requests/a.json")
        );
        assert!(channel.resolve("/tmp/../../etc/passwd").is_err());
        assert!(channel.resolve("relative/path").is_err());
    }

    #[tokio::test]
    async fn test_file_operations() {
        let dir = tempfile::tempdir().unwrap();
        let channel = FsChannel::new(dir.path());

        channel.ensure_dir("/tmp/bridge/responses").await.unwrap();
        channel.ensure_dir("/tmp/bridge/responses").await.unwrap();

        channel.write_file("/tmp/bridge/responses/a.b64", b"aGVs").await.unwrap();
        channel.append_file("/tmp/bridge/responses/a.b64", b"bG8=").await.unwrap();
        channel
            .decode_base64("/tmp/bridge/responses/a.b64", "/tmp/bridge/responses/a.json")
            .await
            .unwrap();
        assert_eq!(
            channel.read_file("/tmp/bridge/responses/a.json").await.unwrap(),
            b"hello"
        );

        channel.touch("/tmp/bridge/responses/a.ready").await.unwrap();
        let mut names = channel.list_dir("/tmp/bridge/responses").await.unwrap();
        names.sort();
        assert_eq!(names, vec!["a.b64", "a.json", "a.ready"]);

        channel.remove_file("/tmp/bridge/responses/a.b64").await.unwrap();
        // second removal is a no-op
        channel.remove_file("/tmp/bridge/responses/a.b64").await.unwrap();

        let missing = channel.read_file("/tmp/bridge/responses/nope").await.unwrap_err();
        assert!(missing.is_not_found());
    }

    #[tokio::test]
    async fn test_decode_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let channel = FsChannel::new(dir.path());
        channel.write_file("/staged.b64", b"!!not base64!!").await.unwrap();

        let err = channel.decode_base64("/staged.b64", "/out.json").await.unwrap_err();
        assert!(matches!(err, ChannelError::Decode(_)));
        assert!(!dir.path().join("out.json").exists());
    }
}
