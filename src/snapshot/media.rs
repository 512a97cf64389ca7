//! Attachment download with `.part` temp files.
//!
//! Downloads stream to `<dest>.part` and rename into place only on success,
//! so a crash mid-download never leaves a truncated file at the final path.
//! Transient failures retry with backoff; the caller records anything that
//! still fails as a per-item failure instead of aborting the category.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::error::WriteError;
use crate::process::ExternalTool;
use crate::retry::{self, RetryAction, RetryConfig};

/// How attachment bytes reach disk. HTTP for direct media URLs; an external
/// tool for sources whose "attachment" is fetched by another program.
#[async_trait]
pub trait AttachmentFetcher: Send + Sync {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<(), WriteError>;
}

fn temp_part_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "download".to_string());
    name.push_str(".part");
    dest.with_file_name(name)
}

/// Streaming HTTP fetcher.
pub struct HttpFetcher {
    client: Client,
    retry_config: RetryConfig,
}

impl HttpFetcher {
    pub fn new(client: Client, retry_config: RetryConfig) -> Self {
        Self {
            client,
            retry_config,
        }
    }

    /// Client tuned for streamed downloads: bounded connect and per-read
    /// timeouts, but no total-request deadline. Large attachments take as
    /// long as they take; only a stalled connection times out.
    pub fn streaming_client(io_timeout: std::time::Duration) -> reqwest::Result<Client> {
        Client::builder()
            .connect_timeout(io_timeout)
            .read_timeout(io_timeout)
            .build()
    }

    /// Single download attempt. Always starts from an empty `.part` file so
    /// a retried attempt can't append onto a half-written body.
    async fn attempt(&self, url: &str, dest: &Path, part_path: &Path) -> Result<(), WriteError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| WriteError::Http {
                url: url.to_string(),
                source: e,
            })?;

        if !response.status().is_success() {
            return Err(WriteError::HttpStatus {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(part_path)
            .await?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| WriteError::Http {
                url: url.to_string(),
                source: e,
            })?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        drop(file);

        fs::rename(part_path, dest).await?;
        Ok(())
    }
}

#[async_trait]
impl AttachmentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<(), WriteError> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        let part_path = temp_part_path(dest);

        let result = retry::retry_with_backoff(
            &self.retry_config,
            |e: &WriteError| {
                if e.is_retryable() {
                    RetryAction::Retry
                } else {
                    RetryAction::Abort
                }
            },
            || async {
                let _ = fs::remove_file(&part_path).await;
                self.attempt(url, dest, &part_path).await
            },
        )
        .await;

        result.map_err(|e| match e {
            e if !e.is_retryable() => e,
            e => WriteError::RetriesExhausted {
                retries: self.retry_config.max_retries,
                url: url.to_string(),
                last_error: e.to_string(),
            },
        })
    }
}

/// Fetcher that delegates to an external program, invoked as
/// `<program> <fixed args..> <url> <dest>`. Used for repository mirroring
/// (`git clone --mirror <url> <dest>`).
pub struct ToolFetcher {
    tool: ExternalTool,
    fixed_args: Vec<String>,
}

impl ToolFetcher {
    pub fn new(tool: ExternalTool, fixed_args: Vec<String>) -> Self {
        Self { tool, fixed_args }
    }
}

#[async_trait]
impl AttachmentFetcher for ToolFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<(), WriteError> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }
        let dest_str = dest.to_string_lossy();
        let mut args: Vec<&str> = self.fixed_args.iter().map(String::as_str).collect();
        args.push(url);
        args.push(&dest_str);
        self.tool.run(&args, None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("snapvault_media_tests").join(name);
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_temp_part_path_appends_suffix() {
        assert_eq!(
            temp_part_path(Path::new("/backups/media/t3_abc_0.jpg")),
            PathBuf::from("/backups/media/t3_abc_0.jpg.part")
        );
    }

    #[tokio::test]
    async fn test_slow_transfer_outlives_io_timeout() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = stream.read(&mut buf).await;
            stream
                .write_all(
                    b"HTTP/1.1 200 OK\r\nContent-Length: 10\r\nConnection: close\r\n\r\n",
                )
                .await
                .unwrap();
            // Trickle the body: each gap is under the per-read timeout,
            // but the whole transfer takes well over it.
            for _ in 0..10 {
                stream.write_all(b"x").await.unwrap();
                stream.flush().await.unwrap();
                tokio::time::sleep(Duration::from_millis(120)).await;
            }
        });

        let client = HttpFetcher::streaming_client(Duration::from_millis(500)).unwrap();
        let fetcher = HttpFetcher::new(
            client,
            RetryConfig {
                max_retries: 0,
                base_delay_secs: 0,
                max_delay_secs: 0,
            },
        );
        let dir = test_dir("slow_stream");
        let dest = dir.join("big.bin");
        fetcher
            .fetch(&format!("http://{addr}/big.bin"), &dest)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&dest).unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_tool_fetcher_runs_program() {
        let dir = test_dir("tool_fetch");
        let src = dir.join("source.bin");
        std::fs::write(&src, b"payload").unwrap();

        let fetcher = ToolFetcher::new(
            ExternalTool::new("cp", Duration::from_secs(10)),
            Vec::new(),
        );
        let dest = dir.join("nested").join("copy.bin");
        fetcher
            .fetch(&src.to_string_lossy(), &dest)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"payload");
    }

    #[tokio::test]
    async fn test_tool_fetcher_surfaces_failure() {
        let dir = test_dir("tool_fail");
        let fetcher = ToolFetcher::new(
            ExternalTool::new("cp", Duration::from_secs(10)),
            Vec::new(),
        );
        let err = fetcher
            .fetch("/no/such/source", &dir.join("out.bin"))
            .await
            .unwrap_err();
        assert!(matches!(err, WriteError::Tool(_)));
        assert!(!err.is_retryable());
    }
}
