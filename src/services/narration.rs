use crate::core::state::{FlowchartState, NarrationTimestamp};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use url::Url;

#[cfg(target_arch = "wasm32")]
pub trait SourceBounds {}
#[cfg(target_arch = "wasm32")]
impl<T> SourceBounds for T {}

#[cfg(not(target_arch = "wasm32"))]
pub trait SourceBounds: Send + Sync {}
#[cfg(not(target_arch = "wasm32"))]
impl<T: Send + Sync> SourceBounds for T {}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait TimestampSource: SourceBounds {
    async fn fetch_text(&self, url: &str) -> Result<String>;
}

#[derive(Debug, Default, Clone)]
pub struct HttpTimestampSource {
    client: Client,
}

impl HttpTimestampSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl TimestampSource for HttpTimestampSource {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        debug!("Fetching narration timestamps from {}", url);
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send timestamps request")?;

        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("Timestamps request failed with status {}", status.as_u16()));
        }

        resp.text().await.context("Failed to read timestamps body")
    }
}

pub fn timestamps_url(base_url: &str, path: &str) -> Result<String> {
    let base = Url::parse(base_url).with_context(|| format!("Invalid base url: {}", base_url))?;
    let joined = base
        .join(path)
        .with_context(|| format!("Invalid timestamps path: {}", path))?;
    Ok(joined.to_string())
}

/// Parses an Audacity label export: `offset\t[...\t]node-id` per line.
///
/// The final line is always dropped since the export ends with a newline.
/// Rows are neither validated nor sorted; an unparsable offset becomes `NaN`.
pub fn convert_timestamps(text: &str) -> Vec<NarrationTimestamp> {
    let mut lines: Vec<&str> = text.split('\n').collect();
    lines.pop();

    lines
        .into_iter()
        .map(|line| {
            let mut fields = line.split('\t');
            let offset = fields.next().map(parse_offset).unwrap_or(f64::NAN);
            let node_id = line.rsplit('\t').next().unwrap_or(line);
            NarrationTimestamp::new(offset, node_id)
        })
        .collect()
}

fn parse_offset(field: &str) -> f64 {
    let field = field.trim();
    if field.is_empty() {
        return 0.0;
    }
    field.parse().unwrap_or(f64::NAN)
}

pub async fn load_timestamps(source: &dyn TimestampSource, url: &str) -> Result<Vec<NarrationTimestamp>> {
    let text = source.fetch_text(url).await?;
    Ok(convert_timestamps(&text))
}

/// Loads the cue list into `state`; on failure narration is disabled with a single fallback cue.
pub async fn fetch_timestamps(state: &mut FlowchartState, source: &dyn TimestampSource, url: &str) {
    let result = load_timestamps(source, url).await;
    state.apply_timestamps(result);
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const LABELS: &str = include_str!("../../testassets/timestamps.txt");

    struct MockSource {
        response: Result<String, String>,
        requested: Arc<Mutex<Vec<String>>>,
    }

    impl MockSource {
        fn ok(text: &str) -> Self {
            Self {
                response: Ok(text.to_string()),
                requested: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                response: Err(message.to_string()),
                requested: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl TimestampSource for MockSource {
        async fn fetch_text(&self, url: &str) -> Result<String> {
            self.requested.lock().unwrap().push(url.to_string());
            self.response.clone().map_err(|e| anyhow!(e))
        }
    }

    async fn serve_once(response: &'static str) -> Result<String> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        Ok(format!("http://{}/timestamps.txt", addr))
    }

    #[test]
    fn test_convert_timestamps() {
        let parsed = convert_timestamps("0\tn-001\n5.5\tfoo\tn-002\n");
        assert_eq!(
            parsed,
            vec![
                NarrationTimestamp::new(0.0, "n-001"),
                NarrationTimestamp::new(5.5, "n-002"),
            ]
        );
    }

    #[test]
    fn test_convert_label_export() {
        let parsed = convert_timestamps(LABELS);
        assert_eq!(parsed.len(), 4);
        assert_eq!(parsed[0], NarrationTimestamp::new(0.0, "n-001"));
        assert_eq!(parsed[3], NarrationTimestamp::new(31.25, "n-003"));
    }

    #[test]
    fn test_convert_drops_last_line_unconditionally() {
        assert!(convert_timestamps("").is_empty());
        assert_eq!(convert_timestamps("1\tn-001\n2\tn-002"), vec![NarrationTimestamp::new(1.0, "n-001")]);
    }

    #[test]
    fn test_convert_does_not_sort() {
        let parsed = convert_timestamps("9\tn-002\n1\tn-001\n");
        assert_eq!(parsed[0].node_id(), "n-002");
        assert_eq!(parsed[1].node_id(), "n-001");
    }

    #[test]
    fn test_convert_malformed_offset() {
        let parsed = convert_timestamps("abc\tn-001\n\tn-002\nn-003\n");
        assert!(parsed[0].offset_seconds().is_nan());
        assert_eq!(parsed[1].offset_seconds(), 0.0);
        assert!(parsed[2].offset_seconds().is_nan());
        assert_eq!(parsed[2].node_id(), "n-003");
    }

    #[test]
    fn test_timestamps_url() -> Result<()> {
        assert_eq!(
            timestamps_url("http://localhost:8080/app/", "/timestamps.txt")?,
            "http://localhost:8080/timestamps.txt"
        );
        assert!(timestamps_url("not a url", "/timestamps.txt").is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_fetch_timestamps_success() {
        let source = MockSource::ok("0\tn-001\n10\tn-002\n");
        let requested = source.requested.clone();
        let mut state = FlowchartState::default();

        fetch_timestamps(&mut state, &source, "http://host/timestamps.txt").await;

        assert_eq!(state.narration_timestamps.len(), 2);
        assert!(state.narration_enabled);
        assert_eq!(*requested.lock().unwrap(), vec!["http://host/timestamps.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_fetch_timestamps_failure_falls_back() {
        let source = MockSource::failing("Timestamps request failed with status 404");
        let mut state = FlowchartState::default();

        fetch_timestamps(&mut state, &source, "http://host/timestamps.txt").await;

        assert_eq!(state.narration_timestamps, vec![NarrationTimestamp::new(0.0, "n-001")]);
        assert!(!state.narration_enabled);
    }

    #[tokio::test]
    async fn test_http_source_reads_body() -> Result<()> {
        let url = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 16\r\nConnection: close\r\n\r\n0\tn-001\n4\tn-002\n",
        )
        .await?;

        let mut state = FlowchartState::default();
        fetch_timestamps(&mut state, &HttpTimestampSource::new(), &url).await;

        assert!(state.narration_enabled);
        assert_eq!(state.narration_timestamps[1], NarrationTimestamp::new(4.0, "n-002"));
        Ok(())
    }

    #[tokio::test]
    async fn test_http_source_rejects_error_status() -> Result<()> {
        let url = serve_once("HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n").await?;

        let err = HttpTimestampSource::new()
            .fetch_text(&url)
            .await
            .expect_err("404 should fail");
        assert!(err.to_string().contains("404"));
        Ok(())
    }
}
