// ABOUTME: HTTP reachability probe for the deployed endpoint.
// ABOUTME: HttpProbe trait with a hyper HTTP/1 implementation over a tokio TCP stream.

use async_trait::async_trait;
use http_body_util::Empty;
use hyper::Uri;
use hyper_util::rt::TokioIo;
use std::time::Duration;
use tokio::net::TcpStream;

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("invalid probe URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("could not connect to {authority}: {source}")]
    Connect {
        authority: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP exchange failed: {0}")]
    Http(#[from] hyper::Error),

    #[error("no response within {0:?}")]
    Timeout(Duration),
}

/// Issues a single request and reports the response status.
#[async_trait]
pub trait HttpProbe: Send + Sync {
    async fn probe(&self, url: &str, timeout: Duration) -> Result<u16, ProbeError>;
}

/// Plain `http://` GET using hyper's connection-level client.
#[derive(Debug, Clone, Copy, Default)]
pub struct HyperProbe;

impl HyperProbe {
    async fn get(uri: &Uri, host: &str, port: u16) -> Result<u16, ProbeError> {
        let authority = format!("{host}:{port}");
        let stream = TcpStream::connect(&authority)
            .await
            .map_err(|source| ProbeError::Connect {
                authority: authority.clone(),
                source,
            })?;

        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!("probe connection error: {}", e);
            }
        });

        let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
        let req = hyper::Request::builder()
            .method("GET")
            .uri(path)
            .header("Host", authority.as_str())
            .header("User-Agent", concat!("shipline/", env!("CARGO_PKG_VERSION")))
            .body(Empty::<bytes::Bytes>::new())
            .map_err(|e| ProbeError::InvalidUrl {
                url: uri.to_string(),
                reason: e.to_string(),
            })?;

        let resp = sender.send_request(req).await?;
        Ok(resp.status().as_u16())
    }
}

#[async_trait]
impl HttpProbe for HyperProbe {
    async fn probe(&self, url: &str, timeout: Duration) -> Result<u16, ProbeError> {
        let invalid = |reason: &str| ProbeError::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let uri: Uri = url.parse().map_err(|_| invalid("not a URI"))?;
        if uri.scheme_str() != Some("http") {
            return Err(invalid("only http:// is supported"));
        }
        let host = uri.host().ok_or_else(|| invalid("missing host"))?.to_string();
        let port = uri.port_u16().unwrap_or(80);

        tracing::debug!("probing {}", url);
        tokio::time::timeout(timeout, Self::get(&uri, &host, port))
            .await
            .map_err(|_| ProbeError::Timeout(timeout))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn serve_once(response: &'static str) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            socket.write_all(response.as_bytes()).await.unwrap();
        });
        port
    }

    #[tokio::test]
    async fn reports_status_code() {
        let port =
            serve_once("HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\n\r\n").await;
        let status = HyperProbe
            .probe(&format!("http://127.0.0.1:{port}/health"), Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(status, 503);
    }

    #[tokio::test]
    async fn rejects_https() {
        let err = HyperProbe
            .probe("https://example.com/", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let _hold = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });
        let err = HyperProbe
            .probe(&format!("http://127.0.0.1:{port}/"), Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Timeout(_)));
    }
}
