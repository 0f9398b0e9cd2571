//! Low-level connectivity checks
//!
//! These bypass the HTTP client entirely: a raw TCP connect to the target,
//! followed by a hand-written `HEAD` request (over TLS for https targets).
//! They are used by the `test-connection` command to tell DNS, TCP and TLS
//! problems apart when full crawls fail.

use crate::crawler::resolver::HostResolver;
use serde::Serialize;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use url::Url;

/// Result of one probe step
#[derive(Debug, Clone, Serialize)]
pub struct ProbeOutcome {
    pub success: bool,
    pub elapsed_ms: u64,
    /// Status line on success, error text on failure
    pub detail: String,
}

impl ProbeOutcome {
    fn ok(started: Instant, detail: impl Into<String>) -> Self {
        Self {
            success: true,
            elapsed_ms: started.elapsed().as_millis() as u64,
            detail: detail.into(),
        }
    }

    fn failed(started: Instant, detail: impl Into<String>) -> Self {
        Self {
            success: false,
            elapsed_ms: started.elapsed().as_millis() as u64,
            detail: detail.into(),
        }
    }
}

/// Full diagnostic report for the target
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionReport {
    pub host: String,
    pub port: u16,
    pub resolution: ProbeOutcome,
    pub resolved_addr: Option<IpAddr>,
    pub tcp_connect: Option<ProbeOutcome>,
    pub head_request: Option<ProbeOutcome>,
}

impl ConnectionReport {
    /// True when every step that ran succeeded and the HEAD request completed
    pub fn is_healthy(&self) -> bool {
        self.resolution.success
            && self.tcp_connect.as_ref().is_some_and(|p| p.success)
            && self.head_request.as_ref().is_some_and(|p| p.success)
    }
}

/// Probes DNS, TCP and HEAD for `target`
///
/// Each step only runs if the previous one succeeded.
pub async fn test_connection(
    resolver: &HostResolver,
    target: &Url,
    timeout: Duration,
) -> ConnectionReport {
    let host = target.host_str().unwrap_or_default().to_string();
    let port = target.port_or_known_default().unwrap_or(443);

    let started = Instant::now();
    let (resolution, resolved_addr) = match resolver.resolve(&host).await {
        Ok(ip) => (ProbeOutcome::ok(started, ip.to_string()), Some(ip)),
        Err(e) => (ProbeOutcome::failed(started, e.to_string()), None),
    };

    let mut report = ConnectionReport {
        host: host.clone(),
        port,
        resolution,
        resolved_addr,
        tcp_connect: None,
        head_request: None,
    };

    let Some(ip) = resolved_addr else {
        return report;
    };

    let started = Instant::now();
    let stream = match tcp_connect(SocketAddr::new(ip, port), timeout).await {
        Ok(stream) => {
            report.tcp_connect = Some(ProbeOutcome::ok(started, format!("connected to {}:{}", ip, port)));
            stream
        }
        Err(e) => {
            report.tcp_connect = Some(ProbeOutcome::failed(started, e));
            return report;
        }
    };

    let started = Instant::now();
    let path = match target.query() {
        Some(q) => format!("{}?{}", target.path(), q),
        None => target.path().to_string(),
    };
    let head = if target.scheme() == "https" {
        tls_head(stream, &host, &path, timeout).await
    } else {
        head_over(stream, &host, &path, timeout).await
    };

    report.head_request = Some(match head {
        Ok(status_line) => ProbeOutcome::ok(started, status_line),
        Err(e) => ProbeOutcome::failed(started, e),
    });

    tracing::debug!("Connection report for {}: {:?}", host, report);
    report
}

/// Opens a raw TCP connection within `timeout`
pub async fn tcp_connect(addr: SocketAddr, timeout: Duration) -> Result<TcpStream, String> {
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(format!("TCP connect to {} failed: {}", addr, e)),
        Err(_) => Err(format!("TCP connect to {} timed out", addr)),
    }
}

/// Performs a TLS handshake (certificate checks disabled) and sends `HEAD`
pub async fn tls_head(
    stream: TcpStream,
    host: &str,
    path: &str,
    timeout: Duration,
) -> Result<String, String> {
    let connector = native_tls::TlsConnector::builder()
        .danger_accept_invalid_certs(true)
        .danger_accept_invalid_hostnames(true)
        .build()
        .map_err(|e| format!("TLS setup failed: {}", e))?;
    let connector = tokio_native_tls::TlsConnector::from(connector);

    let tls = match tokio::time::timeout(timeout, connector.connect(host, stream)).await {
        Ok(Ok(tls)) => tls,
        Ok(Err(e)) => return Err(format!("TLS handshake with {} failed: {}", host, e)),
        Err(_) => return Err(format!("TLS handshake with {} timed out", host)),
    };

    head_over(tls, host, path, timeout).await
}

/// Sends a minimal `HEAD` request over `stream` and returns the status line
pub async fn head_over<S>(mut stream: S, host: &str, path: &str, timeout: Duration) -> Result<String, String>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let path = if path.is_empty() { "/" } else { path };
    let request = format!(
        "HEAD {} HTTP/1.1\r\nHost: {}\r\nUser-Agent: notice-watch-diagnostics\r\nConnection: close\r\n\r\n",
        path, host
    );

    let exchange = async {
        stream.write_all(request.as_bytes()).await?;
        stream.flush().await?;

        let mut line = String::new();
        BufReader::new(&mut stream).read_line(&mut line).await?;
        Ok::<_, std::io::Error>(line.trim_end().to_string())
    };

    match tokio::time::timeout(timeout, exchange).await {
        Ok(Ok(line)) if line.starts_with("HTTP/") => Ok(line),
        Ok(Ok(line)) => Err(format!("Unexpected response: {:?}", line)),
        Ok(Err(e)) => Err(format!("HEAD request failed: {}", e)),
        Err(_) => Err("HEAD request timed out".to_string()),
    }
}
