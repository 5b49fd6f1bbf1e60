//! Minimal HTTP/1.1 transport over plain TCP sockets.
//!
//! Keeps the crate free of an external HTTP client dependency. Supports
//! POST with a JSON or form-urlencoded body and GET with query parameters;
//! every request closes its connection.

use std::time::Duration;

use indexmap::IndexMap;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::error::{ErrorCode, TransportError, TransportResult};

pub(crate) struct HttpResponse {
    pub status: u16,
    pub body: String,
}

pub(crate) struct HttpClient {
    timeout: Duration,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// POSTs `body` to `url` with the given content type.
    pub async fn post(
        &self,
        url: &str,
        body: &str,
        content_type: &str,
        headers: &IndexMap<String, String>,
    ) -> TransportResult<HttpResponse> {
        self.execute("POST", url, None, Some((body, content_type)), headers)
            .await
    }

    /// GETs `url` with `query` appended as the query string.
    pub async fn get(
        &self,
        url: &str,
        query: &str,
        headers: &IndexMap<String, String>,
    ) -> TransportResult<HttpResponse> {
        self.execute("GET", url, Some(query), None, headers).await
    }

    async fn execute(
        &self,
        method: &str,
        url: &str,
        query: Option<&str>,
        body: Option<(&str, &str)>,
        headers: &IndexMap<String, String>,
    ) -> TransportResult<HttpResponse> {
        let (host, port, mut path) = parse_url(url)?;
        if let Some(query) = query {
            path = format!("{}?{}", path, query);
        }

        debug!(method, host = host.as_str(), path = path.as_str(), "dispatching request");

        let connect = TcpStream::connect(format!("{}:{}", host, port));
        let mut stream = timeout(self.timeout, connect)
            .await
            .map_err(|_| TransportError::timeout())?
            .map_err(|e| {
                TransportError::new(
                    ErrorCode::ConnectionRefused,
                    format!("connection failed: {}", e),
                )
            })?;

        let mut request = format!(
            "{} {} HTTP/1.1\r\nHost: {}\r\nAccept: application/json\r\nConnection: close\r\n",
            method, path, host
        );
        if let Some((body, content_type)) = body {
            request.push_str(&format!(
                "Content-Type: {}\r\nContent-Length: {}\r\n",
                content_type,
                body.len()
            ));
        }
        for (key, value) in headers {
            request.push_str(&format!("{}: {}\r\n", key, value));
        }
        request.push_str("\r\n");
        if let Some((body, _)) = body {
            request.push_str(body);
        }

        timeout(self.timeout, stream.write_all(request.as_bytes()))
            .await
            .map_err(|_| TransportError::timeout())?
            .map_err(|e| TransportError::network(format!("write failed: {}", e)))?;

        let mut response_bytes = Vec::new();
        timeout(self.timeout, stream.read_to_end(&mut response_bytes))
            .await
            .map_err(|_| TransportError::timeout())?
            .map_err(|e| TransportError::network(format!("read failed: {}", e)))?;

        parse_http_response(&String::from_utf8_lossy(&response_bytes))
    }
}

/// Splits an `http://host[:port]/path` URL. HTTPS needs a TLS stack this
/// transport does not carry, so it is refused with a dedicated code.
pub(crate) fn parse_url(url: &str) -> TransportResult<(String, u16, String)> {
    let url = url.trim();

    let without_protocol = if url.starts_with("https://") {
        return Err(TransportError::new(
            ErrorCode::HttpsNotSupported,
            "HTTPS is not supported by the built-in transport; point the client at an HTTP endpoint or a local proxy",
        ));
    } else if let Some(rest) = url.strip_prefix("http://") {
        rest
    } else {
        url
    };

    let (host_port, path) = match without_protocol.find('/') {
        Some(slash) => (&without_protocol[..slash], &without_protocol[slash..]),
        None => (without_protocol, "/"),
    };

    let (host, port) = match host_port.rfind(':') {
        Some(colon) => {
            let host = &host_port[..colon];
            let port_str = &host_port[colon + 1..];
            let port = port_str.parse().map_err(|_| {
                TransportError::invalid_url(format!("invalid port: {}", port_str))
            })?;
            (host.to_string(), port)
        }
        None => (host_port.to_string(), 80),
    };

    if host.is_empty() {
        return Err(TransportError::invalid_url(format!("no host in `{}`", url)));
    }
    Ok((host, port, path.to_string()))
}

/// Extracts the status code and body from a raw HTTP/1.1 response.
pub(crate) fn parse_http_response(response: &str) -> TransportResult<HttpResponse> {
    let status_line = response
        .lines()
        .next()
        .ok_or_else(|| TransportError::invalid_response("empty response"))?;

    let status: u16 = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .ok_or_else(|| {
            TransportError::invalid_response(format!("bad status line: {}", status_line))
        })?;

    let (head, body) = match response.split_once("\r\n\r\n") {
        Some(parts) => parts,
        None => response
            .split_once("\n\n")
            .ok_or_else(|| TransportError::invalid_response("could not find response body"))?,
    };

    let body = if head.to_ascii_lowercase().contains("transfer-encoding: chunked") {
        parse_chunked_body(body)
    } else {
        body.to_string()
    };

    Ok(HttpResponse { status, body })
}

/// Decodes a chunked transfer-encoding body.
fn parse_chunked_body(body: &str) -> String {
    let mut result = String::new();
    let mut remaining = body;

    loop {
        let size_end = match remaining.find("\r\n").or_else(|| remaining.find('\n')) {
            Some(end) => end,
            None => break,
        };
        let size_str = remaining[..size_end].trim();
        let chunk_size = usize::from_str_radix(size_str, 16).unwrap_or(0);
        if chunk_size == 0 {
            break;
        }

        let data_start = if remaining[size_end..].starts_with("\r\n") {
            size_end + 2
        } else {
            size_end + 1
        };

        if data_start + chunk_size > remaining.len() {
            result.push_str(&remaining[data_start..]);
            break;
        }

        result.push_str(&remaining[data_start..data_start + chunk_size]);
        remaining = &remaining[data_start + chunk_size..];

        if let Some(rest) = remaining.strip_prefix("\r\n") {
            remaining = rest;
        } else if let Some(rest) = remaining.strip_prefix('\n') {
            remaining = rest;
        }
    }

    result
}
