//! Minimal HTTP/1.1 GET client over hyper.

use anyhow::{Context, bail};
use bytes::Bytes;
use http::header::{ACCEPT, HOST, USER_AGENT};
use http::{HeaderMap, Method, Request, StatusCode, Uri};
use http_body_util::{BodyExt, Empty, LengthLimitError, Limited};
use hyper_util::rt::TokioIo;
use tracing::debug;

const USER_AGENT_VALUE: &str = concat!("scalegrid/", env!("CARGO_PKG_VERSION"));

/// Largest response body [`get`] will read.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

/// Check that `uri` is something [`get`] can fetch.
pub fn validate_uri(uri: &Uri) -> anyhow::Result<()> {
    match uri.scheme_str() {
        Some("http") => {}
        Some(other) => bail!("unsupported url scheme {other:?}, only http is supported"),
        None => bail!("url {uri} has no scheme"),
    }
    if uri.host().is_none() {
        bail!("url {uri} has no host");
    }
    Ok(())
}

/// Host part of `uri` as a socket address host: IPv6 literals lose
/// their brackets.
fn socket_host(uri: &Uri) -> &str {
    let host = uri.host().unwrap_or_default();
    host.strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host)
}

/// GET `uri` on a fresh connection and read the whole body, up to
/// [`MAX_BODY_BYTES`].
pub async fn get(uri: &Uri, headers: &HeaderMap) -> anyhow::Result<HttpResponse> {
    get_limited(uri, headers, MAX_BODY_BYTES).await
}

async fn get_limited(
    uri: &Uri,
    headers: &HeaderMap,
    max_body: usize,
) -> anyhow::Result<HttpResponse> {
    validate_uri(uri)?;
    let host = socket_host(uri);
    let port = uri.port_u16().unwrap_or(80);
    let authority = uri.authority().map(|a| a.as_str()).unwrap_or(host);

    let stream = tokio::net::TcpStream::connect((host, port))
        .await
        .with_context(|| format!("connecting to {authority}"))?;
    let io = TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .with_context(|| format!("http handshake with {authority}"))?;

    // Drive the connection in the background.
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!(error = %e, "http connection closed with error");
        }
    });

    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    let mut req = Request::builder()
        .method(Method::GET)
        .uri(path)
        .header(HOST, authority)
        .header(USER_AGENT, USER_AGENT_VALUE)
        .header(ACCEPT, "application/json")
        .body(Empty::<Bytes>::new())
        .context("building request")?;
    req.headers_mut()
        .extend(headers.iter().map(|(k, v)| (k.clone(), v.clone())));

    let resp = sender
        .send_request(req)
        .await
        .with_context(|| format!("GET {uri}"))?;
    let status = resp.status();
    let body = match Limited::new(resp.into_body(), max_body).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.is::<LengthLimitError>() => {
            bail!("response body from {uri} is larger than {max_body} bytes")
        }
        Err(e) => bail!("reading response body from {uri}: {e}"),
    };

    debug!(%uri, %status, bytes = body.len(), "http get completed");
    Ok(HttpResponse { status, body })
}
