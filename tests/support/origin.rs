use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::Result;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Scripted origin server: answers every connection with the same bytes and closes.
pub struct MockOrigin {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<Vec<u8>>>>,
    handle: JoinHandle<()>,
}

impl MockOrigin {
    pub async fn respond(response: impl Into<Vec<u8>>) -> Result<Self> {
        Self::spawn(response.into(), None).await
    }

    pub async fn respond_slowly(response: impl Into<Vec<u8>>, delay: StdDuration) -> Result<Self> {
        Self::spawn(response.into(), Some(delay)).await
    }

    pub async fn ok(body: &str) -> Result<Self> {
        Self::respond(format!("HTTP/1.1 200 OK\r\n\r\n{body}")).await
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .map(|raw| String::from_utf8_lossy(raw).into_owned())
            .collect()
    }

    async fn spawn(response: Vec<u8>, delay: Option<StdDuration>) -> Result<Self> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await?;
        let addr = listener.local_addr()?;
        let requests = Arc::new(Mutex::new(Vec::new()));
        let response = Arc::new(response);
        let seen = requests.clone();
        let handle = tokio::spawn(async move {
            loop {
                let (stream, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => break,
                };
                let response = response.clone();
                let seen = seen.clone();
                tokio::spawn(async move {
                    let _ = handle_connection(stream, &response, delay, &seen).await;
                });
            }
        });
        Ok(Self {
            addr,
            requests,
            handle,
        })
    }
}

impl Drop for MockOrigin {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    response: &[u8],
    delay: Option<StdDuration>,
    seen: &Mutex<Vec<Vec<u8>>>,
) -> Result<()> {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|window| window == b"\r\n\r\n") {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        request.extend_from_slice(&buf[..n]);
    }
    seen.lock().push(request);
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    stream.write_all(response).await?;
    stream.shutdown().await?;
    Ok(())
}
