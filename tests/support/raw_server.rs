//! Hand-written HTTP/1.1 servers for behavior a mock server cannot produce.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use super::socket_guard::should_skip_socket_bound_test;

/// How long a stalled connection is held open.
const STALL: Duration = Duration::from_secs(30);

/// Starts a server that sends 200 headers and a few body bytes, then stalls.
///
/// Announces a `Content-Length` far larger than what is written so the client
/// keeps waiting for the rest. Returns the base URL, or `None` when skipped.
#[allow(dead_code)]
pub async fn start_stalled_body_server_or_skip() -> Option<String> {
    if should_skip_socket_bound_test() {
        return None;
    }
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stalled body server");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut request = [0_u8; 8192];
                let _ = socket.read(&mut request).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 4096\r\n\r\npartial")
                    .await;
                let _ = socket.flush().await;
                tokio::time::sleep(STALL).await;
            });
        }
    });

    Some(base_url(addr))
}

/// Returns a localhost URL whose port has nothing listening.
#[allow(dead_code)]
pub fn refused_url_or_skip() -> Option<String> {
    if should_skip_socket_bound_test() {
        return None;
    }
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind probe socket");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    Some(base_url(addr))
}

fn base_url(addr: SocketAddr) -> String {
    format!("http://{addr}/")
}
