//! One-shot HTTP servers with scripted answers, for exercising the reqwest
//! clients against real sockets.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Serve `response` verbatim to the first connection, then close it.
///
/// Returns the base URL of the server.
pub(crate) async fn serve_once(response: impl Into<Vec<u8>>) -> String {
    serve(response.into(), false).await
}

/// Send `head` to the first connection and then hold it open without ever
/// sending a body.
pub(crate) async fn serve_stalled(head: impl Into<Vec<u8>>) -> String {
    serve(head.into(), true).await
}

/// A response with status line `status` and a JSON body.
pub(crate) fn json_response(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
        body.len()
    )
}

async fn serve(response: Vec<u8>, hold: bool) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        read_request(&mut stream).await;
        stream.write_all(&response).await.unwrap();
        stream.flush().await.unwrap();
        if hold {
            std::future::pending::<()>().await;
        }
        let _ = stream.shutdown().await;
    });

    format!("http://{addr}")
}

/// Consume the request head and any `content-length` body so closing the
/// socket does not reset the connection under the client.
async fn read_request(stream: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let mut wanted = None;

    loop {
        if let Some(total) = wanted {
            if buf.len() >= total {
                return;
            }
        } else if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
            let body_len = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            wanted = Some(end + 4 + body_len);
            continue;
        }

        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
}
