/*
 * Copyright © 2024, United States Government, as represented by the Administrator of
 * the National Aeronautics and Space Administration. All rights reserved.
 *
 * The “ODIN” software is licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License. You may obtain a copy
 * of the License at http://www.apache.org/licenses/LICENSE-2.0.
 *
 * Unless required by applicable law or agreed to in writing, software distributed under
 * the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND,
 * either express or implied. See the License for the specific language governing permissions
 * and limitations under the License.
 */

//! a minimal HTTP/1.1 GET client bound to a single resolved IP. hyper and reqwest both insist
//! on doing their own DNS resolution, which defeats per-IP worker assignment, so requests and
//! responses are framed by hand here - request lines written directly, response status/headers
//! parsed with `httparse`, body framing supporting both Content-Length and chunked encoding.

use std::net::SocketAddr;
use std::io;
use tokio::io::{AsyncReadExt,AsyncWriteExt,AsyncWrite};
use tokio::net::TcpStream;

use crate::errors::TransientError;

const MAX_HEADER_BYTES: usize = 16 * 1024;
const READ_CHUNK: usize = 1024 * 1024; // stream body in <=1MiB chunks

/// a keep-alive connection to one resolved mirror IP. Not thread-safe - one instance per worker.
pub struct HttpClient {
    addr: SocketAddr,
    host: String,
    conn: Option<Conn>,
}

pub struct ResponseHead {
    pub status: u16,
    body_mode: BodyMode,
}

enum BodyMode {
    ContentLength(usize),
    Chunked,
    Unsized, // closes the connection at end-of-body (HTTP/1.0-ish fallback)
}

/// a raw socket plus whatever bytes have already been read off it but not yet handed to the
/// caller. Header parsing reads in coarse chunks and can easily over-read into the start of the
/// body in the same syscall (common for small files); `pending` carries that leftover forward so
/// no byte the socket ever produced is silently dropped.
struct Conn {
    tcp: TcpStream,
    pending: Vec<u8>,
}

impl Conn {
    fn new (tcp: TcpStream) -> Self { Conn { tcp, pending: Vec::new() } }

    /// read more bytes from the socket, appending to whatever is already pending. Returns the
    /// number of fresh bytes read (0 means EOF).
    async fn fill_more (&mut self) -> io::Result<usize> {
        let mut tmp = [0u8; READ_CHUNK];
        let n = self.tcp.read(&mut tmp).await?;
        self.pending.extend_from_slice(&tmp[..n]);
        Ok(n)
    }

    /// serve up to `buf.len()` bytes, preferring anything already pending before touching the
    /// socket again.
    async fn read (&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            return self.tcp.read(buf).await;
        }
        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }

    /// read one CRLF/LF-terminated line (used for chunked-encoding framing), trimmed of the
    /// trailing newline.
    async fn read_line (&mut self) -> io::Result<String> {
        loop {
            if let Some(idx) = self.pending.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = self.pending.drain(..=idx).collect();
                return Ok( String::from_utf8_lossy(&line).trim_end().to_string());
            }
            if self.fill_more().await? == 0 {
                return Err( io::Error::new( io::ErrorKind::UnexpectedEof, "connection closed reading chunk framing"));
            }
        }
    }
}

impl HttpClient {
    pub fn new (addr: SocketAddr, host: impl Into<String>) -> Self {
        HttpClient { addr, host: host.into(), conn: None }
    }

    async fn ensure_connected (&mut self) -> Result<(),TransientError> {
        if self.conn.is_none() {
            let tcp = TcpStream::connect( self.addr).await?;
            self.conn = Some( Conn::new(tcp));
        }
        Ok(())
    }

    /// drop the current connection so a subsequent request reconnects. Used before long sleeps
    /// so we don't hold a mirror connection open idle.
    pub fn close (&mut self) {
        self.conn = None;
    }

    /// GET `path` and stream the response body into `sink`, chunk by chunk. Returns the final
    /// status. Any non-200 still drains/validates headers but does not read a body for 404s,
    /// since NOAA-style mirrors send an empty or HTML 404 body we don't care about.
    pub async fn get_into (&mut self, path: &str, sink: &mut (dyn AsyncWrite + Unpin + Send)) -> Result<u16,TransientError> {
        self.ensure_connected().await?;

        let request = format!(
            "GET {path} HTTP/1.1\r\nHost: {host}\r\nConnection: Keep-Alive\r\n\r\n",
            path = path, host = self.host
        );

        let conn = self.conn.as_mut().expect("connected above");
        if let Err(e) = conn.tcp.write_all( request.as_bytes()).await {
            self.close();
            return Err(e.into());
        }
        let conn = self.conn.as_mut().expect("connected above");

        let head = match read_response_head(conn).await {
            Ok(h) => h,
            Err(e) => { self.close(); return Err(e); }
        };

        if head.status == 404 {
            // a 404 body is small and irrelevant; reconnect next time in case the server closed
            self.close();
            return Err(TransientError::NotFound);
        }
        if head.status != 200 {
            self.close();
            return Err(TransientError::BadStatus(head.status));
        }

        let conn = self.conn.as_mut().expect("connected above");
        if let Err(e) = stream_body( conn, &head.body_mode, sink).await {
            self.close();
            return Err(e);
        }

        if matches!(head.body_mode, BodyMode::Unsized) {
            self.close();
        }

        Ok(head.status)
    }
}

async fn read_response_head (conn: &mut Conn) -> Result<ResponseHead,TransientError> {
    loop {
        {
            let mut headers = [httparse::EMPTY_HEADER; 32];
            let mut response = httparse::Response::new(&mut headers);

            match response.parse(&conn.pending) {
                Ok(httparse::Status::Complete(used)) => {
                    let status = response.code.unwrap_or(0);

                    let mut content_length: Option<usize> = None;
                    let mut chunked = false;
                    for h in response.headers.iter() {
                        if h.name.eq_ignore_ascii_case("content-length") {
                            content_length = std::str::from_utf8(h.value).ok().and_then(|s| s.parse().ok());
                        } else if h.name.eq_ignore_ascii_case("transfer-encoding") {
                            if std::str::from_utf8(h.value).map(|s| s.to_ascii_lowercase().contains("chunked")).unwrap_or(false) {
                                chunked = true;
                            }
                        }
                    }

                    let body_mode = if chunked {
                        BodyMode::Chunked
                    } else if let Some(len) = content_length {
                        BodyMode::ContentLength(len)
                    } else {
                        BodyMode::Unsized
                    };

                    // only the header block was consumed; anything past `used` is the start of
                    // the body and stays in `pending` for `stream_body` to pick up first.
                    conn.pending.drain(..used);
                    return Ok(ResponseHead { status: status as u16, body_mode });
                }
                Ok(httparse::Status::Partial) => {
                    if conn.pending.len() >= MAX_HEADER_BYTES {
                        return Err(TransientError::NetworkError( io::Error::new( io::ErrorKind::InvalidData, "response headers too large")));
                    }
                }
                Err(e) => return Err(TransientError::NetworkError( io::Error::new( io::ErrorKind::InvalidData, e.to_string()))),
            }
        }

        if conn.fill_more().await? == 0 {
            return Err(TransientError::NetworkError( io::Error::new( io::ErrorKind::UnexpectedEof, "connection closed before headers complete")));
        }
    }
}

async fn stream_body (conn: &mut Conn, mode: &BodyMode, sink: &mut (dyn AsyncWrite + Unpin + Send)) -> Result<(),TransientError> {
    match mode {
        BodyMode::ContentLength(len) => {
            let mut remaining = *len;
            let mut buf = vec![0u8; READ_CHUNK.min((*len).max(1))];
            while remaining > 0 {
                let want = remaining.min(buf.len());
                let n = conn.read(&mut buf[..want]).await?;
                if n == 0 {
                    return Err(TransientError::NetworkError( io::Error::new( io::ErrorKind::UnexpectedEof, "connection closed mid-body")));
                }
                sink.write_all(&buf[..n]).await?;
                remaining -= n;
            }
            Ok(())
        }
        BodyMode::Chunked => {
            loop {
                let size_line = conn.read_line().await?;
                let size_str = size_line.split(';').next().unwrap_or("").trim();
                let size = usize::from_str_radix(size_str, 16)
                    .map_err(|_| TransientError::NetworkError( io::Error::new( io::ErrorKind::InvalidData, "bad chunk size")))?;

                if size == 0 {
                    // consume trailing headers/blank line
                    loop {
                        let l = conn.read_line().await?;
                        if l.is_empty() { break; }
                    }
                    return Ok(());
                }

                let mut remaining = size;
                let mut buf = vec![0u8; READ_CHUNK.min(size)];
                while remaining > 0 {
                    let want = remaining.min(buf.len());
                    let n = conn.read(&mut buf[..want]).await?;
                    if n == 0 {
                        return Err(TransientError::NetworkError( io::Error::new( io::ErrorKind::UnexpectedEof, "connection closed mid-chunk")));
                    }
                    sink.write_all(&buf[..n]).await?;
                    remaining -= n;
                }
                conn.read_line().await?; // trailing CRLF after the chunk data
            }
        }
        BodyMode::Unsized => {
            let mut buf = [0u8; READ_CHUNK];
            loop {
                let n = conn.read(&mut buf).await?;
                if n == 0 { return Ok(()); }
                sink.write_all(&buf[..n]).await?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio::io::AsyncReadExt as _;

    async fn respond_once (listener: TcpListener, response: &'static [u8]) {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 1024];
        let _ = sock.read(&mut buf).await; // drain the request
        sock.write_all(response).await.unwrap();
    }

    #[tokio::test]
    async fn content_length_body_is_streamed_in_full() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn( respond_once( listener, b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello"));

        let mut client = HttpClient::new(addr, "mirror.example");
        let mut body = Vec::new();
        let status = client.get_into("/f", &mut body).await.unwrap();
        assert_eq!(status, 200);
        assert_eq!(body, b"hello");
    }

    #[tokio::test]
    async fn chunked_body_is_reassembled() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n3\r\nfoo\r\n3\r\nbar\r\n0\r\n\r\n";
        tokio::spawn( respond_once( listener, response));

        let mut client = HttpClient::new(addr, "mirror.example");
        let mut body = Vec::new();
        let status = client.get_into("/f", &mut body).await.unwrap();
        assert_eq!(status, 200);
        assert_eq!(body, b"foobar");
    }

    #[tokio::test]
    async fn not_found_is_reported_distinctly() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn( respond_once( listener, b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n"));

        let mut client = HttpClient::new(addr, "mirror.example");
        let mut body = Vec::new();
        let err = client.get_into("/f", &mut body).await.unwrap_err();
        assert!( matches!(err, TransientError::NotFound));
    }

    #[tokio::test]
    async fn large_body_arriving_in_one_segment_is_not_truncated() {
        // regression: headers and the full body landing in a single read() must not lose the
        // leftover bytes read past the header boundary.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let payload = vec![0x42u8; 500_000];
        let mut response = format!("HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n", payload.len()).into_bytes();
        response.extend_from_slice(&payload);

        tokio::spawn( async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = sock.read(&mut buf).await;
            sock.write_all(&response).await.unwrap();
        });

        let mut client = HttpClient::new(addr, "mirror.example");
        let mut body = Vec::new();
        let status = client.get_into("/f", &mut body).await.unwrap();
        assert_eq!(status, 200);
        assert_eq!(body.len(), payload.len());
        assert!( body.iter().all(|&b| b == 0x42));
    }
}
