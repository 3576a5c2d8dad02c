//! Line Links
//!
//! Newline-terminated, flushed text endpoints over any tokio byte stream.
//! The hub holds one link per seated player; a client holds one link to
//! the hub. In tests both ends are `tokio::io::duplex` halves.

use std::io;
use std::time::Duration;

use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::network::protocol::{HubMessage, PlayerMessage, MAX_LINE_LEN};

/// One read from a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// A complete line, terminator stripped.
    Line(String),
    /// Too long or not text.
    Garbled,
    /// End of stream, I/O failure, or read deadline expired.
    Closed,
}

/// Buffered line endpoint.
pub struct LineLink {
    reader: Box<dyn AsyncBufRead + Unpin + Send>,
    writer: Box<dyn AsyncWrite + Unpin + Send>,
    read_timeout: Option<Duration>,
    buf: Vec<u8>,
}

impl LineLink {
    /// Wrap a reader and writer.
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        Self {
            reader: Box::new(BufReader::new(reader)),
            writer: Box::new(writer),
            read_timeout: None,
            buf: Vec::with_capacity(MAX_LINE_LEN + 1),
        }
    }

    /// Wrap a connected TCP stream.
    pub fn from_tcp(stream: TcpStream) -> Self {
        // Prompts are tiny; don't let Nagle hold them back.
        if let Err(e) = stream.set_nodelay(true) {
            debug!("set_nodelay failed: {}", e);
        }
        let (reader, writer) = stream.into_split();
        Self::new(reader, writer)
    }

    /// Give up on any single read after `timeout`.
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Current read deadline.
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    // =========================================================================
    // WRITING
    // =========================================================================

    /// Write one line and flush it.
    pub async fn send_line(&mut self, line: &str) -> io::Result<()> {
        #[cfg(feature = "debug-tracing")]
        tracing::trace!(line, "send");

        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await
    }

    /// Send a hub message. Local-only variants are not sent.
    pub async fn send_hub(&mut self, message: &HubMessage) -> io::Result<()> {
        match message.encode() {
            Some(line) => self.send_line(&line).await,
            None => Ok(()),
        }
    }

    /// Send a player message. Local-only variants are not sent.
    pub async fn send_player(&mut self, message: &PlayerMessage) -> io::Result<()> {
        match message.encode() {
            Some(line) => self.send_line(&line).await,
            None => Ok(()),
        }
    }

    /// Shut down the write half so the peer sees end of stream.
    pub async fn close(&mut self) {
        if let Err(e) = self.writer.shutdown().await {
            debug!("shutdown failed: {}", e);
        }
    }

    // =========================================================================
    // READING
    // =========================================================================

    /// Read one protocol line.
    pub async fn recv(&mut self) -> Incoming {
        self.recv_line(MAX_LINE_LEN).await
    }

    /// Read one line of at most `limit` bytes, excluding the terminator.
    ///
    /// Longer lines are consumed and reported as [`Incoming::Garbled`].
    pub async fn recv_line(&mut self, limit: usize) -> Incoming {
        let result = match self.read_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, self.read_raw(limit)).await {
                Ok(result) => result,
                Err(_) => {
                    warn!("Read deadline of {:?} expired", timeout);
                    return Incoming::Closed;
                }
            },
            None => self.read_raw(limit).await,
        };

        match result {
            Ok(incoming) => {
                #[cfg(feature = "debug-tracing")]
                tracing::trace!(?incoming, "recv");
                incoming
            }
            Err(e) => {
                debug!("Read failed: {}", e);
                Incoming::Closed
            }
        }
    }

    /// Read and decode a player message.
    pub async fn recv_player(&mut self) -> PlayerMessage {
        match self.recv().await {
            Incoming::Line(line) => PlayerMessage::decode(&line),
            Incoming::Garbled => PlayerMessage::DecodeError,
            Incoming::Closed => PlayerMessage::EndOfStream,
        }
    }

    /// Read and decode a hub message for a game of `player_count` players.
    pub async fn recv_hub(&mut self, player_count: usize) -> HubMessage {
        match self.recv().await {
            Incoming::Line(line) => HubMessage::decode_for(&line, player_count),
            Incoming::Garbled => HubMessage::DecodeError,
            Incoming::Closed => HubMessage::EndOfStream,
        }
    }

    async fn read_raw(&mut self, limit: usize) -> io::Result<Incoming> {
        self.buf.clear();
        let cap = limit as u64 + 1;
        let n = (&mut self.reader).take(cap).read_until(b'\n', &mut self.buf).await?;
        if n == 0 {
            return Ok(Incoming::Closed);
        }

        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
        } else if n as u64 == cap {
            self.discard_rest_of_line().await?;
            return Ok(Incoming::Garbled);
        }

        match std::str::from_utf8(&self.buf) {
            Ok(line) => Ok(Incoming::Line(line.to_string())),
            Err(_) => Ok(Incoming::Garbled),
        }
    }

    async fn discard_rest_of_line(&mut self) -> io::Result<()> {
        loop {
            let (used, done) = {
                let available = self.reader.fill_buf().await?;
                match available.iter().position(|&b| b == b'\n') {
                    Some(i) => (i + 1, true),
                    None => (available.len(), available.is_empty()),
                }
            };
            self.reader.consume(used);
            if done {
                return Ok(());
            }
        }
    }
}

impl std::fmt::Debug for LineLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineLink")
            .field("read_timeout", &self.read_timeout)
            .finish_non_exhaustive()
    }
}

/// A connected pair of in-memory links, for tests and local play.
pub fn link_pair() -> (LineLink, LineLink) {
    let (a, b) = tokio::io::duplex(4096);
    let (a_read, a_write) = tokio::io::split(a);
    let (b_read, b_write) = tokio::io::split(b);
    (LineLink::new(a_read, a_write), LineLink::new(b_read, b_write))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::OrderCode;

    #[tokio::test]
    async fn test_lines_cross_the_pair() {
        let (mut hub, mut player) = link_pair();

        hub.send_hub(&HubMessage::YourTurn).await.unwrap();
        assert_eq!(player.recv_hub(2).await, HubMessage::YourTurn);

        player.send_player(&PlayerMessage::Play(OrderCode::Loot)).await.unwrap();
        assert_eq!(hub.recv_player().await, PlayerMessage::Play(OrderCode::Loot));
    }

    #[tokio::test]
    async fn test_local_variants_are_not_written() {
        let (mut hub, mut player) = link_pair();
        hub.send_hub(&HubMessage::DecodeError).await.unwrap();
        hub.send_hub(&HubMessage::Round).await.unwrap();
        assert_eq!(player.recv().await, Incoming::Line("round".to_string()));
    }

    #[tokio::test]
    async fn test_overlong_line_is_skipped_whole() {
        let (mut hub, mut player) = link_pair();
        hub.send_line("playrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrrr").await.unwrap();
        hub.send_line("play$").await.unwrap();

        assert_eq!(player.recv_player().await, PlayerMessage::DecodeError);
        assert_eq!(player.recv_player().await, PlayerMessage::Play(OrderCode::Loot));
    }

    #[tokio::test]
    async fn test_line_of_exactly_max_length_is_accepted() {
        let (mut hub, mut player) = link_pair();
        let line = "x".repeat(MAX_LINE_LEN);
        hub.send_line(&line).await.unwrap();
        assert_eq!(player.recv().await, Incoming::Line(line));
    }

    #[tokio::test]
    async fn test_carriage_return_is_kept() {
        let (mut hub, mut player) = link_pair();
        hub.send_line("round\r").await.unwrap();
        assert_eq!(player.recv_hub(1).await, HubMessage::DecodeError);
    }

    #[tokio::test]
    async fn test_end_of_stream() {
        let (mut hub, mut player) = link_pair();
        hub.close().await;
        drop(hub);
        assert_eq!(player.recv_player().await, PlayerMessage::EndOfStream);
        assert_eq!(player.recv().await, Incoming::Closed);
    }

    #[tokio::test]
    async fn test_read_deadline_counts_as_closed() {
        let (_hub, player) = link_pair();
        let mut player = player.with_read_timeout(Some(Duration::from_millis(20)));
        assert_eq!(player.recv_hub(1).await, HubMessage::EndOfStream);
    }

    #[tokio::test]
    async fn test_recv_line_with_larger_limit() {
        let (mut hub, mut player) = link_pair();
        let json = format!("{{\"name\":\"{}\"}}", "n".repeat(40));
        hub.send_line(&json).await.unwrap();
        assert_eq!(player.recv_line(256).await, Incoming::Line(json));
    }
}
