//! Connection Session Module
//!
//! This module handles individual client connections to FlashCache.
//! Each client gets its own session task that runs in a loop, reading
//! request chunks and sending replies.
//!
//! ## Session States
//!
//! ```text
//!                 get line / bad line
//!                ┌──────────────────┐
//!                │                  │
//!                ▼                  │
//!     ┌───────────────────┐         │
//! ───>│  AwaitingCommand  │─────────┘
//!     └─────────┬─────────┘
//!               │ write header line
//!               ▼
//!     ┌───────────────────┐  payload shorter
//!     │  AwaitingPayload  │<──────────┐
//!     │    (Command)      │───────────┘
//!     └─────────┬─────────┘
//!               │ payload complete: dispatch
//!               ▼
//!        AwaitingCommand
//! ```
//!
//! ## Buffer Management
//!
//! TCP does not preserve write boundaries: a read may carry half a line, or
//! a header line together with its payload and the next command. Incoming
//! bytes accumulate in a `BytesMut` buffer. While awaiting a command the
//! session consumes one line at a time, everything up to and including the
//! next `\n`. While awaiting a payload it consumes exactly the declared
//! number of bytes followed by `\r\n` (or a bare `\n`), so data blocks are
//! binary-safe. An incomplete tail waits in the buffer for the next read.
//!
//! A request line may not grow past [`MAX_LINE_SIZE`] bytes; a client that
//! streams more than that without a newline is disconnected. Data blocks are
//! not subject to the limit because they are bounded by their declared size.

use crate::commands::CommandHandler;
use crate::protocol::{decode, Command, Response};
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::{debug, error, info, trace, warn};

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Maximum length of an unterminated line (64 KB)
pub const MAX_LINE_SIZE: usize = 64 * 1024;

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands dispatched
    pub commands_processed: AtomicU64,
    /// Request lines that failed to decode
    pub parse_errors: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn parse_error(&self) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written.fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Where a session is in the request cycle.
#[derive(Debug, Default)]
pub enum SessionState {
    /// Waiting for a request line
    #[default]
    AwaitingCommand,

    /// A write command's header was decoded; its data block is arriving
    AwaitingPayload(Command),
}

/// Handles a single client connection.
///
/// Generic over the stream so it can be driven by a `TcpStream` or by an
/// in-memory stream in tests.
pub struct Session<S> {
    /// The client stream
    stream: BufWriter<S>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Buffer for incoming data
    buffer: BytesMut,

    state: SessionState,

    /// The command handler (shared across connections)
    command_handler: CommandHandler,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new session.
    ///
    /// # Arguments
    ///
    /// * `stream` - The client stream
    /// * `addr` - The client's socket address
    /// * `command_handler` - The command handler for executing commands
    /// * `stats` - Shared connection statistics
    pub fn new(
        stream: S,
        addr: SocketAddr,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            state: SessionState::default(),
            command_handler,
            stats,
        }
    }

    /// Runs the session until the client disconnects or an I/O error occurs.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "Client disconnected gracefully"),
            Err(e) => match e {
                ConnectionError::ClientDisconnected => {
                    debug!(client = %self.addr, "Client disconnected")
                }
                ConnectionError::IoError(io_err)
                    if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
                {
                    debug!(client = %self.addr, "Connection reset by client")
                }
                _ => warn!(client = %self.addr, error = %e, "Connection error"),
            },
        }

        self.stats.connection_closed();
        result
    }

    /// The main read-advance-reply loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            while let Step::Consumed(reply) = self.advance() {
                if let Some(response) = reply {
                    self.send_response(&response).await?;
                }
            }

            // Everything complete in the buffer has been answered
            self.stream.flush().await?;

            self.read_more_data().await?;
        }
    }

    /// Splits the next line (up to and including `\n`) off the buffer.
    fn next_line(&mut self) -> Option<BytesMut> {
        let end = self.buffer.iter().position(|&b| b == b'\n')?;
        Some(self.buffer.split_to(end + 1))
    }

    /// Consumes as much buffered input as the current state allows.
    fn advance(&mut self) -> Step {
        match std::mem::take(&mut self.state) {
            SessionState::AwaitingCommand => match self.next_line() {
                Some(line) => {
                    trace!(client = %self.addr, len = line.len(), "Processing line");
                    Step::Consumed(self.handle_line(&line))
                }
                None => Step::NeedData,
            },
            SessionState::AwaitingPayload(command) => self.read_payload(command),
        }
    }

    /// Decodes a request line in the `AwaitingCommand` state.
    fn handle_line(&mut self, line: &[u8]) -> Option<Response> {
        match decode(line) {
            Ok(command) if command.is_complete() => self.dispatch(command),
            Ok(command) => {
                trace!(
                    client = %self.addr,
                    action = %command.action,
                    expected = command.byte_count,
                    "Awaiting payload"
                );
                self.state = SessionState::AwaitingPayload(command);
                None
            }
            Err(e) => {
                warn!(client = %self.addr, error = %e, "Parse error");
                self.stats.parse_error();
                Some(Response::Error)
            }
        }
    }

    /// Moves data block bytes into the pending command.
    ///
    /// The block is framed by its declared byte count, so it may contain any
    /// bytes, line breaks included. Once it is complete the next bytes must
    /// be its terminator. Anything else means the client sent more than it
    /// declared: the rest of that line joins the payload and the handler
    /// rejects it.
    fn read_payload(&mut self, mut command: Command) -> Step {
        let missing = command.byte_count.saturating_sub(command.payload.len());
        if missing > 0 {
            let n = missing.min(self.buffer.len());
            if n > 0 {
                let bytes = self.buffer.split_to(n);
                command.push_payload(&bytes);
            }
            if n < missing {
                return self.wait_for_payload(command);
            }
        }

        let terminator = match self.buffer.first() {
            None => return self.wait_for_payload(command),
            Some(b'\n') => 1,
            Some(b'\r') if self.buffer.len() < 2 => return self.wait_for_payload(command),
            Some(_) if self.buffer.starts_with(b"\r\n") => 2,
            Some(_) => match self.next_line() {
                Some(line) => {
                    command.push_payload(strip_terminator(&line));
                    return Step::Consumed(self.dispatch(command));
                }
                None => return self.wait_for_payload(command),
            },
        };

        let _ = self.buffer.split_to(terminator);
        Step::Consumed(self.dispatch(command))
    }

    fn wait_for_payload(&mut self, command: Command) -> Step {
        self.state = SessionState::AwaitingPayload(command);
        Step::NeedData
    }

    fn dispatch(&mut self, command: Command) -> Option<Response> {
        self.stats.command_processed();
        self.command_handler.execute(command)
    }

    /// Reads more data from the stream into the buffer.
    async fn read_more_data(&mut self) -> Result<(), ConnectionError> {
        // Only an unterminated line is left in the buffer at this point
        if self.buffer.len() >= MAX_LINE_SIZE {
            error!(
                client = %self.addr,
                size = self.buffer.len(),
                "Line length limit exceeded"
            );
            return Err(ConnectionError::BufferFull);
        }

        // Ensure we have some capacity
        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(INITIAL_BUFFER_SIZE);
        }

        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;

        if n == 0 {
            let mid_request = !self.buffer.is_empty()
                || matches!(self.state, SessionState::AwaitingPayload(_));
            if mid_request {
                return Err(ConnectionError::UnexpectedEof);
            }
            return Err(ConnectionError::ClientDisconnected);
        }

        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "Read data");

        Ok(())
    }

    /// Queues a reply; it is flushed once the buffered input is drained.
    async fn send_response(&mut self, response: &Response) -> Result<(), ConnectionError> {
        let bytes = response.serialize();
        self.stream.write_all(&bytes).await?;
        self.stats.bytes_written(bytes.len());
        trace!(
            client = %self.addr,
            response = %response,
            bytes = bytes.len(),
            "Sent response"
        );
        Ok(())
    }
}

/// Outcome of one [`Session::advance`] call.
enum Step {
    /// The buffer holds nothing the current state can use
    NeedData,
    /// Input was consumed, possibly producing a reply
    Consumed(Option<Response>),
}

/// Removes a trailing `\r\n` or bare `\n`.
fn strip_terminator(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Errors that end a session.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Client disconnected between requests
    #[error("Client disconnected")]
    ClientDisconnected,

    /// Client disconnected mid-request
    #[error("Unexpected end of stream")]
    UnexpectedEof,

    /// A line grew past `MAX_LINE_SIZE` without a terminator
    #[error("Line length limit exceeded")]
    BufferFull,
}

/// Handles a client connection.
///
/// Runs a [`Session`] to completion. Its outcome has already been logged, so
/// nothing is propagated to the listener.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
) {
    let session = Session::new(stream, addr, command_handler, stats);
    if let Err(e) = session.run().await {
        trace!(client = %addr, error = %e, "Session ended");
    }
}
