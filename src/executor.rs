//! Wire protocol handling and command execution
//!
//! SCPI instruments are silent on plain commands and reply with exactly one
//! line to `?` queries, so the executor exposes two primitives: `send`,
//! which is fire-and-forget, and `query`, which writes the command and then
//! reads one line under a deadline. Received bytes are buffered so that a
//! reply arriving in fragments, or together with a following line, is
//! handled correctly.

use std::{ fmt, io, time::Duration };
use tokio::io::{ AsyncReadExt, AsyncWriteExt };
use tokio::time;

/// Response deadline applied until the caller computes a real one
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(3);

pub struct ScpiExecutor<T>
{
    io_handle: T,
    read_buf: Vec<u8>,
    response_timeout: Duration,
}

impl <T> ScpiExecutor<T>
    where T: AsyncReadExt + AsyncWriteExt + Unpin + Send
{
    pub fn with(io_handle: T) -> Self
    {
        Self {
            io_handle: io_handle,
            read_buf: Vec::with_capacity(128),
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
        }
    }

    /// Sets the deadline applied to every subsequent query
    pub fn set_response_timeout(&mut self, timeout: Duration)
    {
        self.response_timeout = timeout;
    }

    pub fn response_timeout(&self) -> Duration
    {
        self.response_timeout
    }

    /// Drops the first `n` bytes from the read buffer
    ///
    /// Drops all bytes if `n >= self.read_buf.len()`
    fn drop_first(&mut self, n: usize)
    {
        if n >= self.read_buf.len() {
            self.read_buf.clear();
        }
        else {
            // relocate any bytes after the Nth byte to index 0
            self.read_buf.rotate_left(n);
            // chop off the bytes we just consumed
            self.read_buf.truncate(self.read_buf.len() - n);
            // shrink the buffer's allocation to keep memory usage down
            self.read_buf.shrink_to(128);
        }
    }

    /// Returns the index of the first linefeed in the read buffer if any,
    /// starting the search at the suggested index.
    ///
    /// If the suggested index is out of bounds, then `None` is returned.
    fn find_line_ending(&self, start_hint: usize) -> Option<usize>
    {
        for index in start_hint..self.read_buf.len() {
            if self.read_buf[index] == 0x0A {
                return Some(index);
            }
        }

        None
    }

    /// Reads a line (series of bytes terminated by `LF` / 0x0A) into the
    /// read buffer and returns how many bytes are in the line
    async fn read_line(&mut self) -> Result<usize, io::Error>
    {
        // try to find the ending in already-buffered data first
        let mut end_index = self.find_line_ending(0);

        while end_index.is_none() {
            let mut temp_buf = [0u8; 64];
            let bytes_read = self.io_handle.read(&mut temp_buf[..]).await?;

            if bytes_read == 0 {
                // The far end hung up; whatever is buffered will never
                // become a complete line
                self.read_buf.clear();
                return Err(io::Error::from(io::ErrorKind::UnexpectedEof));
            }

            let prior_len = self.read_buf.len();
            self.read_buf.extend_from_slice(&temp_buf[..bytes_read]);
            end_index = self.find_line_ending(prior_len);
        }

        Ok(end_index.unwrap() + 1)
    }

    /// Writes the given command to the instrument
    ///
    /// SCPI commands are not acknowledged; an error here is strictly a
    /// transport failure.
    pub async fn send<C>(&mut self, cmd: C) -> Result<(), io::Error>
        where C: fmt::Display
    {
        let serialized = format!("{}\n", cmd);
        self.io_handle.write_all(serialized.as_bytes()).await?;
        self.io_handle.flush().await
    }

    /// Writes the given query command and reads back one reply line
    ///
    /// Waits at most the configured response timeout for the line to
    /// complete. On timeout the read buffer is discarded, since a
    /// half-received reply would misalign every later query, and the error
    /// kind is `TimedOut`.
    pub async fn query<C>(&mut self, cmd: C) -> Result<String, io::Error>
        where C: fmt::Display
    {
        self.send(cmd).await?;

        let response_len = match time::timeout(self.response_timeout, self.read_line()).await {
            Ok(result) => result?,
            Err(_elapsed) => {
                self.read_buf.clear();
                return Err(io::Error::from(io::ErrorKind::TimedOut));
            }
        };

        self.take_line(response_len)
    }

    /// Removes the first `len` bytes from the read buffer and returns them
    /// as a string with the line terminator stripped
    fn take_line(&mut self, len: usize) -> Result<String, io::Error>
    {
        let raw = self.read_buf[..len].to_vec();
        self.drop_first(len);

        let mut line = String::from_utf8(raw)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;

        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }

        Ok(line)
    }
}
