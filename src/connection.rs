use crate::error::CaptureError;
use log::{debug, info, warn};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

/// Timeout settings for the scope TCP connection.
///
/// All timeouts have sensible defaults but can be customized for slow
/// network conditions.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Timeout for establishing the initial TCP connection
    pub connect_timeout: Duration,
    /// Timeout for reading data from the instrument
    pub read_timeout: Duration,
    /// Timeout for writing data to the instrument
    pub write_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(5),
        }
    }
}

/// Blocking byte-stream transport to the instrument.
///
/// `read` and `write` may transfer fewer bytes than requested; the
/// provided combinators loop until the full amount has been moved.
pub trait Connection {
    /// Read up to `buf.len()` bytes, blocking until at least one is available.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, CaptureError>;

    /// Write up to `buf.len()` bytes, returning how many were accepted.
    fn write(&mut self, buf: &[u8]) -> Result<usize, CaptureError>;

    /// Write the whole buffer, looping over partial writes.
    fn write_all(&mut self, mut buf: &[u8]) -> Result<(), CaptureError> {
        while !buf.is_empty() {
            let sent = self.write(buf)?;
            if sent == 0 {
                return Err(CaptureError::Io(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "connection closed while sending",
                )));
            }
            buf = &buf[sent..];
        }
        Ok(())
    }

    /// Fill the whole buffer, looping over partial reads.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), CaptureError> {
        let mut filled = 0;
        while filled < buf.len() {
            let got = self.read(&mut buf[filled..])?;
            if got == 0 {
                return Err(CaptureError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed while receiving",
                )));
            }
            filled += got;
        }
        Ok(())
    }

    /// Read bytes up to the next newline; the newline is consumed and
    /// excluded from the returned line.
    fn read_line(&mut self) -> Result<String, CaptureError> {
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            let got = self.read(&mut byte)?;
            if got == 0 {
                return Err(CaptureError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed mid-line",
                )));
            }
            if byte[0] == b'\n' {
                return Ok(String::from_utf8_lossy(&line).into_owned());
            }
            line.push(byte[0]);
        }
    }
}

/// The single concrete transport: a blocking TCP stream to the scope.
pub struct TcpConnection {
    stream: TcpStream,
}

impl TcpConnection {
    pub fn connect(address: &str, port: u16) -> Result<Self, CaptureError> {
        Self::connect_with(address, port, ConnectionConfig::default())
    }

    pub fn connect_with(
        address: &str,
        port: u16,
        config: ConnectionConfig,
    ) -> Result<Self, CaptureError> {
        let socket_addr: SocketAddr = format!("{address}:{port}")
            .parse()
            .map_err(|_| CaptureError::InvalidAddress(address.to_string()))?;

        debug!("Connecting to scope at {address}:{port}");

        let stream =
            TcpStream::connect_timeout(&socket_addr, config.connect_timeout).map_err(|e| {
                warn!("Failed to connect to {address}:{port}: {e}");
                CaptureError::Io(e)
            })?;

        stream.set_read_timeout(Some(config.read_timeout))?;
        stream.set_write_timeout(Some(config.write_timeout))?;

        info!("Connected to scope at {address}:{port}");

        Ok(TcpConnection { stream })
    }
}

impl Connection for TcpConnection {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, CaptureError> {
        Ok(self.stream.read(buf)?)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, CaptureError> {
        Ok(self.stream.write(buf)?)
    }
}

impl Drop for TcpConnection {
    fn drop(&mut self) {
        info!("Closing connection to scope");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scripted connection: hands out the preloaded bytes and records
    /// everything written, in small fragments to exercise the loops.
    struct FragmentedConnection {
        incoming: Vec<u8>,
        position: usize,
        outgoing: Vec<u8>,
    }

    impl Connection for FragmentedConnection {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize, CaptureError> {
            if self.position >= self.incoming.len() {
                return Ok(0);
            }
            // One byte at a time, the worst legal partial read.
            buf[0] = self.incoming[self.position];
            self.position += 1;
            Ok(1)
        }

        fn write(&mut self, buf: &[u8]) -> Result<usize, CaptureError> {
            let take = buf.len().min(3);
            self.outgoing.extend_from_slice(&buf[..take]);
            Ok(take)
        }
    }

    #[test]
    fn test_write_all_loops_over_partial_writes() {
        let mut conn = FragmentedConnection {
            incoming: Vec::new(),
            position: 0,
            outgoing: Vec::new(),
        };
        conn.write_all(b":WAV:SOUR CHAN1\n").unwrap();
        assert_eq!(conn.outgoing, b":WAV:SOUR CHAN1\n");
    }

    #[test]
    fn test_read_line_excludes_newline() {
        let mut conn = FragmentedConnection {
            incoming: b"STOP\nrest".to_vec(),
            position: 0,
            outgoing: Vec::new(),
        };
        assert_eq!(conn.read_line().unwrap(), "STOP");
        // The newline itself was consumed.
        assert_eq!(conn.position, 5);
    }

    #[test]
    fn test_read_exact_fills_buffer() {
        let mut conn = FragmentedConnection {
            incoming: b"abcdef".to_vec(),
            position: 0,
            outgoing: Vec::new(),
        };
        let mut buf = [0u8; 4];
        conn.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"abcd");
    }

    #[test]
    fn test_read_exact_reports_eof() {
        let mut conn = FragmentedConnection {
            incoming: b"ab".to_vec(),
            position: 0,
            outgoing: Vec::new(),
        };
        let mut buf = [0u8; 4];
        let err = conn.read_exact(&mut buf).unwrap_err();
        assert!(matches!(err, CaptureError::Io(_)));
    }
}
