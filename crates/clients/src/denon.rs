//! Denon/Marantz AVR over the telnet control protocol.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::{AvrCodecSource, ClientError};

const DEFAULT_PORT: u16 = 23;
const IO_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_REPLY: usize = 256;

pub struct DenonClient {
    address: String,
}

impl DenonClient {
    pub fn new(address: &str) -> Self {
        let address = if address.contains(':') {
            address.to_string()
        } else {
            format!("{address}:{DEFAULT_PORT}")
        };
        Self { address }
    }

    /// Send one command and return the reply up to the first carriage return.
    async fn command(&self, cmd: &str) -> Result<String, ClientError> {
        let mut stream = tokio::time::timeout(IO_TIMEOUT, TcpStream::connect(&self.address))
            .await
            .map_err(|_| ClientError::Network(format!("connect to {} timed out", self.address)))?
            .map_err(|e| ClientError::Network(e.to_string()))?;

        stream
            .write_all(format!("{cmd}\r").as_bytes())
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;

        let mut reply = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            let n = tokio::time::timeout(IO_TIMEOUT, stream.read(&mut byte))
                .await
                .map_err(|_| ClientError::Network("read timed out".into()))?
                .map_err(|e| ClientError::Network(e.to_string()))?;
            if n == 0 || byte[0] == b'\r' {
                break;
            }
            reply.push(byte[0]);
            if reply.len() >= MAX_REPLY {
                return Err(ClientError::Protocol("reply too long".into()));
            }
        }

        String::from_utf8(reply).map_err(|e| ClientError::Decode(e.to_string()))
    }
}

#[async_trait]
impl AvrCodecSource for DenonClient {
    async fn surround_mode(&self) -> Result<String, ClientError> {
        let reply = self.command("MS?").await?;
        let mode = reply
            .strip_prefix("MS")
            .ok_or_else(|| ClientError::Protocol(format!("unexpected reply: {reply}")))?
            .trim()
            .to_lowercase();
        debug!(mode = %mode, "AVR surround mode");
        Ok(mode)
    }
}
