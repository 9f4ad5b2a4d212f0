//! ProXR transport client
//!
//! One `ProxrConnection` is opened per poll cycle and dropped when the
//! cycle ends, on every exit path. Commands and responses are strictly
//! sequential over the connection.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tracing::{debug, trace, warn};

use attrlink::{LinkError, Result};

/// Connection parameters for one relay board
#[derive(Debug, Clone)]
pub struct ProxrClientConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
    pub exchange_timeout: Duration,
    pub max_connect_attempts: u32,
}

impl ProxrClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: Duration::from_millis(500),
            exchange_timeout: Duration::from_millis(500),
            max_connect_attempts: 3,
        }
    }
}

/// A live TCP connection to a relay board
#[derive(Debug)]
pub struct ProxrConnection {
    stream: TcpStream,
    exchange_timeout: Duration,
}

impl ProxrConnection {
    /// Connect with a per-attempt timeout and a bounded number of retries.
    pub async fn open(config: &ProxrClientConfig) -> Result<Self> {
        let addr = format!("{}:{}", config.host, config.port);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match timeout(config.connect_timeout, TcpStream::connect(&addr)).await {
                Ok(Ok(stream)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!("TCP_NODELAY: {}", e);
                    }
                    debug!("connected: {}", addr);
                    return Ok(Self {
                        stream,
                        exchange_timeout: config.exchange_timeout,
                    });
                }
                Ok(Err(e)) => {
                    if attempt >= config.max_connect_attempts {
                        return Err(LinkError::connection(format!(
                            "failed to connect to {addr}: {e}"
                        )));
                    }
                    warn!(
                        "connect to {} failed (attempt {}/{}): {}",
                        addr, attempt, config.max_connect_attempts, e
                    );
                }
                Err(_) => {
                    if attempt >= config.max_connect_attempts {
                        return Err(LinkError::timeout(format!(
                            "connection to {addr} timed out"
                        )));
                    }
                    warn!(
                        "connect to {} timed out (attempt {}/{})",
                        addr, attempt, config.max_connect_attempts
                    );
                }
            }
            sleep(Duration::from_millis(50)).await;
        }
    }

    /// Send one frame and read a fixed-size response.
    pub async fn exchange(&mut self, frame: &[u8], response_len: usize) -> Result<Vec<u8>> {
        self.stream
            .write_all(frame)
            .await
            .map_err(|e| LinkError::io(format!("send error: {e}")))?;
        trace!("TX {} bytes", frame.len());

        let mut response = vec![0u8; response_len];
        match timeout(self.exchange_timeout, self.stream.read_exact(&mut response)).await {
            Ok(Ok(_)) => {
                trace!("RX {} bytes", response.len());
                Ok(response)
            }
            Ok(Err(e)) => Err(LinkError::io(format!("receive error: {e}"))),
            Err(_) => Err(LinkError::timeout(format!(
                "no response within {:?}",
                self.exchange_timeout
            ))),
        }
    }
}
