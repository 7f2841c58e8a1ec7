//! NetworkSink - UDP fire-and-forget streaming

use contracts::{ContractError, DataSink, Publication};
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{debug, error, instrument, warn};

/// Wire encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkFormat {
    #[default]
    Json,
    Bincode,
}

#[derive(Debug, Clone)]
pub struct NetworkSinkConfig {
    pub addr: SocketAddr,
    pub format: NetworkFormat,
    /// Datagrams above this size are skipped (UDP over IPv4 caps at 65507)
    pub max_packet_size: usize,
}

impl NetworkSinkConfig {
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let addr_str = params
            .get("addr")
            .ok_or_else(|| "missing 'addr' parameter".to_string())?;

        let addr: SocketAddr = addr_str
            .parse()
            .map_err(|e| format!("invalid address '{}': {}", addr_str, e))?;

        let format = match params.get("format").map(String::as_str) {
            Some("bincode") => NetworkFormat::Bincode,
            Some("json") | None => NetworkFormat::Json,
            Some(other) => return Err(format!("unknown format '{}'", other)),
        };

        let max_packet_size = match params.get("max_packet_size") {
            Some(raw) => raw
                .parse()
                .map_err(|e| format!("invalid max_packet_size '{}': {}", raw, e))?,
            None => 65000,
        };

        Ok(Self {
            addr,
            format,
            max_packet_size,
        })
    }
}

pub struct NetworkSink {
    name: String,
    config: NetworkSinkConfig,
    socket: Option<UdpSocket>,
    oversized: u64,
}

impl NetworkSink {
    #[instrument(name = "network_sink_new", skip(name, config), fields(target = %config.addr))]
    pub async fn new(name: impl Into<String>, config: NetworkSinkConfig) -> std::io::Result<Self> {
        let name = name.into();
        let bind_addr = if config.addr.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(&config.addr).await?;

        debug!(sink = %name, target = %config.addr, "NetworkSink connected");

        Ok(Self {
            name,
            config,
            socket: Some(socket),
            oversized: 0,
        })
    }

    #[instrument(name = "network_sink_from_params", skip(name, params))]
    pub async fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = NetworkSinkConfig::from_params(params)
            .map_err(|e| ContractError::sink_connection(&name, e))?;

        Self::new(name.clone(), config)
            .await
            .map_err(|e| ContractError::sink_connection(name, e.to_string()))
    }

    /// Datagrams skipped for exceeding `max_packet_size`
    pub fn oversized_count(&self) -> u64 {
        self.oversized
    }

    fn encode(&self, publication: &Publication) -> Result<Vec<u8>, ContractError> {
        match self.config.format {
            NetworkFormat::Json => serde_json::to_vec(publication)
                .map_err(|e| ContractError::sink_write(&self.name, format!("json error: {e}"))),
            NetworkFormat::Bincode => bincode::serialize(publication)
                .map_err(|e| ContractError::sink_write(&self.name, format!("bincode error: {e}"))),
        }
    }
}

impl DataSink for NetworkSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "network_sink_write",
        skip(self, publication),
        fields(sink = %self.name, kind = publication.kind())
    )]
    async fn write(&mut self, publication: &Publication) -> Result<(), ContractError> {
        let data = self.encode(publication)?;
        if data.len() > self.config.max_packet_size {
            self.oversized += 1;
            warn!(
                size = data.len(),
                max = self.config.max_packet_size,
                "Datagram too large, skipped"
            );
            return Ok(());
        }

        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| ContractError::sink_write(&self.name, "socket not connected"))?;
        match socket.send(&data).await {
            Ok(sent) => debug!(bytes = sent, "Sent"),
            // best-effort: a lost datagram is not a sink failure
            Err(e) => error!(error = %e, "UDP send failed"),
        }
        Ok(())
    }

    #[instrument(name = "network_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "network_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.socket = None;
        debug!(sink = %self.name, oversized = self.oversized, "NetworkSink closed");
        Ok(())
    }
}
