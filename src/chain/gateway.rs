//! JSON-RPC gateway to a node
//!
//! The pipeline only ever talks to the node through [`Gateway::invoke`]; the
//! production implementation sends requests over HTTP with a bounded timeout
//! and never retries.

use crate::error::{SpeedupError, SpeedupResult};

use async_trait::async_trait;
use ethers::providers::{Http, HttpClientError, JsonRpcClient};
#[cfg(test)]
use mockall::automock;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Request/response access to a node's JSON-RPC endpoint.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Invokes `method` with positional `params` and returns the raw `result`.
    ///
    /// A structured error object from the node becomes [`SpeedupError::Rpc`].
    async fn invoke(&self, method: &str, params: Vec<Value>) -> SpeedupResult<Value>;
}

/// Gateway over the ethers HTTP JSON-RPC client
pub struct HttpGateway {
    client: Http,
    url: String,
    timeout: Duration,
}

impl HttpGateway {
    /// Create a gateway for `url` with a per-request timeout
    pub fn new(url: &str, timeout: Duration) -> SpeedupResult<Self> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| SpeedupError::Config(format!("Invalid RPC URL {:?}: {}", url, e)))?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SpeedupError::Connectivity(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client: Http::new_with_client(parsed, http),
            url: url.to_string(),
            timeout,
        })
    }

    fn map_error(&self, method: &str, err: HttpClientError) -> SpeedupError {
        match err {
            HttpClientError::JsonRpcError(e) => SpeedupError::Rpc {
                code: e.code,
                message: e.message,
            },
            HttpClientError::ReqwestError(e) if e.is_timeout() => SpeedupError::Timeout {
                operation: format!("{} after {:?}", method, self.timeout),
            },
            other => SpeedupError::Connectivity(format!("{} to {}: {}", method, self.url, other)),
        }
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn invoke(&self, method: &str, params: Vec<Value>) -> SpeedupResult<Value> {
        debug!("RPC call {} with {} params", method, params.len());

        self.client
            .request::<_, Value>(method, params)
            .await
            .map_err(|e| self.map_error(method, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_invalid_url() {
        let result = HttpGateway::new("not a url", Duration::from_secs(5));
        assert!(matches!(result, Err(SpeedupError::Config(_))));
    }

    #[test]
    fn test_json_rpc_error_keeps_code_and_message() {
        let gateway = HttpGateway::new("http://localhost:8545", Duration::from_secs(5)).unwrap();
        let err = gateway.map_error(
            "eth_sendRawTransaction",
            HttpClientError::JsonRpcError(ethers::providers::JsonRpcError {
                code: -32000,
                message: "nonce too low".to_string(),
                data: None,
            }),
        );

        match err {
            SpeedupError::Rpc { code, message } => {
                assert_eq!(code, -32000);
                assert_eq!(message, "nonce too low");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_node_is_connectivity_error() {
        // Port 9 (discard) is closed on test hosts; the connect fails fast.
        let gateway = HttpGateway::new("http://127.0.0.1:9", Duration::from_secs(5)).unwrap();
        let err = gateway.invoke("net_version", vec![]).await.unwrap_err();
        assert!(matches!(
            err,
            SpeedupError::Connectivity(_) | SpeedupError::Timeout { .. }
        ));
    }

    #[tokio::test]
    async fn test_silent_node_times_out() {
        // Accepts connections and holds them open without ever answering
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let timeout = Duration::from_millis(500);
        let gateway = HttpGateway::new(&format!("http://{}", addr), timeout).unwrap();

        let started = std::time::Instant::now();
        let err = gateway.invoke("net_version", vec![]).await.unwrap_err();
        let elapsed = started.elapsed();
        server.abort();

        match err {
            SpeedupError::Timeout { operation } => assert!(operation.starts_with("net_version")),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(elapsed >= timeout);
        assert!(elapsed < Duration::from_secs(10));
    }
}
