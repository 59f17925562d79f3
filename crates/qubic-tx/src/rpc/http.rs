//! HTTP gateway transport built on `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64_STANDARD};
use serde::{Deserialize, Serialize};

use super::{BroadcastAck, BroadcastTransport, ContractQueryTransport, TransportError};
use crate::{
    builder::SignedTransaction,
    config::ClientConfig,
    providers::{TickInfo, TickSource},
    query::ContractQuery,
};

/// Status endpoint path.
const TICK_INFO_PATH: &str = "/v1/tick-info";
/// Broadcast endpoint path.
const BROADCAST_PATH: &str = "/v1/broadcast-transaction";
/// Contract query endpoint path.
const QUERY_PATH: &str = "/v1/querySmartContract";

/// Gateway client implementing the tick, broadcast, and query transports.
#[derive(Debug, Clone)]
pub struct HttpRpcTransport {
    /// HTTP client used for gateway calls.
    client: reqwest::Client,
    /// Gateway base URL without a trailing slash.
    base_url: String,
}

impl HttpRpcTransport {
    /// Creates a transport with no request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Config`] when the URL is empty or client creation fails.
    pub fn new(base_url: impl Into<String>) -> Result<Self, TransportError> {
        Self::with_timeout(base_url, None)
    }

    /// Creates a transport with an optional per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Config`] when the URL is empty or client creation fails.
    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, TransportError> {
        let base_url = base_url.into().trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            return Err(TransportError::Config {
                message: "gateway base url is empty".to_owned(),
            });
        }
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|error| TransportError::Config {
            message: error.to_string(),
        })?;
        Ok(Self { client, base_url })
    }

    /// Creates a transport from client configuration.
    ///
    /// # Errors
    ///
    /// See [`Self::with_timeout`].
    pub fn from_config(config: &ClientConfig) -> Result<Self, TransportError> {
        Self::with_timeout(config.rpc_url.clone(), config.request_timeout)
    }

    /// Returns the gateway base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Joins the base URL and an endpoint path.
    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

/// `/v1/tick-info` response body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TickInfoResponse {
    /// Tick snapshot.
    tick_info: TickInfo,
}

/// `/v1/broadcast-transaction` request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BroadcastRequest<'body> {
    /// Base64 wire bytes.
    encoded_transaction: &'body str,
}

/// `/v1/broadcast-transaction` response body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BroadcastResponse {
    /// Assigned transaction id.
    transaction_id: String,
    /// Relay fan-out, when reported.
    #[serde(default)]
    peers_broadcasted: Option<u32>,
}

/// `/v1/querySmartContract` request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest {
    /// Contract index.
    contract_index: u32,
    /// Function selector.
    input_type: u16,
    /// Request data length.
    input_size: u16,
    /// Base64 request data.
    request_data: String,
}

/// `/v1/querySmartContract` response body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponseBody {
    /// Base64 response bytes; absent when the node returned nothing.
    #[serde(default)]
    response_data: Option<String>,
}

/// Maps a `reqwest` failure on `endpoint` into a network error.
fn network_error(endpoint: &'static str) -> impl Fn(reqwest::Error) -> TransportError {
    move |error| TransportError::Network {
        endpoint,
        message: error.to_string(),
    }
}

/// Canonical status text, or empty for unknown codes.
fn status_reason(status: reqwest::StatusCode) -> String {
    status.canonical_reason().unwrap_or_default().to_owned()
}

/// Returns the body of a successful read-endpoint response.
async fn success_body(
    response: reqwest::Response,
    endpoint: &'static str,
) -> Result<Vec<u8>, TransportError> {
    let status = response.status();
    if !status.is_success() {
        return Err(TransportError::Status {
            endpoint,
            status: status.as_u16(),
            reason: status_reason(status),
        });
    }
    response
        .bytes()
        .await
        .map(|body| body.to_vec())
        .map_err(network_error(endpoint))
}

/// Parses a tick status body.
fn parse_tick_info(body: &[u8]) -> Result<TickInfo, TransportError> {
    serde_json::from_slice::<TickInfoResponse>(body)
        .map(|response| response.tick_info)
        .map_err(|error| TransportError::MalformedResponse {
            endpoint: TICK_INFO_PATH,
            message: error.to_string(),
        })
}

/// Parses a broadcast acknowledgement body.
fn parse_broadcast_ack(body: &[u8]) -> Result<BroadcastAck, TransportError> {
    let response = serde_json::from_slice::<BroadcastResponse>(body).map_err(|error| {
        TransportError::MalformedResponse {
            endpoint: BROADCAST_PATH,
            message: error.to_string(),
        }
    })?;
    if response.transaction_id.is_empty() {
        return Err(TransportError::MalformedResponse {
            endpoint: BROADCAST_PATH,
            message: "transactionId is empty".to_owned(),
        });
    }
    Ok(BroadcastAck {
        transaction_id: response.transaction_id,
        peers_broadcasted: response.peers_broadcasted,
    })
}

/// Parses a contract query body into raw response bytes.
fn parse_query_response(body: &[u8]) -> Result<Vec<u8>, TransportError> {
    let response = serde_json::from_slice::<QueryResponseBody>(body).map_err(|error| {
        TransportError::MalformedResponse {
            endpoint: QUERY_PATH,
            message: error.to_string(),
        }
    })?;
    let encoded = response
        .response_data
        .ok_or(TransportError::MissingResponseData)?;
    BASE64_STANDARD
        .decode(encoded.as_bytes())
        .map_err(|error| TransportError::MalformedResponse {
            endpoint: QUERY_PATH,
            message: format!("responseData is not valid base64: {error}"),
        })
}

/// Builds the query request body.
fn query_request(query: &ContractQuery) -> QueryRequest {
    QueryRequest {
        contract_index: query.contract_index(),
        input_type: query.input_type(),
        input_size: query.input_size(),
        request_data: BASE64_STANDARD.encode(query.request_data()),
    }
}

#[async_trait]
impl TickSource for HttpRpcTransport {
    async fn tick_info(&self) -> Result<TickInfo, TransportError> {
        tracing::debug!(endpoint = TICK_INFO_PATH, "reading tick info");
        let response = self
            .client
            .get(self.url(TICK_INFO_PATH))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(network_error(TICK_INFO_PATH))?;
        let body = success_body(response, TICK_INFO_PATH).await?;
        parse_tick_info(&body)
    }
}

#[async_trait]
impl BroadcastTransport for HttpRpcTransport {
    async fn broadcast(&self, tx: &SignedTransaction) -> Result<BroadcastAck, TransportError> {
        let encoded_transaction = BASE64_STANDARD.encode(tx.as_bytes());
        tracing::debug!(
            endpoint = BROADCAST_PATH,
            tick = tx.tick(),
            size = tx.as_bytes().len(),
            "broadcasting transaction"
        );
        let response = self
            .client
            .post(self.url(BROADCAST_PATH))
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&BroadcastRequest {
                encoded_transaction: &encoded_transaction,
            })
            .send()
            .await
            .map_err(network_error(BROADCAST_PATH))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Rejected {
                status: status.as_u16(),
                reason: status_reason(status),
                body,
            });
        }
        let body = response
            .bytes()
            .await
            .map_err(network_error(BROADCAST_PATH))?;
        parse_broadcast_ack(&body)
    }
}

#[async_trait]
impl ContractQueryTransport for HttpRpcTransport {
    async fn query_contract(&self, query: &ContractQuery) -> Result<Vec<u8>, TransportError> {
        tracing::debug!(
            endpoint = QUERY_PATH,
            contract_index = query.contract_index(),
            input_type = query.input_type(),
            "querying contract"
        );
        let response = self
            .client
            .post(self.url(QUERY_PATH))
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&query_request(query))
            .send()
            .await
            .map_err(network_error(QUERY_PATH))?;
        let body = success_body(response, QUERY_PATH).await?;
        parse_query_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use tokio::{
        io::{AsyncReadExt as _, AsyncWriteExt as _},
        net::TcpListener,
    };

    use super::*;
    use crate::{
        builder::TxBuilder,
        error::ErrorKind,
        identity::{Identity, SEED_LEN, Seed},
        signing::{SeedSigner, TransactionSigner as _},
    };

    /// True once the headers and the declared body have arrived.
    fn request_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..header_end]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                if name.eq_ignore_ascii_case("content-length") {
                    value.trim().parse::<usize>().ok()
                } else {
                    None
                }
            })
            .unwrap_or(0);
        request.len() >= header_end + 4 + content_length
    }

    /// Serves one canned HTTP/1.1 response and returns the base URL.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let address = listener.local_addr().expect("local address");
        tokio::spawn(async move {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let mut request = Vec::new();
            let mut buffer = [0_u8; 1024];
            while !request_complete(&request) {
                match stream.read(&mut buffer).await {
                    Ok(0) | Err(_) => break,
                    Ok(read) => request.extend_from_slice(&buffer[..read]),
                }
            }
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        });
        format!("http://{address}")
    }

    fn signed_transaction() -> SignedTransaction {
        let seed: Seed = "h".repeat(SEED_LEN).parse().expect("seed");
        TxBuilder::new(SeedSigner::from_seed(&seed).identity())
            .destination(Identity::contract(12))
            .tick(5)
            .build_with_seed(&seed)
            .expect("build")
    }

    #[tokio::test]
    async fn broadcast_error_status_keeps_reason_and_body() {
        let url = serve_once("500 Internal Server Error", "boom").await;
        let transport = HttpRpcTransport::new(url).expect("transport");

        let result = transport.broadcast(&signed_transaction()).await;
        assert_eq!(
            result,
            Err(TransportError::Rejected {
                status: 500,
                reason: "Internal Server Error".to_owned(),
                body: "boom".to_owned(),
            })
        );
        assert_eq!(
            result.map_err(|error| error.kind()).err(),
            Some(ErrorKind::Rejected)
        );
    }

    #[tokio::test]
    async fn broadcast_success_returns_gateway_ack() {
        let url = serve_once(
            "200 OK",
            r#"{"peersBroadcasted":4,"transactionId":"gatewayid"}"#,
        )
        .await;
        let transport = HttpRpcTransport::new(url).expect("transport");

        let result = transport.broadcast(&signed_transaction()).await;
        assert!(result.is_ok());
        if let Ok(ack) = result {
            assert_eq!(ack.transaction_id, "gatewayid");
            assert_eq!(ack.peers_broadcasted, Some(4));
        }
    }

    #[tokio::test]
    async fn tick_info_error_status_is_a_network_failure() {
        let url = serve_once("503 Service Unavailable", "down").await;
        let transport = HttpRpcTransport::new(url).expect("transport");

        let result = transport.tick_info().await;
        assert_eq!(
            result,
            Err(TransportError::Status {
                endpoint: TICK_INFO_PATH,
                status: 503,
                reason: "Service Unavailable".to_owned(),
            })
        );
        assert_eq!(
            result.map_err(|error| error.kind()).err(),
            Some(ErrorKind::Network)
        );
    }

    #[tokio::test]
    async fn tick_info_reads_nested_tick_over_http() {
        let url = serve_once("200 OK", r#"{"tickInfo":{"tick":1000}}"#).await;
        let transport = HttpRpcTransport::new(url).expect("transport");

        assert_eq!(transport.tick_info().await, Ok(TickInfo::at(1_000)));
    }

    #[tokio::test]
    async fn query_error_status_is_a_network_failure() {
        let url = serve_once("404 Not Found", "").await;
        let transport = HttpRpcTransport::new(url).expect("transport");
        let query = ContractQuery::new(12, 1, Vec::new()).expect("query");

        let result = transport.query_contract(&query).await;
        assert_eq!(
            result.map_err(|error| error.kind()).err(),
            Some(ErrorKind::Network)
        );
    }

    #[tokio::test]
    async fn query_success_decodes_response_data() {
        let url = serve_once("200 OK", r#"{"responseData":"BQAAAAAAAAA="}"#).await;
        let transport = HttpRpcTransport::new(url).expect("transport");
        let query = ContractQuery::new(12, 1, Vec::new()).expect("query");

        assert_eq!(
            transport.query_contract(&query).await,
            Ok(vec![5, 0, 0, 0, 0, 0, 0, 0])
        );
    }

    #[test]
    fn tick_info_parses_nested_tick() {
        let info = parse_tick_info(br#"{"tickInfo":{"tick":1000}}"#).expect("parse");
        assert_eq!(info, TickInfo::at(1_000));

        let full = parse_tick_info(
            br#"{"tickInfo":{"tick":17,"duration":2,"epoch":150,"initialTick":10}}"#,
        )
        .expect("parse");
        assert_eq!(full.epoch, Some(150));
        assert_eq!(full.initial_tick, Some(10));
    }

    #[test]
    fn tick_info_rejects_missing_or_negative_tick() {
        for body in [
            &br#"{"tickInfo":{}}"#[..],
            br#"{"tick":5}"#,
            br#"{"tickInfo":{"tick":-1}}"#,
            br#"{"tickInfo":{"tick":"12"}}"#,
            b"not json",
        ] {
            let error = parse_tick_info(body).expect_err("must fail");
            assert_eq!(error.kind(), ErrorKind::MalformedResponse);
        }
    }

    #[test]
    fn broadcast_ack_requires_transaction_id() {
        let ack = parse_broadcast_ack(br#"{"peersBroadcasted":3,"transactionId":"abc"}"#)
            .expect("parse");
        assert_eq!(ack.transaction_id, "abc");
        assert_eq!(ack.peers_broadcasted, Some(3));

        for body in [&br#"{"peersBroadcasted":3}"#[..], br#"{"transactionId":""}"#] {
            let error = parse_broadcast_ack(body).expect_err("must fail");
            assert_eq!(error.kind(), ErrorKind::MalformedResponse);
        }
    }

    #[test]
    fn query_response_distinguishes_absent_from_empty() {
        assert_eq!(
            parse_query_response(br#"{}"#),
            Err(TransportError::MissingResponseData)
        );
        assert_eq!(
            parse_query_response(br#"{"responseData":null}"#),
            Err(TransportError::MissingResponseData)
        );
        assert_eq!(parse_query_response(br#"{"responseData":""}"#), Ok(Vec::new()));
        assert_eq!(
            parse_query_response(br#"{"responseData":"BQAAAAAAAAA="}"#),
            Ok(vec![5, 0, 0, 0, 0, 0, 0, 0])
        );
        let error = parse_query_response(br#"{"responseData":"%%%"}"#).expect_err("bad b64");
        assert_eq!(error.kind(), ErrorKind::MalformedResponse);
    }

    #[test]
    fn query_request_uses_gateway_field_names() {
        let query = ContractQuery::new(12, 3, vec![1, 2]).expect("query");
        let json = serde_json::to_value(query_request(&query)).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "contractIndex": 12,
                "inputType": 3,
                "inputSize": 2,
                "requestData": "AQI=",
            })
        );
    }

    #[test]
    fn broadcast_request_uses_gateway_field_name() {
        let json = serde_json::to_value(BroadcastRequest {
            encoded_transaction: "AAEC",
        })
        .expect("serialize");
        assert_eq!(json, serde_json::json!({ "encodedTransaction": "AAEC" }));
    }

    #[test]
    fn base_url_is_normalized() {
        let transport = HttpRpcTransport::new("http://127.0.0.1:8080/").expect("transport");
        assert_eq!(transport.base_url(), "http://127.0.0.1:8080");
        assert_eq!(
            transport.url(TICK_INFO_PATH),
            "http://127.0.0.1:8080/v1/tick-info"
        );
        assert!(matches!(
            HttpRpcTransport::new(""),
            Err(TransportError::Config { .. })
        ));
    }
}
