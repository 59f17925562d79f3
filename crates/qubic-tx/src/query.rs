//! Read-only smart contract queries.

use std::sync::Arc;

use thiserror::Error;

use crate::{
    codec::{
        CodecError, DecodedValue, MAX_INPUT_SIZE, Payload, QueryResponse, ResponseShape,
        decode_query_response, decode_response,
    },
    config::ClientConfig,
    error::ErrorKind,
    rpc::{ContractQueryTransport, HttpRpcTransport, TransportError},
};

/// Query-layer errors.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum QueryError {
    /// Declared input size differs from the request data length.
    #[error("input size {declared} does not match request data length {actual}")]
    InputSizeMismatch {
        /// Declared input size.
        declared: usize,
        /// Actual request data length.
        actual: usize,
    },
    /// Request data exceeds [`MAX_INPUT_SIZE`].
    #[error("request data of {len} bytes exceeds maximum input size {MAX_INPUT_SIZE}")]
    RequestTooLarge {
        /// Request data length.
        len: usize,
    },
    /// Request arguments could not be encoded.
    #[error("failed to encode query request: {source}")]
    Encode {
        /// Codec failure.
        source: CodecError,
    },
    /// Transport failure, including a missing `responseData` field.
    #[error("contract query failed: {source}")]
    Transport {
        /// Transport error.
        source: TransportError,
    },
    /// Typed decoder read past its own declared minimum size.
    #[error("failed to decode query response: {source}")]
    Decode {
        /// Codec failure.
        source: CodecError,
    },
}

impl QueryError {
    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InputSizeMismatch { .. } | Self::RequestTooLarge { .. } => ErrorKind::Validation,
            Self::Encode { .. } => ErrorKind::Encoding,
            Self::Transport { source } => source.kind(),
            Self::Decode { .. } => ErrorKind::MalformedResponse,
        }
    }

    /// Returns true when the node answered without any response data.
    #[must_use]
    pub const fn is_missing_response_data(&self) -> bool {
        matches!(
            self,
            Self::Transport {
                source: TransportError::MissingResponseData
            }
        )
    }
}

/// One read-only contract query.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ContractQuery {
    /// Contract index.
    contract_index: u32,
    /// Function selector.
    input_type: u16,
    /// Request arguments.
    request_data: Vec<u8>,
}

impl ContractQuery {
    /// Creates a query; the input size is the request data length.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::RequestTooLarge`] above [`MAX_INPUT_SIZE`].
    pub fn new(
        contract_index: u32,
        input_type: u16,
        request_data: Vec<u8>,
    ) -> Result<Self, QueryError> {
        if request_data.len() > MAX_INPUT_SIZE {
            return Err(QueryError::RequestTooLarge {
                len: request_data.len(),
            });
        }
        Ok(Self {
            contract_index,
            input_type,
            request_data,
        })
    }

    /// Creates a query with an explicitly declared input size.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InputSizeMismatch`] when `input_size` differs from the data length.
    pub fn with_input_size(
        contract_index: u32,
        input_type: u16,
        input_size: usize,
        request_data: Vec<u8>,
    ) -> Result<Self, QueryError> {
        if input_size != request_data.len() {
            return Err(QueryError::InputSizeMismatch {
                declared: input_size,
                actual: request_data.len(),
            });
        }
        Self::new(contract_index, input_type, request_data)
    }

    /// Contract index.
    #[must_use]
    pub const fn contract_index(&self) -> u32 {
        self.contract_index
    }

    /// Function selector.
    #[must_use]
    pub const fn input_type(&self) -> u16 {
        self.input_type
    }

    /// Request data length.
    #[must_use]
    pub fn input_size(&self) -> u16 {
        u16::try_from(self.request_data.len()).unwrap_or(u16::MAX)
    }

    /// Request arguments.
    #[must_use]
    pub fn request_data(&self) -> &[u8] {
        &self.request_data
    }
}

/// A read-only contract function with a typed response.
pub trait ContractFunction {
    /// Contract the function belongs to.
    const CONTRACT_INDEX: u32;
    /// Function selector.
    const INPUT_TYPE: u16;
    /// Decoded response type.
    type Response: QueryResponse;

    /// Encodes request arguments; most functions take none.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] when the arguments do not fit their ABI.
    fn encode_request(&self) -> Result<Payload, CodecError> {
        Ok(Payload::empty())
    }
}

/// Client issuing read-only queries and decoding their responses.
#[derive(Clone)]
pub struct ContractQueryClient {
    /// Query transport.
    transport: Arc<dyn ContractQueryTransport>,
}

impl ContractQueryClient {
    /// Creates a client over a query transport.
    #[must_use]
    pub fn new(transport: Arc<dyn ContractQueryTransport>) -> Self {
        Self { transport }
    }

    /// Creates a client backed by the HTTP gateway named in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Config`] when the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self, TransportError> {
        Ok(Self::new(Arc::new(HttpRpcTransport::from_config(config)?)))
    }

    /// Runs a query and returns the raw response bytes.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Transport`] on transport failure or missing response data.
    pub async fn query_raw(&self, query: &ContractQuery) -> Result<Vec<u8>, QueryError> {
        self.transport
            .query_contract(query)
            .await
            .map_err(|source| QueryError::Transport { source })
    }

    /// Runs a query and decodes the response positionally.
    ///
    /// A response shorter than `shape` decodes to the all-zero default rather than an error.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] for an inconsistent request or a transport failure.
    pub async fn query(
        &self,
        contract_index: u32,
        input_type: u16,
        input_size: usize,
        request_data: &[u8],
        shape: &ResponseShape,
    ) -> Result<DecodedValue, QueryError> {
        let query = ContractQuery::with_input_size(
            contract_index,
            input_type,
            input_size,
            request_data.to_vec(),
        )?;
        let raw = self.query_raw(&query).await?;
        let decoded = decode_query_response(&raw, shape);
        if decoded.is_default() {
            tracing::debug!(
                contract_index,
                input_type,
                received = raw.len(),
                required = shape.min_size(),
                "short contract response; using default value"
            );
        }
        Ok(decoded)
    }

    /// Same as [`Self::query`], treating an absent `responseData` as the shape's default.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] for every failure other than missing response data.
    pub async fn query_or_default(
        &self,
        contract_index: u32,
        input_type: u16,
        input_size: usize,
        request_data: &[u8],
        shape: &ResponseShape,
    ) -> Result<DecodedValue, QueryError> {
        match self
            .query(contract_index, input_type, input_size, request_data, shape)
            .await
        {
            Err(error) if error.is_missing_response_data() => {
                tracing::debug!(
                    contract_index,
                    input_type,
                    "contract returned no response data; using default value"
                );
                Ok(shape.default_value())
            }
            other => other,
        }
    }

    /// Runs a query and decodes a typed response, defaulting on short buffers.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] on transport or decoder failure.
    pub async fn query_typed<R: QueryResponse>(
        &self,
        query: &ContractQuery,
    ) -> Result<R, QueryError> {
        let raw = self.query_raw(query).await?;
        decode_response::<R>(&raw).map_err(|source| QueryError::Decode { source })
    }

    /// Calls a typed contract function.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] on encoding, transport, or decoder failure.
    pub async fn call<F: ContractFunction + Sync>(
        &self,
        function: &F,
    ) -> Result<F::Response, QueryError> {
        let request = function
            .encode_request()
            .map_err(|source| QueryError::Encode { source })?;
        let query = ContractQuery::new(F::CONTRACT_INDEX, F::INPUT_TYPE, request.into_bytes())?;
        self.query_typed(&query).await
    }

    /// Calls a typed contract function, treating an absent `responseData` as "not yet
    /// populated" and returning the response default.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] for every failure other than missing response data.
    pub async fn call_or_default<F: ContractFunction + Sync>(
        &self,
        function: &F,
    ) -> Result<F::Response, QueryError> {
        match self.call(function).await {
            Err(error) if error.is_missing_response_data() => {
                tracing::debug!(
                    contract_index = F::CONTRACT_INDEX,
                    input_type = F::INPUT_TYPE,
                    "contract returned no response data; using default value"
                );
                Ok(F::Response::default())
            }
            other => other,
        }
    }
}

impl std::fmt::Debug for ContractQueryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractQueryClient").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::codec::{FieldKind, PayloadReader};

    /// Mock query transport with a configurable response.
    #[derive(Debug)]
    struct MockQueryTransport {
        /// Return value to use.
        result: Result<Vec<u8>, TransportError>,
        /// Queries seen so far.
        seen: Mutex<Vec<ContractQuery>>,
    }

    impl MockQueryTransport {
        fn returning(result: Result<Vec<u8>, TransportError>) -> Arc<Self> {
            Arc::new(Self {
                result,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.seen.lock().map(|seen| seen.len()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl ContractQueryTransport for MockQueryTransport {
        async fn query_contract(
            &self,
            query: &ContractQuery,
        ) -> Result<Vec<u8>, TransportError> {
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(query.clone());
            }
            self.result.clone()
        }
    }

    #[derive(Debug, Default, Eq, PartialEq)]
    struct Counter(u64);

    impl QueryResponse for Counter {
        const MIN_SIZE: usize = 8;

        fn decode_fields(reader: &mut PayloadReader<'_>) -> Result<Self, CodecError> {
            reader.read_u64().map(Self)
        }
    }

    struct ReadCounter;

    impl ContractFunction for ReadCounter {
        const CONTRACT_INDEX: u32 = 12;
        const INPUT_TYPE: u16 = 3;
        type Response = Counter;
    }

    #[tokio::test]
    async fn short_response_decodes_to_zero() {
        let transport = MockQueryTransport::returning(Ok(vec![1, 2, 3]));
        let client = ContractQueryClient::new(transport.clone());

        let decoded = client
            .query(12, 3, 0, &[], &ResponseShape::single_u64())
            .await;
        assert!(decoded.is_ok());
        if let Ok(decoded) = decoded {
            assert!(decoded.is_default());
            assert_eq!(decoded.u64_at(0), Some(0));
        }
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn sixteen_byte_response_reads_first_word() {
        let mut raw = 0x1122_3344_5566_7788_u64.to_le_bytes().to_vec();
        raw.extend_from_slice(&u64::MAX.to_le_bytes());
        let client = ContractQueryClient::new(MockQueryTransport::returning(Ok(raw)));

        let decoded = client
            .query(12, 3, 0, &[], &ResponseShape::new().field(FieldKind::U64))
            .await
            .expect("query");
        assert_eq!(decoded.u64_at(0), Some(0x1122_3344_5566_7788));
    }

    #[tokio::test]
    async fn mismatched_input_size_fails_before_transport() {
        let transport = MockQueryTransport::returning(Ok(Vec::new()));
        let client = ContractQueryClient::new(transport.clone());

        let result = client
            .query(12, 3, 4, &[1, 2], &ResponseShape::single_u64())
            .await;
        assert_eq!(
            result.map_err(|error| error.kind()).err(),
            Some(ErrorKind::Validation)
        );
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn missing_response_data_is_distinct_error() {
        let client = ContractQueryClient::new(MockQueryTransport::returning(Err(
            TransportError::MissingResponseData,
        )));
        let error = client.call(&ReadCounter).await.expect_err("must fail");
        assert!(error.is_missing_response_data());
        assert_eq!(error.kind(), ErrorKind::MissingResponseData);

        assert_eq!(client.call_or_default(&ReadCounter).await, Ok(Counter(0)));

        let shape = ResponseShape::single_u64();
        let decoded = client.query_or_default(12, 3, 0, &[], &shape).await;
        assert_eq!(decoded, Ok(shape.default_value()));
    }

    #[tokio::test]
    async fn network_errors_are_not_defaulted() {
        let client = ContractQueryClient::new(MockQueryTransport::returning(Err(
            TransportError::Status {
                endpoint: "/v1/querySmartContract",
                status: 502,
                reason: "Bad Gateway".to_owned(),
            },
        )));
        let error = client
            .call_or_default(&ReadCounter)
            .await
            .expect_err("must fail");
        assert_eq!(error.kind(), ErrorKind::Network);
    }

    #[tokio::test]
    async fn typed_call_sends_function_selector() {
        let transport = MockQueryTransport::returning(Ok(7_u64.to_le_bytes().to_vec()));
        let client = ContractQueryClient::new(transport.clone());

        assert_eq!(client.call(&ReadCounter).await, Ok(Counter(7)));
        let seen = transport.seen.lock().map(|seen| seen.clone()).unwrap_or_default();
        assert_eq!(seen, vec![ContractQuery::new(12, 3, Vec::new()).expect("query")]);
    }
}
