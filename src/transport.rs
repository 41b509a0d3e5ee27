use async_trait::async_trait;
use std::error::Error;

/// Boxed error returned by a [`Transport`].
pub type TransportError = Box<dyn Error + Send + Sync>;

/// Status and body of a delivery response. Only the status drives
/// retries; the body is kept for error reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        TransportResponse {
            status,
            body: body.into(),
        }
    }
}

/// Asynchronous HTTP session used by the delivery queue.
///
/// Implementations carry any authentication headers themselves, so each
/// call only supplies the URL and JSON body. The queue calls `post` from
/// its background task and never on the application thread.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `body` as JSON to `url`.
    ///
    /// **Returns**
    /// - `Ok(response)` whenever the server answered, whatever the status.
    /// - `Err(..)` if no response was received (connection, TLS, etc.).
    async fn post(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<TransportResponse, TransportError>;
}

/// A transport that accepts everything without any I/O.
///
/// Useful for measuring the overhead of the layer itself.
#[derive(Clone, Default)]
pub struct NoopTransport;

#[async_trait]
impl Transport for NoopTransport {
    async fn post(
        &self,
        _url: &str,
        _body: &serde_json::Value,
    ) -> Result<TransportResponse, TransportError> {
        Ok(TransportResponse::new(204, ""))
    }
}

#[cfg(feature = "http")]
pub use self::http::ReqwestTransport;

#[cfg(feature = "http")]
mod http {
    use super::{Transport, TransportError, TransportResponse};
    use async_trait::async_trait;
    use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
    use reqwest::Client;

    /// [`Transport`] over a `reqwest` client whose default headers act as
    /// the session headers of a destination.
    #[derive(Clone, Debug)]
    pub struct ReqwestTransport {
        client: Client,
    }

    impl ReqwestTransport {
        pub fn new() -> Self {
            ReqwestTransport { client: Client::new() }
        }

        /// Build a client that sends `headers` with every request.
        pub fn with_headers<'a, I>(headers: I) -> Result<Self, TransportError>
        where
            I: IntoIterator<Item = (&'a str, &'a str)>,
        {
            let mut map = HeaderMap::new();
            for (name, value) in headers {
                map.insert(HeaderName::from_bytes(name.as_bytes())?, HeaderValue::from_str(value)?);
            }
            let client = Client::builder().default_headers(map).build()?;
            Ok(ReqwestTransport { client })
        }

        pub fn from_client(client: Client) -> Self {
            ReqwestTransport { client }
        }

        pub fn client(&self) -> &Client {
            &self.client
        }
    }

    impl Default for ReqwestTransport {
        fn default() -> Self {
            ReqwestTransport::new()
        }
    }

    #[async_trait]
    impl Transport for ReqwestTransport {
        async fn post(
            &self,
            url: &str,
            body: &serde_json::Value,
        ) -> Result<TransportResponse, TransportError> {
            let resp = self.client.post(url).json(body).send().await?;
            let status = resp.status().as_u16();
            let text = if resp.status().is_success() {
                String::new()
            } else {
                resp.text().await.unwrap_or_else(|_| "<no body>".to_string())
            };
            Ok(TransportResponse::new(status, text))
        }
    }
}
