pub use client::{Client, ClientError, Method, Response, StatusCode};
pub use reqwest::header;
pub use uri::{InvalidUriError, Uri};

mod uri {
    use std::fmt::Display;
    use std::str::FromStr;

    use serde::{Deserialize, Serialize};
    use thiserror::Error;

    #[derive(Debug, Error)]
    #[error("invalid uri: {0}")]
    pub struct InvalidUriError(String);

    impl From<http::uri::InvalidUri> for InvalidUriError {
        fn from(value: http::uri::InvalidUri) -> Self {
            InvalidUriError(value.to_string())
        }
    }

    /// An absolute endpoint URI.
    ///
    /// Only URIs carrying both a scheme and an authority are accepted, the
    /// device API is always reached through a full `http://host/path`.
    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    pub struct Uri(http::Uri);

    impl Uri {
        pub fn from_static(src: &'static str) -> Self {
            Self(http::Uri::from_static(src))
        }

        pub fn path(&self) -> &str {
            self.0.path()
        }
    }

    impl Display for Uri {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            self.0.fmt(f)
        }
    }

    impl FromStr for Uri {
        type Err = InvalidUriError;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            let uri = http::Uri::from_str(s)?;
            if uri.scheme().is_none() || uri.authority().is_none() {
                return Err(InvalidUriError(format!(
                    "'{s}' is not an absolute uri, expected <scheme>://<host>[/path]"
                )));
            }
            Ok(Self(uri))
        }
    }

    impl TryFrom<String> for Uri {
        type Error = InvalidUriError;

        fn try_from(value: String) -> Result<Self, Self::Error> {
            value.parse()
        }
    }

    impl Serialize for Uri {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: serde::Serializer,
        {
            serializer.serialize_str(&self.to_string())
        }
    }

    impl<'de> Deserialize<'de> for Uri {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: serde::Deserializer<'de>,
        {
            let s = String::deserialize(deserializer)?;
            s.parse().map_err(serde::de::Error::custom)
        }
    }
}

mod client {
    use std::time::Duration;

    use reqwest::RequestBuilder;

    use super::uri::Uri;

    pub type Method = reqwest::Method;
    pub type StatusCode = reqwest::StatusCode;

    #[derive(Debug, thiserror::Error)]
    pub enum ClientError {
        #[error("failed to build client: {0}")]
        Build(reqwest::Error),

        #[error("failed to build request: {0}")]
        Request(String),

        #[error(transparent)]
        Client(reqwest::Error),

        #[error(transparent)]
        Server(reqwest::Error),
    }

    #[derive(Debug)]
    pub struct Response(reqwest::Response);

    impl Response {
        pub fn status(&self) -> StatusCode {
            self.0.status()
        }

        pub async fn text(self) -> Result<String, ClientError> {
            self.0.text().await.map_err(ClientError::Server)
        }
    }

    /// Thin wrapper over [reqwest::Client] carrying the timeouts every request
    /// made through it should obey.
    #[derive(Debug, Clone)]
    pub struct Client {
        client: reqwest::Client,
        timeout: Option<Duration>,
    }

    impl Default for Client {
        /// Default client with a total request timeout of 30 seconds.
        fn default() -> Self {
            Self::new(Some(Duration::from_secs(30)))
        }
    }

    impl Client {
        /// Create a client bounding each request by a total `timeout`
        pub fn new(timeout: Option<Duration>) -> Self {
            Self {
                client: reqwest::Client::new(),
                timeout,
            }
        }

        /// Create a client that bounds connection establishment and every
        /// individual read by the given durations, with no limit on the
        /// total request time.
        ///
        /// This is what a long-poll needs: the server is expected to hold the
        /// request open, so only a silent peer should trip the timeout.
        pub fn with_io_timeouts(connect: Duration, read: Duration) -> Result<Self, ClientError> {
            let client = reqwest::Client::builder()
                .connect_timeout(connect)
                .read_timeout(read)
                .build()
                .map_err(ClientError::Build)?;

            Ok(Self {
                client,
                timeout: None,
            })
        }

        /// Send a request to `uri`, letting `decorator` add headers, query
        /// parameters and body to the builder before it goes out.
        pub async fn request<D>(
            &self,
            method: Method,
            uri: &Uri,
            decorator: D,
        ) -> Result<Response, ClientError>
        where
            D: FnOnce(RequestBuilder) -> Result<RequestBuilder, ClientError>,
        {
            let mut request = self.client.request(method, uri.to_string());

            if let Some(timeout) = self.timeout {
                request = request.timeout(timeout);
            }

            request = decorator(request)?;

            Ok(Response(request.send().await.map_err(ClientError::Client)?))
        }
    }
}
