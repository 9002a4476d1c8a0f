use std::fmt;

use url::Url;

use crate::error::{Result, TransportError};

/// Well-known path the realtime channel is served on.
pub const DEFAULT_CHANNEL_PATH: &str = "/ws";

/// A validated `ws://` or `wss://` channel endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: Url,
}

impl Endpoint {
    /// Parse an explicit WebSocket URL.
    pub fn parse(input: &str) -> Result<Self> {
        let url = Url::parse(input.trim()).map_err(|err| invalid(input, err.to_string()))?;
        match url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(invalid(
                    input,
                    format!("unsupported scheme '{other}' (expected ws or wss)"),
                ))
            }
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(invalid(input, "missing host".to_string()));
        }
        Ok(Self { url })
    }

    /// Resolve the channel endpoint from a page origin.
    ///
    /// `https://` origins map to `wss://`, `http://` origins to `ws://`, and the
    /// path is replaced with [`DEFAULT_CHANNEL_PATH`].
    pub fn from_origin(origin: &str) -> Result<Self> {
        Self::from_origin_with_path(origin, DEFAULT_CHANNEL_PATH)
    }

    /// Resolve the channel endpoint from a page origin with an explicit path.
    pub fn from_origin_with_path(origin: &str, path: &str) -> Result<Self> {
        let mut url = Url::parse(origin.trim()).map_err(|err| invalid(origin, err.to_string()))?;

        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            "http" | "ws" => "ws",
            other => {
                return Err(invalid(
                    origin,
                    format!("unsupported origin scheme '{other}'"),
                ))
            }
        };

        // Url refuses scheme changes between special and non-special schemes,
        // so rebuild from the authority instead of calling set_scheme.
        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| invalid(origin, "missing host".to_string()))?
            .to_string();
        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host,
        };
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };

        url = Url::parse(&format!("{scheme}://{authority}{path}"))
            .map_err(|err| invalid(origin, err.to_string()))?;
        Ok(Self { url })
    }

    /// Whether the endpoint uses TLS (`wss`).
    pub fn is_secure(&self) -> bool {
        self.url.scheme() == "wss"
    }

    /// The endpoint as a string.
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// The parsed URL.
    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

impl std::str::FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn invalid(endpoint: &str, reason: String) -> TransportError {
    TransportError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secure_origin_maps_to_wss() {
        let endpoint = Endpoint::from_origin("https://app.signo.in").unwrap();
        assert_eq!(endpoint.as_str(), "wss://app.signo.in/ws");
        assert!(endpoint.is_secure());
    }

    #[test]
    fn insecure_origin_keeps_port() {
        let endpoint = Endpoint::from_origin("http://localhost:5000/dashboard?tab=1#top").unwrap();
        assert_eq!(endpoint.as_str(), "ws://localhost:5000/ws");
        assert!(!endpoint.is_secure());
    }

    #[test]
    fn custom_path_is_normalized() {
        let endpoint = Endpoint::from_origin_with_path("http://localhost:5000", "realtime").unwrap();
        assert_eq!(endpoint.as_str(), "ws://localhost:5000/realtime");
    }

    #[test]
    fn parse_accepts_ws_urls() {
        let endpoint: Endpoint = "ws://127.0.0.1:9000/ws".parse().unwrap();
        assert_eq!(endpoint.url().port(), Some(9000));
    }

    #[test]
    fn parse_rejects_other_schemes() {
        assert!(matches!(
            Endpoint::parse("http://example.com/ws"),
            Err(TransportError::InvalidEndpoint { .. })
        ));
        assert!(Endpoint::parse("not a url").is_err());
    }

    #[test]
    fn origin_rejects_unknown_scheme() {
        assert!(Endpoint::from_origin("ftp://example.com").is_err());
        assert!(Endpoint::from_origin("file:///tmp/index.html").is_err());
    }
}
