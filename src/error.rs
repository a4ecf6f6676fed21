//! Error types / 错误类型
//!
//! Every failure the search transport can produce collapses into
//! `SearchError`. Whether a failure is fatal or swallowed is decided by
//! the orchestrator from the round it happened in, not by the variant.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    /// Keyword was empty after trimming / 搜索关键词为空
    #[error("Please enter a search keyword")]
    EmptyKeyword,

    #[error("Request timed out, check the network connection")]
    Timeout,

    /// Detail is kept for logs only / 详情仅用于日志
    #[error("Network connection failed, check the network settings")]
    Network(String),

    /// Non-2xx status, or an envelope with a non-zero code / 服务器错误
    #[error("{message}")]
    Server { status: Option<u16>, message: String },

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SearchError {
    /// Build a server error, falling back to a generic message when the
    /// payload carried none.
    pub fn server(status: Option<u16>, message: Option<String>) -> Self {
        let message = match (message, status) {
            (Some(m), _) if !m.trim().is_empty() => m,
            (_, Some(code)) => format!("Server error ({})", code),
            _ => "Request failed, please try again later".to_string(),
        };
        SearchError::Server { status, message }
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SearchError::Timeout
        } else if err.is_decode() {
            SearchError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            SearchError::server(Some(status.as_u16()), None)
        } else {
            tracing::debug!("Network error: {}", err);
            SearchError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SearchError {
    fn from(err: serde_json::Error) -> Self {
        SearchError::Decode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_message_hides_transport_detail() {
        let err = SearchError::Network("error sending request for url (http://x/api/search)".to_string());
        assert_eq!(err.to_string(), "Network connection failed, check the network settings");
        assert!(format!("{:?}", err).contains("http://x/api/search"));
    }

    #[test]
    fn test_server_message_fallbacks() {
        let err = SearchError::server(Some(502), Some("upstream down".to_string()));
        assert_eq!(err.to_string(), "upstream down");

        let err = SearchError::server(Some(500), Some("  ".to_string()));
        assert_eq!(err.to_string(), "Server error (500)");

        let err = SearchError::server(None, None);
        assert_eq!(err.to_string(), "Request failed, please try again later");
    }
}
