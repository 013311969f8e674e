use thiserror::Error;

/// Failure of a single page-level (or detail-level) operation.
///
/// Every variant is terminal for the worker chunk that hit it but never for
/// the run as a whole; records collected before the failure are kept.
#[derive(Debug, Error)]
pub enum HarvestError {
    /// Transport failure: DNS, connect, timeout, body read.
    #[error("network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("http status {status} from {url}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },
    /// The site served its generic placeholder page instead of content.
    #[error("session blocked: page title is '{title}', need to log in ({url})")]
    Session { url: String, title: String },
    #[error("no discussion anchors matched on {url}")]
    NoMatch { url: String },
    #[error("cannot convert {field} from '{text}': {message}")]
    FieldConversion {
        field: &'static str,
        text: String,
        message: String,
    },
    /// A required anchor is missing from a detail page.
    #[error("missing '{selector}' on detail page {url}")]
    Parse { url: String, selector: String },
    #[error("listing layout mismatch: {0}")]
    Schema(String),
    #[error("cancelled before {url} was fetched")]
    Cancelled { url: String },
}

impl HarvestError {
    /// Message with the per-request detail (URL) stripped so that the same
    /// systemic fault on different pages groups under one key.
    #[must_use]
    pub fn summary_key(&self) -> String {
        match self {
            Self::Network { source, .. } => format!("network error: {source}"),
            Self::HttpStatus { status, .. } => format!("http status {status}"),
            Self::Session { title, .. } => {
                format!("session blocked: page title is '{title}', need to log in")
            }
            Self::NoMatch { .. } => "no discussion anchors matched".to_string(),
            Self::Parse { selector, .. } => format!("missing '{selector}' on detail page"),
            Self::Cancelled { .. } => "cancelled".to_string(),
            Self::FieldConversion { .. } | Self::Schema(_) => self.to_string(),
        }
    }

    pub(crate) fn conversion(field: &'static str, text: &str, message: impl ToString) -> Self {
        Self::FieldConversion {
            field,
            text: text.to_string(),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_key_drops_url() {
        let a = HarvestError::HttpStatus {
            url: "https://example.com/a".to_string(),
            status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
        };
        let b = HarvestError::HttpStatus {
            url: "https://example.com/b".to_string(),
            status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
        };
        assert_ne!(a.to_string(), b.to_string());
        assert_eq!(a.summary_key(), b.summary_key());
        assert_eq!(a.summary_key(), "http status 503 Service Unavailable");
    }

    #[test]
    fn test_conversion_message() {
        let err = HarvestError::conversion("reply count", "abc", "invalid digit found in string");
        assert_eq!(
            err.to_string(),
            "cannot convert reply count from 'abc': invalid digit found in string"
        );
    }
}
