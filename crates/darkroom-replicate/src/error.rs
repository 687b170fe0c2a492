use http::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReplicateError>;

/// Coarse category of a model call failure
///
/// Drives both the retry decision and the HTTP status reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    SafetyRejected,
    Authentication,
    RateLimited,
    Timeout,
    Network,
    UnexpectedOutput,
    Configuration,
    Upstream,
}

impl ErrorKind {
    /// Status reported to API consumers
    pub const fn status_code(self) -> StatusCode {
        match self {
            Self::SafetyRejected => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Authentication => StatusCode::UNAUTHORIZED,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Timeout => StatusCode::REQUEST_TIMEOUT,
            Self::Network => StatusCode::SERVICE_UNAVAILABLE,
            Self::UnexpectedOutput | Self::Configuration | Self::Upstream => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether waiting and trying again can help
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::Timeout | Self::Network)
    }
}

/// Lowercase needles checked in order against upstream error text
const CLASSIFIERS: &[(&str, ErrorKind)] = &[
    ("e005", ErrorKind::SafetyRejected),
    ("sensitive content", ErrorKind::SafetyRejected),
    ("flagged as sensitive", ErrorKind::SafetyRejected),
    ("image_safety", ErrorKind::SafetyRejected),
    ("safety filter", ErrorKind::SafetyRejected),
    ("nsfw", ErrorKind::SafetyRejected),
    ("unauthorized", ErrorKind::Authentication),
    ("unauthenticated", ErrorKind::Authentication),
    ("invalid token", ErrorKind::Authentication),
    ("authentication", ErrorKind::Authentication),
    ("401", ErrorKind::Authentication),
    ("rate limit", ErrorKind::RateLimited),
    ("too many requests", ErrorKind::RateLimited),
    ("throttled", ErrorKind::RateLimited),
    ("429", ErrorKind::RateLimited),
    ("timed out", ErrorKind::Timeout),
    ("timeout", ErrorKind::Timeout),
    ("etimedout", ErrorKind::Timeout),
    ("deadline exceeded", ErrorKind::Timeout),
    ("enotfound", ErrorKind::Network),
    ("getaddrinfo", ErrorKind::Network),
    ("econnrefused", ErrorKind::Network),
    ("econnreset", ErrorKind::Network),
    ("socket hang up", ErrorKind::Network),
    ("dns", ErrorKind::Network),
    ("network", ErrorKind::Network),
    ("connection", ErrorKind::Network),
];

/// Categorize free-form upstream error text
pub fn classify(message: &str) -> ErrorKind {
    let lower = message.to_ascii_lowercase();
    CLASSIFIERS
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map_or(ErrorKind::Upstream, |(_, kind)| *kind)
}

/// Model call errors
#[derive(Debug, Error)]
pub enum ReplicateError {
    /// Upstream moderation blocked the request
    #[error("Content flagged by safety filter: {0}")]
    SafetyRejected(String),

    /// Token missing, invalid or lacking permission
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Upstream rate limit hit
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// Request or prediction took too long
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// DNS, connect or transport failure
    #[error("Network error: {0}")]
    Network(String),

    /// Prediction succeeded but its output holds no recognizable image URL
    #[error("Unexpected output format: {0}")]
    UnexpectedOutput(String),

    /// No API token configured
    #[error("REPLICATE_API_TOKEN is not configured")]
    MissingToken,

    /// Any other upstream failure
    #[error("Replicate API error: {message}")]
    Upstream { status: Option<u16>, message: String },

    /// Transient failures persisted through every attempt
    #[error("Failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: Box<Self> },
}

impl ReplicateError {
    /// Build from upstream error text using the shared classifier
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        match classify(&message) {
            ErrorKind::SafetyRejected => Self::SafetyRejected(message),
            ErrorKind::Authentication => Self::AuthenticationFailed(message),
            ErrorKind::RateLimited => Self::RateLimited(message),
            ErrorKind::Timeout => Self::Timeout(message),
            ErrorKind::Network => Self::Network(message),
            ErrorKind::UnexpectedOutput | ErrorKind::Configuration | ErrorKind::Upstream => {
                Self::Upstream { status: None, message }
            }
        }
    }

    /// Build from a non-success HTTP response
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Self::AuthenticationFailed(message),
            429 => Self::RateLimited(message),
            408 | 504 => Self::Timeout(message),
            _ => match Self::from_message(message) {
                Self::Upstream { message, .. } => Self::Upstream {
                    status: Some(status),
                    message,
                },
                classified => classified,
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SafetyRejected(_) => ErrorKind::SafetyRejected,
            Self::AuthenticationFailed(_) => ErrorKind::Authentication,
            Self::RateLimited(_) => ErrorKind::RateLimited,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Network(_) => ErrorKind::Network,
            Self::UnexpectedOutput(_) => ErrorKind::UnexpectedOutput,
            Self::MissingToken => ErrorKind::Configuration,
            Self::Upstream { .. } => ErrorKind::Upstream,
            Self::Exhausted { last, .. } => last.kind(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.kind().status_code()
    }
}

impl From<reqwest::Error> for ReplicateError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(error.to_string())
        } else if error.is_decode() {
            Self::Upstream {
                status: error.status().map(|s| s.as_u16()),
                message: format!("failed to decode response: {error}"),
            }
        } else {
            Self::Network(error.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safety_markers() {
        for message in [
            "Prediction failed: E005 The input or output was flagged as sensitive",
            "Request blocked: sensitive content detected",
            "finishReason: IMAGE_SAFETY",
        ] {
            assert_eq!(classify(message), ErrorKind::SafetyRejected, "{message}");
        }
    }

    #[test]
    fn transport_markers() {
        assert_eq!(classify("getaddrinfo ENOTFOUND api.replicate.com"), ErrorKind::Network);
        assert_eq!(classify("connect ECONNREFUSED 127.0.0.1:443"), ErrorKind::Network);
        assert_eq!(classify("The operation timed out"), ErrorKind::Timeout);
        assert_eq!(classify("ETIMEDOUT"), ErrorKind::Timeout);
    }

    #[test]
    fn auth_and_rate_limit_markers() {
        assert_eq!(classify("Unauthorized: invalid token"), ErrorKind::Authentication);
        assert_eq!(classify("Too Many Requests"), ErrorKind::RateLimited);
    }

    #[test]
    fn safety_wins_over_later_rules() {
        // Mentions both a timeout and a safety rejection
        assert_eq!(classify("E005 after timeout"), ErrorKind::SafetyRejected);
    }

    #[test]
    fn unknown_is_upstream() {
        assert_eq!(classify("CUDA out of memory"), ErrorKind::Upstream);
    }

    #[test]
    fn status_mapping_table() {
        let cases = [
            (ReplicateError::SafetyRejected(String::new()), 422),
            (ReplicateError::AuthenticationFailed(String::new()), 401),
            (ReplicateError::RateLimited(String::new()), 429),
            (ReplicateError::Timeout(String::new()), 408),
            (ReplicateError::Network(String::new()), 503),
            (ReplicateError::UnexpectedOutput(String::new()), 500),
            (ReplicateError::MissingToken, 500),
            (
                ReplicateError::Upstream {
                    status: Some(502),
                    message: String::new(),
                },
                500,
            ),
        ];

        for (error, status) in cases {
            assert_eq!(error.status_code().as_u16(), status, "{error:?}");
        }
    }

    #[test]
    fn exhausted_keeps_last_kind_and_message() {
        let error = ReplicateError::Exhausted {
            attempts: 3,
            last: Box::new(ReplicateError::Timeout("read timed out".to_owned())),
        };
        assert_eq!(error.status_code(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(
            error.to_string(),
            "Failed after 3 attempts: Request timed out: read timed out"
        );
    }

    #[test]
    fn http_status_precedes_text() {
        assert_eq!(ReplicateError::from_status(401, "nope").kind(), ErrorKind::Authentication);
        assert_eq!(ReplicateError::from_status(429, "slow down").kind(), ErrorKind::RateLimited);
        assert_eq!(ReplicateError::from_status(504, "gateway").kind(), ErrorKind::Timeout);
        assert_eq!(
            ReplicateError::from_status(422, "E005 flagged").kind(),
            ErrorKind::SafetyRejected
        );

        let ReplicateError::Upstream { status, .. } = ReplicateError::from_status(500, "boom") else {
            panic!("expected upstream error");
        };
        assert_eq!(status, Some(500));
    }
}
