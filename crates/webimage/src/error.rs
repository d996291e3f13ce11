use reqwest::StatusCode;

/// Classification of a download failure, detached from the error payload
/// so policy code can match on it cheaply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidUrl,
    NoConnectivity,
    UnresolvedHost,
    NotFound,
    Status,
    Timeout,
    DecodeFailure,
    FailedUrl,
    Unknown,
}

// Custom error type for download operations
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("image url is not valid: {0:?}")]
    InvalidUrl(String),

    #[error("no network connectivity")]
    NoConnectivity,

    #[error("cannot resolve destination host for {0}")]
    UnresolvedHost(String),

    #[error("server returned 404 Not Found for {0}")]
    NotFound(String),

    #[error("server returned status code {0}")]
    Status(StatusCode),

    #[error("request timed out for {0}")]
    Timeout(String),

    #[error("downloaded data does not decode into a usable image")]
    DecodeFailure,

    #[error("url is marked as permanently failed: {0}")]
    FailedUrl(String),

    #[error("download failed: {0}")]
    Unknown(String),
}

impl DownloadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DownloadError::InvalidUrl(_) => ErrorKind::InvalidUrl,
            DownloadError::NoConnectivity => ErrorKind::NoConnectivity,
            DownloadError::UnresolvedHost(_) => ErrorKind::UnresolvedHost,
            DownloadError::NotFound(_) => ErrorKind::NotFound,
            DownloadError::Status(_) => ErrorKind::Status,
            DownloadError::Timeout(_) => ErrorKind::Timeout,
            DownloadError::DecodeFailure => ErrorKind::DecodeFailure,
            DownloadError::FailedUrl(_) => ErrorKind::FailedUrl,
            DownloadError::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// Failures that will not succeed on retry within this process; these
    /// are recorded in the coordinator's negative cache.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::InvalidUrl
                | ErrorKind::NotFound
                | ErrorKind::DecodeFailure
                | ErrorKind::FailedUrl
        )
    }

    /// Classify a transport-level failure from reqwest's structured
    /// predicates rather than its message text.
    pub(crate) fn from_transport(err: reqwest::Error, url: &str) -> Self {
        if err.is_timeout() {
            DownloadError::Timeout(url.to_string())
        } else if err.is_connect() {
            DownloadError::UnresolvedHost(url.to_string())
        } else if let Some(status) = err.status() {
            Self::from_status(status, url)
        } else {
            DownloadError::Unknown(err.to_string())
        }
    }

    /// Classify a non-success HTTP status.
    pub(crate) fn from_status(status: StatusCode, url: &str) -> Self {
        if status == StatusCode::NOT_FOUND {
            DownloadError::NotFound(url.to_string())
        } else {
            DownloadError::Status(status)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_status_classifies_as_not_found() {
        let err = DownloadError::from_status(StatusCode::NOT_FOUND, "https://e.com/a.png");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.is_permanent());
    }

    #[test]
    fn other_statuses_classify_as_status() {
        let err = DownloadError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "https://e.com/a.png");
        assert_eq!(err.kind(), ErrorKind::Status);
        assert!(!err.is_permanent());
    }

    #[test]
    fn permanent_set_matches_negative_cache_policy() {
        assert!(DownloadError::InvalidUrl("x".into()).is_permanent());
        assert!(DownloadError::NotFound("x".into()).is_permanent());
        assert!(DownloadError::DecodeFailure.is_permanent());
        assert!(DownloadError::FailedUrl("x".into()).is_permanent());

        assert!(!DownloadError::NoConnectivity.is_permanent());
        assert!(!DownloadError::Timeout("x".into()).is_permanent());
        assert!(!DownloadError::UnresolvedHost("x".into()).is_permanent());
        assert!(!DownloadError::Unknown("x".into()).is_permanent());
    }
}
