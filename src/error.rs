use thiserror::Error;

/// failure of a backend fetch
///
/// the `Display` text is what the dashboard shows inline; nothing here is fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Failed to fetch {resource}: {status}")]
    HttpStatus { resource: &'static str, status: u16 },

    #[error("Failed to load {resource}: {reason}")]
    Transport { resource: &'static str, reason: String },

    #[error("Failed to load {resource}: request timed out")]
    Timeout { resource: &'static str },

    #[error("Failed to decode {resource}: {reason}")]
    Decode { resource: &'static str, reason: String },
}

impl FetchError {
    /// map a reqwest failure onto the transport/timeout kinds
    pub(crate) fn from_reqwest(resource: &'static str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout { resource }
        } else if let Some(status) = err.status() {
            FetchError::HttpStatus { resource, status: status.as_u16() }
        } else {
            FetchError::Transport { resource, reason: err.to_string() }
        }
    }
}
