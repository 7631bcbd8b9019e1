use std::time::Duration;

use thiserror::Error;

/// Failures surfaced by server exchanges and page-structure lookups.
///
/// None of these are fatal: every caller leaves its state re-triable.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("could not reach the review server: {0}")]
    Transport(String),
    #[error("no response after {} seconds", .0.as_secs())]
    Timeout(Duration),
    #[error("server returned HTTP {status}: {text}")]
    Status { status: u16, text: String },
    #[error("could not decode server response: {0}")]
    Decode(String),
    #[error("{0} is missing; please report this")]
    MissingElement(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Message shown in the blocking alert overlay.
    pub fn alert_text(&self) -> String {
        match self {
            ClientError::Timeout(after) => format!(
                "Comment could not be submitted for {} seconds. Please ensure \
                 connectivity (and that the server is up) and try again.",
                after.as_secs()
            ),
            ClientError::Status { text, .. } => {
                format!("An error occurred while trying to submit the comment: {}", text)
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_alert_names_connectivity() {
        let err = ClientError::Timeout(Duration::from_secs(60));
        let text = err.alert_text();
        assert!(text.contains("60 seconds"));
        assert!(text.contains("connectivity"));
    }

    #[test]
    fn test_status_display() {
        let err = ClientError::Status {
            status: 500,
            text: "Internal Server Error".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "server returned HTTP 500: Internal Server Error"
        );
    }

    #[test]
    fn test_missing_element_asks_for_report() {
        let err = ClientError::MissingElement("snapshot new".to_string());
        assert!(err.alert_text().contains("please report"));
    }
}
