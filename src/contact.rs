use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

const SENT_MESSAGE: &str = "Message sent successfully";
const FAILED_MESSAGE: &str = "Failed to send message";

#[derive(Debug, Error)]
pub enum ContactError {
    #[error("All fields are required (missing: {})", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Invalid email address: `{0}`")]
    InvalidEmail(String),

    #[error("{message} (status {status})")]
    Rejected { status: StatusCode, message: String },

    #[error("Mail relay request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Body posted to the mail relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactSubmission {
    pub name: String,
    pub email: String,
    pub message: String,
}

impl ContactSubmission {
    pub fn new(name: &str, email: &str, message: &str) -> Self {
        Self {
            name: name.trim().to_owned(),
            email: email.trim().to_owned(),
            message: message.trim().to_owned(),
        }
    }

    pub fn validate(&self) -> Result<(), ContactError> {
        let missing: Vec<_> = [
            ("name", &self.name),
            ("email", &self.email),
            ("message", &self.message),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect();
        if !missing.is_empty() {
            return Err(ContactError::MissingFields(missing));
        }

        if !is_plausible_email(&self.email) {
            return Err(ContactError::InvalidEmail(self.email.clone()));
        }

        Ok(())
    }
}

fn is_plausible_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

#[derive(Debug, Deserialize)]
struct RelayResponse {
    message: Option<String>,
    error: Option<String>,
}

pub struct ContactClient {
    client: reqwest::Client,
    endpoint: String,
}

impl ContactClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    /// Validates and posts the submission, returning the relay's confirmation text.
    pub async fn send(&self, submission: &ContactSubmission) -> Result<String, ContactError> {
        submission.validate()?;

        let response = self
            .client
            .post(&self.endpoint)
            .json(submission)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        let relay: Option<RelayResponse> = serde_json::from_str(&body).ok();

        if status.is_success() {
            info!(%status, "contact message relayed");
            Ok(relay
                .and_then(|relay| relay.message)
                .unwrap_or_else(|| SENT_MESSAGE.to_owned()))
        } else {
            let message = relay
                .and_then(|relay| relay.error)
                .unwrap_or_else(|| FAILED_MESSAGE.to_owned());
            warn!(%status, %message, "mail relay rejected contact message");
            Err(ContactError::Rejected { status, message })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn submission() -> ContactSubmission {
        ContactSubmission::new(" Ada ", "ada@example.com", "Let's build something.\n")
    }

    #[test]
    fn new_trims_fields() {
        let submission = submission();
        assert_eq!(submission.name, "Ada");
        assert_eq!(submission.message, "Let's build something.");
        assert!(submission.validate().is_ok());
    }

    #[test]
    fn reports_every_missing_field() {
        let err = ContactSubmission::new("", "  ", "hi").validate().unwrap_err();
        assert!(matches!(&err, ContactError::MissingFields(fields) if fields == &["name", "email"]));
        assert_eq!(err.to_string(), "All fields are required (missing: name, email)");
    }

    #[test]
    fn rejects_implausible_emails() {
        for email in ["ada", "@example.com", "ada@example", "ada@.com", "a da@example.com", "a@b@c.com"] {
            let err = ContactSubmission::new("Ada", email, "hi").validate();
            assert!(matches!(err, Err(ContactError::InvalidEmail(_))), "{email}");
        }
    }

    #[tokio::test]
    async fn posts_json_and_returns_relay_message() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/contact")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(json!({
                "name": "Ada",
                "email": "ada@example.com",
                "message": "Let's build something."
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"message":"Message sent successfully"}"#)
            .create_async()
            .await;

        let client = ContactClient::new(format!("{}/api/contact", server.url()));
        let confirmation = client.send(&submission()).await.unwrap();

        assert_eq!(confirmation, "Message sent successfully");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn relay_error_body_is_surfaced() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(400)
            .with_body(r#"{"error":"All fields are required"}"#)
            .create_async()
            .await;

        let err = ContactClient::new(server.url())
            .send(&submission())
            .await
            .unwrap_err();
        match err {
            ContactError::Rejected { status, message } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(message, "All fields are required");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_json_failure_uses_generic_message() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(500)
            .with_body("upstream exploded")
            .create_async()
            .await;

        let err = ContactClient::new(server.url())
            .send(&submission())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to send message (status 500 Internal Server Error)");
    }

    #[tokio::test]
    async fn unreachable_relay_reports_transport_error_once() {
        let err = ContactClient::new("http://127.0.0.1:1/api/contact")
            .send(&submission())
            .await
            .unwrap_err();
        assert!(matches!(err, ContactError::Transport(_)));
        assert!(err.to_string().starts_with("Mail relay request failed"));
        assert!(!err.to_string().contains(FAILED_MESSAGE));
    }

    #[tokio::test]
    async fn invalid_submission_never_hits_the_relay() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", "/").expect(0).create_async().await;

        let result = ContactClient::new(server.url())
            .send(&ContactSubmission::new("Ada", "nope", "hi"))
            .await;

        assert!(matches!(result, Err(ContactError::InvalidEmail(_))));
        mock.assert_async().await;
    }
}
