//! Caller-owned streaming session credentials.

use reqwest::blocking::RequestBuilder;
use reqwest::header::USER_AGENT;

/// Default client version header sent with authenticated requests.
pub const DEFAULT_CLIENT_VERSION: &str = "2.167.0";

/// Default user agent for authenticated requests.
pub const DEFAULT_USER_AGENT: &str = "TIDAL_ANDROID/9047 null";

/// Credentials and client identity for one streaming session.
///
/// The session is acquired and refreshed by the caller and handed to each
/// fetcher or API client explicitly. Nothing in this crate stores it globally.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    access_token: String,
    client_version: String,
    user_agent: String,
}

impl Session {
    /// Create a session from a bearer access token.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            client_version: DEFAULT_CLIENT_VERSION.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Set the client version header.
    pub fn with_client_version(mut self, version: impl Into<String>) -> Self {
        self.client_version = version.into();
        self
    }

    /// Set the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// The user agent sent with requests.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// The client version header value.
    pub fn client_version(&self) -> &str {
        &self.client_version
    }

    /// Attach the session headers to a request.
    pub fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.access_token)
            .header(USER_AGENT, &self.user_agent)
            .header("x-tidal-client-version", &self.client_version)
    }
}

// Keeps the token out of logs.
impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("client_version", &self.client_version)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}
