/// Client configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development. Unparseable
/// values fall back to the default with a warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the annotation REST API, without a trailing slash.
    pub base_url: String,
    /// HTTP request timeout in seconds (default: `10`).
    pub request_timeout_secs: u64,
}

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: trim_base_url(base_url.into()),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }

    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                         | Default                     |
    /// |---------------------------------|-----------------------------|
    /// | `SURVEYQA_API_URL`              | `http://localhost:8000/api` |
    /// | `SURVEYQA_REQUEST_TIMEOUT_SECS` | `10`                        |
    ///
    /// A `.env` file in the working directory is loaded first if present.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let base_url =
            std::env::var("SURVEYQA_API_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());

        let request_timeout_secs = match std::env::var("SURVEYQA_REQUEST_TIMEOUT_SECS") {
            Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(
                    value = %raw,
                    default = DEFAULT_REQUEST_TIMEOUT_SECS,
                    "Invalid SURVEYQA_REQUEST_TIMEOUT_SECS, using default"
                );
                DEFAULT_REQUEST_TIMEOUT_SECS
            }),
            Err(_) => DEFAULT_REQUEST_TIMEOUT_SECS,
        };

        Self {
            base_url: trim_base_url(base_url),
            request_timeout_secs,
        }
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

fn trim_base_url(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}
