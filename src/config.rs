//! Environment-driven configuration.
//!
//! All knobs are collected once at startup into an immutable [`Config`] and
//! passed by value into the flow runner. Only the SMTP credentials and the
//! recipient are required, and only when an email is actually sent; every
//! other value has a documented default.

use chrono::Local;

use crate::error::FlowError;

fn env_string(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_bool(name: &str, default: bool) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(name: &str, default: u32) -> u32 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Browser launch and wait settings.
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Budget for each element-visibility wait (ms)
    pub default_timeout_ms: u64,
}

/// Inputs shared by every flow.
#[derive(Debug, Clone)]
pub struct InputConfig {
    pub claim_id: String,
    pub claim_dob: String,
    pub expected_error_text: String,
    /// Inter-key delay when typing the DOB character by character (ms)
    pub keystroke_delay_ms: u64,
    /// Settle delay after the assertion passes, before the screenshot (ms)
    pub post_assert_delay_ms: u64,
    /// Pipe-separated URL substrings identifying the verify/validate endpoint
    pub verify_url_hint: String,
}

/// SMTP delivery and email policy settings.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub to_email: Option<String>,
    pub relay_host: String,
    /// Implicit TLS on 465 instead of STARTTLS on 587
    pub use_implicit_tls: bool,
    pub always_email: bool,
    pub email_on_failure: bool,
    pub subject: String,
    pub text_body: String,
}

/// Resolved sender settings, available once the required values are present.
#[derive(Debug, Clone)]
pub struct SenderSettings {
    pub username: String,
    pub password: String,
    pub to: String,
}

impl EmailConfig {
    /// Validate the required values, reporting every missing name at once.
    pub fn sender(&self) -> Result<SenderSettings, FlowError> {
        let mut missing = Vec::new();
        if self.smtp_username.is_none() {
            missing.push("SMTP_USERNAME".to_string());
        }
        if self.smtp_password.is_none() {
            missing.push("SMTP_PASSWORD".to_string());
        }
        if self.to_email.is_none() {
            missing.push("TO_EMAIL".to_string());
        }
        if !missing.is_empty() {
            return Err(FlowError::MissingConfig(missing));
        }
        Ok(SenderSettings {
            username: self.smtp_username.clone().unwrap_or_default(),
            password: self.smtp_password.clone().unwrap_or_default(),
            to: self.to_email.clone().unwrap_or_default(),
        })
    }
}

/// Immutable application configuration, built once from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub browser: BrowserConfig,
    pub inputs: InputConfig,
    pub email: EmailConfig,
}

pub const DEFAULT_EXPECTED_ERROR_TEXT: &str =
    "The information you provided does not match our records. Please try again.";

impl Config {
    pub fn from_env() -> Self {
        Self {
            browser: BrowserConfig {
                headless: env_bool("HEADLESS", true),
                viewport_width: env_u32("WINDOW_W", 1920),
                viewport_height: env_u32("WINDOW_H", 1080),
                default_timeout_ms: env_u64("WAIT_TIMEOUT_MS", 30_000),
            },
            inputs: InputConfig {
                claim_id: env_string("CLAIM_ID", "A0000000"),
                claim_dob: env_string("CLAIM_DOB", "01/01/1990"),
                expected_error_text: env_string(
                    "EXPECTED_ERROR_TEXT",
                    DEFAULT_EXPECTED_ERROR_TEXT,
                ),
                keystroke_delay_ms: env_u64("KEYSTROKE_DELAY_MS", 18),
                post_assert_delay_ms: env_u64("POST_ASSERT_DELAY_MS", 1000),
                verify_url_hint: env_string("VERIFY_URL_HINT", "verify|validate"),
            },
            email: EmailConfig {
                smtp_username: env_opt("SMTP_USERNAME"),
                smtp_password: env_opt("SMTP_PASSWORD"),
                to_email: env_opt("TO_EMAIL"),
                relay_host: env_string("SMTP_RELAY", "smtp.gmail.com"),
                use_implicit_tls: env_bool("USE_SSL_465", false),
                always_email: env_bool("ALWAYS_EMAIL", true),
                email_on_failure: env_bool("EMAIL_ON_FAILURE", true),
                subject: env_string("SUBJECT", "GOCC - Health Check - HK eClaims (0700 HKT)"),
                text_body: env_string(
                    "TEXT_BODY",
                    "This email contains inline screenshots of the automated HK eClaims flows. \
                     If you can't see them, open in an HTML-capable client.",
                ),
            },
        }
    }
}

/// Default per-flow screenshot path, e.g. `screenshots/screenshot_20250101_070000_2.png`.
pub fn default_screenshot_path(flow_index: usize) -> String {
    let ts = Local::now().format("%Y%m%d_%H%M%S");
    format!("screenshots/screenshot_{}_{}.png", ts, flow_index + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_reports_all_missing() {
        let email = EmailConfig {
            smtp_username: None,
            smtp_password: Some("secret".to_string()),
            to_email: None,
            relay_host: "smtp.gmail.com".to_string(),
            use_implicit_tls: false,
            always_email: true,
            email_on_failure: true,
            subject: String::new(),
            text_body: String::new(),
        };
        match email.sender() {
            Err(FlowError::MissingConfig(names)) => {
                assert_eq!(names, vec!["SMTP_USERNAME", "TO_EMAIL"]);
            }
            other => panic!("expected MissingConfig, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_sender_resolves_when_complete() {
        let email = EmailConfig {
            smtp_username: Some("bot@example.com".to_string()),
            smtp_password: Some("secret".to_string()),
            to_email: Some("team@example.com".to_string()),
            relay_host: "smtp.gmail.com".to_string(),
            use_implicit_tls: true,
            always_email: true,
            email_on_failure: true,
            subject: String::new(),
            text_body: String::new(),
        };
        let sender = email.sender().unwrap();
        assert_eq!(sender.username, "bot@example.com");
        assert_eq!(sender.to, "team@example.com");
    }
}
