//! Server-side captcha verification (hCaptcha-compatible `siteverify`).
//!
//! # Responsibility
//! - Verify a visitor's captcha token with the provider.
//! - Translate every failure into a user-presentable [`CaptchaError`].
//!
//! # Invariants
//! - A missing token never reaches the network.
//! - Only `"success": true` in the provider response counts as verified.
//! - Tokens and secrets are never logged.

use crate::config::CaptchaSettings;
use log::error;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

pub const CAPTCHA_VERIFICATION_ENDPOINT: &str = "https://api.hcaptcha.com/siteverify";
/// Form field carrying the visitor's token.
pub const CAPTCHA_FORM_RESPONSE_NAME: &str = "h-captcha-response";
const CAPTCHA_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptchaError {
    /// No token was submitted.
    Missing,
    /// The provider could not be reached or answered with non-JSON.
    Unavailable(String),
    /// The provider answer has no `success` key.
    MalformedResponse,
    /// The provider rejected the token.
    Rejected { error_codes: Vec<String> },
}

impl Display for CaptchaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing => write!(
                f,
                "Captcha response missing. Please make sure that the captcha is completed. \
                 You may need to enable JavaScript if you have it disabled."
            ),
            Self::Unavailable(_) => write!(
                f,
                "There was an error in verifying the captcha. The issue could be temporary \
                 and you can try again."
            ),
            Self::MalformedResponse => write!(f, "There was an error in verifying the captcha."),
            Self::Rejected { .. } => write!(f, "Captcha verification failed."),
        }
    }
}

impl Error for CaptchaError {}

/// Posts a `siteverify` form and returns the decoded JSON answer.
pub trait CaptchaTransport {
    fn siteverify(&self, form: &[(&str, &str)]) -> Result<Value, String>;
}

impl<T: CaptchaTransport + ?Sized> CaptchaTransport for Arc<T> {
    fn siteverify(&self, form: &[(&str, &str)]) -> Result<Value, String> {
        (**self).siteverify(form)
    }
}

/// Blocking HTTP transport.
///
/// Must not be constructed or used on an async runtime thread.
pub struct HttpCaptchaTransport {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl HttpCaptchaTransport {
    pub fn new() -> Result<Self, CaptchaError> {
        Self::with_endpoint(CAPTCHA_VERIFICATION_ENDPOINT)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Result<Self, CaptchaError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(CAPTCHA_TIMEOUT)
            .build()
            .map_err(|err| CaptchaError::Unavailable(err.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

impl CaptchaTransport for HttpCaptchaTransport {
    fn siteverify(&self, form: &[(&str, &str)]) -> Result<Value, String> {
        self.client
            .post(&self.endpoint)
            .form(form)
            .send()
            .and_then(|response| response.json::<Value>())
            .map_err(|err| err.to_string())
    }
}

pub struct CaptchaVerifier<T: CaptchaTransport> {
    transport: T,
    settings: CaptchaSettings,
}

impl<T: CaptchaTransport> CaptchaVerifier<T> {
    pub fn new(transport: T, settings: CaptchaSettings) -> Self {
        Self {
            transport,
            settings,
        }
    }

    /// Verifies `token` with the provider.
    pub fn verify(&self, token: Option<&str>) -> Result<(), CaptchaError> {
        let token = match token.map(str::trim) {
            Some(token) if !token.is_empty() => token,
            _ => return Err(CaptchaError::Missing),
        };

        let result = self
            .transport
            .siteverify(&[
                ("response", token),
                ("secret", self.settings.secret_key.as_str()),
                ("sitekey", self.settings.site_key.as_str()),
            ])
            .map_err(|err| {
                error!("event=captcha_verify module=captcha status=error error_code=request_failed error={err}");
                CaptchaError::Unavailable(err)
            })?;

        match result.get("success") {
            None => {
                error!("event=captcha_verify module=captcha status=error error_code=missing_success_key");
                Err(CaptchaError::MalformedResponse)
            }
            Some(Value::Bool(true)) => Ok(()),
            Some(_) => {
                let error_codes = parse_error_codes(&result);
                if error_codes.is_empty() {
                    error!("event=captcha_verify module=captcha status=error error_code=rejected error_codes=none");
                } else {
                    error!(
                        "event=captcha_verify module=captcha status=error error_code=rejected error_codes={}",
                        error_codes.join(",")
                    );
                }
                Err(CaptchaError::Rejected { error_codes })
            }
        }
    }

    /// Verifies only when required: with `for_anon_only`, authenticated
    /// callers skip the check.
    pub fn verify_for(
        &self,
        token: Option<&str>,
        authenticated: bool,
        for_anon_only: bool,
    ) -> Result<(), CaptchaError> {
        if for_anon_only && authenticated {
            return Ok(());
        }
        self.verify(token)
    }
}

fn parse_error_codes(result: &Value) -> Vec<String> {
    result
        .get("error-codes")
        .and_then(Value::as_array)
        .map(|codes| {
            codes
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
