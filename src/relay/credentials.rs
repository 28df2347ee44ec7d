//! Auto-login credential resolution.
//!
//! An optional CSV source (one `email,password` row per shared account) is
//! consulted first, selected by the account index in the request path.
//! Any failure there is swallowed and the fixed configured pair is used.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::config::LoginSettings;
use crate::relay::session::AccountIndex;

/// An email/password pair. `Debug` never prints the password.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Error)]
enum SourceError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("source returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("no credential row {0}")]
    MissingRow(usize),
}

/// Resolves credentials per request.
#[derive(Clone)]
pub struct CredentialResolver {
    client: reqwest::Client,
}

impl CredentialResolver {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Credentials for the given account, or `None` when nothing is configured.
    pub async fn resolve(
        &self,
        settings: &LoginSettings,
        account: Option<AccountIndex>,
    ) -> Option<Credentials> {
        if let Some(url) = settings.source_url.as_deref() {
            let row = account.map(|a| a.get() as usize).unwrap_or(1);
            match self.fetch_row(url, row, settings.source_timeout_ms).await {
                Ok(credentials) => return Some(credentials),
                Err(e) => {
                    tracing::warn!(error = %e, row, "Credential source lookup failed, using fixed pair");
                }
            }
        }
        fixed_pair(settings)
    }

    async fn fetch_row(
        &self,
        url: &str,
        row: usize,
        timeout_ms: u64,
    ) -> Result<Credentials, SourceError> {
        let response = self
            .client
            .get(url)
            .timeout(Duration::from_millis(timeout_ms))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SourceError::Status(response.status()));
        }
        let body = response.text().await?;
        parse_rows(&body)
            .into_iter()
            .nth(row.saturating_sub(1))
            .ok_or(SourceError::MissingRow(row))
    }
}

/// The fixed configured pair, when both halves are present.
pub fn fixed_pair(settings: &LoginSettings) -> Option<Credentials> {
    if settings.email.is_empty() || settings.password.is_empty() {
        None
    } else {
        Some(Credentials::new(&settings.email, &settings.password))
    }
}

/// Parse `email,password` CSV rows. Fields may be double-quoted (with `""`
/// as an escaped quote), so passwords can carry commas. Rows without an `@`
/// in the first column (headers, blanks, notes) are skipped.
pub fn parse_rows(body: &str) -> Vec<Credentials> {
    body.lines()
        .filter_map(|line| {
            let mut cols = split_csv_line(line).into_iter();
            let email = cols.next()?;
            let password = cols.next()?;
            let email = email.trim();
            (email.contains('@') && !password.is_empty()).then(|| Credentials::new(email, password))
        })
        .collect()
}

/// Split one CSV line on commas, honouring quoted fields.
///
/// Unquoted fields are trimmed; quoted fields are taken verbatim.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut in_quotes = false;
    let mut chars = line.trim_end_matches('\r').chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' if in_quotes => in_quotes = false,
            '"' if field.trim().is_empty() && !quoted => {
                field.clear();
                quoted = true;
                in_quotes = true;
            }
            ',' if !in_quotes => {
                fields.push(finish_field(&mut field, quoted));
                quoted = false;
            }
            _ => field.push(c),
        }
    }
    fields.push(finish_field(&mut field, quoted));
    fields
}

fn finish_field(field: &mut String, quoted: bool) -> String {
    let value = std::mem::take(field);
    if quoted {
        value
    } else {
        value.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rows_skips_headers() {
        let body = "email,password\r\n\"a@x.test\",\"pa\"\r\nnotes\n b@x.test , pb \n\n";
        let rows = parse_rows(body);
        assert_eq!(
            rows,
            vec![
                Credentials::new("a@x.test", "pa"),
                Credentials::new("b@x.test", "pb"),
            ]
        );
    }

    #[test]
    fn test_parse_rows_keeps_delimiters_in_passwords() {
        let body = concat!(
            "a@x.test,\"p,a;ss\"\n",
            "b@x.test,\"say \"\"hi\"\"\",extra\n",
            "c@x.test,semi;colon\tand tab\n",
        );
        let rows = parse_rows(body);
        assert_eq!(
            rows,
            vec![
                Credentials::new("a@x.test", "p,a;ss"),
                Credentials::new("b@x.test", "say \"hi\""),
                Credentials::new("c@x.test", "semi;colon\tand tab"),
            ]
        );
    }

    #[test]
    fn test_fixed_pair_requires_both() {
        let mut settings = LoginSettings::default();
        assert_eq!(fixed_pair(&settings), None);

        settings.email = "team@x.test".to_string();
        assert_eq!(fixed_pair(&settings), None);

        settings.password = "secret".to_string();
        assert_eq!(fixed_pair(&settings), Some(Credentials::new("team@x.test", "secret")));
    }

    #[test]
    fn test_debug_redacts_password() {
        let debug = format!("{:?}", Credentials::new("team@x.test", "hunter2"));
        assert!(debug.contains("team@x.test"));
        assert!(!debug.contains("hunter2"));
    }

    #[tokio::test]
    async fn test_unreachable_source_falls_back() {
        let settings = LoginSettings {
            email: "team@x.test".to_string(),
            password: "secret".to_string(),
            source_url: Some("http://127.0.0.1:9/sheet.csv".to_string()),
            source_timeout_ms: 500,
            ..LoginSettings::default()
        };
        let resolver = CredentialResolver::new(reqwest::Client::new());
        let resolved = resolver.resolve(&settings, AccountIndex::parse("2")).await;
        assert_eq!(resolved, Some(Credentials::new("team@x.test", "secret")));
    }
}
