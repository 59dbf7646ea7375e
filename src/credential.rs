#![forbid(unsafe_code)]

//! Cookie blob handling. Users paste the output of `document.cookie`; we keep
//! every pair but only care about a few of them.

use std::collections::BTreeMap;

use crate::error::{TransferError, TransferResult};

pub const SESSION_TOKEN_KEY: &str = "SESSDATA";
pub const USER_ID_KEY: &str = "DedeUserID";
pub const CSRF_TOKEN_KEY: &str = "bili_jct";
pub const USER_ID_CHECKSUM_KEY: &str = "DedeUserID__ckMd5";

pub const REQUIRED_KEYS: [&str; 3] = [SESSION_TOKEN_KEY, USER_ID_KEY, CSRF_TOKEN_KEY];

/// Cookies shown in the login diagnostics.
pub const DIAGNOSTIC_KEYS: [&str; 4] = [
    SESSION_TOKEN_KEY,
    USER_ID_KEY,
    CSRF_TOKEN_KEY,
    USER_ID_CHECKSUM_KEY,
];

/// Anything shorter than this is almost certainly a truncated copy.
pub const MIN_BLOB_LEN: usize = 50;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credential {
    cookies: BTreeMap<String, String>,
}

impl Credential {
    /// Decodes `key=value; key=value` without validating which keys exist.
    pub fn parse(blob: &str) -> Self {
        let cookies = blob
            .split(';')
            .filter_map(|item| item.trim().split_once('='))
            .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
            .filter(|(key, _)| !key.is_empty())
            .collect();
        Self { cookies }
    }

    /// Decodes and requires the session token, user id and csrf token.
    pub fn parse_strict(blob: &str) -> TransferResult<Self> {
        let credential = Self::parse(blob);
        credential.ensure_complete()?;
        Ok(credential)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.cookies
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn missing_keys(&self) -> Vec<&'static str> {
        REQUIRED_KEYS
            .into_iter()
            .filter(|key| self.get(key).is_none())
            .collect()
    }

    pub fn ensure_complete(&self) -> TransferResult<()> {
        let missing = self.missing_keys();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(TransferError::Credential { missing })
        }
    }

    pub fn csrf_token(&self) -> &str {
        self.get(CSRF_TOKEN_KEY).unwrap_or_default()
    }

    /// Value for the `Cookie` request header.
    pub fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Presence report used when login verification fails. Values are cut
    /// short so the log never carries a full session token.
    pub fn diagnostics(&self) -> Vec<(&'static str, Option<String>)> {
        DIAGNOSTIC_KEYS
            .into_iter()
            .map(|key| {
                let preview = self
                    .get(key)
                    .map(|value| value.chars().take(20).collect::<String>());
                (key, preview)
            })
            .collect()
    }
}

/// Offline sanity check run before any request: length and required keys.
pub fn check_blob_format(blob: &str) -> TransferResult<Credential> {
    let trimmed = blob.trim();
    if trimmed.len() < MIN_BLOB_LEN {
        return Err(TransferError::authentication(format!(
            "cookie string is only {} characters long and is probably incomplete",
            trimmed.len()
        )));
    }
    Credential::parse_strict(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = "buvid3=abc; SESSDATA=token%2C123; DedeUserID=42; \
        DedeUserID__ckMd5=deadbeef; bili_jct=csrf0123456789";

    #[test]
    fn parse_splits_on_first_equals() {
        let credential = Credential::parse("a=b=c; d = e ;junk; =orphan");
        assert_eq!(credential.get("a"), Some("b=c"));
        assert_eq!(credential.get("d"), Some("e"));
        assert_eq!(credential.get("junk"), None);
        assert_eq!(credential.cookie_header(), "a=b=c; d=e");
    }

    #[test]
    fn strict_parse_accepts_full_blob() {
        let credential = Credential::parse_strict(FULL).unwrap();
        assert_eq!(credential.csrf_token(), "csrf0123456789");
        assert_eq!(credential.get(USER_ID_KEY), Some("42"));
    }

    #[test]
    fn strict_parse_reports_every_missing_key() {
        let err = Credential::parse_strict("SESSDATA=x; bili_jct=").unwrap_err();
        match err {
            TransferError::Credential { missing } => {
                assert_eq!(missing, vec![USER_ID_KEY, CSRF_TOKEN_KEY]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn csrf_token_defaults_to_empty() {
        assert_eq!(Credential::parse("SESSDATA=x").csrf_token(), "");
    }

    #[test]
    fn diagnostics_truncate_values() {
        let credential = Credential::parse("SESSDATA=abcdefghijklmnopqrstuvwxyz; bili_jct=c");
        let report = credential.diagnostics();
        assert_eq!(
            report[0],
            (SESSION_TOKEN_KEY, Some("abcdefghijklmnopqrst".to_string()))
        );
        assert_eq!(report[1], (USER_ID_KEY, None));
        assert_eq!(report[2], (CSRF_TOKEN_KEY, Some("c".to_string())));
    }

    #[test]
    fn blob_format_check_rejects_short_input() {
        assert!(check_blob_format("SESSDATA=1; DedeUserID=2; bili_jct=3").is_err());
        assert!(check_blob_format(FULL).is_ok());
    }
}
