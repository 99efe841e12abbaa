//! Redirect callback parsing.
//!
//! The implicit-grant redirect lands on `/auth/callback#access_token=...` (or
//! `#error=...`). The fragment is turned into a credential or a sign-in error.

use std::collections::HashMap;
use tracing::debug;

use super::Credential;
use crate::error::SignInError;
use crate::session::types::MAX_LIFETIME_SECS;

/// Parse a full callback URL or a bare fragment.
pub fn parse_callback(url_or_fragment: &str) -> Result<Credential, SignInError> {
    let fragment = match url_or_fragment.split_once('#') {
        Some((_, fragment)) => fragment,
        None if url_or_fragment.contains("://") => "",
        None => url_or_fragment,
    };

    if fragment.trim().is_empty() {
        return Err(SignInError::Decoding(
            "no authentication data in callback".to_string(),
        ));
    }

    let params = parse_params(fragment)?;

    if let Some(code) = params.get("error") {
        debug!(error = %code, "Provider returned error in callback");
        return Err(SignInError::Provider { code: code.clone() });
    }

    let expires_in = match params.get("expires_in") {
        Some(raw) => Some(
            raw.parse::<u64>()
                .ok()
                .filter(|secs| *secs <= MAX_LIFETIME_SECS)
                .ok_or_else(|| SignInError::Decoding(format!("invalid expires_in '{}'", raw)))?,
        ),
        None => None,
    };

    if let Some(token) = params.get("id_token").filter(|t| !t.is_empty()) {
        return Ok(Credential::IdToken {
            token: token.clone(),
            expires_in,
        });
    }

    if let Some(token) = params.get("access_token").filter(|t| !t.is_empty()) {
        return Ok(Credential::AccessToken {
            token: token.clone(),
            expires_in,
        });
    }

    Err(SignInError::Decoding(
        "no access token received in callback".to_string(),
    ))
}

/// Split `a=1&b=2` into percent-decoded pairs.
fn parse_params(fragment: &str) -> Result<HashMap<String, String>, SignInError> {
    let mut params = HashMap::new();
    for pair in fragment.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let value = urlencoding::decode(&value.replace('+', " "))
            .map_err(|e| SignInError::Decoding(format!("bad encoding for '{}': {}", key, e)))?
            .into_owned();
        params.insert(key.to_string(), value);
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_access_token_callback() {
        let credential = parse_callback(
            "http://localhost:8081/auth/callback#access_token=ya29.a0Af&token_type=Bearer&expires_in=3599&scope=email%20profile",
        )
        .unwrap();

        match credential {
            Credential::AccessToken { token, expires_in } => {
                assert_eq!(token, "ya29.a0Af");
                assert_eq!(expires_in, Some(3599));
            }
            other => panic!("unexpected credential: {:?}", other),
        }
    }

    #[test]
    fn test_id_token_preferred() {
        let credential = parse_callback("#id_token=eyJ.x.y&access_token=ya29").unwrap();
        assert!(matches!(
            credential,
            Credential::IdToken { ref token, expires_in: None } if token == "eyJ.x.y"
        ));
    }

    #[test]
    fn test_error_callback() {
        let err = parse_callback("https://app/auth/callback#error=access_denied").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);

        let err = parse_callback("#error=temporarily_unavailable").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network);
    }

    #[test]
    fn test_missing_data() {
        assert_eq!(
            parse_callback("https://app/auth/callback").unwrap_err().kind(),
            ErrorKind::Decoding
        );
        assert_eq!(
            parse_callback("https://app/auth/callback#").unwrap_err().kind(),
            ErrorKind::Decoding
        );
        assert_eq!(
            parse_callback("#token_type=Bearer").unwrap_err().kind(),
            ErrorKind::Decoding
        );
        assert_eq!(
            parse_callback("#access_token=x&expires_in=soon").unwrap_err().kind(),
            ErrorKind::Decoding
        );
    }

    #[test]
    fn test_lifetime_bounds() {
        for raw in ["100000000000000000", "18446744073709551615", "-1"] {
            let err = parse_callback(&format!("#access_token=x&expires_in={}", raw)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Decoding, "expires_in={}", raw);
        }

        let credential =
            parse_callback(&format!("#access_token=x&expires_in={}", MAX_LIFETIME_SECS)).unwrap();
        assert_eq!(credential.expires_in(), Some(MAX_LIFETIME_SECS));
    }
}
