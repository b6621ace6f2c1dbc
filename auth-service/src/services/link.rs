//! Redemption link construction.

use super::token::ResetTokenValue;

/// The URL a user follows to redeem a reset token.
#[derive(Clone, PartialEq, Eq)]
pub struct ResetLink {
    url: String,
    token: ResetTokenValue,
}

impl ResetLink {
    /// `{base_url}{path}?token={token}&email={email}`, with both query values
    /// percent-encoded and duplicate slashes at the join removed.
    pub fn build(base_url: &str, path: &str, token: &ResetTokenValue, email: &str) -> Self {
        let url = format!(
            "{}/{}?token={}&email={}",
            base_url.trim_end_matches('/'),
            path.trim_start_matches('/'),
            urlencoding::encode(token.expose()),
            urlencoding::encode(email),
        );
        Self {
            url,
            token: token.clone(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }

    /// Token value carried by this link.
    pub fn token(&self) -> &ResetTokenValue {
        &self.token
    }
}

impl std::fmt::Debug for ResetLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResetLink").field("token", &self.token).finish()
    }
}

impl std::fmt::Display for ResetLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_embeds_token_and_encoded_email() {
        let token = ResetTokenValue::new("abc123");
        let link = ResetLink::build("https://annuaire.example/", "/password/reset", &token, "a+b@example.com");
        assert_eq!(
            link.as_str(),
            "https://annuaire.example/password/reset?token=abc123&email=a%2Bb%40example.com"
        );
        assert_eq!(link.token().expose(), "abc123");
    }

    #[test]
    fn test_link_debug_hides_url() {
        let token = ResetTokenValue::new("abc123");
        let link = ResetLink::build("https://annuaire.example", "password/reset", &token, "a@example.com");
        assert!(!format!("{:?}", link).contains("abc123"));
    }
}
