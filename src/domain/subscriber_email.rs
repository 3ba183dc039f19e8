use validator::validate_email;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberEmail(String);

impl SubscriberEmail {
    /// Parses and normalizes an email, so two spellings of the same address map to one subscriber.
    pub fn parse(email: String) -> Result<SubscriberEmail, String> {
        let email = normalize_email(&email);

        if email.is_empty() {
            return Err(String::from("Email is required"));
        }

        if !validate_email(&email) || !has_top_level_domain(&email) {
            return Err(format!("{} email is not valid", email));
        }

        Ok(Self(email))
    }
}

/// Lookups by email go through here even when the input is never validated.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

// `local@domain.tld`: validator alone accepts dotless domains such as `user@localhost`.
fn has_top_level_domain(email: &str) -> bool {
    match email.rsplit_once('@') {
        Some((_, domain)) => domain
            .split_once('.')
            .map(|(name, tld)| !name.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
            .unwrap_or(false),
        None => false,
    }
}

impl AsRef<str> for SubscriberEmail {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SubscriberEmail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
