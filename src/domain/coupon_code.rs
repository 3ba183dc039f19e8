const MAX_CHAR_LENGTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouponCode(String);

impl CouponCode {
    pub fn parse(code: String) -> Result<CouponCode, String> {
        let is_empty_or_whitespace = code.trim().is_empty();
        let is_too_long = code.chars().count() > MAX_CHAR_LENGTH;
        let contains_forbidden_chars = code.chars().any(|char| !char.is_ascii_alphanumeric());

        if is_empty_or_whitespace || is_too_long || contains_forbidden_chars {
            return Err(format!("{} is not a valid coupon code", code));
        }

        Ok(Self(code))
    }
}

impl AsRef<str> for CouponCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
