//! Secret masking for safe logging
//!
//! The NuGet API key and the certificate password end up on command lines
//! and sometimes in tool output. `SecretMasker` holds the secrets of one
//! run (wrapped in `secrecy` types) and replaces every occurrence before
//! text is logged or embedded in an error.

use regex::Regex;
use secrecy::{ExposeSecret, SecretString};

/// Secrets shorter than this are only masked as whole command arguments
pub const MIN_SUBSTRING_MASK_LENGTH: usize = 6;

/// Replacement for fully redacted secrets
const REDACTED: &str = "****";

struct MaskedSecret {
    value: SecretString,
    replacement: String,
}

/// Masks registered secrets in arbitrary text
///
/// # Examples
///
/// ```
/// use nuget_publisher::security::SecretMasker;
/// use secrecy::SecretString;
///
/// let mut masker = SecretMasker::new();
/// masker.register(&SecretString::from("oy2secretapikey123".to_string()));
/// assert_eq!(masker.mask("push -k oy2secretapikey123"), "push -k oy2...123");
/// ```
#[derive(Default)]
pub struct SecretMasker {
    secrets: Vec<MaskedSecret>,
}

impl SecretMasker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a secret shown as `abc...xyz`; empty secrets are ignored
    pub fn register(&mut self, secret: &SecretString) {
        let replacement = Self::mask_token(secret.expose_secret());
        self.push(secret, replacement);
    }

    /// Register a secret that is always replaced by `****`
    pub fn register_redacted(&mut self, secret: &SecretString) {
        self.push(secret, REDACTED.to_string());
    }

    fn push(&mut self, secret: &SecretString, replacement: String) {
        let value = secret.expose_secret();
        if value.is_empty() {
            return;
        }
        self.secrets.push(MaskedSecret {
            value: SecretString::from(value.to_string()),
            replacement,
        });
    }

    /// Number of registered secrets
    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }

    /// Masks a token for safe logging
    ///
    /// Shows only the first 3 and last 3 characters for identification purposes.
    /// Tokens shorter than 10 characters are fully masked as "****".
    ///
    /// # Examples
    ///
    /// ```
    /// use nuget_publisher::security::SecretMasker;
    ///
    /// assert_eq!(SecretMasker::mask_token("abcdef123456"), "abc...456");
    /// assert_eq!(SecretMasker::mask_token("short"), "****");
    /// ```
    pub fn mask_token(token: &str) -> String {
        if token.chars().count() < 10 {
            return "****".to_string();
        }

        let prefix: String = token.chars().take(3).collect();
        let suffix: String = token
            .chars()
            .rev()
            .take(3)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("{}...{}", prefix, suffix)
    }

    /// Replace every registered secret in `text` with its masked form
    ///
    /// Secrets shorter than `MIN_SUBSTRING_MASK_LENGTH` are skipped here so a
    /// one-letter password does not blank out every matching letter.
    pub fn mask(&self, text: &str) -> String {
        let mut masked = text.to_string();

        // Longest first so a secret containing another is masked whole
        let mut secrets: Vec<&MaskedSecret> = self
            .secrets
            .iter()
            .filter(|s| s.value.expose_secret().chars().count() >= MIN_SUBSTRING_MASK_LENGTH)
            .collect();
        secrets.sort_by_key(|s| std::cmp::Reverse(s.value.expose_secret().len()));

        for secret in secrets {
            if let Ok(regex) = Regex::new(&regex::escape(secret.value.expose_secret())) {
                masked = regex
                    .replace_all(&masked, regex::NoExpand(&secret.replacement))
                    .to_string();
            }
        }

        masked
    }

    /// Render a command line; arguments equal to a secret are masked whatever their length
    pub fn mask_command(&self, program: &str, args: &[String]) -> String {
        let mut parts = vec![self.mask(program)];
        for arg in args {
            let exact = self
                .secrets
                .iter()
                .find(|s| s.value.expose_secret() == arg.as_str());
            parts.push(match exact {
                Some(secret) => secret.replacement.clone(),
                None => self.mask(arg),
            });
        }
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret(value: &str) -> SecretString {
        SecretString::from(value.to_string())
    }

    #[test]
    fn test_new_masker_is_empty() {
        let masker = SecretMasker::new();
        assert!(masker.is_empty());
        assert_eq!(masker.mask("nothing to hide"), "nothing to hide");
    }

    #[test]
    fn test_register_ignores_empty_secret() {
        let mut masker = SecretMasker::new();
        masker.register(&secret(""));
        assert_eq!(masker.len(), 0);
    }

    #[test]
    fn test_mask_token_with_short_token() {
        assert_eq!(SecretMasker::mask_token("short"), "****");
        assert_eq!(SecretMasker::mask_token(""), "****");
    }

    #[test]
    fn test_mask_token_with_long_token() {
        assert_eq!(SecretMasker::mask_token("abcdef123456"), "abc...456");
        assert_eq!(
            SecretMasker::mask_token("very-long-token-string"),
            "ver...ing"
        );
    }

    #[test]
    fn test_mask_token_multibyte() {
        assert_eq!(SecretMasker::mask_token("ä1234567890ö"), "ä12...90ö");
    }

    #[test]
    fn test_mask_replaces_all_occurrences() {
        let mut masker = SecretMasker::new();
        masker.register(&secret("oy2-secret-key-12345"));

        let output = masker.mask("-k oy2-secret-key-12345 and again oy2-secret-key-12345");

        assert!(!output.contains("oy2-secret-key-12345"));
        assert_eq!(output.matches("oy2...345").count(), 2);
    }

    #[test]
    fn test_mask_multiple_secrets() {
        let mut masker = SecretMasker::new();
        masker.register(&secret("api-key-0123456789"));
        masker.register(&secret("pfxpass"));

        let output =
            masker.mask("push -k api-key-0123456789; sign --certificate-password pfxpass");

        assert!(!output.contains("api-key-0123456789"));
        assert!(!output.contains("pfxpass"));
        assert!(output.contains("****"));
    }

    #[test]
    fn test_short_secret_does_not_mangle_text() {
        let mut masker = SecretMasker::new();
        masker.register_redacted(&secret("x"));

        assert_eq!(
            masker.mask("error: index.json exited"),
            "error: index.json exited"
        );
    }

    #[test]
    fn test_mask_command_masks_short_secret_argument() {
        let mut masker = SecretMasker::new();
        masker.register_redacted(&secret("x"));
        masker.register(&secret("oy2-secret-key-12345"));

        let line = masker.mask_command(
            "dotnet",
            &[
                "nuget".to_string(),
                "sign".to_string(),
                "x.nupkg".to_string(),
                "--certificate-password".to_string(),
                "x".to_string(),
                "-k".to_string(),
                "oy2-secret-key-12345".to_string(),
            ],
        );

        assert_eq!(
            line,
            "dotnet nuget sign x.nupkg --certificate-password **** -k oy2...345"
        );
    }

    #[test]
    fn test_register_redacted_hides_long_secret_completely() {
        let mut masker = SecretMasker::new();
        masker.register_redacted(&secret("pfx-password-0123456789"));

        assert_eq!(
            masker.mask("--certificate-password pfx-password-0123456789"),
            "--certificate-password ****"
        );
    }

    #[test]
    fn test_mask_regex_special_chars() {
        let mut masker = SecretMasker::new();
        masker.register(&secret("test.token+with*special$chars"));

        let output = masker.mask("token=test.token+with*special$chars");
        assert_eq!(output, "token=tes...ars");
    }
}
