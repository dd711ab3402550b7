use std::fmt::{Debug, Formatter};

/// Credential for the storage account.
///
/// Only a shared account key can sign new SAS tokens or authorize the
/// management calls this crate makes. A SAS-token credential is still
/// representable so that configuration parsing can name it in errors
/// instead of silently producing an empty token.
#[derive(Clone)]
pub enum Credential {
    /// Shared Key: the account's master key, base64 encoded.
    SharedKey {
        /// Storage account name.
        account_name: String,
        /// Storage account key.
        account_key: String,
    },
    /// A pre-issued SAS token. Cannot sign anything.
    SasToken {
        /// SAS token query string.
        token: String,
    },
}

impl Credential {
    /// Create a shared key credential.
    pub fn with_shared_key(account_name: impl Into<String>, account_key: impl Into<String>) -> Self {
        Self::SharedKey {
            account_name: account_name.into(),
            account_key: account_key.into(),
        }
    }

    /// Create a SAS token credential.
    pub fn with_sas_token(token: impl Into<String>) -> Self {
        Self::SasToken {
            token: token.into(),
        }
    }

    /// Check if the credential carries usable content.
    pub fn is_valid(&self) -> bool {
        match self {
            Credential::SharedKey {
                account_name,
                account_key,
            } => !account_name.is_empty() && !account_key.is_empty(),
            Credential::SasToken { token } => !token.is_empty(),
        }
    }

    /// The shared key pair, if this credential can sign.
    pub fn shared_key(&self) -> Option<(&str, &str)> {
        match self {
            Credential::SharedKey {
                account_name,
                account_key,
            } => Some((account_name, account_key)),
            Credential::SasToken { .. } => None,
        }
    }
}

impl Debug for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::SharedKey {
                account_name,
                account_key,
            } => f
                .debug_struct("Credential::SharedKey")
                .field("account_name", &Redact(account_name))
                .field("account_key", &Redact(account_key))
                .finish(),
            Credential::SasToken { token } => f
                .debug_struct("Credential::SasToken")
                .field("token", &Redact(token))
                .finish(),
        }
    }
}

/// Shows at most the first and last three characters of a secret, and
/// nothing at all for short values.
pub(crate) struct Redact<'a>(pub(crate) &'a str);

impl Debug for Redact<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            f.write_str("EMPTY")
        } else if self.0.len() < 12 {
            f.write_str("***")
        } else {
            write!(f, "{}***{}", &self.0[..3], &self.0[self.0.len() - 3..])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid() {
        assert!(Credential::with_shared_key("testaccount", "dGVzdGtleQ==").is_valid());
        assert!(!Credential::with_shared_key("", "dGVzdGtleQ==").is_valid());
        assert!(!Credential::with_shared_key("testaccount", "").is_valid());
        assert!(Credential::with_sas_token("sv=2022-11-02&sig=abc").is_valid());
        assert!(!Credential::with_sas_token("").is_valid());
    }

    #[test]
    fn test_shared_key() {
        let cred = Credential::with_shared_key("testaccount", "dGVzdGtleQ==");
        assert_eq!(cred.shared_key(), Some(("testaccount", "dGVzdGtleQ==")));
        assert_eq!(Credential::with_sas_token("sig=abc").shared_key(), None);
    }

    #[test]
    fn test_debug_redacts_key() {
        let key = "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
        let cred = Credential::with_shared_key("testaccount", key);
        let printed = format!("{cred:?}");

        assert!(!printed.contains(key));
        assert!(printed.contains("Eby***"));
    }
}
