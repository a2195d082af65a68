use anyhow::{bail, Result};

/// Shared-secret check in front of mutating commands.
///
/// This is a plain string comparison against a value taken from the
/// environment. It is a placeholder, not access control: the secret is not
/// hashed, the comparison is not constant time and nothing is rate limited.
#[derive(Debug, Clone)]
pub struct AdminGate {
    secret: String,
}

impl AdminGate {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn check(&self, attempt: &str) -> bool {
        attempt == self.secret
    }

    pub fn require(&self, attempt: Option<&str>) -> Result<()> {
        match attempt {
            None => bail!("admin password required (--password or LIGHTBOX_PASSWORD)"),
            Some(attempt) if !self.check(attempt) => bail!("incorrect admin password"),
            Some(_) => Ok(()),
        }
    }
}
