//! Admin token check and constant-time secret comparison
//! (SPEC_FULL.md §B.3, §A.9).
//!
//! Grounded in the teacher's `src/auth/middleware.rs`: `secrets_match` is
//! the same `subtle::ConstantTimeEq` pattern that file used for app-secret
//! comparison. Unlike the original `AdminCheckMiddleware`, which computed
//! an error and discarded it, `require_admin` here actually rejects.

use subtle::ConstantTimeEq;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("admin token missing or incorrect")]
    InvalidAdminToken,
}

/// Constant-time secret comparison to prevent timing attacks.
pub fn secrets_match(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Rejects admin-surface calls unless `presented` matches `configured`
/// under constant-time comparison. The resolution of SPEC_FULL.md §A.9's
/// "admin-check middleware" open question: a hard rejection, not a
/// discarded error.
pub fn require_admin(configured: &str, presented: &str) -> Result<(), AuthError> {
    if secrets_match(configured, presented) {
        Ok(())
    } else {
        Err(AuthError::InvalidAdminToken)
    }
}
