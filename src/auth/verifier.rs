//! Token verification.
//!
//! Tokens are HS256 JWTs signed with a shared secret. Verification decodes
//! exactly the `id`, `email` and `role` claims into an [`Identity`]; `exp`
//! is mandatory and checked by `jsonwebtoken`.

use std::fmt;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::auth::extractor::Credential;
use crate::auth::identity::{Identity, Role};
use crate::config::ConfigError;

/// Why a credential was rejected. Kept for logs and metrics only; callers
/// all see the same "authentication failed" response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    Expired,
    BadSignature,
    MalformedClaims,
    Malformed,
}

impl InvalidReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvalidReason::Expired => "expired",
            InvalidReason::BadSignature => "bad_signature",
            InvalidReason::MalformedClaims => "malformed_claims",
            InvalidReason::Malformed => "malformed",
        }
    }
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of verifying one (possibly absent) credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    Valid(Identity),
    Missing,
    Invalid(InvalidReason),
    /// The crypto layer failed for a reason unrelated to the token itself.
    ServiceError(String),
}

#[derive(Debug, Deserialize)]
struct Claims {
    id: i64,
    email: String,
    role: Role,
}

/// Turns an extracted credential into a verification outcome.
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, credential: Option<&Credential>) -> VerificationOutcome;
}

/// Stateless verifier, shared read-only across requests.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("algorithms", &self.validation.algorithms)
            .finish_non_exhaustive()
    }
}

impl TokenVerifier {
    /// Build a verifier from the configured signing secret.
    pub fn new(secret: Option<&str>) -> Result<Self, ConfigError> {
        let secret = secret
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::MissingSecret)?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Ok(Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }
}

impl CredentialVerifier for TokenVerifier {
    fn verify(&self, credential: Option<&Credential>) -> VerificationOutcome {
        let Some(credential) = credential else {
            return VerificationOutcome::Missing;
        };

        match jsonwebtoken::decode::<Claims>(credential.as_str(), &self.key, &self.validation) {
            Ok(data) => VerificationOutcome::Valid(Identity {
                id: data.claims.id,
                email: data.claims.email,
                role: data.claims.role,
            }),
            Err(err) => classify(err),
        }
    }
}

fn classify(err: jsonwebtoken::errors::Error) -> VerificationOutcome {
    use VerificationOutcome::{Invalid, ServiceError};

    match err.kind() {
        ErrorKind::ExpiredSignature => Invalid(InvalidReason::Expired),
        ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
            Invalid(InvalidReason::BadSignature)
        }
        ErrorKind::Json(_) | ErrorKind::MissingRequiredClaim(_) => {
            Invalid(InvalidReason::MalformedClaims)
        }
        ErrorKind::InvalidToken
        | ErrorKind::Base64(_)
        | ErrorKind::Utf8(_)
        | ErrorKind::MissingAlgorithm
        | ErrorKind::ImmatureSignature
        | ErrorKind::InvalidIssuer
        | ErrorKind::InvalidAudience
        | ErrorKind::InvalidSubject => Invalid(InvalidReason::Malformed),
        _ => ServiceError(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header};
    use serde::Serialize;
    use std::time::{SystemTime, UNIX_EPOCH};

    const SECRET: &str = "unit-test-signing-key";

    fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }

    fn mint<T: Serialize>(claims: &T, secret: &str) -> Credential {
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap();
        Credential::new(token)
    }

    fn verifier() -> TokenVerifier {
        TokenVerifier::new(Some(SECRET)).unwrap()
    }

    #[test]
    fn test_missing_secret_is_config_error() {
        assert!(matches!(TokenVerifier::new(None), Err(ConfigError::MissingSecret)));
        assert!(matches!(TokenVerifier::new(Some("  ")), Err(ConfigError::MissingSecret)));
    }

    #[test]
    fn test_round_trip_claims() {
        let token = mint(
            &serde_json::json!({"id": 7, "email": "a@b.com", "role": "user", "exp": now() + 600}),
            SECRET,
        );
        assert_eq!(
            verifier().verify(Some(&token)),
            VerificationOutcome::Valid(Identity {
                id: 7,
                email: "a@b.com".into(),
                role: Role::User,
            })
        );
    }

    #[test]
    fn test_absent_credential_is_missing() {
        assert_eq!(verifier().verify(None), VerificationOutcome::Missing);
    }

    #[test]
    fn test_wrong_secret_is_bad_signature() {
        let token = mint(
            &serde_json::json!({"id": 1, "email": "a@b.com", "role": "admin", "exp": now() + 600}),
            "some-other-key",
        );
        assert_eq!(
            verifier().verify(Some(&token)),
            VerificationOutcome::Invalid(InvalidReason::BadSignature)
        );
    }

    #[test]
    fn test_expired_token() {
        let token = mint(
            &serde_json::json!({"id": 1, "email": "a@b.com", "role": "user", "exp": now() - 120}),
            SECRET,
        );
        assert_eq!(
            verifier().verify(Some(&token)),
            VerificationOutcome::Invalid(InvalidReason::Expired)
        );
    }

    #[test]
    fn test_bad_claim_shapes() {
        let cases = [
            serde_json::json!({"email": "a@b.com", "role": "user", "exp": now() + 600}),
            serde_json::json!({"id": "7", "email": "a@b.com", "role": "user", "exp": now() + 600}),
            serde_json::json!({"id": 7, "email": "a@b.com", "role": "root", "exp": now() + 600}),
            serde_json::json!({"id": 7, "role": "user", "exp": now() + 600}),
        ];
        for claims in cases {
            let token = mint(&claims, SECRET);
            assert_eq!(
                verifier().verify(Some(&token)),
                VerificationOutcome::Invalid(InvalidReason::MalformedClaims),
                "claims {claims} should be rejected"
            );
        }
    }

    #[test]
    fn test_garbage_token() {
        let token = Credential::new("not-a-jwt");
        assert_eq!(
            verifier().verify(Some(&token)),
            VerificationOutcome::Invalid(InvalidReason::Malformed)
        );
    }
}
