use anyhow::{Context, Result};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::generator::session::Identity;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Subject (email)
    pub user_id: String,
    pub exp: usize, // Expiration time (as UTC timestamp)
    pub iat: usize, // Issued at (as UTC timestamp)
}

impl Claims {
    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.user_id.clone(),
            email: self.sub.clone(),
        }
    }
}

pub fn create_token(secret: &str, user_id: &str, email: &str) -> Result<String> {
    let now = chrono::Utc::now();
    let expiry = now + chrono::Duration::days(10); // 10 days validity

    let claims = Claims {
        sub: email.to_string(),
        user_id: user_id.to_string(),
        exp: expiry.timestamp() as usize,
        iat: now.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .context("Failed to encode JWT")?;

    Ok(token)
}

pub fn validate_token(secret: &str, token: &str) -> Result<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .context("Failed to decode JWT")?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trips_identity() {
        let token = create_token("secret", "u1", "a@b.co").unwrap();
        let claims = validate_token("secret", &token).unwrap();
        assert_eq!(claims.identity().user_id, "u1");
        assert_eq!(claims.identity().email, "a@b.co");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = create_token("secret", "u1", "a@b.co").unwrap();
        assert!(validate_token("other", &token).is_err());
        assert!(validate_token("secret", "not-a-token").is_err());
    }
}
