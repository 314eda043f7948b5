use jwt_simple::algorithms::RS256KeyPair;
use jwt_simple::prelude::*;

use crate::errors::SnowflakeResult;

/// Snowflake expects the standard base64 alphabet with padding,
/// while jwt-simple produces the URL-safe alphabet without it
fn public_key_fingerprint(key_pair: &RS256KeyPair) -> String {
    let mut fingerprint = key_pair
        .public_key()
        .sha256_thumbprint()
        .replace('-', "+")
        .replace('_', "/");
    while fingerprint.len() % 4 != 0 {
        fingerprint.push('=');
    }
    fingerprint
}

/// Sign the token sent as `TOKEN` in a key pair login request
pub fn login_token(key_pair: &RS256KeyPair, account: &str, user: &str) -> SnowflakeResult<String> {
    // The locator is the part before any region: AAA00000.us-east-1 signs as AAA00000
    let locator = account.split('.').next().unwrap_or(account);
    let qualified_user = format!(
        "{}.{}",
        locator.to_ascii_uppercase(),
        user.to_ascii_uppercase()
    );
    let issuer = format!("{qualified_user}.SHA256:{}", public_key_fingerprint(key_pair));
    let claims = Claims::create(Duration::from_mins(59))
        .with_issuer(issuer)
        .with_subject(qualified_user);
    log::debug!("Signing login token for {:?}", claims.subject);
    Ok(key_pair.sign(claims)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signs_verifiable_login_token() -> SnowflakeResult<()> {
        let key = RS256KeyPair::generate(2048)?;
        let token = login_token(&key, "test_account.eu-west-1", "test_user")?;
        let claims = key
            .public_key()
            .verify_token::<NoCustomClaims>(&token, None)?;
        assert_eq!(claims.subject.as_deref(), Some("TEST_ACCOUNT.TEST_USER"));
        let issuer = claims.issuer.unwrap_or_default();
        assert!(issuer.starts_with("TEST_ACCOUNT.TEST_USER.SHA256:"));
        assert!(issuer.ends_with('='));
        Ok(())
    }
}
