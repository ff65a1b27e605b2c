//! Account signup, signin and referral attribution.
//!
//! Credential hashing sits behind a trait so the scheme can be swapped
//! without touching signup/signin logic. Referral attribution resolves a
//! referral code to its owner at signup time; codes that do not resolve are
//! ignored with a warning, while a resolvable code whose owner has reached
//! the fan-out limit rejects the signup. The limit check is read-then-write
//! and advisory under concurrent signups.

use crate::error::AppError;
use crate::storage::{is_unique_violation, AccountRow, Storage};
use crate::wizard::fields::is_valid_email;
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MIN_USERNAME_LEN: usize = 3;

// ─── Credential hashing ───────────────────────────────────────────────────────

/// Opaque password digest scheme.
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, password: &str) -> String;
    fn verify(&self, password: &str, digest: &str) -> bool;
}

/// Salted SHA-256 digests in `salt_hex$digest_hex` form.
pub struct Sha256Hasher;

impl Sha256Hasher {
    fn digest(salt: &[u8], password: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(salt);
        hasher.update(password.as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl CredentialHasher for Sha256Hasher {
    fn hash(&self, password: &str) -> String {
        let mut salt = [0u8; 16];
        OsRng.fill_bytes(&mut salt);
        format!("{}${}", hex::encode(salt), Self::digest(&salt, password))
    }

    fn verify(&self, password: &str, digest: &str) -> bool {
        let Some((salt_hex, expected)) = digest.split_once('$') else {
            return false;
        };
        let Ok(salt) = hex::decode(salt_hex) else {
            return false;
        };
        Self::digest(&salt, password) == expected
    }
}

// ─── Signup ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub lang: String,
    pub referral_code: Option<String>,
}

fn validate_signup(req: &SignupRequest) -> Result<(), AppError> {
    let mut errors = BTreeMap::new();
    if req.username.trim().len() < MIN_USERNAME_LEN {
        errors.insert("username".to_string(), "username_too_short".to_string());
    }
    if !is_valid_email(req.email.trim()) {
        errors.insert("email".to_string(), "email_invalid".to_string());
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        errors.insert("password".to_string(), "password_too_short".to_string());
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

/// Resolve a referral code to the referring account id. Unknown codes are
/// dropped with a warning; a known code at the fan-out limit rejects the
/// signup outright.
async fn resolve_referral(
    storage: &Storage,
    code: &str,
    referral_limit: i64,
) -> Result<Option<i64>, AppError> {
    let Some(referrer) = storage.get_account_by_referral_code(code).await? else {
        tracing::warn!(code, "ignoring unknown referral code");
        return Ok(None);
    };
    let direct = storage.count_direct_referrals(referrer.id).await?;
    if direct >= referral_limit {
        return Err(AppError::IdentityConflict("auth_referral_limit".to_string()));
    }
    Ok(Some(referrer.id))
}

pub async fn signup(
    storage: &Storage,
    hasher: &dyn CredentialHasher,
    req: &SignupRequest,
    referral_limit: i64,
) -> Result<AccountRow, AppError> {
    validate_signup(req)?;
    let username = req.username.trim();
    let email = req.email.trim().to_lowercase();

    if storage.get_account_by_email(&email).await?.is_some() {
        return Err(AppError::IdentityConflict("auth_email_taken".to_string()));
    }
    if storage.get_account_by_username(username).await?.is_some() {
        return Err(AppError::IdentityConflict("auth_username_taken".to_string()));
    }

    let referred_by = match &req.referral_code {
        Some(code) if !code.trim().is_empty() => {
            resolve_referral(storage, code.trim(), referral_limit).await?
        }
        _ => None,
    };

    let digest = hasher.hash(&req.password);
    match storage
        .create_account(username, &email, &digest, false, &req.lang, referred_by)
        .await
    {
        Ok(account) => Ok(account),
        // lost a race with a concurrent signup for the same email/username
        Err(e) => match e.downcast::<sqlx::Error>() {
            Ok(sql) if is_unique_violation(&sql) => {
                Err(AppError::IdentityConflict(unique_conflict_key(&sql).to_string()))
            }
            Ok(sql) => Err(AppError::Storage(sql)),
            Err(other) => Err(AppError::Internal(other)),
        },
    }
}

/// Conflict key for a unique violation on the accounts table. SQLite names
/// the violated column in the error message.
fn unique_conflict_key(err: &sqlx::Error) -> &'static str {
    match err {
        sqlx::Error::Database(db) if db.message().contains("accounts.username") => {
            "auth_username_taken"
        }
        _ => "auth_email_taken",
    }
}

/// Public signup link carrying an account's referral code.
pub fn referral_link(base_url: &str, code: &str) -> String {
    format!("{}/?ref={}", base_url.trim_end_matches('/'), code)
}

// ─── Signin ───────────────────────────────────────────────────────────────────

/// Verify credentials against the stored digest. The same failure is
/// returned for unknown emails and wrong passwords.
pub async fn signin(
    storage: &Storage,
    hasher: &dyn CredentialHasher,
    email: &str,
    password: &str,
) -> Result<AccountRow, AppError> {
    let account = storage
        .get_account_by_email(email.trim().to_lowercase().as_str())
        .await?
        .ok_or(AppError::Unauthorized)?;
    if !hasher.verify(password, &account.password_digest) {
        return Err(AppError::Unauthorized);
    }
    Ok(account)
}

/// Ensure the configured admin account exists. Returns the admin row whether
/// it was just created or already present.
pub async fn bootstrap_admin(
    storage: &Storage,
    hasher: &dyn CredentialHasher,
    email: &str,
    password: &str,
    lang: &str,
) -> Result<AccountRow, AppError> {
    if let Some(existing) = storage.get_account_by_email(email).await? {
        return Ok(existing);
    }
    let digest = hasher.hash(password);
    let account = storage
        .create_account("admin", email, &digest, true, lang, None)
        .await?;
    tracing::info!(email, "bootstrapped admin account");
    Ok(account)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn storage() -> (TempDir, Storage) {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path()).await.unwrap();
        (dir, storage)
    }

    fn req(username: &str, email: &str) -> SignupRequest {
        SignupRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: "hunter22".to_string(),
            lang: "en".to_string(),
            referral_code: None,
        }
    }

    #[test]
    fn digests_verify_and_differ_per_salt() {
        let hasher = Sha256Hasher;
        let a = hasher.hash("secret");
        let b = hasher.hash("secret");
        assert_ne!(a, b);
        assert!(hasher.verify("secret", &a));
        assert!(hasher.verify("secret", &b));
        assert!(!hasher.verify("wrong", &a));
        assert!(!hasher.verify("secret", "garbage"));
    }

    #[tokio::test]
    async fn duplicate_email_conflicts_and_first_account_survives() {
        let (_dir, storage) = storage().await;
        let first = signup(&storage, &Sha256Hasher, &req("ada", "ada@example.com"), 100)
            .await
            .unwrap();
        let err = signup(&storage, &Sha256Hasher, &req("other", "ada@example.com"), 100)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::IdentityConflict(ref key) if key == "auth_email_taken"));
        assert!(storage.get_account(first.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn lost_race_conflict_key_names_the_violated_column() {
        let (_dir, storage) = storage().await;
        storage
            .create_account("ada", "ada@example.com", "digest", false, "en", None)
            .await
            .unwrap();

        let err = storage
            .create_account("ada", "other@example.com", "digest", false, "en", None)
            .await
            .unwrap_err();
        let sql = err.downcast::<sqlx::Error>().unwrap();
        assert!(is_unique_violation(&sql));
        assert_eq!(unique_conflict_key(&sql), "auth_username_taken");

        let err = storage
            .create_account("grace", "ada@example.com", "digest", false, "en", None)
            .await
            .unwrap_err();
        let sql = err.downcast::<sqlx::Error>().unwrap();
        assert_eq!(unique_conflict_key(&sql), "auth_email_taken");
    }

    #[test]
    fn referral_link_normalizes_trailing_slash() {
        assert_eq!(
            referral_link("https://fincore.example/", "abc-123"),
            "https://fincore.example/?ref=abc-123"
        );
        assert_eq!(
            referral_link("https://fincore.example", "abc-123"),
            "https://fincore.example/?ref=abc-123"
        );
    }

    #[tokio::test]
    async fn referral_code_attributes_signup() {
        let (_dir, storage) = storage().await;
        let referrer = signup(&storage, &Sha256Hasher, &req("ada", "ada@example.com"), 100)
            .await
            .unwrap();
        let mut referred = req("grace", "grace@example.com");
        referred.referral_code = Some(referrer.referral_code.clone());
        let account = signup(&storage, &Sha256Hasher, &referred, 100).await.unwrap();
        assert_eq!(account.referred_by, Some(referrer.id));
        assert_eq!(storage.count_direct_referrals(referrer.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn unknown_referral_code_is_ignored() {
        let (_dir, storage) = storage().await;
        let mut request = req("ada", "ada@example.com");
        request.referral_code = Some("no-such-code".to_string());
        let account = signup(&storage, &Sha256Hasher, &request, 100).await.unwrap();
        assert_eq!(account.referred_by, None);
    }

    #[tokio::test]
    async fn referral_limit_rejects_signup() {
        let (_dir, storage) = storage().await;
        let referrer = signup(&storage, &Sha256Hasher, &req("ada", "ada@example.com"), 1)
            .await
            .unwrap();
        let mut first = req("grace", "grace@example.com");
        first.referral_code = Some(referrer.referral_code.clone());
        signup(&storage, &Sha256Hasher, &first, 1).await.unwrap();

        let mut second = req("joan", "joan@example.com");
        second.referral_code = Some(referrer.referral_code.clone());
        let err = signup(&storage, &Sha256Hasher, &second, 1).await.unwrap_err();
        assert!(matches!(err, AppError::IdentityConflict(ref key) if key == "auth_referral_limit"));
        assert!(storage.get_account_by_email("joan@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn signin_accepts_good_and_rejects_bad_credentials() {
        let (_dir, storage) = storage().await;
        signup(&storage, &Sha256Hasher, &req("ada", "ada@example.com"), 100)
            .await
            .unwrap();
        let account = signin(&storage, &Sha256Hasher, "ada@example.com", "hunter22")
            .await
            .unwrap();
        assert_eq!(account.username, "ada");
        assert!(matches!(
            signin(&storage, &Sha256Hasher, "ada@example.com", "nope").await,
            Err(AppError::Unauthorized)
        ));
        assert!(matches!(
            signin(&storage, &Sha256Hasher, "ghost@example.com", "hunter22").await,
            Err(AppError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn weak_signup_input_is_field_validated() {
        let (_dir, storage) = storage().await;
        let mut request = req("ab", "not-an-email");
        request.password = "123".to_string();
        let err = signup(&storage, &Sha256Hasher, &request, 100).await.unwrap_err();
        let AppError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(errors.len(), 3);
    }

    #[tokio::test]
    async fn admin_bootstrap_is_idempotent() {
        let (_dir, storage) = storage().await;
        let a = bootstrap_admin(&storage, &Sha256Hasher, "admin@example.com", "secret1", "en")
            .await
            .unwrap();
        let b = bootstrap_admin(&storage, &Sha256Hasher, "admin@example.com", "other-pass", "en")
            .await
            .unwrap();
        assert_eq!(a.id, b.id);
        assert!(a.is_admin);
    }
}
