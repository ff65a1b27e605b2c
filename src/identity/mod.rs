//! Actor resolution — maps an inbound request to the identity that owns its
//! trail of records.
//!
//! Anonymous visitors are identified by a server-side session token minted on
//! first contact (UUID v4, 36-character form) and persisted with an absolute
//! 30-day expiry. A session bound to an account resolves to that account; the
//! token is kept alongside it for analytics correlation only.

use axum::http::header::{ACCEPT_LANGUAGE, COOKIE};
use axum::http::HeaderMap;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::warn;
use uuid::Uuid;

use crate::storage::Storage;

pub const SESSION_COOKIE: &str = "fincore_sid";

/// The resolved identity that owns a trail of records for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    Account { id: i64, session_token: String },
    Anonymous { session_token: String },
}

impl Actor {
    /// Trail key used to scope drafts, results, bills, and progress.
    /// An account keys its own trail; it does not inherit the anonymous
    /// trail of the session it signed in from.
    pub fn key(&self) -> String {
        match self {
            Actor::Account { id, .. } => format!("account:{id}"),
            Actor::Anonymous { session_token } => format!("session:{session_token}"),
        }
    }

    pub fn account_id(&self) -> Option<i64> {
        match self {
            Actor::Account { id, .. } => Some(*id),
            Actor::Anonymous { .. } => None,
        }
    }

    pub fn session_token(&self) -> &str {
        match self {
            Actor::Account { session_token, .. } | Actor::Anonymous { session_token } => {
                session_token
            }
        }
    }
}

/// Result of identity resolution for one request.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub actor: Actor,
    /// Set when a fresh token was minted this request — the response must
    /// carry a matching `Set-Cookie`.
    pub minted: Option<String>,
    /// Language tag resolved from `Accept-Language` ("en" | "ha").
    pub lang: String,
}

impl Resolved {
    /// `Set-Cookie` header value for a freshly minted token, if any.
    pub fn set_cookie(&self, ttl_days: i64) -> Option<String> {
        self.minted.as_ref().map(|token| {
            format!(
                "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
                ttl_days * 86_400
            )
        })
    }
}

pub struct IdentityResolver {
    storage: Arc<Storage>,
    ttl_days: i64,
    default_lang: String,
    /// Tokens minted while session storage was unavailable. They live for
    /// the process lifetime only — the explicit degradation policy instead
    /// of failing the request.
    fallback_tokens: Mutex<HashSet<String>>,
}

impl IdentityResolver {
    pub fn new(storage: Arc<Storage>, ttl_days: i64, default_lang: String) -> Self {
        Self {
            storage,
            ttl_days,
            default_lang,
            fallback_tokens: Mutex::new(HashSet::new()),
        }
    }

    /// Resolve the actor for a request. Mints and persists a token on first
    /// contact; replaces expired or unknown tokens with a fresh mint.
    pub async fn resolve(&self, headers: &HeaderMap) -> Resolved {
        let lang = self.resolve_lang(headers);
        let presented = cookie_value(headers, SESSION_COOKIE);

        if let Some(token) = presented {
            if self.is_fallback(&token) {
                return Resolved {
                    actor: Actor::Anonymous { session_token: token },
                    minted: None,
                    lang,
                };
            }
            match self.storage.get_session(&token).await {
                Ok(Some(row)) if row.expires_at > chrono::Utc::now().to_rfc3339() => {
                    let actor = match row.account_id {
                        Some(id) => Actor::Account { id, session_token: token },
                        None => Actor::Anonymous { session_token: token },
                    };
                    return Resolved { actor, minted: None, lang };
                }
                Ok(_) => {} // unknown or expired — fall through to mint
                Err(e) => {
                    warn!(err = %e, "session lookup failed — minting in-process token");
                    return self.mint_fallback(lang);
                }
            }
        }

        self.mint(lang).await
    }

    async fn mint(&self, lang: String) -> Resolved {
        let token = Uuid::new_v4().to_string();
        match self.storage.create_session(&token, self.ttl_days).await {
            Ok(()) => Resolved {
                actor: Actor::Anonymous { session_token: token.clone() },
                minted: Some(token),
                lang,
            },
            Err(e) => {
                warn!(err = %e, "session persist failed — degrading to in-process token");
                self.mint_fallback(lang)
            }
        }
    }

    fn mint_fallback(&self, lang: String) -> Resolved {
        let token = Uuid::new_v4().to_string();
        if let Ok(mut set) = self.fallback_tokens.lock() {
            set.insert(token.clone());
        }
        Resolved {
            actor: Actor::Anonymous { session_token: token.clone() },
            minted: Some(token),
            lang,
        }
    }

    fn is_fallback(&self, token: &str) -> bool {
        self.fallback_tokens
            .lock()
            .map(|set| set.contains(token))
            .unwrap_or(false)
    }

    /// Resolve the language tag from `Accept-Language`. The service only
    /// distinguishes "en" and "ha"; the translation catalog itself is an
    /// external collaborator.
    pub fn resolve_lang(&self, headers: &HeaderMap) -> String {
        let accept = headers
            .get(ACCEPT_LANGUAGE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        for part in accept.split(',') {
            let tag = part.split(';').next().unwrap_or("").trim().to_lowercase();
            if tag == "ha" || tag.starts_with("ha-") {
                return "ha".to_string();
            }
            if tag == "en" || tag.starts_with("en-") {
                return "en".to_string();
            }
        }
        self.default_lang.clone()
    }
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(COOKIE)?.to_str().ok()?;
    for pair in raw.split(';') {
        let mut parts = pair.trim().splitn(2, '=');
        if parts.next() == Some(name) {
            return parts.next().map(|v| v.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(storage: Arc<Storage>) -> IdentityResolver {
        IdentityResolver::new(storage, 30, "en".to_string())
    }

    async fn storage() -> (tempfile::TempDir, Arc<Storage>) {
        let dir = tempfile::tempdir().unwrap();
        let s = Arc::new(Storage::new(dir.path()).await.unwrap());
        (dir, s)
    }

    fn headers_with_cookie(token: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(COOKIE, format!("{SESSION_COOKIE}={token}").parse().unwrap());
        h
    }

    #[tokio::test]
    async fn first_contact_mints_and_persists_token() {
        let (_dir, s) = storage().await;
        let r = resolver(s.clone());
        let resolved = r.resolve(&HeaderMap::new()).await;
        let token = resolved.actor.session_token().to_string();
        assert_eq!(token.len(), 36);
        assert_eq!(resolved.minted.as_deref(), Some(token.as_str()));
        assert!(s.get_session(&token).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn known_token_is_stable_across_requests() {
        let (_dir, s) = storage().await;
        let r = resolver(s.clone());
        let first = r.resolve(&HeaderMap::new()).await;
        let token = first.actor.session_token().to_string();
        let second = r.resolve(&headers_with_cookie(&token)).await;
        assert_eq!(second.actor.session_token(), token);
        assert!(second.minted.is_none());
    }

    #[tokio::test]
    async fn unknown_token_is_replaced_by_fresh_mint() {
        let (_dir, s) = storage().await;
        let r = resolver(s.clone());
        let resolved = r.resolve(&headers_with_cookie("not-a-known-token")).await;
        assert_ne!(resolved.actor.session_token(), "not-a-known-token");
        assert!(resolved.minted.is_some());
    }

    #[tokio::test]
    async fn bound_session_resolves_to_account() {
        let (_dir, s) = storage().await;
        let acct = s
            .create_account("ada", "ada@example.com", "digest", false, "en", None)
            .await
            .unwrap();
        let r = resolver(s.clone());
        let anon = r.resolve(&HeaderMap::new()).await;
        let token = anon.actor.session_token().to_string();
        s.bind_session_account(&token, acct.id, 30).await.unwrap();

        let resolved = r.resolve(&headers_with_cookie(&token)).await;
        assert_eq!(resolved.actor.account_id(), Some(acct.id));
        // token retained for analytics correlation
        assert_eq!(resolved.actor.session_token(), token);
        // but the trail is keyed by the account, not the session
        assert_eq!(resolved.actor.key(), format!("account:{}", acct.id));
    }

    #[tokio::test]
    async fn lang_resolution_prefers_hausa_when_listed_first() {
        let (_dir, s) = storage().await;
        let r = resolver(s);
        let mut h = HeaderMap::new();
        h.insert(ACCEPT_LANGUAGE, "ha-NG,en;q=0.8".parse().unwrap());
        assert_eq!(r.resolve_lang(&h), "ha");
        h.insert(ACCEPT_LANGUAGE, "fr-FR,de;q=0.5".parse().unwrap());
        assert_eq!(r.resolve_lang(&h), "en"); // default
    }

    #[test]
    fn set_cookie_carries_absolute_max_age() {
        let resolved = Resolved {
            actor: Actor::Anonymous { session_token: "tok".to_string() },
            minted: Some("tok".to_string()),
            lang: "en".to_string(),
        };
        let cookie = resolved.set_cookie(30).unwrap();
        assert!(cookie.contains("fincore_sid=tok"));
        assert!(cookie.contains("Max-Age=2592000"));
        assert!(cookie.contains("HttpOnly"));
    }
}
