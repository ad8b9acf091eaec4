//! Credential resolution.
//!
//! A token is looked up through a fixed cascade:
//! 1. the token cached in the secure store
//! 2. auto-detection from Claude tooling (credential files, then the
//!    platform credential manager where there is one)
//! 3. nothing, in which case the caller has to ask the user
//!
//! Auto-detected tokens are promoted into the cache. Expiry is not checked
//! here; a stale token is discovered by the next failed fetch.

pub mod shapes;
pub mod sources;
pub mod store;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::models::usage::StoredToken;
use sources::CredentialSource;
use store::{SecretStore, StoreError, ACCESS_TOKEN_KEY, EXPIRES_AT_KEY, REFRESH_TOKEN_KEY};

/// Tokens shorter than this are rejected at the prompt.
pub const MIN_TOKEN_LEN: usize = 10;
const PROMPT_ATTEMPTS: usize = 3;

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Secure storage failed: {0}")]
    Store(#[from] StoreError),
    #[error("Token too short (minimum 10 characters)")]
    TokenTooShort,
    #[error("Prompt failed: {0}")]
    Prompt(String),
}

/// Interactive secret entry. Returns `Ok(None)` when the user cancels or
/// enters nothing.
pub trait SecretPrompt {
    fn ask(&self, title: &str, hint: &str) -> Result<Option<String>, CredentialError>;

    /// Tell the user why the previous answer was rejected.
    fn reject(&self, _reason: &str) {}
}

pub struct CredentialResolver {
    store: Box<dyn SecretStore>,
    sources: Vec<Box<dyn CredentialSource>>,
}

impl CredentialResolver {
    pub fn new(store: Box<dyn SecretStore>, sources: Vec<Box<dyn CredentialSource>>) -> Self {
        Self { store, sources }
    }

    /// Cached token first, then auto-detection when enabled.
    pub async fn get_token(&self, auto_detect: bool) -> Option<StoredToken> {
        if let Some(token) = self.cached() {
            debug!(token = %format!("…{}", token.suffix()), "Token loaded from secure storage");
            return Some(token);
        }

        if auto_detect {
            if let Some(token) = self.detect().await {
                info!("Token auto-detected, caching in secure storage");
                self.promote(&token);
                return Some(token);
            }
        }

        None
    }

    /// Re-run auto-detection, ignoring the cache. Used after the cached
    /// token was rejected upstream.
    pub async fn refresh_from_auto_detect(&self) -> Option<StoredToken> {
        let token = self.detect().await?;
        self.promote(&token);
        Some(token)
    }

    /// Upsert all fields; absent optional fields are removed from the store.
    pub fn save_token(&self, token: &StoredToken) -> Result<(), CredentialError> {
        self.store.set(ACCESS_TOKEN_KEY, &token.access_token)?;
        match &token.refresh_token {
            Some(refresh) => self.store.set(REFRESH_TOKEN_KEY, refresh)?,
            None => self.store.delete(REFRESH_TOKEN_KEY)?,
        }
        match token.expires_at_epoch_ms {
            Some(expires) => self.store.set(EXPIRES_AT_KEY, &expires.to_string())?,
            None => self.store.delete(EXPIRES_AT_KEY)?,
        }
        Ok(())
    }

    pub fn clear_token(&self) -> Result<(), CredentialError> {
        self.store.delete(ACCESS_TOKEN_KEY)?;
        self.store.delete(REFRESH_TOKEN_KEY)?;
        self.store.delete(EXPIRES_AT_KEY)?;
        Ok(())
    }

    /// Ask the user for a token, validate it and persist it.
    pub fn prompt_for_token(
        &self,
        prompt: &dyn SecretPrompt,
    ) -> Result<Option<StoredToken>, CredentialError> {
        let mut access_token = None;
        for _ in 0..PROMPT_ATTEMPTS {
            let Some(answer) = prompt.ask(
                "Access token",
                "Paste your Claude OAuth access token (stored in the OS keyring)",
            )?
            else {
                return Ok(None);
            };
            let answer = answer.trim();
            if answer.is_empty() {
                return Ok(None);
            }
            if answer.chars().count() < MIN_TOKEN_LEN {
                prompt.reject("Token too short");
                continue;
            }
            access_token = Some(answer.to_string());
            break;
        }
        let access_token = access_token.ok_or(CredentialError::TokenTooShort)?;

        let refresh_token = prompt
            .ask("Refresh token (optional)", "Leave empty to skip")?
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        let token = StoredToken {
            access_token,
            refresh_token,
            expires_at_epoch_ms: None,
        };
        self.save_token(&token)?;
        Ok(Some(token))
    }

    /// The cached token, if any. Storage failures read as "no token".
    pub fn cached(&self) -> Option<StoredToken> {
        let read = |key: &str| match self.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Secure storage read failed");
                None
            }
        };

        let access_token = read(ACCESS_TOKEN_KEY).filter(|t| !t.is_empty())?;
        Some(StoredToken {
            access_token,
            refresh_token: read(REFRESH_TOKEN_KEY),
            expires_at_epoch_ms: read(EXPIRES_AT_KEY).and_then(|s| s.parse().ok()),
        })
    }

    /// Names of the auto-detection sources, in cascade order.
    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    async fn detect(&self) -> Option<StoredToken> {
        for source in &self.sources {
            debug!(source = source.name(), "Probing credential source");
            if let Some(token) = source.probe().await {
                info!(
                    source = source.name(),
                    token = %format!("…{}", token.suffix()),
                    "Credentials auto-detected"
                );
                return Some(token);
            }
        }
        debug!("No credential source produced a token");
        None
    }

    fn promote(&self, token: &StoredToken) {
        if let Err(e) = self.save_token(token) {
            warn!(error = %e, "Could not cache auto-detected token");
        }
    }
}


#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::store::memory::MemoryStore;
    use super::testing::ScriptedSource;
    use super::*;

    fn resolver(store: &MemoryStore, sources: Vec<ScriptedSource>) -> CredentialResolver {
        CredentialResolver::new(
            Box::new(store.clone()),
            sources
                .into_iter()
                .map(|s| Box::new(s) as Box<dyn CredentialSource>)
                .collect(),
        )
    }

    fn token(access: &str) -> StoredToken {
        StoredToken::new(access)
    }

    struct ScriptedPrompt {
        answers: RefCell<Vec<Option<String>>>,
        rejections: RefCell<Vec<String>>,
    }

    impl ScriptedPrompt {
        fn new(answers: &[Option<&str>]) -> Self {
            Self {
                answers: RefCell::new(answers.iter().map(|a| a.map(String::from)).collect()),
                rejections: RefCell::default(),
            }
        }
    }

    impl SecretPrompt for ScriptedPrompt {
        fn ask(&self, _title: &str, _hint: &str) -> Result<Option<String>, CredentialError> {
            let mut answers = self.answers.borrow_mut();
            Ok(if answers.is_empty() { None } else { answers.remove(0) })
        }

        fn reject(&self, reason: &str) {
            self.rejections.borrow_mut().push(reason.to_string());
        }
    }

    #[tokio::test]
    async fn cached_token_short_circuits_detection() {
        let store = MemoryStore::default();
        store.set(ACCESS_TOKEN_KEY, "cached-token-1234").unwrap();
        let source = ScriptedSource::always(Some(token("detected")));
        let resolver = resolver(&store, vec![source.clone()]);

        let found = resolver.get_token(true).await.unwrap();
        assert_eq!(found.access_token, "cached-token-1234");
        assert_eq!(source.probes(), 0);
    }

    #[tokio::test]
    async fn detected_token_is_promoted_into_cache() {
        let store = MemoryStore::default();
        let detected = StoredToken {
            access_token: "detected-access".to_string(),
            refresh_token: Some("detected-refresh".to_string()),
            expires_at_epoch_ms: Some(1_800_000_000_000),
        };
        let resolver = resolver(&store, vec![ScriptedSource::always(Some(detected.clone()))]);

        assert_eq!(resolver.get_token(true).await, Some(detected.clone()));
        assert_eq!(resolver.cached(), Some(detected));
    }

    #[tokio::test]
    async fn auto_detect_disabled_returns_none() {
        let store = MemoryStore::default();
        let source = ScriptedSource::always(Some(token("detected")));
        let resolver = resolver(&store, vec![source.clone()]);

        assert!(resolver.get_token(false).await.is_none());
        assert_eq!(source.probes(), 0);
    }

    #[tokio::test]
    async fn sources_are_probed_in_order_until_one_succeeds() {
        let store = MemoryStore::default();
        let empty = ScriptedSource::always(None);
        let hit = ScriptedSource::always(Some(token("second-source")));
        let never = ScriptedSource::always(Some(token("third-source")));
        let resolver = resolver(&store, vec![empty.clone(), hit.clone(), never.clone()]);

        let found = resolver.get_token(true).await.unwrap();
        assert_eq!(found.access_token, "second-source");
        assert_eq!(empty.probes(), 1);
        assert_eq!(hit.probes(), 1);
        assert_eq!(never.probes(), 0);
    }

    #[tokio::test]
    async fn exhausted_cascade_is_none() {
        let store = MemoryStore::default();
        let resolver = resolver(&store, vec![ScriptedSource::always(None)]);
        assert!(resolver.get_token(true).await.is_none());
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn refresh_from_auto_detect_bypasses_cache() {
        let store = MemoryStore::default();
        store.set(ACCESS_TOKEN_KEY, "stale-cached").unwrap();
        let source = ScriptedSource::always(Some(token("fresh-detected")));
        let resolver = resolver(&store, vec![source.clone()]);

        let found = resolver.refresh_from_auto_detect().await.unwrap();
        assert_eq!(found.access_token, "fresh-detected");
        assert_eq!(source.probes(), 1);
        assert_eq!(resolver.cached().unwrap().access_token, "fresh-detected");
    }

    #[tokio::test]
    async fn refresh_from_auto_detect_with_nothing_keeps_cache() {
        let store = MemoryStore::default();
        store.set(ACCESS_TOKEN_KEY, "stale-cached").unwrap();
        let resolver = resolver(&store, vec![ScriptedSource::always(None)]);

        assert!(resolver.refresh_from_auto_detect().await.is_none());
        assert_eq!(resolver.cached().unwrap().access_token, "stale-cached");
    }

    #[test]
    fn save_token_removes_absent_optional_fields() {
        let store = MemoryStore::default();
        let resolver = resolver(&store, vec![]);
        resolver
            .save_token(&StoredToken {
                access_token: "first".to_string(),
                refresh_token: Some("refresh".to_string()),
                expires_at_epoch_ms: Some(5),
            })
            .unwrap();
        resolver.save_token(&token("second")).unwrap();

        let stored = store.snapshot();
        assert_eq!(stored.get(ACCESS_TOKEN_KEY).map(String::as_str), Some("second"));
        assert!(!stored.contains_key(REFRESH_TOKEN_KEY));
        assert!(!stored.contains_key(EXPIRES_AT_KEY));
    }

    #[test]
    fn clear_token_wipes_everything() {
        let store = MemoryStore::default();
        let resolver = resolver(&store, vec![]);
        resolver
            .save_token(&StoredToken {
                access_token: "a".to_string(),
                refresh_token: Some("r".to_string()),
                expires_at_epoch_ms: Some(1),
            })
            .unwrap();
        resolver.clear_token().unwrap();
        assert!(store.snapshot().is_empty());
        assert!(resolver.cached().is_none());
    }

    #[test]
    fn unparseable_expiry_in_cache_is_dropped() {
        let store = MemoryStore::default();
        store.set(ACCESS_TOKEN_KEY, "access").unwrap();
        store.set(EXPIRES_AT_KEY, "soon").unwrap();
        let resolver = resolver(&store, vec![]);
        assert_eq!(resolver.cached().unwrap().expires_at_epoch_ms, None);
    }

    #[test]
    fn prompt_saves_trimmed_token() {
        let store = MemoryStore::default();
        let resolver = resolver(&store, vec![]);
        let prompt = ScriptedPrompt::new(&[Some("  sk-ant-oat01-pasted  "), Some("")]);

        let token = resolver.prompt_for_token(&prompt).unwrap().unwrap();
        assert_eq!(token.access_token, "sk-ant-oat01-pasted");
        assert_eq!(token.refresh_token, None);
        assert_eq!(resolver.cached(), Some(token));
    }

    #[test]
    fn prompt_rejects_short_tokens_then_accepts() {
        let store = MemoryStore::default();
        let resolver = resolver(&store, vec![]);
        let prompt = ScriptedPrompt::new(&[Some("short"), Some("long-enough-token"), Some("rt-1")]);

        let token = resolver.prompt_for_token(&prompt).unwrap().unwrap();
        assert_eq!(token.access_token, "long-enough-token");
        assert_eq!(token.refresh_token.as_deref(), Some("rt-1"));
        assert_eq!(prompt.rejections.borrow().as_slice(), ["Token too short"]);
    }

    #[test]
    fn prompt_gives_up_after_repeated_short_tokens() {
        let store = MemoryStore::default();
        let resolver = resolver(&store, vec![]);
        let prompt = ScriptedPrompt::new(&[Some("a"), Some("b"), Some("c")]);

        let err = resolver.prompt_for_token(&prompt).unwrap_err();
        assert!(matches!(err, CredentialError::TokenTooShort));
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn prompt_cancel_saves_nothing() {
        let store = MemoryStore::default();
        let resolver = resolver(&store, vec![]);
        let prompt = ScriptedPrompt::new(&[None]);

        assert!(resolver.prompt_for_token(&prompt).unwrap().is_none());
        assert!(store.snapshot().is_empty());
    }
}
