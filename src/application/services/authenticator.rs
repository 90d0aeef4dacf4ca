//! Caller identity resolution from API keys and session cookies.

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header;
use axum_auth::AuthBearer;
use chrono::Utc;
use std::sync::Arc;

use super::session_service::SessionService;
use crate::domain::entities::{Identity, Session};
use crate::domain::repositories::CredentialStore;
use crate::error::{AuthError, CredentialKind, GuardError};
use crate::pipeline::{Flow, Guard, RequestContext, RequestKind};
use crate::utils::digest::{KeyHasher, log_prefix};

/// Header carrying an API key when `Authorization: Bearer` is not used.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Query parameter carrying an API key (lowest priority).
pub const API_KEY_QUERY: &str = "api_key";

/// Resolves who is calling.
///
/// # Credential Priority
///
/// 1. `Authorization: Bearer <key>`
/// 2. `X-API-Key: <key>`
/// 3. `?api_key=<key>`
/// 4. the session cookie
///
/// No credential at all yields [`Identity::Anonymous`]; whether anonymous
/// access is acceptable is up to the handler.
///
/// API keys are looked up by their HMAC digest. Only an 8-character prefix
/// of that digest is ever logged.
pub struct Authenticator<S: CredentialStore + ?Sized> {
    store: Arc<S>,
    sessions: Arc<SessionService<S>>,
    hasher: KeyHasher,
}

impl<S: CredentialStore + ?Sized + 'static> Authenticator<S> {
    pub fn new(store: Arc<S>, sessions: Arc<SessionService<S>>, hasher: KeyHasher) -> Self {
        Self {
            store,
            sessions,
            hasher,
        }
    }

    /// Resolves the identity of the request.
    ///
    /// On the session path the loaded [`Session`] is stored on the context so
    /// that the CSRF guard can compare against its token.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidCredential`] for an unknown or inactive API key, or a
    ///   session whose user no longer exists
    /// - [`AuthError::AccountBlocked`] if the owning account is not active
    /// - [`AuthError::Store`] if the credential store cannot be reached
    pub async fn authenticate(&self, ctx: &mut RequestContext) -> Result<Identity, AuthError> {
        if let Some(key) = extract_api_key(ctx).await {
            return self.authenticate_key(&key).await;
        }

        let Some(session_id) = ctx.cookie(self.sessions.cookie_name()).map(str::to_string) else {
            return Ok(Identity::Anonymous);
        };

        let Some((identity, session)) = self.authenticate_session(&session_id).await? else {
            return Ok(Identity::Anonymous);
        };
        ctx.session = Some(session);
        Ok(identity)
    }

    async fn authenticate_key(&self, key: &str) -> Result<Identity, AuthError> {
        let key_hash = self.hasher.digest(key);

        let Some(record) = self.store.find_api_key(&key_hash).await? else {
            tracing::debug!(key_prefix = log_prefix(&key_hash), "Unknown API key");
            return Err(AuthError::InvalidCredential(CredentialKind::ApiKey));
        };

        if !record.is_active {
            tracing::debug!(key_prefix = log_prefix(&key_hash), "Inactive API key");
            return Err(AuthError::InvalidCredential(CredentialKind::ApiKey));
        }

        let owner = self
            .store
            .find_account(record.owner_id)
            .await?
            .ok_or(AuthError::InvalidCredential(CredentialKind::ApiKey))?;

        if !owner.status.is_active() {
            tracing::info!(
                key_prefix = log_prefix(&key_hash),
                owner_id = owner.id,
                status = %owner.status,
                "API key owner is blocked"
            );
            return Err(AuthError::AccountBlocked);
        }

        let store = self.store.clone();
        tokio::spawn(async move {
            if let Err(e) = store.touch_api_key(&key_hash, Utc::now()).await {
                tracing::warn!(
                    key_prefix = log_prefix(&key_hash),
                    error = %e,
                    "Failed to update API key last_used_at"
                );
            }
        });

        Ok(Identity::Service {
            key_id: record.id,
            owner_id: record.owner_id,
        })
    }

    /// Loads a live session. `Ok(None)` for a missing or expired session.
    async fn authenticate_session(
        &self,
        session_id: &str,
    ) -> Result<Option<(Identity, Session)>, AuthError> {
        let now = Utc::now();

        let Some(mut session) = self.store.find_session(session_id).await? else {
            return Ok(None);
        };

        if self.sessions.is_expired(&session, now) {
            if let Err(e) = self.store.delete_session(session_id).await {
                tracing::warn!(error = %e, "Failed to delete expired session");
            }
            return Ok(None);
        }

        let identity = match session.user_id {
            Some(user_id) => {
                let account = self
                    .store
                    .find_account(user_id)
                    .await?
                    .ok_or(AuthError::InvalidCredential(CredentialKind::Session))?;

                if !account.status.is_active() {
                    tracing::info!(user_id, status = %account.status, "Blocked account presented a session");
                    return Err(AuthError::AccountBlocked);
                }

                Identity::User {
                    id: account.id,
                    role: account.role,
                    status: account.status,
                }
            }
            None => Identity::Anonymous,
        };

        self.sessions.touch(&mut session, now).await;
        Ok(Some((identity, session)))
    }
}

/// Finds an API key on the request, in priority order. Empty values count as absent.
async fn extract_api_key(ctx: &mut RequestContext) -> Option<String> {
    if ctx.headers().contains_key(header::AUTHORIZATION)
        && let Ok(AuthBearer(token)) = AuthBearer::from_request_parts(ctx.parts_mut(), &()).await
        && !token.trim().is_empty()
    {
        return Some(token.trim().to_string());
    }

    if let Some(key) = ctx.header(API_KEY_HEADER).map(str::trim)
        && !key.is_empty()
    {
        return Some(key.to_string());
    }

    ctx.query_param(API_KEY_QUERY)
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
}

#[async_trait]
impl<S: CredentialStore + ?Sized + 'static> Guard for Authenticator<S> {
    fn name(&self) -> &'static str {
        "authenticator"
    }

    async fn check(&self, ctx: &mut RequestContext) -> Result<Flow, GuardError> {
        let identity = self.authenticate(ctx).await?;

        // First browser contact: issue a session so the next state-changing
        // request has a token to echo.
        if ctx.session.is_none() && !identity.is_service() && ctx.kind() == RequestKind::Browser {
            let session = self
                .sessions
                .start(Utc::now())
                .await
                .map_err(AuthError::Store)?;
            if let Some(cookie) = self.sessions.cookie(&session) {
                ctx.response_headers.append(header::SET_COOKIE, cookie);
            }
            ctx.session = Some(session);
        }

        ctx.identity = identity;
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::domain::entities::{Account, AccountStatus, ApiKeyRecord, Role};
    use crate::domain::repositories::MockCredentialStore;
    use crate::error::StoreError;
    use crate::pipeline::IngressOptions;
    use axum::body::Body;
    use axum::extract::Request;

    const SECRET: &str = "test-signing-secret";

    fn hasher() -> KeyHasher {
        KeyHasher::new(SECRET)
    }

    fn authenticator(store: MockCredentialStore) -> Authenticator<MockCredentialStore> {
        let store = Arc::new(store);
        let sessions = Arc::new(SessionService::new(
            store.clone(),
            SessionConfig::default(),
        ));
        Authenticator::new(store, sessions, hasher())
    }

    fn context(uri: &str, headers: &[(&str, &str)]) -> RequestContext {
        let mut builder = Request::builder().uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        RequestContext::new(
            builder.body(Body::empty()).unwrap(),
            &IngressOptions::default(),
        )
    }

    fn key_record(key: &str, is_active: bool) -> ApiKeyRecord {
        ApiKeyRecord {
            id: 11,
            name: "bot".to_string(),
            key_hash: hasher().digest(key),
            owner_id: 5,
            is_active,
            created_at: Utc::now(),
            last_used_at: None,
        }
    }

    #[tokio::test]
    async fn test_no_credential_is_anonymous() {
        let store = MockCredentialStore::new();
        let mut ctx = context("/api/threads", &[]);

        let identity = authenticator(store).authenticate(&mut ctx).await.unwrap();

        assert_eq!(identity, Identity::Anonymous);
        assert!(ctx.session.is_none());
    }

    #[tokio::test]
    async fn test_valid_bearer_key_yields_service() {
        let expected_hash = hasher().digest("good-key");
        let record = key_record("good-key", true);

        let mut store = MockCredentialStore::new();
        store
            .expect_find_api_key()
            .withf(move |hash| hash == expected_hash)
            .times(1)
            .returning(move |_| Ok(Some(record.clone())));
        store
            .expect_find_account()
            .returning(|id| Ok(Some(Account::new(id, Role::Member, AccountStatus::Active))));
        store.expect_touch_api_key().returning(|_, _| Ok(()));

        let mut ctx = context("/api/threads", &[("authorization", "Bearer good-key")]);
        let identity = authenticator(store).authenticate(&mut ctx).await.unwrap();

        assert_eq!(
            identity,
            Identity::Service {
                key_id: 11,
                owner_id: 5
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_key_is_invalid() {
        let mut store = MockCredentialStore::new();
        store.expect_find_api_key().returning(|_| Ok(None));

        let mut ctx = context("/api/threads", &[("authorization", "Bearer nope")]);
        let result = authenticator(store).authenticate(&mut ctx).await;

        assert!(matches!(
            result,
            Err(AuthError::InvalidCredential(CredentialKind::ApiKey))
        ));
    }

    #[tokio::test]
    async fn test_inactive_key_is_invalid_even_with_correct_digest() {
        let record = key_record("revoked-key", false);
        let mut store = MockCredentialStore::new();
        store
            .expect_find_api_key()
            .returning(move |_| Ok(Some(record.clone())));
        store.expect_find_account().never();

        let mut ctx = context("/api/threads", &[("x-api-key", "revoked-key")]);
        let result = authenticator(store).authenticate(&mut ctx).await;

        assert!(matches!(
            result,
            Err(AuthError::InvalidCredential(CredentialKind::ApiKey))
        ));
    }

    #[tokio::test]
    async fn test_key_of_banned_owner_is_blocked() {
        let record = key_record("k", true);
        let mut store = MockCredentialStore::new();
        store
            .expect_find_api_key()
            .returning(move |_| Ok(Some(record.clone())));
        store
            .expect_find_account()
            .returning(|id| Ok(Some(Account::new(id, Role::Member, AccountStatus::Banned))));

        let mut ctx = context("/api/threads?api_key=k", &[]);
        let result = authenticator(store).authenticate(&mut ctx).await;

        assert!(matches!(result, Err(AuthError::AccountBlocked)));
    }

    #[tokio::test]
    async fn test_bearer_takes_priority_over_header_and_query() {
        let bearer_hash = hasher().digest("from-bearer");
        let mut store = MockCredentialStore::new();
        store
            .expect_find_api_key()
            .withf(move |hash| hash == bearer_hash)
            .times(1)
            .returning(|_| Ok(None));

        let mut ctx = context(
            "/api/threads?api_key=from-query",
            &[
                ("authorization", "Bearer from-bearer"),
                ("x-api-key", "from-header"),
            ],
        );
        let _ = authenticator(store).authenticate(&mut ctx).await;
    }

    #[tokio::test]
    async fn test_store_failure_is_not_anonymous() {
        let mut store = MockCredentialStore::new();
        store
            .expect_find_api_key()
            .returning(|_| Err(StoreError::Unavailable("db down".to_string())));

        let mut ctx = context("/api/threads", &[("x-api-key", "k")]);
        let result = authenticator(store).authenticate(&mut ctx).await;

        assert!(matches!(result, Err(AuthError::Store(_))));
    }

    #[tokio::test]
    async fn test_session_of_active_user() {
        let now = Utc::now();
        let mut session = Session::new("sid".to_string(), "tok".to_string(), now);
        session.user_id = Some(9);

        let mut store = MockCredentialStore::new();
        store
            .expect_find_session()
            .returning(move |_| Ok(Some(session.clone())));
        store
            .expect_find_account()
            .returning(|id| Ok(Some(Account::new(id, Role::Moderator, AccountStatus::Active))));
        store.expect_touch_session().times(1).returning(|_, _| Ok(()));

        let mut ctx = context("/threads", &[("cookie", "forum_session=sid")]);
        let identity = authenticator(store).authenticate(&mut ctx).await.unwrap();

        assert_eq!(
            identity,
            Identity::User {
                id: 9,
                role: Role::Moderator,
                status: AccountStatus::Active
            }
        );
        assert_eq!(ctx.session.as_ref().unwrap().csrf_token, "tok");
    }

    #[tokio::test]
    async fn test_banned_user_session_is_blocked() {
        let now = Utc::now();
        let mut session = Session::new("sid".to_string(), "tok".to_string(), now);
        session.user_id = Some(9);

        let mut store = MockCredentialStore::new();
        store
            .expect_find_session()
            .returning(move |_| Ok(Some(session.clone())));
        store
            .expect_find_account()
            .returning(|id| Ok(Some(Account::new(id, Role::Member, AccountStatus::Banned))));

        let mut ctx = context("/threads", &[("cookie", "forum_session=sid")]);
        let result = authenticator(store).authenticate(&mut ctx).await;

        assert!(matches!(result, Err(AuthError::AccountBlocked)));
    }

    #[tokio::test]
    async fn test_expired_session_is_anonymous_and_deleted() {
        let stale = Utc::now() - chrono::Duration::hours(3);
        let session = Session::new("sid".to_string(), "tok".to_string(), stale);

        let mut store = MockCredentialStore::new();
        store
            .expect_find_session()
            .returning(move |_| Ok(Some(session.clone())));
        store
            .expect_delete_session()
            .times(1)
            .returning(|_| Ok(()));

        let mut ctx = context("/threads", &[("cookie", "forum_session=sid")]);
        let identity = authenticator(store).authenticate(&mut ctx).await.unwrap();

        assert_eq!(identity, Identity::Anonymous);
        assert!(ctx.session.is_none());
    }

    #[tokio::test]
    async fn test_guard_starts_session_for_new_browser() {
        let mut store = MockCredentialStore::new();
        store
            .expect_insert_session()
            .times(1)
            .returning(|_| Ok(()));

        let mut ctx = context("/threads", &[("accept", "text/html")]);
        let flow = authenticator(store).check(&mut ctx).await.unwrap();

        assert!(matches!(flow, Flow::Continue));
        assert!(ctx.session.is_some());
        assert!(
            ctx.response_headers[header::SET_COOKIE]
                .to_str()
                .unwrap()
                .starts_with("forum_session=")
        );
    }

    #[tokio::test]
    async fn test_guard_does_not_start_session_for_api() {
        let mut store = MockCredentialStore::new();
        store.expect_insert_session().never();

        let mut ctx = context("/api/threads", &[]);
        authenticator(store).check(&mut ctx).await.unwrap();

        assert!(ctx.session.is_none());
        assert!(ctx.response_headers.get(header::SET_COOKIE).is_none());
    }
}
