use std::sync::Arc;

use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use super::{
    claims::{Identity, ADMIN_ROLE, DEFAULT_ROLE},
    dto::{LoginRequest, PublicUser, SignupRequest},
    jwt::JwtKeys,
    password::PasswordHasher,
    repo::UserStore,
    repo_types::NewUser,
};
use crate::{
    error::{AppError, StoreError},
    state::AppState,
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Returns the trimmed value, or `None` when missing or blank.
fn present(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Compared against on unknown-email logins so both failure paths pay for a
/// bcrypt verify.
const DUMMY_HASH: &str = "$2b$10$N9qo8uLOickgx2ZMRZoMyeIjZAgcfl7p92ldGxad68LJZdL17lhWy";

/// Successful signup or login.
#[derive(Debug)]
pub struct Session {
    pub token: String,
    pub user: PublicUser,
}

/// Signup and login over a credential store.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    hasher: PasswordHasher,
    keys: JwtKeys,
}

impl FromRef<AppState> for AuthService {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.users.clone(), state.hasher, state.jwt.clone())
    }
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, hasher: PasswordHasher, keys: JwtKeys) -> Self {
        Self {
            users,
            hasher,
            keys,
        }
    }

    #[instrument(skip_all)]
    pub async fn signup(&self, req: SignupRequest) -> Result<Session, AppError> {
        let (Some(name), Some(email), Some(password)) = (
            present(req.name),
            present(req.email),
            // passwords are taken verbatim, only emptiness is checked
            req.password.filter(|p| !p.is_empty()),
        ) else {
            return Err(AppError::Validation(
                "Name, email, and password required".into(),
            ));
        };

        let email = normalize_email(&email);
        if !is_valid_email(&email) {
            warn!(%email, "invalid email");
            return Err(AppError::Validation("Invalid email".into()));
        }

        let role = present(req.role).unwrap_or_else(|| DEFAULT_ROLE.to_string());
        if role.eq_ignore_ascii_case(ADMIN_ROLE) {
            warn!(%email, "signup requested admin role");
            return Err(AppError::Validation(
                "Admin role cannot be self-assigned".into(),
            ));
        }

        if self.users.find_by_email(&email).await?.is_some() {
            warn!(%email, "email already registered");
            return Err(AppError::DuplicateEmail);
        }

        let password_hash = self.hasher.hash_blocking(password).await?;

        let user = self
            .users
            .insert(NewUser {
                name,
                email,
                password_hash,
                role,
            })
            .await
            .map_err(|e| match e {
                StoreError::ConstraintViolation(c) => {
                    warn!(constraint = %c, "concurrent signup lost the race");
                    AppError::DuplicateEmail
                }
                other => AppError::Store(other),
            })?;

        let token = self.keys.issue(&Identity {
            id: user.id,
            role: user.role.clone(),
        })?;

        info!(user_id = %user.id, email = %user.email, "user registered");
        Ok(Session {
            token,
            user: user.into(),
        })
    }

    #[instrument(skip_all)]
    pub async fn login(&self, req: LoginRequest) -> Result<Session, AppError> {
        let (Some(email), Some(password)) =
            (present(req.email), req.password.filter(|p| !p.is_empty()))
        else {
            return Err(AppError::Validation("Email and password required".into()));
        };
        let email = normalize_email(&email);

        let Some(user) = self.users.find_by_email(&email).await? else {
            let _ = self
                .hasher
                .verify_blocking(password, DUMMY_HASH.to_string())
                .await;
            warn!(%email, "login unknown email");
            return Err(AppError::InvalidCredentials);
        };

        let ok = self
            .hasher
            .verify_blocking(password, user.password_hash.clone())
            .await?;
        if !ok {
            warn!(%email, user_id = %user.id, "login invalid password");
            return Err(AppError::InvalidCredentials);
        }

        let token = self.keys.issue(&Identity {
            id: user.id,
            role: user.role.clone(),
        })?;

        info!(user_id = %user.id, email = %user.email, "user logged in");
        Ok(Session {
            token,
            user: user.into(),
        })
    }

    pub async fn profile(&self, identity: &Identity) -> Result<PublicUser, AppError> {
        self.users
            .find_by_id(identity.id)
            .await?
            .map(PublicUser::from)
            .ok_or(AppError::NotFound("User"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo::memory::MemoryUserStore;
    use crate::config::JwtConfig;

    fn service() -> (AuthService, Arc<MemoryUserStore>, JwtKeys) {
        let store = Arc::new(MemoryUserStore::default());
        let keys = JwtKeys::new(&JwtConfig {
            secret: "test-secret".into(),
            ttl_minutes: 60,
        });
        let svc = AuthService::new(store.clone(), PasswordHasher::new(4), keys.clone());
        (svc, store, keys)
    }

    fn signup_req(email: &str) -> SignupRequest {
        SignupRequest {
            name: Some("Ada".into()),
            email: Some(email.into()),
            password: Some("hunter22".into()),
            role: None,
        }
    }

    fn login_req(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: Some(email.into()),
            password: Some(password.into()),
        }
    }

    #[test]
    fn email_shape() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.d"));
        assert!(!is_valid_email("plain"));
    }

    #[tokio::test]
    async fn signup_issues_token_with_default_role() {
        let (svc, store, keys) = service();
        let session = svc.signup(signup_req(" Ada@Example.com ")).await.unwrap();

        assert_eq!(session.user.email, "ada@example.com");
        assert_eq!(session.user.role, "user");
        let who = keys.verify(&session.token).unwrap();
        assert_eq!(who.id, session.user.id);
        assert_eq!(who.role, "user");

        let stored = store.find_by_email("ada@example.com").await.unwrap().unwrap();
        assert_ne!(stored.password_hash, "hunter22");
    }

    #[tokio::test]
    async fn signup_refuses_admin_role() {
        let (svc, store, _) = service();
        for role in ["admin", " ADMIN "] {
            let mut req = signup_req("root@example.com");
            req.role = Some(role.into());
            let err = svc.signup(req).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "{err:?}");
        }
        assert_eq!(store.len(), 0);

        let mut req = signup_req("editor@example.com");
        req.role = Some("editor".into());
        assert_eq!(svc.signup(req).await.unwrap().user.role, "editor");
    }

    #[test]
    fn dummy_hash_is_well_formed() {
        assert!(!PasswordHasher::new(4).verify("hunter22", DUMMY_HASH).unwrap());
    }

    #[tokio::test]
    async fn signup_requires_all_fields() {
        let (svc, store, _) = service();
        for req in [
            SignupRequest {
                name: None,
                ..signup_req("a@b.co")
            },
            SignupRequest {
                email: Some("   ".into()),
                ..signup_req("a@b.co")
            },
            SignupRequest {
                password: Some(String::new()),
                ..signup_req("a@b.co")
            },
        ] {
            let err = svc.signup(req).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)), "{err:?}");
        }
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn duplicate_email_leaves_store_unchanged() {
        let (svc, store, _) = service();
        svc.signup(signup_req("dup@example.com")).await.unwrap();
        let err = svc.signup(signup_req("DUP@example.com")).await.unwrap_err();
        assert!(matches!(err, AppError::DuplicateEmail));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_signups_yield_one_user() {
        let (svc, store, _) = service();
        let (a, b) = tokio::join!(
            svc.signup(signup_req("race@example.com")),
            svc.signup(signup_req("race@example.com"))
        );
        let outcomes = [a, b];
        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes
            .iter()
            .any(|r| matches!(r, Err(AppError::DuplicateEmail))));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn login_roundtrip() {
        let (svc, _, keys) = service();
        let created = svc.signup(signup_req("me@example.com")).await.unwrap();
        let session = svc.login(login_req("me@example.com", "hunter22")).await.unwrap();
        assert_eq!(session.user, created.user);
        assert_eq!(keys.verify(&session.token).unwrap().id, created.user.id);
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let (svc, _, _) = service();
        svc.signup(signup_req("me@example.com")).await.unwrap();

        let wrong_pw = svc
            .login(login_req("me@example.com", "nope"))
            .await
            .unwrap_err();
        let no_user = svc
            .login(login_req("ghost@example.com", "hunter22"))
            .await
            .unwrap_err();

        assert!(matches!(wrong_pw, AppError::InvalidCredentials));
        assert!(matches!(no_user, AppError::InvalidCredentials));
        assert_eq!(wrong_pw.to_string(), no_user.to_string());
        assert_eq!(wrong_pw.status(), no_user.status());
    }

    #[tokio::test]
    async fn login_requires_both_fields() {
        let (svc, _, _) = service();
        let err = svc
            .login(LoginRequest {
                email: Some("me@example.com".into()),
                password: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn profile_reads_store() {
        let (svc, _, keys) = service();
        let session = svc.signup(signup_req("p@example.com")).await.unwrap();
        let who = keys.verify(&session.token).unwrap();
        assert_eq!(svc.profile(&who).await.unwrap(), session.user);

        let stranger = Identity {
            id: uuid::Uuid::new_v4(),
            role: "user".into(),
        };
        assert!(matches!(
            svc.profile(&stranger).await,
            Err(AppError::NotFound("User"))
        ));
    }
}
