use chrono::{DateTime, TimeZone, Utc};
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::jwt::{user_from_claims, validate_claims};

/// Authenticated caller context handed explicitly to the booking orchestrator
/// and the admin panel.
///
/// A session starts inactive. [`Session::init`] validates a bearer token and
/// activates it; [`Session::teardown`] drops the credential. Nothing else
/// holds auth state.
#[derive(Debug, Clone)]
pub struct Session {
    jwt_secret: String,
    token: Option<String>,
    user: Option<User>,
    expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            jwt_secret: config.supabase_jwt_secret.clone(),
            token: None,
            user: None,
            expires_at: None,
        }
    }

    /// Session for a request whose token the auth middleware already checked.
    pub fn authenticated(config: &AppConfig, token: &str, user: User) -> Self {
        Self {
            jwt_secret: config.supabase_jwt_secret.clone(),
            token: Some(token.to_string()),
            user: Some(user),
            expires_at: None,
        }
    }

    pub fn init(&mut self, token: &str) -> Result<&User, AppError> {
        let claims = validate_claims(token, &self.jwt_secret).map_err(AppError::Auth)?;

        self.expires_at = claims
            .exp
            .and_then(|exp| Utc.timestamp_opt(exp as i64, 0).single());
        self.token = Some(token.to_string());
        let user = self.user.insert(user_from_claims(claims));

        info!("Session started for user {}", user.id);
        Ok(user)
    }

    pub fn teardown(&mut self) {
        if let Some(user) = self.user.take() {
            debug!("Session ended for user {}", user.id);
        }
        self.token = None;
        self.expires_at = None;
    }

    pub fn is_active(&self) -> bool {
        self.user.is_some()
            && self.expires_at.map_or(true, |exp| exp > Utc::now())
    }

    pub fn user(&self) -> Result<&User, AppError> {
        if !self.is_active() {
            return Err(AppError::Auth("Session is not active, please sign in again".to_string()));
        }
        self.user
            .as_ref()
            .ok_or_else(|| AppError::Auth("Session is not active, please sign in again".to_string()))
    }

    pub fn bearer(&self) -> Result<&str, AppError> {
        self.user()?;
        self.token
            .as_deref()
            .ok_or_else(|| AppError::Auth("Session has no credential".to_string()))
    }

    pub fn require_admin(&self) -> Result<&User, AppError> {
        let user = self.user()?;
        if !user.is_admin() {
            return Err(AppError::Forbidden("Administrator role required".to_string()));
        }
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::test_utils::{JwtTestUtils, TestConfig, TestUser};

    #[test]
    fn init_and_teardown_control_activity() {
        let config = TestConfig::default();
        let user = TestUser::patient("min@example.com");
        let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(1));

        let mut session = Session::new(&config.to_app_config());
        assert!(!session.is_active());
        assert_matches!(session.user(), Err(AppError::Auth(_)));

        session.init(&token).unwrap();
        assert!(session.is_active());
        assert_eq!(session.user().unwrap().id, user.id);
        assert_eq!(session.bearer().unwrap(), token);

        session.teardown();
        assert!(!session.is_active());
        assert_matches!(session.bearer(), Err(AppError::Auth(_)));
    }

    #[test]
    fn expired_token_does_not_start_a_session() {
        let config = TestConfig::default();
        let user = TestUser::patient("min@example.com");
        let token = JwtTestUtils::create_expired_token(&user, &config.jwt_secret);

        let mut session = Session::new(&config.to_app_config());
        assert_matches!(session.init(&token), Err(AppError::Auth(_)));
        assert!(!session.is_active());
    }

    #[test]
    fn admin_check_uses_role_claim() {
        let config = TestConfig::default();
        let patient = TestUser::patient("min@example.com");
        let admin = TestUser::admin("ops@example.com");

        let session = Session::authenticated(&config.to_app_config(), "t", patient.to_user());
        assert_matches!(session.require_admin(), Err(AppError::Forbidden(_)));

        let session = Session::authenticated(&config.to_app_config(), "t", admin.to_user());
        assert!(session.require_admin().is_ok());
    }
}
