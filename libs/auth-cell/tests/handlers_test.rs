use assert_matches::assert_matches;
use axum::{extract::State, http::{HeaderMap, HeaderValue}};

use auth_cell::handlers::{validate_token, verify_token};
use shared_models::error::AppError;
use shared_utils::test_utils::{JwtTestUtils, TestState, TestUser};

fn create_auth_header(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        "authorization",
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );
    headers
}

#[tokio::test]
async fn test_validate_token_success() {
    let test = TestState::new();
    let user = TestUser::default();
    let headers = create_auth_header(&test.token_for(&user));

    let response = validate_token(State(test.state.clone()), headers).await.unwrap().0;

    assert!(response.valid);
    assert_eq!(response.user_id, user.id);
    assert_eq!(response.email, Some(user.email));
    assert_eq!(response.role, Some(user.role));
}

#[tokio::test]
async fn test_validate_token_missing_header() {
    let test = TestState::new();

    let result = validate_token(State(test.state.clone()), HeaderMap::new()).await;

    assert_matches!(result, Err(AppError::Auth(_)));
}

#[tokio::test]
async fn test_validate_token_expired() {
    let test = TestState::new();
    let user = TestUser::default();
    let token = JwtTestUtils::create_expired_token(&user, &test.config.jwt_secret);

    let result = validate_token(State(test.state.clone()), create_auth_header(&token)).await;

    assert_matches!(result, Err(AppError::Auth(_)));
}

#[tokio::test]
async fn test_verify_token_reports_role() {
    let test = TestState::new();
    let admin = TestUser::admin("ops@example.com");

    let result = verify_token(State(test.state.clone()), create_auth_header(&test.token_for(&admin)))
        .await
        .unwrap();
    assert_eq!(result.0["valid"], true);
    assert_eq!(result.0["is_admin"], true);

    let bad = JwtTestUtils::create_invalid_signature_token(&admin);
    let result = verify_token(State(test.state.clone()), create_auth_header(&bad))
        .await
        .unwrap();
    assert_eq!(result.0["valid"], false);
}
