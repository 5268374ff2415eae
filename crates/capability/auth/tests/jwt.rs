use conduit_auth::{AuthError, JwtManager};
use domain::AuthSession;

#[test]
fn jwt_issue_and_decode() {
    let jwt = JwtManager::new("secret".to_string(), 3600);
    let session = AuthSession::new("domain-1", "user-1");

    let token = jwt.issue_access(&session).expect("token");
    let decoded = jwt.decode_access(&token).expect("access");

    assert_eq!(decoded.domain_id, "domain-1");
    assert_eq!(decoded.user_id, "user-1");
}

#[test]
fn jwt_rejects_foreign_signature() {
    let issuer = JwtManager::new("secret-a".to_string(), 3600);
    let verifier = JwtManager::new("secret-b".to_string(), 3600);
    let token = issuer
        .issue_access(&AuthSession::new("domain-1", "user-1"))
        .expect("token");

    let result = verifier.decode_access(&token);
    assert!(matches!(result, Err(AuthError::TokenInvalid)));
}

#[test]
fn jwt_rejects_garbage() {
    let jwt = JwtManager::new("secret".to_string(), 3600);
    assert!(matches!(
        jwt.decode_access("not-a-token"),
        Err(AuthError::TokenInvalid)
    ));
}
