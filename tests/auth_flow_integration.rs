//! Integration tests for the multi-step login flow.
//!
//! Exercises registration, all three login steps, OTP resend, lockout,
//! session expiry, and logout through the public gateway surface.

use std::sync::Arc;

use threegate::clock::{Clock, ManualClock};
use threegate::{AuthGateway, AuthStep, GateConfig, GateError, RegisterRequest};

const ADDR: &str = "10.0.0.1";

/// Helper to create a gateway with the reference configuration
fn gate() -> AuthGateway {
    AuthGateway::new(GateConfig::default())
}

/// Helper to build the registration request used across tests
fn alice() -> RegisterRequest {
    RegisterRequest {
        username: "alice".to_string(),
        email: "a@x.com".to_string(),
        secondary_contact: "+1555".to_string(),
        password: "Abc123!@".to_string(),
    }
}

/// Helper to register alice and pass step 1
async fn open_session(gate: &AuthGateway) -> threegate::auth::StepOneResponse {
    gate.register(alice(), ADDR)
        .await
        .expect("registration should succeed");
    gate.login_step1("alice", "Abc123!@", ADDR)
        .await
        .expect("step 1 should succeed")
}

#[tokio::test]
async fn test_concrete_three_step_journey() {
    let gate = gate();

    gate.register(alice(), ADDR)
        .await
        .expect("registration should succeed");

    let step1 = gate
        .login_step1("alice", "Abc123!@", ADDR)
        .await
        .expect("step 1 should succeed");
    assert_eq!(step1.current_step, AuthStep::AwaitingOtp);
    assert_eq!(step1.otp.len(), 6, "OTP should be 6 digits");
    assert!(
        step1.otp.chars().all(|c| c.is_ascii_digit()),
        "OTP should be numeric"
    );
    assert!(!step1.session_id.is_empty());
    assert_ne!(
        step1.csrf_token, step1.session_id,
        "CSRF token must be distinct from the session identifier"
    );

    let step2 = gate
        .login_step2(&step1.session_id, &step1.otp, ADDR)
        .await
        .expect("step 2 with the issued OTP should succeed");
    assert_eq!(step2.current_step, AuthStep::OtpVerified);

    let step3 = gate
        .login_step3(&step1.session_id, "fingerprint-evidence", ADDR)
        .await
        .expect("step 3 should succeed");
    assert_eq!(step3.current_step, AuthStep::Authenticated);
    assert!(!step3.access_token.is_empty());

    let claims = gate
        .verify_bearer(&step3.access_token)
        .expect("issued token should verify");
    assert_eq!(claims.sub, "alice");
    assert_eq!(claims.sid, step1.session_id);
}

#[tokio::test]
async fn test_resend_before_final_step_keeps_step() {
    let gate = gate();
    let step1 = open_session(&gate).await;

    gate.login_step2(&step1.session_id, &step1.otp, ADDR)
        .await
        .expect("step 2 should succeed");

    // Resend after OTP verification regenerates the code without moving
    // the session backward
    let resent = gate
        .resend_otp(&step1.session_id, ADDR)
        .await
        .expect("resend should succeed before authentication");
    assert_eq!(resent.otp.len(), 6);

    let session = gate
        .sessions()
        .validate(&step1.session_id, chrono::Utc::now())
        .await
        .expect("session should still be alive");
    assert_eq!(session.current_step, AuthStep::OtpVerified);

    let step3 = gate
        .login_step3(&step1.session_id, "", ADDR)
        .await
        .expect("step 3 should still succeed");
    assert_eq!(step3.current_step, AuthStep::Authenticated);
}

#[tokio::test]
async fn test_duplicate_username_and_email_rejected() {
    let gate = gate();
    gate.register(alice(), ADDR)
        .await
        .expect("first registration should succeed");

    // Same username, fresh email
    let mut same_name = alice();
    same_name.email = "other@x.com".to_string();
    let err = gate.register(same_name, ADDR).await.unwrap_err();
    assert!(matches!(err, GateError::AlreadyRegistered));
    assert_eq!(err.status_code(), 409);

    // Same email, fresh username
    let mut same_email = alice();
    same_email.username = "alicetwo".to_string();
    let err = gate.register(same_email, ADDR).await.unwrap_err();
    assert!(matches!(err, GateError::AlreadyRegistered));
}

#[tokio::test]
async fn test_concurrent_duplicate_registration_single_winner() {
    let gate = Arc::new(gate());

    let mut handles = vec![];
    for _ in 0..8 {
        let gate = Arc::clone(&gate);
        handles.push(tokio::spawn(async move {
            gate.register(alice(), ADDR).await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1, "exactly one concurrent registration may win");
}

#[tokio::test]
async fn test_step_order_is_enforced() {
    let gate = gate();
    let step1 = open_session(&gate).await;

    // Step 3 before step 2
    let err = gate
        .login_step3(&step1.session_id, "", ADDR)
        .await
        .unwrap_err();
    assert!(matches!(err, GateError::InvalidSession));
    assert_eq!(err.status_code(), 401);

    gate.login_step2(&step1.session_id, &step1.otp, ADDR)
        .await
        .expect("step 2 in order should succeed");

    // Step 2 replay after it already passed
    let err = gate
        .login_step2(&step1.session_id, &step1.otp, ADDR)
        .await
        .unwrap_err();
    assert!(matches!(err, GateError::InvalidSession));

    gate.login_step3(&step1.session_id, "", ADDR)
        .await
        .expect("step 3 in order should succeed");

    // No operation moves an authenticated session backward
    let err = gate
        .login_step3(&step1.session_id, "", ADDR)
        .await
        .unwrap_err();
    assert!(matches!(err, GateError::InvalidSession));
}

#[tokio::test]
async fn test_otp_brute_force_invalidates_session() {
    let gate = gate();
    let step1 = open_session(&gate).await;
    let wrong = if step1.otp == "000000" { "111111" } else { "000000" };

    // Attempts below the bound fail softly
    for _ in 0..4 {
        let err = gate
            .login_step2(&step1.session_id, wrong, ADDR)
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::InvalidOtp));
    }

    // The fifth wrong code exhausts the budget
    let err = gate
        .login_step2(&step1.session_id, wrong, ADDR)
        .await
        .unwrap_err();
    assert!(matches!(err, GateError::InvalidOtp));

    // Even the correct code is dead now
    let err = gate
        .login_step2(&step1.session_id, &step1.otp, ADDR)
        .await
        .unwrap_err();
    assert!(matches!(err, GateError::InvalidSession));

    // A fresh step 1 recovers with a new session
    let fresh = gate
        .login_step1("alice", "Abc123!@", ADDR)
        .await
        .expect("new login should succeed");
    assert_ne!(fresh.session_id, step1.session_id);
    gate.login_step2(&fresh.session_id, &fresh.otp, ADDR)
        .await
        .expect("fresh session should verify normally");
}

#[tokio::test]
async fn test_lockout_clears_after_successful_login() {
    let clock = Arc::new(ManualClock::starting_now());
    let gate = AuthGateway::with_parts(
        GateConfig::default(),
        Box::new(threegate::session::AcceptAll),
        clock.clone(),
    );
    gate.register(alice(), ADDR)
        .await
        .expect("registration should succeed");

    for _ in 0..4 {
        let err = gate
            .login_step1("alice", "Nope123!@", ADDR)
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::InvalidCredentials));
    }
    let err = gate
        .login_step1("alice", "Nope123!@", ADDR)
        .await
        .unwrap_err();
    assert!(matches!(err, GateError::AccountLocked { retry_after: 1800 }));

    clock.advance_secs(1801);
    gate.login_step1("alice", "Abc123!@", ADDR)
        .await
        .expect("correct password should succeed once the lock elapses");

    // The failure counter was reset by the success: a single new failure
    // counts from one instead of locking immediately
    let err = gate
        .login_step1("alice", "Nope123!@", ADDR)
        .await
        .unwrap_err();
    assert!(matches!(err, GateError::InvalidCredentials));
}

#[tokio::test]
async fn test_expiry_beats_activity() {
    let clock = Arc::new(ManualClock::starting_now());
    let gate = AuthGateway::with_parts(
        GateConfig::default(),
        Box::new(threegate::session::AcceptAll),
        clock.clone(),
    );
    gate.register(alice(), ADDR)
        .await
        .expect("registration should succeed");
    let step1 = gate
        .login_step1("alice", "Abc123!@", ADDR)
        .await
        .expect("step 1 should succeed");

    // The boundary instant itself is already dead
    clock.advance_secs(3600);

    let err = gate
        .login_step2(&step1.session_id, &step1.otp, ADDR)
        .await
        .unwrap_err();
    assert!(matches!(err, GateError::InvalidSession));
    let err = gate.resend_otp(&step1.session_id, ADDR).await.unwrap_err();
    assert!(matches!(err, GateError::InvalidSession));
    let err = gate
        .authorize(&step1.session_id, None, ADDR, false)
        .await
        .unwrap_err();
    assert!(matches!(err, GateError::InvalidSession));

    assert_eq!(gate.sessions().expire_sweep(clock.now()).await, 1);
    assert_eq!(gate.sessions().count(), 0);
}

#[tokio::test]
async fn test_sessions_are_per_login_not_per_user() {
    let gate = gate();
    gate.register(alice(), ADDR)
        .await
        .expect("registration should succeed");

    let first = gate
        .login_step1("alice", "Abc123!@", ADDR)
        .await
        .expect("first login should succeed");
    let second = gate
        .login_step1("alice", "Abc123!@", ADDR)
        .await
        .expect("second login should succeed");
    assert_ne!(first.session_id, second.session_id);

    // Completing one leaves the other untouched at its own step
    gate.login_step2(&first.session_id, &first.otp, ADDR)
        .await
        .expect("first session step 2 should succeed");
    gate.login_step3(&first.session_id, "", ADDR)
        .await
        .expect("first session step 3 should succeed");

    let session = gate
        .sessions()
        .validate(&second.session_id, chrono::Utc::now())
        .await
        .expect("second session should still be alive");
    assert_eq!(session.current_step, AuthStep::AwaitingOtp);
    gate.login_step2(&second.session_id, &second.otp, ADDR)
        .await
        .expect("second session should verify independently");
}

#[tokio::test]
async fn test_logout_ends_only_that_session() {
    let gate = gate();
    gate.register(alice(), ADDR)
        .await
        .expect("registration should succeed");
    let first = gate
        .login_step1("alice", "Abc123!@", ADDR)
        .await
        .expect("first login should succeed");
    let second = gate
        .login_step1("alice", "Abc123!@", ADDR)
        .await
        .expect("second login should succeed");

    gate.logout(&first.session_id, &first.csrf_token, ADDR)
        .await
        .expect("logout should succeed");

    let err = gate
        .authorize(&first.session_id, None, ADDR, false)
        .await
        .unwrap_err();
    assert!(matches!(err, GateError::InvalidSession));

    gate.authorize(&second.session_id, None, ADDR, false)
        .await
        .expect("the other session should survive");
}

#[tokio::test]
async fn test_bearer_token_survives_logout() {
    let gate = gate();
    let step1 = open_session(&gate).await;
    gate.login_step2(&step1.session_id, &step1.otp, ADDR)
        .await
        .expect("step 2 should succeed");
    let step3 = gate
        .login_step3(&step1.session_id, "", ADDR)
        .await
        .expect("step 3 should succeed");

    gate.logout(&step1.session_id, &step1.csrf_token, ADDR)
        .await
        .expect("logout should succeed");

    // Bearer tokens are stateless; revocation rides on the short TTL
    let claims = gate
        .verify_bearer(&step3.access_token)
        .expect("token should verify until its own expiry");
    assert_eq!(claims.sub, "alice");

    let err = gate.verify_bearer("not.a.token").unwrap_err();
    assert!(matches!(err, GateError::InvalidSession));
}

#[tokio::test]
async fn test_registration_rejects_malformed_fields() {
    let gate = gate();

    let mut short_name = alice();
    short_name.username = "ab".to_string();
    let err = gate.register(short_name, ADDR).await.unwrap_err();
    assert!(matches!(err, GateError::Validation(_)));
    assert_eq!(err.status_code(), 400);

    let mut bad_email = alice();
    bad_email.email = "not-an-email".to_string();
    let err = gate.register(bad_email, ADDR).await.unwrap_err();
    assert!(matches!(err, GateError::Validation(_)));

    let mut weak_password = alice();
    weak_password.password = "abc".to_string();
    let err = gate.register(weak_password, ADDR).await.unwrap_err();
    assert!(matches!(err, GateError::Validation(_)));
}
