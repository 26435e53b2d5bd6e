//! Verification token codec behavior across the crate boundary: the token
//! minted at checkout-session creation must decode back to the exact
//! transaction context that was signed into it.

use bigdecimal::BigDecimal;
use medibill_backend::payments::token::{TokenConfig, TokenContext, VerificationTokenCodec};
use uuid::Uuid;

fn codec() -> VerificationTokenCodec {
    VerificationTokenCodec::new(&TokenConfig {
        secret: "integration-test-secret".to_string(),
        redirect_ttl_secs: 30 * 60,
        offline_ttl_secs: 7 * 24 * 60 * 60,
    })
}

#[test]
fn redirect_token_carries_the_full_transaction_context() {
    let codec = codec();
    let user_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();

    let token = codec
        .issue_redirect_token(&TokenContext {
            reference: "STR_1700000000000_0042".to_string(),
            amount: BigDecimal::from(50),
            user_id,
            order_id: None,
            appointment_id: Some(appointment_id),
        })
        .expect("token issuing should succeed");

    let claims = codec.decode(&token).expect("token should decode");
    assert_eq!(claims.reference, "STR_1700000000000_0042");
    assert_eq!(claims.amount, "50");
    assert_eq!(claims.user_id, user_id);
    assert_eq!(claims.appointment_id, Some(appointment_id));
    assert!(claims.order_id.is_none());
}

#[test]
fn offline_token_outlives_the_redirect_token() {
    let codec = codec();
    let context = TokenContext {
        reference: "STR_1700000000000_0001".to_string(),
        amount: BigDecimal::from(200),
        user_id: Uuid::new_v4(),
        order_id: Some(Uuid::new_v4()),
        appointment_id: None,
    };

    let redirect = codec.issue_redirect_token(&context).unwrap();
    let offline = codec.issue_offline_token(&context).unwrap();

    let redirect_claims = codec.decode(&redirect).unwrap();
    let offline_claims = codec.decode(&offline).unwrap();
    assert!(offline_claims.exp > redirect_claims.exp);
}

#[test]
fn token_is_url_safe_for_query_embedding() {
    let token = codec()
        .issue_redirect_token(&TokenContext {
            reference: "STR_1700000000000_0099".to_string(),
            amount: BigDecimal::from(75),
            user_id: Uuid::new_v4(),
            order_id: Some(Uuid::new_v4()),
            appointment_id: None,
        })
        .unwrap();

    assert!(token
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_'));
}
