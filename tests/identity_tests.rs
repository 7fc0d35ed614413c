use ethers::signers::{LocalWallet, Signer};

use fabstir_acp_client::{Identity, IdentityError};

const TEST_KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

fn test_key_address() -> String {
    let wallet: LocalWallet = TEST_KEY.parse().expect("valid test key");
    format!("{:?}", wallet.address())
}

#[test]
fn test_build_valid_identity() {
    let address = test_key_address();
    let identity = Identity::build(TEST_KEY, 7, &address).expect("should build");

    assert_eq!(identity.session_entity_id(), 7);
    assert_eq!(format!("{:?}", identity.address()), address);
}

#[test]
fn test_credential_without_prefix_rejected() {
    let result = Identity::build(&TEST_KEY[2..], 7, &test_key_address());
    assert!(matches!(result, Err(IdentityError::InvalidCredential(_))));
}

#[test]
fn test_short_credential_rejected() {
    let result = Identity::build("0x1234", 7, &test_key_address());
    assert!(matches!(result, Err(IdentityError::InvalidCredential(_))));
}

#[test]
fn test_non_hex_credential_rejected() {
    let bad = format!("0x{}", "zz".repeat(32));
    let result = Identity::build(&bad, 7, &test_key_address());
    assert!(matches!(result, Err(IdentityError::InvalidCredential(_))));
}

#[test]
fn test_malformed_address_rejected() {
    let result = Identity::build(TEST_KEY, 7, "not-an-address");
    assert!(matches!(result, Err(IdentityError::InvalidAddress(_))));
}

#[test]
fn test_mismatched_address_rejected() {
    // Well-formed address, but not the one the credential derives
    let other_wallet = LocalWallet::new(&mut rand::thread_rng());
    let other = format!("{:?}", other_wallet.address());
    let result = Identity::build(TEST_KEY, 7, &other);
    assert!(matches!(result, Err(IdentityError::InvalidAddress(_))));
}

#[tokio::test]
async fn test_signature_verifies_against_agent_address() {
    let identity = Identity::build(TEST_KEY, 7, &test_key_address()).unwrap();

    let message = b"respond job 42".to_vec();
    let signature = identity.sign(&message).await.expect("signing should work");
    signature
        .verify(message, identity.address())
        .expect("signature should verify");
}

#[test]
fn test_debug_never_reveals_credential() {
    let identity = Identity::build(TEST_KEY, 7, &test_key_address()).unwrap();
    let printed = format!("{:?}", identity);
    assert!(!printed.contains(&TEST_KEY[2..]));
}

#[test]
fn test_from_env_accepts_unprefixed_key() {
    std::env::set_var("ACP_PRIVATE_KEY", &TEST_KEY[2..]);
    std::env::set_var("ACP_SESSION_ENTITY_ID", "9");
    std::env::set_var("ACP_AGENT_WALLET", test_key_address());

    let identity = Identity::from_env().expect("should build from env");
    assert_eq!(identity.session_entity_id(), 9);

    std::env::remove_var("ACP_PRIVATE_KEY");
    std::env::remove_var("ACP_SESSION_ENTITY_ID");
    std::env::remove_var("ACP_AGENT_WALLET");
}
