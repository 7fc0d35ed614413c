// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Agent Signing Identity
//!
//! Holds the agent's signing credential, session entity id, and wallet
//! address, and produces signatures over outbound ledger operations.
//!
//! ## Security Considerations
//!
//! - Credential must be a 32-byte hex string with "0x" prefix
//! - Key material is NEVER logged, serialized, or exposed via `Debug`
//! - The key lives only inside the wallet and is dropped with it
//!
//! ## Usage
//!
//! ```no_run
//! use fabstir_acp_client::Identity;
//!
//! let identity = Identity::build(
//!     "0x1234567890abcdef1234567890abcdef1234567890abcdef1234567890abcdef",
//!     7,
//!     "0x63f9a92d8d61b48a9ffff933a2a3df90ecc73e25",
//! )?;
//! # Ok::<(), fabstir_acp_client::IdentityError>(())
//! ```

use std::env;
use std::fmt;

use anyhow::{anyhow, Result};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Signature};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum IdentityError {
    /// Credential cannot be parsed into a usable signing key
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    /// Wallet address is malformed or does not match the signing key
    #[error("invalid wallet address: {0}")]
    InvalidAddress(String),

    /// Signing the operation bytes failed
    #[error("signing failed: {0}")]
    SigningFailed(String),
}

/// Immutable signing identity, built once per process and held for the
/// process lifetime.
pub struct Identity {
    wallet: LocalWallet,
    session_entity_id: u64,
    agent_address: Address,
}

impl Identity {
    /// Build an identity from a credential, a session entity id, and the
    /// agent's wallet address.
    ///
    /// The credential must be a 0x-prefixed 64-character hex string (32
    /// bytes). The wallet address must parse and must match the address
    /// derived from the credential, otherwise the ledger would refuse every
    /// signature anyway.
    ///
    /// # Errors
    ///
    /// - [`IdentityError::InvalidCredential`] - empty, missing "0x" prefix,
    ///   wrong length, not hex, or not a usable secp256k1 key
    /// - [`IdentityError::InvalidAddress`] - malformed address, or address
    ///   does not match the signing credential
    pub fn build(
        credential: &str,
        session_entity_id: u64,
        wallet_address: &str,
    ) -> Result<Self, IdentityError> {
        let credential = credential.trim();

        if credential.is_empty() {
            return Err(IdentityError::InvalidCredential(
                "credential is empty".to_string(),
            ));
        }

        if !credential.starts_with("0x") {
            return Err(IdentityError::InvalidCredential(
                "credential must start with '0x' prefix".to_string(),
            ));
        }

        let hex_str = &credential[2..];
        if hex_str.len() != 64 {
            return Err(IdentityError::InvalidCredential(format!(
                "credential must be exactly 64 hex characters (32 bytes), got {}",
                hex_str.len()
            )));
        }

        let key_bytes = hex::decode(hex_str).map_err(|e| {
            IdentityError::InvalidCredential(format!("credential contains invalid hex: {}", e))
        })?;

        let wallet = LocalWallet::from_bytes(&key_bytes).map_err(|e| {
            IdentityError::InvalidCredential(format!("not a usable signing key: {}", e))
        })?;

        let agent_address: Address = wallet_address.trim().parse().map_err(|_| {
            IdentityError::InvalidAddress(format!("malformed address: {}", wallet_address))
        })?;

        if wallet.address() != agent_address {
            return Err(IdentityError::InvalidAddress(format!(
                "address {} does not match the signing credential",
                wallet_address
            )));
        }

        Ok(Self {
            wallet,
            session_entity_id,
            agent_address,
        })
    }

    /// Build an identity from `ACP_PRIVATE_KEY`, `ACP_SESSION_ENTITY_ID`, and
    /// `ACP_AGENT_WALLET` environment variables.
    ///
    /// The key itself is never logged, only whether it loaded.
    pub fn from_env() -> Result<Self> {
        let key = env::var("ACP_PRIVATE_KEY")
            .map_err(|_| anyhow!("ACP_PRIVATE_KEY environment variable not set"))?;
        let key = key.trim().to_string();

        // The deployment convention stores the key without the 0x prefix.
        let credential = if key.starts_with("0x") {
            key
        } else {
            format!("0x{}", key)
        };

        let session_entity_id: u64 = env::var("ACP_SESSION_ENTITY_ID")
            .map_err(|_| anyhow!("ACP_SESSION_ENTITY_ID environment variable not set"))?
            .trim()
            .parse()
            .map_err(|e| anyhow!("ACP_SESSION_ENTITY_ID is not a valid integer: {}", e))?;

        let wallet_address = env::var("ACP_AGENT_WALLET")
            .map_err(|_| anyhow!("ACP_AGENT_WALLET environment variable not set"))?;

        let identity = Self::build(&credential, session_entity_id, &wallet_address)?;
        info!(
            session_entity_id,
            address = %identity.agent_address,
            "✅ Agent identity loaded successfully"
        );
        Ok(identity)
    }

    /// Sign operation bytes with the agent's key (EIP-191 personal sign).
    ///
    /// Signatures may be randomized; the ledger verifies them against
    /// [`Identity::address`].
    pub async fn sign(&self, message: &[u8]) -> Result<Signature, IdentityError> {
        self.wallet
            .sign_message(message)
            .await
            .map_err(|e| IdentityError::SigningFailed(e.to_string()))
    }

    pub fn address(&self) -> Address {
        self.agent_address
    }

    pub fn session_entity_id(&self) -> u64 {
        self.session_entity_id
    }
}

// Manual impl so the credential can never leak through debug logging.
impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("session_entity_id", &self.session_entity_id)
            .field("agent_address", &self.agent_address)
            .finish_non_exhaustive()
    }
}
