//! Transaction signature validation boundary.
//!
//! Actual public-key recovery (keccak + ecrecover) is performed by an
//! external collaborator; the VM only enforces the structural rules it
//! can check locally. Callers with a real recovery backend implement
//! [`SignatureVerifier`] and plug it into the VM.

use crate::{constants::SECP256K1_ORDER, errors::TxValidationError};
use spectre_common::{Transaction, U256};

pub trait SignatureVerifier {
    fn verify(&self, tx: &Transaction, requires_low_s: bool) -> Result<(), TxValidationError>;
}

/// Structural checks only: r and s must be non-zero and within the curve
/// order, and from Homestead on, s must lie in the lower half of the
/// order. Transactions without signature components are taken at their
/// word (the declared sender is trusted).
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSignatureVerifier;

impl SignatureVerifier for DefaultSignatureVerifier {
    fn verify(&self, tx: &Transaction, requires_low_s: bool) -> Result<(), TxValidationError> {
        let Some(signature) = tx.signature else {
            return Ok(());
        };

        if signature.r.is_zero() || signature.r >= SECP256K1_ORDER {
            return Err(TxValidationError::InvalidSignature);
        }
        if signature.s.is_zero() || signature.s >= SECP256K1_ORDER {
            return Err(TxValidationError::InvalidSignature);
        }
        if requires_low_s && signature.s > SECP256K1_ORDER / U256::from(2) {
            return Err(TxValidationError::InvalidSignature);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use spectre_common::{types::Signature, Address};

    fn signed_tx(s: U256) -> Transaction {
        let mut tx = Transaction::call(
            Address::from_low_u64_be(1),
            Address::from_low_u64_be(2),
            Bytes::new(),
            100_000,
        );
        tx.signature = Some(Signature {
            v: 27,
            r: U256::one(),
            s,
        });
        tx
    }

    #[test]
    fn high_s_rejected_only_when_low_s_required() {
        let verifier = DefaultSignatureVerifier;
        let high_s = SECP256K1_ORDER / U256::from(2) + U256::one();
        let tx = signed_tx(high_s);

        assert!(verifier.verify(&tx, false).is_ok());
        assert_eq!(
            verifier.verify(&tx, true),
            Err(TxValidationError::InvalidSignature)
        );
    }

    #[test]
    fn zero_s_always_rejected() {
        let verifier = DefaultSignatureVerifier;
        assert!(verifier.verify(&signed_tx(U256::zero()), false).is_err());
    }

    #[test]
    fn unsigned_transactions_pass() {
        let verifier = DefaultSignatureVerifier;
        let tx = Transaction::call(
            Address::from_low_u64_be(1),
            Address::from_low_u64_be(2),
            Bytes::new(),
            100_000,
        );
        assert!(verifier.verify(&tx, true).is_ok());
    }
}
