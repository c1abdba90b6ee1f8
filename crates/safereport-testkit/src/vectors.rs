//! Known-answer vectors for the envelope and passphrase formats.
//!
//! Each vector pins the key, the random bytes the encryptor drew, the JSON
//! plaintext, and the exact output. Sealing with the scripted bytes must
//! reproduce the output, and opening the output must reproduce the
//! plaintext. The ciphertexts were produced with an independent AES /
//! ChaCha20-Poly1305 / Argon2id implementation.

use safereport_core::{
    DeviceKey, Envelope, EnvelopeAlgorithm, KdfParams, PassphraseCodec, ENVELOPE_VERSION,
};
use serde_json::Value;
use std::sync::Arc;

use crate::fixtures::ScriptedEntropy;

/// Key shared by the envelope vectors: bytes 0x00..=0x1f.
pub const VECTOR_KEY_HEX: &str =
    "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

/// An envelope known-answer vector.
#[derive(Debug, Clone)]
pub struct EnvelopeVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Algorithm.
    pub alg: EnvelopeAlgorithm,
    /// Device key (hex).
    pub key_hex: &'static str,
    /// IV or nonce (hex).
    pub iv_hex: &'static str,
    /// Compact JSON plaintext.
    pub plaintext: &'static str,
    /// Expected `ivBase64`.
    pub iv_base64: &'static str,
    /// Expected `ciphertextBase64`.
    pub ciphertext_base64: &'static str,
}

/// Get all envelope vectors.
pub fn envelope_vectors() -> Vec<EnvelopeVector> {
    vec![
        EnvelopeVector {
            name: "safety report, CBC",
            alg: EnvelopeAlgorithm::Aes256Cbc,
            key_hex: VECTOR_KEY_HEX,
            iv_hex: "101112131415161718191a1b1c1d1e1f",
            plaintext: r#"{"location":"Main St","type":"safety_report"}"#,
            iv_base64: "EBESExQVFhcYGRobHB0eHw==",
            ciphertext_base64:
                "FSk3xT5UMT6r1IISCCm4+x1yHGhb2xZwaXz8GAsjXxnAtHJUA/3NWbNMcSFbCvjx",
        },
        EnvelopeVector {
            name: "empty object, CBC",
            alg: EnvelopeAlgorithm::Aes256Cbc,
            key_hex: VECTOR_KEY_HEX,
            iv_hex: "101112131415161718191a1b1c1d1e1f",
            plaintext: "{}",
            iv_base64: "EBESExQVFhcYGRobHB0eHw==",
            ciphertext_base64: "TMG9oq6LSR7UvEA+ap92yw==",
        },
        EnvelopeVector {
            name: "safety report, GCM",
            alg: EnvelopeAlgorithm::Aes256Gcm,
            key_hex: VECTOR_KEY_HEX,
            iv_hex: "202122232425262728292a2b",
            plaintext: r#"{"location":"Main St","type":"safety_report"}"#,
            iv_base64: "ICEiIyQlJicoKSor",
            ciphertext_base64: "qRjKHw/5bmd1EmD041WVkL5pv+ilrEGaFYYJMHOoLWgT65F90VdQqnuPGrAljZF7tAPbcFOfIkhD3Krawg==",
        },
    ]
}

/// A passphrase known-answer vector.
#[derive(Debug, Clone)]
pub struct PassphraseVector {
    pub name: &'static str,
    pub passphrase: &'static str,
    pub params: KdfParams,
    /// Salt then nonce, as drawn by the encryptor (hex).
    pub random_hex: &'static str,
    pub plaintext: &'static str,
    pub expected: &'static str,
}

/// Get all passphrase vectors.
pub fn passphrase_vectors() -> Vec<PassphraseVector> {
    vec![PassphraseVector {
        name: "safety report, test-grade argon2id",
        passphrase: "correct horse",
        params: KdfParams::insecure_for_tests(),
        random_hex: "303132333435363738393a3b3c3d3e3f404142434445464748494a4b",
        plaintext: r#"{"location":"Main St","type":"safety_report"}"#,
        expected: "srp1$argon2id$m=64,t=1,p=1$MDEyMzQ1Njc4OTo7PD0+Pw==$QEFCQ0RFRkdISUpL$0PYAYtgtu66WKe2tk7VZ4CytfCKrhEOouyz2Fa+gDbBTpC8F8CfZpUw/+wxZZrMP61QcipEbhDnb2ocP6g==",
    }]
}

fn decode_hex(s: &str) -> Result<Vec<u8>, String> {
    hex::decode(s).map_err(|e| e.to_string())
}

/// Check one envelope vector in both directions.
pub fn check_envelope_vector(vector: &EnvelopeVector) -> Result<(), String> {
    let key = DeviceKey::from_hex(vector.key_hex).map_err(|e| e.to_string())?;
    let plaintext: Value = serde_json::from_str(vector.plaintext).map_err(|e| e.to_string())?;
    let entropy = ScriptedEntropy::new(decode_hex(vector.iv_hex)?);

    let sealed = Envelope::seal_with(&plaintext, &key, vector.alg, &entropy)
        .map_err(|e| format!("seal: {}", e))?;
    if sealed.iv_base64 != vector.iv_base64 {
        return Err(format!("iv: got {}", sealed.iv_base64));
    }
    if sealed.ciphertext_base64 != vector.ciphertext_base64 {
        return Err(format!("ciphertext: got {}", sealed.ciphertext_base64));
    }

    let expected = Envelope {
        version: ENVELOPE_VERSION,
        alg: vector.alg,
        iv_base64: vector.iv_base64.to_string(),
        ciphertext_base64: vector.ciphertext_base64.to_string(),
    };
    let opened: Value = expected.open(&key).map_err(|e| format!("open: {}", e))?;
    if opened != plaintext {
        return Err("opened plaintext differs".into());
    }
    Ok(())
}

/// Check one passphrase vector in both directions.
pub fn check_passphrase_vector(vector: &PassphraseVector) -> Result<(), String> {
    let plaintext: Value = serde_json::from_str(vector.plaintext).map_err(|e| e.to_string())?;
    let codec = PassphraseCodec::with_params(vector.passphrase, vector.params)
        .map_err(|e| e.to_string())?
        .with_entropy(Arc::new(ScriptedEntropy::new(decode_hex(vector.random_hex)?)));

    let sealed = codec
        .encrypt_data(&plaintext)
        .map_err(|e| format!("encrypt: {}", e))?;
    if sealed != vector.expected {
        return Err(format!("ciphertext: got {}", sealed));
    }

    let opened: Value = codec
        .decrypt_data(vector.expected)
        .map_err(|e| format!("decrypt: {}", e))?;
    if opened != plaintext {
        return Err("opened plaintext differs".into());
    }
    Ok(())
}

/// Verify every vector. Returns (name, passed, detail) per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    let envelopes = envelope_vectors()
        .into_iter()
        .map(|v| (v.name.to_string(), check_envelope_vector(&v)));
    let passphrases = passphrase_vectors()
        .into_iter()
        .map(|v| (v.name.to_string(), check_passphrase_vector(&v)));

    envelopes
        .chain(passphrases)
        .map(|(name, result)| match result {
            Ok(()) => (name, true, String::new()),
            Err(detail) => (name, false, detail),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_vectors_pass() {
        for (name, passed, detail) in verify_all_vectors() {
            assert!(passed, "{}: {}", name, detail);
        }
    }

    #[test]
    fn test_vector_decrypts_in_legacy_form() {
        let vector = &envelope_vectors()[0];
        let wire = format!(
            r#"{{"ivBase64":"{}","ciphertextBase64":"{}"}}"#,
            vector.iv_base64, vector.ciphertext_base64
        );
        let envelope = Envelope::from_json(&wire).unwrap();
        assert!(envelope.is_legacy());
        assert_eq!(
            safereport_core::decrypt(&envelope, vector.key_hex).unwrap(),
            serde_json::from_str::<Value>(vector.plaintext).unwrap()
        );
    }

    #[test]
    fn test_cbc_vector_fails_when_read_as_gcm() {
        let vector = &envelope_vectors()[0];
        let envelope = Envelope {
            version: ENVELOPE_VERSION,
            alg: EnvelopeAlgorithm::Aes256Gcm,
            iv_base64: vector.iv_base64.to_string(),
            ciphertext_base64: vector.ciphertext_base64.to_string(),
        };
        let key = DeviceKey::from_hex(vector.key_hex).unwrap();
        assert!(envelope.open::<Value>(&key).is_err());
    }
}
