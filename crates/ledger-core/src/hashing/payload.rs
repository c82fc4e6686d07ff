//! Hash del payload completo, usado para detectar cambios en contratos.

use sha2::{Digest, Sha256};

/// SHA-256 de los bytes tal cual llegaron, en hex minúsculas.
pub fn payload_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_digest() {
        assert_eq!(payload_hash(b"abc"),
                   "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
    }

    #[test]
    fn byte_sensitive() {
        // misma semántica JSON, distintos bytes → distinto hash
        assert_ne!(payload_hash(br#"{"a":1}"#), payload_hash(br#"{ "a": 1 }"#));
    }
}
