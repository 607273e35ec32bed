// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `platform/mod.rs`

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::platform::{install_crypto_provider, PatchOp};

    #[test]
    fn test_replace_op_serializes_with_value() {
        let op = PatchOp::replace("mtu", 1400);
        assert_eq!(
            serde_json::to_value(&op).unwrap(),
            json!({"op": "replace", "path": "/mtu", "value": 1400})
        );
    }

    #[test]
    fn test_add_op_keeps_nested_path() {
        let op = PatchOp::add("ptp_parameters/-", "domainNumber=24");
        assert_eq!(op.path, "/ptp_parameters/-");
        assert_eq!(op.op, "add");
    }

    #[test]
    fn test_crypto_provider_installed_once() {
        install_crypto_provider();
        assert!(rustls::crypto::CryptoProvider::get_default().is_some());
        assert!(!install_crypto_provider());
    }
}
