// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for error types.

#[cfg(test)]
mod tests {
    use crate::errors::*;
    use kube::core::response::Status;

    #[test]
    fn test_http_error_display() {
        let error = PlatformError::Http {
            status: 404,
            method: "GET".to_string(),
            url: "http://sysinv/v1/datanetworks/abc".to_string(),
            message: "not found".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "GET http://sysinv/v1/datanetworks/abc failed with HTTP 404: not found"
        );
        assert!(error.is_not_found());
        assert!(!error.is_transport());
    }

    #[test]
    fn test_transport_message_dns() {
        let error = PlatformError::from_transport_message(
            "http://controller:6385",
            "error sending request: dns error: failed to lookup address information",
        );
        assert!(matches!(error, PlatformError::Resolution { .. }));
        assert!(error.is_transport());
    }

    #[test]
    fn test_transport_message_eof() {
        let error = PlatformError::from_transport_message(
            "http://controller:6385",
            "connection closed before message completed",
        );
        assert_eq!(
            error,
            PlatformError::Eof {
                url: "http://controller:6385".to_string()
            }
        );
    }

    #[test]
    fn test_transport_message_https_not_enabled() {
        let error = PlatformError::from_transport_message(
            "https://controller:6385",
            "received corrupt message of type InvalidContentType",
        );
        assert!(matches!(error, PlatformError::HttpsNotEnabled { .. }));
    }

    #[test]
    fn test_transport_message_fallback() {
        let error =
            PlatformError::from_transport_message("http://controller:6385", "connection refused");
        assert!(matches!(error, PlatformError::Network { .. }));
    }

    #[test]
    fn test_store_error_from_kube_conflict() {
        let err = kube::Error::Api(
            Status::failure("the object has been modified", "Conflict")
                .with_code(409)
                .boxed(),
        );

        let store: StoreError = err.into();
        assert!(store.is_conflict());
        assert!(store.to_string().contains("the object has been modified"));
    }

    #[test]
    fn test_store_error_from_kube_not_found() {
        let err = kube::Error::Api(
            Status::failure("hosts \"controller-0\" not found", "NotFound")
                .with_code(404)
                .boxed(),
        );

        let store: StoreError = err.into();
        assert!(store.is_not_found());
    }

    #[test]
    fn test_store_error_from_kube_other() {
        let err = kube::Error::Api(
            Status::failure("forbidden", "Forbidden")
                .with_code(403)
                .boxed(),
        );

        let store: StoreError = err.into();
        assert_eq!(
            store,
            StoreError::Api {
                code: 403,
                message: "forbidden".to_string()
            }
        );
    }

    #[test]
    fn test_reconcile_error_not_found() {
        let err = ReconcileError::from(PlatformError::Http {
            status: 404,
            method: "GET".to_string(),
            url: "u".to_string(),
            message: String::new(),
        });
        assert!(err.is_not_found());
        assert!(!ReconcileError::Validation("x".to_string()).is_not_found());
    }

    #[test]
    fn test_reconcile_error_messages_are_passed_through() {
        let err = ReconcileError::ChangeAfterReconciled(
            "configuration changes ignored after initial synchronization has completed"
                .to_string(),
        );
        assert_eq!(
            err.to_string(),
            "configuration changes ignored after initial synchronization has completed"
        );
    }
}
