// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `attributes.rs`

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use k8s_openapi::api::core::v1::Secret;
    use kube::api::ObjectMeta;
    use serde_json::json;

    use crate::config::ReconcilerConfig;
    use crate::crd::{BmCredentials as BmCredentialsInfo, BmInfo, BmPasswordInfo, Host, HostProfileSpec, HostSpec};
    use crate::errors::ReconcileError;
    use crate::platform::inventory::hosts::Host as PlatformHost;
    use crate::reconcilers::host::attributes::{
        attribute_changes, bm_credentials, check_password_transport, requires_lock, HostOpts,
        BM_TYPE_NONE,
    };
    use crate::store::ResourceKind;
    use crate::testing::{in_namespace, FakePlatform, TestEnv, NAMESPACE};

    fn platform_host() -> PlatformHost {
        serde_json::from_value(json!({
            "uuid": "host-uuid",
            "hostname": "controller-0",
            "personality": "controller",
            "subfunctions": "controller,worker",
            "location": {"locn": "rack 1"},
            "console": "tty0",
            "install_output": "text",
            "mgmt_mac": "08:00:27:AA:BB:CC",
            "rootfs_device": "/dev/sda",
            "boot_device": "/dev/sda",
            "administrative": "locked",
            "operational": "disabled",
            "availability": "online"
        }))
        .unwrap()
    }

    fn board_management(secret: Option<&str>) -> BmInfo {
        BmInfo {
            bm_type: Some("dynamic".to_string()),
            address: Some("10.0.0.5".to_string()),
            credentials: secret.map(|s| BmCredentialsInfo {
                password: Some(BmPasswordInfo {
                    secret: s.to_string(),
                }),
            }),
        }
    }

    #[test]
    fn test_unlocked_fields_do_not_require_lock() {
        assert!(!requires_lock("location"));
        assert!(!requires_lock("bm_ip"));
        assert!(requires_lock("console"));
        assert!(requires_lock("personality"));
    }

    #[test]
    fn test_desired_uses_platform_names() {
        let profile = HostProfileSpec {
            personality: Some("controller".to_string()),
            sub_functions: Some(vec!["controller".to_string(), "worker".to_string()]),
            location: Some("rack 2".to_string()),
            boot_mac: Some("08:00:27:AA:BB:CC".to_string()),
            root_device: Some("/dev/sdb".to_string()),
            ..HostProfileSpec::default()
        };

        let opts = HostOpts::desired("controller-0", &profile, false, None);
        let value = serde_json::to_value(&opts).unwrap();

        assert_eq!(
            value,
            json!({
                "hostname": "controller-0",
                "personality": "controller",
                "subfunctions": "controller,worker",
                "location": {"locn": "rack 2"},
                "mgmt_mac": "08:00:27:aa:bb:cc",
                "rootfs_device": "/dev/sdb"
            })
        );
    }

    #[test]
    fn test_desired_without_board_management_clears_bmc() {
        let opts = HostOpts::desired("worker-0", &HostProfileSpec::default(), true, None);
        assert_eq!(opts.bm_type.as_deref(), Some(BM_TYPE_NONE));

        let profile = HostProfileSpec {
            board_management: Some(board_management(None)),
            ..HostProfileSpec::default()
        };
        let opts = HostOpts::desired("worker-0", &profile, true, Some("root".to_string()));
        assert_eq!(opts.bm_type.as_deref(), Some("dynamic"));
        assert_eq!(opts.bm_address.as_deref(), Some("10.0.0.5"));
        assert_eq!(opts.bm_username.as_deref(), Some("root"));
    }

    #[test]
    fn test_unset_attributes_fall_back_to_defaults() {
        let defaults = HostOpts::current(&platform_host());
        let profile = HostProfileSpec {
            console: Some("ttyS0,115200".to_string()),
            ..HostProfileSpec::default()
        };

        let desired = HostOpts::desired("controller-0", &profile, false, None).backed_by(&defaults);

        assert_eq!(desired.console.as_deref(), Some("ttyS0,115200"));
        assert_eq!(desired.root_device.as_deref(), Some("/dev/sda"));
        assert_eq!(desired.location, Some(json!({"locn": "rack 1"})));
    }

    #[test]
    fn test_attribute_changes_only_lists_differences() {
        let current = HostOpts::current(&platform_host());
        let profile = HostProfileSpec {
            console: Some("ttyS0,115200".to_string()),
            sub_functions: Some(vec!["worker".to_string(), "controller".to_string()]),
            boot_mac: Some("08:00:27:aa:bb:cc".to_string()),
            ..HostProfileSpec::default()
        };
        let desired = HostOpts::desired("controller-0", &profile, false, None).backed_by(&current);

        let changes = attribute_changes(&desired, &current).unwrap();

        assert_eq!(changes.desired.keys().collect::<Vec<_>>(), vec!["console"]);
        assert!(changes.delta().unwrap().contains("+ console: ttyS0,115200"));
    }

    fn secret(name: &str, data: &[(&str, &str)]) -> Secret {
        Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(NAMESPACE.to_string()),
                ..Default::default()
            },
            string_data: Some(
                data.iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect::<BTreeMap<_, _>>(),
            ),
            ..Default::default()
        }
    }

    fn host() -> Host {
        in_namespace(Host::new(
            "worker-0",
            HostSpec {
                profile: "worker".to_string(),
                ..Default::default()
            },
        ))
    }

    #[tokio::test]
    async fn test_credentials_are_read_from_secret() {
        let env = TestEnv::new();
        let ctx = env.context();
        env.insert(
            ResourceKind::Secret,
            &secret("bmc", &[("username", "admin"), ("password", "s3cret")]),
        );
        let host = env.insert(ResourceKind::Host, &host());

        let credentials = bm_credentials(&ctx, &host, Some(&board_management(Some("bmc"))))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(credentials.username, "admin");
        assert_eq!(credentials.password, "s3cret");
    }

    #[tokio::test]
    async fn test_no_password_secret_means_no_credentials() {
        let env = TestEnv::new();
        let ctx = env.context();
        let host = env.insert(ResourceKind::Host, &host());

        let credentials = bm_credentials(&ctx, &host, Some(&board_management(None)))
            .await
            .unwrap();

        assert!(credentials.is_none());
    }

    #[tokio::test]
    async fn test_missing_secret_waits() {
        let env = TestEnv::new();
        let ctx = env.context();
        let host = env.insert(ResourceKind::Host, &host());

        let err = bm_credentials(&ctx, &host, Some(&board_management(Some("bmc"))))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReconcileError::WaitForMonitor(ref m) if m == "waiting for BM credentials secret: \"bmc\""
        ));
    }

    #[tokio::test]
    async fn test_missing_secret_key_is_user_error() {
        let env = TestEnv::new();
        let ctx = env.context();
        env.insert(ResourceKind::Secret, &secret("bmc", &[("username", "admin")]));
        let host = env.insert(ResourceKind::Host, &host());

        let err = bm_credentials(&ctx, &host, Some(&board_management(Some("bmc"))))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReconcileError::UserData(ref m) if m == "missing \"password\" key within BM credential secret"
        ));
    }

    #[tokio::test]
    async fn test_password_over_http_requires_opt_out() {
        let env = TestEnv::new();
        let https = FakePlatform::new("https://sysinv:6385/v1");

        assert!(matches!(
            check_password_transport(&env.context(), env.sysinv.as_ref()),
            Err(ReconcileError::HttpsClientRequired(_))
        ));
        assert!(check_password_transport(&env.context(), https.as_ref()).is_ok());

        let config =
            ReconcilerConfig::from_yaml("reconcilers:\n  host:\n    bmc:\n      httpsRequired: false\n")
                .unwrap();
        assert!(check_password_transport(&env.context_with(config), env.sysinv.as_ref()).is_ok());
    }
}
