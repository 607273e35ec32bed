// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `crd.rs`

#[cfg(test)]
mod tests {
    use crate::crd::*;
    use kube::CustomResourceExt;
    use serde_json::json;

    #[test]
    fn test_crds_share_group_and_version() {
        let crds = [
            System::crd(),
            Host::crd(),
            HostProfile::crd(),
            PlatformNetwork::crd(),
            AddressPool::crd(),
            DataNetwork::crd(),
            PtpInstance::crd(),
            PtpInterface::crd(),
        ];

        for crd in &crds {
            assert_eq!(crd.spec.group, "starlingx.windriver.com");
            assert_eq!(crd.spec.scope, "Namespaced");
            assert_eq!(crd.spec.versions.len(), 1);
            assert_eq!(crd.spec.versions[0].name, "v1");
        }
        assert_eq!(System::crd().spec.names.plural, "systems");
        assert_eq!(
            HostProfile::crd().spec.names.short_names,
            Some(vec!["hp".to_string()])
        );
    }

    #[test]
    fn test_https_enabled_follows_platform_certificate() {
        let mut spec = SystemSpec::default();
        assert!(!spec.https_enabled());

        spec.certificates = Some(vec![CertificateInfo {
            cert_type: "ssl_ca".into(),
            secret: "ca".into(),
        }]);
        assert!(!spec.https_enabled());

        spec.certificates.as_mut().unwrap().push(CertificateInfo {
            cert_type: "ssl".into(),
            secret: "platform".into(),
        });
        assert!(spec.https_enabled());
    }

    #[test]
    fn test_private_key_expected() {
        let cert = |t: &str| CertificateInfo {
            cert_type: t.into(),
            secret: "s".into(),
        };
        assert!(!cert("ssl_ca").private_key_expected());
        assert!(!cert("openstack_ca").private_key_expected());
        assert!(cert("ssl").private_key_expected());
        assert!(cert("docker_registry").private_key_expected());
    }

    #[test]
    fn test_worker_sub_function() {
        let mut profile = HostProfileSpec {
            personality: Some("controller".into()),
            ..Default::default()
        };
        assert!(!profile.has_worker_sub_function());

        profile.sub_functions = Some(vec!["controller".into(), "worker".into()]);
        assert!(profile.has_worker_sub_function());

        let worker = HostProfileSpec {
            personality: Some("worker".into()),
            ..Default::default()
        };
        assert!(worker.has_worker_sub_function());
    }

    #[test]
    fn test_system_status_flattens_common_fields() {
        let status = SystemStatus {
            common: ResourceStatus {
                id: Some("system-uuid".into()),
                in_sync: true,
                reconciled: true,
                ..Default::default()
            },
            system_type: "all-in-one".into(),
            strategy_applied: true,
            ..Default::default()
        };

        let value = serde_json::to_value(&status).unwrap();

        assert_eq!(value["id"], "system-uuid");
        assert_eq!(value["inSync"], true);
        assert_eq!(value["reconciled"], true);
        assert_eq!(value["systemType"], "all-in-one");
        assert_eq!(value["strategyApplied"], true);
        assert!(value.get("common").is_none());
        assert!(value.get("defaults").is_none());
    }

    #[test]
    fn test_host_profile_wire_names() {
        let spec: HostProfileSpec = serde_json::from_value(json!({
            "personality": "worker",
            "subfunctions": ["worker", "lowlatency"],
            "bootMAC": "01:02:03:04:05:06",
            "maxCPUMhzConfigured": "2200",
            "labels": {"sriov": "enabled"}
        }))
        .unwrap();

        assert_eq!(
            spec.sub_functions,
            Some(vec!["worker".to_string(), "lowlatency".to_string()])
        );
        assert_eq!(spec.boot_mac.as_deref(), Some("01:02:03:04:05:06"));
        assert_eq!(spec.max_cpu_mhz_configured.as_deref(), Some("2200"));
        assert_eq!(spec.labels.unwrap()["sriov"], "enabled");
    }

    #[test]
    fn test_service_parameter_wire_names() {
        let parameter: ServiceParameterInfo = serde_json::from_value(json!({
            "service": "platform",
            "section": "config",
            "paramname": "sysinv_api_workers",
            "paramvalue": "4"
        }))
        .unwrap();

        assert_eq!(parameter.param_name, "sysinv_api_workers");
        assert_eq!(parameter.param_value, "4");
        assert!(parameter.personality.is_none());
    }

    #[test]
    fn test_platform_network_type_field() {
        let spec: PlatformNetworkSpec = serde_json::from_value(json!({
            "type": "oam",
            "associatedAddressPools": ["oam-ipv4"]
        }))
        .unwrap();

        assert_eq!(spec.network_type, "oam");
        assert!(!spec.dynamic);
        assert_eq!(
            spec.associated_address_pools,
            Some(vec!["oam-ipv4".to_string()])
        );
    }
}
