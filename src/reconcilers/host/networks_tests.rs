// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `networks.rs`

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::crd::{
        AddressPool, AddressPoolSpec, AllocationInfo, AllocationRange, PlatformNetwork,
        PlatformNetworkSpec, ResourceStatus,
    };
    use crate::errors::ReconcileError;
    use crate::events::reasons;
    use crate::reconcilers::host::networks::{canonical_address, reconcile_platform_networks};
    use crate::store::ResourceKind;
    use crate::testing::{in_namespace, TestEnv, NAMESPACE};

    fn pool(subnet: &str, prefix: i32, gateway: &str) -> AddressPool {
        in_namespace(AddressPool::new(
            "oam-pool",
            AddressPoolSpec {
                subnet: subnet.to_string(),
                prefix,
                gateway: Some(gateway.to_string()),
                ..Default::default()
            },
        ))
    }

    fn network(pools: &[&str]) -> PlatformNetwork {
        in_namespace(PlatformNetwork::new(
            "oam",
            PlatformNetworkSpec {
                network_type: "oam".to_string(),
                associated_address_pools: Some(pools.iter().map(|p| (*p).to_string()).collect()),
                ..Default::default()
            },
        ))
    }

    fn pool_status(env: &TestEnv) -> ResourceStatus {
        env.get::<AddressPool>(ResourceKind::AddressPool, "oam-pool")
            .status
            .unwrap_or_default()
            .common
    }

    fn network_status(env: &TestEnv) -> ResourceStatus {
        env.get::<PlatformNetwork>(ResourceKind::PlatformNetwork, "oam")
            .status
            .unwrap_or_default()
            .common
    }

    #[test]
    fn test_canonical_address() {
        assert_eq!(canonical_address("fd00:0:0::0001"), "fd00::1");
        assert_eq!(canonical_address("10.10.10.1"), "10.10.10.1");
        assert_eq!(canonical_address("Not-An-IP"), "not-an-ip");
    }

    #[tokio::test]
    async fn test_pool_then_network_are_created() {
        let env = TestEnv::new();
        let ctx = env.context();
        env.ready().await;
        let mut oam_pool = pool("10.10.10.0", 24, "10.10.10.1");
        oam_pool.spec.allocation = AllocationInfo {
            ranges: Some(vec![AllocationRange {
                start: "10.10.10.2".to_string(),
                end: "10.10.10.50".to_string(),
            }]),
            ..Default::default()
        };
        env.insert(ResourceKind::AddressPool, &oam_pool);
        env.insert(ResourceKind::PlatformNetwork, &network(&["oam-pool"]));

        reconcile_platform_networks(&ctx, env.sysinv.as_ref(), NAMESPACE)
            .await
            .unwrap();

        let pools = env.sysinv.calls_to("POST", "addrpools");
        assert_eq!(pools.len(), 1);
        assert_eq!(
            pools[0].body,
            json!({
                "name": "oam-pool",
                "network": "10.10.10.0",
                "prefix": 24,
                "gateway_address": "10.10.10.1",
                "ranges": [["10.10.10.2", "10.10.10.50"]]
            })
        );

        let pool_uuid = env.sysinv.objects("addrpools")[0]["uuid"]
            .as_str()
            .unwrap()
            .to_string();
        let networks = env.sysinv.calls_to("POST", "networks");
        assert_eq!(
            networks[0].body,
            json!({"name": "oam", "type": "oam", "dynamic": false, "pool_uuid": pool_uuid})
        );

        let pool_status = pool_status(&env);
        assert_eq!(pool_status.id.as_deref(), Some(pool_uuid.as_str()));
        assert!(pool_status.in_sync);
        assert!(pool_status.reconciled);
        let network_status = network_status(&env);
        assert!(network_status.id.is_some());
        assert!(network_status.in_sync);
    }

    #[tokio::test]
    async fn test_existing_pool_is_patched_after_canonical_compare() {
        let env = TestEnv::new();
        let ctx = env.context();
        env.ready().await;
        let existing = env.sysinv.seed(
            "addrpools",
            json!({
                "uuid": "pool-1",
                "name": "oam-pool",
                "network": "fd00:0::0",
                "prefix": 64,
                "gateway_address": "fd00::1",
                "order": "random",
                "ranges": [["fd00::2", "fd00::ff"]]
            }),
        );
        env.sysinv.seed(
            "networks",
            json!({"uuid": "net-1", "name": "oam", "type": "oam", "dynamic": false,
                   "pool_uuid": existing["uuid"]}),
        );
        let mut oam_pool = pool("fd00::", 64, "fd00:0:0::1");
        oam_pool.spec.floating_address = Some("fd00::5".to_string());
        env.insert(ResourceKind::AddressPool, &oam_pool);
        env.insert(ResourceKind::PlatformNetwork, &network(&["oam-pool"]));

        reconcile_platform_networks(&ctx, env.sysinv.as_ref(), NAMESPACE)
            .await
            .unwrap();

        let patches = env.sysinv.calls_to("PATCH", "addrpools/pool-1");
        assert_eq!(
            patches[0].body,
            json!([{"op": "replace", "path": "/floating_address", "value": "fd00::5"}])
        );
        assert!(env.sysinv.calls_to("PATCH", "networks/net-1").is_empty());
        assert!(env.sysinv.calls_to("POST", "networks").is_empty());
        assert_eq!(network_status(&env).id.as_deref(), Some("net-1"));
    }

    #[tokio::test]
    async fn test_missing_pool_fails_network() {
        let env = TestEnv::new();
        let ctx = env.context();
        env.ready().await;
        env.insert(ResourceKind::PlatformNetwork, &network(&["absent"]));

        let err = reconcile_platform_networks(&ctx, env.sysinv.as_ref(), NAMESPACE)
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::MissingKubernetesResource(_)));
        assert!(!network_status(&env).in_sync);
        assert_eq!(env.sysinv.mutations(), 0);
    }

    #[tokio::test]
    async fn test_change_after_in_sync_does_not_fail_host() {
        let env = TestEnv::new();
        let ctx = env.context();
        env.ready().await;
        env.insert(ResourceKind::AddressPool, &pool("10.10.10.0", 24, "10.10.10.1"));
        env.insert(ResourceKind::PlatformNetwork, &network(&["oam-pool"]));
        reconcile_platform_networks(&ctx, env.sysinv.as_ref(), NAMESPACE)
            .await
            .unwrap();
        env.store.update_spec(
            ResourceKind::AddressPool,
            NAMESPACE,
            "oam-pool",
            &json!({"gateway": "10.10.10.254"}),
        );
        let mutations = env.sysinv.mutations();

        reconcile_platform_networks(&ctx, env.sysinv.as_ref(), NAMESPACE)
            .await
            .unwrap();

        assert_eq!(env.sysinv.mutations(), mutations);
        assert!(pool_status(&env).delta.contains("+ gateway_address: 10.10.10.254"));
        assert!(env
            .events
            .with_reason(reasons::UPDATED)
            .iter()
            .any(|e| e.note.as_deref()
                == Some("oam: configuration changes ignored after initial synchronization has completed")));
    }
}
