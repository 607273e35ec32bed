// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `status.rs`

#[cfg(test)]
mod tests {
    use crate::constants::{SCOPE_BOOTSTRAP, SCOPE_PRINCIPAL, STRATEGY_NOT_REQUIRED};
    use crate::crd::{DataNetwork, DataNetworkSpec, DataNetworkStatus, ResourceStatus};
    use crate::events::reasons;
    use crate::manager::strategy::RESOURCE_DATA_NETWORK;
    use crate::reconcilers::status::{
        deployment_scope, is_principal, record_delta, replaced_id, sync_status,
    };
    use crate::store::ResourceKind;
    use crate::testing::{in_namespace, TestEnv};

    fn network(status: Option<ResourceStatus>) -> DataNetwork {
        let mut network = in_namespace(DataNetwork::new(
            "data0",
            DataNetworkSpec {
                network_type: "flat".to_string(),
                ..Default::default()
            },
        ));
        network.status = status.map(|common| DataNetworkStatus { common });
        network
    }

    fn synced() -> ResourceStatus {
        ResourceStatus {
            id: Some("uuid-1".to_string()),
            in_sync: true,
            reconciled: true,
            observed_generation: 1,
            deployment_scope: SCOPE_BOOTSTRAP.to_string(),
            strategy_required: STRATEGY_NOT_REQUIRED.to_string(),
            ..Default::default()
        }
    }

    fn status_of(env: &TestEnv) -> ResourceStatus {
        let stored: DataNetwork = env.get(ResourceKind::DataNetwork, "data0");
        stored.status.unwrap_or_default().common
    }

    #[test]
    fn test_scope_defaults_to_bootstrap() {
        assert_eq!(deployment_scope(&network(None)), SCOPE_BOOTSTRAP);
        assert_eq!(
            deployment_scope(&network(Some(ResourceStatus::default()))),
            SCOPE_BOOTSTRAP
        );

        let principal = network(Some(ResourceStatus {
            deployment_scope: SCOPE_PRINCIPAL.to_string(),
            ..Default::default()
        }));
        assert!(is_principal(&principal));
    }

    #[test]
    fn test_replaced_id_only_for_a_different_uuid() {
        assert_eq!(replaced_id(None, "uuid-2"), None);
        assert_eq!(replaced_id(Some(""), "uuid-2"), None);
        assert_eq!(replaced_id(Some("uuid-1"), "uuid-1"), None);
        assert_eq!(replaced_id(Some("uuid-1"), "uuid-2"), Some("uuid-1"));
    }

    #[tokio::test]
    async fn test_recreated_resource_takes_new_id() {
        let env = TestEnv::new();
        let ctx = env.context();
        let stored = env.insert(ResourceKind::DataNetwork, &network(Some(synced())));

        let updated = sync_status(&ctx, &stored, Some("uuid-2"), true).await.unwrap();

        let status = updated.status.unwrap().common;
        assert_eq!(status.id.as_deref(), Some("uuid-2"));
        assert!(status.in_sync && status.reconciled);
        assert_eq!(status_of(&env).id.as_deref(), Some("uuid-2"));
    }

    #[tokio::test]
    async fn test_first_sync_latches_reconciled() {
        let env = TestEnv::new();
        let ctx = env.context();
        let stored = env.insert(ResourceKind::DataNetwork, &network(None));

        let updated = sync_status(&ctx, &stored, Some("uuid-1"), true).await.unwrap();

        let status = updated.status.unwrap().common;
        assert_eq!(status.id.as_deref(), Some("uuid-1"));
        assert!(status.in_sync);
        assert!(status.reconciled);
        assert_eq!(status.strategy_required, STRATEGY_NOT_REQUIRED);

        let events = env.events.with_reason(reasons::UPDATED);
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].note.as_deref(),
            Some("data0: synchronization has changed to: true")
        );
    }

    #[tokio::test]
    async fn test_failure_keeps_reconciled() {
        let env = TestEnv::new();
        let ctx = env.context();
        let stored = env.insert(ResourceKind::DataNetwork, &network(Some(synced())));

        sync_status(&ctx, &stored, None, false).await.unwrap();

        let status = status_of(&env);
        assert!(!status.in_sync);
        assert!(status.reconciled);
        assert_eq!(status.id.as_deref(), Some("uuid-1"));
    }

    #[tokio::test]
    async fn test_unchanged_status_is_not_written() {
        let env = TestEnv::new();
        let ctx = env.context();
        let stored = env.insert(ResourceKind::DataNetwork, &network(Some(synced())));

        sync_status(&ctx, &stored, Some("uuid-1"), true).await.unwrap();

        assert!(env.store.patches().is_empty());
        assert!(env.events.events().is_empty());
    }

    #[tokio::test]
    async fn test_sync_clears_delta() {
        let env = TestEnv::new();
        let ctx = env.context();
        let stored = env.insert(
            ResourceKind::DataNetwork,
            &network(Some(ResourceStatus {
                in_sync: false,
                delta: "\t+ mtu: 1400".to_string(),
                ..synced()
            })),
        );

        sync_status(&ctx, &stored, None, true).await.unwrap();

        assert!(status_of(&env).delta.is_empty());
    }

    #[tokio::test]
    async fn test_principal_sync_publishes_fact() {
        let env = TestEnv::new();
        let ctx = env.context();
        let stored = env.insert(
            ResourceKind::DataNetwork,
            &network(Some(ResourceStatus {
                deployment_scope: SCOPE_PRINCIPAL.to_string(),
                ..Default::default()
            })),
        );

        sync_status(&ctx, &stored, Some("uuid-1"), true).await.unwrap();

        let facts = env.manager.strategy_status().resource_info;
        let fact = facts.get("data0").unwrap();
        assert_eq!(fact.resource_type, RESOURCE_DATA_NETWORK);
        assert!(fact.reconciled);
        assert_eq!(fact.strategy_required, STRATEGY_NOT_REQUIRED);
    }

    #[tokio::test]
    async fn test_record_delta_writes_on_change_only() {
        let env = TestEnv::new();
        let stored = env.insert(ResourceKind::DataNetwork, &network(Some(synced())));

        record_delta(env.store.as_ref(), &stored, "\t+ mtu: 1400")
            .await
            .unwrap();
        assert_eq!(status_of(&env).delta, "\t+ mtu: 1400");

        let stored: DataNetwork = env.get(ResourceKind::DataNetwork, "data0");
        record_delta(env.store.as_ref(), &stored, "\t+ mtu: 1400")
            .await
            .unwrap();
        assert_eq!(env.store.patches().len(), 1);
    }
}
