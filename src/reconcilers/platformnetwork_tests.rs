// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `platformnetwork.rs`

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use kube::runtime::controller::Action;
    use serde_json::json;

    use crate::constants::{
        LAST_APPLIED_CONFIGURATION_ANNOTATION, NOTIFICATIONS_ANNOTATION,
        PLATFORM_NETWORK_FINALIZER, RESTORE_IN_PROGRESS_ANNOTATION, SCOPE_BOOTSTRAP,
        SCOPE_PRINCIPAL, STRATEGY_NOT_REQUIRED,
    };
    use crate::context::Context;
    use crate::crd::{Host, HostSpec, PlatformNetwork, PlatformNetworkSpec};
    use crate::errors::{PlatformError, ReconcileError};
    use crate::events::reasons;
    use crate::reconcilers::platformnetwork::reconcile_platform_network;
    use crate::store::ResourceKind;
    use crate::testing::{in_namespace, TestEnv, NAMESPACE};

    fn mgmt() -> PlatformNetwork {
        in_namespace(PlatformNetwork::new(
            "mgmt",
            PlatformNetworkSpec {
                network_type: "mgmt".to_string(),
                associated_address_pools: Some(vec!["mgmt-ipv4".to_string()]),
                ..Default::default()
            },
        ))
    }

    fn controller_0() -> Host {
        in_namespace(Host::new(
            "controller-0",
            HostSpec {
                profile: "controller".to_string(),
                ..Default::default()
            },
        ))
    }

    async fn reconcile(env: &TestEnv, ctx: &Arc<Context>) -> Result<Action, ReconcileError> {
        let current: PlatformNetwork = env.get(ResourceKind::PlatformNetwork, "mgmt");
        reconcile_platform_network(Arc::new(current), Arc::clone(ctx)).await
    }

    fn host_notifications(env: &TestEnv) -> Option<String> {
        env.store.annotation(
            ResourceKind::Host,
            NAMESPACE,
            "controller-0",
            NOTIFICATIONS_ANNOTATION,
        )
    }

    /// Runs `mgmt` to the point where the active host has been notified once.
    async fn notified_env() -> (TestEnv, Arc<Context>) {
        let env = TestEnv::new();
        let ctx = env.context();
        env.ready().await;
        env.insert(ResourceKind::Host, &controller_0());
        env.insert(ResourceKind::PlatformNetwork, &mgmt());
        reconcile(&env, &ctx).await.unwrap();
        reconcile(&env, &ctx).await.unwrap();
        (env, ctx)
    }

    #[tokio::test]
    async fn test_notifies_host_without_resetting_it() {
        let (env, _) = notified_env().await;

        assert_eq!(host_notifications(&env).as_deref(), Some("1"));
        let host: Host = env.get(ResourceKind::Host, "controller-0");
        assert!(host.status.is_none());
        assert_eq!(
            env.events.with_reason(reasons::NOTIFIED)[0].note.as_deref(),
            Some("controller-0: Host has been notified due to 'mgmt' platformnetwork update.")
        );
        let stored: PlatformNetwork = env.get(ResourceKind::PlatformNetwork, "mgmt");
        assert_eq!(stored.status.unwrap().common.observed_generation, 1);
    }

    #[tokio::test]
    async fn test_scope_change_notifies_again() {
        let (env, ctx) = notified_env().await;
        let applied = json!({"status": {"deploymentScope": "principal"}}).to_string();
        env.store.update_metadata(
            ResourceKind::PlatformNetwork,
            NAMESPACE,
            "mgmt",
            &json!({"annotations": {LAST_APPLIED_CONFIGURATION_ANNOTATION: applied}}),
        );

        reconcile(&env, &ctx).await.unwrap();

        assert_eq!(host_notifications(&env).as_deref(), Some("2"));
        let stored: PlatformNetwork = env.get(ResourceKind::PlatformNetwork, "mgmt");
        assert_eq!(stored.status.unwrap().common.deployment_scope, SCOPE_PRINCIPAL);

        reconcile(&env, &ctx).await.unwrap();
        assert_eq!(host_notifications(&env).as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_restore_writes_status_without_platform_calls() {
        let env = TestEnv::new();
        let ctx = env.context();
        env.ready().await;
        env.sysinv.clear_calls();
        let mut network = mgmt();
        network.metadata.annotations = Some(BTreeMap::from([(
            RESTORE_IN_PROGRESS_ANNOTATION.to_string(),
            r#"{"inSync":true}"#.to_string(),
        )]));
        env.insert(ResourceKind::PlatformNetwork, &network);

        let action = reconcile(&env, &ctx).await.unwrap();

        assert_eq!(action, Action::await_change());
        assert!(env.sysinv.calls().is_empty());
        let stored: PlatformNetwork = env.get(ResourceKind::PlatformNetwork, "mgmt");
        let status = stored.status.unwrap().common;
        assert!(status.in_sync);
        assert!(status.reconciled);
        assert_eq!(status.deployment_scope, SCOPE_BOOTSTRAP);
        assert_eq!(status.strategy_required, STRATEGY_NOT_REQUIRED);
        assert_eq!(status.observed_generation, 1);
        assert!(!stored
            .metadata
            .annotations
            .unwrap_or_default()
            .contains_key(RESTORE_IN_PROGRESS_ANNOTATION));
        assert_eq!(
            stored.metadata.finalizers,
            Some(vec![PLATFORM_NETWORK_FINALIZER.to_string()])
        );
    }

    #[tokio::test]
    async fn test_delete_removes_platform_network() {
        let (env, ctx) = notified_env().await;
        let seeded = env
            .sysinv
            .seed("networks", json!({"name": "mgmt", "type": "mgmt", "dynamic": true}));
        let uuid = seeded["uuid"].as_str().unwrap().to_string();

        env.store
            .mark_deleted(ResourceKind::PlatformNetwork, NAMESPACE, "mgmt");
        reconcile(&env, &ctx).await.unwrap();

        assert_eq!(env.sysinv.calls_to("DELETE", &format!("networks/{uuid}")).len(), 1);
        assert!(env.sysinv.objects("networks").is_empty());
        assert!(env
            .store
            .object(ResourceKind::PlatformNetwork, NAMESPACE, "mgmt")
            .is_none());
        assert_eq!(env.events.with_reason(reasons::DELETED).len(), 1);
    }

    #[tokio::test]
    async fn test_delete_tolerates_network_in_use() {
        let (env, ctx) = notified_env().await;
        let seeded = env
            .sysinv
            .seed("networks", json!({"name": "mgmt", "type": "mgmt"}));
        let uuid = seeded["uuid"].as_str().unwrap().to_string();
        env.sysinv.once(
            "DELETE",
            &format!("networks/{uuid}"),
            Err(PlatformError::Http {
                status: 409,
                method: "DELETE".to_string(),
                url: format!("http://sysinv:6385/v1/networks/{uuid}"),
                message: "network is in use".to_string(),
            }),
        );

        env.store
            .mark_deleted(ResourceKind::PlatformNetwork, NAMESPACE, "mgmt");
        reconcile(&env, &ctx).await.unwrap();

        assert!(env
            .store
            .object(ResourceKind::PlatformNetwork, NAMESPACE, "mgmt")
            .is_none());
        assert!(env.events.with_reason(reasons::DELETED).is_empty());
    }

    #[tokio::test]
    async fn test_delete_without_platform_network() {
        let (env, ctx) = notified_env().await;

        env.store
            .mark_deleted(ResourceKind::PlatformNetwork, NAMESPACE, "mgmt");
        reconcile(&env, &ctx).await.unwrap();

        assert!(env
            .store
            .object(ResourceKind::PlatformNetwork, NAMESPACE, "mgmt")
            .is_none());
        assert_eq!(env.sysinv.mutations(), 0);
    }
}
