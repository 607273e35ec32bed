// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use crate::crd::{DataNetwork, DataNetworkSpec};
    use crate::events::reasons;
    use crate::testing::{TestEnv, NAMESPACE};

    fn network() -> DataNetwork {
        let mut network = DataNetwork::new("data0", DataNetworkSpec::default());
        network.metadata.namespace = Some(NAMESPACE.to_string());
        network
    }

    #[test]
    fn test_active_host_notify_is_exclusive() {
        let env = TestEnv::new();
        let ctx = env.context();

        let first = ctx.begin_active_host_notify();
        assert!(first.is_some());
        assert!(ctx.begin_active_host_notify().is_none());

        drop(first);
        assert!(ctx.begin_active_host_notify().is_some());
    }

    #[tokio::test]
    async fn test_events_are_prefixed_with_object_name() {
        let env = TestEnv::new();
        let ctx = env.context();

        ctx.normal_event(&network(), reasons::CREATED, "data network has been created")
            .await;
        ctx.warning_event(&network(), reasons::DEPENDENCY, "waiting for platform client creation")
            .await;
        ctx.normal_event(&network(), reasons::DELETED, "data network has been deleted")
            .await;

        let events = env.events.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].kind, "DataNetwork");
        assert_eq!(events[0].note.as_deref(), Some("data0: data network has been created"));
        assert_eq!(events[0].action, "Reconcile");
        assert!(!events[0].warning);
        assert!(events[1].warning);
        assert_eq!(events[1].reason, "Dependency");
        assert_eq!(events[2].action, "Delete");
    }
}
