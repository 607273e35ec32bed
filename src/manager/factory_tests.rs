// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use k8s_openapi::api::core::v1::ConfigMap;
    use kube::api::ObjectMeta;

    use crate::manager::factory::factory_reconfig_allowed;
    use crate::manager::Manager;
    use crate::store::ResourceKind;
    use crate::testing::{FakeConnector, FakeObjectStore};

    const NS: &str = "deployment";

    fn config_map(entries: &[(&str, &str)]) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some("factory-install".to_string()),
                namespace: Some(NS.to_string()),
                ..Default::default()
            },
            data: Some(
                entries
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect::<BTreeMap<_, _>>(),
            ),
            ..Default::default()
        }
    }

    fn manager_with(entries: Option<&[(&str, &str)]>) -> (Arc<FakeObjectStore>, Arc<Manager>) {
        let store = Arc::new(FakeObjectStore::new());
        if let Some(entries) = entries {
            store.insert(ResourceKind::ConfigMap, &config_map(entries));
        }
        let manager = Manager::new(store.clone(), FakeConnector::new());
        (store, manager)
    }

    #[tokio::test]
    async fn test_no_config_map_is_not_factory_mode() {
        let (_, manager) = manager_with(None);
        assert!(!manager.get_factory_install(NS).await.unwrap());
        assert!(!manager.get_resource_default_updated(NS, "default").await.unwrap());
    }

    #[tokio::test]
    async fn test_factory_install_truth_table() {
        let cases: &[(&[(&str, &str)], bool)] = &[
            (&[], false),
            (&[("factory-installed", "false")], false),
            (&[("factory-installed", "true")], true),
            (
                &[("factory-installed", "true"), ("factory-config-finalized", "false")],
                true,
            ),
            (
                &[("factory-installed", "true"), ("factory-config-finalized", "true")],
                false,
            ),
            (
                &[("factory-installed", "True"), ("factory-config-finalized", "bogus")],
                true,
            ),
        ];
        for (entries, expected) in cases {
            let (_, manager) = manager_with(Some(entries));
            assert_eq!(
                manager.get_factory_install(NS).await.unwrap(),
                *expected,
                "entries: {entries:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_unparseable_installed_flag_is_an_error() {
        let (_, manager) = manager_with(Some(&[("factory-installed", "yes")]));
        assert!(manager.get_factory_install(NS).await.is_err());
    }

    #[tokio::test]
    async fn test_finalize_ends_factory_mode() {
        let (_, manager) = manager_with(Some(&[("factory-installed", "true")]));
        assert!(manager.get_factory_install(NS).await.unwrap());

        manager.set_factory_config_finalized(NS, true).await.unwrap();
        assert!(!manager.get_factory_install(NS).await.unwrap());
    }

    #[tokio::test]
    async fn test_finalize_without_config_map_is_noop() {
        let (store, manager) = manager_with(None);
        manager.set_factory_config_finalized(NS, true).await.unwrap();
        assert!(store.patches().is_empty());
    }

    #[tokio::test]
    async fn test_resource_default_updated_round_trip() {
        let (store, manager) = manager_with(Some(&[("factory-installed", "true")]));
        assert!(!manager.get_resource_default_updated(NS, "controller-0").await.unwrap());

        manager
            .set_resource_default_updated(NS, "controller-0", true)
            .await
            .unwrap();

        assert!(manager.get_resource_default_updated(NS, "controller-0").await.unwrap());
        let stored: ConfigMap = store.typed(ResourceKind::ConfigMap, NS, "factory-install");
        assert_eq!(
            stored.data.unwrap().get("controller-0-default-updated").map(String::as_str),
            Some("true")
        );
    }

    #[tokio::test]
    async fn test_invalid_default_updated_value_is_an_error() {
        let (_, manager) = manager_with(Some(&[("system-default-updated", "maybe")]));
        assert!(manager.get_resource_default_updated(NS, "system").await.is_err());
    }

    #[test]
    fn test_reconfig_allowed_filters_config_maps() {
        assert!(factory_reconfig_allowed(NS, &config_map(&[("factory-installed", "true")])));
        assert!(!factory_reconfig_allowed("other", &config_map(&[("factory-installed", "true")])));
        assert!(!factory_reconfig_allowed(NS, &config_map(&[("factory-installed", "false")])));
        assert!(!factory_reconfig_allowed(
            NS,
            &config_map(&[("factory-installed", "true"), ("factory-config-finalized", "true")])
        ));
        assert!(!factory_reconfig_allowed(
            NS,
            &config_map(&[("factory-installed", "true"), ("factory-config-finalized", "x")])
        ));

        let mut renamed = config_map(&[("factory-installed", "true")]);
        renamed.metadata.name = Some("something-else".to_string());
        assert!(!factory_reconfig_allowed(NS, &renamed));
    }
}
