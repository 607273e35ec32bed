// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `hostprofile.rs`

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use kube::ResourceExt;

    use crate::constants::PROFILE_ANNOTATION_PREFIX;
    use crate::crd::{Host, HostProfile, HostProfileSpec, HostSpec};
    use crate::errors::ReconcileError;
    use crate::reconcilers::hostprofile::{
        profile_chain, reconcile_host_profile, resolve_host_profile, resolve_profile, ProfileMap,
    };
    use crate::store::ResourceKind;
    use crate::testing::{in_namespace, TestEnv, NAMESPACE};

    fn spec(base: Option<&str>) -> HostProfileSpec {
        HostProfileSpec {
            base: base.map(str::to_string),
            ..HostProfileSpec::default()
        }
    }

    fn host(name: &str, profile: &str) -> Host {
        in_namespace(Host::new(
            name,
            HostSpec {
                profile: profile.to_string(),
                ..Default::default()
            },
        ))
    }

    fn profiles() -> ProfileMap {
        let mut common = spec(None);
        common.personality = Some("controller".to_string());
        common.console = Some("ttyS0,115200n8".to_string());
        common.labels = Some(BTreeMap::from([("sriov".to_string(), "enabled".to_string())]));

        let mut controller = spec(Some("common"));
        controller.console = Some("tty0".to_string());
        controller.administrative_state = Some("unlocked".to_string());

        BTreeMap::from([
            ("common".to_string(), common),
            ("controller".to_string(), controller),
        ])
    }

    #[test]
    fn test_chain_lists_nearest_first() {
        let chain = profile_chain(&profiles(), "controller").unwrap();
        assert_eq!(chain, vec!["controller", "common"]);
    }

    #[test]
    fn test_chain_loop_is_validation_error() {
        let mut map = profiles();
        map.insert("common".to_string(), spec(Some("controller")));

        let err = profile_chain(&map, "controller").unwrap_err();

        assert!(matches!(
            err,
            ReconcileError::Validation(ref m)
                if m == "host profile inheritance loop: controller -> common -> controller"
        ));
    }

    #[test]
    fn test_chain_with_missing_base() {
        let mut map = profiles();
        map.insert("controller".to_string(), spec(Some("absent")));

        let err = profile_chain(&map, "controller").unwrap_err();
        assert!(matches!(err, ReconcileError::MissingKubernetesResource(_)));
    }

    #[test]
    fn test_resolve_merges_over_base() {
        let resolved = resolve_profile(&profiles(), "controller").unwrap();

        assert_eq!(resolved.base, None);
        assert_eq!(resolved.personality.as_deref(), Some("controller"));
        assert_eq!(resolved.console.as_deref(), Some("tty0"));
        assert_eq!(resolved.administrative_state.as_deref(), Some("unlocked"));
        assert_eq!(
            resolved.labels.unwrap().get("sriov").map(String::as_str),
            Some("enabled")
        );
    }

    #[test]
    fn test_host_overrides_win() {
        let mut controller_0 = host("controller-0", "controller");
        controller_0.spec.overrides = Some(HostProfileSpec {
            location: Some("rack 1".to_string()),
            administrative_state: Some("locked".to_string()),
            ..HostProfileSpec::default()
        });

        let resolved = resolve_host_profile(&profiles(), &controller_0).unwrap();

        assert_eq!(resolved.location.as_deref(), Some("rack 1"));
        assert_eq!(resolved.administrative_state.as_deref(), Some("locked"));
        assert_eq!(resolved.console.as_deref(), Some("tty0"));
    }

    fn seeded_env() -> TestEnv {
        let env = TestEnv::new();
        for (name, spec) in profiles() {
            env.insert(ResourceKind::HostProfile, &in_namespace(HostProfile::new(&name, spec)));
        }
        env.insert(ResourceKind::Host, &host("controller-0", "controller"));
        env.insert(ResourceKind::Host, &host("controller-1", "common"));
        env.insert(ResourceKind::Host, &host("worker-0", "worker"));
        env
    }

    fn profile_annotation(env: &TestEnv, host: &str, profile: &str) -> Option<String> {
        env.store.annotation(
            ResourceKind::Host,
            NAMESPACE,
            host,
            &format!("{PROFILE_ANNOTATION_PREFIX}{profile}"),
        )
    }

    #[tokio::test]
    async fn test_base_change_annotates_every_dependent_host() {
        let env = seeded_env();
        let ctx = env.context();
        let common: HostProfile = env.get(ResourceKind::HostProfile, "common");
        let version = common.resource_version().unwrap();

        reconcile_host_profile(Arc::new(common), Arc::clone(&ctx))
            .await
            .unwrap();

        assert_eq!(
            profile_annotation(&env, "controller-0", "common").as_deref(),
            Some(version.as_str())
        );
        assert_eq!(
            profile_annotation(&env, "controller-1", "common").as_deref(),
            Some(version.as_str())
        );
        assert!(profile_annotation(&env, "worker-0", "common").is_none());
    }

    #[tokio::test]
    async fn test_unchanged_profile_does_not_annotate_again() {
        let env = seeded_env();
        let ctx = env.context();
        let controller: HostProfile = env.get(ResourceKind::HostProfile, "controller");
        reconcile_host_profile(Arc::new(controller.clone()), Arc::clone(&ctx))
            .await
            .unwrap();
        let patches = env.store.patches().len();

        reconcile_host_profile(Arc::new(controller), Arc::clone(&ctx))
            .await
            .unwrap();

        assert_eq!(env.store.patches().len(), patches);
        assert!(profile_annotation(&env, "controller-1", "controller").is_none());
    }

    #[tokio::test]
    async fn test_profile_loop_is_reported() {
        let env = seeded_env();
        let ctx = env.context();
        env.store.update_spec(
            ResourceKind::HostProfile,
            NAMESPACE,
            "common",
            &serde_json::json!({"base": "controller"}),
        );
        let common: HostProfile = env.get(ResourceKind::HostProfile, "common");

        let err = reconcile_host_profile(Arc::new(common), Arc::clone(&ctx))
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::Validation(_)));
        assert!(env.store.patches().is_empty());
    }
}
