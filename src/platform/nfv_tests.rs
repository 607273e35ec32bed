// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `nfv.rs`

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::platform::nfv::{
        apply_all, create, delete, show, ApplyType, StrategyRequest, STATE_READY_TO_APPLY,
        STRATEGY_ACTIONS_PATH, STRATEGY_PATH,
    };
    use crate::testing::FakePlatform;

    #[test]
    fn test_request_uses_kebab_case_keys() {
        let request = StrategyRequest {
            controller_apply_type: ApplyType::Serial,
            worker_apply_type: ApplyType::Parallel,
            ..StrategyRequest::default()
        };

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(
            body,
            json!({
                "controller-apply-type": "serial",
                "storage-apply-type": "ignore",
                "worker-apply-type": "parallel",
                "default-instance-action": "stop-start",
                "alarm-restrictions": "relaxed",
            })
        );
    }

    #[test]
    fn test_apply_type_default_is_ignore() {
        assert_eq!(ApplyType::default(), ApplyType::Ignore);
        assert_eq!(ApplyType::Serial.as_str(), "serial");
    }

    #[tokio::test]
    async fn test_show_without_strategy() {
        let vim = FakePlatform::new("http://vim:4545");
        vim.on("GET", STRATEGY_PATH, Ok(json!({ "strategy": null })));

        assert_eq!(show(vim.as_ref()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_show_empty_body() {
        let vim = FakePlatform::new("http://vim:4545");
        vim.on("GET", STRATEGY_PATH, Ok(serde_json::Value::Null));

        assert_eq!(show(vim.as_ref()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_show_reports_state() {
        let vim = FakePlatform::new("http://vim:4545");
        vim.on(
            "GET",
            STRATEGY_PATH,
            Ok(json!({ "strategy": {
                "uuid": "s-1",
                "state": "ready-to-apply",
                "controller-apply-type": "serial",
            }})),
        );

        let strategy = show(vim.as_ref()).await.unwrap().unwrap();
        assert_eq!(strategy.state, STATE_READY_TO_APPLY);
        assert_eq!(strategy.controller_apply_type, "serial");
    }

    #[tokio::test]
    async fn test_create_apply_delete_paths() {
        let vim = FakePlatform::new("http://vim:4545");
        vim.on(
            "POST",
            STRATEGY_PATH,
            Ok(json!({ "strategy": { "uuid": "s-1", "state": "building" }})),
        );
        vim.on(
            "POST",
            STRATEGY_ACTIONS_PATH,
            Ok(json!({ "strategy": { "uuid": "s-1", "state": "applying" }})),
        );
        vim.on("DELETE", STRATEGY_PATH, Ok(serde_json::Value::Null));

        let created = create(vim.as_ref(), &StrategyRequest::default()).await.unwrap();
        assert_eq!(created.unwrap().state, "building");

        let applied = apply_all(vim.as_ref()).await.unwrap();
        assert_eq!(applied.unwrap().state, "applying");
        delete(vim.as_ref()).await.unwrap();

        let calls = vim.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1].body, json!({ "action": "apply-all" }));
        assert_eq!(calls[2].method, "DELETE");
    }

    #[tokio::test]
    async fn test_undecodable_strategy() {
        let vim = FakePlatform::new("http://vim:4545");
        vim.on("GET", STRATEGY_PATH, Ok(json!({ "strategy": "oops" })));

        let err = show(vim.as_ref()).await.unwrap_err();
        assert!(matches!(err, crate::errors::PlatformError::Decode { .. }));
    }
}
