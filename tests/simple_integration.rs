// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Integration tests for the deployment manager
//!
//! These tests verify the CRDs and the operator's status handling in a
//! Kubernetes cluster. They do not need a StarlingX platform: with an
//! unreachable endpoint the System must stay out of sync and its dependents
//! must wait.
//!
//! Run with: cargo test --test simple_integration -- --ignored

#![allow(clippy::items_after_statements)]
#![allow(clippy::manual_let_else)]

mod common;

use common::{
    cleanup_test_namespace, create_endpoint_secret, create_test_namespace,
    get_kube_client_or_skip, wait_for_reconcile,
};
use deployment_manager::constants::API_GROUP;
use deployment_manager::crd::{
    DataNetwork, DataNetworkSpec, Host, HostProfile, HostProfileSpec, HostSpec, System, SystemSpec,
};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, ListParams, PostParams};
use std::time::Duration;

// ============================================================================
// Basic Connectivity Tests
// ============================================================================

#[tokio::test]
#[ignore] // Run with: cargo test --test simple_integration -- --ignored
async fn test_crds_installed() {
    println!("\n=== Test: Deployment Manager CRDs Installed ===\n");

    let client = match get_kube_client_or_skip().await {
        Some(c) => c,
        None => return,
    };

    let crds: Api<CustomResourceDefinition> = Api::all(client);

    match crds.list(&ListParams::default()).await {
        Ok(crd_list) => {
            let kinds: Vec<String> = crd_list
                .items
                .iter()
                .filter(|crd| crd.spec.group == API_GROUP)
                .map(|crd| crd.spec.names.kind.clone())
                .collect();

            for kind in &kinds {
                println!("  - {kind}");
            }

            if kinds.is_empty() {
                println!("⚠ Warning: no CRDs found. Install with: kubectl apply -f deploy/crds/");
                return;
            }

            for expected in [
                "System",
                "Host",
                "HostProfile",
                "PlatformNetwork",
                "AddressPool",
                "DataNetwork",
                "PtpInstance",
                "PtpInterface",
            ] {
                assert!(
                    kinds.iter().any(|k| k == expected),
                    "missing CRD for {expected}"
                );
            }
        }
        Err(e) => {
            println!("⚠ Could not check CRDs: {e}");
            println!("  This is expected if you don't have CRD permissions");
        }
    }

    println!("\n✓ Test passed\n");
}

// ============================================================================
// Resource Tests
// ============================================================================

#[tokio::test]
#[ignore]
async fn test_create_configuration_set() {
    println!("\n=== Test: Create Configuration Set ===\n");

    let client = match get_kube_client_or_skip().await {
        Some(c) => c,
        None => return,
    };

    let namespace = "deployment-manager-integration";
    create_test_namespace(&client, namespace)
        .await
        .expect("Failed to create namespace");

    let systems: Api<System> = Api::namespaced(client.clone(), namespace);
    let profiles: Api<HostProfile> = Api::namespaced(client.clone(), namespace);
    let hosts: Api<Host> = Api::namespaced(client.clone(), namespace);
    let data_networks: Api<DataNetwork> = Api::namespaced(client.clone(), namespace);

    let system = System::new(
        "default",
        SystemSpec {
            description: Some("integration test".to_string()),
            dns_servers: Some(vec!["8.8.8.8".to_string()]),
            ..Default::default()
        },
    );
    systems
        .create(&PostParams::default(), &system)
        .await
        .expect("Failed to create System");

    let profile = HostProfile::new(
        "controller-profile",
        HostProfileSpec {
            personality: Some("controller".to_string()),
            administrative_state: Some("unlocked".to_string()),
            ..Default::default()
        },
    );
    profiles
        .create(&PostParams::default(), &profile)
        .await
        .expect("Failed to create HostProfile");

    let host = Host::new(
        "controller-0",
        HostSpec {
            profile: "controller-profile".to_string(),
            ..Default::default()
        },
    );
    hosts
        .create(&PostParams::default(), &host)
        .await
        .expect("Failed to create Host");

    let physnet = DataNetwork::new(
        "physnet0",
        DataNetworkSpec {
            network_type: "vlan".to_string(),
            mtu: Some(1500),
            ..Default::default()
        },
    );
    data_networks
        .create(&PostParams::default(), &physnet)
        .await
        .expect("Failed to create DataNetwork");

    let stored = systems.get("default").await.expect("Failed to read System");
    assert_eq!(stored.spec.description.as_deref(), Some("integration test"));
    let stored = hosts.get("controller-0").await.expect("Failed to read Host");
    assert_eq!(stored.spec.profile, "controller-profile");

    cleanup_test_namespace(&client, namespace)
        .await
        .expect("Failed to delete namespace");

    println!("\n✓ Test passed\n");
}

#[tokio::test]
#[ignore]
async fn test_unreachable_platform_keeps_resources_out_of_sync() {
    println!("\n=== Test: Unreachable Platform ===\n");

    let client = match get_kube_client_or_skip().await {
        Some(c) => c,
        None => return,
    };

    let namespace = "deployment-manager-unreachable";
    create_test_namespace(&client, namespace)
        .await
        .expect("Failed to create namespace");
    create_endpoint_secret(&client, namespace, "http://192.0.2.1:5000/v3")
        .await
        .expect("Failed to create endpoint secret");

    let systems: Api<System> = Api::namespaced(client.clone(), namespace);
    let data_networks: Api<DataNetwork> = Api::namespaced(client.clone(), namespace);
    systems
        .create(
            &PostParams::default(),
            &System::new("default", SystemSpec::default()),
        )
        .await
        .expect("Failed to create System");
    data_networks
        .create(
            &PostParams::default(),
            &DataNetwork::new(
                "physnet0",
                DataNetworkSpec {
                    network_type: "flat".to_string(),
                    ..Default::default()
                },
            ),
        )
        .await
        .expect("Failed to create DataNetwork");

    wait_for_reconcile(Duration::from_secs(30)).await;

    let system = systems.get("default").await.expect("Failed to read System");
    let in_sync = system.status.as_ref().is_some_and(|s| s.common.in_sync);
    assert!(!in_sync, "System must not be in sync without a platform");

    let physnet = data_networks
        .get("physnet0")
        .await
        .expect("Failed to read DataNetwork");
    let reconciled = physnet.status.as_ref().is_some_and(|s| s.common.reconciled);
    assert!(!reconciled, "DataNetwork must wait for the System");

    cleanup_test_namespace(&client, namespace)
        .await
        .expect("Failed to delete namespace");

    println!("\n✓ Test passed\n");
}
