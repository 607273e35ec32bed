// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `keystone.rs`

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::errors::PlatformError;
    use crate::platform::auth::{AuthOptions, EndpointOptions};
    use crate::platform::keystone::{
        error_message, locate_endpoint, token_request, CatalogEndpoint, CatalogEntry,
        KeystoneConnector,
    };
    use crate::platform::{PatchOp, PlatformConnector};

    fn auth(url: &str) -> AuthOptions {
        AuthOptions {
            identity_endpoint: url.to_string(),
            username: "admin".to_string(),
            password: "secret".to_string(),
            tenant_name: "admin".to_string(),
            domain_name: "Default".to_string(),
            ..AuthOptions::default()
        }
    }

    fn sysinv() -> EndpointOptions {
        EndpointOptions {
            name: "sysinv".to_string(),
            service_type: "platform".to_string(),
            availability: "public".to_string(),
            region: "RegionOne".to_string(),
            debug: false,
        }
    }

    fn token_response(server: &MockServer, token: &str) -> ResponseTemplate {
        ResponseTemplate::new(201)
            .insert_header("X-Subject-Token", token)
            .set_body_json(json!({
                "token": {
                    "catalog": [{
                        "type": "platform",
                        "name": "sysinv",
                        "endpoints": [
                            {"interface": "admin", "region": "RegionOne", "url": "http://admin:6385/v1"},
                            {"interface": "public", "region": "RegionOne", "url": format!("{}/v1", server.uri())}
                        ]
                    }]
                }
            }))
    }

    #[test]
    fn test_password_token_request() {
        let body = token_request(&auth("http://keystone:5000/v3"));
        assert_eq!(body["auth"]["identity"]["methods"], json!(["password"]));
        assert_eq!(
            body["auth"]["identity"]["password"]["user"]["name"],
            json!("admin")
        );
        assert_eq!(
            body["auth"]["identity"]["password"]["user"]["domain"],
            json!({"name": "Default"})
        );
        assert_eq!(body["auth"]["scope"]["project"]["name"], json!("admin"));
    }

    #[test]
    fn test_application_credential_token_request() {
        let options = AuthOptions {
            application_credential_id: "abc".to_string(),
            application_credential_secret: "s3cr3t".to_string(),
            ..auth("http://keystone:5000/v3")
        };
        let body = token_request(&options);
        assert_eq!(
            body["auth"]["identity"]["methods"],
            json!(["application_credential"])
        );
        assert_eq!(
            body["auth"]["identity"]["application_credential"],
            json!({"id": "abc", "secret": "s3cr3t"})
        );
        assert!(body["auth"].get("scope").is_none());
    }

    #[test]
    fn test_locate_endpoint_honours_interface_and_region() {
        let catalog = vec![CatalogEntry {
            service_type: "nfv".to_string(),
            name: "vim".to_string(),
            endpoints: vec![
                CatalogEndpoint {
                    interface: "public".to_string(),
                    region: Some("RegionTwo".to_string()),
                    region_id: None,
                    url: "http://two:4545/".to_string(),
                },
                CatalogEndpoint {
                    interface: "public".to_string(),
                    region: None,
                    region_id: Some("RegionOne".to_string()),
                    url: "http://one:4545/".to_string(),
                },
            ],
        }];
        let opts = EndpointOptions {
            name: "vim".to_string(),
            service_type: "nfv".to_string(),
            ..sysinv()
        };
        assert_eq!(locate_endpoint(&catalog, &opts).unwrap(), "http://one:4545");

        let missing = locate_endpoint(&catalog, &sysinv()).unwrap_err();
        assert!(matches!(missing, PlatformError::EndpointNotFound { .. }));
    }

    #[test]
    fn test_error_message_extracts_faultstring() {
        let body = r#"{"error_message": "{\"debuginfo\": null, \"faultcode\": \"Client\", \"faultstring\": \"Data network foo is in use\"}"}"#;
        assert_eq!(error_message(body), "Data network foo is in use");
        assert_eq!(error_message("plain failure\n"), "plain failure");
    }

    #[tokio::test]
    async fn test_connect_and_get() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/auth/tokens"))
            .respond_with(token_response(&server, "tok-1"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/isystems"))
            .and(header("X-Auth-Token", "tok-1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"isystems": [{"uuid": "s1"}]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let connector = KeystoneConnector::new().unwrap();
        let client = connector
            .connect(&auth(&format!("{}/v3", server.uri())), &sysinv())
            .await
            .unwrap();

        assert_eq!(client.endpoint(), format!("{}/v1", server.uri()));
        assert!(!client.is_https());
        let body = client.get("isystems").await.unwrap();
        assert_eq!(body["isystems"][0]["uuid"], json!("s1"));
    }

    #[tokio::test]
    async fn test_reauthenticates_once_on_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/auth/tokens"))
            .respond_with(token_response(&server, "tok"))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/idns"))
            .respond_with(ResponseTemplate::new(401))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/idns"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"idnss": []})))
            .mount(&server)
            .await;

        let connector = KeystoneConnector::new().unwrap();
        let client = connector
            .connect(&auth(&server.uri()), &sysinv())
            .await
            .unwrap();

        let body = client.get("idns").await.unwrap();
        assert_eq!(body, json!({"idnss": []}));
    }

    #[tokio::test]
    async fn test_http_error_carries_status_and_fault() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/auth/tokens"))
            .respond_with(token_response(&server, "tok"))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/v1/datanetworks/d1"))
            .and(body_json(json!([{"op": "replace", "path": "/mtu", "value": 1400}])))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error_message": "{\"faultstring\": \"MTU too small\"}"
            })))
            .mount(&server)
            .await;

        let connector = KeystoneConnector::new().unwrap();
        let client = connector
            .connect(&auth(&server.uri()), &sysinv())
            .await
            .unwrap();

        let err = client
            .patch("datanetworks/d1", &[PatchOp::replace("mtu", 1400)])
            .await
            .unwrap_err();
        match err {
            PlatformError::Http {
                status, message, ..
            } => {
                assert_eq!(status, 400);
                assert_eq!(message, "MTU too small");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_delete_with_empty_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/auth/tokens"))
            .respond_with(token_response(&server, "tok"))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/v1/datanetworks/d1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let connector = KeystoneConnector::new().unwrap();
        let client = connector
            .connect(&auth(&server.uri()), &sysinv())
            .await
            .unwrap();
        client.delete("datanetworks/d1").await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/auth/tokens"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
            .mount(&server)
            .await;

        let connector = KeystoneConnector::new().unwrap();
        let err = connector
            .connect(&auth(&server.uri()), &sysinv())
            .await
            .err()
            .unwrap();
        assert_eq!(err.status(), Some(401));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let connector = KeystoneConnector::new().unwrap();
        let err = connector
            .connect(&auth("http://127.0.0.1:1/v3"), &sysinv())
            .await
            .err()
            .unwrap();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_unparseable_catalog_endpoint_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/auth/tokens"))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header("X-Subject-Token", "tok-1")
                    .set_body_json(json!({
                        "token": {
                            "catalog": [{
                                "type": "platform",
                                "name": "sysinv",
                                "endpoints": [
                                    {"interface": "public", "region": "RegionOne", "url": "sysinv.local/v1"}
                                ]
                            }]
                        }
                    })),
            )
            .mount(&server)
            .await;

        let connector = KeystoneConnector::new().unwrap();
        let err = connector
            .connect(&auth(&format!("{}/v3", server.uri())), &sysinv())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, PlatformError::InvalidOptions(_)));
    }
}
