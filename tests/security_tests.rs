mod common;

use std::time::Duration;

use common::{laptop, start_test_server};
use pcbook::auth::{AUTHORIZATION_KEY, JwtManager, User};
use pcbook::proto::auth_service_client::AuthServiceClient;
use pcbook::proto::laptop_service_client::LaptopServiceClient;
use pcbook::proto::{CreateLaptopRequest, LoginRequest};
use tonic::metadata::MetadataValue;
use tonic::{Code, Request};

fn create_request(token: Option<&str>) -> Request<CreateLaptopRequest> {
    let mut request = Request::new(CreateLaptopRequest {
        laptop: Some(laptop(1000.0, 4, 2.5, 8)),
    });
    if let Some(token) = token {
        request
            .metadata_mut()
            .insert(AUTHORIZATION_KEY, MetadataValue::try_from(token).unwrap());
    }
    request
}

#[tokio::test]
async fn login_issues_token_with_user_role() {
    let server = start_test_server().await;
    let mut auth = AuthServiceClient::new(server.channel().await);

    let token = auth
        .login(LoginRequest {
            username: "user1".into(),
            password: "password".into(),
        })
        .await
        .expect("Seeded user should log in")
        .into_inner()
        .access_token;

    let claims = server.config.jwt_manager().verify(&token).unwrap();
    assert_eq!(claims.sub, "user1");
    assert_eq!(claims.role, "user");
}

#[tokio::test]
async fn bad_credentials_are_not_found() {
    let server = start_test_server().await;
    let mut auth = AuthServiceClient::new(server.channel().await);

    for (username, password) in [("admin", "wrong"), ("nobody", "password")] {
        let status = auth
            .login(LoginRequest {
                username: username.into(),
                password: password.into(),
            })
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::NotFound);
    }
}

#[tokio::test]
async fn protected_call_without_token_is_unauthenticated() {
    let server = start_test_server().await;
    let mut service = LaptopServiceClient::new(server.channel().await);

    let status = service.create_laptop(create_request(None)).await.unwrap_err();

    assert_eq!(status.code(), Code::Unauthenticated);
    assert!(server.laptops.is_empty().await);
}

#[tokio::test]
async fn forged_and_expired_tokens_are_unauthenticated() {
    let server = start_test_server().await;
    let mut service = LaptopServiceClient::new(server.channel().await);
    let admin = User::new("admin", "password", "admin").unwrap();

    let forged = JwtManager::new("not-the-server-key", Duration::from_secs(60))
        .generate(&admin)
        .unwrap();
    let expired = JwtManager::new(&server.config.auth.secret_key, Duration::from_secs(1))
        .generate(&admin)
        .unwrap();
    tokio::time::sleep(Duration::from_millis(2100)).await;

    for token in [forged.as_str(), expired.as_str(), "garbage"] {
        let status = service
            .create_laptop(create_request(Some(token)))
            .await
            .unwrap_err();
        assert_eq!(status.code(), Code::Unauthenticated);
    }
    assert!(server.laptops.is_empty().await);
}

#[tokio::test]
async fn user_role_is_denied_admin_methods() {
    let server = start_test_server().await;
    let user = server.user_client().await;

    let status = user
        .create_laptop(laptop(1000.0, 4, 2.5, 8))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::PermissionDenied);

    let status = user
        .upload_image_bytes("any", ".png", &[1, 2, 3])
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::PermissionDenied);

    assert!(server.laptops.is_empty().await);
    assert!(server.images.is_empty().await);
}

#[tokio::test]
async fn anonymous_rating_is_unauthenticated() {
    let server = start_test_server().await;
    let anonymous = server.anonymous_client().await;

    let status = anonymous
        .rate_laptop([("any".to_string(), 5.0)])
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::Unauthenticated);
}
