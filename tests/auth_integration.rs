mod common;

use common::{error_code, image, registration_form, spawn_app};
use reqwest::multipart::Form;
use serde_json::{json, Value};

// --- Registration Tests ---

#[tokio::test]
async fn register_returns_201_with_normalised_profile() {
    let app = spawn_app().await;

    let response = app.register(registration_form("Ada", "Ada@X.com")).await;

    assert_eq!(201, response.status().as_u16());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["username"], "ada");
    assert_eq!(body["email"], "ada@x.com");
    assert_eq!(body["full_name"], "Ada Lovelace");
    assert_eq!(body["cover_image_url"], "");
    assert!(body.get("password_hash").is_none());
    assert!(body.get("refresh_token_hash").is_none());
    assert_eq!(app.directory.len(), 1);
}

#[tokio::test]
async fn registered_avatar_is_served() {
    let app = spawn_app().await;

    let body: Value = app
        .register(registration_form("ada", "ada@x.com"))
        .await
        .json()
        .await
        .unwrap();
    let avatar_url = body["avatar_url"].as_str().unwrap();

    let response = reqwest::get(&format!("{}{}", app.address, avatar_url))
        .await
        .expect("Failed to execute request.");

    assert_eq!(200, response.status().as_u16());
    assert_eq!(response.bytes().await.unwrap().as_ref(), &[137, 80, 78, 71]);
}

#[tokio::test]
async fn register_stores_optional_cover_image() {
    let app = spawn_app().await;
    let form = registration_form("ada", "ada@x.com").part("cover_image", image("cover.png", vec![1, 2]));

    let response = app.register(form).await;

    assert_eq!(201, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert!(body["cover_image_url"].as_str().unwrap().starts_with("/media/"));
    assert_eq!(std::fs::read_dir(app.media_root.path()).unwrap().count(), 2);
}

#[tokio::test]
async fn register_returns_400_when_data_is_missing() {
    let app = spawn_app().await;
    let test_cases = vec![
        (
            Form::new()
                .text("full_name", "Ada Lovelace")
                .text("email", "ada@x.com")
                .text("username", "ada")
                .text("password", "p4ss"),
            "missing the avatar",
        ),
        (
            Form::new()
                .text("full_name", "Ada Lovelace")
                .text("email", "ada@x.com")
                .text("password", "p4ss")
                .part("avatar", image("avatar.png", vec![1])),
            "missing the username",
        ),
        (
            Form::new()
                .text("full_name", "   ")
                .text("email", "ada@x.com")
                .text("username", "ada")
                .text("password", "p4ss")
                .part("avatar", image("avatar.png", vec![1])),
            "blank full name",
        ),
    ];

    for (form, error_message) in test_cases {
        let response = app.register(form).await;

        assert_eq!(
            400,
            response.status().as_u16(),
            "The API did not fail with 400 Bad Request when the payload was {}.",
            error_message
        );
        assert_eq!(error_code(response).await, "VALIDATION_ERROR");
    }
    assert!(app.directory.is_empty());
    assert_eq!(std::fs::read_dir(app.media_root.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn register_returns_409_for_taken_username_or_email() {
    let app = spawn_app().await;
    app.register(registration_form("ada", "ada@x.com")).await;

    for form in [
        registration_form("ADA", "other@x.com"),
        registration_form("other", "ada@x.com"),
    ] {
        let response = app.register(form).await;

        assert_eq!(409, response.status().as_u16());
        assert_eq!(error_code(response).await, "CONFLICT");
    }
    assert_eq!(app.directory.len(), 1);
}

// --- Login Tests ---

#[tokio::test]
async fn login_returns_tokens_and_cookies() {
    let app = spawn_app().await;
    app.register(registration_form("Ada", "ada@x.com")).await;

    let response = app
        .login(&json!({ "email": "ada@x.com", "password": "p4ss" }))
        .await;

    assert_eq!(200, response.status().as_u16());
    let cookies: Vec<_> = response.cookies().map(|c| (c.name().to_string(), c.http_only())).collect();
    assert!(cookies.contains(&("accessToken".to_string(), true)));
    assert!(cookies.contains(&("refreshToken".to_string(), true)));

    let body: Value = response.json().await.unwrap();
    assert!(body["access_token"].is_string());
    assert!(body["refresh_token"].is_string());
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], app.settings.jwt.access_token_expiry);
    assert_eq!(body["user"]["username"], "ada");
}

#[tokio::test]
async fn login_failures_do_not_reveal_which_part_was_wrong() {
    let app = spawn_app().await;
    app.register(registration_form("ada", "ada@x.com")).await;

    for body in [
        json!({ "username": "ada", "password": "wrong" }),
        json!({ "username": "grace", "password": "p4ss" }),
    ] {
        let response = app.login(&body).await;

        assert_eq!(401, response.status().as_u16());
        assert_eq!(error_code(response).await, "INVALID_CREDENTIALS");
    }
}

#[tokio::test]
async fn login_without_identifier_is_a_validation_error() {
    let app = spawn_app().await;

    let response = app.login(&json!({ "password": "p4ss" })).await;

    assert_eq!(400, response.status().as_u16());
    assert_eq!(error_code(response).await, "VALIDATION_ERROR");
}

// --- Current User Tests ---

#[tokio::test]
async fn current_user_with_bearer_token() {
    let app = spawn_app().await;
    let session = app.ada_session().await;

    let response = app
        .current_user(session["access_token"].as_str().unwrap())
        .await;

    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["id"], session["user"]["id"]);
}

#[tokio::test]
async fn current_user_with_session_cookie() {
    let app = spawn_app().await;
    app.register(registration_form("ada", "ada@x.com")).await;
    let client = reqwest::Client::builder()
        .cookie_store(true)
        .build()
        .unwrap();

    let response = client
        .post(&app.url("/login"))
        .json(&json!({ "username": "ada", "password": "p4ss" }))
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());

    let response = client.get(&app.url("/current-user")).send().await.unwrap();

    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["username"], "ada");
}

#[tokio::test]
async fn cookie_takes_precedence_over_bearer_header() {
    let app = spawn_app().await;
    let session = app.ada_session().await;

    let response = reqwest::Client::new()
        .get(&app.url("/current-user"))
        .header(
            "Cookie",
            format!("accessToken={}", session["access_token"].as_str().unwrap()),
        )
        .bearer_auth("garbage")
        .send()
        .await
        .unwrap();

    assert_eq!(200, response.status().as_u16());
}

#[tokio::test]
async fn current_user_rejects_missing_and_malformed_tokens() {
    let app = spawn_app().await;

    let response = reqwest::Client::new()
        .get(&app.url("/current-user"))
        .send()
        .await
        .unwrap();
    assert_eq!(401, response.status().as_u16());
    assert_eq!(error_code(response).await, "MISSING_TOKEN");

    let response = app.current_user("not-a-token").await;
    assert_eq!(401, response.status().as_u16());
    assert_eq!(error_code(response).await, "TOKEN_MALFORMED");
}

#[tokio::test]
async fn refresh_token_is_not_an_access_token() {
    let app = spawn_app().await;
    let session = app.ada_session().await;

    let response = app
        .current_user(session["refresh_token"].as_str().unwrap())
        .await;

    assert_eq!(401, response.status().as_u16());
    assert_eq!(error_code(response).await, "TOKEN_INVALID");
}

// --- Refresh Tests ---

#[tokio::test]
async fn refresh_token_works_exactly_once() {
    let app = spawn_app().await;
    let session = app.ada_session().await;
    let refresh_token = session["refresh_token"].as_str().unwrap();

    let first = app.refresh(refresh_token).await;
    assert_eq!(200, first.status().as_u16());
    let rotated: Value = first.json().await.unwrap();
    assert_ne!(rotated["refresh_token"], session["refresh_token"]);
    assert_eq!(rotated["user"]["id"], session["user"]["id"]);

    let second = app.refresh(refresh_token).await;
    assert_eq!(401, second.status().as_u16());
    assert_eq!(error_code(second).await, "TOKEN_REVOKED");

    let third = app.refresh(rotated["refresh_token"].as_str().unwrap()).await;
    assert_eq!(200, third.status().as_u16());
}

#[tokio::test]
async fn refresh_reads_the_cookie() {
    let app = spawn_app().await;
    let session = app.ada_session().await;

    let response = reqwest::Client::new()
        .post(&app.url("/refresh-token"))
        .header(
            "Cookie",
            format!("refreshToken={}", session["refresh_token"].as_str().unwrap()),
        )
        .send()
        .await
        .unwrap();

    assert_eq!(200, response.status().as_u16());
}

#[tokio::test]
async fn refresh_failures() {
    let app = spawn_app().await;

    let response = reqwest::Client::new()
        .post(&app.url("/refresh-token"))
        .send()
        .await
        .unwrap();
    assert_eq!(401, response.status().as_u16());
    assert_eq!(error_code(response).await, "MISSING_TOKEN");

    let response = app.refresh("garbage").await;
    assert_eq!(401, response.status().as_u16());
    assert_eq!(error_code(response).await, "TOKEN_MALFORMED");
}

// --- Logout Tests ---

#[tokio::test]
async fn logout_revokes_the_refresh_token() {
    let app = spawn_app().await;
    let session = app.ada_session().await;

    let response = reqwest::Client::new()
        .post(&app.url("/logout"))
        .bearer_auth(session["access_token"].as_str().unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());
    let cleared: Vec<_> = response
        .cookies()
        .filter(|c| c.value().is_empty())
        .map(|c| c.name().to_string())
        .collect();
    assert!(cleared.contains(&"accessToken".to_string()));
    assert!(cleared.contains(&"refreshToken".to_string()));

    let response = app.refresh(session["refresh_token"].as_str().unwrap()).await;
    assert_eq!(401, response.status().as_u16());
}

#[tokio::test]
async fn logout_requires_authentication() {
    let app = spawn_app().await;

    let response = reqwest::Client::new()
        .post(&app.url("/logout"))
        .send()
        .await
        .unwrap();

    assert_eq!(401, response.status().as_u16());
}

// --- Change Password Tests ---

#[tokio::test]
async fn change_password_flow() {
    let app = spawn_app().await;
    let session = app.ada_session().await;
    let access_token = session["access_token"].as_str().unwrap();
    let client = reqwest::Client::new();

    let response = client
        .post(&app.url("/change-password"))
        .bearer_auth(access_token)
        .json(&json!({ "old_password": "wrong", "new_password": "n3w" }))
        .send()
        .await
        .unwrap();
    assert_eq!(401, response.status().as_u16());
    assert_eq!(error_code(response).await, "INVALID_CREDENTIALS");

    let response = client
        .post(&app.url("/change-password"))
        .bearer_auth(access_token)
        .json(&json!({ "old_password": "p4ss", "new_password": "n3w" }))
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());

    let old = app.login(&json!({ "username": "ada", "password": "p4ss" })).await;
    assert_eq!(401, old.status().as_u16());
    let new = app.login(&json!({ "username": "ada", "password": "n3w" })).await;
    assert_eq!(200, new.status().as_u16());

    let response = app.refresh(session["refresh_token"].as_str().unwrap()).await;
    assert_eq!(401, response.status().as_u16());
}

#[tokio::test]
async fn access_token_can_travel_in_the_json_body() {
    let app = spawn_app().await;
    let session = app.ada_session().await;

    let response = reqwest::Client::new()
        .post(&app.url("/change-password"))
        .json(&json!({
            "access_token": session["access_token"],
            "old_password": "p4ss",
            "new_password": "n3w",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(200, response.status().as_u16());
}

#[tokio::test]
async fn blank_cookie_falls_through_to_the_body_token() {
    let app = spawn_app().await;
    let session = app.ada_session().await;

    let response = reqwest::Client::new()
        .post(&app.url("/change-password"))
        .header("Cookie", "accessToken=")
        .json(&json!({
            "access_token": session["access_token"],
            "old_password": "p4ss",
            "new_password": "n3w",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(200, response.status().as_u16());
}

// --- Profile Tests ---

#[tokio::test]
async fn update_account_details() {
    let app = spawn_app().await;
    let session = app.ada_session().await;

    let response = reqwest::Client::new()
        .patch(&app.url("/update-account"))
        .bearer_auth(session["access_token"].as_str().unwrap())
        .json(&json!({ "full_name": "Augusta Ada King", "email": "Countess@Lovelace.org" }))
        .send()
        .await
        .unwrap();

    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["full_name"], "Augusta Ada King");
    assert_eq!(body["email"], "countess@lovelace.org");
    assert_eq!(body["username"], "ada");
}

#[tokio::test]
async fn update_account_requires_both_fields() {
    let app = spawn_app().await;
    let session = app.ada_session().await;

    let response = reqwest::Client::new()
        .patch(&app.url("/update-account"))
        .bearer_auth(session["access_token"].as_str().unwrap())
        .json(&json!({ "full_name": "Ada" }))
        .send()
        .await
        .unwrap();

    assert_eq!(400, response.status().as_u16());
}

#[tokio::test]
async fn replace_avatar_and_cover_image() {
    let app = spawn_app().await;
    let session = app.ada_session().await;
    let access_token = session["access_token"].as_str().unwrap();
    let client = reqwest::Client::new();

    let response = client
        .patch(&app.url("/avatar"))
        .bearer_auth(access_token)
        .multipart(Form::new().part("avatar", image("new.png", vec![7, 7, 7])))
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_ne!(body["avatar_url"], session["user"]["avatar_url"]);

    let response = client
        .patch(&app.url("/cover-image"))
        .bearer_auth(access_token)
        .multipart(Form::new().part("cover_image", image("cover.png", vec![8])))
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert!(body["cover_image_url"].as_str().unwrap().starts_with("/media/"));

    let response = client
        .patch(&app.url("/avatar"))
        .bearer_auth(access_token)
        .multipart(Form::new().text("note", "no file"))
        .send()
        .await
        .unwrap();
    assert_eq!(400, response.status().as_u16());
}
