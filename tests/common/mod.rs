#![allow(dead_code)]

use std::net::TcpListener;
use std::sync::Arc;

use account_service::configuration::{
    get_configuration, DirectoryBackend, MediaBackend, Settings,
};
use account_service::directory::InMemoryIdentityDirectory;
use account_service::media::{LocalMediaStore, MediaStore};
use account_service::startup::run;
use reqwest::multipart::{Form, Part};
use serde_json::Value;

pub struct TestApp {
    pub address: String,
    pub directory: InMemoryIdentityDirectory,
    pub settings: Settings,
    pub media_root: tempfile::TempDir,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}/api/v1/users{}", self.address, path)
    }

    pub async fn register(&self, form: Form) -> reqwest::Response {
        reqwest::Client::new()
            .post(&self.url("/register"))
            .multipart(form)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn login(&self, body: &Value) -> reqwest::Response {
        reqwest::Client::new()
            .post(&self.url("/login"))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn refresh(&self, refresh_token: &str) -> reqwest::Response {
        reqwest::Client::new()
            .post(&self.url("/refresh-token"))
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn current_user(&self, access_token: &str) -> reqwest::Response {
        reqwest::Client::new()
            .get(&self.url("/current-user"))
            .bearer_auth(access_token)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Register Ada and log her in, returning the login response body
    pub async fn ada_session(&self) -> Value {
        let response = self.register(registration_form("Ada", "ada@x.com")).await;
        assert_eq!(201, response.status().as_u16());

        let response = self
            .login(&serde_json::json!({ "username": "ada", "password": "p4ss" }))
            .await;
        assert_eq!(200, response.status().as_u16());
        response.json().await.expect("Failed to parse response")
    }
}

/// Start the application on a random port with an in-memory directory and
/// a temporary local media directory.
pub async fn spawn_app() -> TestApp {
    let media_root = tempfile::tempdir().expect("Failed to create media directory");
    let media = Arc::new(LocalMediaStore::new(media_root.path(), "/media"));
    spawn_app_with_media(media, media_root).await
}

pub async fn spawn_app_with_media(
    media: Arc<dyn MediaStore>,
    media_root: tempfile::TempDir,
) -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let mut settings = get_configuration().expect("Failed to read configuration.");
    settings.directory.backend = DirectoryBackend::Memory;
    settings.password.hash_cost = 4;
    settings.media.backend = MediaBackend::Local;
    settings.media.local_root = media_root.path().to_string_lossy().into_owned();
    settings.media.public_path = "/media".to_string();

    let directory = InMemoryIdentityDirectory::new();
    let server = run(listener, Arc::new(directory.clone()), media, &settings)
        .expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        directory,
        settings,
        media_root,
    }
}

pub fn image(file_name: &str, bytes: Vec<u8>) -> Part {
    Part::bytes(bytes)
        .file_name(file_name.to_string())
        .mime_str("image/png")
        .expect("Invalid mime type")
}

pub fn registration_form(username: &str, email: &str) -> Form {
    Form::new()
        .text("full_name", "Ada Lovelace")
        .text("email", email.to_string())
        .text("username", username.to_string())
        .text("password", "p4ss")
        .part("avatar", image("avatar.png", vec![137, 80, 78, 71]))
}

pub async fn error_code(response: reqwest::Response) -> String {
    let body: Value = response.json().await.expect("Failed to parse error body");
    body["code"].as_str().unwrap_or_default().to_string()
}
