//! Postgres directory tests. They need a running server reachable with the
//! `database` settings from `configuration.yaml`:
//! `cargo test --test directory_postgres -- --ignored`

use account_service::configuration::{get_configuration, DatabaseSettings};
use account_service::directory::{IdentityDirectory, PgIdentityDirectory, SlotUpdate};
use account_service::error::DatabaseError;
use account_service::identity::{IdentityUpdate, NewIdentity};
use sqlx::{Connection, Executor, PgConnection, PgPool};

async fn configure_database(config: &DatabaseSettings) -> PgPool {
    let mut connection = PgConnection::connect(&config.connection_string_without_db())
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(&*format!(r#"CREATE DATABASE "{}";"#, config.database_name))
        .await
        .expect("Failed to create database.");

    let connection_pool = PgPool::connect(&config.connection_string())
        .await
        .expect("Failed to connect to Postgres.");
    sqlx::migrate!("./migrations")
        .run(&connection_pool)
        .await
        .expect("Failed to migrate the database.");
    connection_pool
}

async fn directory() -> PgIdentityDirectory {
    let mut configuration = get_configuration().expect("Failed to read configuration.");
    configuration.database.database_name = uuid::Uuid::new_v4().to_string();
    PgIdentityDirectory::new(configure_database(&configuration.database).await)
}

fn ada() -> NewIdentity {
    NewIdentity {
        full_name: "Ada Lovelace".to_string(),
        username: "ada".to_string(),
        email: "ada@x.com".to_string(),
        password_hash: "$2b$04$hash".to_string(),
        avatar_url: "/media/a.png".to_string(),
        cover_image_url: String::new(),
    }
}

#[tokio::test]
#[ignore = "requires a running Postgres"]
async fn create_and_find() {
    let directory = directory().await;

    let created = directory.create(ada()).await.expect("Failed to create");

    let by_username = directory
        .find_by_credentials(Some("ada"), None)
        .await
        .unwrap()
        .expect("Not found by username");
    let by_email = directory
        .find_by_credentials(None, Some("ada@x.com"))
        .await
        .unwrap()
        .expect("Not found by email");
    assert_eq!(by_username.id, created.id);
    assert_eq!(by_email.id, created.id);
    assert!(created.refresh_token_hash.is_none());
    assert!(directory
        .find_by_credentials(None, None)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
#[ignore = "requires a running Postgres"]
async fn duplicate_username_is_a_unique_violation() {
    let directory = directory().await;
    directory.create(ada()).await.unwrap();

    let mut duplicate = ada();
    duplicate.email = "other@x.com".to_string();
    let err = directory.create(duplicate).await.unwrap_err();

    assert!(matches!(err, DatabaseError::UniqueConstraintViolation(_)));
}

#[tokio::test]
#[ignore = "requires a running Postgres"]
async fn compare_and_set_swaps_only_the_expected_value() {
    let directory = directory().await;
    let id = directory.create(ada()).await.unwrap().id;
    directory.update_refresh_token(id, Some("first")).await.unwrap();

    assert_eq!(
        directory
            .compare_and_set_refresh_token(id, "stale", "second")
            .await
            .unwrap(),
        SlotUpdate::Mismatch
    );
    assert_eq!(
        directory
            .compare_and_set_refresh_token(id, "first", "second")
            .await
            .unwrap(),
        SlotUpdate::Swapped
    );
    assert_eq!(
        directory
            .compare_and_set_refresh_token(id, "first", "third")
            .await
            .unwrap(),
        SlotUpdate::Mismatch
    );

    directory.update_refresh_token(id, None).await.unwrap();
    let stored = directory.find_by_id(id).await.unwrap().unwrap();
    assert!(stored.refresh_token_hash.is_none());
}

#[tokio::test]
#[ignore = "requires a running Postgres"]
async fn partial_update_and_delete() {
    let directory = directory().await;
    let id = directory.create(ada()).await.unwrap().id;

    let updated = directory
        .update_fields(
            id,
            IdentityUpdate {
                full_name: Some("Augusta Ada King".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.full_name, "Augusta Ada King");
    assert_eq!(updated.email, "ada@x.com");

    directory.update_refresh_token(id, Some("live")).await.unwrap();
    let updated = directory
        .update_fields(
            id,
            IdentityUpdate {
                password_hash: Some("$2b$04$other".to_string()),
                clear_refresh_token: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.password_hash, "$2b$04$other");
    assert!(updated.refresh_token_hash.is_none());

    directory.delete_by_id(id).await.unwrap();
    assert!(directory.find_by_id(id).await.unwrap().is_none());
    assert!(matches!(
        directory.update_fields(id, IdentityUpdate::default()).await,
        Err(DatabaseError::NotFound(_))
    ));
}
