use actix_files as fs;
use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::{CredentialCodec, TokenService};
use crate::configuration::{MediaBackend, Settings};
use crate::directory::IdentityDirectory;
use crate::error::{AppError, ValidationError};
use crate::media::MediaStore;
use crate::middleware::RequestLogger;
use crate::routes::{health_check, users, SessionCookies};
use crate::services::{IdentityResolver, ProfileService, RegistrationSaga, SessionService};

/// Largest JSON body accepted by any route
const JSON_LIMIT: usize = 16 * 1024;

/// Wire the services onto the given backends and start serving on `listener`.
pub fn run(
    listener: TcpListener,
    directory: Arc<dyn IdentityDirectory>,
    media: Arc<dyn MediaStore>,
    settings: &Settings,
) -> Result<Server, std::io::Error> {
    let tokens = TokenService::new(settings.jwt.clone());
    let codec = CredentialCodec::new(settings.password.hash_cost);

    let saga = web::Data::new(RegistrationSaga::new(
        directory.clone(),
        media.clone(),
        codec,
    ));
    let sessions = web::Data::new(SessionService::new(
        directory.clone(),
        tokens.clone(),
        codec,
        settings.jwt.revoke_sessions_on_password_change,
    ));
    let profiles = web::Data::new(ProfileService::new(directory.clone(), media));
    let cookies = web::Data::new(SessionCookies::new(
        settings.application.environment.is_production(),
        &tokens,
    ));
    let resolver = IdentityResolver::new(directory, tokens);

    // Locally stored media is served by this process
    let static_media = match settings.media.backend {
        MediaBackend::Local => {
            std::fs::create_dir_all(&settings.media.local_root)?;
            Some((
                settings.media.public_path.clone(),
                settings.media.local_root.clone(),
            ))
        }
        MediaBackend::Remote => None,
    };

    let server = HttpServer::new(move || {
        let app = App::new()
            .wrap(RequestLogger)
            .app_data(json_config())
            .app_data(saga.clone())
            .app_data(sessions.clone())
            .app_data(profiles.clone())
            .app_data(cookies.clone())
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/api/v1/users")
                    .configure(|cfg| users::configure(cfg, resolver.clone())),
            );

        match &static_media {
            Some((public_path, root)) => app.service(fs::Files::new(public_path, root)),
            None => app,
        }
    })
    .listen(listener)?
    .run();

    Ok(server)
}

/// Malformed JSON bodies answer with the same error shape as everything else
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(JSON_LIMIT)
        .error_handler(|err, _req| {
            tracing::debug!(error = %err, "Rejected JSON body");
            AppError::Validation(ValidationError::InvalidFormat("request body".to_string()))
                .into()
        })
}
