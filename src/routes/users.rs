/// Account Routes
///
/// Registration, session management and profile updates under
/// `/api/v1/users`. Tokens are returned in the body and as HTTP-only cookies.

use actix_multipart::Multipart;
use actix_web::cookie::{time::Duration, Cookie};
use actix_web::{web, HttpRequest, HttpResponse, HttpResponseBuilder};
use serde::{Deserialize, Serialize};

use crate::auth::{TokenPair, TokenService};
use crate::error::AppError;
use crate::identity::IdentityProfile;
use crate::middleware::{RequireIdentity, ACCESS_TOKEN_COOKIE};
use crate::routes::multipart::read_multipart;
use crate::services::{
    IdentityResolver, LoginCredentials, ProfileService, RegistrationForm, RegistrationSaga,
    Session, SessionService,
};

pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

/// Register the account routes on a scope. Everything except registration,
/// login and refresh sits behind `RequireIdentity`.
pub fn configure(cfg: &mut web::ServiceConfig, resolver: IdentityResolver) {
    cfg.route("/register", web::post().to(register))
        .route("/login", web::post().to(login))
        .route("/refresh-token", web::post().to(refresh_token))
        .service(
            web::resource("/logout")
                .wrap(RequireIdentity::new(resolver.clone()))
                .route(web::post().to(logout)),
        )
        .service(
            web::resource("/change-password")
                .wrap(RequireIdentity::new(resolver.clone()))
                .route(web::post().to(change_password)),
        )
        .service(
            web::resource("/current-user")
                .wrap(RequireIdentity::new(resolver.clone()))
                .route(web::get().to(current_user)),
        )
        .service(
            web::resource("/update-account")
                .wrap(RequireIdentity::new(resolver.clone()))
                .route(web::patch().to(update_account)),
        )
        .service(
            web::resource("/avatar")
                .wrap(RequireIdentity::new(resolver.clone()))
                .route(web::patch().to(update_avatar)),
        )
        .service(
            web::resource("/cover-image")
                .wrap(RequireIdentity::new(resolver))
                .route(web::patch().to(update_cover_image)),
        );
}

/// Builds the session cookies set on login and refresh
#[derive(Debug, Clone, Copy)]
pub struct SessionCookies {
    secure: bool,
    access_max_age: i64,
    refresh_max_age: i64,
}

impl SessionCookies {
    pub fn new(secure: bool, tokens: &TokenService) -> Self {
        Self {
            secure,
            access_max_age: tokens.access_token_expiry(),
            refresh_max_age: tokens.refresh_token_expiry(),
        }
    }

    fn cookie(&self, name: &'static str, value: String, max_age: i64) -> Cookie<'static> {
        Cookie::build(name, value)
            .http_only(true)
            .secure(self.secure)
            .path("/")
            .max_age(Duration::seconds(max_age))
            .finish()
    }

    pub fn set(&self, response: &mut HttpResponseBuilder, tokens: &TokenPair) {
        response
            .cookie(self.cookie(
                ACCESS_TOKEN_COOKIE,
                tokens.access_token.clone(),
                self.access_max_age,
            ))
            .cookie(self.cookie(
                REFRESH_TOKEN_COOKIE,
                tokens.refresh_token.clone(),
                self.refresh_max_age,
            ));
    }

    pub fn clear(&self, response: &mut HttpResponseBuilder) {
        for name in [ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE] {
            let mut cookie = self.cookie(name, String::new(), 0);
            cookie.make_removal();
            response.cookie(cookie);
        }
    }
}

/// Login and refresh response
#[derive(Serialize)]
pub struct AuthResponse {
    pub user: IdentityProfile,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct RefreshRequest {
    #[serde(alias = "refreshToken")]
    pub refresh_token: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
pub struct UpdateAccountRequest {
    pub full_name: String,
    pub email: String,
}

fn session_response(
    mut response: HttpResponseBuilder,
    session: Session,
    cookies: &SessionCookies,
    expires_in: i64,
) -> HttpResponse {
    cookies.set(&mut response, &session.tokens);
    response.json(AuthResponse {
        user: session.identity,
        access_token: session.tokens.access_token,
        refresh_token: session.tokens.refresh_token,
        token_type: "Bearer".to_string(),
        expires_in,
    })
}

/// POST /api/v1/users/register
///
/// Multipart form with `full_name`, `email`, `username`, `password`, an
/// `avatar` file and an optional `cover_image` file.
///
/// # Errors
/// - 400: Validation errors, including a missing avatar
/// - 409: Username or email already registered
/// - 500: Media upload or record creation failed (uploads are rolled back)
pub async fn register(
    payload: Multipart,
    saga: web::Data<RegistrationSaga>,
) -> Result<HttpResponse, AppError> {
    let mut form = read_multipart(payload).await?;

    let registration = RegistrationForm {
        full_name: form.text("full_name"),
        email: form.text("email"),
        username: form.text("username"),
        password: form.text("password"),
        avatar: form.take_file("avatar"),
        cover_image: form.take_file("cover_image"),
    };

    let profile = saga.register(registration).await?;
    Ok(HttpResponse::Created().json(profile))
}

/// POST /api/v1/users/login
///
/// # Errors
/// - 400: Neither username nor email given, or blank password
/// - 401: Unknown account or wrong password
pub async fn login(
    body: web::Json<LoginCredentials>,
    sessions: web::Data<SessionService>,
    cookies: web::Data<SessionCookies>,
) -> Result<HttpResponse, AppError> {
    let session = sessions.login(body.into_inner()).await?;
    let expires_in = sessions.tokens().access_token_expiry();

    Ok(session_response(HttpResponse::Ok(), session, &cookies, expires_in))
}

/// POST /api/v1/users/refresh-token
///
/// Reads the refresh token from the `refreshToken` cookie, falling back to
/// a `refresh_token` field in a JSON body.
///
/// # Errors
/// - 401: Missing, invalid, expired, or already used refresh token
pub async fn refresh_token(
    req: HttpRequest,
    body: Option<web::Json<RefreshRequest>>,
    sessions: web::Data<SessionService>,
    cookies: web::Data<SessionCookies>,
) -> Result<HttpResponse, AppError> {
    let presented = req
        .cookie(REFRESH_TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| body.and_then(|b| b.into_inner().refresh_token));

    let session = sessions.refresh(presented.as_deref()).await?;
    let expires_in = sessions.tokens().access_token_expiry();

    Ok(session_response(HttpResponse::Ok(), session, &cookies, expires_in))
}

/// POST /api/v1/users/logout
pub async fn logout(
    identity: web::ReqData<IdentityProfile>,
    sessions: web::Data<SessionService>,
    cookies: web::Data<SessionCookies>,
) -> Result<HttpResponse, AppError> {
    sessions.logout(identity.id).await?;

    let mut response = HttpResponse::Ok();
    cookies.clear(&mut response);
    Ok(response.json(serde_json::json!({ "message": "User logged out" })))
}

/// POST /api/v1/users/change-password
///
/// # Errors
/// - 400: Blank old or new password
/// - 401: Old password does not match
pub async fn change_password(
    identity: web::ReqData<IdentityProfile>,
    body: web::Json<ChangePasswordRequest>,
    sessions: web::Data<SessionService>,
) -> Result<HttpResponse, AppError> {
    sessions
        .change_password(identity.id, &body.old_password, &body.new_password)
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Password changed successfully" })))
}

/// GET /api/v1/users/current-user
pub async fn current_user(identity: web::ReqData<IdentityProfile>) -> HttpResponse {
    HttpResponse::Ok().json(identity.into_inner())
}

/// PATCH /api/v1/users/update-account
pub async fn update_account(
    identity: web::ReqData<IdentityProfile>,
    body: web::Json<UpdateAccountRequest>,
    profiles: web::Data<ProfileService>,
) -> Result<HttpResponse, AppError> {
    let profile = profiles
        .update_account(identity.id, &body.full_name, &body.email)
        .await?;
    Ok(HttpResponse::Ok().json(profile))
}

/// PATCH /api/v1/users/avatar
pub async fn update_avatar(
    identity: web::ReqData<IdentityProfile>,
    payload: Multipart,
    profiles: web::Data<ProfileService>,
) -> Result<HttpResponse, AppError> {
    let mut form = read_multipart(payload).await?;
    let profile = profiles
        .update_avatar(identity.id, form.take_file("avatar"))
        .await?;
    Ok(HttpResponse::Ok().json(profile))
}

/// PATCH /api/v1/users/cover-image
pub async fn update_cover_image(
    identity: web::ReqData<IdentityProfile>,
    payload: Multipart,
    profiles: web::Data<ProfileService>,
) -> Result<HttpResponse, AppError> {
    let mut form = read_multipart(payload).await?;
    let profile = profiles
        .update_cover_image(identity.id, form.take_file("cover_image"))
        .await?;
    Ok(HttpResponse::Ok().json(profile))
}
