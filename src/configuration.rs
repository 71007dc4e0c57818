use config::ConfigError;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub database: DatabaseSettings,
    pub directory: DirectorySettings,
    pub jwt: JwtSettings,
    pub password: PasswordSettings,
    pub media: MediaSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    pub environment: Environment,
}

/// Deployment environment. Production marks session cookies `Secure`.
#[derive(serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }

    /// Connection string for the server itself, used to create databases
    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.username, self.password, self.host, self.port
        )
    }
}

/// Which identity directory backend the process talks to
#[derive(serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DirectoryBackend {
    Postgres,
    Memory,
}

#[derive(serde::Deserialize, Clone)]
pub struct DirectorySettings {
    pub backend: DirectoryBackend,
}

/// JWT authentication settings
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    pub access_token_expiry: i64,   // seconds (e.g., 900 for 15 minutes)
    pub refresh_token_expiry: i64,  // seconds (e.g., 864000 for 10 days)
    pub issuer: String,
    /// Clear the stored refresh token when a password changes
    #[serde(default = "default_revoke_on_password_change")]
    pub revoke_sessions_on_password_change: bool,
}

fn default_revoke_on_password_change() -> bool {
    true
}

#[derive(serde::Deserialize, Clone)]
pub struct PasswordSettings {
    /// bcrypt cost factor
    pub hash_cost: u32,
}

#[derive(serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaBackend {
    Local,
    Remote,
}

#[derive(serde::Deserialize, Clone)]
pub struct MediaSettings {
    pub backend: MediaBackend,
    /// Directory the local backend writes into
    pub local_root: String,
    /// URL path the local directory is served under
    pub public_path: String,
    pub remote_base_url: String,
    pub api_key: String,
    pub timeout_milliseconds: u64,
}

impl MediaSettings {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_milliseconds)
    }
}

/// Loads `configuration.{yaml,json,toml}` from the working directory, then
/// applies `APP_`-prefixed overrides such as `APP_JWT__ACCESS_TOKEN_SECRET`.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    settings.try_deserialize::<Settings>()
}
