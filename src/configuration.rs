use crate::error::{AppError, ConfigError};

/// Smallest signing secret accepted for HS256.
const MIN_SECRET_LENGTH: usize = 32;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    /// Absent means the in-memory user store is used.
    pub database: Option<DatabaseSettings>,
    pub jwt: JwtSettings,
    #[serde(default)]
    pub hashing: HashingSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }
}

/// JWT authentication settings
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub access_token_expiry: i64,   // seconds (e.g., 900 for 15 minutes)
    pub refresh_token_expiry: i64,  // seconds (e.g., 604800 for 7 days)
    pub issuer: String,
}

/// Password hashing settings
#[derive(serde::Deserialize, Clone)]
pub struct HashingSettings {
    /// bcrypt work factor
    pub cost: u32,
}

impl Default for HashingSettings {
    fn default() -> Self {
        Self {
            cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl Settings {
    /// Reject settings the service must not start with.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.jwt.secret.len() < MIN_SECRET_LENGTH {
            return Err(ConfigError::InvalidValue(format!(
                "jwt.secret must be at least {} bytes",
                MIN_SECRET_LENGTH
            ))
            .into());
        }
        if self.jwt.issuer.trim().is_empty() {
            return Err(ConfigError::MissingRequired("jwt.issuer".to_string()).into());
        }
        if self.jwt.access_token_expiry <= 0 {
            return Err(
                ConfigError::InvalidValue("jwt.access_token_expiry must be positive".to_string())
                    .into(),
            );
        }
        if self.jwt.refresh_token_expiry <= 0 {
            return Err(
                ConfigError::InvalidValue("jwt.refresh_token_expiry must be positive".to_string())
                    .into(),
            );
        }
        if !(4..=31).contains(&self.hashing.cost) {
            return Err(
                ConfigError::InvalidValue("hashing.cost must be between 4 and 31".to_string())
                    .into(),
            );
        }
        Ok(())
    }
}

/// Load settings from `configuration.yaml` (optional) overlaid with
/// `APP__SECTION__KEY` environment variables.
pub fn get_configuration() -> Result<Settings, AppError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    let settings = settings.try_deserialize::<Settings>()?;
    settings.validate()?;
    Ok(settings)
}
