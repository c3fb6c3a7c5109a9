use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::str::FromStr;

#[derive(Deserialize, Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub jwt_secret: String,

    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_jwt_expiry_hours")]
    pub jwt_expiry_hours: i64,

    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,

    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,

    #[serde(default = "default_static_dir")]
    pub static_dir: String,

    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default)]
    pub admin_username: Option<String>,
    #[serde(default)]
    pub admin_password: Option<String>,
    #[serde(default)]
    pub admin_email: Option<String>,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
struct PartialServerConfig {
    database_url: Option<String>,
    jwt_secret: Option<String>,
    bind_address: Option<String>,
    jwt_expiry_hours: Option<i64>,
    bcrypt_cost: Option<u32>,
    upload_dir: Option<String>,
    static_dir: Option<String>,
    max_upload_bytes: Option<usize>,
    log_dir: Option<String>,
    admin_username: Option<String>,
    admin_password: Option<String>,
    admin_email: Option<String>,
}

fn default_bind_address() -> String {
    "0.0.0.0:5001".to_string()
}

fn default_jwt_expiry_hours() -> i64 {
    24 * 7
}

fn default_bcrypt_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

fn default_upload_dir() -> String {
    "static/uploads".to_string()
}

fn default_static_dir() -> String {
    "static".to_string()
}

fn default_max_upload_bytes() -> usize {
    16 * 1024 * 1024
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn parse_env<T: FromStr>(key: &str, value: Option<String>) -> Result<Option<T>, String>
where
    T::Err: std::fmt::Display,
{
    value
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| format!("Invalid value for {key}: {e}"))
        })
        .transpose()
}

impl PartialServerConfig {
    fn from_env<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(PartialServerConfig {
            database_url: lookup("DATABASE_URL"),
            jwt_secret: lookup("JWT_SECRET"),
            bind_address: lookup("BIND_ADDRESS"),
            jwt_expiry_hours: parse_env("JWT_EXPIRY_HOURS", lookup("JWT_EXPIRY_HOURS"))?,
            bcrypt_cost: parse_env("BCRYPT_COST", lookup("BCRYPT_COST"))?,
            upload_dir: lookup("UPLOAD_DIR"),
            static_dir: lookup("STATIC_DIR"),
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", lookup("MAX_UPLOAD_BYTES"))?,
            log_dir: lookup("LOG_DIR"),
            admin_username: lookup("ADMIN_USERNAME"),
            admin_password: lookup("ADMIN_PASSWORD"),
            admin_email: lookup("ADMIN_EMAIL"),
        })
    }
}

impl ServerConfig {
    /// A config with every optional key at its default.
    pub fn new(database_url: impl Into<String>, jwt_secret: impl Into<String>) -> Self {
        ServerConfig {
            database_url: database_url.into(),
            jwt_secret: jwt_secret.into(),
            bind_address: default_bind_address(),
            jwt_expiry_hours: default_jwt_expiry_hours(),
            bcrypt_cost: default_bcrypt_cost(),
            upload_dir: default_upload_dir(),
            static_dir: default_static_dir(),
            max_upload_bytes: default_max_upload_bytes(),
            log_dir: default_log_dir(),
            admin_username: None,
            admin_password: None,
            admin_email: None,
        }
    }

    pub fn load(config_path: Option<&str>) -> Result<Self, String> {
        dotenv::dotenv().ok();

        let file_contents = match config_path {
            Some(path_str) => {
                let path = Path::new(path_str);
                if path.exists() {
                    Some(
                        fs::read_to_string(path)
                            .map_err(|e| format!("Failed to read config file at {path:?}: {e}"))?,
                    )
                } else {
                    None
                }
            }
            None => None,
        };

        Self::from_sources(file_contents.as_deref(), |key| std::env::var(key).ok())
    }

    /// Merges an optional TOML document with variables from `lookup`; the
    /// environment wins over the file.
    pub fn from_sources<F>(file_contents: Option<&str>, lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file_config: PartialServerConfig = match file_contents {
            Some(contents) => toml::from_str(contents)
                .map_err(|e| format!("Failed to parse TOML config: {e}"))?,
            None => PartialServerConfig::default(),
        };
        let env_config = PartialServerConfig::from_env(lookup)?;

        let final_config = ServerConfig {
            database_url: env_config
                .database_url
                .or(file_config.database_url)
                .ok_or("DATABASE_URL is required")?,
            jwt_secret: env_config
                .jwt_secret
                .or(file_config.jwt_secret)
                .ok_or("JWT_SECRET is required")?,
            bind_address: env_config
                .bind_address
                .or(file_config.bind_address)
                .unwrap_or_else(default_bind_address),
            jwt_expiry_hours: env_config
                .jwt_expiry_hours
                .or(file_config.jwt_expiry_hours)
                .unwrap_or_else(default_jwt_expiry_hours),
            bcrypt_cost: env_config
                .bcrypt_cost
                .or(file_config.bcrypt_cost)
                .unwrap_or_else(default_bcrypt_cost),
            upload_dir: env_config
                .upload_dir
                .or(file_config.upload_dir)
                .unwrap_or_else(default_upload_dir),
            static_dir: env_config
                .static_dir
                .or(file_config.static_dir)
                .unwrap_or_else(default_static_dir),
            max_upload_bytes: env_config
                .max_upload_bytes
                .or(file_config.max_upload_bytes)
                .unwrap_or_else(default_max_upload_bytes),
            log_dir: env_config
                .log_dir
                .or(file_config.log_dir)
                .unwrap_or_else(default_log_dir),
            admin_username: env_config.admin_username.or(file_config.admin_username),
            admin_password: env_config.admin_password.or(file_config.admin_password),
            admin_email: env_config.admin_email.or(file_config.admin_email),
        };

        if final_config.jwt_secret.trim().is_empty() {
            return Err("JWT_SECRET must not be empty".to_string());
        }
        Ok(final_config)
    }
}
