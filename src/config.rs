use std::env;

/// Runtime settings, read from environment variables with the same defaults
/// the web backend uses. Binaries call `dotenvy::dotenv()` before this so a
/// local `.env` file works in development.
#[derive(Debug, Clone)]
pub struct Settings {
    pub db_host: String,
    pub db_port: u16,
    pub db_name: String,
    pub db_user: String,
    pub db_password: String,
    pub analysis_base_url: String,
    pub analysis_model: String,
    pub openrouter_api_key: String,
}

impl Settings {
    pub fn from_env() -> Self {
        Settings {
            db_host: env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            db_port: env::var("DB_PORT")
                .unwrap_or_else(|_| "5432".to_string())
                .parse()
                .unwrap_or(5432),
            db_name: env::var("DB_NAME").unwrap_or_else(|_| "familyconnect_db".to_string()),
            db_user: env::var("DB_USER").unwrap_or_else(|_| "familyconnect_user".to_string()),
            db_password: env::var("DB_PASSWORD").unwrap_or_else(|_| "".to_string()),
            analysis_base_url: env::var("ANALYSIS_BASE_URL")
                .unwrap_or_else(|_| "https://openrouter.ai/api/v1".to_string()),
            analysis_model: env::var("ANALYSIS_MODEL")
                .unwrap_or_else(|_| "openai/gpt-4.1-2025-04-14".to_string()),
            openrouter_api_key: env::var("OPENROUTER_API_KEY").unwrap_or_default(),
        }
    }

    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.db_user, self.db_password, self.db_host, self.db_port, self.db_name
        )
    }
}
