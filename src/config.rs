use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// Bank code embedded in the payment QR link (e.g. "MB").
    pub bank_code: String,
    /// Receiving account number for bank-transfer payments.
    pub bank_account: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let bank_code = env::var("BANK_CODE").unwrap_or_else(|_| "MB".to_string());
        let bank_account = env::var("BANK_ACCOUNT").unwrap_or_else(|_| "0000000000".to_string());
        Ok(Self {
            database_url,
            host,
            port,
            bank_code,
            bank_account,
        })
    }
}
