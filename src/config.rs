use anyhow::Context;

pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub smtp: Option<SmtpConfig>,
}

impl Config {
    /// Reads the configuration from the environment, once, at startup.
    /// Mail is optional: without SMTP_HOST the dispatcher runs disabled.
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not found")?;
        let bind_addr =
            std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());

        let smtp = match std::env::var("SMTP_HOST") {
            Ok(host) => {
                let port = match std::env::var("SMTP_PORT") {
                    Ok(port) => port.parse::<u16>().context("SMTP_PORT is not a port")?,
                    Err(_) => 587,
                };
                let from = std::env::var("SMTP_FROM")
                    .context("SMTP_FROM is required when SMTP_HOST is set")?;
                Some(SmtpConfig {
                    host,
                    port,
                    username: std::env::var("SMTP_USERNAME").ok(),
                    password: std::env::var("SMTP_PASSWORD").ok(),
                    from,
                })
            }
            Err(_) => None,
        };

        Ok(Config {
            database_url,
            bind_addr,
            smtp,
        })
    }
}
