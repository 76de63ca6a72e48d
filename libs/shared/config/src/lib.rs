use std::env;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub supabase_jwt_secret: String,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub stripe_api_base: String,
    pub frontend_url: String,
    pub payment_currency: String,
    pub payment_session_ttl_minutes: i64,
    pub unpaid_appointment_ttl_minutes: i64,
    pub unpaid_sweep_interval_secs: u64,
    pub port: u16,
}

fn required(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        warn!("{} not set, using empty value", key);
        String::new()
    })
}

fn with_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        warn!("{} not set, using default", key);
        default.to_string()
    })
}

fn parsed<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has an invalid value '{}', using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: required("SUPABASE_URL"),
            supabase_anon_key: required("SUPABASE_ANON_PUBLIC_KEY"),
            supabase_service_role_key: required("SUPABASE_SERVICE_ROLE_KEY"),
            supabase_jwt_secret: required("SUPABASE_JWT_SECRET"),
            stripe_secret_key: required("STRIPE_SECRET_KEY"),
            stripe_webhook_secret: required("STRIPE_WEBHOOK_SECRET"),
            stripe_api_base: with_default("STRIPE_API_BASE", "https://api.stripe.com"),
            frontend_url: with_default("FRONTEND_URL", "http://localhost:5173"),
            payment_currency: with_default("PAYMENT_CURRENCY", "usd"),
            payment_session_ttl_minutes: parsed("PAYMENT_SESSION_TTL_MINUTES", 30),
            unpaid_appointment_ttl_minutes: parsed("UNPAID_APPOINTMENT_TTL_MINUTES", 45),
            unpaid_sweep_interval_secs: parsed("UNPAID_SWEEP_INTERVAL_SECS", 300),
            port: parsed("PORT", 3000),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        self.is_database_configured()
            && !self.supabase_jwt_secret.is_empty()
            && self.is_payments_configured()
    }

    pub fn is_database_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_anon_key.is_empty()
    }

    pub fn is_payments_configured(&self) -> bool {
        !self.stripe_secret_key.is_empty()
    }

    /// Frontend base without trailing slashes, with a scheme added when the
    /// configured value has none.
    pub fn frontend_base(&self) -> String {
        let trimmed = self.frontend_url.trim().trim_end_matches('/');
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else {
            format!("http://{}", trimmed)
        }
    }

    /// Key used for PostgREST calls made on behalf of the service itself.
    pub fn database_key(&self) -> &str {
        if self.supabase_service_role_key.is_empty() {
            &self.supabase_anon_key
        } else {
            &self.supabase_service_role_key
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(frontend_url: &str) -> AppConfig {
        AppConfig {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_service_role_key: String::new(),
            supabase_jwt_secret: String::new(),
            stripe_secret_key: String::new(),
            stripe_webhook_secret: String::new(),
            stripe_api_base: "https://api.stripe.com".to_string(),
            frontend_url: frontend_url.to_string(),
            payment_currency: "usd".to_string(),
            payment_session_ttl_minutes: 30,
            unpaid_appointment_ttl_minutes: 45,
            unpaid_sweep_interval_secs: 300,
            port: 3000,
        }
    }

    #[test]
    fn frontend_base_strips_slashes_and_adds_scheme() {
        assert_eq!(config("clinic.example.com//").frontend_base(), "http://clinic.example.com");
        assert_eq!(config("https://clinic.example.com/").frontend_base(), "https://clinic.example.com");
    }

    #[test]
    fn empty_config_is_not_configured() {
        let config = config("");
        assert!(!config.is_configured());
        assert!(!config.is_database_configured());
    }
}
