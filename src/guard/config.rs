use std::time::Duration;

use super::error::GuardError;

/// Guard thresholds and routes.
///
/// All fields have defaults matching the admin site; override with `with_*`
/// methods or [`from_env()`](GuardConfig::from_env).
#[derive(Debug, Clone)]
pub struct GuardConfig {
    pub(crate) max_login_attempts: u32,
    pub(crate) lockout: Duration,
    pub(crate) warning_lead: Duration,
    pub(crate) contact_cooldown: Duration,
    pub(crate) banner_ttl: Duration,
    pub(crate) login_path: String,
    pub(crate) dashboard_path: String,
    pub(crate) cooldown_key: String,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            max_login_attempts: 5,
            lockout: Duration::from_secs(300),
            warning_lead: Duration::from_secs(300),
            contact_cooldown: Duration::from_secs(60),
            banner_ttl: Duration::from_secs(3),
            login_path: "/admin/login".into(),
            dashboard_path: "/admin/dashboard".into(),
            cooldown_key: "lastContactSubmit".into(),
        }
    }
}

impl GuardConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create config from environment variables, falling back to defaults.
    ///
    /// # Optional env vars
    /// - `FOLIO_MAX_LOGIN_ATTEMPTS`: failures before lockout (default 5)
    /// - `FOLIO_LOCKOUT_SECS`: lockout length (default 300)
    /// - `FOLIO_WARNING_LEAD_SECS`: warn this long before session expiry (default 300)
    /// - `FOLIO_CONTACT_COOLDOWN_SECS`: gap between contact submissions (default 60)
    /// - `FOLIO_BANNER_TTL_SECS`: status banner lifetime (default 3)
    /// - `FOLIO_LOGIN_PATH`, `FOLIO_DASHBOARD_PATH`: redirect targets
    ///
    /// # Errors
    ///
    /// Returns [`GuardError::Config`] if a numeric variable does not parse
    /// or `FOLIO_MAX_LOGIN_ATTEMPTS` is zero.
    pub fn from_env() -> Result<Self, GuardError> {
        let mut config = Self::default();

        if let Some(n) = env_u64("FOLIO_MAX_LOGIN_ATTEMPTS")? {
            let n = u32::try_from(n)
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| GuardError::Config("FOLIO_MAX_LOGIN_ATTEMPTS must be 1..=u32::MAX".into()))?;
            config = config.with_max_login_attempts(n);
        }
        if let Some(secs) = env_u64("FOLIO_LOCKOUT_SECS")? {
            config = config.with_lockout(Duration::from_secs(secs));
        }
        if let Some(secs) = env_u64("FOLIO_WARNING_LEAD_SECS")? {
            config = config.with_warning_lead(Duration::from_secs(secs));
        }
        if let Some(secs) = env_u64("FOLIO_CONTACT_COOLDOWN_SECS")? {
            config = config.with_contact_cooldown(Duration::from_secs(secs));
        }
        if let Some(secs) = env_u64("FOLIO_BANNER_TTL_SECS")? {
            config = config.with_banner_ttl(Duration::from_secs(secs));
        }
        if let Ok(path) = std::env::var("FOLIO_LOGIN_PATH") {
            config = config.with_login_path(path);
        }
        if let Ok(path) = std::env::var("FOLIO_DASHBOARD_PATH") {
            config = config.with_dashboard_path(path);
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_max_login_attempts(mut self, attempts: u32) -> Self {
        self.max_login_attempts = attempts.max(1);
        self
    }

    #[must_use]
    pub fn with_lockout(mut self, lockout: Duration) -> Self {
        self.lockout = lockout;
        self
    }

    #[must_use]
    pub fn with_warning_lead(mut self, lead: Duration) -> Self {
        self.warning_lead = lead;
        self
    }

    #[must_use]
    pub fn with_contact_cooldown(mut self, cooldown: Duration) -> Self {
        self.contact_cooldown = cooldown;
        self
    }

    #[must_use]
    pub fn with_banner_ttl(mut self, ttl: Duration) -> Self {
        self.banner_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    #[must_use]
    pub fn with_dashboard_path(mut self, path: impl Into<String>) -> Self {
        self.dashboard_path = path.into();
        self
    }

    #[must_use]
    pub fn with_cooldown_key(mut self, key: impl Into<String>) -> Self {
        self.cooldown_key = key.into();
        self
    }

    #[must_use]
    pub fn max_login_attempts(&self) -> u32 {
        self.max_login_attempts
    }

    #[must_use]
    pub fn lockout(&self) -> Duration {
        self.lockout
    }

    #[must_use]
    pub fn warning_lead(&self) -> Duration {
        self.warning_lead
    }

    #[must_use]
    pub fn contact_cooldown(&self) -> Duration {
        self.contact_cooldown
    }

    #[must_use]
    pub fn banner_ttl(&self) -> Duration {
        self.banner_ttl
    }

    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    #[must_use]
    pub fn dashboard_path(&self) -> &str {
        &self.dashboard_path
    }

    #[must_use]
    pub fn cooldown_key(&self) -> &str {
        &self.cooldown_key
    }
}

fn env_u64(name: &str) -> Result<Option<u64>, GuardError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| GuardError::Config(format!("{name}: {e}"))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_admin_site() {
        let config = GuardConfig::default();
        assert_eq!(config.max_login_attempts(), 5);
        assert_eq!(config.lockout(), Duration::from_secs(300));
        assert_eq!(config.warning_lead(), Duration::from_secs(300));
        assert_eq!(config.contact_cooldown(), Duration::from_secs(60));
        assert_eq!(config.banner_ttl(), Duration::from_secs(3));
        assert_eq!(config.login_path(), "/admin/login");
        assert_eq!(config.dashboard_path(), "/admin/dashboard");
        assert_eq!(config.cooldown_key(), "lastContactSubmit");
    }

    #[test]
    fn builder_overrides() {
        let config = GuardConfig::new()
            .with_max_login_attempts(0)
            .with_lockout(Duration::from_secs(10))
            .with_login_path("/login");
        assert_eq!(config.max_login_attempts(), 1);
        assert_eq!(config.lockout(), Duration::from_secs(10));
        assert_eq!(config.login_path(), "/login");
    }

    #[test]
    fn env_parse_errors_are_config_errors() {
        // Name unique to this test so parallel tests never observe it.
        let name = "FOLIO_TEST_ONLY_NUMBER";
        // SAFETY: no other test reads or writes this variable.
        unsafe { std::env::set_var(name, "not-a-number") };
        assert!(matches!(env_u64(name), Err(GuardError::Config(_))));
        unsafe { std::env::set_var(name, " 42 ") };
        assert_eq!(env_u64(name).unwrap(), Some(42));
        unsafe { std::env::remove_var(name) };
        assert_eq!(env_u64(name).unwrap(), None);
    }
}
