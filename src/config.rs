use std::collections::HashMap;

/// Runtime configuration, loaded from the environment.
///
/// `TOKEN_<ACTOR>` variables bind bearer tokens to actor identities: the
/// suffix, lowercased, is the actor name (`TOKEN_WOLF=abc` → actor "wolf").
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub vault_path: String,
    pub db_path: String,
    pub ollama_url: String,
    pub ollama_model: String,
    pub ollama_model_heavy: String,
    /// token → actor
    pub tokens: HashMap<String, String>,
    pub timezone: String,
}

fn default_port() -> u16 {
    8080
}
fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_model() -> String {
    "qwen2.5:7b".to_string()
}
fn default_model_heavy() -> String {
    "qwen2.5:14b".to_string()
}
fn default_timezone() -> String {
    "Europe/London".to_string()
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let cfg = Self::from_vars(std::env::vars())?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_vars(vars: impl Iterator<Item = (String, String)>) -> anyhow::Result<Self> {
        let mut env: HashMap<String, String> = HashMap::new();
        let mut tokens = HashMap::new();

        for (key, value) in vars {
            if value.is_empty() {
                continue;
            }
            if let Some(actor) = key.strip_prefix("TOKEN_") {
                if !actor.is_empty() {
                    tokens.insert(value.clone(), actor.to_lowercase());
                    continue;
                }
            }
            env.insert(key, value);
        }

        let port = match env.get("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|e| anyhow::anyhow!("Invalid PORT '{}': {}", raw, e))?,
            None => default_port(),
        };

        Ok(Self {
            port,
            vault_path: env.get("VAULT_PATH").cloned().unwrap_or_default(),
            db_path: env.get("DB_PATH").cloned().unwrap_or_default(),
            ollama_url: env
                .get("OLLAMA_URL")
                .cloned()
                .unwrap_or_else(default_ollama_url),
            ollama_model: env
                .get("OLLAMA_MODEL")
                .cloned()
                .unwrap_or_else(default_model),
            ollama_model_heavy: env
                .get("OLLAMA_MODEL_HEAVY")
                .cloned()
                .unwrap_or_else(default_model_heavy),
            tokens,
            timezone: env
                .get("TIMEZONE")
                .cloned()
                .unwrap_or_else(default_timezone),
        })
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.vault_path.is_empty() {
            anyhow::bail!("VAULT_PATH is required");
        }
        if self.db_path.is_empty() {
            anyhow::bail!("DB_PATH is required");
        }
        if self.tokens.is_empty() {
            anyhow::bail!("at least one TOKEN_<ACTOR> is required");
        }
        Ok(())
    }

    /// Maps a bearer token to its actor, if the token is known.
    pub fn actor_from_token(&self, token: &str) -> Option<&str> {
        self.tokens.get(token).map(|s| s.as_str())
    }

    /// Sorted actor names, used by the scheduler to iterate letter jobs
    /// deterministically.
    pub fn actors(&self) -> Vec<String> {
        let mut actors: Vec<String> = self.tokens.values().cloned().collect();
        actors.sort();
        actors.dedup();
        actors
    }

    /// Parses the configured timezone, falling back to UTC when the name is
    /// unknown (matches the original service's behaviour).
    pub fn tz(&self) -> chrono_tz::Tz {
        match self.timezone.parse::<chrono_tz::Tz>() {
            Ok(tz) => tz,
            Err(_) => {
                tracing::warn!(timezone = %self.timezone, "Unknown timezone, falling back to UTC");
                chrono_tz::UTC
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_vars() -> Vec<(String, String)> {
        vec![
            ("VAULT_PATH".into(), "/tmp/vault".into()),
            ("DB_PATH".into(), "/tmp/brain.db".into()),
            ("TOKEN_WOLF".into(), "secret-wolf".into()),
        ]
    }

    #[test]
    fn test_defaults() {
        let cfg = Config::from_vars(base_vars().into_iter()).unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.ollama_url, "http://localhost:11434");
        assert_eq!(cfg.timezone, "Europe/London");
        cfg.validate().unwrap();
    }

    #[test]
    fn test_token_mapping() {
        let mut vars = base_vars();
        vars.push(("TOKEN_WIFE".into(), "secret-wife".into()));
        let cfg = Config::from_vars(vars.into_iter()).unwrap();
        assert_eq!(cfg.actor_from_token("secret-wolf"), Some("wolf"));
        assert_eq!(cfg.actor_from_token("secret-wife"), Some("wife"));
        assert_eq!(cfg.actor_from_token("bogus"), None);
        assert_eq!(cfg.actors(), vec!["wife".to_string(), "wolf".to_string()]);
    }

    #[test]
    fn test_missing_required() {
        let cfg = Config::from_vars(
            vec![("VAULT_PATH".to_string(), "/tmp/vault".to_string())].into_iter(),
        )
        .unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_bad_timezone_falls_back_to_utc() {
        let mut vars = base_vars();
        vars.push(("TIMEZONE".into(), "Not/AZone".into()));
        let cfg = Config::from_vars(vars.into_iter()).unwrap();
        assert_eq!(cfg.tz(), chrono_tz::UTC);
    }
}
