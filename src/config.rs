use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub graph: GraphConfig,
    pub repository: RepositoryConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Connection to the graph store. Without a URL the in-memory backend is
/// used, which only makes sense for tests and local experiments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    pub url: Option<String>,
    pub database: String,
    pub username: String,
    pub password: String,
}

/// Connection to the upstream document repository. Without a URL the
/// in-memory double is used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub url: Option<String>,
    pub system_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Capacity of the credential-to-organizations cache.
    pub cache_capacity: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            graph: GraphConfig::default(),
            repository: RepositoryConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            url: None,
            database: "kgraph".to_string(),
            username: "root".to_string(),
            password: String::new(),
        }
    }
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            url: None,
            system_token: None,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 1000,
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, an optional config file and
    /// `KGRAPH__`-prefixed environment variables, in that order.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = config::Config::builder();

        config = config.add_source(config::Config::try_from(&AppConfig::default())?);
        config = config.add_source(config::File::with_name("config").required(false));
        config = config.add_source(
            config::Environment::with_prefix("KGRAPH")
                .separator("__")
                .try_parsing(true),
        );

        Ok(config.build()?.try_deserialize()?)
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
