use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,
    /// `None` means the built-in rule list is used.
    pub category_rules_path: Option<PathBuf>,
    pub report_dir: PathBuf,
    /// Move dependent rows onto the survivor before deleting a duplicate.
    pub reassign_relations: bool,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub image_check_timeout_secs: u64,
    pub image_check_user_agent: String,
    pub image_check_concurrency: usize,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("category_rules_path", &self.category_rules_path)
            .field("report_dir", &self.report_dir)
            .field("reassign_relations", &self.reassign_relations)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("image_check_timeout_secs", &self.image_check_timeout_secs)
            .field("image_check_user_agent", &self.image_check_user_agent)
            .field("image_check_concurrency", &self.image_check_concurrency)
            .finish()
    }
}
