pub mod app_config;
pub mod categories;
pub mod config;
pub mod journeys;
pub mod normalize;
pub mod products;
pub mod store;

pub use app_config::{AppConfig, Environment};
pub use categories::{load_category_rules, Category, CategoryRule, CategoryRules, RulesFile};
pub use config::{load_app_config, load_app_config_from_env};
pub use journeys::{Bucket, ContentError, EmbeddedProductEntry, JourneyContent, JourneyDocument};
pub use normalize::normalize_name;
pub use products::{has_remote_image, is_remote_uri, CanonicalProduct, RelationCounts};
pub use store::{CatalogStore, ProductPatch, RawJourneyDocument, StoreError};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read category rules file {path}: {source}")]
    RulesFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse category rules file: {0}")]
    RulesFileParse(#[from] serde_yaml::Error),

    #[error("category rules validation failed: {0}")]
    Validation(String),
}
