pub mod paths;
pub mod service;
pub mod settings;
pub mod validation;

pub use paths::AppPaths;
pub use service::ConfigService;
pub use settings::{
    ActionsConfig, ClassifierConfig, ConfidenceConfig, EmbedderKind, LlmConfig, LookupConfig,
    NavigatorConfig, RetrievalConfig, SynthesisConfig, EMBEDDING_DIMENSION,
};
