pub mod intent;
pub mod router;
pub mod synthesizer;

pub use intent::{IntentClassifier, QueryIntent};
pub use router::{RoutingDecision, RoutingPolicy};
pub use synthesizer::{
    DisplayResponse, ResponseMetadata, ResponseSynthesizer, SourceRef, SynthesizedResponse,
};
