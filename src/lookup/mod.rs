//! External regulatory lookups with a three-tier cascade:
//! agent-orchestrated, direct source calls, then placeholder data.

pub mod agent;
pub mod backend;
pub mod direct;
pub mod engine;
pub mod placeholder;
pub mod types;

pub use agent::{AgentLookup, AgentRunner};
pub use backend::LookupBackend;
pub use engine::ExternalLookupEngine;
pub use types::{
    CaseRecord, LookupPayload, LookupRequest, LookupResult, PolicyStatus, Provenance,
    RegisterDocument, StatusKind,
};
