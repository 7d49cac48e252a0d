//! Application layer - The configuration pipeline use cases
//!
//! merge -> validate -> convert -> apply -> verify, plus the drift
//! detection / resolution loop and the orchestrating service.

pub mod apply;
pub mod compare;
pub mod convert;
pub mod drift;
pub mod merge;
pub mod paths;
pub mod resolution;
pub mod service;
pub mod validate;
pub mod verify;

pub use apply::Applier;
pub use compare::Comparator;
pub use convert::{ConfigConverter, ConverterRegistry};
pub use drift::DriftDetector;
pub use merge::{ConfigLayer, MergeResult, Merger};
pub use resolution::ResolutionEngine;
pub use service::ConfigurationService;
pub use validate::Validator;
pub use verify::Verifier;
