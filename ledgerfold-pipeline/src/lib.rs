//! ledgerfold-pipeline: turns adapter-normalized statement records into
//! balanced, classified, de-duplicated ledger transactions.

pub mod adapter;
pub mod adapters;
pub mod duplicate;
pub mod merge;
pub mod pipeline;
pub mod synth;

pub use adapter::{Statement, StatementAdapter};
pub use merge::MergeFold;
pub use pipeline::FilePipeline;
pub use synth::Synthesizer;
