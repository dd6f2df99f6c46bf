//! Contract between format adapters and the pipeline.

use anyhow::Result;
use ledgerfold_core::{NormalizedRecord, StatementMeta};

/// One parsed statement file: file-level metadata plus the row records.
///
/// Records are in chronological ascending order — adapters whose export
/// lists newest-first reverse before returning.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub meta: StatementMeta,
    pub records: Vec<NormalizedRecord>,
}

/// A format adapter for one source's export layout.
///
/// `identify` answers "is this file mine" — false means the file is not
/// applicable to this pipeline, which is a normal outcome, not an error.
/// `extract` may fail on a file that identified but is damaged; row-level
/// problems inside it are logged skips, not failures.
pub trait StatementAdapter {
    /// Stable adapter id, matching `SourcePolicy::source`.
    fn name(&self) -> &'static str;

    fn identify(&self, file_name: &str, text: &str) -> bool;

    fn extract(&self, text: &str) -> Result<Statement>;
}
