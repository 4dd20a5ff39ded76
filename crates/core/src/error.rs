use std::fmt;

/// Any read failure from the catalog store while computing a ranking or listing.
///
/// The underlying cause is kept for diagnostics (`source()`, `{:#}` formatting) but is
/// not meant to be shown to API clients.
#[derive(Debug)]
pub struct AggregationFailure {
    pub stage: &'static str,
    pub cause: anyhow::Error,
}

impl AggregationFailure {
    pub fn new(stage: &'static str, cause: anyhow::Error) -> Self {
        Self { stage, cause }
    }
}

impl fmt::Display for AggregationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "aggregation failed (stage={})", self.stage)?;
        if f.alternate() {
            write!(f, ": {:#}", self.cause)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregationFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.cause.as_ref())
    }
}

/// Attaches the failing stage to a store result.
pub(crate) trait StageContext<T> {
    fn stage(self, stage: &'static str) -> Result<T, AggregationFailure>;
}

impl<T> StageContext<T> for anyhow::Result<T> {
    fn stage(self, stage: &'static str) -> Result<T, AggregationFailure> {
        self.map_err(|cause| AggregationFailure::new(stage, cause))
    }
}
