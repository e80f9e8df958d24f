use std::fmt::Display;

/// A thin error type for conditions specific to the benchmark harness itself
/// (as opposed to `anyhow::Error`, used at the CLI boundary for everything
/// else).
#[derive(Debug, Clone)]
pub struct BenchError(pub Option<String>);

impl std::error::Error for BenchError {}

impl Display for BenchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(msg) = &self.0 {
            write!(f, "{}", msg.as_str())?;
        }
        Ok(())
    }
}
