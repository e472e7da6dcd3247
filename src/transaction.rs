use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxnState {
    Open,
    Committed,
    RolledBack,
}

/// The single output file of a conversion. Either committed as the
/// finished artifact or rolled back by deleting whatever was written.
pub struct OutputTransaction {
    target: PathBuf,
    state: TxnState,
}

impl OutputTransaction {
    pub fn begin(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            state: TxnState::Open,
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    #[cfg(test)]
    fn state(&self) -> TxnState {
        self.state
    }

    /// Create the target and hand a buffered writer to `write`. The file is
    /// flushed and closed before this returns, on success or failure.
    pub fn write_with<F>(&mut self, write: F) -> Result<u64>
    where
        F: FnOnce(&mut dyn Write) -> Result<()>,
    {
        {
            let file = File::create(&self.target)?;
            let mut out = BufWriter::new(file);
            write(&mut out)?;
            out.flush()?;
            out.get_ref().sync_all()?;
        }
        Ok(std::fs::metadata(&self.target)?.len())
    }

    /// Keep the output.
    pub fn commit(mut self) {
        self.state = TxnState::Committed;
    }

    /// Delete the target if it exists. Failures are logged, never returned;
    /// reports whether a file was removed. Only the first call does anything.
    pub fn rollback(&mut self) -> bool {
        if self.state != TxnState::Open {
            return false;
        }
        self.state = TxnState::RolledBack;
        match std::fs::remove_file(&self.target) {
            Ok(()) => {
                tracing::debug!(path = %self.target.display(), "removed partial output");
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                tracing::warn!(path = %self.target.display(), error = %e, "failed to remove partial output");
                false
            }
        }
    }
}
