use clap::Args;
use common::vault::{HistoryOptions, VaultError};
use futures::TryStreamExt;

#[derive(Args, Debug, Clone)]
pub struct History {
    /// First entry to show, counted from the oldest (or newest with --reverse)
    #[arg(long)]
    pub start: Option<u64>,

    /// Stop before this entry
    #[arg(long)]
    pub end: Option<u64>,

    /// Newest entries first
    #[arg(long)]
    pub reverse: bool,

    /// Emit one JSON object per line
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("vault error: {0}")]
    Vault(#[from] VaultError),
    #[error("failed to render history: {0}")]
    Json(#[from] serde_json::Error),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for History {
    type Error = HistoryError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let vault = ctx.load(None).await?;
        let options = HistoryOptions {
            start: self.start,
            end: self.end,
            reverse: self.reverse,
        };
        let entries: Vec<_> = vault.history_stream(options).await?.try_collect().await?;
        vault.close().await?;

        let mut lines = Vec::with_capacity(entries.len());
        for entry in entries {
            if self.json {
                lines.push(serde_json::to_string(&entry)?);
            } else {
                lines.push(format!(
                    "{:>6} {:<5} {}",
                    entry.version,
                    entry.kind.to_string(),
                    entry.path
                ));
            }
        }
        Ok(lines.join("\n"))
    }
}
