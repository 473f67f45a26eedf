use clap::Args;
use common::vault::{Stat, VaultError};

#[derive(Args, Debug, Clone)]
pub struct Ls {
    /// Directory to list (defaults to root)
    #[arg(default_value = "/")]
    pub path: String,

    /// Show type, size and version of each entry
    #[arg(long)]
    pub stat: bool,

    /// List the directory as of this version
    #[arg(long)]
    pub at: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum LsError {
    #[error("vault error: {0}")]
    Vault(#[from] VaultError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Ls {
    type Error = LsError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let vault = ctx.load(self.at).await?;

        let lines = if self.stat {
            vault
                .readdir_with_stat(&self.path)
                .await?
                .into_iter()
                .map(|entry| match entry.stat {
                    Stat::File(file) => format!(
                        "{} (file) {} bytes [v{}]",
                        entry.name, file.size, file.version
                    ),
                    Stat::Directory(dir) => format!("{}/ (dir) [v{}]", entry.name, dir.version),
                })
                .collect::<Vec<_>>()
        } else {
            vault.readdir(&self.path).await?
        };
        vault.close().await?;

        if lines.is_empty() {
            Ok("No items found".to_string())
        } else {
            Ok(lines.join("\n"))
        }
    }
}
