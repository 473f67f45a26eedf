use clap::Args;
use common::vault::VaultError;

#[derive(Args, Debug, Clone)]
pub struct Rmdir {
    /// Directory to remove
    pub path: String,

    /// Remove the directory and everything beneath it
    #[arg(long, short)]
    pub recursive: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum RmdirError {
    #[error("vault error: {0}")]
    Vault(#[from] VaultError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Rmdir {
    type Error = RmdirError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let vault = ctx.load(None).await?;
        let version = vault.rmdir(&self.path, self.recursive).await?;
        vault.close().await?;
        Ok(format!("Removed {} at version {}", self.path, version))
    }
}
