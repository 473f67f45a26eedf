use clap::Args;
use common::vault::VaultError;

#[derive(Args, Debug, Clone)]
pub struct Rm {
    /// File to remove
    pub path: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RmError {
    #[error("vault error: {0}")]
    Vault(#[from] VaultError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Rm {
    type Error = RmError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let vault = ctx.load(None).await?;
        let version = vault.unlink(&self.path).await?;
        vault.close().await?;
        Ok(format!("Removed {} at version {}", self.path, version))
    }
}
