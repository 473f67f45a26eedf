use clap::Args;
use common::vault::VaultError;

#[derive(Args, Debug, Clone)]
pub struct Mkdir {
    /// Directory to create
    pub path: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MkdirError {
    #[error("vault error: {0}")]
    Vault(#[from] VaultError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Mkdir {
    type Error = MkdirError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let vault = ctx.load(None).await?;
        let version = vault.mkdir(&self.path).await?;
        vault.close().await?;
        Ok(format!("Created {} at version {}", self.path, version))
    }
}
