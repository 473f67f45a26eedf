use clap::Args;
use common::vault::VaultError;

#[derive(Args, Debug, Clone)]
pub struct Info {
    /// Describe the vault as of this version
    #[arg(long)]
    pub at: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum InfoError {
    #[error("vault error: {0}")]
    Vault(#[from] VaultError),
    #[error("failed to render info: {0}")]
    Json(#[from] serde_json::Error),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Info {
    type Error = InfoError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let vault = ctx.load(self.at).await?;
        let info = vault.get_info().await?;
        vault.close().await?;
        Ok(serde_json::to_string_pretty(&info)?)
    }
}
