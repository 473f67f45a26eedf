use clap::Args;
use common::vault::{ManifestUpdate, VaultError};

use super::ManifestArgs;

#[derive(Args, Debug, Clone)]
pub struct Configure {
    #[command(flatten)]
    pub manifest: ManifestArgs,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigureError {
    #[error("vault error: {0}")]
    Vault(#[from] VaultError),
    #[error("nothing to configure; pass at least one manifest field")]
    NothingToDo,
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Configure {
    type Error = ConfigureError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let update = ManifestUpdate::from(&self.manifest);
        if update.is_empty() {
            return Err(ConfigureError::NothingToDo);
        }
        let vault = ctx.load(None).await?;
        let version = vault.configure(update).await?;
        vault.close().await?;
        Ok(format!("Manifest updated at version {}", version))
    }
}
