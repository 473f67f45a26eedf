use clap::Args;
use common::vault::{Vault, VaultError};

use super::ManifestArgs;

#[derive(Args, Debug, Clone)]
pub struct Init {
    #[command(flatten)]
    pub manifest: ManifestArgs,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("failed to create vault: {0}")]
    Vault(#[from] VaultError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let vault = Vault::create(ctx.options(), (&self.manifest).into()).await?;
        let url = vault.url().await?;
        vault.close().await?;
        Ok(format!("Created {} in {}", url, ctx.path.display()))
    }
}
