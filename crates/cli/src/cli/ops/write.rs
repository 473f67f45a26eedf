use std::path::PathBuf;

use clap::Args;
use common::vault::{Contents, Encoding, VaultError};

#[derive(Args, Debug, Clone)]
pub struct Write {
    /// Destination path in the vault
    pub path: String,

    /// Contents to write, decoded with --encoding
    #[arg(group = "source")]
    pub contents: Option<String>,

    /// Copy the contents of a local file verbatim
    #[arg(long, group = "source")]
    pub file: Option<PathBuf>,

    /// utf8, hex or base64
    #[arg(long, short, default_value = "utf8")]
    pub encoding: Encoding,
}

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("vault error: {0}")]
    Vault(#[from] VaultError),
    #[error("failed to read {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("either contents or --file must be provided")]
    NoContents,
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Write {
    type Error = WriteError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let contents: Contents = match (&self.contents, &self.file) {
            (Some(text), _) => text.as_str().into(),
            (None, Some(file)) => tokio::fs::read(file)
                .await
                .map_err(|e| WriteError::Read(file.clone(), e))?
                .into(),
            (None, None) => return Err(WriteError::NoContents),
        };

        let vault = ctx.load(None).await?;
        let version = vault.write_file(&self.path, contents, self.encoding).await?;
        vault.close().await?;
        Ok(format!("Wrote {} at version {}", self.path, version))
    }
}
