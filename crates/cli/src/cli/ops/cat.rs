use clap::Args;
use common::vault::{Contents, Encoding, VaultError};

#[derive(Args, Debug, Clone)]
pub struct Cat {
    /// File to read
    pub path: String,

    /// utf8, hex, base64 or binary
    #[arg(long, short, default_value = "utf8")]
    pub encoding: Encoding,

    /// Read the file as of this version
    #[arg(long)]
    pub at: Option<u64>,
}

#[derive(Debug, thiserror::Error)]
pub enum CatError {
    #[error("vault error: {0}")]
    Vault(#[from] VaultError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Cat {
    type Error = CatError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let vault = ctx.load(self.at).await?;
        let contents = vault.read_file(&self.path, self.encoding).await?;
        vault.close().await?;

        match contents {
            Contents::Text(text) => Ok(text),
            // binary output has no lossless text form; fall back to lossy utf8
            Contents::Binary(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        }
    }
}
