use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use common::vault::{LocalStorage, Vault, VaultError, VaultOptions};

#[derive(Debug, Clone)]
pub struct OpContext {
    /// Directory holding the vault
    pub path: PathBuf,
    /// Overrides the configured operation timeout
    pub timeout: Option<Duration>,
}

impl OpContext {
    pub fn new(path: PathBuf, timeout_ms: Option<u64>) -> Self {
        Self {
            path,
            timeout: timeout_ms.map(Duration::from_millis),
        }
    }

    pub fn options(&self) -> VaultOptions {
        VaultOptions::default().with_storage(&self.path)
    }

    /// Load the vault at `path`, optionally checked out at `version`
    ///
    /// Unlike `Vault::load`, never starts a new vault; that is `init`'s job.
    pub async fn load(&self, version: Option<u64>) -> Result<Vault, VaultError> {
        if self.path.is_dir() && !LocalStorage::new(&self.path).exists() {
            return Err(VaultError::LoadFailure(format!(
                "no vault in {}, run `vault init` first",
                self.path.display()
            )));
        }
        let mut vault = Vault::load(self.options()).await?;
        if let Some(timeout) = self.timeout {
            vault = vault.with_timeout(timeout);
        }
        if let Some(version) = version {
            vault = vault.checkout(version);
        }
        Ok(vault)
    }
}


#[async_trait::async_trait]
pub trait Op: Send + Sync {
    type Error: Error + Send + Sync + 'static;
    type Output;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error>;
}

#[macro_export]
macro_rules! command_enum {
    ($(($variant:ident, $type:ty)),* $(,)?) => {
        #[derive(Subcommand, Debug, Clone)]
        pub enum Command {
            $($variant($type),)*
        }

        #[derive(Debug)]
        pub enum OpOutput {
            $($variant(<$type as $crate::cli::op::Op>::Output),)*
        }

        #[derive(Debug, thiserror::Error)]
        pub enum OpError {
            $(
                #[error(transparent)]
                $variant(<$type as $crate::cli::op::Op>::Error),
            )*
        }

        #[async_trait::async_trait]
        impl $crate::cli::op::Op for Command {
            type Output = OpOutput;
            type Error = OpError;

            async fn execute(&self, ctx: &$crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
                match self {
                    $(
                        Command::$variant(op) => {
                            op.execute(ctx).await
                                .map(OpOutput::$variant)
                                .map_err(OpError::$variant)
                        },
                    )*
                }
            }
        }

        impl std::fmt::Display for OpOutput {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        OpOutput::$variant(output) => write!(f, "{}", output),
                    )*
                }
            }
        }
    };
}
