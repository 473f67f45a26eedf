pub mod cat;
pub mod configure;
pub mod history;
pub mod info;
pub mod init;
pub mod ls;
pub mod mkdir;
pub mod rm;
pub mod rmdir;
pub mod version;
pub mod write;

pub use cat::Cat;
pub use configure::Configure;
pub use history::History;
pub use info::Info;
pub use init::Init;
pub use ls::Ls;
pub use mkdir::Mkdir;
pub use rm::Rm;
pub use rmdir::Rmdir;
pub use version::Version;
pub use write::Write;

use clap::Args;
use common::vault::ManifestUpdate;

/// Manifest fields shared by `init` and `configure`
#[derive(Args, Debug, Clone, Default)]
pub struct ManifestArgs {
    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    /// Free-form vault type, stored as `type` in the manifest
    #[arg(long = "type")]
    pub kind: Option<String>,

    #[arg(long)]
    pub author: Option<String>,
}

impl From<&ManifestArgs> for ManifestUpdate {
    fn from(args: &ManifestArgs) -> Self {
        ManifestUpdate {
            title: args.title.clone(),
            description: args.description.clone(),
            kind: args.kind.clone(),
            author: args.author.clone(),
        }
    }
}
