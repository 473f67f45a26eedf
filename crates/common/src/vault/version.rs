/// Which version of a vault a handle reads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Checkout {
    /// Always the current length of the metadata log
    #[default]
    Live,
    /// Pinned to the first `n` entries
    Historic(u64),
}

impl Checkout {
    pub fn from_version(version: Option<u64>) -> Self {
        match version {
            Some(version) => Checkout::Historic(version),
            None => Checkout::Live,
        }
    }

    /// Effective version given the current log length
    ///
    /// A pin past the end of the log reads as the live tip.
    pub fn resolve(&self, log_length: u64) -> u64 {
        match self {
            Checkout::Live => log_length,
            Checkout::Historic(version) => (*version).min(log_length),
        }
    }

    pub fn is_historic(&self) -> bool {
        matches!(self, Checkout::Historic(_))
    }

    pub fn version(&self) -> Option<u64> {
        match self {
            Checkout::Live => None,
            Checkout::Historic(version) => Some(*version),
        }
    }
}
