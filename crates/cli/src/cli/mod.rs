pub mod args;
pub mod op;
pub mod ops;

pub use ops::{Cat, Configure, History, Info, Init, Ls, Mkdir, Rm, Rmdir, Version, Write};
