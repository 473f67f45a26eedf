mod cli;
mod process;

use clap::{Parser, Subcommand};
use cli::{
    args::Args, op::Op, Cat, Configure, History, Info, Init, Ls, Mkdir, Rm, Rmdir, Version, Write,
};

command_enum! {
    (Init, Init),
    (Info, Info),
    (Ls, Ls),
    (Cat, Cat),
    (Write, Write),
    (Rm, Rm),
    (Mkdir, Mkdir),
    (Rmdir, Rmdir),
    (History, History),
    (Configure, Configure),
    (Version, Version),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    process::init_logging(&args.log_level);
    process::register_panic_logger();
    process::report_build_info();

    let ctx = cli::op::OpContext::new(args.path, args.timeout_ms);

    match args.command.execute(&ctx).await {
        Ok(output) => {
            println!("{}", output);
            std::process::exit(0);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
