use anyhow::Result;
use structopt::StructOpt;

use phyloclone::cli::{run, Phyloclone};

pub fn main() -> Result<()> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!("[{}] {}", record.level(), message))
        })
        .level(log::LevelFilter::Info)
        .chain(std::io::stderr())
        .apply()?;

    let opt = Phyloclone::from_args();
    run(opt)
}
