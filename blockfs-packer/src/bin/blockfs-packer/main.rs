mod cli;

use std::io;

use clap::Parser;
use cli::Cli;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    println!("source={:?}", cli.source);

    let geometry = cli.geometry();
    log::info!("geometry={geometry:?}");
    let mut fs = blockfs_packer::format(geometry)?;

    let stats = blockfs_packer::import_dir(&mut fs, blockfs_packer::root(), &cli.source)?;
    println!(
        "imported {} files, {} directories, {} symlinks, {} bytes",
        stats.files, stats.dirs, stats.symlinks, stats.bytes
    );

    let mut stdout = io::stdout().lock();
    blockfs_packer::list(&fs, blockfs_packer::root(), &mut stdout)?;
    blockfs_packer::usage(&fs, &mut stdout)?;

    Ok(())
}
