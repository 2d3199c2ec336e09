use clap::Parser;
use std::path::PathBuf;

use blockfs::Geometry;

#[derive(Parser)]
pub struct Cli {
    /// Host directory to import
    #[arg(long, short)]
    pub source: PathBuf,

    /// Total blocks of the device
    #[arg(long, default_value_t = Geometry::default().total_blocks)]
    pub blocks: u32,

    /// Inode table capacity
    #[arg(long, default_value_t = Geometry::default().inode_count)]
    pub inodes: u32,

    /// Direct block slots per inode
    #[arg(long, short = 'k', default_value_t = Geometry::default().direct_slots)]
    pub direct_slots: u32,
}

impl Cli {
    pub fn geometry(&self) -> Geometry {
        Geometry {
            total_blocks: self.blocks,
            inode_count: self.inodes,
            direct_slots: self.direct_slots,
        }
    }
}
