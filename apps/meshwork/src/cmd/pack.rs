//! `meshwork pack`: lay out blocks and print them with their fits.

use crate::cmd::PackArgs;
use anyhow::{Context, Result};
use mcore::MeshworkConfig;
use pack::{Block, Packer, Packing, by_area, shelf};
use serde_json::json;

/// Pack `blocks` in place as `args` asks.
pub fn layout(blocks: &mut [Block], args: &PackArgs, default_spacing: f64) -> Packing {
    let spacing = args.spacing.unwrap_or(default_spacing);
    if args.sort {
        blocks.sort_by(by_area);
    }
    if args.shelf {
        return shelf(blocks, args.width, args.height, spacing);
    }
    let mut packer = Packer::new(args.width, args.height, spacing);
    let packed = packer.pack(blocks);
    let (max_w, max_h) = packer.max();
    Packing {
        packed,
        max_w,
        max_h,
    }
}

pub fn run(config: &MeshworkConfig, args: &PackArgs) -> Result<()> {
    let path = &args.blocks;
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let mut blocks: Vec<Block> =
        serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))?;

    let packing = layout(&mut blocks, args, config.pack.spacing);
    if !packing.packed {
        tracing::warn!(
            "not every block fits in {}x{}",
            args.width,
            args.height
        );
    }

    let out = json!({
        "packed": packing.packed,
        "width": packing.max_w,
        "height": packing.max_h,
        "blocks": blocks,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
