//! Tests for subcommand behavior.

use clap::Parser;
use meshwork::{
    Cli, Command,
    cmd::{PackArgs, demo, pack},
};
use ::pack::Block;

fn pack_args(argv: &[&str]) -> PackArgs {
    let cli = Cli::parse_from(["meshwork", "pack"].iter().chain(argv).copied());
    match cli.command {
        Command::Pack(args) => args,
        _ => panic!("expected Pack command"),
    }
}

fn blocks() -> Vec<Block> {
    vec![Block::new(10.0, 10.0), Block::new(5.0, 20.0), Block::new(20.0, 5.0)]
}

#[test]
fn sorted_guillotine_layout_fits() {
    let args = pack_args(&["--width", "30", "--height", "40", "--sort", "b.json"]);
    let mut list = blocks();
    let packing = pack::layout(&mut list, &args, 1.0);
    assert!(packing.packed);
    assert!(list.iter().all(|b| b.fit.is_some()));
    assert!(packing.max_w <= 30.0 && packing.max_h <= 40.0);
}

#[test]
fn explicit_spacing_overrides_config() {
    // Unsorted, the 5x20 block only fits when blocks are not padded.
    let args = pack_args(&["--width", "30", "--height", "30", "--spacing", "0", "b.json"]);
    let mut list = blocks();
    assert!(pack::layout(&mut list, &args, 1.0).packed);

    let args = pack_args(&["--width", "30", "--height", "30", "b.json"]);
    let mut list = blocks();
    assert!(!pack::layout(&mut list, &args, 1.0).packed);
}

#[test]
fn shelf_layout_wraps() {
    let args = pack_args(&["--width", "25", "--height", "30", "--shelf", "b.json"]);
    let mut list = blocks();
    let packing = pack::layout(&mut list, &args, 1.0);
    assert!(packing.packed);
    let fits: Vec<_> = list.iter().map(|b| b.fit.map(|f| (f.x, f.y))).collect();
    // The 20x5 block no longer fits beside the first row and wraps under
    // the tallest block of that row.
    assert_eq!(fits, vec![Some((0.0, 0.0)), Some((11.0, 0.0)), Some((0.0, 21.0))]);
    assert_eq!((packing.max_w, packing.max_h), (20.0, 26.0));
}

#[test]
fn config_file_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("meshwork.toml");
    std::fs::write(&path, "[worker]\nminions = 1\n").unwrap();
    let cli = Cli::parse_from(["meshwork", "--config", path.to_str().unwrap(), "serve"]);
    assert_eq!(cli.load_config().unwrap().worker.minions, 1);
}

#[test]
fn demo_table_is_a_valid_mesh() {
    let mesh = demo::table(2).unwrap();
    assert_eq!(mesh.triangle_count(), 5 * 12);
}

#[tokio::test]
async fn demo_runs_against_a_local_worker() {
    let mut config = mcore::MeshworkConfig::default();
    config.worker.minions = 2;
    config.union.chunk = 2;
    demo::run(&config, 2).await.unwrap();
}
