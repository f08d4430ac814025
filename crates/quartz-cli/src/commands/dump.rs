use std::path::PathBuf;

use quartz_bytecode::dump_unit;
use quartz_core::Colors;

use super::unit_loader::load_unit;

pub struct DumpArgs {
    pub unit_path: PathBuf,
    pub color: bool,
}

pub fn run(args: DumpArgs) {
    let unit = load_unit(&args.unit_path).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        std::process::exit(1);
    });

    match dump_unit(&unit, Colors::new(args.color)) {
        Ok(text) => print!("{text}"),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}
