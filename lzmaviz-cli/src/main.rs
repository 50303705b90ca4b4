//! lzmaviz - see where the entropy in an LZMA file lives.
//!
//! Decodes a .lzma file and colours every decoded byte by the number of
//! range-coder bits that were spent producing it: cheap match copies stay
//! dark, expensive literals light up.

mod gradient;
mod render;

use clap::Parser;
use render::RenderOptions;
use std::fs::File;
use std::io::{self, BufReader, IsTerminal, Write};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "lzmaviz")]
#[command(version, about = "Terminal LZMA entropy visualiser")]
#[command(long_about = "\
Decodes an LZMA file and renders each decoded byte coloured by its
information cost: the number of range-coder bits spent producing it.
Literals pay their own way; match copies spread one packet's cost over
every byte they emit.

Examples:
  lzmaviz file.lzma
  lzmaviz --jet file.lzma
  lzmaviz --lits file.lzma
  lzmaviz --raw file.lzma > heat.txt
")]
struct Cli {
    /// Print normalised per-byte heat values, one per line, without colour
    #[arg(long)]
    raw: bool,

    /// Use the five-point heatmap gradient instead of viridis
    #[arg(long)]
    jet: bool,

    /// Colour bytes by literal/copy origin instead of heat
    #[arg(long)]
    lits: bool,

    /// LZMA file to decode
    file: PathBuf,
}

fn main() {
    env_logger::init();

    let cli = Cli::try_parse().unwrap_or_else(|err| {
        let _ = err.print();
        process::exit(if err.use_stderr() { 1 } else { 0 });
    });

    let file = File::open(&cli.file).unwrap_or_else(|err| {
        eprintln!("Error: cannot open {}: {}", cli.file.display(), err);
        process::exit(1);
    });

    let decoded = lzmaviz_lzma::decode(BufReader::new(file)).unwrap_or_else(|err| {
        eprintln!("Error: {}", err);
        process::exit(1);
    });

    if decoded.corrupted {
        eprintln!("warning: LZMA stream is corrupted");
    }

    let stdout = io::stdout();
    let opts = RenderOptions {
        // Without a terminal there is nobody to see colours.
        raw: cli.raw || !stdout.is_terminal(),
        jet: cli.jet,
        literals: cli.lits,
    };

    let mut out = stdout.lock();
    if let Err(err) = render::render(&mut out, &decoded, &opts) {
        if err.kind() != io::ErrorKind::BrokenPipe {
            eprintln!("Error: {}", err);
            process::exit(1);
        }
    }
    let _ = out.flush();
}
