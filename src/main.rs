use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Parser;
use simple_error::bail;

use tm_compiler::compile;

/// Compiles a C-Minus source file into TM assembly.
#[derive(Parser, Debug)]
#[clap(name = "tm_compiler", about = "Compiles C-Minus source into TM assembly")]
struct Cli {
    /// Path to the source file to compile
    source: PathBuf,

    /// Dump the symbol table once it has been built
    #[clap(long)]
    trace_analyze: bool,

    /// Interleave construct-boundary comments in the generated listing
    #[clap(long)]
    trace_code: bool,

    /// Where to write the TM listing (defaults to the source path with its
    /// extension replaced by `.tm`)
    #[clap(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let source = match fs::read_to_string(&cli.source) {
        Ok(source) => source,
        Err(error) => bail!("{}: {}", cli.source.display(), error),
    };

    let outcome = compile(&source, cli.trace_analyze, cli.trace_code);
    print!("{}", outcome.listing.render());

    if outcome.has_errors() {
        std::process::exit(exitcode::DATAERR);
    }

    let output_path = cli.output.unwrap_or_else(|| cli.source.with_extension("tm"));
    fs::write(&output_path, &outcome.code)?;

    std::process::exit(exitcode::OK);
}
