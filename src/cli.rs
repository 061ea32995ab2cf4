use std::path::PathBuf;

use clap::Parser;

/// `pcl [-O] <input_file>` or `pcl [-O] [-i|-f]`
///
/// With an input file, LLVM IR goes to `<base>.imm` and target assembly to
/// `<base>.asm`. Without one, the program is read from standard input and
/// `-i` or `-f` selects what is written to standard output.
#[derive(Debug, Parser)]
#[command(version, about = None, long_about = None)]
pub struct Args {
    /// Source code input file; standard input if omitted
    pub input_file: Option<PathBuf>,

    /// Run the fixed optimization pipeline over the generated code
    #[arg(short = 'O')]
    pub optimize: bool,

    /// Write LLVM IR to standard output
    #[arg(short = 'i', conflicts_with = "final_code")]
    pub intermediate: bool,

    /// Write target assembly to standard output
    #[arg(short = 'f')]
    pub final_code: bool,
}
