//! Administrative front end for the local RAG backend.

use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout = io::stdout().lock();
    let mut stderr = io::stderr().lock();
    ragcli::run_admin(std::env::args_os(), &mut stdout, &mut stderr)
}
