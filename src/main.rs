//! Imgclas CLI entry point.

#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

fn main() {
    if let Err(e) = imgclas::run() {
        eprintln!("error: {e}");
        std::process::exit(e.kind().exit_code());
    }
}
