//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

fn main() {
    env_logger::init();
    if let Err(err) = tourguide_cli::run() {
        eprintln!("tourguide: {err}");
        std::process::exit(1);
    }
}
