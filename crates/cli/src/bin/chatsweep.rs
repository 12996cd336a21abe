//! chatsweep CLI binary entrypoint.

fn main() {
    if let Err(err) = chatsweep_cli::app::run() {
        eprintln!("{}", err);
        std::process::exit(1);
    }
}
