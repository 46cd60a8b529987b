#![forbid(unsafe_code)]

fn main() {
    if let Err(error) = activity_viewer::cli::run_from_env() {
        eprintln!("{error}");
        std::process::exit(1);
    }
}
