fn main() {
    if let Err(err) = hardener::cli::run() {
        hardener::ui::eprintln_error(&err);
        std::process::exit(hardener::exit::exit_code(&err));
    }
}
