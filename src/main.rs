fn main() {
    if let Err(err) = thunderpick::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
