fn main() {
    if let Err(err) = docsign_lib::run() {
        eprintln!("docsign: {err}");
        std::process::exit(1);
    }
}
