fn main() {
    if let Err(err) = csv_import_kit::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
