fn main() {
    if let Err(err) = gcpj_migrate::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
