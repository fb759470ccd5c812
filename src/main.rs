fn main() {
    if let Err(err) = usage_series::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
