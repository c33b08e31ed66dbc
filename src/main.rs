fn main() {
    if let Err(err) = retail_insights::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
