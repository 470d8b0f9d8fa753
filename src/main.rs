fn main() {
    if let Err(err) = tabular_field_visits::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
