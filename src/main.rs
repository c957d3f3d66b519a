fn main() {
    if let Err(err) = volvault::cli::run() {
        println!("{:#}", err);
        std::process::exit(1);
    }
}
