fn main() -> Result<(), Box<dyn std::error::Error>> {
    chatline::cli::main()
}
