fn main() -> Result<(), Box<dyn std::error::Error>> {
    ponder::cli::main()
}
