fn main() {
    microtest::cli::run();
}
