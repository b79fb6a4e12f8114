fn main() -> anyhow::Result<()> {
    iosoak_runner::cli::execute()
}
