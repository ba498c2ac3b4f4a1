fn main() -> anyhow::Result<()> {
    certpilot_lib::run()
}
