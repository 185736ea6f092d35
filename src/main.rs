fn main() -> anyhow::Result<()> {
    let code = meteor_host::cli::run_cli()?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
