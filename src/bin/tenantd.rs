fn main() -> anyhow::Result<()> {
    tenantd_cmd::cmd::run()?;
    Ok(())
}
