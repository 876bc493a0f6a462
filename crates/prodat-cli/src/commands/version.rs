use anyhow::Result;

pub fn run() -> Result<()> {
    println!("prodat version: {}", env!("CARGO_PKG_VERSION"));
    Ok(())
}
