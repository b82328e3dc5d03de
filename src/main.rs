#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = aula::run().await {
        eprintln!("aula fatal: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}
