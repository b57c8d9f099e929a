#[tokio::main]
async fn main() {
    if let Err(e) = his_core::run().await {
        eprintln!("his-server: {e}");
        std::process::exit(1);
    }
}
