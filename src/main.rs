#[tokio::main]
async fn main() {
  if let Err(e) = tanda_lib::run().await {
    eprintln!("tanda: {}", e);
    std::process::exit(1);
  }
}
