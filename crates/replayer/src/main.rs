#[tokio::main]
async fn main() {
    replayer::start(std::env::args()).await;
}
