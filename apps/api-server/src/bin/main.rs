use api_server::start_server;

#[tokio::main]
async fn main() {
    if let Err(e) = start_server().await {
        eprintln!("Error starting server: {:?}", e);
        std::process::exit(1);
    }
}
