#[tokio::main(flavor = "current_thread")]
async fn main() {
    match streamexec::cli::run().await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("Error: {err:#}");
            std::process::exit(1);
        }
    }
}
