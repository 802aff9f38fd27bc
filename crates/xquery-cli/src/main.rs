fn main() {
    if let Err(error) = xquery_cli::run() {
        tracing::error!(%error, "xqcore failed");
        std::process::exit(1);
    }
}
