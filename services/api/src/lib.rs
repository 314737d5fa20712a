mod cli;
mod demo;
mod infra;
mod routes;
mod server;

use verifivue::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
