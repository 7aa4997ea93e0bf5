mod cli;
mod infra;
mod routes;
mod server;

use cosmetic_ranker::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
