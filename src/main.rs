use log::error;

use pollcast::config::Config;
use pollcast::db::Database;
use pollcast::engine::VoteEngine;
use pollcast::gateway::Gateway;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = Config::load();

    let database = match Database::new(&config.database_url).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return;
        }
    };

    let engine = VoteEngine::new(database, config.store_timeout);
    let gateway = Gateway::new(engine);

    if let Err(e) = gateway.run(&config.bind_addr).await {
        error!("Gateway error: {}", e);
    }
}
