use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::sync::Arc;

mod auth;
mod availability;
mod balance;
mod config;
mod deletion;
mod error;
mod exchange;
mod ledger;
mod membership;
mod mongo;
mod notify;
mod routes;
mod schemas;
mod store;

use config::AppConfig;
use mongo::MongoStore;
use notify::{LogNotifier, Notifier};
use store::{MemoryStore, Store};

async fn open_store(config: &AppConfig) -> std::io::Result<Arc<dyn Store>> {
    match &config.mongodb_uri {
        Some(uri) => {
            let store = MongoStore::connect(uri, &config.database_name)
                .await
                .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err))?;
            log::info!("Connected to MongoDB database {}", config.database_name);
            Ok(Arc::new(store))
        }
        None => {
            log::warn!("MONGODB_URI is not set, records are kept in memory only");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = AppConfig::from_env()
        .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidInput, err))?;
    let store = open_store(&config).await?;
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);

    let address = (config.bind_address.clone(), config.port);
    log::info!("Listening on {}:{}", address.0, address.1);

    let config = web::Data::new(config);
    let store = web::Data::from(store);
    let notifier = web::Data::from(notifier);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(Cors::permissive())
            .app_data(config.clone())
            .app_data(store.clone())
            .app_data(notifier.clone())
            .configure(routes::init_routes)
    })
    .bind(address)?
    .run()
    .await
}
