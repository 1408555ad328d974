use dbyuml::dsl::Formatters;
use dbyuml::models::config::DiagramConfig;
use dbyuml::DbYuml;
use std::env;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::init();

    let database_url = env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?;
    let config = DiagramConfig::from_env()?;

    let mut diagram = DbYuml::connect(&database_url, config, Formatters::default()).await?;
    let dsl_text = diagram.dsl_text().await?;

    for query in diagram.executed_queries() {
        log::debug!("{} ({} rows, {:?})", query.label, query.row_count, query.duration);
    }

    println!("{}", dsl_text);
    eprintln!("POST as dsl_text to {}", diagram.endpoint().diagram_url());

    Ok(())
}
