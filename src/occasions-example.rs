extern crate dotenv;

use dotenv::dotenv;
use std::error::Error;

use birthdays::calendar::Calendar;
use birthdays::session::AccessToken;
use birthdays::AppConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    dotenv().ok();

    let config = AppConfig::load()?;
    let token = AccessToken::new(std::env::var("GOOGLE_ACCESS_TOKEN")?);

    let calendar = Calendar::from_config(&config.calendar)?;
    let occasions = calendar.occasions(&token).await?;

    for occasion in &occasions {
        println!("{occasion}");
    }

    Ok(())
}
