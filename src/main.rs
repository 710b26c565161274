mod app;
mod attach;
mod config;
mod delivery;
mod order;
mod script;
mod seed;
mod session;
mod store;
mod tui;

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use clap::Parser;

use app::App;
use config::Config;
use delivery::emailjs::EmailJsClient;
use seed::Seed;
use tui::Tui;

#[derive(Parser, Debug)]
#[command(author, version, about = "Auto-mate: find the right automotive part by chat", long_about = None)]
struct Cli {
    #[arg(short, long, help = "Enable debug logging")]
    debug: bool,
    #[arg(short, long, help = "What part are you looking for?")]
    query: Option<String>,
    #[arg(long, help = "JSON array of {name,size,type} file descriptors")]
    files: Option<String>,
    #[arg(long, conflicts_with_all = ["query", "files"], help = "URL-encoded search parameters, e.g. 'query=radiator&files=[...]'")]
    params: Option<String>,
}

impl Cli {
    fn seed(&self) -> Seed {
        match &self.params {
            Some(raw) => Seed::from_query_string(raw),
            None => Seed::parse(self.query.as_deref(), self.files.as_deref()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load();

    let debug_enabled = cli.debug || config.debug.unwrap_or(false);
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if debug_enabled { "debug" } else { "info" })
    ).init();

    log::info!("Auto-mate starting...");
    log::debug!("CLI args: {:?}", cli);

    let seed = cli.seed();
    log::debug!("Search seed: {:?}", seed);

    let delivery = Arc::new(EmailJsClient::new(&config.emailjs));
    let mut app = App::new(&config, seed, delivery, Instant::now());

    let mut tui = Tui::new()?;
    tui.run_loop(&mut app).await?;
    app.drain_delivery().await;

    log::info!("Application finished.");
    Ok(())
}
