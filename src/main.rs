use anyhow::Result;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use walmart_repricer::checkup::RepricingCheckup;
use walmart_repricer::config::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    info!("Starting Walmart repricing checkup");

    let config = AppConfig::from_env()?;
    let checkup = RepricingCheckup::new(&config).await?;

    if let Some(path) = &config.tracked_products_path {
        checkup.seed_products(path).await?;
    }

    // Run once immediately
    if let Err(e) = checkup.run().await {
        error!("Error during initial checkup: {}", e);
    }

    let sched = JobScheduler::new().await?;

    let job_checkup = checkup.clone();
    sched
        .add(Job::new_async(config.checkup_cron.as_str(), move |_uuid, _l| {
            let checkup = job_checkup.clone();
            Box::pin(async move {
                if let Err(e) = checkup.run().await {
                    error!("Error during scheduled checkup: {}", e);
                }
            })
        })?)
        .await?;

    info!("Scheduler started - next checkups on '{}'", config.checkup_cron);
    sched.start().await?;

    // Keep the program running
    loop {
        tokio::time::sleep(tokio::time::Duration::from_secs(30)).await;
    }
}
