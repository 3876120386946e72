use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use slotwise::booking::BookingService;
use slotwise::config::Config;
use slotwise::planner::format_slots;
use slotwise::store::{Datastore, InMemoryStore, Seed};
use slotwise::timeline::{date_of, local_now_ms};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    slotwise::observability::init(config.metrics_port);

    let seed = match &config.seed_path {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path).await?;
            serde_json::from_str::<Seed>(&raw)?
        }
        None => {
            warn!("SLOTWISE_SEED not set, starting with an empty store");
            Seed::default()
        }
    };
    info!("slotwise availability report");
    info!("  step: {} min", config.planner.step_minutes);
    info!("  days: {}", config.planner.upcoming_days);
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    let store = Arc::new(InMemoryStore::from_seed(seed));
    let service = BookingService::new(store.clone(), config.planner);

    let now = local_now_ms();
    let today = date_of(now);
    let staff = store.list_staff().await?;
    let offerings = store.list_services().await?;

    for member in &staff {
        let who = member.full_name.as_deref().unwrap_or(&member.email);
        for offering in &offerings {
            let panel = service
                .upcoming_slots(member.id, offering.id, today, now)
                .await?;
            println!("{who} / {} ({} min)", offering.name, offering.duration_minutes);
            if panel.is_empty() {
                println!("  no free slots");
            }
            for day in &panel {
                println!("  {}  {}", day.date.format("%a %d.%m"), format_slots(&day.slots).join(" "));
            }
        }
    }

    Ok(())
}
