use crate::manager::RoomManager;
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};

/// Periodically deletes rooms that have been idle for longer than the configured age.
/// Runs until the task is aborted.
pub async fn sweep_idle_rooms_task(manager: Arc<RoomManager>, every: Duration) {
    info!(
        "Starting background task to sweep idle rooms every {}s...",
        every.as_secs()
    );
    let mut interval = interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await; // Wait for the next interval tick

        match manager.sweep_idle_rooms().await {
            Ok(0) => {}
            Ok(removed) => info!("Swept {} idle room(s).", removed),
            Err(e) => error!("Failed to sweep idle rooms: {}", e),
        }
    }
}
