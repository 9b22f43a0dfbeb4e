//! Pacing behaviour of the window monitor over several intervals

use std::sync::{Arc, Mutex};
use std::time::Duration;

use msgate_core::domain::{FlightKey, OutboundMessage, WindowId};
use msgate_core::ports::IDispatchHandler;
use msgate_window::{DeliveryWindowManager, WindowMonitor};
use tokio_util::sync::CancellationToken;

/// Records deliveries and fails for one chosen recipient
#[derive(Default)]
struct FlakyHandler {
    delivered: Mutex<Vec<(String, String)>>,
    refuse: Option<String>,
}

#[async_trait::async_trait]
impl IDispatchHandler for FlakyHandler {
    async fn handle(
        &self,
        window_id: &WindowId,
        _flight_key: &FlightKey,
        message: &OutboundMessage,
    ) -> anyhow::Result<()> {
        if self.refuse.as_deref() == Some(message.to_addr.as_str()) {
            anyhow::bail!("recipient {} refused", message.to_addr);
        }
        self.delivered
            .lock()
            .unwrap()
            .push((window_id.to_string(), message.to_addr.clone()));
        Ok(())
    }
}

async fn run_for(monitor: WindowMonitor, duration: Duration) {
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(monitor.run(shutdown.clone()));
    tokio::time::sleep(duration).await;
    shutdown.cancel();
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn windows_drain_independently_in_order() {
    let manager = Arc::new(DeliveryWindowManager::new(2, Duration::from_secs(100)));
    let handler = Arc::new(FlakyHandler::default());

    let a = WindowId::new("conv-a").unwrap();
    let b = WindowId::new("conv-b").unwrap();
    for (id, prefix) in [(&a, "a"), (&b, "b")] {
        manager.create_window(id, false).unwrap();
        for i in 1..=5 {
            manager
                .add(id, OutboundMessage::new(format!("{prefix}{i}"), None))
                .unwrap();
        }
    }

    let monitor = WindowMonitor::new(manager.clone(), handler.clone(), Duration::from_secs(1), false);
    run_for(monitor, Duration::from_millis(3500)).await;

    let delivered = handler.delivered.lock().unwrap().clone();
    let for_window = |w: &str| -> Vec<String> {
        delivered
            .iter()
            .filter(|(window, _)| window == w)
            .map(|(_, to)| to.clone())
            .collect()
    };
    assert_eq!(for_window("conv-a"), vec!["a1", "a2", "a3", "a4", "a5"]);
    assert_eq!(for_window("conv-b"), vec!["b1", "b2", "b3", "b4", "b5"]);

    assert_eq!(manager.stats(&a).unwrap().delivered, 5);
    assert!(manager.is_window_empty(&b).unwrap());
}

#[tokio::test(start_paused = true)]
async fn failing_entry_expires_without_blocking_others() {
    let manager = Arc::new(DeliveryWindowManager::new(1, Duration::from_secs(3)));
    let handler = Arc::new(FlakyHandler {
        refuse: Some("bad".to_string()),
        ..FlakyHandler::default()
    });

    let id = WindowId::new("conv").unwrap();
    manager.create_window(&id, false).unwrap();
    for to in ["bad", "good"] {
        manager.add(&id, OutboundMessage::new(to, None)).unwrap();
    }

    let monitor = WindowMonitor::new(manager.clone(), handler.clone(), Duration::from_secs(1), true);
    run_for(monitor, Duration::from_millis(5500)).await;

    let delivered = handler.delivered.lock().unwrap().clone();
    assert_eq!(delivered, vec![("conv".to_string(), "good".to_string())]);
    // Cleanup removed the window once both entries were settled
    assert!(manager.window_ids().is_empty());
}
