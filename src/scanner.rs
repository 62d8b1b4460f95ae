use std::collections::HashSet;
use std::time::Duration;

use anyhow::{Context, Result};
use btleplug::api::{Central as _, CentralEvent, Peripheral as _, ScanFilter};
use futures::StreamExt as _;
use log::{info, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::ScanConfig;
use crate::messages::{DiscoveredDevice, RenderRequest};

/// Exact-equality denylist check. Advertised names are compared as-is; a
/// near-match like "HC-05 " (trailing space) is not a skimmer.
pub fn is_skimmer(name: &str, denylist: &HashSet<String>) -> bool {
    denylist.contains(name)
}

/// Bounded-duration device discovery. The production impl wraps a BLE
/// adapter; tests script the results.
pub trait Radio {
    async fn discover(&self, duration: Duration) -> Result<Vec<DiscoveredDevice>>;
}

pub struct BtleplugRadio {
    adapter: btleplug::platform::Adapter,
}

impl BtleplugRadio {
    pub fn new(adapter: btleplug::platform::Adapter) -> Self {
        BtleplugRadio { adapter }
    }
}

impl Radio for BtleplugRadio {
    async fn discover(&self, duration: Duration) -> Result<Vec<DiscoveredDevice>> {
        let mut events = self.adapter.events().await?;
        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .context("failed to start BLE scan")?;

        // A device can advertise its name in a later event than the one that
        // discovered it, so keep upserting until the window closes.
        let mut seen: Vec<DiscoveredDevice> = Vec::new();
        let deadline = tokio::time::sleep(duration);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => break,
                event = events.next() => match event {
                    Some(CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id)) => {
                        let peripheral = self.adapter.peripheral(&id).await?;
                        let Some(properties) = peripheral.properties().await? else {
                            continue;
                        };
                        let address = properties.address.to_string();
                        match seen.iter_mut().find(|device| device.address == address) {
                            Some(device) => {
                                if properties.local_name.is_some() {
                                    device.name = properties.local_name;
                                }
                            }
                            None => seen.push(DiscoveredDevice {
                                address,
                                name: properties.local_name,
                            }),
                        }
                    }
                    Some(_) => {}
                    None => break,
                },
            }
        }

        self.adapter
            .stop_scan()
            .await
            .context("failed to stop BLE scan")?;
        Ok(seen)
    }
}

pub struct Scanner<R> {
    radio: R,
    config: ScanConfig,
    renderer: mpsc::Sender<RenderRequest>,
}

impl<R: Radio> Scanner<R> {
    pub fn new(radio: R, config: ScanConfig, renderer: mpsc::Sender<RenderRequest>) -> Self {
        Scanner {
            radio,
            config,
            renderer,
        }
    }

    /// Scan, alert on matches, sleep, repeat. Discovery errors are not
    /// recovered here; they end the loop and the supervisor takes over.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        loop {
            self.renderer
                .send(RenderRequest::Status { frame: "..." })
                .await
                .context("render channel closed")?;

            let devices = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                devices = self.radio.discover(self.config.scan_duration()) => devices?,
            };

            info!("Found {} devices", devices.len());

            for device in &devices {
                let Some(name) = device.name.as_deref() else {
                    continue;
                };
                if !is_skimmer(name, &self.config.skimmer_names) {
                    continue;
                }
                warn!("Potential skimmer {} at {}", name, device.address);
                self.renderer
                    .send(RenderRequest::SkimmerAlert {
                        name: name.to_string(),
                    })
                    .await
                    .context("render channel closed")?;
                // Hold each alert for the full duration, one after another.
                tokio::select! {
                    _ = cancel.cancelled() => return Ok(()),
                    _ = tokio::time::sleep(self.config.skimmer_alert_duration()) => {}
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(self.config.scan_interval()) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    fn denylist() -> HashSet<String> {
        ["HC-05", "HC-03", "HC-06"]
            .iter()
            .map(|name| name.to_string())
            .collect()
    }

    fn config() -> ScanConfig {
        ScanConfig {
            skimmer_names: denylist(),
            scan_duration_seconds: Some(10),
            scan_interval_seconds: Some(5),
            skimmer_alert_duration_seconds: Some(5),
        }
    }

    fn device(address: &str, name: &str) -> DiscoveredDevice {
        DiscoveredDevice {
            address: address.to_string(),
            name: Some(name.to_string()),
        }
    }

    #[test]
    fn denylisted_names_match() {
        let names = denylist();
        assert!(is_skimmer("HC-05", &names));
        assert!(is_skimmer("HC-03", &names));
        assert!(is_skimmer("HC-06", &names));
    }

    #[test]
    fn near_matches_are_not_skimmers() {
        let names = denylist();
        assert!(!is_skimmer("HC-05 ", &names));
        assert!(!is_skimmer(" HC-05", &names));
        assert!(!is_skimmer("hc-05", &names));
        assert!(!is_skimmer("HC-0", &names));
        assert!(!is_skimmer("Generic Speaker", &names));
    }

    struct FakeRadio {
        devices: Vec<DiscoveredDevice>,
    }

    impl Radio for FakeRadio {
        async fn discover(&self, duration: Duration) -> Result<Vec<DiscoveredDevice>> {
            tokio::time::sleep(duration).await;
            Ok(self.devices.clone())
        }
    }

    async fn collect_requests(
        rx: &mut mpsc::Receiver<RenderRequest>,
        n: usize,
    ) -> Vec<RenderRequest> {
        let mut requests = Vec::with_capacity(n);
        while requests.len() < n {
            requests.push(rx.recv().await.expect("scanner hung up"));
        }
        requests
    }

    #[tokio::test(start_paused = true)]
    async fn matching_device_triggers_exactly_one_alert() {
        let (tx, mut rx) = mpsc::channel(16);
        let radio = FakeRadio {
            devices: vec![device("AA:BB", "HC-05"), device("CC:DD", "Generic Speaker")],
        };
        let cancel = CancellationToken::new();
        let task = tokio::spawn(Scanner::new(radio, config(), tx).run(cancel.clone()));

        // Banner, alert, then the next iteration's banner.
        let requests = collect_requests(&mut rx, 3).await;
        assert_eq!(requests[0], RenderRequest::Status { frame: "..." });
        assert_eq!(
            requests[1],
            RenderRequest::SkimmerAlert {
                name: "HC-05".to_string()
            }
        );
        assert_eq!(requests[2], RenderRequest::Status { frame: "..." });

        cancel.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn each_match_holds_the_alert_for_the_full_duration() {
        let (tx, mut rx) = mpsc::channel(16);
        let radio = FakeRadio {
            devices: vec![device("AA:BB", "HC-05"), device("CC:DD", "HC-06")],
        };
        let cancel = CancellationToken::new();
        let start = Instant::now();
        let task = tokio::spawn(Scanner::new(radio, config(), tx).run(cancel.clone()));

        let requests = collect_requests(&mut rx, 4).await;
        assert_eq!(
            requests[1],
            RenderRequest::SkimmerAlert {
                name: "HC-05".to_string()
            }
        );
        assert_eq!(
            requests[2],
            RenderRequest::SkimmerAlert {
                name: "HC-06".to_string()
            }
        );
        // Scan (10s) + two alert holds (2 x 5s) + inter-scan sleep (5s).
        assert_eq!(start.elapsed(), Duration::from_secs(25));

        cancel.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn empty_scan_goes_straight_to_the_interval_sleep() {
        let (tx, mut rx) = mpsc::channel(16);
        let radio = FakeRadio { devices: vec![] };
        let cancel = CancellationToken::new();
        let start = Instant::now();
        let task = tokio::spawn(Scanner::new(radio, config(), tx).run(cancel.clone()));

        let requests = collect_requests(&mut rx, 2).await;
        assert!(
            requests
                .iter()
                .all(|request| matches!(request, RenderRequest::Status { .. }))
        );
        // Scan (10s) + inter-scan sleep (5s), no alert hold.
        assert_eq!(start.elapsed(), Duration::from_secs(15));

        cancel.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn nameless_devices_never_alert() {
        let (tx, mut rx) = mpsc::channel(16);
        let radio = FakeRadio {
            devices: vec![DiscoveredDevice {
                address: "EE:FF".to_string(),
                name: None,
            }],
        };
        let cancel = CancellationToken::new();
        let start = Instant::now();
        let task = tokio::spawn(Scanner::new(radio, config(), tx).run(cancel.clone()));

        let requests = collect_requests(&mut rx, 2).await;
        assert!(
            requests
                .iter()
                .all(|request| matches!(request, RenderRequest::Status { .. }))
        );
        assert_eq!(start.elapsed(), Duration::from_secs(15));

        cancel.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_scans_behave_identically() {
        let (tx, mut rx) = mpsc::channel(16);
        let radio = FakeRadio {
            devices: vec![device("AA:BB", "HC-05"), device("CC:DD", "Generic Speaker")],
        };
        let cancel = CancellationToken::new();
        let task = tokio::spawn(Scanner::new(radio, config(), tx).run(cancel.clone()));

        // Two full iterations: banner + alert each time.
        let requests = collect_requests(&mut rx, 4).await;
        assert_eq!(requests[..2], requests[2..]);

        cancel.cancel();
        task.await.unwrap().unwrap();
    }
}
