//! # Liveness Flows
//!
//! Monitor task ↔ in-memory broker ↔ heartbeats published by the test.
//!
//! 1. **Never heard**: Offline exactly once after `interval + 1` seconds
//! 2. **Edge-triggered**: repeated heartbeats report Online once
//! 3. **Disabled watchdog**: heartbeats still produce Online, never Offline
//! 4. **Both channels**: SysInfo and Info each refresh the deadline

#[cfg(test)]
mod tests {
    use mb_02_liveness_monitor::{LivenessApi, LivenessState};
    use serde_json::json;
    use shared_types::OutputKind;
    use std::time::Duration;

    use crate::fixtures::{settle, Rig};

    async fn advance_ms(ms: u64) {
        tokio::time::advance(Duration::from_millis(ms)).await;
        settle().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_device_goes_offline_once() {
        let rig = Rig::new();
        let (monitor, _task) = rig.spawn_monitor(4);
        settle().await;

        advance_ms(4_900).await;
        assert_eq!(monitor.query().await.unwrap(), LivenessState::Unknown);

        advance_ms(200).await;
        assert_eq!(monitor.query().await.unwrap(), LivenessState::Offline);

        advance_ms(60_000).await;
        assert_eq!(monitor.query().await.unwrap(), LivenessState::Offline);
        assert_eq!(rig.online_events(), vec![Some(false)]);

        rig.sysinfo(r#"{"uptime":1}"#);
        settle().await;
        assert_eq!(monitor.query().await.unwrap(), LivenessState::Online);
        assert_eq!(rig.online_events(), vec![Some(false), Some(true)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_heartbeats_report_online_once() {
        let rig = Rig::new();
        let (monitor, _task) = rig.spawn_monitor(10);
        settle().await;

        for uptime in 0..5 {
            rig.sysinfo(&json!({ "uptime": uptime }).to_string());
            settle().await;
            advance_ms(1_000).await;
        }

        assert_eq!(rig.online_events(), vec![Some(true)]);
        assert_eq!(rig.of_kind(OutputKind::Success).len(), 5);
        assert_eq!(monitor.stats().sysinfo_heartbeats, 5);
        assert_eq!(monitor.stats().online_transitions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_watchdog_never_offline() {
        let rig = Rig::new();
        let (monitor, _task) = rig.spawn_monitor(2);
        settle().await;

        rig.info(r#"{"fw":"1.0"}"#);
        settle().await;
        monitor.set_watchdog(json!(0)).await.unwrap();

        advance_ms(120_000).await;
        assert_eq!(monitor.query().await.unwrap(), LivenessState::Online);
        assert_eq!(rig.online_events(), vec![Some(true)]);

        // re-enabling restarts the deadline from now
        monitor.set_watchdog(json!("1")).await.unwrap();
        advance_ms(2_100).await;
        assert_eq!(monitor.query().await.unwrap(), LivenessState::Offline);
    }

    #[tokio::test(start_paused = true)]
    async fn test_either_channel_refreshes_deadline() {
        let rig = Rig::new();
        let (monitor, _task) = rig.spawn_monitor(1);
        settle().await;

        // deadline is 2s; alternate channels every 1.5s
        for i in 0..6 {
            if i % 2 == 0 {
                rig.sysinfo(r#"{"uptime":1}"#);
            } else {
                rig.info(r#"{"fw":"1.0"}"#);
            }
            // the monitor stamps the heartbeat before time moves on
            settle().await;
            advance_ms(1_500).await;
            assert_eq!(monitor.query().await.unwrap(), LivenessState::Online);
        }

        advance_ms(600).await;
        assert_eq!(monitor.query().await.unwrap(), LivenessState::Offline);
        assert_eq!(rig.online_events(), vec![Some(true), Some(false)]);

        let stats = monitor.stats();
        assert_eq!(stats.sysinfo_heartbeats, 3);
        assert_eq!(stats.info_heartbeats, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_undecodable_heartbeat_still_counts() {
        let rig = Rig::new();
        let (monitor, _task) = rig.spawn_monitor(3);
        settle().await;

        rig.sysinfo("garbage");
        settle().await;

        assert_eq!(monitor.query().await.unwrap(), LivenessState::Online);
        assert!(rig.of_kind(OutputKind::Success).is_empty());
        assert_eq!(monitor.stats().malformed_heartbeats, 1);
    }
}
