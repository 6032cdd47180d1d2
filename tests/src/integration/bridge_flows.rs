//! # Bridge Flows
//!
//! The whole runtime: `BridgeContainer` with the output router as sink and
//! the simulated device answering on the in-memory broker.

#[cfg(test)]
mod tests {
    use mb_01_rpc_correlation::RpcApi;
    use mb_02_liveness_monitor::{LivenessApi, LivenessState};
    use mos_telemetry::RPC_OUTPUTS;
    use node_runtime::adapters::{OutputRouter, RoutedEvent};
    use node_runtime::container::{BridgeConfig, BridgeContainer};
    use serde_json::json;
    use shared_bus::{InMemoryBroker, TokioClock};
    use shared_types::{codes, NodeOutput, NodeStatus, OutputKind};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;

    use crate::fixtures::settle;

    struct Bridge {
        broker: Arc<InMemoryBroker>,
        container: BridgeContainer,
        events: UnboundedReceiver<RoutedEvent>,
    }

    impl Bridge {
        fn start(watchdog_secs: u64) -> Self {
            let mut config = BridgeConfig::default();
            config.identity.self_id = "n1".into();
            config.identity.device_id = "esp32_1A2B".into();
            config.rpc.services = vec!["Temp".into(), "Sys".into()];
            config.rpc.timeout_ms = 2_000;
            config.liveness.watchdog_secs = watchdog_secs;
            config.simulator.enabled = true;
            config.simulator.heartbeat_interval_ms = 1_000;

            let broker = Arc::new(InMemoryBroker::new());
            let (router, events) = OutputRouter::new();
            let container = BridgeContainer::start(
                &config,
                broker.clone(),
                Arc::new(router),
                Arc::new(TokioClock::new()),
            )
            .unwrap();
            Self {
                broker,
                container,
                events,
            }
        }

        fn drain(&mut self) -> Vec<RoutedEvent> {
            let mut out = Vec::new();
            while let Ok(event) = self.events.try_recv() {
                out.push(event);
            }
            out
        }

        fn outputs(&mut self, kind: OutputKind) -> Vec<NodeOutput> {
            self.drain()
                .into_iter()
                .filter_map(|e| match e {
                    RoutedEvent::Output(o) if o.kind == kind => Some(o),
                    _ => None,
                })
                .collect()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_then_read_through_simulator() {
        let mut bridge = Bridge::start(5);
        settle().await;
        bridge.drain();

        let temp = bridge.container.service("Temp").unwrap();
        temp.write(json!({"setpoint": 21})).await.unwrap();
        settle().await;
        temp.read().await.unwrap();
        settle().await;

        let successes = bridge.outputs(OutputKind::Success);
        let rpc: Vec<&NodeOutput> = successes
            .iter()
            .filter(|o| o.node_id == "esp32_1A2B/Temp")
            .collect();
        assert_eq!(rpc.len(), 2);
        assert_eq!(rpc[0].topic, "Temp.Write");
        assert_eq!(rpc[1].topic, "Temp.Read");
        assert_eq!(rpc[1].payload, json!({"setpoint": 21}));
        assert_eq!(bridge.container.pending_total().await, 0);

        bridge.container.shutdown().await;
        assert!(bridge.broker.registry().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_method_is_a_remote_error() {
        let mut bridge = Bridge::start(0);
        settle().await;
        bridge.drain();
        let errors_before = RPC_OUTPUTS.with_label_values(&["error"]).get();

        let sys = bridge.container.service("Sys").unwrap();
        sys.call("Reboot", json!({})).await.unwrap();
        settle().await;

        // other tests share the global counter, so only a lower bound holds
        assert!(RPC_OUTPUTS.with_label_values(&["error"]).get() >= errors_before + 1.0);

        let errors = bridge.outputs(OutputKind::Error);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code(), Some(codes::REMOTE_ERROR));
        assert_eq!(errors[0].payload["error"]["code"], json!(404));
        bridge.container.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeats_drive_liveness() {
        let mut bridge = Bridge::start(2);
        settle().await;

        assert_eq!(
            bridge.container.liveness().query().await.unwrap(),
            LivenessState::Online
        );
        let indicators: Vec<RoutedEvent> = bridge
            .drain()
            .into_iter()
            .filter(|e| matches!(e, RoutedEvent::Status { .. }))
            .collect();
        assert!(indicators.contains(&RoutedEvent::Status {
            node_id: "esp32_1A2B/liveness".into(),
            status: NodeStatus::online(),
        }));

        bridge.container.simulator().unwrap().set_heartbeats(false);
        for _ in 0..4 {
            tokio::time::advance(Duration::from_millis(1_000)).await;
            settle().await;
        }
        assert_eq!(
            bridge.container.liveness().query().await.unwrap(),
            LivenessState::Offline
        );
        let online: Vec<Option<bool>> = bridge
            .outputs(OutputKind::Online)
            .iter()
            .map(|o| o.payload["online"].as_bool())
            .collect();
        assert_eq!(online, vec![Some(false)]);

        bridge.container.simulator().unwrap().set_heartbeats(true);
        tokio::time::advance(Duration::from_millis(1_000)).await;
        settle().await;
        assert_eq!(
            bridge.container.liveness().query().await.unwrap(),
            LivenessState::Online
        );
        bridge.container.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_muted_device_times_out() {
        let mut bridge = Bridge::start(0);
        settle().await;
        bridge.drain();

        bridge.container.simulator().unwrap().set_replies(false);
        let temp = bridge.container.service("Temp").unwrap();
        temp.read().await.unwrap();
        assert_eq!(bridge.container.pending_total().await, 1);

        for _ in 0..2 {
            tokio::time::advance(Duration::from_millis(1_000)).await;
            settle().await;
        }

        let errors = bridge.outputs(OutputKind::Error);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code(), Some(codes::TIMEOUT));
        assert_eq!(bridge.container.pending_total().await, 0);
        bridge.container.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_update_reaches_engine() {
        let mut bridge = Bridge::start(0);
        settle().await;
        bridge.drain();

        bridge
            .container
            .simulator()
            .unwrap()
            .publish_update("Temp", json!({"temp": 22}))
            .unwrap();
        settle().await;

        let successes = bridge.outputs(OutputKind::Success);
        assert!(successes
            .iter()
            .any(|o| o.topic == "Temp.Update" && o.payload == json!({"temp": 22})));
        bridge.container.shutdown().await;
    }
}
