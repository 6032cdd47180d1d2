//! # RPC Correlation Flows
//!
//! Engine task ↔ in-memory broker ↔ a hand-driven device.
//!
//! 1. **Request → reply**: exactly one success, table empty afterwards
//! 2. **Disconnect**: one 503 per pending entry at the next sweep
//! 3. **Timeout**: 408 after the configured age, late reply is a 412 warning
//! 4. **Isolation**: engines for different services never see each other's
//!    replies

#[cfg(test)]
mod tests {
    use mb_01_rpc_correlation::RpcApi;
    use serde_json::json as j;
    use shared_types::{codes, OutputKind};
    use std::time::Duration;

    use crate::fixtures::{json, next_request, settle, Rig, DEVICE, SELF_ID};

    #[tokio::test(start_paused = true)]
    async fn test_read_reply_delivers_one_success() {
        let rig = Rig::new();
        let mut device = rig.device_requests();
        let (temp, _task) = rig.spawn_service("Temp", 10_000);

        let id = temp.read().await.unwrap();
        assert_eq!(id.as_u64(), 1);

        let (topic, request) = next_request(&mut device).await;
        assert_eq!(topic, format!("{}/rpc/Temp.Read", DEVICE));
        assert_eq!(request.src, format!("{}_{}_Temp", SELF_ID, DEVICE));
        assert_eq!(request.method, "Temp.Read");
        assert_eq!(request.args, j!({}));

        rig.reply("Temp", r#"{"id":1,"result":{"temp":21}}"#);
        settle().await;

        let successes = rig.of_kind(OutputKind::Success);
        assert_eq!(successes.len(), 1);
        assert_eq!(successes[0].payload, j!({"temp": 21}));
        assert_eq!(successes[0].topic, "Temp.Read");
        assert_eq!(temp.pending_count().await.unwrap(), 0);

        // duplicate of the same reply is not delivered twice
        rig.reply("Temp", r#"{"id":1,"result":{"temp":21}}"#);
        settle().await;
        assert_eq!(rig.of_kind(OutputKind::Success).len(), 1);
        assert_eq!(rig.codes(), vec![codes::UNKNOWN_ID]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_evicts_with_503() {
        let rig = Rig::new();
        let (relay, _task) = rig.spawn_service("Relay", 10_000);

        relay.read().await.unwrap();
        rig.reply("Relay", r#"{"id":1,"result":{}}"#);
        settle().await;

        let id = relay.write(j!({"v": 1})).await.unwrap();
        assert_eq!(id.as_u64(), 2);
        rig.broker.set_connected(false);

        tokio::time::advance(Duration::from_millis(1_000)).await;
        settle().await;

        let errors = rig.of_kind(OutputKind::Error);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code(), Some(codes::TRANSPORT_INACTIVE));
        assert_eq!(errors[0].payload["id"], j!(2));
        assert_eq!(errors[0].payload["args"], j!({"v": 1}));
        assert_eq!(relay.pending_count().await.unwrap(), 0);
        assert_eq!(relay.stats().transport_evictions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_then_late_reply() {
        let rig = Rig::new();
        let (temp, _task) = rig.spawn_service("Temp", 3_000);

        temp.read().await.unwrap();
        tokio::time::advance(Duration::from_millis(2_000)).await;
        settle().await;
        assert_eq!(temp.pending_count().await.unwrap(), 1);
        assert!(rig.codes().is_empty());

        tokio::time::advance(Duration::from_millis(1_000)).await;
        settle().await;
        assert_eq!(rig.codes(), vec![codes::TIMEOUT]);
        assert_eq!(temp.pending_count().await.unwrap(), 0);

        rig.reply("Temp", r#"{"id":1,"result":{"temp":20}}"#);
        settle().await;
        assert_eq!(rig.codes(), vec![codes::TIMEOUT, codes::UNKNOWN_ID]);
        assert!(rig.of_kind(OutputKind::Success).is_empty());
        assert_eq!(rig.of_kind(OutputKind::Warning).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_error_and_bad_replies() {
        let rig = Rig::new();
        let (temp, _task) = rig.spawn_service("Temp", 10_000);

        temp.call("Calibrate", j!({"offset": 2})).await.unwrap();
        temp.read().await.unwrap();

        rig.reply("Temp", r#"{"result":1}"#);
        rig.reply("Temp", "not json");
        rig.reply("Temp", r#"{"id":2,"result":1,"error":2}"#);
        rig.reply("Temp", r#"{"id":1,"error":{"code":-1,"message":"busy"}}"#);
        settle().await;

        assert_eq!(rig.codes(), vec![codes::ID_MISSING, codes::REMOTE_ERROR]);
        let error = &rig.of_kind(OutputKind::Error)[1];
        assert_eq!(error.topic, "Temp.Calibrate");
        assert_eq!(error.payload["error"], j!({"code": -1, "message": "busy"}));

        // the malformed reply for id 2 left it pending
        assert_eq!(temp.pending_count().await.unwrap(), 1);
        assert_eq!(temp.stats().malformed, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_services_are_isolated() {
        let rig = Rig::new();
        let (temp, _t1) = rig.spawn_service("Temp", 10_000);
        let (relay, _t2) = rig.spawn_service("Relay", 10_000);

        assert_eq!(temp.read().await.unwrap().as_u64(), 1);
        assert_eq!(relay.read().await.unwrap().as_u64(), 1);

        rig.reply("Relay", r#"{"id":1,"result":{"on":true}}"#);
        settle().await;

        assert_eq!(temp.pending_count().await.unwrap(), 1);
        assert_eq!(relay.pending_count().await.unwrap(), 0);
        let successes = rig.of_kind(OutputKind::Success);
        assert_eq!(successes.len(), 1);
        assert_eq!(successes[0].node_id, "dev/Relay");
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_broadcast_forwarded() {
        let rig = Rig::new();
        let (_temp, _task) = rig.spawn_service("Temp", 10_000);
        settle().await;

        rig.update("Temp", r#"{"temp":19.5}"#);
        rig.update("Relay", r#"{"on":false}"#);
        settle().await;

        let successes = rig.of_kind(OutputKind::Success);
        assert_eq!(successes.len(), 1);
        assert_eq!(successes[0].topic, "Temp.Update");
        assert_eq!(successes[0].payload, json(r#"{"temp":19.5}"#));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_discards_silently() {
        let rig = Rig::new();
        let (temp, task) = rig.spawn_service("Temp", 10_000);

        temp.read().await.unwrap();
        temp.read().await.unwrap();
        temp.shutdown().await.unwrap();
        task.await.unwrap();

        tokio::time::advance(Duration::from_secs(30)).await;
        settle().await;
        assert!(rig.sink.is_empty());
        assert!(rig.broker.registry().is_empty());
        assert!(temp.read().await.is_err());
    }
}
