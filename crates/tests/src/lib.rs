//! # Integration Tests
//!
//! Cross-crate and end-to-end tests.
//!
//! - configuration snapshot: the shipped `config.toml` loads and validates
//! - gate scenarios over the reference stream set
//! - gate → cycle → dispatcher with in-memory and file sinks
//! - mock producers through the full driver loop

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{FusionBlueprint, SinkType};

    #[test]
    fn shipped_config_matches_reference() {
        let blueprint =
            ConfigLoader::load_from_str(include_str!("../../../config.toml"), ConfigFormat::Toml)
                .unwrap();
        let reference = FusionBlueprint::reference();

        assert_eq!(
            blueprint.stream_ids().collect::<Vec<_>>(),
            reference.stream_ids().collect::<Vec<_>>()
        );
        assert_eq!(blueprint.heavy_stream_ids(), reference.heavy_stream_ids());
        assert_eq!(blueprint.sync.anchor_stream, reference.sync.anchor_stream);
        assert_eq!(blueprint.publish.io_ratio, 2);
        assert_eq!(blueprint.sinks.len(), 2);
        assert_eq!(blueprint.sinks[1].sink_type, SinkType::File);
        assert_eq!(blueprint.sinks[0].params["kinds"], "odometry");
    }

    #[test]
    fn blueprint_survives_json_round_trip() {
        let reference = FusionBlueprint::reference();
        let json = ConfigLoader::to_json(&reference).unwrap();
        let back = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(back.covariance_matrix(), reference.covariance_matrix());
        assert_eq!(back.topics.heavy, reference.topics.heavy);
    }
}

#[cfg(test)]
mod gate_scenarios {
    use bytes::Bytes;
    use contracts::{FusionBlueprint, StreamPacket, StreamPayload};
    use sync_engine::{SharedGate, SyncGate};

    fn gate() -> (SharedGate, FusionBlueprint) {
        let blueprint = FusionBlueprint::reference();
        (SharedGate::new(SyncGate::from_blueprint(&blueprint).unwrap()), blueprint)
    }

    fn arrive(gate: &SharedGate, blueprint: &FusionBlueprint, stamps: &[f64]) {
        for (id, t) in blueprint.stream_ids().zip(stamps) {
            gate.record_arrival(StreamPacket::new(id, *t, StreamPayload::Raw(Bytes::new())))
                .unwrap();
        }
    }

    #[test]
    fn six_streams_within_tolerance_are_ready() {
        let (gate, blueprint) = gate();
        arrive(&gate, &blueprint, &[10.000, 10.001, 10.002, 10.003, 10.0005, 10.0049]);
        assert!(gate.is_ready(0.005));

        let snapshot = gate.consume_all().unwrap();
        assert_eq!(snapshot.packets.len(), 6);
        // anchor is laser_cloud_less_flat, the fourth declared stream
        assert_eq!(snapshot.t_anchor, 10.003);
        assert!(!gate.is_ready(0.005));
    }

    #[test]
    fn one_late_stream_blocks_readiness() {
        let (gate, blueprint) = gate();
        arrive(&gate, &blueprint, &[10.000, 10.001, 10.002, 10.003, 10.0005, 10.010]);
        assert!(!gate.is_ready(0.005));
        assert!(gate.try_consume(0.005).is_none());
    }

    #[test]
    fn skew_exactly_at_tolerance_is_ready() {
        let (gate, blueprint) = gate();
        // binary-exact stamps: pairwise spread is exactly 0.5
        arrive(&gate, &blueprint, &[8.0, 8.25, 8.5, 8.25, 8.0, 8.5]);
        assert!(gate.is_ready(0.5));
        assert!(!gate.is_ready(0.25));
        assert_eq!(gate.consume_all().unwrap().skew, 0.5);
    }

    #[test]
    fn nan_arrival_is_rejected_and_leaves_slot_waiting() {
        let (gate, blueprint) = gate();
        let ids: Vec<_> = blueprint.stream_ids().collect();
        for id in &ids[..5] {
            gate.record_arrival(StreamPacket::new(*id, 10.0, StreamPayload::Raw(Bytes::new())))
                .unwrap();
        }
        let bad = StreamPacket::new(ids[5], f64::NAN, StreamPayload::Raw(Bytes::new()));
        assert!(gate.record_arrival(bad).is_err());
        assert!(!gate.is_ready(0.005));
        assert!(gate.try_consume(0.005).is_none());
    }

    #[test]
    fn ready_again_only_after_every_stream_refreshes() {
        let (gate, blueprint) = gate();
        arrive(&gate, &blueprint, &[1.0; 6]);
        assert!(gate.try_consume(0.005).is_some());

        // five of six refreshed
        let ids: Vec<_> = blueprint.stream_ids().collect();
        for id in &ids[..5] {
            gate.record_arrival(StreamPacket::new(*id, 1.1, StreamPayload::Raw(Bytes::new())))
                .unwrap();
        }
        assert!(!gate.is_ready(0.005));

        gate.record_arrival(StreamPacket::new(ids[5], 1.1, StreamPayload::Raw(Bytes::new())))
            .unwrap();
        assert!(gate.is_ready(0.005));
    }

    #[test]
    fn concurrent_producers_never_lose_a_consumed_frame() {
        let (gate, blueprint) = gate();
        let ids: Vec<String> = blueprint.stream_ids().map(str::to_string).collect();

        let producers: Vec<_> = ids
            .iter()
            .cloned()
            .map(|id| {
                let gate = gate.clone();
                std::thread::spawn(move || {
                    for n in 0..200 {
                        gate.record_arrival(StreamPacket::new(
                            id.as_str(),
                            n as f64 * 0.1,
                            StreamPayload::Raw(Bytes::new()),
                        ))
                        .unwrap();
                    }
                })
            })
            .collect();

        let mut consumed = 0u64;
        while producers.iter().any(|p| !p.is_finished()) {
            if let Some(snapshot) = gate.try_consume(0.005) {
                assert_eq!(snapshot.packets.len(), ids.len());
                assert!(snapshot.skew <= 0.005);
                consumed += 1;
            }
        }
        for producer in producers {
            producer.join().unwrap();
        }
        if gate.try_consume(0.005).is_some() {
            consumed += 1;
        }

        let stats = gate.stats();
        assert_eq!(gate.consumed_count(), consumed);
        assert!(stats.arrivals.values().all(|n| *n == 200));
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use bytes::Bytes;
    use contracts::{
        FrameSnapshot, FusionBlueprint, PoseStamped, Publication, Quaternion, RawOdometry,
        SinkConfig, SinkType, StreamPacket, StreamPayload, Vector3,
    };
    use dispatcher::{create_dispatcher, Dispatcher, MemorySink, SinkHandle};
    use driver::{spawn_correction_intake, DriverLoop, FusionCycle, LoopConfig};
    use ingestion::{IngestionPipeline, MockStreamSource};
    use pose_fusion::{ConstantVelocityEstimator, OdometryEstimator, PoseComposer, CAMERA_FRAME};
    use sync_engine::{SharedGate, SyncGate};
    use tokio::sync::{mpsc, watch};

    /// Always reports the same native pose
    struct FixedEstimator(Vector3);

    impl OdometryEstimator for FixedEstimator {
        fn estimate(&mut self, snapshot: &FrameSnapshot) -> RawOdometry {
            RawOdometry::new(PoseStamped::new(snapshot.t_anchor, self.0, Quaternion::IDENTITY))
        }
    }

    fn fill(gate: &SharedGate, blueprint: &FusionBlueprint, t: f64) {
        for id in blueprint.stream_ids() {
            gate.record_arrival(StreamPacket::new(id, t, StreamPayload::Raw(Bytes::from_static(b"pts"))))
                .unwrap();
        }
    }

    fn odometry_on(publications: &[Publication], topic: &str) -> Vec<(f64, Vector3)> {
        publications
            .iter()
            .filter_map(|p| match p {
                Publication::Odometry(m) if m.topic == topic => Some((m.timestamp, m.position)),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn correction_reaches_sinks_through_intake() {
        let mut blueprint = FusionBlueprint::reference();
        blueprint.publish.io_ratio = 3;

        let sink = MemorySink::new("memory");
        let store = sink.store();
        let (pub_tx, pub_rx) = mpsc::channel(256);
        let dispatcher =
            Dispatcher::with_handles(vec![SinkHandle::spawn(sink, 256)], pub_rx).spawn();

        let composer = Arc::new(PoseComposer::new(CAMERA_FRAME));
        let (corr_tx, corr_rx) = mpsc::channel(8);
        let intake = spawn_correction_intake(Arc::clone(&composer), corr_rx);

        let gate = SharedGate::new(SyncGate::from_blueprint(&blueprint).unwrap());
        let cycle = FusionCycle::from_blueprint(
            &blueprint,
            Box::new(FixedEstimator(Vector3::new(1.0, 0.0, 0.0))),
            composer,
            pub_tx,
        )
        .unwrap();
        let mut driver = DriverLoop::new(
            gate.clone(),
            cycle,
            LoopConfig::from_blueprint(&blueprint).unwrap(),
        );

        fill(&gate, &blueprint, 10.0);
        driver.poll_once().unwrap();

        corr_tx
            .send(contracts::CorrectionMessage {
                timestamp: 10.05,
                pre: PoseStamped::new(10.05, Vector3::ZERO, Quaternion::IDENTITY),
                post: PoseStamped::new(10.05, Vector3::new(0.0, 1.0, 0.0), Quaternion::IDENTITY),
                twist: None,
            })
            .await
            .unwrap();
        drop(corr_tx);
        assert_eq!(intake.await.unwrap(), 1);

        for i in 1..7 {
            fill(&gate, &blueprint, 10.0 + i as f64 * 0.1);
            driver.poll_once().unwrap();
        }
        drop(driver);
        dispatcher.await.unwrap();

        let publications = store.snapshot();
        let corrected = odometry_on(&publications, &blueprint.topics.corrected_odometry);
        assert_eq!(corrected.len(), 7);
        // before the correction the raw pose passes through
        assert!((corrected[0].1.y).abs() < 1e-9);
        for (_, position) in &corrected[1..] {
            assert!((position.x - 1.0).abs() < 1e-9);
            assert!((position.y - 1.0).abs() < 1e-9);
            assert!(position.z.abs() < 1e-9);
        }

        let raw = odometry_on(&publications, &blueprint.topics.raw_odometry);
        assert!(raw.iter().all(|(_, p)| p.y.abs() < 1e-9));

        let heavy_frames: Vec<u64> = store
            .of_kind("heavy")
            .into_iter()
            .filter_map(|p| match p {
                Publication::Heavy(h) => Some(h.frame_count),
                _ => None,
            })
            .collect();
        assert_eq!(heavy_frames, vec![1, 4, 7]);
    }

    #[tokio::test]
    async fn every_publication_of_a_cycle_shares_the_anchor_timestamp() {
        let blueprint = FusionBlueprint::reference();
        let sink = MemorySink::new("memory");
        let store = sink.store();
        let (pub_tx, pub_rx) = mpsc::channel(64);
        let dispatcher =
            Dispatcher::with_handles(vec![SinkHandle::spawn(sink, 64)], pub_rx).spawn();

        let gate = SharedGate::new(SyncGate::from_blueprint(&blueprint).unwrap());
        let cycle = FusionCycle::from_blueprint(
            &blueprint,
            Box::new(ConstantVelocityEstimator::stationary(CAMERA_FRAME)),
            Arc::new(PoseComposer::new(CAMERA_FRAME)),
            pub_tx,
        )
        .unwrap();
        let mut driver = DriverLoop::new(gate.clone(), cycle, LoopConfig::from_blueprint(&blueprint).unwrap());

        // anchor (laser_cloud_less_flat) stamped slightly later than the rest
        for id in blueprint.stream_ids() {
            let t = if id == blueprint.sync.anchor_stream { 5.003 } else { 5.0 };
            gate.record_arrival(StreamPacket::new(id, t, StreamPayload::Raw(Bytes::new())))
                .unwrap();
        }
        driver.poll_once().unwrap();
        drop(driver);
        dispatcher.await.unwrap();

        let publications = store.snapshot();
        // raw + corrected odometry, a transform each, one heavy payload
        assert_eq!(publications.len(), 5);
        assert!(publications.iter().all(|p| p.timestamp() == 5.003));
    }

    #[tokio::test]
    async fn kinds_filter_routes_heavy_to_file_only() {
        let dir = tempfile::tempdir().unwrap();
        let blueprint = FusionBlueprint::reference();
        let file = SinkConfig {
            name: "recording".into(),
            sink_type: SinkType::File,
            queue_capacity: 64,
            params: [
                ("base_path".to_string(), dir.path().display().to_string()),
                ("kinds".to_string(), "heavy".to_string()),
            ]
            .into(),
        };

        let (pub_tx, pub_rx) = mpsc::channel(64);
        let dispatcher = create_dispatcher(vec![file], pub_rx).await.unwrap().spawn();
        let gate = SharedGate::new(SyncGate::from_blueprint(&blueprint).unwrap());
        let cycle = FusionCycle::from_blueprint(
            &blueprint,
            Box::new(ConstantVelocityEstimator::stationary(CAMERA_FRAME)),
            Arc::new(PoseComposer::new(CAMERA_FRAME)),
            pub_tx,
        )
        .unwrap();
        let mut driver = DriverLoop::new(gate.clone(), cycle, LoopConfig::from_blueprint(&blueprint).unwrap());

        for i in 0..3 {
            fill(&gate, &blueprint, 1.0 + i as f64 * 0.1);
            driver.poll_once().unwrap();
        }
        drop(driver);
        let report = dispatcher.await.unwrap();

        // io_ratio 2: frames 1 and 3 carry heavy payloads
        assert_eq!(report[0].1.heavy_writes, 2);
        assert_eq!(report[0].1.odometry_writes, 0);
        let heavy = std::fs::read_to_string(dir.path().join("heavy.jsonl")).unwrap();
        let frames: Vec<u64> = heavy
            .lines()
            .map(|l| {
                let v: serde_json::Value = serde_json::from_str(l).unwrap();
                v["frame_count"].as_u64().unwrap()
            })
            .collect();
        assert_eq!(frames, vec![1, 3]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn mock_streams_drive_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let mut blueprint = FusionBlueprint::reference();
        blueprint.sinks.push(SinkConfig {
            name: "recording".into(),
            sink_type: SinkType::File,
            queue_capacity: 256,
            params: [("base_path".to_string(), dir.path().display().to_string())].into(),
        });

        let gate = SharedGate::new(SyncGate::from_blueprint(&blueprint).unwrap());
        let mut ingestion = IngestionPipeline::for_blueprint(&blueprint);
        for source in MockStreamSource::reference_set(&blueprint, 10.0).unwrap() {
            ingestion.register_stream_source(Box::new(source)).unwrap();
        }

        let (pub_tx, pub_rx) = mpsc::channel(256);
        let dispatcher = create_dispatcher(blueprint.sinks.clone(), pub_rx)
            .await
            .unwrap()
            .spawn();
        let cycle = FusionCycle::from_blueprint(
            &blueprint,
            Box::new(ConstantVelocityEstimator::new(
                CAMERA_FRAME,
                Vector3::new(0.0, 0.0, 1.0),
                0.0,
            )),
            Arc::new(PoseComposer::new(CAMERA_FRAME)),
            pub_tx,
        )
        .unwrap();
        let config = LoopConfig::from_blueprint(&blueprint)
            .unwrap()
            .with_max_cycles(Some(4));
        let driver = DriverLoop::new(gate.clone(), cycle, config);

        let arrivals = gate.clone();
        ingestion.start_streams(Arc::new(move |packet| arrivals.record_arrival(packet).map(|_| ())));

        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let stats = tokio::time::timeout(Duration::from_secs(20), driver.run(shutdown_rx))
            .await
            .expect("driver loop did not reach max_cycles");
        ingestion.stop_all();
        let report = dispatcher.await.unwrap();

        assert_eq!(stats.cycles, 4);
        assert!(stats.max_skew <= blueprint.sync.tolerance_sec);
        assert_eq!(report[0].1.odometry_writes, 8);
        assert_eq!(report[0].1.heavy_writes, 2);

        let lines = std::fs::read_to_string(dir.path().join("publications.jsonl")).unwrap();
        let first: serde_json::Value = serde_json::from_str(lines.lines().next().unwrap()).unwrap();
        assert_eq!(first["kind"], "odometry");
        assert_eq!(lines.lines().count(), 16);
    }
}
