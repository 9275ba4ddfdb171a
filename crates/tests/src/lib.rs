//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 生成器 -> Dispatcher -> Sink 的 e2e 测试

#[cfg(test)]
mod contract_tests {
    use contracts::{PatientEvent, PatientId};

    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
    }

    #[test]
    fn test_patient_population_is_one_based() {
        let ids: Vec<u32> = PatientId::population(3).map(PatientId::get).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(PatientId::new(0).is_none());
    }

    #[test]
    fn test_event_carries_its_fields() {
        let id = PatientId::new(7).unwrap();
        let event = PatientEvent::new(id, 1_700_000_000_000, "Alert", "triggered");
        assert_eq!(event.patient_id(), id);
        assert_eq!(event.timestamp(), 1_700_000_000_000);
        assert_eq!(event.label(), "Alert");
        assert_eq!(event.value(), "triggered");
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::HashMap;
    use std::fs;
    use std::sync::Arc;
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{PatientEvent, SaturationConfig};
    use dispatcher::{create_dispatcher, Dispatcher, SinkHandle, StreamSink, StreamSinkConfig};
    use generators::{GeneratorSet, SaturationGenerator, ScriptedRandom};
    use observability::TickStatsAggregator;
    use tempfile::tempdir;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::net::TcpStream;
    use tokio::sync::mpsc;

    fn config_for(dir: &std::path::Path) -> String {
        format!(
            r#"
[simulation]
patient_count = 5
tick_interval_ms = 10
seed = 2024

[[generators]]
kind = "alert"
rate_lambda = 0.5

[[generators]]
kind = "saturation"

[[sinks]]
name = "files"
sink_type = "file"
params = {{ base_path = "{}" }}
"#,
            dir.display().to_string().replace('\\', "/")
        )
    }

    /// Parse a file-sink record back into (patient_id, label, value)
    fn parse_record(line: &str) -> (u32, String, String) {
        let fields: HashMap<&str, &str> = line
            .split(", ")
            .filter_map(|field| field.split_once(": "))
            .collect();
        (
            fields["Patient ID"].parse().unwrap(),
            fields["Label"].to_string(),
            fields["Data"].to_string(),
        )
    }

    /// End-to-end test: config -> GeneratorSet -> Dispatcher -> FileSink
    ///
    /// 验证完整的数据流：
    /// 1. ConfigLoader 解析 TOML
    /// 2. GeneratorSet 每个节拍为每个病人生成事件
    /// 3. Dispatcher 将事件写入每个标签一个文件
    #[tokio::test]
    async fn test_e2e_config_to_files() {
        let dir = tempdir().unwrap();
        let blueprint =
            ConfigLoader::load_from_str(&config_for(dir.path()), ConfigFormat::Toml).unwrap();

        let mut generators = GeneratorSet::from_blueprint(&blueprint);
        let (tx, rx) = mpsc::channel::<PatientEvent>(64);
        let dispatcher = create_dispatcher(blueprint.sinks.clone(), rx).await.unwrap();
        let handle = dispatcher.spawn();

        let mut stats = TickStatsAggregator::new();
        let mut alert_events = 0u64;
        for _ in 0..20 {
            let report = generators.tick();
            stats.update(
                report.generated(),
                report.silent,
                report.failures,
                Duration::ZERO,
            );
            alert_events += report
                .events
                .iter()
                .filter(|e| e.label() == "Alert")
                .count() as u64;
            for event in report.events {
                tx.send(event).await.unwrap();
            }
        }
        drop(tx);

        let report = handle.await.unwrap();
        let (_, snapshot) = &report[0];
        assert_eq!(snapshot.delivered, stats.events);
        assert_eq!(snapshot.failed, 0);
        assert_eq!(stats.failures, 0);

        // saturation always emits: 20 ticks * 5 patients
        let saturation = fs::read_to_string(dir.path().join("Saturation.txt")).unwrap();
        let records: Vec<_> = saturation.lines().map(parse_record).collect();
        assert_eq!(records.len(), 100);

        let mut last: HashMap<u32, u32> = HashMap::new();
        for (patient, label, value) in &records {
            assert_eq!(label, "Saturation");
            let number: f64 = value.trim_end_matches('%').parse().unwrap();
            assert!((90.0..=100.0).contains(&number), "out of range: {value}");
            let current = number as u32;
            if let Some(previous) = last.insert(*patient, current) {
                assert!(previous.abs_diff(current) <= 1, "{previous} -> {current}");
            }
        }

        // alerts alternate per patient, starting with "triggered"
        let alerts = fs::read_to_string(dir.path().join("Alert.txt")).unwrap_or_default();
        assert_eq!(alerts.lines().count() as u64, alert_events);
        let mut state: HashMap<u32, bool> = HashMap::new();
        for (patient, _, value) in alerts.lines().map(parse_record) {
            let triggered = state.entry(patient).or_insert(false);
            match value.as_str() {
                "triggered" => assert!(!*triggered),
                "resolved" => assert!(*triggered),
                other => panic!("unexpected alert value {other}"),
            }
            *triggered = !*triggered;
        }
    }

    /// Same seed, same event sequence
    #[test]
    fn test_seeded_runs_reproduce() {
        let dir = tempdir().unwrap();
        let blueprint =
            ConfigLoader::load_from_str(&config_for(dir.path()), ConfigFormat::Toml).unwrap();

        let values = |mut set: GeneratorSet| {
            (0..10)
                .flat_map(|_| set.tick().events)
                .map(|e| format!("{}:{}:{}", e.patient_id(), e.label(), e.value()))
                .collect::<Vec<_>>()
        };

        assert_eq!(
            values(GeneratorSet::from_blueprint(&blueprint)),
            values(GeneratorSet::from_blueprint(&blueprint))
        );
    }

    /// End-to-end test: GeneratorSet -> Dispatcher -> StreamSink -> TCP reader
    #[tokio::test]
    async fn test_e2e_stream_reader_receives_lines() {
        let sink = StreamSink::bind(
            "tcp",
            StreamSinkConfig::new("127.0.0.1:0".parse().unwrap()),
        )
        .await
        .unwrap();
        let sink = Arc::new(sink);

        let client = TcpStream::connect(sink.local_addr()).await.unwrap();
        for _ in 0..100 {
            if sink.has_peer() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(sink.has_peer());

        let (tx, rx) = mpsc::channel::<PatientEvent>(16);
        let handle = SinkHandle::spawn_shared(Arc::clone(&sink), 64);
        let dispatcher = Dispatcher::with_handles(vec![handle], rx).spawn();

        // baseline 95 + 2 = 97, then +1 per tick
        let mut generators = GeneratorSet::new(2);
        generators.push(SaturationGenerator::with_random(
            SaturationConfig::default(),
            2,
            ScriptedRandom::indices([2]),
        ));

        for _ in 0..3 {
            for event in generators.tick().events {
                tx.send(event).await.unwrap();
            }
        }
        drop(tx);
        let report = dispatcher.await.unwrap();
        assert_eq!(report[0].1.delivered, 6);

        let mut lines = BufReader::new(client).lines();
        let mut received = Vec::new();
        for _ in 0..6 {
            let line = tokio::time::timeout(Duration::from_secs(2), lines.next_line())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            let parts: Vec<&str> = line.split(',').collect();
            assert_eq!(parts.len(), 4);
            assert!(parts[1].parse::<i64>().is_ok());
            received.push(format!("{},{},{}", parts[0], parts[2], parts[3]));
        }

        assert_eq!(
            received,
            vec![
                "1,Saturation,98.0%",
                "2,Saturation,98.0%",
                "1,Saturation,99.0%",
                "2,Saturation,99.0%",
                "1,Saturation,100.0%",
                "2,Saturation,100.0%",
            ]
        );
    }
}
