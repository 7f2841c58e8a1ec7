//! FileSink - JSON lines on disk
//!
//! Layout under `base_path`:
//!
//! ```text
//! publications.jsonl   one line per odometry / transform
//! heavy.jsonl          one line per heavy payload
//! ```

use contracts::{ContractError, DataSink, Publication};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, instrument};

const LINES_FILE: &str = "publications.jsonl";
const HEAVY_FILE: &str = "heavy.jsonl";

#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    pub base_path: PathBuf,
}

impl FileSinkConfig {
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let base_path = params
            .get("base_path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./output"));

        Self { base_path }
    }
}

struct Writers {
    light: BufWriter<File>,
    /// Opened on the first heavy payload
    heavy: Option<BufWriter<File>>,
}

pub struct FileSink {
    name: String,
    config: FileSinkConfig,
    writers: Option<Writers>,
}

impl FileSink {
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        fs::create_dir_all(&config.base_path)?;
        let light = open_append(&config.base_path.join(LINES_FILE))?;

        Ok(Self {
            name: name.into(),
            config,
            writers: Some(Writers {
                light: BufWriter::new(light),
                heavy: None,
            }),
        })
    }

    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        Self::new(name, FileSinkConfig::from_params(params))
    }

    pub fn base_path(&self) -> &Path {
        &self.config.base_path
    }

    fn writer_for(&mut self, publication: &Publication) -> std::io::Result<&mut BufWriter<File>> {
        let writers = self
            .writers
            .as_mut()
            .ok_or_else(|| std::io::Error::other("sink closed"))?;
        if !matches!(publication, Publication::Heavy(_)) {
            return Ok(&mut writers.light);
        }
        if writers.heavy.is_none() {
            let file = open_append(&self.config.base_path.join(HEAVY_FILE))?;
            writers.heavy = Some(BufWriter::new(file));
        }
        writers
            .heavy
            .as_mut()
            .ok_or_else(|| std::io::Error::other("heavy writer unavailable"))
    }

    fn persist(&mut self, publication: &Publication) -> Result<(), ContractError> {
        let result = self.writer_for(publication).and_then(|writer| {
            serde_json::to_writer(&mut *writer, publication)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            writer.write_all(b"\n")
        });
        result.map_err(|e| {
            error!(sink = %self.name, kind = publication.kind(), error = %e, "Write failed");
            ContractError::sink_write(&self.name, e.to_string())
        })
    }
}

fn open_append(path: &Path) -> std::io::Result<File> {
    File::options().create(true).append(true).open(path)
}

impl DataSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_write",
        skip(self, publication),
        fields(sink = %self.name, kind = publication.kind())
    )]
    async fn write(&mut self, publication: &Publication) -> Result<(), ContractError> {
        self.persist(publication)
    }

    #[instrument(name = "file_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        if let Some(writers) = self.writers.as_mut() {
            let flushed = writers.light.flush().and_then(|()| match writers.heavy.as_mut() {
                Some(heavy) => heavy.flush(),
                None => Ok(()),
            });
            flushed.map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
        }
        Ok(())
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.flush().await?;
        self.writers = None;
        debug!(sink = %self.name, "FileSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use contracts::{
        HeavyPayload, PointCloudData, Quaternion, StreamPacket, StreamPayload, TransformStamped,
        Vector3,
    };
    use tempfile::tempdir;

    fn sink_in(dir: &Path) -> FileSink {
        FileSink::new(
            "test_file",
            FileSinkConfig {
                base_path: dir.to_path_buf(),
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn light_publications_appended_as_lines() {
        let dir = tempdir().unwrap();
        let mut sink = sink_in(dir.path());

        for t in [1.0, 2.0] {
            let tf = Publication::Transform(TransformStamped {
                timestamp: t,
                parent_frame: "/camera_init".into(),
                child_frame: "/camera".into(),
                translation: Vector3::new(t, 0.0, 0.0),
                rotation: Quaternion::IDENTITY,
            });
            sink.write(&tf).await.unwrap();
        }
        sink.close().await.unwrap();

        let text = fs::read_to_string(dir.path().join(LINES_FILE)).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(parsed["kind"], "transform");
        assert_eq!(parsed["timestamp"], 2.0);
    }

    #[tokio::test]
    async fn heavy_payloads_go_to_their_own_file() {
        let dir = tempdir().unwrap();
        let mut sink = sink_in(dir.path());

        // 32-byte points: the payload is stored verbatim whatever the layout
        let cloud = PointCloudData {
            num_points: 2,
            point_stride: 32,
            data: Bytes::from(vec![7u8; 64]),
        };
        for frame_count in [1, 3] {
            let heavy = Publication::Heavy(HeavyPayload {
                topic: "/laser_cloud_surround".into(),
                timestamp: frame_count as f64 * 0.1,
                frame_id: "/camera".into(),
                frame_count,
                packets: vec![
                    StreamPacket::new(
                        "velodyne_cloud_2",
                        0.1,
                        StreamPayload::PointCloud(cloud.clone()),
                    ),
                    StreamPacket::new("imu_trans", 0.1, StreamPayload::Raw(Bytes::new())),
                ],
            });
            sink.write(&heavy).await.unwrap();
        }
        sink.close().await.unwrap();

        let light = fs::read_to_string(dir.path().join(LINES_FILE)).unwrap();
        assert!(light.is_empty());

        let text = fs::read_to_string(dir.path().join(HEAVY_FILE)).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        let last = &lines[1];
        assert_eq!(last["kind"], "heavy");
        assert_eq!(last["frame_count"], 3);
        assert_eq!(last["topic"], "/laser_cloud_surround");
        let cloud_json = &last["packets"][0]["payload"]["PointCloud"];
        assert_eq!(cloud_json["point_stride"], 32);
        assert_eq!(cloud_json["data"].as_array().unwrap().len(), 64);
    }

    #[tokio::test]
    async fn light_only_run_creates_no_heavy_file() {
        let dir = tempdir().unwrap();
        let mut sink = sink_in(dir.path());
        sink.close().await.unwrap();
        assert!(!dir.path().join(HEAVY_FILE).exists());
    }

    #[tokio::test]
    async fn write_after_close_fails() {
        let dir = tempdir().unwrap();
        let mut sink = sink_in(dir.path());
        sink.close().await.unwrap();

        let tf = Publication::Transform(TransformStamped {
            timestamp: 0.0,
            parent_frame: "a".into(),
            child_frame: "b".into(),
            translation: Vector3::ZERO,
            rotation: Quaternion::IDENTITY,
        });
        assert!(sink.write(&tf).await.is_err());
    }
}
