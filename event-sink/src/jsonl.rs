// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::{
    fs::{self, File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use core_types::SaleEvent;
use parking_lot::Mutex;

use crate::{EventSink, SinkError};

/// Append-only JSON-lines file; one event per line, flushed per write.
pub struct JsonlEventSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonlEventSink {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let path = path.into();
        ensure_parent(&path)?;
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn ensure_parent(path: &Path) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

impl EventSink for JsonlEventSink {
    fn record(&self, event: SaleEvent) -> Result<(), SinkError> {
        let mut writer = self.writer.lock();
        serde_json::to_writer(&mut *writer, &event)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "jsonl"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use core_types::{EventKind, SaleConfig};
    use tempfile::tempdir;

    #[test]
    fn appends_one_line_per_event_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("events.jsonl");

        let sink = JsonlEventSink::open(&path).unwrap();
        let config = SaleConfig {
            token_mint: "M".to_string(),
            ..SaleConfig::default()
        };
        sink.record(SaleEvent::config_saved(&config, Utc::now()))
            .unwrap();
        sink.record(SaleEvent::purchase("A", Some(1.0), Some(7), None, Utc::now()))
            .unwrap();
        drop(sink);

        let sink = JsonlEventSink::open(&path).unwrap();
        sink.record(SaleEvent::dev_reset(Utc::now())).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let kinds: Vec<EventKind> = contents
            .lines()
            .map(|line| serde_json::from_str::<SaleEvent>(line).unwrap().kind)
            .collect();
        assert_eq!(
            kinds,
            vec![EventKind::ConfigSaved, EventKind::Purchase, EventKind::DevReset]
        );
    }
}
