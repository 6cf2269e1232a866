//! CSV history of moves and light samples.

use crate::light::LightHistory;
use crate::shade::MoveEvent;
use chrono::NaiveDateTime;
use csv::WriterBuilder;
use parking_lot::Mutex;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

const TIMESTAMP_FORMAT: &str = "%d-%m-%Y %H:%M:%S";

/// Appends rows to the move log and the light log.
pub struct HistoryLog {
    move_path: PathBuf,
    light_path: PathBuf,
    write: Mutex<()>,
}

impl HistoryLog {
    pub fn new(move_path: PathBuf, light_path: PathBuf) -> Self {
        Self {
            move_path,
            light_path,
            write: Mutex::new(()),
        }
    }

    /// `timestamp, shade, mode, from, to, light history`
    pub fn append_move(&self, event: &MoveEvent, light: &LightHistory) -> Result<(), csv::Error> {
        self.append(
            &self.move_path,
            &[
                event.at.format(TIMESTAMP_FORMAT).to_string(),
                event.shade.clone(),
                event.mode.to_string(),
                event.from.to_string(),
                event.to.to_string(),
                light.to_string(),
            ],
        )
    }

    /// `timestamp, intensity`
    pub fn append_light(&self, at: NaiveDateTime, intensity: u32) -> Result<(), csv::Error> {
        self.append(
            &self.light_path,
            &[at.format(TIMESTAMP_FORMAT).to_string(), intensity.to_string()],
        )
    }

    fn append(&self, path: &Path, row: &[String]) -> Result<(), csv::Error> {
        let _guard = self.write.lock();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        writer.write_record(row)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shade::{Mode, Position};
    use chrono::NaiveDate;

    fn log(name: &str) -> (HistoryLog, PathBuf) {
        let dir = std::env::temp_dir().join(format!(
            "sunshade-history-{}-{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        (
            HistoryLog::new(dir.join("sunscreen_stats.csv"), dir.join("light_stats.csv")),
            dir,
        )
    }

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 5)
            .unwrap()
    }

    #[test]
    fn test_move_row() {
        let (log, dir) = log("move");
        let mut light = LightHistory::new();
        light.push(7, 5);
        light.push(5, 5);
        let event = MoveEvent {
            shade: "terrace".to_string(),
            at: noon(),
            mode: Mode::Auto,
            from: Position::Up,
            to: Position::Down,
        };

        log.append_move(&event, &light).unwrap();
        log.append_move(&event, &light).unwrap();

        let content = fs::read_to_string(dir.join("sunscreen_stats.csv")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "01-06-2024 12:00:05,terrace,auto,up,down,\"[5, 7]\"");
    }

    #[test]
    fn test_light_row() {
        let (log, dir) = log("light");
        log.append_light(noon(), 42).unwrap();
        let content = fs::read_to_string(dir.join("light_stats.csv")).unwrap();
        assert_eq!(content, "01-06-2024 12:00:05,42\n");
    }
}
