use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_DIR: &str = "log";
pub const GAME_LOG: &str = "game.log";

const HEADER_LINE: &str = "-------------------------------------------------------------------------------";
const HEADER_TITLE: &str = "Sphere - Game Gateway";

const WEEKDAYS: [&str; 7] = ["Thu", "Fri", "Sat", "Sun", "Mon", "Tue", "Wed"];
const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Installs the global subscriber: stderr plus `<root>/log/game.log`.
/// Returns the log file path.
pub fn init(root: &Path, config: &LogConfig) -> Result<PathBuf, String> {
    let dir = root.join(LOG_DIR);
    std::fs::create_dir_all(&dir).map_err(|err| format!("log directory create failed: {}", err))?;
    let path = dir.join(GAME_LOG);
    let file = open_log_file(&path)?;

    tracing_subscriber::registry()
        .with(filter_for(&config.level))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(false),
        )
        .try_init()
        .map_err(|err| format!("log system init failed: {}", err))?;
    Ok(path)
}

fn filter_for(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Opens for append; a new or empty file gets the banner first.
pub fn open_log_file(path: &Path) -> Result<File, String> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| format!("open log {} failed: {}", path.display(), err))?;
    if file.metadata().map(|meta| meta.len()).unwrap_or(0) == 0 {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        write_banner(&mut file, &name, unix_timestamp())
            .map_err(|err| format!("header write failed: {}", err))?;
    }
    Ok(file)
}

fn write_banner(out: &mut impl Write, name: &str, timestamp: i64) -> std::io::Result<()> {
    writeln!(out, "{HEADER_LINE}")?;
    writeln!(out, "{HEADER_TITLE}")?;
    writeln!(out, "{name} - started {}", banner_timestamp(timestamp))?;
    Ok(())
}

fn banner_timestamp(ts: i64) -> String {
    let secs = ts.max(0);
    let days = secs / 86_400;
    let of_day = secs % 86_400;
    let (year, month, day) = civil_from_days(days);
    let weekday = WEEKDAYS[days.rem_euclid(7) as usize];
    let month = MONTHS[(month as usize).saturating_sub(1).min(11)];
    format!(
        "{weekday} {month} {day:>2} {:02}:{:02}:{:02} {year}",
        of_day / 3_600,
        (of_day % 3_600) / 60,
        of_day % 60
    )
}

fn unix_timestamp() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or(0)
}

// Days since 1970-01-01 to a proleptic Gregorian date.
fn civil_from_days(days: i64) -> (i32, u32, u32) {
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = (yoe + era * 400 + i64::from(month <= 2)) as i32;
    (year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn banner_formats_epoch_and_leap_day() {
        assert_eq!(banner_timestamp(0), "Thu Jan  1 00:00:00 1970");
        // 2024-02-29 13:05:09 UTC
        assert_eq!(banner_timestamp(1_709_211_909), "Thu Feb 29 13:05:09 2024");
    }

    #[test]
    fn banner_written_once() {
        let dir = std::env::temp_dir().join(format!("sphere-log-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("dir");
        let path = dir.join(GAME_LOG);
        let _ = std::fs::remove_file(&path);

        let mut file = open_log_file(&path).expect("open");
        writeln!(file, "line").expect("write");
        drop(file);
        open_log_file(&path).expect("reopen");

        let contents = std::fs::read_to_string(&path).expect("read");
        assert_eq!(contents.matches(HEADER_TITLE).count(), 1);
        assert!(contents.contains("game.log - started "));
        assert!(contents.ends_with("line\n"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn plain_level_becomes_filter() {
        assert_eq!(filter_for("debug").to_string(), "debug");
    }
}
