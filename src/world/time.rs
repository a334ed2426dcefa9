use std::time::{Duration, Instant};

pub const DEFAULT_CLOCK_SPEED: u32 = 24;
const MINUTES_PER_HOUR: u64 = 60;
const MINUTES_PER_DAY: u64 = 24 * MINUTES_PER_HOUR;
const DAYS_PER_MONTH: u64 = 30;
const MONTHS_PER_YEAR: u64 = 12;
const DAYS_PER_YEAR: u64 = DAYS_PER_MONTH * MONTHS_PER_YEAR;

/// In-game calendar position (30 day months, 12 month years)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameDateTime {
    pub year: u16,  // 0-4095 on the wire
    pub month: u8,  // 0-11
    pub day: u8,    // 1-30
    pub hour: u8,   // 0-23
    pub minute: u8, // 0-59
}

impl GameDateTime {
    pub fn from_total_minutes(total: u64) -> Self {
        let days = total / MINUTES_PER_DAY;
        Self {
            year: (days / DAYS_PER_YEAR).min(u64::from(u16::MAX)) as u16,
            month: ((days / DAYS_PER_MONTH) % MONTHS_PER_YEAR) as u8,
            day: (days % DAYS_PER_MONTH + 1) as u8,
            hour: ((total / MINUTES_PER_HOUR) % 24) as u8,
            minute: (total % MINUTES_PER_HOUR) as u8,
        }
    }

    pub fn total_minutes(&self) -> u64 {
        let days = u64::from(self.year) * DAYS_PER_YEAR
            + u64::from(self.month) * DAYS_PER_MONTH
            + u64::from(self.day.saturating_sub(1));
        days * MINUTES_PER_DAY + u64::from(self.hour) * MINUTES_PER_HOUR + u64::from(self.minute)
    }
}

/// Maps real time to accelerated game time (24x by default: 150 real seconds
/// per game hour).
#[derive(Debug, Clone)]
pub struct GameClock {
    started: Instant,
    base_minutes: u64,
    speed: u32,
}

impl GameClock {
    pub fn new(start: GameDateTime, speed: u32) -> Self {
        Self {
            started: Instant::now(),
            base_minutes: start.total_minutes(),
            speed: speed.max(1),
        }
    }

    pub fn now(&self) -> GameDateTime {
        self.after(self.started.elapsed())
    }

    pub fn after(&self, elapsed: Duration) -> GameDateTime {
        let game_minutes = elapsed.as_secs().saturating_mul(u64::from(self.speed)) / 60;
        GameDateTime::from_total_minutes(self.base_minutes.saturating_add(game_minutes))
    }
}

impl Default for GameClock {
    fn default() -> Self {
        Self::new(
            GameDateTime {
                year: 1,
                month: 0,
                day: 1,
                hour: 12,
                minute: 0,
            },
            DEFAULT_CLOCK_SPEED,
        )
    }
}
