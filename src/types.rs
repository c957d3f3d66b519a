use std::fmt;
use std::str::FromStr;

use chrono::{NaiveTime, Timelike};

/// Direction of a whole run. Decided once from settings, never per volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Backup,
    Restore,
}

impl Mode {
    pub fn from_restore_flag(restore: bool) -> Self {
        if restore {
            Mode::Restore
        } else {
            Mode::Backup
        }
    }

    pub fn is_restore(&self) -> bool {
        matches!(self, Mode::Restore)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Backup => "backup",
            Mode::Restore => "restore",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunMode {
    pub dry_run: bool,
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeKind {
    Named,
    Bind,
}

impl VolumeKind {
    pub fn parse(value: &str) -> Result<Self, String> {
        match value.trim().to_ascii_lowercase().as_str() {
            "volume" | "named" => Ok(VolumeKind::Named),
            "bind" => Ok(VolumeKind::Bind),
            _ => Err(format!(
                "invalid volume type {}; expected volume or bind",
                value
            )),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VolumeKind::Named => "volume",
            VolumeKind::Bind => "bind",
        }
    }
}

/// How a volume's transfer is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerKind {
    /// Transient auto-removing container with the volume mounted.
    Container,
    /// `rsync` run directly on the host.
    Direct,
}

impl WorkerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerKind::Container => "container",
            WorkerKind::Direct => "direct",
        }
    }
}

/// Configured `time_to_run`: either run immediately or at a wall-clock minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerTime {
    Now,
    At { hour: u32, minute: u32 },
}

impl TriggerTime {
    pub fn matches(&self, time: NaiveTime) -> bool {
        match self {
            TriggerTime::Now => true,
            TriggerTime::At { hour, minute } => time.hour() == *hour && time.minute() == *minute,
        }
    }
}

impl FromStr for TriggerTime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        if value.eq_ignore_ascii_case("now") {
            return Ok(TriggerTime::Now);
        }
        let invalid = || format!("invalid time_to_run {}; expected HH:MM or now", value);
        let (h, m) = value.split_once(':').ok_or_else(invalid)?;
        if h.len() != 2 || m.len() != 2 {
            return Err(invalid());
        }
        let hour: u32 = h.parse().map_err(|_| invalid())?;
        let minute: u32 = m.parse().map_err(|_| invalid())?;
        if hour > 23 || minute > 59 {
            return Err(invalid());
        }
        Ok(TriggerTime::At { hour, minute })
    }
}

impl fmt::Display for TriggerTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerTime::Now => f.write_str("now"),
            TriggerTime::At { hour, minute } => write!(f, "{:02}:{:02}", hour, minute),
        }
    }
}

/// Loose boolean used by the settings file: `true`/`1` in any case, everything else false.
pub fn parse_bool_str(value: &str) -> bool {
    let upper = value.trim().to_ascii_uppercase();
    upper == "TRUE" || upper == "1"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_time_parses_clock_and_now() {
        assert_eq!("02:00".parse::<TriggerTime>(), Ok(TriggerTime::At { hour: 2, minute: 0 }));
        assert_eq!("NOW".parse::<TriggerTime>(), Ok(TriggerTime::Now));
        assert!("2:00".parse::<TriggerTime>().is_err());
        assert!("24:00".parse::<TriggerTime>().is_err());
        assert!("12:60".parse::<TriggerTime>().is_err());
        assert!("noon".parse::<TriggerTime>().is_err());
    }

    #[test]
    fn trigger_time_matches_minute_only() {
        let trigger = TriggerTime::At { hour: 2, minute: 0 };
        let at = |h, m, s| NaiveTime::from_hms_opt(h, m, s).expect("time");
        assert!(trigger.matches(at(2, 0, 0)));
        assert!(trigger.matches(at(2, 0, 59)));
        assert!(!trigger.matches(at(2, 1, 0)));
        assert!(!trigger.matches(at(14, 0, 0)));
    }

    #[test]
    fn bool_strings() {
        assert!(parse_bool_str("True"));
        assert!(parse_bool_str("1"));
        assert!(!parse_bool_str("yes"));
        assert!(!parse_bool_str("FALSE"));
    }
}
