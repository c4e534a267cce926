//! TTL presets and expiry arithmetic.

use std::time::Duration;

use tokio::time::Instant;

/// TTL for volatile data (5 minutes).
pub const SHORT_TTL: Duration = Duration::from_secs(5 * 60);

/// TTL used when the caller does not pick one (15 minutes).
pub const MEDIUM_TTL: Duration = Duration::from_secs(15 * 60);

/// TTL for data that rarely changes (1 hour).
pub const LONG_TTL: Duration = Duration::from_secs(60 * 60);

/// Upper bound used when `now + ttl` would overflow the clock.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Recommended TTLs, chosen per entry by how often the data changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TtlPreset {
    Short,
    #[default]
    Medium,
    Long,
}

impl TtlPreset {
    /// The duration this preset stands for.
    pub fn duration(self) -> Duration {
        match self {
            TtlPreset::Short => SHORT_TTL,
            TtlPreset::Medium => MEDIUM_TTL,
            TtlPreset::Long => LONG_TTL,
        }
    }
}

impl From<TtlPreset> for Duration {
    fn from(preset: TtlPreset) -> Self {
        preset.duration()
    }
}

/// Compute the expiry deadline for an entry written at `now`.
pub(crate) fn deadline(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(ttl).unwrap_or_else(|| now + FAR_FUTURE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_durations() {
        assert_eq!(TtlPreset::Short.duration(), Duration::from_secs(300));
        assert_eq!(TtlPreset::Medium.duration(), Duration::from_secs(900));
        assert_eq!(TtlPreset::Long.duration(), Duration::from_secs(3600));
        assert_eq!(TtlPreset::default(), TtlPreset::Medium);
    }

    #[test]
    fn test_preset_into_duration() {
        let ttl: Duration = TtlPreset::Long.into();
        assert_eq!(ttl, LONG_TTL);
    }

    #[test]
    fn test_deadline_saturates() {
        let now = Instant::now();
        assert!(deadline(now, Duration::MAX) > now);
        assert_eq!(deadline(now, SHORT_TTL), now + SHORT_TTL);
    }
}
