use chrono::{DateTime, Duration, Utc};

/// Inclusive time window used for range fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
  pub start: DateTime<Utc>,
  pub end: DateTime<Utc>,
}

impl DateRange {
  pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
    Self { start, end }
  }

  /// The last `days` days up to now.
  pub fn last_days(days: u32) -> Self {
    let end = Utc::now();
    Self::new(end - Duration::days(i64::from(days)), end)
  }

  /// From `start` up to now.
  pub fn since(start: DateTime<Utc>) -> Self {
    Self::new(start, Utc::now())
  }

  pub fn contains(&self, at: DateTime<Utc>) -> bool {
    at >= self.start && at <= self.end
  }

  /// Start as whole unix seconds, the form Slack expects for `oldest`.
  pub fn oldest_ts(&self) -> String {
    self.start.timestamp().to_string()
  }

  /// End as whole unix seconds, the form Slack expects for `latest`.
  pub fn latest_ts(&self) -> String {
    self.end.timestamp().to_string()
  }
}
