//! Clock port - 日付の抽象化
//!
//! 「今日」は壁時計の日付だけで決まる。サーバー側の cron はない。

use chrono::{DateTime, Days, Local, NaiveDate, Utc};

/// Clock は現在の日付と時刻を提供
///
/// # テスト容易性
/// - trait により時刻を差し替え可能
/// - テストでは FixedClock を使用
pub trait Clock: Send + Sync {
    /// ユーザーのローカル日付での「今日」
    fn today(&self) -> NaiveDate;

    /// completed_at に入れる時刻
    fn now(&self) -> DateTime<Utc>;

    fn yesterday(&self) -> NaiveDate {
        let today = self.today();
        today.checked_sub_days(Days::new(1)).unwrap_or(today)
    }
}

/// SystemClock は本番用（ローカルタイムゾーンの日付）
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// FixedClock はテスト用
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    now: DateTime<Utc>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    /// 指定日の正午 (UTC) に固定
    pub fn on(today: NaiveDate) -> Self {
        let noon = today.and_hms_opt(12, 0, 0).unwrap_or_default();
        Self::new(noon.and_utc())
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }

    fn now(&self) -> DateTime<Utc> {
        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fixed_clock_reports_today_and_yesterday() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap());

        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());
        // 月またぎ
        assert_eq!(clock.yesterday(), NaiveDate::from_ymd_opt(2026, 2, 28).unwrap());
    }

    #[test]
    fn fixed_clock_on_day_is_stable() {
        let day = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let clock = FixedClock::on(day);

        assert_eq!(clock.today(), day);
        assert_eq!(clock.now(), clock.now());
    }
}
