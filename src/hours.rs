//! IST clock and the NSE equity session window.
//!
//! The exchange trades Monday through Friday, 09:15 to 15:30 IST. India has
//! no daylight saving, so a fixed +05:30 offset is sufficient. Exchange
//! holidays are not modeled; off-hours orders go out as AMO anyway.

use chrono::{DateTime, Datelike, FixedOffset, NaiveTime, Utc, Weekday};

/// IST offset from UTC in seconds (+05:30).
const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// The IST fixed offset.
pub fn ist() -> FixedOffset {
    FixedOffset::east_opt(IST_OFFSET_SECS).expect("IST offset is in range")
}

/// Current time in IST.
pub fn now_ist() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&ist())
}

/// Current IST time formatted for journals: `YYYY-MM-DD HH:MM:SS`.
pub fn now_str() -> String {
    now_ist().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Whether the given instant falls inside the NSE equity session.
pub fn is_market_open_at(at: DateTime<FixedOffset>) -> bool {
    match at.weekday() {
        Weekday::Sat | Weekday::Sun => return false,
        _ => {}
    }

    let open = NaiveTime::from_hms_opt(9, 15, 0).expect("valid open time");
    let close = NaiveTime::from_hms_opt(15, 30, 0).expect("valid close time");
    let t = at.time();
    t >= open && t <= close
}

/// Whether the market is open right now.
pub fn is_market_open_now() -> bool {
    is_market_open_at(now_ist())
}
