//! Minimal hour-window computation and target-hour extraction.
//!
//! Split out from [`crate::forecast::client`] so the arithmetic can be unit
//! tested without any network dependency — this is the formula in full:
//! given "now" and a target date, compute the smallest `hours` parameter
//! the upstream forecast API needs in order for its response window to
//! cover all four target hours (09/12/15/18 JST) of the target date.

use super::types::Forecast;
use chrono::{DateTime, NaiveDate, TimeZone};
use chrono_tz::Asia::Tokyo;
use chrono_tz::Tz;

/// The fixed sampling points used throughout the system.
pub const TARGET_HOURS: [u32; 4] = [9, 12, 15, 18];

/// `target_date @ 08:00 JST` — the start of the filter window.
pub fn window_start(target_date: NaiveDate) -> DateTime<Tz> {
    Tokyo
        .from_local_datetime(&target_date.and_hms_opt(8, 0, 0).expect("valid time"))
        .single()
        .expect("Asia/Tokyo has no DST gaps")
}

/// `target_date @ 19:00 JST` — the end of the filter window.
pub fn window_end(target_date: NaiveDate) -> DateTime<Tz> {
    Tokyo
        .from_local_datetime(&target_date.and_hms_opt(19, 0, 0).expect("valid time"))
        .single()
        .expect("Asia/Tokyo has no DST gaps")
}

/// Compute the minimal `hours` request parameter covering `[t_first, t_last]`.
///
/// - `now < t_first`: `ceil((t_first - now) / 1h) + 11` (covers 08:00-19:00 of
///   the target date).
/// - otherwise: `max(1, ceil((t_last - now) / 1h) + 1)`.
pub fn compute_hours(now: DateTime<Tz>, target_date: NaiveDate) -> u32 {
    let t_first = window_start(target_date);
    let t_last = window_end(target_date);
    if now < t_first {
        let secs = (t_first - now).num_seconds().max(0);
        let hours = ceil_div_3600(secs);
        hours + 11
    } else {
        let secs = (t_last - now).num_seconds().max(0);
        let hours = ceil_div_3600(secs);
        hours.max(1)
    }
}

fn ceil_div_3600(secs: i64) -> u32 {
    ((secs + 3599) / 3600) as u32
}

/// Filter `forecasts` to the `[t_first, t_last]` window on `target_date`, then
/// pick, for each of [`TARGET_HOURS`], the forecast with the smallest
/// absolute time delta to that target hour.
pub fn select_target_hour_forecasts(
    forecasts: &[Forecast],
    target_date: NaiveDate,
) -> Vec<Forecast> {
    let t_first = window_start(target_date).with_timezone(&chrono::Utc);
    let t_last = window_end(target_date).with_timezone(&chrono::Utc);

    let windowed: Vec<&Forecast> = forecasts
        .iter()
        .filter(|f| f.datetime >= t_first && f.datetime <= t_last)
        .collect();

    let mut selected = Vec::with_capacity(TARGET_HOURS.len());
    for hour in TARGET_HOURS {
        let target_dt = Tokyo
            .from_local_datetime(&target_date.and_hms_opt(hour, 0, 0).expect("valid time"))
            .single()
            .expect("Asia/Tokyo has no DST gaps")
            .with_timezone(&chrono::Utc);
        if let Some(nearest) = windowed
            .iter()
            .min_by_key(|f| (f.datetime - target_dt).num_seconds().abs())
        {
            selected.push((*nearest).clone());
        }
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn jst(y: i32, m: u32, d: u32, h: u32, mi: u32) -> DateTime<Tz> {
        Tokyo
            .from_local_datetime(
                &NaiveDate::from_ymd_opt(y, m, d)
                    .unwrap()
                    .and_hms_opt(h, mi, 0)
                    .unwrap(),
            )
            .single()
            .unwrap()
    }

    #[test]
    fn compute_hours_before_window_start() {
        // now 09:00 JST on day D, target D+1 -> t_first-now = 23h,
        // ceil(23) + 11 = 34, matching the worked example and
        // original_source's get_forecast_for_next_day_hours.
        let now = jst(2026, 7, 28, 9, 0);
        let target = NaiveDate::from_ymd_opt(2026, 7, 29).unwrap();
        assert_eq!(compute_hours(now, target), 34);
    }

    #[test]
    fn compute_hours_after_window_start_uses_tail_formula() {
        // now already past 08:00 of the target date itself.
        let now = jst(2026, 7, 29, 10, 0);
        let target = NaiveDate::from_ymd_opt(2026, 7, 29).unwrap();
        let hours = compute_hours(now, target);
        // t_last - now = 9h exactly -> ceil(9)+1 = 10
        assert_eq!(hours, 10);
    }

    #[test]
    fn compute_hours_floors_at_one() {
        let now = jst(2026, 7, 29, 18, 59);
        let target = NaiveDate::from_ymd_opt(2026, 7, 29).unwrap();
        assert_eq!(compute_hours(now, target), 1);
    }

    #[test]
    fn select_target_hour_forecasts_picks_nearest() {
        let target = NaiveDate::from_ymd_opt(2026, 7, 29).unwrap();
        let base = window_start(target).with_timezone(&chrono::Utc);
        let forecasts: Vec<Forecast> = (0..12)
            .map(|i| Forecast {
                datetime: base + Duration::hours(i),
                temperature: i as f64,
                weather_code: "100".to_string(),
                weather_description: "sunny".to_string(),
                precipitation_mm: 0.0,
                humidity_pct: 50.0,
                wind_speed_mps: 1.0,
                wind_direction_deg: 0.0,
            })
            .collect();
        let selected = select_target_hour_forecasts(&forecasts, target);
        assert_eq!(selected.len(), 4);
        // base is 08:00 JST; +1h = 09:00 JST is the first target hour.
        assert_eq!(selected[0].temperature, 1.0);
    }

    #[test]
    fn select_target_hour_forecasts_empty_when_none_in_window() {
        let target = NaiveDate::from_ymd_opt(2026, 7, 29).unwrap();
        let forecasts = vec![Forecast {
            datetime: "2020-01-01T00:00:00Z".parse().unwrap(),
            temperature: 1.0,
            weather_code: "100".to_string(),
            weather_description: "sunny".to_string(),
            precipitation_mm: 0.0,
            humidity_pct: 50.0,
            wind_speed_mps: 1.0,
            wind_direction_deg: 0.0,
        }];
        assert!(select_target_hour_forecasts(&forecasts, target).is_empty());
    }
}
