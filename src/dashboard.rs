//! Health dashboard bundle: a fixed daily summary plus 7/30-day trends,
//! served from a short-lived cache.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const CACHE_TTL_SECONDS: i64 = 300;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    pub date: String,
    pub calories_consumed: u32,
    pub calorie_goal: u32,
    pub systolic: u32,
    pub diastolic: u32,
    pub weight: f64,
    pub exercise_minutes: u32,
    pub hydration_liters: f64,
    pub medication_adherence: f64,
    pub missed_doses: u32,
    pub steps: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TrendPoint {
    pub date: String,
    pub systolic: u32,
    pub diastolic: u32,
    pub weight: f64,
    pub calories: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrendBundle {
    pub seven_day: Vec<TrendPoint>,
    pub thirty_day: Vec<TrendPoint>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DashboardBundle {
    pub summary: DailySummary,
    pub trend: TrendBundle,
    pub notes: Vec<String>,
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub fn daily_summary(date: NaiveDate) -> DailySummary {
    DailySummary {
        date: date.to_string(),
        calories_consumed: 1920,
        calorie_goal: 2000,
        systolic: 138,
        diastolic: 86,
        weight: 68.4,
        exercise_minutes: 45,
        hydration_liters: 2.1,
        medication_adherence: 0.92,
        missed_doses: 1,
        steps: 8400,
    }
}

/// `days` points ending at `today`, oldest first, wobbling on a 4-day cycle
/// around a fixed baseline.
pub fn trend(days: u32, today: NaiveDate) -> Vec<TrendPoint> {
    let (systolic, diastolic, weight, calories) = (134.0, 82.0, 68.5, 1880.0);
    (0..days)
        .map(|offset| {
            let modifier = f64::from(offset % 4) * 1.2;
            let date = today - Duration::days(i64::from(days - offset - 1));
            TrendPoint {
                date: date.to_string(),
                systolic: (systolic + modifier) as u32,
                diastolic: (diastolic + modifier * 0.5) as u32,
                weight: ((weight + modifier * 0.08) * 10.0_f64).round() / 10.0,
                calories: (calories + modifier * 15.0) as u32,
            }
        })
        .collect()
}

pub fn build_bundle(today: NaiveDate) -> DashboardBundle {
    DashboardBundle {
        summary: daily_summary(today),
        trend: TrendBundle {
            seven_day: trend(7, today),
            thirty_day: trend(30, today),
        },
        notes: vec![
            "Daily summary and 7/30-day trends delivered in a single bundle.".to_string(),
            format!("Cached for {} seconds to keep response times low.", CACHE_TTL_SECONDS),
        ],
    }
}

/// Last bundle handed out and when it was built.
#[derive(Debug, Default)]
pub struct DashboardCache {
    value: Option<DashboardBundle>,
    written_at: Option<DateTime<Utc>>,
}

impl DashboardCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached bundle while it is younger than the TTL, otherwise a fresh one.
    pub fn get(&mut self, clock: &dyn Clock, force_refresh: bool) -> DashboardBundle {
        let now = clock.now();
        if !force_refresh {
            if let (Some(bundle), Some(written_at)) = (&self.value, self.written_at) {
                if now - written_at < Duration::seconds(CACHE_TTL_SECONDS) {
                    debug!("Dashboard cache hit (age {}s)", (now - written_at).num_seconds());
                    return bundle.clone();
                }
            }
        }

        let bundle = build_bundle(now.date_naive());
        self.value = Some(bundle.clone());
        self.written_at = Some(now);
        bundle
    }
}
