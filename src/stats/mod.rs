//! Season-normalized statistics.
//!
//! Dates from different years are rewritten onto one reference year so that
//! several seasons overlay on a single horizontal axis. Everything here is a
//! pure function of its inputs.
//!
//! ```text
//!   actions ──┐                      ┌─► per action type ─► one series per season
//!             ├─► filter by season ──┤
//!   weather ──┘   + normalize date   └─► per channel ─────► one series per season
//! ```
//!
//! ## Example
//!
//! ```
//! use chrono::NaiveDate;
//! use vineyard_sync::model::{Action, ActionType};
//! use vineyard_sync::stats::{aggregate, VarietyFilter};
//!
//! let date = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
//! let actions = vec![
//!     Action::new(ActionType::Harvest, date(2022, 9, 10), "hand picked"),
//!     Action::new(ActionType::Planting, date(2021, 4, 1), ""),
//! ];
//!
//! let stats = aggregate(&actions, &[], &[2021, 2022], &VarietyFilter::All, 2000);
//! let harvest = stats.action_series(ActionType::Harvest);
//! assert_eq!(harvest.len(), 2);
//! assert_eq!(harvest[1].points[0].date, date(2000, 9, 10));
//! assert!(stats.action_series(ActionType::Brix).iter().all(|s| s.points.is_empty()));
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{Datelike, NaiveDate};

use crate::model::{Action, ActionType, WeatherSample};

/// Rewrite `date` onto `reference_year`, keeping month and day.
///
/// February 29 maps to February 28 when the reference year is not a leap
/// year. `None` only when the reference year is outside chrono's range.
pub fn normalize_date(date: NaiveDate, reference_year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(reference_year, date.month(), date.day())
        .or_else(|| NaiveDate::from_ymd_opt(reference_year, date.month(), 28))
}

/// UTC-midnight epoch milliseconds of the normalized date.
pub fn normalized_timestamp(date: NaiveDate, reference_year: i32) -> Option<i64> {
    let normalized = normalize_date(date, reference_year)?;
    Some(normalized.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis())
}

/// Which actions count, by their variety tags.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VarietyFilter {
    #[default]
    All,
    /// Actions tagged with at least one of these variety ids. Untagged
    /// actions never match.
    Only(BTreeSet<String>),
}

impl VarietyFilter {
    pub fn only<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        VarietyFilter::Only(ids.into_iter().map(Into::into).collect())
    }

    pub fn matches(&self, action: &Action) -> bool {
        match self {
            VarietyFilter::All => true,
            VarietyFilter::Only(ids) => action.variety_ids.iter().any(|id| ids.contains(id)),
        }
    }
}

/// One action plotted on the normalized axis.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionPoint {
    pub action_id: String,
    pub date: NaiveDate,
    pub timestamp: i64,
    /// `"{season} - {type}"`.
    pub title: String,
    /// Raw description.
    pub text: String,
}

/// Actions of one type within one season.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionSeries {
    pub season: i32,
    pub name: String,
    pub points: Vec<ActionPoint>,
}

/// Weather channels charted per season.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WeatherChannel {
    AvgTemperature,
    MinTemperature,
    MaxTemperature,
    Precipitation,
}

impl WeatherChannel {
    pub const ALL: [WeatherChannel; 4] = [
        WeatherChannel::AvgTemperature,
        WeatherChannel::MinTemperature,
        WeatherChannel::MaxTemperature,
        WeatherChannel::Precipitation,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            WeatherChannel::AvgTemperature => "Average temperature",
            WeatherChannel::MinTemperature => "Minimum temperature",
            WeatherChannel::MaxTemperature => "Maximum temperature",
            WeatherChannel::Precipitation => "Precipitation",
        }
    }

    pub fn value(&self, sample: &WeatherSample) -> Option<f64> {
        match self {
            WeatherChannel::AvgTemperature => sample.avg_temperature,
            WeatherChannel::MinTemperature => sample.min_temperature,
            WeatherChannel::MaxTemperature => sample.max_temperature,
            WeatherChannel::Precipitation => sample.precipitation,
        }
    }
}

impl fmt::Display for WeatherChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeatherPoint {
    pub date: NaiveDate,
    pub timestamp: i64,
    pub value: f64,
}

/// One channel within one season.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSeries {
    pub channel: WeatherChannel,
    pub season: i32,
    pub name: String,
    pub points: Vec<WeatherPoint>,
}

/// Overlay-ready output of [`aggregate`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Statistics {
    /// Every action type is present, each with one series per season.
    pub actions: BTreeMap<ActionType, Vec<ActionSeries>>,
    /// Channel-major, then season in selection order.
    pub weather: Vec<WeatherSeries>,
}

impl Statistics {
    pub fn action_series(&self, kind: ActionType) -> &[ActionSeries] {
        self.actions.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn weather_series(&self, channel: WeatherChannel, season: i32) -> Option<&WeatherSeries> {
        self.weather
            .iter()
            .find(|s| s.channel == channel && s.season == season)
    }
}

/// Build action and weather timelines for the selected seasons.
///
/// Seasons keep their given order; repeats are ignored. Within a series,
/// points are stably sorted by normalized date, so equal dates keep input
/// order.
pub fn aggregate(
    actions: &[Action],
    weather: &[WeatherSample],
    seasons: &[i32],
    filter: &VarietyFilter,
    reference_year: i32,
) -> Statistics {
    let seasons = distinct(seasons);

    let mut by_type = BTreeMap::new();
    for kind in ActionType::ALL {
        let series = seasons
            .iter()
            .map(|season| action_series(actions, kind, *season, filter, reference_year))
            .collect();
        by_type.insert(kind, series);
    }

    let mut weather_series = Vec::with_capacity(WeatherChannel::ALL.len() * seasons.len());
    for channel in WeatherChannel::ALL {
        for season in &seasons {
            weather_series.push(channel_series(weather, channel, *season, reference_year));
        }
    }

    Statistics {
        actions: by_type,
        weather: weather_series,
    }
}

fn distinct(seasons: &[i32]) -> Vec<i32> {
    let mut seen = BTreeSet::new();
    seasons.iter().copied().filter(|s| seen.insert(*s)).collect()
}

fn action_series(
    actions: &[Action],
    kind: ActionType,
    season: i32,
    filter: &VarietyFilter,
    reference_year: i32,
) -> ActionSeries {
    let mut points: Vec<ActionPoint> = actions
        .iter()
        .filter(|a| a.kind == kind && a.date.year() == season && filter.matches(a))
        .filter_map(|a| {
            Some(ActionPoint {
                action_id: a.id.clone(),
                date: normalize_date(a.date, reference_year)?,
                timestamp: normalized_timestamp(a.date, reference_year)?,
                title: format!("{} - {}", season, kind.label()),
                text: a.description.clone(),
            })
        })
        .collect();
    points.sort_by_key(|p| p.date);

    ActionSeries {
        season,
        name: format!("{} - {}", kind.label(), season),
        points,
    }
}

fn channel_series(
    weather: &[WeatherSample],
    channel: WeatherChannel,
    season: i32,
    reference_year: i32,
) -> WeatherSeries {
    let mut points: Vec<WeatherPoint> = weather
        .iter()
        .filter(|s| s.date.year() == season)
        .filter_map(|s| {
            Some(WeatherPoint {
                date: normalize_date(s.date, reference_year)?,
                timestamp: normalized_timestamp(s.date, reference_year)?,
                value: channel.value(s)?,
            })
        })
        .collect();
    points.sort_by_key(|p| p.date);

    WeatherSeries {
        channel,
        season,
        name: format!("{} - {}", channel.label(), season),
        points,
    }
}
