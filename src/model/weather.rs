use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::calendar_date;

/// One day of externally sourced weather. Any channel may be missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSample {
    #[serde(with = "calendar_date")]
    pub date: NaiveDate,
    /// Average temperature, °C.
    #[serde(default, rename = "tavg")]
    pub avg_temperature: Option<f64>,
    #[serde(default, rename = "tmin")]
    pub min_temperature: Option<f64>,
    #[serde(default, rename = "tmax")]
    pub max_temperature: Option<f64>,
    /// Precipitation, mm.
    #[serde(default, rename = "prcp")]
    pub precipitation: Option<f64>,
    /// Snow depth, mm.
    #[serde(default)]
    pub snow: Option<f64>,
    /// Wind direction, degrees.
    #[serde(default, rename = "wdir")]
    pub wind_direction: Option<f64>,
    /// Wind speed, km/h.
    #[serde(default, rename = "wspd")]
    pub wind_speed: Option<f64>,
    /// Peak gust, km/h.
    #[serde(default, rename = "wpgt")]
    pub wind_gust: Option<f64>,
    /// Sea-level pressure, hPa.
    #[serde(default, rename = "pres")]
    pub pressure: Option<f64>,
    /// Sunshine, minutes.
    #[serde(default, rename = "tsun")]
    pub sunshine: Option<f64>,
}

impl WeatherSample {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            avg_temperature: None,
            min_temperature: None,
            max_temperature: None,
            precipitation: None,
            snow: None,
            wind_direction: None,
            wind_speed: None,
            wind_gust: None,
            pressure: None,
            sunshine: None,
        }
    }
}

/// Every day in `[start, end]` without a sample, ascending.
pub fn missing_dates(samples: &[WeatherSample], start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let present: HashSet<NaiveDate> = samples.iter().map(|s| s.date).collect();
    start
        .iter_days()
        .take_while(|day| *day <= end)
        .filter(|day| !present.contains(day))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn decodes_meteostat_fields() {
        let sample: WeatherSample = serde_json::from_value(json!({
            "date": "2021-06-15",
            "tavg": 21.4,
            "tmin": 14.0,
            "tmax": 28.9,
            "prcp": 0.0,
            "snow": null,
            "wdir": 180,
            "wspd": 7.2,
            "wpgt": null,
            "pres": 1014.2,
            "tsun": null
        }))
        .unwrap();

        assert_eq!(sample.date, date(2021, 6, 15));
        assert_eq!(sample.avg_temperature, Some(21.4));
        assert_eq!(sample.wind_direction, Some(180.0));
        assert_eq!(sample.snow, None);
    }

    #[test]
    fn finds_gaps_in_range() {
        let samples = vec![
            WeatherSample::new(date(2022, 3, 1)),
            WeatherSample::new(date(2022, 3, 3)),
        ];
        assert_eq!(
            missing_dates(&samples, date(2022, 3, 1), date(2022, 3, 4)),
            vec![date(2022, 3, 2), date(2022, 3, 4)]
        );
        assert!(missing_dates(&samples, date(2022, 3, 5), date(2022, 3, 4)).is_empty());
    }
}
