//! Calibrated frames as seen by the tracker.

use chrono::{Duration, NaiveDateTime, Timelike};
use ndarray::{Array2, ArrayView2};
use shared::ImageSize;

use crate::error::TrackError;

/// One calibrated exposure.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Pixel data indexed `[row, col]`
    pub data: Array2<f64>,
    exposure_time: f64,
    /// Observation start, when the header provided one
    pub timestamp: Option<NaiveDateTime>,
}

impl Frame {
    /// Wrap pixel data taken over `exposure_time` seconds, which must be
    /// positive and finite.
    pub fn new(data: Array2<f64>, exposure_time: f64) -> Result<Self, TrackError> {
        if !(exposure_time.is_finite() && exposure_time > 0.0) {
            return Err(TrackError::InvalidExposure(exposure_time));
        }
        Ok(Self {
            data,
            exposure_time,
            timestamp: None,
        })
    }

    /// Exposure time in seconds
    pub fn exposure_time(&self) -> f64 {
        self.exposure_time
    }

    pub fn with_timestamp(mut self, timestamp: NaiveDateTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Attach a timestamp parsed from a `DATE-OBS` header value.
    pub fn with_date_obs(self, date_obs: &str) -> Result<Self, TrackError> {
        Ok(self.with_timestamp(parse_date_obs(date_obs)?))
    }

    pub fn view(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    pub fn size(&self) -> ImageSize {
        ImageSize::of(&self.data.view())
    }
}

/// Parse a `DATE-OBS` value such as `2012-05-20T11:29:23.338`.
///
/// The result is rounded to the nearest whole second; a rounded-up 60th
/// second carries into the next minute.
pub fn parse_date_obs(value: &str) -> Result<NaiveDateTime, TrackError> {
    let parsed = NaiveDateTime::parse_from_str(value.trim(), "%Y-%m-%dT%H:%M:%S%.f").map_err(
        |e| TrackError::InvalidTimestamp {
            value: value.to_string(),
            reason: e.to_string(),
        },
    )?;

    let whole = parsed
        .with_nanosecond(0)
        .ok_or_else(|| TrackError::InvalidTimestamp {
            value: value.to_string(),
            reason: "cannot truncate fractional seconds".to_string(),
        })?;
    if parsed.nanosecond() >= 500_000_000 {
        Ok(whole + Duration::seconds(1))
    } else {
        Ok(whole)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2012, 5, 20)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_parse_rounds_down() {
        assert_eq!(
            parse_date_obs("2012-05-20T11:29:23.338").unwrap(),
            at(11, 29, 23)
        );
    }

    #[test]
    fn test_parse_rounds_up_into_next_minute() {
        assert_eq!(
            parse_date_obs("2012-05-20T11:29:59.7").unwrap(),
            at(11, 30, 0)
        );
    }

    #[test]
    fn test_parse_without_fraction() {
        assert_eq!(parse_date_obs("2012-05-20T11:29:23").unwrap(), at(11, 29, 23));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_date_obs("yesterday"),
            Err(TrackError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn test_frame_builder() {
        let frame = Frame::new(Array2::zeros((4, 6)), 30.0)
            .unwrap()
            .with_date_obs("2012-05-20T11:29:23.338")
            .unwrap();
        assert_eq!(frame.size(), ImageSize::from_width_height(6, 4));
        assert_eq!(frame.timestamp, Some(at(11, 29, 23)));
    }

    #[test]
    fn test_frame_rejects_bad_exposure() {
        for exposure in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                Frame::new(Array2::zeros((4, 4)), exposure),
                Err(TrackError::InvalidExposure(_))
            ));
        }
        assert_eq!(Frame::new(Array2::zeros((4, 4)), 0.5).unwrap().exposure_time(), 0.5);
    }
}
