// Mapper from the portal's time_series.json body to domain samples
use crate::domain::error::{EnlightenError, Result};
use crate::domain::raw_day::{ChannelSample, DeviceChannels, RawDaySample};
use chrono::NaiveDate;
use serde_json::Value;

const NON_DEVICE_KEYS: [&str; 2] = ["date", "haiku"];

/// Decodes `{"date": "YYYY-MM-DD", "<device>": {"POWR": [[ts, watts, max], ...], ...}}`.
/// The optional third sample element is not kept.
///
/// Entries that are not device objects are ignored, as are channels that are
/// not sample arrays (`stat_info`, `ch_id`). Malformed samples are skipped.
pub fn decode_day(body: Value) -> Result<RawDaySample> {
    let Value::Object(map) = body else {
        return Err(EnlightenError::Payload("expected a JSON object".to_string()));
    };

    let date_str = map
        .get("date")
        .and_then(Value::as_str)
        .ok_or_else(|| EnlightenError::Payload("missing date field".to_string()))?;
    let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .map_err(|e| EnlightenError::Payload(format!("bad date {:?}: {}", date_str, e)))?;

    let mut day = RawDaySample::new(date);
    for (device_id, entry) in &map {
        if NON_DEVICE_KEYS.contains(&device_id.as_str()) {
            continue;
        }
        let Value::Object(channels) = entry else {
            continue;
        };

        let mut device = DeviceChannels::default();
        for (channel, samples) in channels {
            let Some(rows) = samples.as_array() else {
                continue;
            };
            let mut decoded = Vec::with_capacity(rows.len());
            for row in rows {
                match parse_sample(row) {
                    Some(sample) => decoded.push(sample),
                    None => tracing::warn!(
                        "Skipping malformed {} sample for {}: {}",
                        channel,
                        device_id,
                        row
                    ),
                }
            }
            device.channels.insert(channel.clone(), decoded);
        }
        day.devices.insert(device_id.clone(), device);
    }

    Ok(day)
}

fn parse_sample(row: &Value) -> Option<ChannelSample> {
    let items = row.as_array()?;
    let timestamp = items.first()?.as_f64()?.floor();
    // `as` would saturate, placing absurd timestamps at the i64 limits.
    if !(i64::MIN as f64..i64::MAX as f64).contains(&timestamp) {
        return None;
    }
    let value = items.get(1)?.as_f64()?;

    Some(ChannelSample {
        timestamp: timestamp as i64,
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::raw_day::POWER_CHANNEL;
    use serde_json::json;

    #[test]
    fn test_decode_day() {
        let body = json!({
            "date": "2020-04-22",
            "haiku": "sun on the panels",
            "121703012345": {
                "ch_id": 1,
                "POWR": [[1587549600, 212, 250], [1587550500, 230.5, 250]],
                "DCV": [[1587549600, 31.2]],
                "stat_info": {}
            },
            "121703067890": {
                "POWR": [[1587549600, 198, 250]]
            }
        });

        let day = decode_day(body).unwrap();
        assert_eq!(day.date, NaiveDate::from_ymd_opt(2020, 4, 22).unwrap());
        assert_eq!(day.devices.len(), 2);

        let first = &day.devices["121703012345"];
        assert_eq!(first.power().len(), 2);
        assert_eq!(first.power()[1].value, 230.5);
        assert_eq!(first.channels["DCV"][0].value, 31.2);
        assert!(!first.channels.contains_key("stat_info"));
        assert_eq!(day.devices["121703067890"].channels[POWER_CHANNEL].len(), 1);
    }

    #[test]
    fn test_malformed_samples_are_skipped() {
        let body = json!({
            "date": "2020-04-22",
            "A": {"POWR": [[1587549600, null], "oops", [1587550500, 10]]}
        });

        let day = decode_day(body).unwrap();
        let power = day.devices["A"].power();
        assert_eq!(power.len(), 1);
        assert_eq!(power[0].timestamp, 1587550500);
    }

    #[test]
    fn test_out_of_range_timestamps_are_skipped() {
        let body = json!({
            "date": "2020-04-22",
            "A": {"POWR": [[-1e300, 5.0], [1e300, 6.0], [1587549600, 10.0]]}
        });

        let day = decode_day(body).unwrap();
        let power = day.devices["A"].power();
        assert_eq!(power.len(), 1);
        assert_eq!(power[0].timestamp, 1587549600);
        assert_eq!(power[0].value, 10.0);
    }

    #[test]
    fn test_missing_or_bad_date_is_payload_error() {
        assert!(matches!(
            decode_day(json!({"A": {}})),
            Err(EnlightenError::Payload(_))
        ));
        assert!(matches!(
            decode_day(json!({"date": "22/04/2020"})),
            Err(EnlightenError::Payload(_))
        ));
        assert!(matches!(
            decode_day(json!([1, 2])),
            Err(EnlightenError::Payload(_))
        ));
    }
}
