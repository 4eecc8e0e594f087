use std::fmt::{self, Display, Formatter};

use serde_json::Value;

use crate::advertising::Advertisement;
use crate::hw::ScanSummary;
use crate::utils::format_rssi;

use super::painter::Painter;

/// One scan result on a single line: model, identity, signal and decoded status.
pub(crate) struct AdvertisementView<'a> {
    advertisement: &'a Advertisement,
    painter: &'a Painter,
}

impl<'a> AdvertisementView<'a> {
    pub(crate) fn new(advertisement: &'a Advertisement, painter: &'a Painter) -> Self {
        Self {
            advertisement,
            painter,
        }
    }
}

impl Display for AdvertisementView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let advertisement = self.advertisement;
        let record = &advertisement.service_data;
        let address = if advertisement.address.is_empty() {
            "-"
        } else {
            advertisement.address.as_str()
        };

        write!(
            f,
            "{} {} {} {} {}",
            self.painter.model(record.model_name),
            self.painter.key(format!("({})", record.model_friendly_name)),
            self.painter.value(&advertisement.id),
            address,
            self.painter
                .rssi(advertisement.rssi, format_rssi(advertisement.rssi)),
        )?;

        // Status structs always serialise to objects; anything else renders nothing.
        let status = serde_json::to_value(&record.status).unwrap_or(Value::Null);
        let mut fields = Vec::new();
        flatten_fields(None, &status, &mut fields);
        for (key, value) in fields {
            write!(f, " {}={}", self.painter.key(key), self.painter.value(value))?;
        }
        Ok(())
    }
}

fn flatten_fields(prefix: Option<&str>, value: &Value, fields: &mut Vec<(String, String)>) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                let key = match prefix {
                    Some(prefix) => format!("{prefix}.{key}"),
                    None => key.clone(),
                };
                flatten_fields(Some(&key), nested, fields);
            }
        }
        Value::Null => {}
        Value::String(text) => {
            if let Some(prefix) = prefix {
                fields.push((prefix.to_owned(), text.clone()));
            }
        }
        other => {
            if let Some(prefix) = prefix {
                fields.push((prefix.to_owned(), other.to_string()));
            }
        }
    }
}

/// Closing line printed after a scan.
pub(crate) struct ScanSummaryView<'a> {
    summary: &'a ScanSummary,
    painter: &'a Painter,
}

impl<'a> ScanSummaryView<'a> {
    pub(crate) fn new(summary: &'a ScanSummary, painter: &'a Painter) -> Self {
        Self { summary, painter }
    }
}

impl Display for ScanSummaryView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} matched of {} received ({})",
            self.painter.value(self.summary.matched().to_string()),
            self.summary.received(),
            self.painter.key(self.summary.stop_reason().to_string()),
        )
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::advertising::{AdvertisementDecoder, AdvertisementMeta};
    use crate::hw::ScanStopReason;

    fn bot_advertisement() -> Advertisement {
        let meta = AdvertisementMeta::builder()
            .id("dev-1")
            .address("C1:2A:3B:4C:5D:6E")
            .rssi(-61)
            .build();
        AdvertisementDecoder::decode(
            &[0x48, 0x00, 0x64],
            &[0x69, 0x09, 0xC1, 0x2A, 0x3B, 0x4C, 0x5D, 0x6E],
            &meta,
        )
        .expect("bot payload decodes")
    }

    #[test]
    fn plain_view_lists_status_fields() {
        let painter = Painter::new(false);
        let advertisement = bot_advertisement();

        let rendered = AdvertisementView::new(&advertisement, &painter).to_string();

        assert!(rendered.starts_with("WoHand (Bot) dev-1 c1:2a:3b:4c:5d:6e -61 dBm"));
        assert!(rendered.contains(" battery=100"));
        assert!(rendered.contains(" mode=false"));
    }

    #[test]
    fn nested_objects_use_dotted_keys() {
        let mut fields = Vec::new();
        let value = serde_json::json!({ "temperature": { "celsius": 21.5 }, "humidity": 40 });

        flatten_fields(None, &value, &mut fields);

        assert!(fields.contains(&("temperature.celsius".to_owned(), "21.5".to_owned())));
        assert!(fields.contains(&("humidity".to_owned(), "40".to_owned())));
    }

    #[test]
    fn summary_reports_counts_and_reason() {
        let painter = Painter::new(false);
        let summary = ScanSummary::new(4, 2, ScanStopReason::DurationElapsed);

        assert_eq!(
            "2 matched of 4 received (scan duration elapsed)",
            ScanSummaryView::new(&summary, &painter).to_string()
        );
    }
}
