use chrono::NaiveDate;

use crate::models::ChannelId;

/// `{channel}-{YYYYMMDD}-{sequence:06}`.
///
/// Distinct for distinct sequence numbers on one channel, and ordered the same
/// way as the sequence as long as dates do not go backwards.
pub fn generate(channel: &ChannelId, date: NaiveDate, sequence: u64) -> String {
    format!("{}-{}-{:06}", channel, date.format("%Y%m%d"), sequence)
}

/// Recovers the sequence number from an id built by [`generate`].
pub fn sequence_of(trade_id: &str) -> Option<u64> {
    trade_id.rsplit('-').next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_includes_channel_date_and_sequence() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 7).unwrap();
        assert_eq!(generate(&"A".into(), date, 12), "A-20240507-000012");
    }

    #[test]
    fn sequential_ids_are_distinct_and_ordered() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 7).unwrap();
        let channel: ChannelId = "B".into();
        let ids: Vec<String> = (1..=250).map(|n| generate(&channel, date, n)).collect();
        for pair in ids.windows(2) {
            assert!(pair[0] < pair[1], "{} !< {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn later_date_sorts_after() {
        let d1 = NaiveDate::from_ymd_opt(2024, 5, 7).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2024, 5, 8).unwrap();
        assert!(generate(&"A".into(), d1, 9) < generate(&"A".into(), d2, 10));
    }

    #[test]
    fn sequence_round_trips() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 7).unwrap();
        assert_eq!(sequence_of(&generate(&"A".into(), date, 42)), Some(42));
        assert_eq!(sequence_of("garbage"), None);
    }
}
