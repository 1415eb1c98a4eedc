//! Timestamp with time zone values
//!
//! The short form packs the epoch millis and the zone key into an `i64`. The long form
//! appends the picoseconds of the milli to the short form, 12 bytes in total

use std::fmt::Display;

/// Number of bits the millis are shifted in the packed form
pub const MILLIS_SHIFT: u32 = 12;
/// Mask of the zone key in the packed form
pub const TIME_ZONE_MASK: i64 = 0xFFF;
/// Max epoch millis that can be packed
pub const MAX_PACKED_MILLIS: i64 = i64::MAX >> MILLIS_SHIFT;
/// Min epoch millis that can be packed
pub const MIN_PACKED_MILLIS: i64 = i64::MIN >> MILLIS_SHIFT;
/// Picoseconds in a millisecond, the fraction of [`LongTimestampTz`] is less than it
pub const PICOSECONDS_PER_MILLISECOND: u32 = 1_000_000_000;

/// Pack the epoch millis and zone key, returns `None` if the millis or the key do not
/// fit into the packed form
#[inline]
pub fn pack_date_time_with_zone(epoch_millis: i64, zone_key: u16) -> Option<i64> {
    if !(MIN_PACKED_MILLIS..=MAX_PACKED_MILLIS).contains(&epoch_millis)
        || zone_key as i64 > TIME_ZONE_MASK
    {
        return None;
    }
    Some((epoch_millis << MILLIS_SHIFT) | zone_key as i64)
}

/// Extract the epoch millis from the packed form
#[inline]
pub fn unpack_millis_utc(packed: i64) -> i64 {
    packed >> MILLIS_SHIFT
}

/// Extract the zone key from the packed form
#[inline]
pub fn unpack_zone_key(packed: i64) -> u16 {
    (packed & TIME_ZONE_MASK) as u16
}

/// Timestamp with time zone whose precision is higher than millisecond
///
/// Note that the derived `PartialEq` compares the zone key too, it is the identity of
/// the value. SQL equality only compares the instant, see the operators of
/// [`LogicalType::TimestampWithTimeZone`](crate::types::LogicalType::TimestampWithTimeZone)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LongTimestampTz {
    epoch_millis: i64,
    picos_of_milli: u32,
    zone_key: u16,
}

impl LongTimestampTz {
    /// Create a new [`LongTimestampTz`]. Returns `None` if the millis can not be packed
    /// or the picos is not less than [`PICOSECONDS_PER_MILLISECOND`]
    pub fn try_new(epoch_millis: i64, picos_of_milli: u32, zone_key: u16) -> Option<Self> {
        pack_date_time_with_zone(epoch_millis, zone_key)?;
        if picos_of_milli >= PICOSECONDS_PER_MILLISECOND {
            return None;
        }
        Some(Self {
            epoch_millis,
            picos_of_milli,
            zone_key,
        })
    }

    /// Create from the packed millis with zone and the picos fraction
    #[inline]
    pub fn from_packed(packed: i64, picos_of_milli: u32) -> Self {
        Self {
            epoch_millis: unpack_millis_utc(packed),
            picos_of_milli,
            zone_key: unpack_zone_key(packed),
        }
    }

    /// Epoch millis in UTC
    #[inline]
    pub fn epoch_millis(&self) -> i64 {
        self.epoch_millis
    }

    /// Picoseconds of the milli
    #[inline]
    pub fn picos_of_milli(&self) -> u32 {
        self.picos_of_milli
    }

    /// Key of the time zone
    #[inline]
    pub fn zone_key(&self) -> u16 {
        self.zone_key
    }

    /// The packed millis with zone. Construction guarantees it fits
    #[inline]
    pub fn packed(&self) -> i64 {
        (self.epoch_millis << MILLIS_SHIFT) | self.zone_key as i64
    }
}

impl Display for LongTimestampTz {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{:09} [zone {}]",
            self.epoch_millis, self.picos_of_milli, self.zone_key
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_unpack() {
        let packed = pack_date_time_with_zone(-1_500, 7).unwrap();
        assert_eq!(unpack_millis_utc(packed), -1_500);
        assert_eq!(unpack_zone_key(packed), 7);

        assert!(pack_date_time_with_zone(MAX_PACKED_MILLIS + 1, 0).is_none());
        assert!(pack_date_time_with_zone(0, 0x1000).is_none());
    }

    #[test]
    fn test_long_timestamp_tz() {
        let ts = LongTimestampTz::try_new(1_000, 123, 5).unwrap();
        assert_eq!(LongTimestampTz::from_packed(ts.packed(), 123), ts);
        assert!(LongTimestampTz::try_new(0, PICOSECONDS_PER_MILLISECOND, 0).is_none());
        assert_eq!(ts.to_string(), "1000.000000123 [zone 5]");
    }
}
