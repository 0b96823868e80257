// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Round-trip checks for values read back from the database.

use chrono::{DateTime, Duration, Utc};

use crate::error::MismatchError;

/// How far a timestamp may drift through a write and read back, in
/// milliseconds. Covers truncation to the server's precision, not corruption.
pub const TIMESTAMP_TOLERANCE_MS: i64 = 1_000;

pub fn timestamp_tolerance() -> Duration {
    Duration::milliseconds(TIMESTAMP_TOLERANCE_MS)
}

/// Checks that `read` is within `tolerance` of `written`, in either
/// direction.
pub fn verify(
    written: DateTime<Utc>,
    read: DateTime<Utc>,
    tolerance: Duration,
) -> Result<(), MismatchError> {
    let drift = if read >= written {
        read - written
    } else {
        written - read
    };
    if drift > tolerance {
        return Err(MismatchError {
            written,
            read,
            tolerance,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn written() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 1, 13, 14, 37, 17).unwrap() + Duration::microseconds(259_880)
    }

    #[test]
    fn exact_round_trip() {
        verify(written(), written(), timestamp_tolerance()).unwrap();
    }

    #[test]
    fn truncation_is_tolerated() {
        // Millisecond precision on the server side drops the microseconds.
        let read = Utc.with_ymd_and_hms(2021, 1, 13, 14, 37, 17).unwrap()
            + Duration::milliseconds(259);
        verify(written(), read, timestamp_tolerance()).unwrap();
    }

    #[test]
    fn drift_equal_to_tolerance_passes() {
        let read = written() + timestamp_tolerance();
        verify(written(), read, timestamp_tolerance()).unwrap();
        let read = written() - timestamp_tolerance();
        verify(written(), read, timestamp_tolerance()).unwrap();
    }

    #[test]
    fn drift_beyond_tolerance_fails_in_both_directions() {
        let late = written() + Duration::milliseconds(1_001);
        let err = verify(written(), late, timestamp_tolerance()).unwrap_err();
        assert_eq!(
            err,
            MismatchError {
                written: written(),
                read: late,
                tolerance: timestamp_tolerance(),
            }
        );

        let early = written() - Duration::hours(1);
        assert!(verify(written(), early, timestamp_tolerance()).is_err());
    }
}
