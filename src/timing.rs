//! Bit timing calculation.
//!
//! A CAN bit is split into time quanta: one synchronization quantum, the propagation segment, and
//! the two phase segments around the sample point. [`compute_bit_timing`] derives the register
//! values for a requested bit rate from the module clock and the expected propagation delay of
//! the bus, and rejects combinations the controller cannot represent instead of clamping them.

use core::convert::TryFrom;
use core::fmt;
use core::ops::RangeInclusive;
use core::time::Duration;

use thiserror_no_std::Error;

use crate::registers::bit;

/// Quanta in the synchronization segment.
const SYNC_SEG: i64 = 1;

/// Valid number of time quanta per bit.
pub const QUANTA_PER_BIT: RangeInclusive<u8> = 4..=25;

/// Valid register values of the phase segments, and valid propagation segment lengths.
const SEGMENT: RangeInclusive<i64> = 1..=8;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Input of the bit timing calculation.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BitTimingRequest {
    /// Requested bit rate in bit/s.
    pub bit_rate: u32,
    /// Time quanta per bit, 4 to 25.
    pub quanta_per_bit: u8,
    /// Propagation delay of the bus (transceivers plus wire, both directions).
    pub delay: Duration,
    /// Module clock in Hz.
    pub system_clock: u32,
}

/// Register values of the CANBIT fields.
///
/// All values use the "length minus one" register convention.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BitTiming {
    /// Baud rate prescaler, 0 to 63.
    pub prescaler: u8,
    /// Resynchronization jump width, 0 to 3.
    pub sync_jump_width: u8,
    /// Time segment before the sample point (propagation plus phase 1), 1 to 8.
    pub phase_seg1: u8,
    /// Time segment after the sample point, 1 to 7.
    pub phase_seg2: u8,
}

impl BitTiming {
    /// Returns the CANBIT register value.
    pub fn bit_register(&self) -> u32 {
        u32::from(self.prescaler & 0x3F) << bit::BRP_SHIFT
            | u32::from(self.sync_jump_width) << bit::SJW_SHIFT
            | u32::from(self.phase_seg1) << bit::TSEG1_SHIFT
            | u32::from(self.phase_seg2) << bit::TSEG2_SHIFT
    }

    /// Returns the CANBRPE register value (prescaler bits above the six held by CANBIT).
    pub fn extension_register(&self) -> u32 {
        u32::from(self.prescaler >> 6)
    }
}

/// The bit timing quantity that failed validation.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimingField {
    BitRate,
    QuantaPerBit,
    SystemClock,
    Prescaler,
    SyncJumpWidth,
    PhaseSeg1,
    PhaseSeg2,
    Propagation,
}

impl fmt::Display for TimingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimingField::BitRate => "bit rate",
            TimingField::QuantaPerBit => "quanta per bit",
            TimingField::SystemClock => "system clock",
            TimingField::Prescaler => "prescaler",
            TimingField::SyncJumpWidth => "sync jump width",
            TimingField::PhaseSeg1 => "phase segment 1",
            TimingField::PhaseSeg2 => "phase segment 2",
            TimingField::Propagation => "propagation segment",
        };
        f.write_str(name)
    }
}

/// Bit timing configuration errors.
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimingError {
    /// A request parameter or derived register value is outside its legal range.
    #[error("{field} out of range: {value}")]
    OutOfRange { field: TimingField, value: i64 },
}

fn check(field: TimingField, value: i64, range: RangeInclusive<i64>) -> Result<(), TimingError> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(TimingError::OutOfRange { field, value })
    }
}

/// Integer division rounding halves up.
fn div_round(num: u128, den: u128) -> u128 {
    num.saturating_add(den / 2) / den
}

/// Computes the CANBIT field values for `req`.
///
/// The calculation is exact integer arithmetic, so equal requests always give equal results.
pub fn compute_bit_timing(req: &BitTimingRequest) -> Result<BitTiming, TimingError> {
    check(TimingField::BitRate, i64::from(req.bit_rate), 1..=i64::MAX)?;
    check(TimingField::SystemClock, i64::from(req.system_clock), 1..=i64::MAX)?;
    if !QUANTA_PER_BIT.contains(&req.quanta_per_bit) {
        return Err(TimingError::OutOfRange {
            field: TimingField::QuantaPerBit,
            value: i64::from(req.quanta_per_bit),
        });
    }

    let quanta = i64::from(req.quanta_per_bit);
    // Quanta per second.
    let quantum_rate = u128::from(req.bit_rate) * quanta as u128;

    let clocks_per_quantum = div_round(u128::from(req.system_clock), quantum_rate) as i64;
    let prescaler = clocks_per_quantum - 1;

    // delay / quantum
    let propagation = div_round(req.delay.as_nanos().saturating_mul(quantum_rate), NANOS_PER_SEC);
    let propagation = i64::try_from(propagation).unwrap_or(i64::MAX);

    let phase_total = quanta.saturating_sub(propagation) - SYNC_SEG;
    let phase1 = phase_total.div_euclid(2);
    let phase2 = phase_total - phase1;

    let seg1 = propagation + phase1 - SYNC_SEG;
    let seg2 = phase2 - 1;

    // Largest width not exceeding either segment, then the register's "minus one".
    let sjw = 4_i64.min(seg1).min(seg2) - 1;

    check(TimingField::SyncJumpWidth, sjw, bit::SJW)?;
    check(TimingField::PhaseSeg1, seg1, SEGMENT)?;
    check(TimingField::PhaseSeg2, seg2, SEGMENT)?;
    check(TimingField::Propagation, propagation, SEGMENT)?;
    check(TimingField::Prescaler, prescaler, bit::BRP)?;
    check(TimingField::PhaseSeg2, seg2, 1..=bit::TSEG2_MAX)?;

    Ok(BitTiming {
        prescaler: prescaler as u8,
        sync_jump_width: sjw as u8,
        phase_seg1: seg1 as u8,
        phase_seg2: seg2 as u8,
    })
}

impl BitTimingRequest {
    /// Shorthand for [`compute_bit_timing`].
    pub fn compute(&self) -> Result<BitTiming, TimingError> {
        compute_bit_timing(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(
        bit_rate: u32,
        quanta_per_bit: u8,
        system_clock: u32,
        delay_ns: u64,
    ) -> BitTimingRequest {
        BitTimingRequest {
            bit_rate,
            quanta_per_bit,
            delay: Duration::from_nanos(delay_ns),
            system_clock,
        }
    }

    #[test]
    fn reference_500k() {
        let timing = compute_bit_timing(&request(500_000, 10, 8_000_000, 100)).unwrap();
        assert_eq!(
            timing,
            BitTiming {
                prescaler: 1,
                sync_jump_width: 2,
                phase_seg1: 4,
                phase_seg2: 3,
            }
        );
        assert_eq!(timing.bit_register(), 0x3481);
        assert_eq!(timing.extension_register(), 0);
    }

    #[test]
    fn reference_125k() {
        let timing = compute_bit_timing(&request(125_000, 16, 16_000_000, 300)).unwrap();
        assert_eq!(
            timing,
            BitTiming {
                prescaler: 7,
                sync_jump_width: 3,
                phase_seg1: 7,
                phase_seg2: 6,
            }
        );
    }

    #[test]
    fn deterministic() {
        let req = request(250_000, 8, 16_000_000, 250);
        let first = compute_bit_timing(&req);
        for _ in 0..16 {
            assert_eq!(compute_bit_timing(&req), first);
        }
        assert_eq!(req.compute(), first);
    }

    #[test]
    fn results_stay_in_register_ranges() {
        for &rate in [125_000u32, 250_000, 500_000, 1_000_000].iter() {
            for n in QUANTA_PER_BIT {
                for &delay in [50u64, 100, 200, 400, 800].iter() {
                    if let Ok(t) = compute_bit_timing(&request(rate, n, 16_000_000, delay)) {
                        assert!(t.prescaler <= 63);
                        assert!(t.sync_jump_width <= 3);
                        assert!((1..=8).contains(&t.phase_seg1));
                        assert!((1..=7).contains(&t.phase_seg2));
                        assert!(t.sync_jump_width + 1 <= t.phase_seg1);
                        assert!(t.sync_jump_width + 1 <= t.phase_seg2);
                    }
                }
            }
        }
    }

    #[test]
    fn zero_delay_has_no_propagation_segment() {
        assert_eq!(
            compute_bit_timing(&request(500_000, 10, 8_000_000, 0)),
            Err(TimingError::OutOfRange {
                field: TimingField::Propagation,
                value: 0,
            })
        );
    }

    #[test]
    fn too_many_quanta_overflow_phase1() {
        assert_eq!(
            compute_bit_timing(&request(500_000, 25, 8_000_000, 100)),
            Err(TimingError::OutOfRange {
                field: TimingField::PhaseSeg1,
                value: 11,
            })
        );
    }

    #[test]
    fn too_few_quanta_leave_no_jump_width() {
        assert_eq!(
            compute_bit_timing(&request(500_000, 4, 8_000_000, 500)),
            Err(TimingError::OutOfRange {
                field: TimingField::SyncJumpWidth,
                value: -1,
            })
        );
    }

    #[test]
    fn phase_seg2_limited_by_register_field() {
        // 17 phase quanta split 8 + 9, so the encoded phase 2 segment is 8.
        assert_eq!(
            compute_bit_timing(&request(100_000, 19, 19_000_000, 526)),
            Err(TimingError::OutOfRange {
                field: TimingField::PhaseSeg2,
                value: 8,
            })
        );

        // 16 phase quanta split 8 + 8 encode to 7, the largest value TSEG2 holds.
        assert_eq!(
            compute_bit_timing(&request(100_000, 18, 18_000_000, 555)),
            Ok(BitTiming {
                prescaler: 9,
                sync_jump_width: 3,
                phase_seg1: 8,
                phase_seg2: 7,
            })
        );
    }

    #[test]
    fn long_delay_is_rejected() {
        // 9 quanta of delay at 80 ns per quantum.
        let err = compute_bit_timing(&request(500_000, 25, 25_000_000, 720)).unwrap_err();
        assert!(matches!(err, TimingError::OutOfRange { .. }));
    }

    #[test]
    fn prescaler_limit() {
        assert_eq!(
            compute_bit_timing(&request(10_000, 10, 80_000_000, 10_000)),
            Err(TimingError::OutOfRange {
                field: TimingField::Prescaler,
                value: 799,
            })
        );
    }

    #[test]
    fn rejects_invalid_request() {
        assert_eq!(
            compute_bit_timing(&request(0, 10, 8_000_000, 100)),
            Err(TimingError::OutOfRange {
                field: TimingField::BitRate,
                value: 0,
            })
        );
        assert_eq!(
            compute_bit_timing(&request(500_000, 3, 8_000_000, 100)),
            Err(TimingError::OutOfRange {
                field: TimingField::QuantaPerBit,
                value: 3,
            })
        );
        assert_eq!(
            compute_bit_timing(&request(500_000, 26, 8_000_000, 100)),
            Err(TimingError::OutOfRange {
                field: TimingField::QuantaPerBit,
                value: 26,
            })
        );
        assert_eq!(
            compute_bit_timing(&request(500_000, 10, 0, 100)),
            Err(TimingError::OutOfRange {
                field: TimingField::SystemClock,
                value: 0,
            })
        );
    }
}
