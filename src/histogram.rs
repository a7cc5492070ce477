//! Histogram decoding and distance estimation.
//!
//! Everything in here is pure computation on the 77-byte result block, so it can be
//! used on blocks captured elsewhere (logs, replay) as well as through
//! [`read_result`](crate::VL53L3cx::read_result).

use crate::Error;

/// Number of histogram bins in one result block.
pub const HISTOGRAM_BINS: usize = 24;

/// Size of the result block starting at `RESULT__INTERRUPT_STATUS`.
pub const RESULT_BLOCK_LEN: usize = 77;

/// Offset of the first bin inside the result block.
const BIN_DATA_OFFSET: usize = 5;

/// Bytes per bin on the wire.
const BIN_BYTES: usize = 3;

/// Bins 0..6 only ever see ambient photons.
const AMBIENT_BINS: usize = 6;

/// First bin considered by the peak search.
pub const PEAK_SEARCH_FIRST: usize = 6;

/// Last bin considered by the peak search. Later bins are outside the trusted range of
/// the medium range preset.
pub const PEAK_SEARCH_LAST: usize = 17;

/// Bins from this index on belong to VCSEL phase B.
pub const PHASE_B_FIRST_BIN: usize = 12;

/// Nominal bin width for phase A in millimetres.
pub const NOMINAL_BIN_WIDTH_A_MM: f32 = 15.0;

/// Nominal bin width for phase B in millimetres.
pub const NOMINAL_BIN_WIDTH_B_MM: f32 = 12.5;

/// Fast oscillator frequency (4.12 fixed point MHz) the nominal bin widths correspond to.
pub const NOMINAL_FAST_OSC_FREQUENCY: u16 = 0xBCCC;

/// Range status reported by the device for one ranging cycle.
///
/// Only [`RangeStatus::RangeComplete`] marks the histogram as trustworthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RangeStatus {
    /// No update since the last readout
    NoUpdate,
    /// VCSEL continuity test failed
    VcselContinuityFail,
    /// Return signal too weak
    SignalFail,
    /// No VHV value found during calibration
    NoVhvValueFound,
    /// No target detected
    NoTarget,
    /// Phase out of the valid window
    PhaseOutOfLimits,
    /// Sigma above threshold
    SigmaFail,
    /// Phase consistency check failed
    PhaseConsistencyFail,
    /// Range below minimum clip
    MinRangeClip,
    /// Valid measurement
    RangeComplete,
    /// Algorithm underflow
    AlgoUnderflow,
    /// Algorithm overflow
    AlgoOverflow,
    /// Range ignore threshold hit
    RangeIgnoreThreshold,
    /// ROI clipped
    UserRoiClip,
    /// Code outside the documented set
    Unknown(u8),
}

impl From<u8> for RangeStatus {
    fn from(value: u8) -> Self {
        match value & 0x1F {
            0x00 => RangeStatus::NoUpdate,
            0x01 => RangeStatus::VcselContinuityFail,
            0x02 => RangeStatus::SignalFail,
            0x03 => RangeStatus::NoVhvValueFound,
            0x04 => RangeStatus::NoTarget,
            0x05 => RangeStatus::PhaseOutOfLimits,
            0x06 => RangeStatus::SigmaFail,
            0x07 => RangeStatus::PhaseConsistencyFail,
            0x08 => RangeStatus::MinRangeClip,
            0x09 => RangeStatus::RangeComplete,
            0x0A => RangeStatus::AlgoUnderflow,
            0x0B => RangeStatus::AlgoOverflow,
            0x0C => RangeStatus::RangeIgnoreThreshold,
            0x0D => RangeStatus::UserRoiClip,
            code => {
                warn!("Unknown range status: {}", code);
                RangeStatus::Unknown(code)
            }
        }
    }
}

/// One decoded result block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HistogramResult {
    /// Interrupt status byte
    pub interrupt_status: u8,
    /// Raw range status byte
    pub range_status: u8,
    /// Report status byte
    pub report_status: u8,
    /// Stream counter, increments once per cycle
    pub stream_count: u8,
    /// Photon counts, each in `0..2^24`
    pub bins: [u32; HISTOGRAM_BINS],
}

impl HistogramResult {
    /// Decodes the fixed result block layout.
    #[must_use]
    pub fn parse(block: &[u8; RESULT_BLOCK_LEN]) -> Self {
        let mut bins = [0u32; HISTOGRAM_BINS];
        for (bin, raw) in bins
            .iter_mut()
            .zip(block[BIN_DATA_OFFSET..].chunks_exact(BIN_BYTES))
        {
            *bin = u32::from_be_bytes([0, raw[0], raw[1], raw[2]]);
        }
        Self {
            interrupt_status: block[0],
            range_status: block[1],
            report_status: block[2],
            stream_count: block[3],
            bins,
        }
    }

    /// Classified range status.
    #[must_use]
    pub fn status(&self) -> RangeStatus {
        RangeStatus::from(self.range_status)
    }

    /// Mean of the ambient-only bins, truncated.
    #[must_use]
    pub fn ambient_estimate(&self) -> u32 {
        #[allow(clippy::cast_possible_truncation)]
        let count = AMBIENT_BINS as u32;
        self.bins[..AMBIENT_BINS].iter().sum::<u32>() / count
    }

    /// Bins with the ambient estimate removed, clamped at zero.
    #[must_use]
    pub fn corrected_bins(&self, ambient: u32) -> [u32; HISTOGRAM_BINS] {
        self.bins.map(|count| count.saturating_sub(ambient))
    }
}

/// Finds the peak bin within the trusted window.
///
/// The first bin holding the greatest count wins ties.
#[must_use]
pub fn find_peak(corrected: &[u32; HISTOGRAM_BINS]) -> usize {
    let mut peak = PEAK_SEARCH_FIRST;
    for bin in PEAK_SEARCH_FIRST + 1..=PEAK_SEARCH_LAST {
        if corrected[bin] > corrected[peak] {
            peak = bin;
        }
    }
    peak
}

/// Sub-bin offset of the vertex of the parabola through three neighbouring counts.
///
/// Returns `None` when the three points are collinear (zero denominator).
#[must_use]
pub fn parabolic_offset(a: u32, b: u32, c: u32) -> Option<f32> {
    let denominator = i64::from(a) - 2 * i64::from(b) + i64::from(c);
    if denominator == 0 {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let offset = 0.5 * (i64::from(a) - i64::from(c)) as f32 / denominator as f32;
    Some(offset.clamp(-0.5, 0.5))
}

/// How bin widths are derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BinWidthPolicy {
    /// Use the preset's nominal widths
    #[default]
    Nominal,
    /// Scale the nominal widths by the measured oscillator frequency read from NVM
    OscillatorScaled,
}

/// Millimetres per bin for the two VCSEL phases.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BinWidths {
    /// Width of bins below [`PHASE_B_FIRST_BIN`]
    pub phase_a_mm: f32,
    /// Width of bins from [`PHASE_B_FIRST_BIN`] on
    pub phase_b_mm: f32,
}

impl BinWidths {
    /// Nominal widths of the medium range preset.
    pub const NOMINAL: Self = Self {
        phase_a_mm: NOMINAL_BIN_WIDTH_A_MM,
        phase_b_mm: NOMINAL_BIN_WIDTH_B_MM,
    };

    /// Widths for a device whose fast oscillator runs at `fast_osc_frequency`.
    ///
    /// A bin spans a fixed number of oscillator periods, so its width is inversely
    /// proportional to the frequency. A zero frequency falls back to nominal widths.
    #[must_use]
    pub fn scaled(fast_osc_frequency: u16) -> Self {
        if fast_osc_frequency == 0 {
            return Self::NOMINAL;
        }
        let ratio = f32::from(NOMINAL_FAST_OSC_FREQUENCY) / f32::from(fast_osc_frequency);
        Self {
            phase_a_mm: NOMINAL_BIN_WIDTH_A_MM * ratio,
            phase_b_mm: NOMINAL_BIN_WIDTH_B_MM * ratio,
        }
    }

    /// Resolves the widths for a policy.
    #[must_use]
    pub fn for_policy(policy: BinWidthPolicy, fast_osc_frequency: u16) -> Self {
        match policy {
            BinWidthPolicy::Nominal => Self::NOMINAL,
            BinWidthPolicy::OscillatorScaled => Self::scaled(fast_osc_frequency),
        }
    }

    /// Width that applies to `bin`.
    #[must_use]
    pub fn for_bin(&self, bin: usize) -> f32 {
        if bin < PHASE_B_FIRST_BIN {
            self.phase_a_mm
        } else {
            self.phase_b_mm
        }
    }
}

/// Distance derived from one histogram.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DistanceEstimate {
    /// Refined distance when sub-bin refinement applied, coarse distance otherwise
    pub distance_mm: f32,
    /// `peak_bin * width`
    pub coarse_distance_mm: f32,
    /// Bin index selected by the peak search
    pub peak_bin: usize,
    /// Interpolated bin position, when refinement applied
    pub refined_bin: Option<f32>,
    /// Ambient corrected count at the peak
    pub peak_count: u32,
    /// Ambient estimate that was subtracted
    pub ambient: u32,
    /// Classified range status
    pub range_status: RangeStatus,
    /// Range status byte as read from the device
    pub raw_range_status: u8,
}

impl DistanceEstimate {
    /// Whether the device flagged this cycle as a complete range.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.range_status == RangeStatus::RangeComplete
    }

    /// Distance in millimetres, or `None` when the range status is not complete.
    #[must_use]
    pub fn distance(&self) -> Option<f32> {
        self.is_valid().then_some(self.distance_mm)
    }

    /// Returns the distance, or [`Error::RangeStatusError`] carrying the raw status byte.
    ///
    /// # Errors
    ///
    /// * `Err(Error::RangeStatusError(code))` - The device did not report a complete range
    pub fn check<E: core::fmt::Debug>(&self) -> Result<f32, Error<E>> {
        if self.is_valid() {
            Ok(self.distance_mm)
        } else {
            Err(Error::RangeStatusError(self.raw_range_status))
        }
    }
}

/// Runs ambient removal, peak search and sub-bin refinement on one histogram.
///
/// Refinement is attempted only when the peak is interior and its corrected count
/// exceeds `min_peak_count`.
#[must_use]
pub fn estimate(
    result: &HistogramResult,
    widths: &BinWidths,
    min_peak_count: u32,
) -> DistanceEstimate {
    let ambient = result.ambient_estimate();
    let corrected = result.corrected_bins(ambient);
    let peak_bin = find_peak(&corrected);
    let peak_count = corrected[peak_bin];
    let width = widths.for_bin(peak_bin);
    #[allow(clippy::cast_precision_loss)]
    let coarse_distance_mm = peak_bin as f32 * width;

    let interior = peak_bin > 0 && peak_bin < HISTOGRAM_BINS - 1;
    let refined_bin = if interior && peak_count > min_peak_count {
        parabolic_offset(
            corrected[peak_bin - 1],
            peak_count,
            corrected[peak_bin + 1],
        )
        .map(|offset| {
            #[allow(clippy::cast_precision_loss)]
            let bin = peak_bin as f32;
            bin + offset
        })
    } else {
        None
    };
    let distance_mm = refined_bin.map_or(coarse_distance_mm, |bin| bin * width);

    trace!(
        "ambient {} peak bin {} count {}",
        ambient,
        peak_bin,
        peak_count
    );

    DistanceEstimate {
        distance_mm,
        coarse_distance_mm,
        peak_bin,
        refined_bin,
        peak_count,
        ambient,
        range_status: result.status(),
        raw_range_status: result.range_status,
    }
}
