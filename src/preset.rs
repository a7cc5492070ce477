//! Medium range preset (nominal 3 m, ~33 ms measurement).
//!
//! The tables are written in order by [`load_preset`](crate::VL53L3cx::load_preset).
//! The two dynamic tables are framed by the grouped parameter hold markers, which are
//! not part of the tables themselves.

use crate::register::{Register, Setting};

/// Value written to the hold start and hold continue markers.
pub const GROUPED_HOLD_OPEN: u8 = 0x01;
/// Value written to the apply marker to commit the held dynamic configuration.
pub const GROUPED_HOLD_APPLY: u8 = 0x02;

/// Interrupt source selection: raise the data ready line on every new sample.
pub const INTERRUPT_ON_NEW_SAMPLE: u8 = 0x20;

/// `GPIO_HV_MUX__CTRL` value written by the preset. Bit 4 clear selects an active-high
/// data ready line.
pub const GPIO_HV_MUX_CTRL: u8 = 0x01;

/// VCSEL period register value for phase A.
pub const VCSEL_PERIOD_A: u8 = 0x0B;
/// VCSEL period register value for phase B.
pub const VCSEL_PERIOD_B: u8 = 0x09;

/// Inter-measurement period of the preset in milliseconds.
pub const INTER_MEASUREMENT_MS: u32 = 33;

/// Default ROI centre SPAD.
pub const ROI_CENTRE_SPAD: u8 = 199;
/// Default ROI size, 16x16 SPADs.
pub const ROI_XY_SIZE: u8 = 0xFF;

/// Static group: pads, pulse widths, sigma estimator, algorithm tolerances.
pub const STATIC: [Setting; 23] = [
    Setting::word(Register::DssConfigTargetTotalRateMcps, 0x0A00),
    Setting::byte(Register::DebugCtrl, 0x00),
    Setting::byte(Register::TestModeCtrl, 0x00),
    Setting::byte(Register::ClkGatingCtrl, 0x00),
    Setting::byte(Register::NvmBistCtrl, 0x00),
    Setting::byte(Register::NvmBistNumNvmWords, 0x00),
    Setting::byte(Register::NvmBistStartAddress, 0x00),
    Setting::byte(Register::HostIfStatus, 0x00),
    Setting::byte(Register::PadI2cHvConfig, 0x00),
    Setting::byte(Register::GpioHvPadCtrl, 0x00),
    Setting::byte(Register::GpioHvMuxCtrl, GPIO_HV_MUX_CTRL),
    Setting::byte(Register::AnaConfigSpadSelPswidth, 0x02),
    Setting::byte(Register::AnaConfigVcselPulseWidthOffset, 0x08),
    Setting::byte(Register::AnaConfigFastOscConfigCtrl, 0x00),
    Setting::byte(Register::SigmaEstimatorEffectivePulseWidthNs, 0x08),
    Setting::byte(Register::SigmaEstimatorEffectiveAmbientWidthNs, 0x10),
    Setting::byte(Register::SigmaEstimatorSigmaRefMm, 0x01),
    Setting::byte(Register::AlgoCrosstalkCompensationValidHeightMm, 0x01),
    Setting::word(Register::AlgoRangeIgnoreThresholdMcps, 0x0000),
    Setting::byte(Register::AlgoRangeIgnoreValidHeightMm, 0xFF),
    Setting::byte(Register::AlgoRangeMinClip, 0x00),
    Setting::byte(Register::AlgoConsistencyCheckTolerance, 0x02),
    Setting::word(Register::SdConfigResetStages, 0x0000),
];

/// General group: interrupt source, calibration and dynamic SPAD selection bounds.
pub const GENERAL: [Setting; 17] = [
    Setting::byte(Register::GphConfigStreamCountUpdateValue, 0x00),
    Setting::byte(Register::GlobalConfigStreamDivider, 0x00),
    Setting::byte(Register::SystemInterruptConfigGpio, INTERRUPT_ON_NEW_SAMPLE),
    Setting::byte(Register::CalConfigVcselStart, VCSEL_PERIOD_A),
    Setting::word(Register::CalConfigRepeatRate, 0x0000),
    Setting::byte(Register::GlobalConfigVcselWidth, 0x02),
    Setting::byte(Register::PhasecalConfigTimeoutMacrop, 0x0D),
    Setting::byte(Register::PhasecalConfigTarget, 0x21),
    Setting::byte(Register::PhasecalConfigOverride, 0x00),
    Setting::byte(Register::DssConfigRoiModeControl, 0x01),
    Setting::word(Register::SystemThreshRateHigh, 0x0000),
    Setting::word(Register::SystemThreshRateLow, 0x0000),
    Setting::word(Register::DssConfigManualEffectiveSpadsSelect, 0x8C00),
    Setting::byte(Register::DssConfigManualBlockSelect, 0x00),
    Setting::byte(Register::DssConfigApertureAttenuation, 0x38),
    Setting::byte(Register::DssConfigMaxSpadsLimit, 0xFF),
    Setting::byte(Register::DssConfigMinSpadsLimit, 0x01),
];

/// Timing group: VCSEL periods and matched timeouts for phases A and B, and the
/// inter-measurement period.
pub const TIMING: [Setting; 12] = [
    Setting::word(Register::MmConfigTimeoutMacropA, 0x0001),
    Setting::word(Register::MmConfigTimeoutMacropB, 0x0001),
    Setting::word(Register::RangeConfigTimeoutMacropA, 0x009E),
    Setting::byte(Register::RangeConfigVcselPeriodA, VCSEL_PERIOD_A),
    Setting::word(Register::RangeConfigTimeoutMacropB, 0x00C2),
    Setting::byte(Register::RangeConfigVcselPeriodB, VCSEL_PERIOD_B),
    Setting::word(Register::RangeConfigSigmaThresh, 0x0080),
    Setting::word(Register::RangeConfigMinCountRateRtnLimitMcps, 0x0080),
    Setting::byte(Register::RangeConfigValidPhaseLow, 0x08),
    Setting::byte(Register::RangeConfigValidPhaseHigh, 0x78),
    Setting::dword(Register::SystemIntermeasurementPeriod, INTER_MEASUREMENT_MS),
    Setting::byte(Register::SystemFractionalEnable, 0x00),
];

/// Dynamic group, first batch (between the hold start and hold continue markers).
pub const DYNAMIC_FIRST: [Setting; 8] = [
    Setting::word(Register::SystemThreshHigh, 0x0000),
    Setting::word(Register::SystemThreshLow, 0x0000),
    Setting::byte(Register::SystemEnableXtalkPerQuadrant, 0x00),
    Setting::byte(Register::SystemSeedConfig, 0x02),
    Setting::byte(Register::SdConfigWoiSd0, VCSEL_PERIOD_A),
    Setting::byte(Register::SdConfigWoiSd1, VCSEL_PERIOD_B),
    Setting::byte(Register::SdConfigInitialPhaseSd0, 0x0A),
    Setting::byte(Register::SdConfigInitialPhaseSd1, 0x0A),
];

/// Dynamic group, second batch (between the hold continue and apply markers).
pub const DYNAMIC_SECOND: [Setting; 5] = [
    Setting::byte(Register::SdConfigFirstOrderSelect, 0x00),
    Setting::byte(Register::SdConfigQuantifier, 0x02),
    Setting::byte(Register::RoiConfigUserRoiCentreSpad, ROI_CENTRE_SPAD),
    Setting::byte(Register::RoiConfigUserRoiRequestedGlobalXySize, ROI_XY_SIZE),
    Setting::byte(Register::SystemSequenceConfig, 0xC1),
];

/// Whether the data ready line of this preset is active high.
#[must_use]
pub const fn data_ready_active_high() -> bool {
    GPIO_HV_MUX_CTRL & 0x10 == 0
}

/// Iterates every setting of the preset in write order, hold markers excluded.
pub fn all_settings() -> impl Iterator<Item = &'static Setting> {
    STATIC
        .iter()
        .chain(GENERAL.iter())
        .chain(TIMING.iter())
        .chain(DYNAMIC_FIRST.iter())
        .chain(DYNAMIC_SECOND.iter())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dynamic_windows_match_vcsel_periods() {
        let woi = |register: Register| {
            DYNAMIC_FIRST
                .iter()
                .find(|s| s.register == register)
                .map(|s| s.value)
        };
        assert_eq!(woi(Register::SdConfigWoiSd0), Some(u32::from(VCSEL_PERIOD_A)));
        assert_eq!(woi(Register::SdConfigWoiSd1), Some(u32::from(VCSEL_PERIOD_B)));
    }

    #[test]
    fn no_register_is_written_twice() {
        let settings: std::vec::Vec<_> = all_settings().collect();
        for (i, a) in settings.iter().enumerate() {
            for b in &settings[i + 1..] {
                assert_ne!(a.register, b.register, "{:?} appears twice", a.register);
            }
        }
    }

    #[test]
    fn hold_markers_are_not_in_the_tables() {
        assert!(all_settings().all(|s| !matches!(
            s.register,
            Register::SystemGroupedParameterHold0
                | Register::SystemGroupedParameterHold1
                | Register::SystemGroupedParameterHold
        )));
    }

    #[test]
    fn preset_uses_active_high_data_ready() {
        assert!(data_ready_active_high());
    }
}
