//! Register map and typed register descriptors.

/// Register addresses used by the driver.
///
/// Only the subset of the device map that bring-up, NVM access, the medium range
/// preset and histogram readout touch is listed here.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    /// I2C slave device address register (0x0001)
    I2cSlaveDeviceAddress = 0x0001,
    /// Target total rate for dynamic SPAD selection (0x0024)
    DssConfigTargetTotalRateMcps = 0x0024,
    /// Debug control (0x0026)
    DebugCtrl = 0x0026,
    /// Test mode control (0x0027)
    TestModeCtrl = 0x0027,
    /// Clock gating control (0x0028)
    ClkGatingCtrl = 0x0028,
    /// NVM built-in self test control (0x0029)
    NvmBistCtrl = 0x0029,
    /// NVM BIST word count (0x002A)
    NvmBistNumNvmWords = 0x002A,
    /// NVM BIST start address (0x002B)
    NvmBistStartAddress = 0x002B,
    /// Host interface status (0x002C)
    HostIfStatus = 0x002C,
    /// I2C pad configuration (0x002D)
    PadI2cHvConfig = 0x002D,
    /// I2C pad external supply configuration, bit 0 selects 2V8 (0x002E)
    PadI2cHvExtsupConfig = 0x002E,
    /// GPIO pad control (0x002F)
    GpioHvPadCtrl = 0x002F,
    /// GPIO mux control, bit 4 holds the interrupt polarity (0x0030)
    GpioHvMuxCtrl = 0x0030,
    /// GPIO status, bit 0 is the data ready line (0x0031)
    GpioTioHvStatus = 0x0031,
    /// SPAD select pulse width (0x0033)
    AnaConfigSpadSelPswidth = 0x0033,
    /// VCSEL pulse width offset (0x0034)
    AnaConfigVcselPulseWidthOffset = 0x0034,
    /// Fast oscillator control (0x0035)
    AnaConfigFastOscConfigCtrl = 0x0035,
    /// Sigma estimator effective pulse width (0x0036)
    SigmaEstimatorEffectivePulseWidthNs = 0x0036,
    /// Sigma estimator effective ambient width (0x0037)
    SigmaEstimatorEffectiveAmbientWidthNs = 0x0037,
    /// Sigma estimator reference (0x0038)
    SigmaEstimatorSigmaRefMm = 0x0038,
    /// Crosstalk compensation valid height (0x0039)
    AlgoCrosstalkCompensationValidHeightMm = 0x0039,
    /// Range ignore threshold (0x003C)
    AlgoRangeIgnoreThresholdMcps = 0x003C,
    /// Range ignore valid height (0x003E)
    AlgoRangeIgnoreValidHeightMm = 0x003E,
    /// Range minimum clip (0x003F)
    AlgoRangeMinClip = 0x003F,
    /// Consistency check tolerance (0x0040)
    AlgoConsistencyCheckTolerance = 0x0040,
    /// Sigma-delta reset stages (0x0042)
    SdConfigResetStages = 0x0042,
    /// Stream count update value (0x0044)
    GphConfigStreamCountUpdateValue = 0x0044,
    /// Stream divider (0x0045)
    GlobalConfigStreamDivider = 0x0045,
    /// Interrupt source selection (0x0046)
    SystemInterruptConfigGpio = 0x0046,
    /// VCSEL calibration start (0x0047)
    CalConfigVcselStart = 0x0047,
    /// Calibration repeat rate (0x0048)
    CalConfigRepeatRate = 0x0048,
    /// Global VCSEL width (0x004A)
    GlobalConfigVcselWidth = 0x004A,
    /// Phase calibration timeout (0x004B)
    PhasecalConfigTimeoutMacrop = 0x004B,
    /// Phase calibration target (0x004C)
    PhasecalConfigTarget = 0x004C,
    /// Phase calibration override (0x004D)
    PhasecalConfigOverride = 0x004D,
    /// Dynamic SPAD selection ROI mode (0x004F)
    DssConfigRoiModeControl = 0x004F,
    /// Rate threshold high (0x0050)
    SystemThreshRateHigh = 0x0050,
    /// Rate threshold low (0x0052)
    SystemThreshRateLow = 0x0052,
    /// Manual effective SPAD count (0x0054)
    DssConfigManualEffectiveSpadsSelect = 0x0054,
    /// Manual block select (0x0056)
    DssConfigManualBlockSelect = 0x0056,
    /// Aperture attenuation (0x0057)
    DssConfigApertureAttenuation = 0x0057,
    /// Maximum SPAD limit (0x0058)
    DssConfigMaxSpadsLimit = 0x0058,
    /// Minimum SPAD limit (0x0059)
    DssConfigMinSpadsLimit = 0x0059,
    /// MM timeout phase A (0x005A)
    MmConfigTimeoutMacropA = 0x005A,
    /// MM timeout phase B (0x005C)
    MmConfigTimeoutMacropB = 0x005C,
    /// Range timeout phase A (0x005E)
    RangeConfigTimeoutMacropA = 0x005E,
    /// VCSEL period phase A (0x0060)
    RangeConfigVcselPeriodA = 0x0060,
    /// Range timeout phase B (0x0061)
    RangeConfigTimeoutMacropB = 0x0061,
    /// VCSEL period phase B (0x0063)
    RangeConfigVcselPeriodB = 0x0063,
    /// Sigma threshold (0x0064)
    RangeConfigSigmaThresh = 0x0064,
    /// Minimum return count rate (0x0066)
    RangeConfigMinCountRateRtnLimitMcps = 0x0066,
    /// Valid phase low (0x0068)
    RangeConfigValidPhaseLow = 0x0068,
    /// Valid phase high (0x0069)
    RangeConfigValidPhaseHigh = 0x0069,
    /// Inter-measurement period in milliseconds, 32 bits (0x006C)
    SystemIntermeasurementPeriod = 0x006C,
    /// Fractional enable (0x0070)
    SystemFractionalEnable = 0x0070,
    /// Grouped parameter hold, start marker (0x0071)
    SystemGroupedParameterHold0 = 0x0071,
    /// Distance threshold high (0x0072)
    SystemThreshHigh = 0x0072,
    /// Distance threshold low (0x0074)
    SystemThreshLow = 0x0074,
    /// Per-quadrant crosstalk enable (0x0076)
    SystemEnableXtalkPerQuadrant = 0x0076,
    /// Seed configuration (0x0077)
    SystemSeedConfig = 0x0077,
    /// Window of interest, phase A (0x0078)
    SdConfigWoiSd0 = 0x0078,
    /// Window of interest, phase B (0x0079)
    SdConfigWoiSd1 = 0x0079,
    /// Initial phase, phase A (0x007A)
    SdConfigInitialPhaseSd0 = 0x007A,
    /// Initial phase, phase B (0x007B)
    SdConfigInitialPhaseSd1 = 0x007B,
    /// Grouped parameter hold, continue marker (0x007C)
    SystemGroupedParameterHold1 = 0x007C,
    /// First order select (0x007D)
    SdConfigFirstOrderSelect = 0x007D,
    /// Quantifier (0x007E)
    SdConfigQuantifier = 0x007E,
    /// ROI centre SPAD (0x007F)
    RoiConfigUserRoiCentreSpad = 0x007F,
    /// ROI size, `(height - 1) << 4 | (width - 1)` (0x0080)
    RoiConfigUserRoiRequestedGlobalXySize = 0x0080,
    /// Sequence enable bitmask (0x0081)
    SystemSequenceConfig = 0x0081,
    /// Grouped parameter hold, apply marker (0x0082)
    SystemGroupedParameterHold = 0x0082,
    /// Forced internal power (0x0083)
    PowerManagementGo1PowerForce = 0x0083,
    /// Firmware enable (0x0085)
    FirmwareEnable = 0x0085,
    /// Interrupt clear (0x0086)
    SystemInterruptClear = 0x0086,
    /// Mode control (0x0087)
    SystemModeStart = 0x0087,
    /// First byte of the result block (0x0088)
    ResultInterruptStatus = 0x0088,
    /// Range status (0x0089)
    ResultRangeStatus = 0x0089,
    /// Firmware system status, bit 0 set once booted (0x00E5)
    FirmwareSystemStatus = 0x00E5,
    /// Model identification (0x010F)
    IdentificationModelId = 0x010F,
    /// NVM power down control (0x0680)
    RangingCoreNvmCtrlPdn = 0x0680,
    /// NVM mode (0x0681)
    RangingCoreNvmCtrlMode = 0x0681,
    /// NVM read pulse width, 16 bits (0x0682)
    RangingCoreNvmCtrlPulseWidthMsb = 0x0682,
    /// Ranging core clock control (0x0683)
    RangingCoreClkCtrl1 = 0x0683,
    /// NVM address (0x0684)
    RangingCoreNvmCtrlAddr = 0x0684,
    /// NVM read strobe (0x0685)
    RangingCoreNvmCtrlReadn = 0x0685,
    /// NVM data out, 32 bits (0x0686)
    RangingCoreNvmCtrlDataoutMmm = 0x0686,
}

impl From<Register> for u16 {
    fn from(r: Register) -> Self {
        r as u16
    }
}

/// Number of bytes a register field spans on the wire.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Width {
    /// 8-bit field
    Byte = 1,
    /// 16-bit field
    Word = 2,
    /// 24-bit field
    Triple = 3,
    /// 32-bit field
    DWord = 4,
}

impl Width {
    /// Field length in bytes.
    #[must_use]
    pub const fn bytes(self) -> usize {
        self as usize
    }

    /// Converts a byte count into a width, if it is one the bus layer supports.
    #[must_use]
    pub const fn from_len(len: usize) -> Option<Self> {
        match len {
            1 => Some(Width::Byte),
            2 => Some(Width::Word),
            3 => Some(Width::Triple),
            4 => Some(Width::DWord),
            _ => None,
        }
    }
}

/// One entry of a register set snapshot: a register, its width and the value to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Setting {
    /// Target register
    pub register: Register,
    /// Field width
    pub width: Width,
    /// Value, right aligned
    pub value: u32,
}

impl Setting {
    /// 8-bit setting.
    #[must_use]
    pub const fn byte(register: Register, value: u8) -> Self {
        Self {
            register,
            width: Width::Byte,
            value: value as u32,
        }
    }

    /// 16-bit setting.
    #[must_use]
    pub const fn word(register: Register, value: u16) -> Self {
        Self {
            register,
            width: Width::Word,
            value: value as u32,
        }
    }

    /// 32-bit setting.
    #[must_use]
    pub const fn dword(register: Register, value: u32) -> Self {
        Self {
            register,
            width: Width::DWord,
            value,
        }
    }

    /// Returns the big-endian payload, trimmed to the setting's width.
    #[must_use]
    pub fn to_be_bytes(&self) -> ([u8; 4], usize) {
        let len = self.width.bytes();
        let mut out = [0u8; 4];
        out[..len].copy_from_slice(&self.value.to_be_bytes()[4 - len..]);
        (out, len)
    }
}

/// Assembles a big-endian unsigned value from up to four bytes.
#[must_use]
pub fn be_value(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .fold(0u32, |acc, &byte| (acc << 8) | u32::from(byte))
}
