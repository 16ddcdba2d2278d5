//! Register maps for the MPU-9250/9255 and the AK8963 magnetometer companion.
//!
//! Flat constant tables: addresses, bit offsets, field lengths and mode
//! values straight from the InvenSense / AKM register maps. Addresses and
//! bit positions never change at runtime.

/// MPU-9250/9255 primary device registers and bit fields.
pub mod mpu9250 {
    // -- I2C addresses --
    pub const I2C_ADDRESS_AD0_LOW: u16 = 0x68;
    pub const I2C_ADDRESS_AD0_HIGH: u16 = 0x69;

    // -- Configuration registers --
    pub const SMPLRT_DIV: u8 = 0x19;
    pub const RA_CONFIG: u8 = 0x1A;
    pub const RA_GYRO_CONFIG: u8 = 0x1B;
    pub const RA_ACCEL_CONFIG_1: u8 = 0x1C;
    pub const RA_ACCEL_CONFIG_2: u8 = 0x1D;
    pub const RA_INT_PIN_CFG: u8 = 0x37;

    // -- Data registers (16-bit big-endian pairs) --
    pub const ACCEL_XOUT_H: u8 = 0x3B;
    pub const TEMP_OUT_H: u8 = 0x41;
    pub const GYRO_XOUT_H: u8 = 0x43;

    pub const RA_USER_CTRL: u8 = 0x6A;
    pub const RA_PWR_MGMT_1: u8 = 0x6B;
    pub const RA_PWR_MGMT_2: u8 = 0x6C;
    pub const WHO_AM_I: u8 = 0x75;

    // -- INT_PIN_CFG bits --
    pub const INTCFG_BYPASS_EN_BIT: u8 = 1;

    // -- PWR_MGMT_1 bits --
    pub const PWR1_DEVICE_RESET_BIT: u8 = 7;
    pub const PWR1_SLEEP_BIT: u8 = 6;
    pub const PWR1_CLKSEL_BIT: u8 = 2;
    pub const PWR1_CLKSEL_LENGTH: u8 = 3;

    // -- GYRO_CONFIG / ACCEL_CONFIG_1 full-scale select fields --
    pub const GCONFIG_FS_SEL_BIT: u8 = 4;
    pub const GCONFIG_FS_SEL_LENGTH: u8 = 2;
    pub const ACONFIG_FS_SEL_BIT: u8 = 4;
    pub const ACONFIG_FS_SEL_LENGTH: u8 = 2;

    // -- CONFIG / ACCEL_CONFIG_2 low-pass filter fields --
    pub const DLPF_CFG_BIT: u8 = 0;
    pub const DLPF_CFG_LENGTH: u8 = 3;
    pub const A_DLPF_CFG_BIT: u8 = 0;
    pub const A_DLPF_CFG_LENGTH: u8 = 4;

    // -- USER_CTRL bits --
    pub const USERCTRL_I2C_MST_EN_BIT: u8 = 5;

    // -- Clock source values (PWR_MGMT_1 CLKSEL field) --
    pub const CLOCK_INTERNAL: u8 = 0x00;
    pub const CLOCK_PLL_XGYRO: u8 = 0x01;
    pub const CLOCK_KEEP_RESET: u8 = 0x07;

    // -- Full-scale range selects --
    pub const GYRO_FS_250: u8 = 0x00;
    pub const GYRO_FS_500: u8 = 0x01;
    pub const GYRO_FS_1000: u8 = 0x02;
    pub const GYRO_FS_2000: u8 = 0x03;
    pub const ACCEL_FS_2: u8 = 0x00;
    pub const ACCEL_FS_4: u8 = 0x01;
    pub const ACCEL_FS_8: u8 = 0x02;
    pub const ACCEL_FS_16: u8 = 0x03;

    /// Raw counts per g for full-scale ranges ±2g, ±4g, ±8g, ±16g.
    pub const ACCEL_SCALE_FACTOR: [f64; 4] = [16384.0, 8192.0, 4096.0, 2048.0];

    /// Raw counts per °/s for full-scale ranges ±250, ±500, ±1000, ±2000 dps.
    pub const GYRO_SCALE_FACTOR: [f64; 4] = [131.0, 65.5, 32.8, 16.4];

    /// WHO_AM_I values accepted as this model line (9250 and 9255 revisions).
    pub const ACCEPTED_DEVICE_IDS: [u8; 2] = [0x71, 0x73];

    // -- Temperature conversion: raw/333.87 + 21.0 °C --
    pub const TEMP_SENSITIVITY: f64 = 333.87;
    pub const TEMP_OFFSET_CELSIUS: f64 = 21.0;

    // -- SMPLRT_DIV bounds --
    pub const SAMPLERATE_MIN: u32 = 5;
    pub const SAMPLERATE_MAX: u32 = 32_000;
}

/// AK8963 magnetometer registers, modes and status bits.
pub mod ak8963 {
    pub const ADDRESS: u16 = 0x0C;

    pub const WHO_AM_I: u8 = 0x00;
    pub const ST1: u8 = 0x02;
    /// First data register; X/Y/Z are 16-bit little-endian pairs,
    /// followed directly by ST2 at 0x09.
    pub const XOUT_L: u8 = 0x03;
    pub const ST2: u8 = 0x09;
    pub const CNTL: u8 = 0x0A;
    pub const ASAX: u8 = 0x10;
    pub const ASAY: u8 = 0x11;
    pub const ASAZ: u8 = 0x12;

    pub const WHO_AM_I_RESPONSE: u8 = 0x48;

    pub const ST1_DRDY_BIT: u8 = 0;
    pub const ST1_DOR_BIT: u8 = 1;

    // -- CNTL operating modes --
    pub const CNTL_MODE_OFF: u8 = 0x00;
    pub const CNTL_MODE_SINGLE_MEASURE: u8 = 0x01;
    pub const CNTL_MODE_CONTINUE_MEASURE_1: u8 = 0x02;
    pub const CNTL_MODE_CONTINUE_MEASURE_2: u8 = 0x06;
    pub const CNTL_MODE_EXT_TRIG_MEASURE: u8 = 0x04;
    pub const CNTL_MODE_SELF_TEST: u8 = 0x08;
    pub const CNTL_MODE_FUSE_ROM_ACCESS: u8 = 0x0F;
}

bitflags::bitflags! {
    /// AK8963 ST1 status register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MagStatus1: u8 {
        /// Data ready.
        const DRDY = 1 << 0;
        /// Data overrun (a sample was skipped).
        const DOR  = 1 << 1;
    }
}

bitflags::bitflags! {
    /// AK8963 ST2 status register, read as the tail of every sample block.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MagStatus2: u8 {
        /// Magnetic sensor overflow; the sample is invalid.
        const HOFL  = 1 << 3;
        /// Output bit setting (16-bit mode).
        const BITM  = 1 << 4;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_factor_tables_match_datasheet() {
        assert_eq!(mpu9250::ACCEL_SCALE_FACTOR, [16384.0, 8192.0, 4096.0, 2048.0]);
        assert_eq!(mpu9250::GYRO_SCALE_FACTOR, [131.0, 65.5, 32.8, 16.4]);
    }

    #[test]
    fn mag_overflow_flag_is_bit3() {
        let st2 = MagStatus2::from_bits_truncate(0x08);
        assert!(st2.contains(MagStatus2::HOFL));
        let clean = MagStatus2::from_bits_truncate(0x10);
        assert!(!clean.contains(MagStatus2::HOFL));
    }
}
