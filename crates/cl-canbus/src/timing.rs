//! Bit-timing arithmetic.

/// Effective bitrate for a controller clock and bit-timing parameters.
///
/// One bit is `1 + bs1 + bs2` time quanta of `prescaler` clock cycles each.
/// Returns 0 when any divisor term is 0. `sjw` does not affect the nominal
/// rate and is accepted for signature parity with controller setups.
pub fn calculate_bitrate(clock_freq: u32, prescaler: u32, _sjw: u32, bs1: u32, bs2: u32) -> u32 {
    if prescaler == 0 || bs1 == 0 || bs2 == 0 {
        return 0;
    }

    let quanta = 1 + u64::from(bs1) + u64::from(bs2);
    let divisor = u64::from(prescaler) * quanta;
    // Quotient never exceeds clock_freq, so it fits back into u32.
    (u64::from(clock_freq) / divisor) as u32
}
