/// UART settings used to generate 1-Wire time slots.
///
/// At 115 200 baud one UART frame lasts about 87 µs, which fits a 1-Wire
/// read or write time slot. At 9 600 baud the `0xF0` frame stretches into a
/// reset pulse followed by a presence detection window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    pub baud_rate: u32,
    pub reset_baud_rate: u32,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            baud_rate: 115_200,
            reset_baud_rate: 9_600,
        }
    }
}

impl BusConfig {
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_reset_baud_rate(mut self, baud_rate: u32) -> Self {
        self.reset_baud_rate = baud_rate;
        self
    }
}
