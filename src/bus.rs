//! Register access primitives over a byte-level bus transport.
//!
//! The transport itself is a capability: anything that can read and write
//! contiguous bytes at a register address. [`RegisterClient`] layers the
//! byte/bit read-modify-write operations every device driver in this crate
//! is built from. The async variants mirror the blocking ones exactly and
//! must produce identical bus traffic for the same bus state.

use crate::Result;

/// Blocking byte-level bus transport bound to one device address.
pub trait Bus {
    /// Read `buf.len()` contiguous bytes starting at `reg`.
    fn read_bytes(&mut self, reg: u8, buf: &mut [u8]) -> Result<()>;

    /// Write `data` starting at `reg`.
    fn write_bytes(&mut self, reg: u8, data: &[u8]) -> Result<()>;
}

/// Asynchronous byte-level bus transport bound to one device address.
///
/// Suspends the calling task until the transfer completes; single-threaded
/// cooperative use is assumed. Concurrently issued operations on the same
/// register from different tasks are a caller bug, not a supported pattern.
#[allow(async_fn_in_trait)]
pub trait AsyncBus {
    async fn read_bytes(&mut self, reg: u8, buf: &mut [u8]) -> Result<()>;

    async fn write_bytes(&mut self, reg: u8, data: &[u8]) -> Result<()>;

    /// Suspend the task for at least `us` microseconds.
    ///
    /// Hardware settle delays between initialization steps go through this
    /// so the async driver never blocks the executor thread.
    async fn delay_us(&mut self, us: u64);
}

/// Mask covering `length` bits starting at `bit`.
pub(crate) fn bit_mask(bit: u8, length: u8) -> u8 {
    (((1u16 << length) - 1) << bit) as u8
}

/// Byte/bit register operations over a blocking transport.
///
/// `write_bits` is read-then-write with no compare-and-swap; callers must
/// not interleave bit writes to the same register from concurrent contexts.
pub struct RegisterClient<B: Bus> {
    bus: B,
}

impl<B: Bus> RegisterClient<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    pub fn read_byte(&mut self, reg: u8) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.bus.read_bytes(reg, &mut buf)?;
        Ok(buf[0])
    }

    pub fn read_bytes(&mut self, reg: u8, buf: &mut [u8]) -> Result<()> {
        self.bus.read_bytes(reg, buf)
    }

    /// Read one bit of a register, shifted down to 0 or 1.
    pub fn read_bit(&mut self, reg: u8, bit: u8) -> Result<u8> {
        Ok((self.read_byte(reg)? >> bit) & 1)
    }

    pub fn write_byte(&mut self, reg: u8, value: u8) -> Result<()> {
        self.bus.write_bytes(reg, &[value])
    }

    /// Read-modify-write a bit field of `length` bits starting at `bit`.
    ///
    /// If the initial read fails the write is never attempted, so a
    /// transport error cannot push stale data back to the device.
    pub fn write_bits(&mut self, reg: u8, bit: u8, length: u8, value: u8) -> Result<()> {
        let old = self.read_byte(reg)?;
        let mask = bit_mask(bit, length);
        let new = old ^ ((old ^ (value << bit)) & mask);
        self.write_byte(reg, new)
    }

    /// Single-bit write; reduces to a `write_bits` of length 1.
    pub fn write_bit(&mut self, reg: u8, bit: u8, value: u8) -> Result<()> {
        self.write_bits(reg, bit, 1, value)
    }

    pub fn into_inner(self) -> B {
        self.bus
    }

    #[cfg(test)]
    pub(crate) fn bus(&self) -> &B {
        &self.bus
    }
}

/// Byte/bit register operations over an async transport.
///
/// Identical semantics to [`RegisterClient`]; only the calling convention
/// differs.
pub struct AsyncRegisterClient<B: AsyncBus> {
    bus: B,
}

impl<B: AsyncBus> AsyncRegisterClient<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    pub async fn read_byte(&mut self, reg: u8) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.bus.read_bytes(reg, &mut buf).await?;
        Ok(buf[0])
    }

    pub async fn read_bytes(&mut self, reg: u8, buf: &mut [u8]) -> Result<()> {
        self.bus.read_bytes(reg, buf).await
    }

    pub async fn read_bit(&mut self, reg: u8, bit: u8) -> Result<u8> {
        Ok((self.read_byte(reg).await? >> bit) & 1)
    }

    pub async fn write_byte(&mut self, reg: u8, value: u8) -> Result<()> {
        self.bus.write_bytes(reg, &[value]).await
    }

    pub async fn write_bits(&mut self, reg: u8, bit: u8, length: u8, value: u8) -> Result<()> {
        let old = self.read_byte(reg).await?;
        let mask = bit_mask(bit, length);
        let new = old ^ ((old ^ (value << bit)) & mask);
        self.write_byte(reg, new).await
    }

    pub async fn write_bit(&mut self, reg: u8, bit: u8, value: u8) -> Result<()> {
        self.write_bits(reg, bit, 1, value).await
    }

    pub async fn delay_us(&mut self, us: u64) {
        self.bus.delay_us(us).await;
    }
}


#[cfg(test)]
mod tests {
    use super::testing::MockBus;
    use super::*;

    #[test]
    fn bit_mask_covers_field() {
        assert_eq!(bit_mask(0, 1), 0b0000_0001);
        assert_eq!(bit_mask(3, 2), 0b0001_1000);
        assert_eq!(bit_mask(4, 4), 0b1111_0000);
        assert_eq!(bit_mask(0, 8), 0b1111_1111);
    }

    #[test]
    fn write_bits_sets_field_in_zero_byte() {
        let mut client = RegisterClient::new(MockBus::new());
        client.write_bits(0x1B, 3, 2, 0b10).unwrap();
        let bus = client.into_inner();
        assert_eq!(bus.writes, vec![(0x1B, vec![0b0001_0000])]);
    }

    #[test]
    fn write_bits_preserves_neighbouring_bits() {
        let mut bus = MockBus::new();
        bus.set(0x6B, 0b1100_0101);
        let mut client = RegisterClient::new(bus);
        // CLKSEL field: bit 2, length 3, value 0b011
        client.write_bits(0x6B, 2, 3, 0b011).unwrap();
        assert_eq!(client.read_byte(0x6B).unwrap(), 0b1100_1101);
    }

    #[test]
    fn write_bit_reduces_to_length_one_field() {
        let mut bus = MockBus::new();
        bus.set(0x37, 0b0000_0000);
        let mut client = RegisterClient::new(bus);
        client.write_bit(0x37, 1, 1).unwrap();
        assert_eq!(client.read_byte(0x37).unwrap(), 0b0000_0010);
        client.write_bit(0x37, 1, 0).unwrap();
        assert_eq!(client.read_byte(0x37).unwrap(), 0b0000_0000);
    }

    #[test]
    fn write_bits_aborts_when_read_fails() {
        let mut bus = MockBus::new();
        bus.fail_reads.insert(0x6B);
        let mut client = RegisterClient::new(bus);
        assert!(client.write_bits(0x6B, 2, 3, 0x01).is_err());
        assert!(client.into_inner().writes.is_empty());
    }

    #[test]
    fn read_bit_shifts_and_masks() {
        let mut bus = MockBus::new();
        bus.set(0x37, 0b0000_0010);
        let mut client = RegisterClient::new(bus);
        assert_eq!(client.read_bit(0x37, 1).unwrap(), 1);
        assert_eq!(client.read_bit(0x37, 0).unwrap(), 0);
    }

    #[tokio::test]
    async fn async_write_bits_matches_blocking_traffic() {
        let mut sync_client = RegisterClient::new(MockBus::new());
        sync_client.write_bits(0x1C, 4, 2, 0b11).unwrap();
        let sync_writes = sync_client.into_inner().writes;

        let mut async_client = AsyncRegisterClient::new(MockBus::new());
        async_client.write_bits(0x1C, 4, 2, 0b11).await.unwrap();
        // Same bus state in, same bytes out.
        let mut got = [0u8; 1];
        async_client.read_bytes(0x1C, &mut got).await.unwrap();
        assert_eq!(vec![(0x1C, vec![got[0]])], sync_writes);
    }
}
