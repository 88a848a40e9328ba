//! MFRC522 proximity card protocol.
//!
//! Register-level driver for an NXP MFRC522 front end reading MIFARE Classic
//! 1K cards. It talks to the chip through [`RegisterBus`], so the same card
//! exchange runs over SPI on the Pi (`gpio::GpioCardReader`) and
//! against a simulated chip in the tests below.
//!
//! A read selects the card in the field, derives the tag id from its four UID
//! bytes plus check byte, then authenticates sector 2 with the factory key and
//! reads the text stored in blocks 8 to 10. Cards with another key still
//! produce a tag, just with an empty payload.

use crate::{HardwareError, Result, types::CardRead};
use homeguard_core::TagId;
use tracing::debug;

/// Raw access to the chip's register file.
pub trait RegisterBus {
    fn read_register(&mut self, reg: u8) -> Result<u8>;
    fn write_register(&mut self, reg: u8, value: u8) -> Result<()>;
}

/// SPI address byte for `reg`: register in bits 6..1, bit 7 set for reads.
pub fn spi_address(reg: u8, read: bool) -> u8 {
    let address = (reg << 1) & 0x7E;
    if read { address | 0x80 } else { address }
}

/// Tag id from the anticollision frame, most significant byte first.
pub fn uid_to_tag(uid: &[u8; 5]) -> TagId {
    TagId::new(uid.iter().fold(0u64, |n, &b| n * 256 + u64::from(b)))
}

/// Card text as Latin-1, without the space or NUL padding writers leave.
pub fn decode_text(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| char::from(b))
        .collect::<String>()
        .trim_end_matches([' ', '\0'])
        .to_string()
}

/// Factory transport key.
pub const DEFAULT_KEY: [u8; 6] = [0xFF; 6];

/// Blocks holding the card text, all in sector 2.
pub const TEXT_BLOCKS: [u8; 3] = [8, 9, 10];

const SECTOR_TRAILER: u8 = 11;

/// Status polls before a command is considered lost.
const IRQ_POLL_LIMIT: usize = 2000;
const CRC_POLL_LIMIT: usize = 255;

mod reg {
    pub const COMMAND: u8 = 0x01;
    pub const COM_IEN: u8 = 0x02;
    pub const COM_IRQ: u8 = 0x04;
    pub const DIV_IRQ: u8 = 0x05;
    pub const ERROR: u8 = 0x06;
    pub const STATUS2: u8 = 0x08;
    pub const FIFO_DATA: u8 = 0x09;
    pub const FIFO_LEVEL: u8 = 0x0A;
    pub const CONTROL: u8 = 0x0C;
    pub const BIT_FRAMING: u8 = 0x0D;
    pub const MODE: u8 = 0x11;
    pub const TX_CONTROL: u8 = 0x14;
    pub const TX_ASK: u8 = 0x15;
    pub const CRC_RESULT_M: u8 = 0x21;
    pub const CRC_RESULT_L: u8 = 0x22;
    pub const T_MODE: u8 = 0x2A;
    pub const T_PRESCALER: u8 = 0x2B;
    pub const T_RELOAD_H: u8 = 0x2C;
    pub const T_RELOAD_L: u8 = 0x2D;
    pub const VERSION: u8 = 0x37;
}

mod cmd {
    pub const IDLE: u8 = 0x00;
    pub const CALC_CRC: u8 = 0x03;
    pub const TRANSCEIVE: u8 = 0x0C;
    pub const AUTHENT: u8 = 0x0E;
    pub const SOFT_RESET: u8 = 0x0F;
}

mod picc {
    pub const REQUEST_IDLE: u8 = 0x26;
    pub const CASCADE_1: u8 = 0x93;
    pub const ANTICOLLISION: u8 = 0x20;
    pub const SELECT: u8 = 0x70;
    pub const AUTH_KEY_A: u8 = 0x60;
    pub const READ: u8 = 0x30;
}

/// Bytes the card sent back and how many bits were valid.
#[derive(Debug, Default)]
struct Frame {
    data: Vec<u8>,
    bits: usize,
}

/// An initialised MFRC522 behind some register bus.
#[derive(Debug)]
pub struct Mfrc522<B> {
    bus: B,
}

impl<B: RegisterBus> Mfrc522<B> {
    /// Soft-reset the chip, program its timer and switch the antenna on.
    pub fn new(bus: B) -> Result<Self> {
        let mut chip = Self { bus };
        chip.write(reg::COMMAND, cmd::SOFT_RESET)?;
        chip.write(reg::T_MODE, 0x8D)?;
        chip.write(reg::T_PRESCALER, 0x3E)?;
        chip.write(reg::T_RELOAD_L, 30)?;
        chip.write(reg::T_RELOAD_H, 0)?;
        chip.write(reg::TX_ASK, 0x40)?;
        chip.write(reg::MODE, 0x3D)?;
        chip.set_bits(reg::TX_CONTROL, 0x03)?;
        Ok(chip)
    }

    /// Silicon version byte (0x91 or 0x92 for genuine parts).
    pub fn version(&mut self) -> Result<u8> {
        self.read(reg::VERSION)
    }

    /// One read attempt. `Ok(None)` when no card answers.
    ///
    /// # Errors
    ///
    /// Only bus failures are errors; a card that misbehaves mid-exchange
    /// yields `None` or an empty payload.
    pub fn poll(&mut self) -> Result<Option<CardRead>> {
        if !self.request()? {
            return Ok(None);
        }
        let Some(uid) = self.anticollision()? else {
            return Ok(None);
        };
        let tag = uid_to_tag(&uid);

        if !self.select(&uid)? {
            debug!(%tag, "Card did not acknowledge select");
        }
        let payload = self.read_text(&uid)?;
        self.clear_bits(reg::STATUS2, 0x08)?;

        Ok(Some(CardRead::new(tag, payload)))
    }

    fn read_text(&mut self, uid: &[u8; 5]) -> Result<String> {
        if !self.authenticate(SECTOR_TRAILER, &DEFAULT_KEY, uid)? {
            debug!("Sector authentication failed, reading tag only");
            return Ok(String::new());
        }

        let mut bytes = Vec::with_capacity(TEXT_BLOCKS.len() * 16);
        for block in TEXT_BLOCKS {
            match self.read_block(block)? {
                Some(data) => bytes.extend_from_slice(&data),
                None => debug!(block, "Block read failed"),
            }
        }
        Ok(decode_text(&bytes))
    }

    fn request(&mut self) -> Result<bool> {
        self.write(reg::BIT_FRAMING, 0x07)?;
        let frame = self.exchange(cmd::TRANSCEIVE, &[picc::REQUEST_IDLE])?;
        Ok(frame.is_some_and(|f| f.bits == 16))
    }

    fn anticollision(&mut self) -> Result<Option<[u8; 5]>> {
        self.write(reg::BIT_FRAMING, 0x00)?;
        let frame = self.exchange(cmd::TRANSCEIVE, &[picc::CASCADE_1, picc::ANTICOLLISION])?;

        let Some(uid) = frame.and_then(|f| <[u8; 5]>::try_from(f.data.as_slice()).ok()) else {
            return Ok(None);
        };
        let check = uid[..4].iter().fold(0, |acc, b| acc ^ b);
        if check != uid[4] {
            debug!("UID check byte mismatch");
            return Ok(None);
        }
        Ok(Some(uid))
    }

    fn select(&mut self, uid: &[u8; 5]) -> Result<bool> {
        let mut buf = vec![picc::CASCADE_1, picc::SELECT];
        buf.extend_from_slice(uid);
        self.append_crc(&mut buf)?;
        let frame = self.exchange(cmd::TRANSCEIVE, &buf)?;
        Ok(frame.is_some_and(|f| f.bits == 24))
    }

    fn authenticate(&mut self, block: u8, key: &[u8; 6], uid: &[u8; 5]) -> Result<bool> {
        let mut buf = vec![picc::AUTH_KEY_A, block];
        buf.extend_from_slice(key);
        buf.extend_from_slice(&uid[..4]);

        if self.exchange(cmd::AUTHENT, &buf)?.is_none() {
            return Ok(false);
        }
        Ok(self.read(reg::STATUS2)? & 0x08 != 0)
    }

    fn read_block(&mut self, block: u8) -> Result<Option<[u8; 16]>> {
        let mut buf = vec![picc::READ, block];
        self.append_crc(&mut buf)?;
        let frame = self.exchange(cmd::TRANSCEIVE, &buf)?;
        Ok(frame.and_then(|f| <[u8; 16]>::try_from(f.data.as_slice()).ok()))
    }

    fn append_crc(&mut self, buf: &mut Vec<u8>) -> Result<()> {
        self.write(reg::DIV_IRQ, 0x04)?;
        self.write(reg::FIFO_LEVEL, 0x80)?;
        for &b in buf.iter() {
            self.write(reg::FIFO_DATA, b)?;
        }
        self.write(reg::COMMAND, cmd::CALC_CRC)?;

        let mut done = false;
        for _ in 0..CRC_POLL_LIMIT {
            if self.read(reg::DIV_IRQ)? & 0x04 != 0 {
                done = true;
                break;
            }
        }
        if !done {
            return Err(HardwareError::communication("CRC coprocessor did not finish"));
        }

        buf.push(self.read(reg::CRC_RESULT_L)?);
        buf.push(self.read(reg::CRC_RESULT_M)?);
        Ok(())
    }

    /// Run `command` with `data` in the FIFO and collect the card's answer.
    fn exchange(&mut self, command: u8, data: &[u8]) -> Result<Option<Frame>> {
        let (irq_enable, wait_irq) = match command {
            cmd::AUTHENT => (0x12, 0x10),
            _ => (0x77, 0x30),
        };

        self.write(reg::COM_IEN, irq_enable | 0x80)?;
        self.write(reg::COM_IRQ, 0x7F)?;
        self.write(reg::FIFO_LEVEL, 0x80)?;
        self.write(reg::COMMAND, cmd::IDLE)?;
        for &b in data {
            self.write(reg::FIFO_DATA, b)?;
        }
        self.write(reg::COMMAND, command)?;
        if command == cmd::TRANSCEIVE {
            self.set_bits(reg::BIT_FRAMING, 0x80)?;
        }

        let mut irq = None;
        for _ in 0..IRQ_POLL_LIMIT {
            let n = self.read(reg::COM_IRQ)?;
            if n & (0x01 | wait_irq) != 0 {
                irq = Some(n);
                break;
            }
        }
        self.clear_bits(reg::BIT_FRAMING, 0x80)?;

        let Some(irq) = irq else {
            return Ok(None);
        };
        if self.read(reg::ERROR)? & 0x1B != 0 {
            return Ok(None);
        }
        // Timer expired: nothing answered.
        if irq & irq_enable & 0x01 != 0 {
            return Ok(None);
        }

        let mut frame = Frame::default();
        if command == cmd::TRANSCEIVE {
            let level = usize::from(self.read(reg::FIFO_LEVEL)?);
            let last_bits = usize::from(self.read(reg::CONTROL)? & 0x07);
            frame.bits = match last_bits {
                0 => level * 8,
                n => level.saturating_sub(1) * 8 + n,
            };
            for _ in 0..level.clamp(1, 16) {
                frame.data.push(self.read(reg::FIFO_DATA)?);
            }
        }
        Ok(Some(frame))
    }

    fn read(&mut self, reg: u8) -> Result<u8> {
        self.bus.read_register(reg)
    }

    fn write(&mut self, reg: u8, value: u8) -> Result<()> {
        self.bus.write_register(reg, value)
    }

    fn set_bits(&mut self, reg: u8, mask: u8) -> Result<()> {
        let value = self.read(reg)?;
        self.write(reg, value | mask)
    }

    fn clear_bits(&mut self, reg: u8, mask: u8) -> Result<()> {
        let value = self.read(reg)?;
        self.write(reg, value & !mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::{HashMap, VecDeque};

    struct FakeCard {
        uid: [u8; 4],
        key: [u8; 6],
        blocks: HashMap<u8, [u8; 16]>,
        corrupt_check_byte: bool,
    }

    impl FakeCard {
        fn with_text(uid: [u8; 4], text: &str) -> Self {
            let mut padded = text.as_bytes().to_vec();
            padded.resize(48, b' ');
            let blocks = TEXT_BLOCKS
                .iter()
                .zip(padded.chunks(16))
                .map(|(&block, chunk)| (block, <[u8; 16]>::try_from(chunk).unwrap()))
                .collect();
            Self {
                uid,
                key: DEFAULT_KEY,
                blocks,
                corrupt_check_byte: false,
            }
        }

        fn check_byte(&self) -> u8 {
            let check = self.uid.iter().fold(0, |acc, b| acc ^ b);
            if self.corrupt_check_byte { !check } else { check }
        }
    }

    /// Just enough of the chip to answer the exchanges above.
    #[derive(Default)]
    struct FakeChip {
        regs: HashMap<u8, u8>,
        fifo: VecDeque<u8>,
        card: Option<FakeCard>,
    }

    impl FakeChip {
        fn with_card(card: FakeCard) -> Self {
            Self {
                card: Some(card),
                ..Self::default()
            }
        }

        fn reg(&self, reg: u8) -> u8 {
            self.regs.get(&reg).copied().unwrap_or(0)
        }

        fn set(&mut self, reg: u8, mask: u8) {
            *self.regs.entry(reg).or_default() |= mask;
        }

        fn execute(&mut self, command: u8) {
            let request: Vec<u8> = self.fifo.drain(..).collect();
            match command {
                cmd::CALC_CRC => {
                    self.regs.insert(reg::CRC_RESULT_L, 0xA1);
                    self.regs.insert(reg::CRC_RESULT_M, 0xB2);
                    self.set(reg::DIV_IRQ, 0x04);
                }
                cmd::AUTHENT => {
                    let ok = self
                        .card
                        .as_ref()
                        .is_some_and(|c| request[2..8] == c.key && request[8..12] == c.uid);
                    if ok {
                        self.set(reg::STATUS2, 0x08);
                    }
                    self.set(reg::COM_IRQ, 0x10);
                }
                cmd::TRANSCEIVE => match self.answer(&request) {
                    Some(reply) => {
                        self.fifo.extend(reply);
                        self.regs.insert(reg::CONTROL, 0);
                        self.set(reg::COM_IRQ, 0x30);
                    }
                    None => self.set(reg::COM_IRQ, 0x01),
                },
                _ => {}
            }
        }

        fn answer(&self, request: &[u8]) -> Option<Vec<u8>> {
            let card = self.card.as_ref()?;
            let crypto = self.reg(reg::STATUS2) & 0x08 != 0;
            match request {
                [picc::REQUEST_IDLE] => Some(vec![0x04, 0x00]),
                [picc::CASCADE_1, picc::ANTICOLLISION] => {
                    let mut uid = card.uid.to_vec();
                    uid.push(card.check_byte());
                    Some(uid)
                }
                [picc::CASCADE_1, picc::SELECT, ..] => Some(vec![0x08, 0xB6, 0xDD]),
                [picc::READ, block, ..] if crypto => {
                    let mut data = card.blocks.get(block)?.to_vec();
                    data.extend([0xC0, 0xDE]);
                    Some(data)
                }
                _ => None,
            }
        }
    }

    impl RegisterBus for FakeChip {
        fn read_register(&mut self, reg: u8) -> Result<u8> {
            Ok(match reg {
                reg::FIFO_DATA => self.fifo.pop_front().unwrap_or(0),
                reg::FIFO_LEVEL => self.fifo.len() as u8,
                reg::VERSION => 0x92,
                _ => self.reg(reg),
            })
        }

        fn write_register(&mut self, reg: u8, value: u8) -> Result<()> {
            match reg {
                reg::FIFO_DATA => self.fifo.push_back(value),
                reg::FIFO_LEVEL if value & 0x80 != 0 => self.fifo.clear(),
                reg::COMMAND => self.execute(value),
                // Bit 7 selects set or clear for the marked IRQ bits.
                reg::COM_IRQ | reg::DIV_IRQ if value & 0x80 == 0 => {
                    *self.regs.entry(reg).or_default() &= !value;
                }
                _ => {
                    self.regs.insert(reg, value);
                }
            }
            Ok(())
        }
    }

    const UID: [u8; 4] = [0x12, 0x34, 0x56, 0x78];

    #[rstest]
    #[case(0x01, false, 0x02)]
    #[case(0x01, true, 0x82)]
    #[case(0x37, true, 0xEE)]
    #[case(0x09, false, 0x12)]
    fn test_spi_address(#[case] reg: u8, #[case] read: bool, #[case] expected: u8) {
        assert_eq!(spi_address(reg, read), expected);
    }

    #[rstest]
    #[case([0, 0, 0, 1, 2], 258)]
    #[case([0x12, 0x34, 0x56, 0x78, 0x9A], 0x12_3456_789A)]
    fn test_uid_to_tag(#[case] uid: [u8; 5], #[case] tag: u64) {
        assert_eq!(uid_to_tag(&uid), TagId::new(tag));
    }

    #[test]
    fn test_decode_text_strips_padding() {
        assert_eq!(decode_text(b"front door   \0\0"), "front door");
        assert_eq!(decode_text(b""), "");
    }

    #[test]
    fn test_new_switches_antenna_on() {
        let mut chip = Mfrc522::new(FakeChip::default()).unwrap();
        assert_eq!(chip.bus.reg(reg::TX_CONTROL) & 0x03, 0x03);
        assert_eq!(chip.bus.reg(reg::T_MODE), 0x8D);
        assert_eq!(chip.version().unwrap(), 0x92);
    }

    #[test]
    fn test_poll_empty_field() {
        let mut chip = Mfrc522::new(FakeChip::default()).unwrap();
        assert_eq!(chip.poll().unwrap(), None);
    }

    #[test]
    fn test_poll_reads_tag_and_text() {
        let card = FakeCard::with_text(UID, "front door key");
        let mut chip = Mfrc522::new(FakeChip::with_card(card)).unwrap();

        let read = chip.poll().unwrap().unwrap();
        let check = 0x12 ^ 0x34 ^ 0x56 ^ 0x78;
        assert_eq!(read.tag, uid_to_tag(&[0x12, 0x34, 0x56, 0x78, check]));
        assert_eq!(read.payload, "front door key");
        // Crypto unit is switched off again for the next card.
        assert_eq!(chip.bus.reg(reg::STATUS2) & 0x08, 0);
    }

    #[test]
    fn test_poll_foreign_key_still_yields_tag() {
        let mut card = FakeCard::with_text(UID, "secret");
        card.key = [0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5];
        let mut chip = Mfrc522::new(FakeChip::with_card(card)).unwrap();

        let read = chip.poll().unwrap().unwrap();
        assert_eq!(read.payload, "");
    }

    #[test]
    fn test_poll_rejects_bad_check_byte() {
        let mut card = FakeCard::with_text(UID, "x");
        card.corrupt_check_byte = true;
        let mut chip = Mfrc522::new(FakeChip::with_card(card)).unwrap();

        assert_eq!(chip.poll().unwrap(), None);
    }

    #[test]
    fn test_bus_failure_propagates() {
        struct DeadBus;
        impl RegisterBus for DeadBus {
            fn read_register(&mut self, _reg: u8) -> Result<u8> {
                Err(HardwareError::communication("spi0 gone"))
            }
            fn write_register(&mut self, _reg: u8, _value: u8) -> Result<()> {
                Err(HardwareError::communication("spi0 gone"))
            }
        }

        let err = Mfrc522::new(DeadBus).err().unwrap();
        assert!(matches!(err, HardwareError::CommunicationError { .. }));
    }
}
