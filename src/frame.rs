//! IEEE 802.15.4 frame header decoding
//!
//! The scanner only needs one thing from a received frame: the address of
//! the device that sent it. This module parses the 16-bit frame control
//! field and walks the variable-length addressing fields to the source
//! address. It is deliberately lossy where a full MAC implementation would
//! reject: a header that is truncated, or that uses an addressing mode we
//! don't extract, yields address 0 and the caller drops the frame.
//!
//! All functions are pure and never read past the end of the input slice.

/// Shortest frame that carries a decodable header: frame control field
/// (2 bytes) plus sequence number.
pub const MIN_HEADER_LEN: usize = 3;

/// Byte offset of the first addressing field, past the frame control field
/// and the sequence number.
const ADDRESSING_OFFSET: usize = 3;

/// The frame type, from bits 0-2 of the frame control field
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameType {
    /// Beacon frame
    Beacon,
    /// Data frame
    Data,
    /// Acknowledgement frame
    Ack,
    /// MAC command frame
    MacCommand,
    /// A type this scanner doesn't classify further
    Reserved(u8),
}

impl FrameType {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0 => FrameType::Beacon,
            1 => FrameType::Data,
            2 => FrameType::Ack,
            3 => FrameType::MacCommand,
            other => FrameType::Reserved(other),
        }
    }
}

/// An addressing mode, from a 2-bit frame control field
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressMode {
    /// No address present
    None,
    /// Reserved mode; treated as absent
    Reserved,
    /// 16-bit short address
    Short,
    /// 64-bit extended address
    Extended,
}

impl AddressMode {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => AddressMode::None,
            1 => AddressMode::Reserved,
            2 => AddressMode::Short,
            _ => AddressMode::Extended,
        }
    }

    /// Width of the address field in bytes
    fn len(&self) -> usize {
        match self {
            AddressMode::None | AddressMode::Reserved => 0,
            AddressMode::Short => 2,
            AddressMode::Extended => 8,
        }
    }
}

/// The decoded frame control field, the first 16 bits of every frame
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameControl {
    /// The frame type
    pub frame_type: FrameType,
    /// Security processing requested for this frame
    pub security_enabled: bool,
    /// The sender has more data pending
    pub frame_pending: bool,
    /// The sender requests an acknowledgement
    pub ack_request: bool,
    /// Source PAN ID is omitted, the destination PAN ID applies to both
    pub pan_id_compress: bool,
    /// Destination addressing mode
    pub dest_addr_mode: AddressMode,
    /// Source addressing mode
    pub src_addr_mode: AddressMode,
}

impl FrameControl {
    /// Parses a frame control field value
    ///
    /// `fcf` is the little-endian value of the frame's first two bytes.
    pub fn parse(fcf: u16) -> Self {
        FrameControl {
            frame_type: FrameType::from_bits(fcf as u8),
            security_enabled: fcf & (1 << 3) != 0,
            frame_pending: fcf & (1 << 4) != 0,
            ack_request: fcf & (1 << 5) != 0,
            pan_id_compress: fcf & (1 << 6) != 0,
            dest_addr_mode: AddressMode::from_bits((fcf >> 10) as u8),
            src_addr_mode: AddressMode::from_bits((fcf >> 14) as u8),
        }
    }

    /// Decodes the frame control field from the start of a frame
    ///
    /// Returns `None` for frames shorter than [`MIN_HEADER_LEN`], which
    /// cannot carry any addressing information.
    pub fn from_frame(frame: &[u8]) -> Option<Self> {
        if frame.len() < MIN_HEADER_LEN {
            return None;
        }

        Some(Self::parse(u16::from_le_bytes([frame[0], frame[1]])))
    }
}

/// Extracts the source device address from a frame
///
/// Walks the addressing fields that precede the source address: the
/// destination PAN ID (present whenever a destination address is), the
/// destination address itself, and the source PAN ID (absent under PAN ID
/// compression). Returns the source address as a little-endian integer, or
/// 0 if the frame carries no source address we extract or is too short to
/// hold one. Callers must treat 0 as "no valid address" and drop the frame.
pub fn source_address(frame: &[u8], fcf: &FrameControl) -> u64 {
    let mut offset = ADDRESSING_OFFSET;

    // Destination PAN ID, present alongside any destination address.
    if fcf.dest_addr_mode != AddressMode::None {
        offset += 2;
    }
    offset += fcf.dest_addr_mode.len();

    // Source PAN ID, unless compressed into the destination's.
    if fcf.src_addr_mode != AddressMode::None && !fcf.pan_id_compress {
        offset += 2;
    }

    let width = fcf.src_addr_mode.len();
    if width == 0 || offset + width > frame.len() {
        return 0;
    }

    let mut addr = 0;
    for (i, byte) in frame[offset..offset + width].iter().enumerate() {
        addr |= (*byte as u64) << (i * 8);
    }

    addr
}
