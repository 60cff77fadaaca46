//! Intel-HEX output formatting for linked images.
//!
//! Records are `:LLAAAATT<data>CC` lines: byte count, 16-bit load
//! offset, record type, data, and a two's-complement checksum over
//! every preceding byte. An Extended Linear Address record (type 04)
//! precedes each 64 KiB block so images can load anywhere in the
//! 32-bit space.

const BLOCK: u32 = 0x1_0000;

const TYPE_DATA: u8 = 0x00;
const TYPE_EOF: u8 = 0x01;
const TYPE_EXT_LINEAR_ADDR: u8 = 0x04;
const TYPE_START_LINEAR_ADDR: u8 = 0x05;

/// Formats byte images as Intel-HEX text.
#[derive(Debug, Clone)]
pub struct IhexWriter {
    bytes_per_line: usize,
    start_address: Option<u32>,
}

impl Default for IhexWriter {
    fn default() -> Self {
        // The format allows 256 data bytes per line; 32 is customary
        // and keeps lines within 80 columns.
        Self {
            bytes_per_line: 32,
            start_address: None,
        }
    }
}

impl IhexWriter {
    /// Creates a writer emitting at most `bytes_per_line` data bytes
    /// per record.
    pub fn new(bytes_per_line: usize) -> Self {
        Self {
            bytes_per_line: bytes_per_line.clamp(1, 256),
            start_address: None,
        }
    }

    /// Also emit a Start Linear Address record (type 05) before the
    /// EOF record.
    pub fn with_start_address(mut self, addr: u32) -> Self {
        self.start_address = Some(addr);
        self
    }

    /// Formats `data` as if loaded at `load_addr`, splitting it into
    /// 64 KiB blocks with a type-04 record leading each.
    pub fn format(&self, load_addr: u32, data: &[u8]) -> String {
        let mut out = String::new();
        let mut addr = load_addr;
        let mut consumed = 0usize;

        while consumed < data.len() {
            let block_end = (addr / BLOCK + 1) * BLOCK;
            let take = ((block_end - addr) as usize).min(data.len() - consumed);

            let ulba = (addr / BLOCK) as u16;
            out.push_str(&record(TYPE_EXT_LINEAR_ADDR, 0, &ulba.to_be_bytes()));

            let mut offset = (addr % BLOCK) as u16;
            for chunk in data[consumed..consumed + take].chunks(self.bytes_per_line) {
                out.push_str(&record(TYPE_DATA, offset, chunk));
                offset = offset.wrapping_add(chunk.len() as u16);
            }

            addr += take as u32;
            consumed += take;
        }

        if let Some(start) = self.start_address {
            out.push_str(&record(TYPE_START_LINEAR_ADDR, 0, &start.to_be_bytes()));
        }
        out.push_str(&record(TYPE_EOF, 0, &[]));
        out
    }
}

/// Builds one `:LLAAAATT<data>CC` line, checksum included.
fn record(rtype: u8, offset: u16, data: &[u8]) -> String {
    let mut bytes = Vec::with_capacity(data.len() + 5);
    bytes.push(data.len() as u8);
    bytes.extend_from_slice(&offset.to_be_bytes());
    bytes.push(rtype);
    bytes.extend_from_slice(data);

    let sum: u8 = bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
    bytes.push(sum.wrapping_neg());

    let mut line = String::with_capacity(bytes.len() * 2 + 2);
    line.push(':');
    for byte in bytes {
        line.push_str(&format!("{byte:02X}"));
    }
    line.push('\n');
    line
}
