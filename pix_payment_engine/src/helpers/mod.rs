mod pix_code;

pub use pix_code::{crc16_ccitt, simulated_pix_code};
