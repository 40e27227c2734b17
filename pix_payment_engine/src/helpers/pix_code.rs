//! Static PIX "copia e cola" codes (EMV BR Code) for simulated payments.
//!
//! These codes are well-formed, but they point at a key nobody owns. They exist so that front-ends can be exercised
//! without a processor account.
use pix_common::Cents;

const SIMULATED_PIX_KEY: &str = "simulado@pix.invalid";
const MERCHANT_NAME: &str = "PIX SIMULADO";
const MERCHANT_CITY: &str = "SAO PAULO";

fn tlv(id: &str, value: &str) -> String {
    format!("{id}{:02}{value}", value.len())
}

/// CRC-16/CCITT-FALSE, as required for the BR Code checksum field.
pub fn crc16_ccitt(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for byte in data {
        crc ^= u16::from(*byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 { (crc << 1) ^ 0x1021 } else { crc << 1 };
        }
    }
    crc
}

pub fn simulated_pix_code(reference: &str, amount: Cents) -> String {
    let account = tlv("00", "BR.GOV.BCB.PIX") + &tlv("01", SIMULATED_PIX_KEY);
    let txid = reference.chars().filter(char::is_ascii_alphanumeric).take(25).collect::<String>();
    let txid = if txid.is_empty() { "***".to_string() } else { txid };
    let mut code = tlv("00", "01");
    code += &tlv("26", &account);
    code += &tlv("52", "0000");
    code += &tlv("53", "986");
    if amount.is_positive() {
        code += &tlv("54", &format!("{}.{:02}", amount.value() / 100, amount.value() % 100));
    }
    code += &tlv("58", "BR");
    code += &tlv("59", MERCHANT_NAME);
    code += &tlv("60", MERCHANT_CITY);
    code += &tlv("62", &tlv("05", &txid));
    code += "6304";
    let crc = crc16_ccitt(code.as_bytes());
    format!("{code}{crc:04X}")
}
