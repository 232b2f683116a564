//! CRC-8/DVB-S2, the MSPv2 frame checksum.

/// Generator polynomial (x^8 + x^7 + x^6 + x^4 + x^2 + 1).
pub const POLYNOMIAL: u8 = 0xD5;

/// Feed one byte into the running CRC.
pub fn crc8_dvb_s2(mut crc: u8, input: u8) -> u8 {
    crc ^= input;
    for _ in 0..8 {
        if crc & 0x80 != 0 {
            crc = (crc << 1) ^ POLYNOMIAL;
        } else {
            crc <<= 1;
        }
    }
    crc
}

/// CRC over `bytes`, starting from 0.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |crc, &b| crc8_dvb_s2(crc, b))
}
