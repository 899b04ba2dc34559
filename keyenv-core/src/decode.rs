use std::string::FromUtf8Error;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum DecodeError {
    #[error("Keychain output is not a valid hex dump: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("Decoded secure note is not valid UTF-8")]
    Utf8(#[from] FromUtf8Error),
}

/// Turns the hex dump printed by `security ... -w` back into the note text.
///
/// Digits are case-insensitive. Odd-length input or anything that is not a hex digit is
/// rejected instead of being truncated.
pub fn decode_hex_text(input: &str) -> Result<String, DecodeError> {
    let bytes = hex::decode(input)?;
    Ok(String::from_utf8(bytes)?)
}
