use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;

const PER_PART: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decode fragment payloads joined in part order.
///
/// Senders normally split one base64 string, so the concatenation decodes
/// directly. Some pad every part on its own; the joined string then has `=`
/// in the middle and each part has to be decoded separately.
pub(crate) fn decode_parts<'a>(
    parts: impl IntoIterator<Item = &'a str> + Clone,
) -> Result<Vec<u8>, base64::DecodeError> {
    let joined: String = parts.clone().into_iter().collect();

    match STANDARD.decode(joined.as_bytes()) {
        Ok(bytes) => Ok(bytes),
        Err(err) => {
            let mut out = Vec::new();
            for part in parts {
                match PER_PART.decode(part.as_bytes()) {
                    Ok(bytes) => out.extend(bytes),
                    Err(_) => return Err(err),
                }
            }
            Ok(out)
        }
    }
}
