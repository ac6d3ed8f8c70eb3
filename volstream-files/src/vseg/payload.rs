use crate::ParserError;
use crate::vseg::types::PayloadEncoding;

/// Size of the payload once expanded, without expanding it.
pub fn decoded_len(encoding: PayloadEncoding, data: &[u8]) -> Result<usize, ParserError> {
    match encoding {
        PayloadEncoding::Raw => Ok(data.len()),
        PayloadEncoding::RunLength => {
            if data.len() % 2 != 0 {
                return Err(ParserError::FormatError {
                    reason: "Run length payload has a dangling byte",
                });
            }

            Ok(data.chunks_exact(2).map(|pair| pair[0] as usize).sum())
        }
    }
}

/// Expands a frame payload into `out`. The caller decides how `out` gets allocated.
pub fn decode_payload_into(encoding: PayloadEncoding, data: &[u8], out: &mut Vec<u8>) -> Result<(), ParserError> {
    match encoding {
        PayloadEncoding::Raw => out.extend_from_slice(data),
        PayloadEncoding::RunLength => {
            decoded_len(encoding, data)?;
            for pair in data.chunks_exact(2) {
                if pair[0] == 0 {
                    return Err(ParserError::FormatError {
                        reason: "Run length of zero",
                    });
                }
                out.extend(std::iter::repeat_n(pair[1], pair[0] as usize));
            }
        }
    }
    Ok(())
}

pub fn decode_payload(encoding: PayloadEncoding, data: &[u8]) -> Result<Vec<u8>, ParserError> {
    let mut out = Vec::with_capacity(decoded_len(encoding, data)?);
    decode_payload_into(encoding, data, &mut out)?;
    Ok(out)
}

pub fn encode_payload(encoding: PayloadEncoding, data: &[u8]) -> Vec<u8> {
    match encoding {
        PayloadEncoding::Raw => data.to_vec(),
        PayloadEncoding::RunLength => {
            let mut out = Vec::new();
            let mut iter = data.iter().peekable();
            while let Some(&value) = iter.next() {
                let mut run = 1u8;
                while run < u8::MAX && iter.peek() == Some(&&value) {
                    iter.next();
                    run += 1;
                }
                out.push(run);
                out.push(value);
            }
            out
        }
    }
}
