//! Zero-run-length codec.
//!
//! Save blobs are mostly zero padding. After a fixed 16-byte magic every
//! `0x00` in the stream is followed by a count byte and expands to that many
//! zeros; every other byte is literal.

use std::borrow::Cow;

use tracing::trace;

/// Header identifying a null-run blob.
pub const MAGIC: &[u8; 16] = b"cmp 20110113   \0";

/// True when `data` starts with the null-run header.
pub fn is_null_run(data: &[u8]) -> bool {
    data.starts_with(MAGIC)
}

/// Expand a null-run blob.
///
/// Input without the header is returned unchanged. A trailing `0x00` with no
/// count byte ends the stream.
pub fn decompress(data: &[u8]) -> Cow<'_, [u8]> {
    let Some(body) = data.strip_prefix(MAGIC.as_slice()) else {
        trace!(len = data.len(), "null-run header absent, passing through");
        return Cow::Borrowed(data);
    };

    let mut out = Vec::with_capacity(body.len() * 2);
    let mut bytes = body.iter().copied();
    while let Some(byte) = bytes.next() {
        if byte != 0 {
            out.push(byte);
            continue;
        }
        let Some(count) = bytes.next() else { break };
        out.resize(out.len() + usize::from(count), 0);
    }
    Cow::Owned(out)
}

/// Compress `data`, prepending the header.
///
/// Zero runs longer than 255 are split into several `00 nn` pairs, and a
/// run that is an exact multiple of 255 ends without a `00 00` pair. Some
/// other encoders of this format always close a full chunk with `00 00`;
/// both forms expand to the same bytes, but the compressed output is not
/// byte-identical to theirs.
pub fn compress(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(MAGIC.len() + data.len());
    out.extend_from_slice(MAGIC);

    let mut i = 0;
    while i < data.len() {
        if data[i] != 0 {
            out.push(data[i]);
            i += 1;
            continue;
        }

        let run = data[i..].iter().take_while(|&&b| b == 0).count();
        i += run;

        let mut left = run;
        while left > 0 {
            let chunk = left.min(usize::from(u8::MAX));
            out.push(0);
            out.push(chunk as u8);
            left -= chunk;
        }
    }
    out
}
