//! Removes per-run metadata from rendered PDF bytes.
//!
//! The PDF writer stamps every document with creation/modification times and random document
//! and XMP instance identifiers.  [`normalize_metadata`] overwrites those values in place with
//! fixed characters of the same length, so cross-reference offsets stay valid and identical
//! invoices produce identical bytes.

/// Digits written over timestamps: 2000-01-01 00:00:00, zero offset.
const FIXED_TIMESTAMP_DIGITS: &[u8] = b"20000101000000";

/// Rewrites timestamps and document identifiers to fixed values.
pub fn normalize_metadata(bytes: &mut [u8]) {
    scrub_segment(bytes, b"/CreationDate(", b')', Fill::Timestamp);
    scrub_segment(bytes, b"/ModDate(", b')', Fill::Timestamp);
    scrub_segment(bytes, b"/ID[", b']', Fill::Zeros);
    scrub_segment(bytes, b"/Producer(", b')', Fill::Zeros);

    scrub_between(bytes, b"<xmp:CreateDate>", b"</xmp:CreateDate>", Fill::Timestamp);
    scrub_between(bytes, b"<xmp:ModifyDate>", b"</xmp:ModifyDate>", Fill::Timestamp);
    scrub_between(bytes, b"<xmp:MetadataDate>", b"</xmp:MetadataDate>", Fill::Timestamp);
    scrub_between(bytes, b"<xmpMM:DocumentID>", b"</xmpMM:DocumentID>", Fill::Zeros);
    scrub_between(bytes, b"<xmpMM:InstanceID>", b"</xmpMM:InstanceID>", Fill::Zeros);
    scrub_between(bytes, b"<xmpMM:VersionID>", b"</xmpMM:VersionID>", Fill::Zeros);
}

#[derive(Clone, Copy)]
enum Fill {
    /// Replace digits with [`FIXED_TIMESTAMP_DIGITS`], keeping separators.
    Timestamp,
    /// Replace every non-structural byte with `0`.
    Zeros,
}

impl Fill {
    fn apply(self, value: &mut [u8]) {
        match self {
            Fill::Timestamp => {
                let mut position = 0;
                for byte in value.iter_mut().filter(|byte| byte.is_ascii_digit()) {
                    *byte = FIXED_TIMESTAMP_DIGITS.get(position).copied().unwrap_or(b'0');
                    position += 1;
                }
            }
            Fill::Zeros => {
                for byte in value.iter_mut() {
                    if !matches!(*byte, b'<' | b'>' | b'/' | b' ' | b'\n' | b'\r' | b'\t') {
                        *byte = b'0';
                    }
                }
            }
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn scrub_segment(data: &mut [u8], tag: &[u8], terminator: u8, fill: Fill) {
    let mut offset = 0;
    while let Some(found) = find(&data[offset..], tag) {
        let start = offset + found + tag.len();
        let Some(length) = data[start..].iter().position(|byte| *byte == terminator) else {
            break;
        };
        fill.apply(&mut data[start..start + length]);
        offset = start + length;
    }
}

fn scrub_between(data: &mut [u8], start_tag: &[u8], end_tag: &[u8], fill: Fill) {
    let mut offset = 0;
    while let Some(found) = find(&data[offset..], start_tag) {
        let start = offset + found + start_tag.len();
        let Some(length) = find(&data[start..], end_tag) else {
            break;
        };
        fill.apply(&mut data[start..start + length]);
        offset = start + length + end_tag.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_become_fixed_and_keep_length() {
        let mut pdf = b"<</CreationDate(D:20240517134501+02'00')/ModDate(D:20240517134502+02'00')>>".to_vec();
        let original_len = pdf.len();
        normalize_metadata(&mut pdf);

        assert_eq!(pdf.len(), original_len);
        assert_eq!(
            pdf,
            b"<</CreationDate(D:20000101000000+00'00')/ModDate(D:20000101000000+00'00')>>".to_vec()
        );
    }

    #[test]
    fn document_ids_are_zeroed() {
        let mut pdf = b"trailer<</ID[<a1b2c3> <d4e5f6>]>>".to_vec();
        normalize_metadata(&mut pdf);
        assert_eq!(pdf, b"trailer<</ID[<000000> <000000>]>>".to_vec());
    }

    #[test]
    fn xmp_values_are_scrubbed() {
        let mut xmp = b"<xmp:CreateDate>2024-05-17T13:45:01+02:00</xmp:CreateDate>\
<xmpMM:InstanceID>uuid:9f2c</xmpMM:InstanceID>"
            .to_vec();
        normalize_metadata(&mut xmp);
        assert_eq!(
            xmp,
            b"<xmp:CreateDate>2000-01-01T00:00:00+00:00</xmp:CreateDate>\
<xmpMM:InstanceID>000000000</xmpMM:InstanceID>"
                .to_vec()
        );
    }

    #[test]
    fn unrelated_bytes_are_untouched() {
        let mut pdf = b"%PDF-1.3\n/Title(Invoice F001-001)".to_vec();
        let before = pdf.clone();
        normalize_metadata(&mut pdf);
        assert_eq!(pdf, before);
    }
}
