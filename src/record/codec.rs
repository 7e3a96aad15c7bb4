//! Canonical binary envelope for [`Record`].
//!
//! ```text
//! ╔═══════════╦══════════════╦═══════╦═════╦═════╦═══════════╦══════════╦═════════════════╗
//! ║  value    ║  validity    ║ vtype ║ seq ║ ttl ║ sigV2     ║ data     ║ sigV1           ║
//! ║ u32 + N   ║ u32 + N      ║  u8   ║ u64 ║ u64 ║ u32 + N   ║ u32 + N  ║ u8 [+ u32 + N]  ║
//! ╚═══════════╩══════════════╩═══════╩═════╩═════╩═══════════╩══════════╩═════════════════╝
//! ```
//!
//! All integers are big-endian. The V1 slot is a presence flag (0 or 1)
//! followed by the signature when present. Nothing may follow it.

use untrusted;

use crate::datetime_utils::ValidityTime;
use crate::errors::*;
use crate::record::{Record, RecordFields, ValidityType};

const V1_ABSENT: u8 = 0;
const V1_PRESENT: u8 = 1;

pub fn encode(record: &Record) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(
        4 * 4 + 1 + 8 + 8 + 1
            + record.value.len()
            + record.validity.len()
            + record.signature_v2.len()
            + record.data.len(),
    );

    put_bytes(&mut out, &record.value, "value")?;
    put_bytes(&mut out, record.validity.as_bytes(), "validity")?;
    out.push(record.validity_type.tag());
    out.extend_from_slice(&record.sequence.to_be_bytes());
    out.extend_from_slice(&record.ttl.to_be_bytes());
    put_bytes(&mut out, &record.signature_v2, "signatureV2")?;
    put_bytes(&mut out, &record.data, "data")?;

    match record.signature_v1 {
        Some(ref sig) => {
            out.push(V1_PRESENT);
            put_bytes(&mut out, sig, "signatureV1")?;
        }
        None => out.push(V1_ABSENT),
    }

    Ok(out)
}

/// Parse an envelope. The embedded data sub-record must agree with the
/// top-level fields; the returned record is built from the data copies.
pub fn decode(bytes: &[u8]) -> Result<Record> {
    let raw = untrusted::Input::from(bytes).read_all(
        malformed("trailing bytes after record"),
        read_envelope,
    )?;

    let signed = RecordFields::from_data_bytes(&raw.data)?;
    check_agrees(&raw.fields, &signed)?;

    ValidityTime::from_str(&signed.validity)
        .map_err(|_| malformed(format!("validity {:?} is not rfc3339", signed.validity)))?;

    Ok(Record {
        value: signed.value,
        validity_type: signed.validity_type,
        validity: signed.validity,
        sequence: signed.sequence,
        ttl: signed.ttl,
        signature_v2: raw.signature_v2,
        data: raw.data,
        signature_v1: raw.signature_v1,
    })
}

struct RawEnvelope {
    fields: RecordFields,
    signature_v2: Vec<u8>,
    data: Vec<u8>,
    signature_v1: Option<Vec<u8>>,
}

fn read_envelope(reader: &mut untrusted::Reader) -> Result<RawEnvelope> {
    let value = read_bytes(reader, "value")?;
    let validity = String::from_utf8(read_bytes(reader, "validity")?)
        .map_err(|_| malformed("validity is not utf8"))?;

    let tag = reader
        .read_byte()
        .map_err(|_| malformed("truncated validity type"))?;
    let validity_type =
        ValidityType::from_tag(tag).ok_or_else(|| malformed(format!("unknown validity type {}", tag)))?;

    let sequence = read_u64(reader, "sequence")?;
    let ttl = read_u64(reader, "ttl")?;
    let signature_v2 = read_bytes(reader, "signatureV2")?;
    let data = read_bytes(reader, "data")?;

    let signature_v1 = match reader
        .read_byte()
        .map_err(|_| malformed("truncated signatureV1 flag"))?
    {
        V1_ABSENT => None,
        V1_PRESENT => Some(read_bytes(reader, "signatureV1")?),
        other => return Err(malformed(format!("bad signatureV1 flag {}", other))),
    };

    Ok(RawEnvelope {
        fields: RecordFields {
            value: value,
            validity_type: validity_type,
            validity: validity,
            sequence: sequence,
            ttl: ttl,
        },
        signature_v2: signature_v2,
        data: data,
        signature_v1: signature_v1,
    })
}

fn check_agrees(top: &RecordFields, signed: &RecordFields) -> Result<()> {
    let mismatch = if top.value != signed.value {
        "value"
    } else if top.validity_type != signed.validity_type {
        "validity type"
    } else if top.validity != signed.validity {
        "validity"
    } else if top.sequence != signed.sequence {
        "sequence"
    } else if top.ttl != signed.ttl {
        "ttl"
    } else {
        return Ok(());
    };

    Err(malformed(format!("top-level {} disagrees with data sub-record", mismatch)))
}

fn put_bytes(out: &mut Vec<u8>, bytes: &[u8], what: &str) -> Result<()> {
    if bytes.len() > u32::MAX as usize {
        bail!(ErrorKind::MalformedRecord(format!("{} too long", what)));
    }
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(bytes);
    Ok(())
}

fn read_bytes(reader: &mut untrusted::Reader, what: &str) -> Result<Vec<u8>> {
    let len = read_fixed::<4>(reader, what)?;
    let len = u32::from_be_bytes(len) as usize;

    reader
        .read_bytes(len)
        .map(|input| input.as_slice_less_safe().to_vec())
        .map_err(|_| malformed(format!("truncated {}", what)))
}

fn read_u64(reader: &mut untrusted::Reader, what: &str) -> Result<u64> {
    Ok(u64::from_be_bytes(read_fixed::<8>(reader, what)?))
}

fn read_fixed<const N: usize>(reader: &mut untrusted::Reader, what: &str) -> Result<[u8; N]> {
    let input = reader
        .read_bytes(N)
        .map_err(|_| malformed(format!("truncated {}", what)))?;

    let mut buf = [0u8; N];
    buf.copy_from_slice(input.as_slice_less_safe());
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::NANOS_PER_SEC;
    use rand::Rng;

    fn record(with_v1: bool) -> Record {
        let fields = RecordFields {
            value: b"/ipfs/bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi".to_vec(),
            validity_type: ValidityType::Eol,
            validity: "2030-01-01T00:00:00.000000000Z".into(),
            sequence: 42,
            ttl: 60 * NANOS_PER_SEC,
        };

        Record {
            data: fields.to_data_bytes().unwrap(),
            value: fields.value,
            validity_type: fields.validity_type,
            validity: fields.validity,
            sequence: fields.sequence,
            ttl: fields.ttl,
            signature_v2: vec![0xaa; 64],
            signature_v1: if with_v1 { Some(vec![0xbb; 64]) } else { None },
        }
    }

    fn assert_malformed(result: Result<Record>) {
        match result {
            Err(ref e) => match *e.kind() {
                ErrorKind::MalformedRecord(_) => {}
                ref other => panic!("unexpected error {:?}", other),
            },
            Ok(_) => panic!("decoded a malformed record"),
        }
    }

    #[test]
    fn round_trip() {
        for with_v1 in &[false, true] {
            let r = record(*with_v1);
            assert_eq!(decode(&encode(&r).unwrap()).unwrap(), r);
        }
    }

    fn record_from(fields: RecordFields, signature_v2: Vec<u8>, signature_v1: Option<Vec<u8>>) -> Record {
        Record {
            data: fields.to_data_bytes().unwrap(),
            value: fields.value,
            validity_type: fields.validity_type,
            validity: fields.validity,
            sequence: fields.sequence,
            ttl: fields.ttl,
            signature_v2: signature_v2,
            signature_v1: signature_v1,
        }
    }

    #[test]
    fn round_trip_extremes() {
        for &(sequence, ttl) in &[(0, 0), (u64::MAX, u64::MAX), (0, u64::MAX), (u64::MAX, 0)] {
            for value in &[Vec::new(), vec![0u8; 1], vec![0xff; 4096]] {
                for sig_v1 in &[None, Some(Vec::new()), Some(vec![7u8; 64])] {
                    let fields = RecordFields {
                        value: value.clone(),
                        validity_type: ValidityType::Eol,
                        validity: "1970-01-01T00:00:00Z".into(),
                        sequence: sequence,
                        ttl: ttl,
                    };
                    let r = record_from(fields, Vec::new(), sig_v1.clone());
                    assert_eq!(decode(&encode(&r).unwrap()).unwrap(), r);
                }
            }
        }
    }

    #[test]
    fn round_trip_random() {
        let mut rng = rand::thread_rng();

        for _ in 0..64 {
            let value_len = rng.gen_range(0..512);
            let fields = RecordFields {
                value: (0..value_len).map(|_| rng.gen()).collect(),
                validity_type: ValidityType::Eol,
                validity: "2030-01-01T00:00:00.000000000Z".into(),
                sequence: rng.gen(),
                ttl: rng.gen(),
            };
            let sig_v2_len = rng.gen_range(0..128);
            let sig_v2 = (0..sig_v2_len).map(|_| rng.gen()).collect();
            let sig_v1 = if rng.gen() { Some(vec![rng.gen(); 64]) } else { None };

            let r = record_from(fields, sig_v2, sig_v1);
            assert_eq!(decode(&encode(&r).unwrap()).unwrap(), r);
        }
    }

    #[test]
    fn layout_is_big_endian() {
        let r = record(false);
        let bytes = encode(&r).unwrap();

        assert_eq!(&bytes[..4], &(r.value.len() as u32).to_be_bytes());

        let seq_at = 4 + r.value.len() + 4 + r.validity.len() + 1;
        assert_eq!(bytes[seq_at - 1], 0);
        assert_eq!(&bytes[seq_at..seq_at + 8], &42u64.to_be_bytes());
        assert_eq!(&bytes[seq_at + 8..seq_at + 16], &60_000_000_000u64.to_be_bytes());
        assert_eq!(*bytes.last().unwrap(), V1_ABSENT);
    }

    #[test]
    fn decode_truncated() {
        let bytes = encode(&record(true)).unwrap();
        for len in 0..bytes.len() {
            assert_malformed(decode(&bytes[..len]));
        }
    }

    #[test]
    fn decode_trailing_bytes() {
        let mut bytes = encode(&record(false)).unwrap();
        bytes.push(0);
        assert_malformed(decode(&bytes));
    }

    #[test]
    fn decode_unknown_validity_type() {
        let r = record(false);
        let mut bytes = encode(&r).unwrap();
        let tag_at = 4 + r.value.len() + 4 + r.validity.len();
        bytes[tag_at] = 1;
        assert_malformed(decode(&bytes));
    }

    #[test]
    fn decode_bad_v1_flag() {
        let mut bytes = encode(&record(false)).unwrap();
        let last = bytes.len() - 1;
        bytes[last] = 2;
        assert_malformed(decode(&bytes));
    }

    #[test]
    fn decode_top_level_sequence_disagrees() {
        let mut r = record(false);
        r.sequence = 43;
        assert_malformed(decode(&encode(&r).unwrap()));
    }

    #[test]
    fn decode_top_level_validity_disagrees() {
        let mut r = record(true);
        r.validity = "2031-01-01T00:00:00.000000000Z".into();
        assert_malformed(decode(&encode(&r).unwrap()));
    }

    #[test]
    fn decode_bad_data_sub_record() {
        let mut r = record(false);
        r.data = b"definitely not cbor".to_vec();
        assert_malformed(decode(&encode(&r).unwrap()));
    }

    #[test]
    fn decode_validity_not_a_timestamp() {
        let mut fields = record(false).fields();
        fields.validity = "whenever".into();

        let mut r = record(false);
        r.validity = fields.validity.clone();
        r.data = fields.to_data_bytes().unwrap();
        assert_malformed(decode(&encode(&r).unwrap()));
    }
}
