//! Binary persistence for [`RecordStore`].
//!
//! Layout (all integers little-endian, no padding):
//!
//! ```text
//! [count: i32]
//! [count x record]   record = id: i32 | name: [u8; 50] | age: i32 | score: f32
//! [crc32: u32]       CRC-32 of every preceding byte
//! ```
//!
//! The name buffer holds UTF-8 text terminated and padded with NUL bytes.
//! Records are written with `bincode`'s fixed-width encoding, which lays the
//! struct fields out back to back, so every record is exactly
//! [`RECORD_LEN`] bytes.
use crc32fast::Hasher as Crc32;
use serde::de::{self, SeqAccess, Visitor};
use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

use crate::error::{CodecError, StoreError};
use crate::store::RecordStore;
use crate::student::{validate_name, Student, NAME_BUF_LEN};

/// Encoded size of one record.
pub const RECORD_LEN: usize = 4 + NAME_BUF_LEN + 4 + 4;
const COUNT_LEN: usize = 4;
const CRC_LEN: usize = 4;

/// Fixed-size, NUL-padded name buffer.
struct NameBuf([u8; NAME_BUF_LEN]);

impl Serialize for NameBuf {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tup = serializer.serialize_tuple(NAME_BUF_LEN)?;
        for b in &self.0 {
            tup.serialize_element(b)?;
        }
        tup.end()
    }
}

impl<'de> Deserialize<'de> for NameBuf {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct NameBufVisitor;

        impl<'de> Visitor<'de> for NameBufVisitor {
            type Value = NameBuf;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "a {NAME_BUF_LEN}-byte name buffer")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<NameBuf, A::Error> {
                let mut buf = [0u8; NAME_BUF_LEN];
                for (i, slot) in buf.iter_mut().enumerate() {
                    *slot = match seq.next_element()? {
                        Some(b) => b,
                        None => return Err(de::Error::invalid_length(i, &self)),
                    };
                }
                Ok(NameBuf(buf))
            }
        }

        deserializer.deserialize_tuple(NAME_BUF_LEN, NameBufVisitor)
    }
}

/// On-disk shape of a [`Student`].
#[derive(Serialize, Deserialize)]
struct RawStudent {
    id: i32,
    name: NameBuf,
    age: i32,
    score: f32,
}

impl TryFrom<&Student> for RawStudent {
    type Error = StoreError;

    fn try_from(s: &Student) -> Result<Self, StoreError> {
        validate_name(&s.name)?;
        let mut name = [0u8; NAME_BUF_LEN];
        name[..s.name.len()].copy_from_slice(s.name.as_bytes());
        Ok(RawStudent { id: s.id, name: NameBuf(name), age: s.age, score: s.score })
    }
}

impl TryFrom<RawStudent> for Student {
    type Error = String;

    fn try_from(raw: RawStudent) -> Result<Self, String> {
        let bytes = &raw.name.0;
        let end = bytes
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| "name buffer is not NUL-terminated".to_string())?;
        let name = std::str::from_utf8(&bytes[..end])
            .map_err(|e| format!("name is not valid UTF-8: {e}"))?;
        Ok(Student::new(raw.id, name, raw.age, raw.score))
    }
}

/// Encode the whole store, trailer included.
pub fn encode(store: &RecordStore) -> Result<Vec<u8>, CodecError> {
    let count = i32::try_from(store.len()).map_err(|_| CodecError::TooManyRecords(store.len()))?;
    let mut out = Vec::with_capacity(COUNT_LEN + store.len() * RECORD_LEN + CRC_LEN);
    out.extend_from_slice(&count.to_le_bytes());
    for s in store.iter() {
        let raw = RawStudent::try_from(s)?;
        bincode::serialize_into(&mut out, &raw)?;
    }
    let mut hasher = Crc32::new();
    hasher.update(&out);
    let crc = hasher.finalize();
    out.extend_from_slice(&crc.to_le_bytes());
    Ok(out)
}

/// Decode a complete store image produced by [`encode`].
pub fn decode(bytes: &[u8]) -> Result<RecordStore, CodecError> {
    if bytes.len() < COUNT_LEN + CRC_LEN {
        return Err(CodecError::Malformed(format!(
            "{} bytes is too short for a header and checksum",
            bytes.len()
        )));
    }
    let (body, trailer) = bytes.split_at(bytes.len() - CRC_LEN);
    let count = i32::from_le_bytes([body[0], body[1], body[2], body[3]]);
    if count < 0 {
        return Err(CodecError::Malformed(format!("negative record count {count}")));
    }
    let count = count as usize;
    let expected = count
        .checked_mul(RECORD_LEN)
        .and_then(|n| n.checked_add(COUNT_LEN + CRC_LEN))
        .ok_or_else(|| CodecError::Malformed(format!("record count {count} overflows")))?;
    if bytes.len() != expected {
        return Err(CodecError::Malformed(format!(
            "header declares {count} records ({expected} bytes) but the data is {} bytes",
            bytes.len()
        )));
    }

    let stored_crc = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    let mut hasher = Crc32::new();
    hasher.update(body);
    let crc_calc = hasher.finalize();
    if crc_calc != stored_crc {
        return Err(CodecError::Malformed(format!(
            "checksum mismatch: stored={stored_crc:#x}, calc={crc_calc:#x}"
        )));
    }

    let mut records = Vec::new();
    records
        .try_reserve_exact(count)
        .map_err(|_| StoreError::OutOfMemory { requested: count })?;
    for (i, chunk) in body[COUNT_LEN..].chunks_exact(RECORD_LEN).enumerate() {
        let raw: RawStudent = bincode::deserialize(chunk)
            .map_err(|e| CodecError::Malformed(format!("record {i}: {e}")))?;
        let student =
            Student::try_from(raw).map_err(|reason| CodecError::Malformed(format!("record {i}: {reason}")))?;
        records.push(student);
    }

    RecordStore::from_records(records).map_err(|e| match e {
        StoreError::OutOfMemory { .. } => CodecError::Store(e),
        other => CodecError::Malformed(other.to_string()),
    })
}

/// Write `store` to `path`, replacing whatever was there.
///
/// The image is built in memory before the file is opened, so an encoding
/// error leaves the file untouched. An I/O error part way through can leave
/// a truncated file behind; it will fail to load as malformed.
pub fn save(store: &RecordStore, path: impl AsRef<Path>) -> Result<(), CodecError> {
    let path = path.as_ref();
    let image = encode(store)?;
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .map_err(|e| CodecError::io("open", path, e))?;
    let mut w = BufWriter::new(file);
    w.write_all(&image).map_err(|e| CodecError::io("write", path, e))?;
    w.flush().map_err(|e| CodecError::io("write", path, e))?;
    info!(path = %path.display(), records = store.len(), "saved students");
    Ok(())
}

/// Read a store back from `path`.
pub fn load(path: impl AsRef<Path>) -> Result<RecordStore, CodecError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| CodecError::io("read", path, e))?;
    let store = decode(&bytes).inspect_err(|e| {
        warn!(path = %path.display(), error = %e, "rejected store file");
    })?;
    info!(path = %path.display(), records = store.len(), "loaded students");
    Ok(store)
}

/// Like [`load`], but a file that does not exist yet gives an empty store.
///
/// Any other failure, including a malformed file, is still an error.
pub fn load_or_empty(path: impl AsRef<Path>) -> Result<RecordStore, CodecError> {
    let path = path.as_ref();
    match load(path) {
        Err(CodecError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "no store file yet, starting empty");
            Ok(RecordStore::new())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::student::SortKey;

    fn sample() -> RecordStore {
        let mut store = RecordStore::new();
        store.insert(Student::new(7, "Grace", 29, 99.5)).unwrap();
        store.insert(Student::new(2, "Ada", 18, 100.0)).unwrap();
        store.insert(Student::new(4, "", 5, 0.0)).unwrap();
        store
    }

    #[test]
    fn record_is_fixed_width() {
        let raw = RawStudent::try_from(&Student::new(1, "Alice", 20, 88.5)).unwrap();
        assert_eq!(bincode::serialized_size(&raw).unwrap() as usize, RECORD_LEN);
        assert_eq!(RECORD_LEN, 62);
    }

    #[test]
    fn layout_is_pinned() {
        let mut store = RecordStore::new();
        store.insert(Student::new(0x0102, "Al", 0x11, 1.5)).unwrap();
        let bytes = encode(&store).unwrap();
        assert_eq!(bytes.len(), 4 + RECORD_LEN + 4);
        assert_eq!(&bytes[0..4], &1i32.to_le_bytes());
        assert_eq!(&bytes[4..8], &0x0102i32.to_le_bytes());
        assert_eq!(&bytes[8..11], b"Al\0");
        assert!(bytes[11..58].iter().all(|&b| b == 0));
        assert_eq!(&bytes[58..62], &0x11i32.to_le_bytes());
        assert_eq!(&bytes[62..66], &1.5f32.to_le_bytes());
        let crc = crc32fast::hash(&bytes[..66]);
        assert_eq!(&bytes[66..70], &crc.to_le_bytes());
    }

    #[test]
    fn decode_reproduces_sequence_and_order() {
        let mut store = sample();
        let back = decode(&encode(&store).unwrap()).unwrap();
        assert_eq!(back.as_slice(), store.as_slice());

        store.sort(SortKey::ById);
        let back = decode(&encode(&store).unwrap()).unwrap();
        assert_eq!(back.as_slice(), store.as_slice());
        assert_eq!(back.find_by_id(4).unwrap(), Some(1));
    }

    #[test]
    fn full_length_name_survives() {
        let mut store = RecordStore::new();
        let name = "z".repeat(crate::student::MAX_NAME_LEN);
        store.insert(Student::new(1, name.clone(), 20, 50.0)).unwrap();
        let back = decode(&encode(&store).unwrap()).unwrap();
        assert_eq!(back.get(0).unwrap().name, name);
    }

    #[test]
    fn empty_store_encodes_header_and_checksum_only() {
        let bytes = encode(&RecordStore::new()).unwrap();
        assert_eq!(bytes.len(), 8);
        assert!(decode(&bytes).unwrap().is_empty());
    }

    #[test]
    fn truncated_data_is_malformed() {
        let bytes = encode(&sample()).unwrap();
        let err = decode(&bytes[..bytes.len() - 10]).unwrap_err();
        assert!(matches!(err, CodecError::Malformed(_)), "{err}");
        assert!(matches!(decode(&bytes[..3]), Err(CodecError::Malformed(_))));
    }

    #[test]
    fn flipped_bit_is_caught_by_checksum() {
        let mut bytes = encode(&sample()).unwrap();
        bytes[10] ^= 0x40;
        let err = decode(&bytes).unwrap_err();
        assert!(err.to_string().contains("checksum"), "{err}");
    }

    fn with_crc(mut body: Vec<u8>) -> Vec<u8> {
        let crc = crc32fast::hash(&body);
        body.extend_from_slice(&crc.to_le_bytes());
        body
    }

    #[test]
    fn load_or_empty_only_forgives_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("students.dat");
        assert!(load_or_empty(&path).unwrap().is_empty());

        save(&sample(), &path).unwrap();
        assert_eq!(load_or_empty(&path).unwrap().as_slice(), sample().as_slice());

        fs::write(&path, [1u8, 2, 3]).unwrap();
        assert!(matches!(load_or_empty(&path), Err(CodecError::Malformed(_))));
    }

    #[test]
    fn negative_count_is_malformed() {
        let bytes = with_crc((-1i32).to_le_bytes().to_vec());
        let err = decode(&bytes).unwrap_err();
        assert!(err.to_string().contains("negative"), "{err}");
    }

    #[test]
    fn unterminated_name_is_malformed() {
        let mut body = 1i32.to_le_bytes().to_vec();
        body.extend_from_slice(&3i32.to_le_bytes());
        body.extend_from_slice(&[b'x'; NAME_BUF_LEN]);
        body.extend_from_slice(&20i32.to_le_bytes());
        body.extend_from_slice(&10f32.to_le_bytes());
        let err = decode(&with_crc(body)).unwrap_err();
        assert!(err.to_string().contains("NUL"), "{err}");
    }

    #[test]
    fn duplicate_ids_in_data_are_malformed() {
        let mut body = 2i32.to_le_bytes().to_vec();
        for _ in 0..2 {
            let raw = RawStudent::try_from(&Student::new(9, "Twin", 20, 1.0)).unwrap();
            bincode::serialize_into(&mut body, &raw).unwrap();
        }
        let err = decode(&with_crc(body)).unwrap_err();
        assert!(matches!(err, CodecError::Malformed(ref m) if m.contains('9')), "{err}");
    }
}
