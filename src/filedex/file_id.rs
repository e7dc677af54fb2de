//! File id codec.
//!
//! Native file references are URL-safe base64 over a zero-run-length-encoded
//! little-endian record. The stored id keeps only the structural fields
//! (type, data center, media id, access hash) so that the same file always
//! maps to the same key, whatever file reference or version it was sent with.

use crate::error::FileIdError;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;

const FILE_ID_B64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const WEB_LOCATION_FLAG: i32 = 1 << 24;
const FILE_REFERENCE_FLAG: i32 = 1 << 25;

/// Minor and major version bytes appended to every encoded id.
const TRAILER: [u8; 2] = [22, 4];

/// Size of the packed structural record (`<iiqq`).
pub const PACKED_LEN: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum FileType {
    Thumbnail = 0,
    ChatPhoto = 1,
    Photo = 2,
    Voice = 3,
    Video = 4,
    Document = 5,
    Encrypted = 6,
    Temp = 7,
    Sticker = 8,
    Audio = 9,
    Animation = 10,
    EncryptedThumbnail = 11,
    Wallpaper = 12,
    VideoNote = 13,
    SecureRaw = 14,
    Secure = 15,
    Background = 16,
    DocumentAsFile = 17,
}

impl TryFrom<i32> for FileType {
    type Error = FileIdError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => FileType::Thumbnail,
            1 => FileType::ChatPhoto,
            2 => FileType::Photo,
            3 => FileType::Voice,
            4 => FileType::Video,
            5 => FileType::Document,
            6 => FileType::Encrypted,
            7 => FileType::Temp,
            8 => FileType::Sticker,
            9 => FileType::Audio,
            10 => FileType::Animation,
            11 => FileType::EncryptedThumbnail,
            12 => FileType::Wallpaper,
            13 => FileType::VideoNote,
            14 => FileType::SecureRaw,
            15 => FileType::Secure,
            16 => FileType::Background,
            17 => FileType::DocumentAsFile,
            other => return Err(FileIdError::UnknownFileType(other)),
        })
    }
}

/// Structural fields of a native file reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeFileId {
    pub file_type: FileType,
    pub dc_id: i32,
    pub file_reference: Vec<u8>,
    pub media_id: i64,
    pub access_hash: i64,
}

impl NativeFileId {
    pub fn decode(file_id: &str) -> Result<Self, FileIdError> {
        let raw = FILE_ID_B64
            .decode(file_id)
            .map_err(|e| FileIdError::Base64(e.to_string()))?;
        let decoded = rle_decode(&raw)?;

        let body = match decoded.split_last() {
            None => return Err(FileIdError::Truncated { offset: 0, needed: 1 }),
            Some((&major, rest)) if major >= 4 => match rest.split_last() {
                Some((_minor, body)) => body,
                None => return Err(FileIdError::Truncated { offset: 1, needed: 1 }),
            },
            Some((_, body)) => body,
        };

        let mut reader = Reader::new(body);
        let raw_type = reader.i32()?;
        let dc_id = reader.i32()?;

        let has_web_location = raw_type & WEB_LOCATION_FLAG != 0;
        let has_file_reference = raw_type & FILE_REFERENCE_FLAG != 0;
        let file_type = FileType::try_from(raw_type & !(WEB_LOCATION_FLAG | FILE_REFERENCE_FLAG))?;

        if has_web_location {
            return Err(FileIdError::WebLocation);
        }

        let file_reference = if has_file_reference {
            reader.tl_bytes()?.to_vec()
        } else {
            Vec::new()
        };

        // Anything after the access hash (photo size sources) is irrelevant for the key.
        let media_id = reader.i64()?;
        let access_hash = reader.i64()?;

        Ok(Self {
            file_type,
            dc_id,
            file_reference,
            media_id,
            access_hash,
        })
    }

    /// Encode back into the native string form.
    pub fn encode(&self) -> Result<String, FileIdError> {
        let mut raw_type = self.file_type as i32;
        if !self.file_reference.is_empty() {
            raw_type |= FILE_REFERENCE_FLAG;
        }

        let mut buf = Vec::with_capacity(PACKED_LEN + self.file_reference.len() + 8);
        buf.extend_from_slice(&raw_type.to_le_bytes());
        buf.extend_from_slice(&self.dc_id.to_le_bytes());
        if !self.file_reference.is_empty() {
            write_tl_bytes(&mut buf, &self.file_reference);
        }
        buf.extend_from_slice(&self.media_id.to_le_bytes());
        buf.extend_from_slice(&self.access_hash.to_le_bytes());
        buf.extend_from_slice(&TRAILER);

        Ok(FILE_ID_B64.encode(rle_encode(&buf)?))
    }

    /// The fixed-width `<iiqq` record the stored id is built from.
    pub fn packed(&self) -> [u8; PACKED_LEN] {
        let mut out = [0u8; PACKED_LEN];
        out[0..4].copy_from_slice(&(self.file_type as i32).to_le_bytes());
        out[4..8].copy_from_slice(&self.dc_id.to_le_bytes());
        out[8..16].copy_from_slice(&self.media_id.to_le_bytes());
        out[16..24].copy_from_slice(&self.access_hash.to_le_bytes());
        out
    }

    /// Stored id for this file.
    pub fn unique_key(&self) -> Result<String, FileIdError> {
        encode_packed(&self.packed())
    }
}

/// Derive the stored id from a native file reference.
pub fn derive_id(native_file_id: &str) -> Result<String, FileIdError> {
    NativeFileId::decode(native_file_id)?.unique_key()
}

/// Append the trailer, zero-RLE and base64 a packed record.
pub fn encode_packed(packed: &[u8]) -> Result<String, FileIdError> {
    let mut bytes = Vec::with_capacity(packed.len() + TRAILER.len());
    bytes.extend_from_slice(packed);
    bytes.extend_from_slice(&TRAILER);
    Ok(FILE_ID_B64.encode(rle_encode(&bytes)?))
}

/// Reverse [`encode_packed`], returning the bytes before the trailer.
pub fn decode_packed(key: &str) -> Result<Vec<u8>, FileIdError> {
    let raw = FILE_ID_B64
        .decode(key)
        .map_err(|e| FileIdError::Base64(e.to_string()))?;
    let mut bytes = rle_decode(&raw)?;
    if bytes.len() < TRAILER.len() {
        return Err(FileIdError::Truncated {
            offset: bytes.len(),
            needed: TRAILER.len() - bytes.len(),
        });
    }
    bytes.truncate(bytes.len() - TRAILER.len());
    Ok(bytes)
}

/// Replace each run of N zero bytes with `0x00 N`.
pub fn rle_encode(data: &[u8]) -> Result<Vec<u8>, FileIdError> {
    let mut out = Vec::with_capacity(data.len());
    let mut run = 0usize;
    for &byte in data {
        if byte == 0 {
            run += 1;
            continue;
        }
        flush_zero_run(&mut out, &mut run)?;
        out.push(byte);
    }
    flush_zero_run(&mut out, &mut run)?;
    Ok(out)
}

fn flush_zero_run(out: &mut Vec<u8>, run: &mut usize) -> Result<(), FileIdError> {
    if *run == 0 {
        return Ok(());
    }
    let len = u8::try_from(*run).map_err(|_| FileIdError::ZeroRunTooLong(*run))?;
    out.push(0);
    out.push(len);
    *run = 0;
    Ok(())
}

pub fn rle_decode(data: &[u8]) -> Result<Vec<u8>, FileIdError> {
    let mut out = Vec::with_capacity(data.len() + 16);
    let mut bytes = data.iter();
    while let Some(&byte) = bytes.next() {
        if byte == 0 {
            let &len = bytes.next().ok_or(FileIdError::DanglingZeroRun)?;
            out.resize(out.len() + len as usize, 0);
        } else {
            out.push(byte);
        }
    }
    Ok(out)
}

fn write_tl_bytes(out: &mut Vec<u8>, data: &[u8]) {
    let len = data.len();
    let header = if len <= 253 {
        out.push(len as u8);
        1
    } else {
        out.push(254);
        out.extend_from_slice(&(len as u32).to_le_bytes()[..3]);
        4
    };
    out.extend_from_slice(data);
    out.resize(out.len() + (4 - (header + len) % 4) % 4, 0);
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], FileIdError> {
        let end = self.pos + n;
        if end > self.data.len() {
            return Err(FileIdError::Truncated {
                offset: self.pos,
                needed: end - self.data.len(),
            });
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn i32(&mut self) -> Result<i32, FileIdError> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);
        Ok(i32::from_le_bytes(buf))
    }

    fn i64(&mut self) -> Result<i64, FileIdError> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(i64::from_le_bytes(buf))
    }

    fn tl_bytes(&mut self) -> Result<&'a [u8], FileIdError> {
        let first = self.take(1)?[0] as usize;
        let (len, header) = if first <= 253 {
            (first, 1)
        } else {
            let l = self.take(3)?;
            (l[0] as usize | (l[1] as usize) << 8 | (l[2] as usize) << 16, 4)
        };
        let data = self.take(len)?;
        self.take((4 - (header + len) % 4) % 4)?;
        Ok(data)
    }
}
