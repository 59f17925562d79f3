//! Fixed-size contract payload encoding and positional query-response decoding.
//!
//! Every contract call has an ABI size agreed with the contract. Encoders write into a
//! zero-filled buffer of exactly that size and fail instead of growing it. Query responses are
//! read as little-endian fixed-width fields; a buffer shorter than the shape requires yields the
//! all-zero default, which is how a contract reports state it has not populated yet.

use thiserror::Error;

use crate::error::ErrorKind;

/// Largest payload a transaction may carry.
pub const MAX_INPUT_SIZE: usize = 1024;

/// Codec-layer errors.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum CodecError {
    /// A value does not fit the declared field width.
    #[error("field `{field}` value {value} does not fit in {width} bytes")]
    FieldOverflow {
        /// Field name.
        field: &'static str,
        /// Offending value.
        value: u128,
        /// Declared width in bytes.
        width: usize,
    },
    /// A write would run past the ABI size.
    #[error("writing {needed} bytes at offset {offset} exceeds ABI size {abi_size}")]
    PayloadOverflow {
        /// ABI size of the payload.
        abi_size: usize,
        /// Current write offset.
        offset: usize,
        /// Bytes requested.
        needed: usize,
    },
    /// ABI size exceeds [`MAX_INPUT_SIZE`].
    #[error("ABI size {abi_size} exceeds maximum input size {MAX_INPUT_SIZE}")]
    AbiTooLarge {
        /// Declared ABI size.
        abi_size: usize,
    },
    /// Encoded payload length differs from the ABI size.
    #[error("payload is {actual} bytes, ABI requires {expected}")]
    SizeMismatch {
        /// ABI size.
        expected: usize,
        /// Observed length.
        actual: usize,
    },
    /// A read ran past the end of the buffer.
    #[error("buffer too short: need {needed} bytes at offset {offset}, have {available}")]
    Truncated {
        /// Read offset.
        offset: usize,
        /// Bytes requested.
        needed: usize,
        /// Buffer length.
        available: usize,
    },
}

impl CodecError {
    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        ErrorKind::Encoding
    }
}

/// Encoded contract call arguments.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Payload {
    /// Raw payload bytes.
    bytes: Vec<u8>,
}

impl Payload {
    /// Payload with no bytes, for calls that take no input.
    #[must_use]
    pub const fn empty() -> Self {
        Self { bytes: Vec::new() }
    }

    /// Wraps pre-encoded bytes.
    #[must_use]
    pub const fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Returns the payload bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the payload length.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true when the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Consumes the payload and returns its bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// A contract procedure whose arguments serialize to a fixed ABI size.
pub trait ContractCall: Sized {
    /// Input type selecting the procedure.
    const INPUT_TYPE: u16;
    /// Exact payload size in bytes.
    const ABI_SIZE: usize;

    /// Writes fields in ABI order.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] when a field overflows its width or the ABI size.
    fn encode_fields(&self, writer: &mut PayloadWriter) -> Result<(), CodecError>;

    /// Reads fields in ABI order.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Truncated`] when the buffer ends early.
    fn decode_fields(reader: &mut PayloadReader<'_>) -> Result<Self, CodecError>;
}

/// Encodes `call` into a payload of exactly `C::ABI_SIZE` bytes.
///
/// # Errors
///
/// Returns [`CodecError`] when the ABI size is out of range or a field does not fit.
pub fn encode<C: ContractCall>(call: &C) -> Result<Payload, CodecError> {
    let mut writer = PayloadWriter::new(C::ABI_SIZE)?;
    call.encode_fields(&mut writer)?;
    Ok(writer.finish())
}

/// Decodes a payload produced by [`encode`].
///
/// # Errors
///
/// Returns [`CodecError::SizeMismatch`] when `bytes` is not exactly `C::ABI_SIZE` long.
pub fn decode<C: ContractCall>(bytes: &[u8]) -> Result<C, CodecError> {
    if bytes.len() != C::ABI_SIZE {
        return Err(CodecError::SizeMismatch {
            expected: C::ABI_SIZE,
            actual: bytes.len(),
        });
    }
    C::decode_fields(&mut PayloadReader::new(bytes))
}

/// Writes little-endian fields into a zero-filled buffer of fixed size.
#[derive(Debug)]
pub struct PayloadWriter {
    /// Output buffer, always `abi_size` long.
    buffer: Vec<u8>,
    /// Next write offset.
    offset: usize,
}

impl PayloadWriter {
    /// Creates a writer for an ABI size.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::AbiTooLarge`] above [`MAX_INPUT_SIZE`].
    pub fn new(abi_size: usize) -> Result<Self, CodecError> {
        if abi_size > MAX_INPUT_SIZE {
            return Err(CodecError::AbiTooLarge { abi_size });
        }
        Ok(Self {
            buffer: vec![0_u8; abi_size],
            offset: 0,
        })
    }

    /// Writes raw bytes at the current offset.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::PayloadOverflow`] when the write passes the ABI size.
    pub fn put_bytes(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        let overflow = CodecError::PayloadOverflow {
            abi_size: self.buffer.len(),
            offset: self.offset,
            needed: bytes.len(),
        };
        let end = self.offset.checked_add(bytes.len()).ok_or(overflow.clone())?;
        self.buffer
            .get_mut(self.offset..end)
            .ok_or(overflow)?
            .copy_from_slice(bytes);
        self.offset = end;
        Ok(())
    }

    /// Leaves `len` zero bytes of padding.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::PayloadOverflow`] when the padding passes the ABI size.
    pub fn skip(&mut self, len: usize) -> Result<(), CodecError> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|end| *end <= self.buffer.len())
            .ok_or(CodecError::PayloadOverflow {
                abi_size: self.buffer.len(),
                offset: self.offset,
                needed: len,
            })?;
        self.offset = end;
        Ok(())
    }

    /// Writes one byte.
    ///
    /// # Errors
    ///
    /// See [`Self::put_bytes`].
    pub fn put_u8(&mut self, value: u8) -> Result<(), CodecError> {
        self.put_bytes(&[value])
    }

    /// Writes a little-endian `u16`.
    ///
    /// # Errors
    ///
    /// See [`Self::put_bytes`].
    pub fn put_u16(&mut self, value: u16) -> Result<(), CodecError> {
        self.put_bytes(&value.to_le_bytes())
    }

    /// Writes a little-endian `u32`.
    ///
    /// # Errors
    ///
    /// See [`Self::put_bytes`].
    pub fn put_u32(&mut self, value: u32) -> Result<(), CodecError> {
        self.put_bytes(&value.to_le_bytes())
    }

    /// Writes a little-endian `u64`.
    ///
    /// # Errors
    ///
    /// See [`Self::put_bytes`].
    pub fn put_u64(&mut self, value: u64) -> Result<(), CodecError> {
        self.put_bytes(&value.to_le_bytes())
    }

    /// Writes a little-endian `i64`.
    ///
    /// # Errors
    ///
    /// See [`Self::put_bytes`].
    pub fn put_i64(&mut self, value: i64) -> Result<(), CodecError> {
        self.put_bytes(&value.to_le_bytes())
    }

    /// Writes an unsigned value into a `width`-byte little-endian field.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::FieldOverflow`] when `value` needs more than `width` bytes.
    pub fn put_uint(
        &mut self,
        field: &'static str,
        value: u128,
        width: usize,
    ) -> Result<(), CodecError> {
        let bytes = value.to_le_bytes();
        let (kept, dropped) = bytes.split_at(width.min(bytes.len()));
        if dropped.iter().any(|byte| *byte != 0) {
            return Err(CodecError::FieldOverflow {
                field,
                value,
                width,
            });
        }
        self.put_bytes(kept)?;
        self.skip(width.saturating_sub(kept.len()))
    }

    /// Returns the buffer; unwritten bytes stay zero.
    #[must_use]
    pub fn finish(self) -> Payload {
        Payload::from_bytes(self.buffer)
    }
}

/// Bounds-checked little-endian reader.
#[derive(Debug)]
pub struct PayloadReader<'bytes> {
    /// Source buffer.
    bytes: &'bytes [u8],
    /// Next read offset.
    offset: usize,
}

impl<'bytes> PayloadReader<'bytes> {
    /// Creates a reader at offset zero.
    #[must_use]
    pub const fn new(bytes: &'bytes [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    /// Returns the current offset.
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Reads `N` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Truncated`] when fewer than `N` bytes remain.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let truncated = CodecError::Truncated {
            offset: self.offset,
            needed: N,
            available: self.bytes.len(),
        };
        let end = self.offset.checked_add(N).ok_or(truncated.clone())?;
        let slice = self.bytes.get(self.offset..end).ok_or(truncated.clone())?;
        let array: [u8; N] = slice.try_into().map_err(|_error| truncated)?;
        self.offset = end;
        Ok(array)
    }

    /// Reads one byte.
    ///
    /// # Errors
    ///
    /// See [`Self::read_array`].
    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        self.read_array::<1>().map(|[byte]| byte)
    }

    /// Reads a little-endian `u16`.
    ///
    /// # Errors
    ///
    /// See [`Self::read_array`].
    pub fn read_u16(&mut self) -> Result<u16, CodecError> {
        self.read_array().map(u16::from_le_bytes)
    }

    /// Reads a little-endian `u32`.
    ///
    /// # Errors
    ///
    /// See [`Self::read_array`].
    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        self.read_array().map(u32::from_le_bytes)
    }

    /// Reads a little-endian `u64`.
    ///
    /// # Errors
    ///
    /// See [`Self::read_array`].
    pub fn read_u64(&mut self) -> Result<u64, CodecError> {
        self.read_array().map(u64::from_le_bytes)
    }

    /// Reads a little-endian `i64`.
    ///
    /// # Errors
    ///
    /// See [`Self::read_array`].
    pub fn read_i64(&mut self) -> Result<i64, CodecError> {
        self.read_array().map(i64::from_le_bytes)
    }

    /// Moves the offset forward without reading.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Truncated`] when the skip passes the end.
    pub fn skip(&mut self, len: usize) -> Result<(), CodecError> {
        self.offset = self
            .offset
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(CodecError::Truncated {
                offset: self.offset,
                needed: len,
                available: self.bytes.len(),
            })?;
        Ok(())
    }

    /// Positions the reader at an absolute offset.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Truncated`] when `offset` is past the end.
    pub fn seek(&mut self, offset: usize) -> Result<(), CodecError> {
        if offset > self.bytes.len() {
            return Err(CodecError::Truncated {
                offset,
                needed: 0,
                available: self.bytes.len(),
            });
        }
        self.offset = offset;
        Ok(())
    }
}

/// Typed result of a read-only contract function.
///
/// `Default` is the value reported when the response is shorter than [`Self::MIN_SIZE`].
pub trait QueryResponse: Sized + Default {
    /// Bytes required before any field is read.
    const MIN_SIZE: usize;

    /// Reads fields from a buffer of at least [`Self::MIN_SIZE`] bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] when the implementation reads past `MIN_SIZE`.
    fn decode_fields(reader: &mut PayloadReader<'_>) -> Result<Self, CodecError>;
}

/// Decodes a typed response, substituting `R::default()` for short buffers.
///
/// # Errors
///
/// Returns [`CodecError`] only when `R` reads past its own declared `MIN_SIZE`.
pub fn decode_response<R: QueryResponse>(raw: &[u8]) -> Result<R, CodecError> {
    if raw.len() < R::MIN_SIZE {
        return Ok(R::default());
    }
    R::decode_fields(&mut PayloadReader::new(raw))
}

/// Width class of one response field.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FieldKind {
    /// One byte.
    U8,
    /// Little-endian `u16`.
    U16,
    /// Little-endian `u32`.
    U32,
    /// Little-endian `u64`.
    U64,
    /// 32 raw bytes, usually a public key or digest.
    Bytes32,
}

impl FieldKind {
    /// Field width in bytes.
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
            Self::U64 => 8,
            Self::Bytes32 => 32,
        }
    }

    /// Zero value used when a response is too short.
    #[must_use]
    pub const fn zero(self) -> FieldValue {
        match self {
            Self::U8 => FieldValue::U8(0),
            Self::U16 => FieldValue::U16(0),
            Self::U32 => FieldValue::U32(0),
            Self::U64 => FieldValue::U64(0),
            Self::Bytes32 => FieldValue::Bytes32([0_u8; 32]),
        }
    }
}

/// One decoded response field.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FieldValue {
    /// One byte.
    U8(u8),
    /// Little-endian `u16`.
    U16(u16),
    /// Little-endian `u32`.
    U32(u32),
    /// Little-endian `u64`.
    U64(u64),
    /// 32 raw bytes.
    Bytes32([u8; 32]),
}

impl FieldValue {
    /// Returns the numeric value widened to `u64`, if numeric.
    #[must_use]
    pub const fn as_u64(&self) -> Option<u64> {
        match *self {
            Self::U8(value) => Some(value as u64),
            Self::U16(value) => Some(value as u64),
            Self::U32(value) => Some(value as u64),
            Self::U64(value) => Some(value),
            Self::Bytes32(_) => None,
        }
    }
}

/// Expected positional layout of a query response.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ResponseShape {
    /// Fields as `(offset, kind)` in declaration order.
    fields: Vec<(usize, FieldKind)>,
}

impl ResponseShape {
    /// Creates an empty shape.
    #[must_use]
    pub const fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Shape with a single `u64` at offset 0, the common counter response.
    #[must_use]
    pub fn single_u64() -> Self {
        Self::new().field(FieldKind::U64)
    }

    /// Appends a field directly after the previous one.
    #[must_use]
    pub fn field(self, kind: FieldKind) -> Self {
        let offset = self.min_size();
        self.field_at(offset, kind)
    }

    /// Appends a field at an explicit offset.
    #[must_use]
    pub fn field_at(mut self, offset: usize, kind: FieldKind) -> Self {
        self.fields.push((offset, kind));
        self
    }

    /// Bytes required to read every field.
    #[must_use]
    pub fn min_size(&self) -> usize {
        self.fields
            .iter()
            .map(|(offset, kind)| offset.saturating_add(kind.width()))
            .max()
            .unwrap_or(0)
    }

    /// Returns the declared fields.
    #[must_use]
    pub fn fields(&self) -> &[(usize, FieldKind)] {
        &self.fields
    }

    /// All-zero value for this shape.
    #[must_use]
    pub fn default_value(&self) -> DecodedValue {
        DecodedValue {
            values: self.fields.iter().map(|(_, kind)| kind.zero()).collect(),
            defaulted: true,
        }
    }
}

/// Decoded query response.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DecodedValue {
    /// Field values in shape order.
    values: Vec<FieldValue>,
    /// True when the response was too short and zeros were substituted.
    defaulted: bool,
}

impl DecodedValue {
    /// Returns field values in shape order.
    #[must_use]
    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }

    /// Returns true when the documented default was substituted.
    #[must_use]
    pub const fn is_default(&self) -> bool {
        self.defaulted
    }

    /// Returns field `index` as `u64`, if present and numeric.
    #[must_use]
    pub fn u64_at(&self, index: usize) -> Option<u64> {
        self.values.get(index).and_then(FieldValue::as_u64)
    }
}

/// Decodes `raw` according to `shape`.
///
/// The length is checked against [`ResponseShape::min_size`] before any field is read. A shorter
/// buffer returns every field as zero with [`DecodedValue::is_default`] set. Bytes past the last
/// field are ignored.
#[must_use]
pub fn decode_query_response(raw: &[u8], shape: &ResponseShape) -> DecodedValue {
    if raw.len() < shape.min_size() {
        return shape.default_value();
    }
    let mut values = Vec::with_capacity(shape.fields.len());
    for (offset, kind) in &shape.fields {
        match read_field(raw, *offset, *kind) {
            Ok(value) => values.push(value),
            Err(_truncated) => return shape.default_value(),
        }
    }
    DecodedValue {
        values,
        defaulted: false,
    }
}

/// Reads one field at an absolute offset.
fn read_field(raw: &[u8], offset: usize, kind: FieldKind) -> Result<FieldValue, CodecError> {
    let mut reader = PayloadReader::new(raw);
    reader.seek(offset)?;
    Ok(match kind {
        FieldKind::U8 => FieldValue::U8(reader.read_u8()?),
        FieldKind::U16 => FieldValue::U16(reader.read_u16()?),
        FieldKind::U32 => FieldValue::U32(reader.read_u32()?),
        FieldKind::U64 => FieldValue::U64(reader.read_u64()?),
        FieldKind::Bytes32 => FieldValue::Bytes32(reader.read_array()?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Eq, PartialEq)]
    struct Pledge {
        project: u32,
        milestone: u8,
        amount: u64,
    }

    impl ContractCall for Pledge {
        const INPUT_TYPE: u16 = 9;
        const ABI_SIZE: usize = 16;

        fn encode_fields(&self, writer: &mut PayloadWriter) -> Result<(), CodecError> {
            writer.put_u32(self.project)?;
            writer.put_u8(self.milestone)?;
            writer.skip(3)?;
            writer.put_u64(self.amount)
        }

        fn decode_fields(reader: &mut PayloadReader<'_>) -> Result<Self, CodecError> {
            let project = reader.read_u32()?;
            let milestone = reader.read_u8()?;
            reader.skip(3)?;
            let amount = reader.read_u64()?;
            Ok(Self {
                project,
                milestone,
                amount,
            })
        }
    }

    #[test]
    fn encode_produces_abi_sized_padded_buffer() {
        let pledge = Pledge {
            project: 0x0102_0304,
            milestone: 2,
            amount: 500,
        };
        let payload = encode(&pledge).expect("encode");
        assert_eq!(payload.len(), Pledge::ABI_SIZE);
        assert_eq!(
            payload.as_bytes(),
            &[4, 3, 2, 1, 2, 0, 0, 0, 0xf4, 1, 0, 0, 0, 0, 0, 0]
        );
        assert_eq!(decode::<Pledge>(payload.as_bytes()), Ok(pledge));
    }

    #[test]
    fn decode_rejects_wrong_size() {
        assert_eq!(
            decode::<Pledge>(&[0_u8; 15]),
            Err(CodecError::SizeMismatch {
                expected: 16,
                actual: 15
            })
        );
    }

    #[test]
    fn writer_rejects_writes_past_abi_size() {
        let mut writer = PayloadWriter::new(4).expect("writer");
        assert!(writer.put_u32(1).is_ok());
        let error = writer.put_u8(1).expect_err("must overflow");
        assert!(matches!(error, CodecError::PayloadOverflow { offset: 4, .. }));
        assert_eq!(error.kind(), ErrorKind::Encoding);
    }

    #[test]
    fn put_uint_checks_declared_width() {
        let mut writer = PayloadWriter::new(8).expect("writer");
        assert!(writer.put_uint("small", 0xffff, 2).is_ok());
        assert_eq!(
            writer.put_uint("wide", 0x1_0000, 2),
            Err(CodecError::FieldOverflow {
                field: "wide",
                value: 0x1_0000,
                width: 2
            })
        );
        assert!(writer.put_uint("padded", 7, 6).is_ok());
        assert_eq!(
            writer.finish().as_bytes(),
            &[0xff, 0xff, 7, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn abi_size_is_bounded() {
        assert!(matches!(
            PayloadWriter::new(MAX_INPUT_SIZE + 1),
            Err(CodecError::AbiTooLarge { .. })
        ));
    }

    #[test]
    fn short_response_yields_zero_default() {
        let shape = ResponseShape::single_u64();
        for len in 0..8 {
            let raw = vec![0xaa_u8; len];
            let decoded = decode_query_response(&raw, &shape);
            assert!(decoded.is_default());
            assert_eq!(decoded.u64_at(0), Some(0));
        }
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let mut raw = 0x0807_0605_0403_0201_u64.to_le_bytes().to_vec();
        raw.extend_from_slice(&[0xff_u8; 8]);
        let decoded = decode_query_response(&raw, &ResponseShape::single_u64());
        assert!(!decoded.is_default());
        assert_eq!(decoded.u64_at(0), Some(0x0807_0605_0403_0201));
    }

    #[test]
    fn multi_field_shape_reads_declared_offsets() {
        let shape = ResponseShape::new()
            .field(FieldKind::U32)
            .field_at(8, FieldKind::U16)
            .field(FieldKind::Bytes32);
        assert_eq!(shape.min_size(), 42);

        let mut raw = vec![0_u8; 42];
        raw[..4].copy_from_slice(&77_u32.to_le_bytes());
        raw[8..10].copy_from_slice(&300_u16.to_le_bytes());
        raw[10..42].fill(9);
        let decoded = decode_query_response(&raw, &shape);
        assert_eq!(decoded.u64_at(0), Some(77));
        assert_eq!(decoded.u64_at(1), Some(300));
        assert_eq!(decoded.values()[2], FieldValue::Bytes32([9_u8; 32]));

        let short = decode_query_response(&raw[..41], &shape);
        assert!(short.is_default());
        assert_eq!(short.values()[2], FieldValue::Bytes32([0_u8; 32]));
    }

    #[derive(Debug, Default, Eq, PartialEq)]
    struct Totals {
        raised: u64,
        backers: u32,
    }

    impl QueryResponse for Totals {
        const MIN_SIZE: usize = 12;

        fn decode_fields(reader: &mut PayloadReader<'_>) -> Result<Self, CodecError> {
            Ok(Self {
                raised: reader.read_u64()?,
                backers: reader.read_u32()?,
            })
        }
    }

    #[test]
    fn typed_response_defaults_when_short() {
        assert_eq!(decode_response::<Totals>(&[1, 2, 3]), Ok(Totals::default()));

        let mut raw = 10_u64.to_le_bytes().to_vec();
        raw.extend_from_slice(&3_u32.to_le_bytes());
        assert_eq!(
            decode_response::<Totals>(&raw),
            Ok(Totals {
                raised: 10,
                backers: 3
            })
        );
    }
}
