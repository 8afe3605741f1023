//! Data type tags for erased arrays

/// Data type of the elements held by an erased array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum DType {
    U8 = 0x01,
    I8 = 0x02,
    U16 = 0x03,
    I16 = 0x04,
    U32 = 0x05,
    I32 = 0x06,
    U64 = 0x07,
    I64 = 0x08,
    F32 = 0x09,
    F64 = 0x0A,
    Bool = 0x0B,
}

impl DType {
    /// Size in bytes of a single element
    pub fn element_size(self) -> usize {
        match self {
            DType::Bool | DType::U8 | DType::I8 => 1,
            DType::U16 | DType::I16 => 2,
            DType::U32 | DType::I32 | DType::F32 => 4,
            DType::U64 | DType::I64 | DType::F64 => 8,
        }
    }

    /// Try to convert from u8 tag
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0x01 => Some(DType::U8),
            0x02 => Some(DType::I8),
            0x03 => Some(DType::U16),
            0x04 => Some(DType::I16),
            0x05 => Some(DType::U32),
            0x06 => Some(DType::I32),
            0x07 => Some(DType::U64),
            0x08 => Some(DType::I64),
            0x09 => Some(DType::F32),
            0x0A => Some(DType::F64),
            0x0B => Some(DType::Bool),
            _ => None,
        }
    }

    /// Endianness-qualified tag stored under the `"data_type"` metadata key.
    ///
    /// Single-byte types carry no byte order.
    pub fn data_type_tag(self) -> &'static str {
        match self {
            DType::Bool => "bool",
            DType::U8 => "u1",
            DType::I8 => "i1",
            DType::U16 => "<u2",
            DType::I16 => "<i2",
            DType::U32 => "<u4",
            DType::I32 => "<i4",
            DType::U64 => "<u8",
            DType::I64 => "<i8",
            DType::F32 => "<f4",
            DType::F64 => "<f8",
        }
    }

    /// Inverse of [`DType::data_type_tag`]
    pub fn from_data_type_tag(tag: &str) -> Option<Self> {
        match tag {
            "bool" => Some(DType::Bool),
            "u1" => Some(DType::U8),
            "i1" => Some(DType::I8),
            "<u2" => Some(DType::U16),
            "<i2" => Some(DType::I16),
            "<u4" => Some(DType::U32),
            "<i4" => Some(DType::I32),
            "<u8" => Some(DType::U64),
            "<i8" => Some(DType::I64),
            "<f4" => Some(DType::F32),
            "<f8" => Some(DType::F64),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_roundtrip() {
        for tag in 0x01..=0x0B {
            let dtype = DType::from_u8(tag).unwrap();
            assert_eq!(dtype as u8, tag);
            assert_eq!(DType::from_data_type_tag(dtype.data_type_tag()), Some(dtype));
        }
        assert_eq!(DType::from_u8(0x00), None);
        assert_eq!(DType::from_u8(0x0C), None);
    }

    #[test]
    fn data_type_tags() {
        assert_eq!(DType::F64.data_type_tag(), "<f8");
        assert_eq!(DType::I8.data_type_tag(), "i1");
        assert_eq!(DType::Bool.data_type_tag(), "bool");
        assert_eq!(DType::U16.element_size(), 2);
    }
}
