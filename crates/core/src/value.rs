//! Knowledge values
//!
//! A [`KnowledgeValue`] is the payload of a record: exactly one variant is
//! active at a time and assigning a new one drops the old payload.
//!
//! The numeric type tags are part of the checkpoint format and must not
//! change.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Wire type tags
pub mod type_tags {
    /// Uncreated / empty record
    pub const EMPTY: u32 = 0;
    /// 64-bit signed integer
    pub const INTEGER: u32 = 1;
    /// UTF-8 string
    pub const STRING: u32 = 2;
    /// 64-bit float
    pub const DOUBLE: u32 = 4;
    /// Opaque binary file
    pub const UNKNOWN_FILE_TYPE: u32 = 8;
    /// XML document
    pub const XML: u32 = 16;
    /// Text file contents
    pub const TEXT_FILE: u32 = 32;
    /// Array of 64-bit signed integers
    pub const INTEGER_ARRAY: u32 = 64;
    /// Array of 64-bit floats
    pub const DOUBLE_ARRAY: u32 = 128;
    /// JPEG image
    pub const IMAGE_JPEG: u32 = 256;
}

/// Value held by a knowledge record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum KnowledgeValue {
    /// No value has ever been assigned
    #[default]
    Empty,
    /// 64-bit signed integer
    Integer(i64),
    /// 64-bit float
    Double(f64),
    /// UTF-8 string
    String(String),
    /// XML document
    Xml(String),
    /// Contents of a text file
    TextFile(String),
    /// JPEG image bytes
    ImageJpeg(Vec<u8>),
    /// Opaque binary file bytes
    UnknownFile(Vec<u8>),
    /// Array of integers
    IntegerArray(Vec<i64>),
    /// Array of doubles
    DoubleArray(Vec<f64>),
}

impl KnowledgeValue {
    /// Wire type tag of this variant
    pub fn type_tag(&self) -> u32 {
        match self {
            KnowledgeValue::Empty => type_tags::EMPTY,
            KnowledgeValue::Integer(_) => type_tags::INTEGER,
            KnowledgeValue::Double(_) => type_tags::DOUBLE,
            KnowledgeValue::String(_) => type_tags::STRING,
            KnowledgeValue::Xml(_) => type_tags::XML,
            KnowledgeValue::TextFile(_) => type_tags::TEXT_FILE,
            KnowledgeValue::ImageJpeg(_) => type_tags::IMAGE_JPEG,
            KnowledgeValue::UnknownFile(_) => type_tags::UNKNOWN_FILE_TYPE,
            KnowledgeValue::IntegerArray(_) => type_tags::INTEGER_ARRAY,
            KnowledgeValue::DoubleArray(_) => type_tags::DOUBLE_ARRAY,
        }
    }

    /// Human-readable variant name
    pub fn type_name(&self) -> &'static str {
        match self {
            KnowledgeValue::Empty => "Empty",
            KnowledgeValue::Integer(_) => "Integer",
            KnowledgeValue::Double(_) => "Double",
            KnowledgeValue::String(_) => "String",
            KnowledgeValue::Xml(_) => "Xml",
            KnowledgeValue::TextFile(_) => "TextFile",
            KnowledgeValue::ImageJpeg(_) => "ImageJpeg",
            KnowledgeValue::UnknownFile(_) => "UnknownFile",
            KnowledgeValue::IntegerArray(_) => "IntegerArray",
            KnowledgeValue::DoubleArray(_) => "DoubleArray",
        }
    }

    /// True unless the value is [`KnowledgeValue::Empty`]
    pub fn exists(&self) -> bool {
        !matches!(self, KnowledgeValue::Empty)
    }

    /// String-like variants (string, XML, text file)
    pub fn is_string_type(&self) -> bool {
        matches!(
            self,
            KnowledgeValue::String(_) | KnowledgeValue::Xml(_) | KnowledgeValue::TextFile(_)
        )
    }

    /// Binary file variants that cannot be printed inline
    pub fn is_binary_file_type(&self) -> bool {
        matches!(self, KnowledgeValue::ImageJpeg(_) | KnowledgeValue::UnknownFile(_))
    }

    /// Any file-backed variant
    pub fn is_file_type(&self) -> bool {
        matches!(
            self,
            KnowledgeValue::Xml(_)
                | KnowledgeValue::TextFile(_)
                | KnowledgeValue::ImageJpeg(_)
                | KnowledgeValue::UnknownFile(_)
        )
    }

    /// Array variants
    pub fn is_array_type(&self) -> bool {
        matches!(
            self,
            KnowledgeValue::IntegerArray(_) | KnowledgeValue::DoubleArray(_)
        )
    }

    /// Element count for numbers and arrays, byte count for strings and blobs
    ///
    /// Strings count their nul terminator, matching the encoded size field.
    pub fn size(&self) -> usize {
        match self {
            KnowledgeValue::Empty => 0,
            KnowledgeValue::Integer(_) | KnowledgeValue::Double(_) => 1,
            KnowledgeValue::String(s) | KnowledgeValue::Xml(s) | KnowledgeValue::TextFile(s) => {
                s.len() + 1
            }
            KnowledgeValue::ImageJpeg(b) | KnowledgeValue::UnknownFile(b) => b.len(),
            KnowledgeValue::IntegerArray(v) => v.len(),
            KnowledgeValue::DoubleArray(v) => v.len(),
        }
    }

    /// Integer view of the value, if it has one
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            KnowledgeValue::Integer(i) => Some(*i),
            KnowledgeValue::Double(d) => Some(*d as i64),
            _ => None,
        }
    }

    /// Double view of the value, if it has one
    pub fn as_double(&self) -> Option<f64> {
        match self {
            KnowledgeValue::Double(d) => Some(*d),
            KnowledgeValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// String view for string-like variants
    pub fn as_str(&self) -> Option<&str> {
        match self {
            KnowledgeValue::String(s) | KnowledgeValue::Xml(s) | KnowledgeValue::TextFile(s) => {
                Some(s)
            }
            _ => None,
        }
    }

    /// Raw bytes for binary file variants
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            KnowledgeValue::ImageJpeg(b) | KnowledgeValue::UnknownFile(b) => Some(b),
            _ => None,
        }
    }

    /// Render the value with a custom array delimiter
    pub fn to_string_with(&self, delimiter: &str) -> String {
        fn join<T: fmt::Display>(items: &[T], delimiter: &str) -> String {
            items
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(delimiter)
        }

        match self {
            KnowledgeValue::Empty => "0".to_string(),
            KnowledgeValue::Integer(i) => i.to_string(),
            KnowledgeValue::Double(d) => d.to_string(),
            KnowledgeValue::String(s) | KnowledgeValue::Xml(s) | KnowledgeValue::TextFile(s) => {
                s.clone()
            }
            KnowledgeValue::ImageJpeg(b) | KnowledgeValue::UnknownFile(b) => {
                format!("<{} bytes>", b.len())
            }
            KnowledgeValue::IntegerArray(v) => join(v, delimiter),
            KnowledgeValue::DoubleArray(v) => join(v, delimiter),
        }
    }
}

impl fmt::Display for KnowledgeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_with(", "))
    }
}

impl From<i64> for KnowledgeValue {
    fn from(v: i64) -> Self {
        KnowledgeValue::Integer(v)
    }
}

impl From<f64> for KnowledgeValue {
    fn from(v: f64) -> Self {
        KnowledgeValue::Double(v)
    }
}

impl From<&str> for KnowledgeValue {
    fn from(v: &str) -> Self {
        KnowledgeValue::String(v.to_string())
    }
}

impl From<String> for KnowledgeValue {
    fn from(v: String) -> Self {
        KnowledgeValue::String(v)
    }
}

impl From<Vec<i64>> for KnowledgeValue {
    fn from(v: Vec<i64>) -> Self {
        KnowledgeValue::IntegerArray(v)
    }
}

impl From<Vec<f64>> for KnowledgeValue {
    fn from(v: Vec<f64>) -> Self {
        KnowledgeValue::DoubleArray(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_tags_are_distinct() {
        let values = [
            KnowledgeValue::Empty,
            KnowledgeValue::Integer(1),
            KnowledgeValue::Double(1.0),
            KnowledgeValue::String("a".into()),
            KnowledgeValue::Xml("<a/>".into()),
            KnowledgeValue::TextFile("t".into()),
            KnowledgeValue::ImageJpeg(vec![0xFF]),
            KnowledgeValue::UnknownFile(vec![1]),
            KnowledgeValue::IntegerArray(vec![1]),
            KnowledgeValue::DoubleArray(vec![1.0]),
        ];
        let mut tags: Vec<u32> = values.iter().map(|v| v.type_tag()).collect();
        tags.sort_unstable();
        tags.dedup();
        assert_eq!(tags.len(), values.len());
    }

    #[test]
    fn test_size_semantics() {
        assert_eq!(KnowledgeValue::Empty.size(), 0);
        assert_eq!(KnowledgeValue::Integer(5).size(), 1);
        assert_eq!(KnowledgeValue::from("abc").size(), 4);
        assert_eq!(KnowledgeValue::UnknownFile(vec![0; 10]).size(), 10);
        assert_eq!(KnowledgeValue::from(vec![1.0, 2.0]).size(), 2);
    }

    #[test]
    fn test_to_string_with_delimiter() {
        let ints = KnowledgeValue::from(vec![10i64, 20, 30]);
        assert_eq!(ints.to_string_with(", "), "10, 20, 30");
        let doubles = KnowledgeValue::from(vec![10.1, 20.2]);
        assert_eq!(doubles.to_string(), "10.1, 20.2");
    }

    #[test]
    fn test_classification() {
        assert!(!KnowledgeValue::Empty.exists());
        assert!(KnowledgeValue::Xml(String::new()).is_string_type());
        assert!(KnowledgeValue::Xml(String::new()).is_file_type());
        assert!(!KnowledgeValue::Xml(String::new()).is_binary_file_type());
        assert!(KnowledgeValue::ImageJpeg(vec![]).is_binary_file_type());
        assert!(KnowledgeValue::from(vec![1i64]).is_array_type());
    }

    #[test]
    fn test_numeric_views() {
        assert_eq!(KnowledgeValue::Integer(3).as_double(), Some(3.0));
        assert_eq!(KnowledgeValue::Double(3.9).as_integer(), Some(3));
        assert_eq!(KnowledgeValue::from("x").as_integer(), None);
        assert_eq!(KnowledgeValue::from("x").as_str(), Some("x"));
    }
}
