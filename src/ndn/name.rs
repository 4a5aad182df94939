//! NDN names and their URI representation.

use std::fmt::{self, Write as _};

use super::tlv::{decode_nni, Element, TlvError};
use super::tt;

/// One name component: its TLV-TYPE and value bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub typ: u32,
    pub value: Vec<u8>,
}

impl Component {
    pub fn generic(value: impl Into<Vec<u8>>) -> Self {
        Self { typ: tt::GENERIC_NAME_COMPONENT, value: value.into() }
    }

    fn write_escaped(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.value.iter().all(|&b| b == b'.') {
            f.write_str("...")?;
            for _ in &self.value {
                f.write_char('.')?;
            }
            return Ok(());
        }
        for &b in &self.value {
            if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
                f.write_char(b as char)?;
            } else {
                write!(f, "%{:02X}", b)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.typ {
            tt::GENERIC_NAME_COMPONENT => return self.write_escaped(f),
            tt::IMPLICIT_SHA256_DIGEST_COMPONENT | tt::PARAMETERS_SHA256_DIGEST_COMPONENT => {
                f.write_str(if self.typ == tt::IMPLICIT_SHA256_DIGEST_COMPONENT {
                    "sha256digest="
                } else {
                    "params-sha256="
                })?;
                for b in &self.value {
                    write!(f, "{:02x}", b)?;
                }
                return Ok(());
            }
            tt::SEGMENT_NAME_COMPONENT => "seg",
            tt::BYTE_OFFSET_NAME_COMPONENT => "off",
            tt::VERSION_NAME_COMPONENT => "v",
            tt::TIMESTAMP_NAME_COMPONENT => "t",
            tt::SEQUENCE_NUM_NAME_COMPONENT => "seq",
            _ => "",
        };
        match decode_nni(&self.value) {
            Ok(n) if !prefix.is_empty() => write!(f, "{}={}", prefix, n),
            _ => {
                write!(f, "{}=", self.typ)?;
                self.write_escaped(f)
            }
        }
    }
}

/// A decoded NDN name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Name(pub Vec<Component>);

impl Name {
    /// Decodes the value of a Name element.
    pub fn decode(wire: &[u8], ele: &Element) -> Result<Self, TlvError> {
        if ele.typ != tt::NAME {
            return Err(TlvError::UnexpectedType(ele.typ));
        }
        let mut comps = Vec::new();
        for child in ele.children(wire) {
            let child = child?;
            if child.typ == 0 || child.typ > 0xffff {
                return Err(TlvError::UnexpectedType(child.typ));
            }
            comps.push(Component { typ: child.typ, value: child.value(wire).to_vec() });
        }
        Ok(Self(comps))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&Component> {
        self.0.last()
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_char('/');
        }
        for comp in &self.0 {
            write!(f, "/{}", comp)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ndn::tlv::decode_element;
    use crate::testutil::{name, tlv};

    fn uri(comps: Vec<Component>) -> String {
        Name(comps).to_string()
    }

    #[test] fn empty_name()      { assert_eq!(uri(vec![]), "/"); }
    #[test] fn generic()         { assert_eq!(uri(vec![Component::generic("a"), Component::generic("b")]), "/a/b"); }
    #[test] fn escaped()         { assert_eq!(uri(vec![Component::generic("a b/c")]), "/a%20b%2Fc"); }
    #[test] fn periods_only()    { assert_eq!(uri(vec![Component::generic(""), Component::generic("..")]), "/.../....."); }

    #[test]
    fn typed_components() {
        let comps = vec![
            Component { typ: tt::SEGMENT_NAME_COMPONENT, value: vec![0x01, 0x00] },
            Component { typ: tt::VERSION_NAME_COMPONENT, value: vec![0x07] },
            Component { typ: tt::IMPLICIT_SHA256_DIGEST_COMPONENT, value: vec![0xab; 4] },
            Component { typ: 0x100, value: b"x".to_vec() },
        ];
        assert_eq!(uri(comps), "/seg=256/v=7/sha256digest=abababab/256=x");
    }

    #[test]
    fn malformed_typed_component_falls_back_to_number() {
        let comps = vec![Component { typ: tt::SEGMENT_NAME_COMPONENT, value: vec![1, 2, 3] }];
        assert_eq!(uri(comps), "/50=%01%02%03");
    }

    #[test]
    fn decode_from_wire() {
        let wire = name(&["ndn", "edu"]);
        let ele = decode_element(&wire, 0, wire.len()).unwrap();
        let n = Name::decode(&wire, &ele).unwrap();
        assert_eq!(n.to_string(), "/ndn/edu");
        assert_eq!(n.last(), Some(&Component::generic("edu")));
    }

    #[test]
    fn decode_rejects_type_zero_component() {
        let wire = tlv(tt::NAME, &tlv(0, b"x"));
        let ele = decode_element(&wire, 0, wire.len()).unwrap();
        assert_eq!(Name::decode(&wire, &ele), Err(TlvError::UnexpectedType(0)));
    }
}
