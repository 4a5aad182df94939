//! NDN packet format: TLV primitives, names, and NDNLPv2/Interest/Data decoding.

pub mod name;
pub mod packet;
pub mod tlv;

pub use name::{Component, Name};
pub use packet::{Data, Fragment, Interest, LpHeader, NdnMessage, NdnPacket};
pub use tlv::{Element, IncompleteTlv, TlvError};

/// TLV-TYPE numbers.
pub mod tt {
    pub const IMPLICIT_SHA256_DIGEST_COMPONENT: u32 = 0x01;
    pub const PARAMETERS_SHA256_DIGEST_COMPONENT: u32 = 0x02;
    pub const INTEREST: u32 = 0x05;
    pub const DATA: u32 = 0x06;
    pub const NAME: u32 = 0x07;
    pub const GENERIC_NAME_COMPONENT: u32 = 0x08;
    pub const NONCE: u32 = 0x0a;
    pub const INTEREST_LIFETIME: u32 = 0x0c;
    pub const MUST_BE_FRESH: u32 = 0x12;
    pub const META_INFO: u32 = 0x14;
    pub const CONTENT: u32 = 0x15;
    pub const SIGNATURE_INFO: u32 = 0x16;
    pub const SIGNATURE_VALUE: u32 = 0x17;
    pub const CONTENT_TYPE: u32 = 0x18;
    pub const FRESHNESS_PERIOD: u32 = 0x19;
    pub const FINAL_BLOCK_ID: u32 = 0x1a;
    pub const FORWARDING_HINT: u32 = 0x1e;
    pub const DELEGATION: u32 = 0x1f;
    pub const CAN_BE_PREFIX: u32 = 0x21;
    pub const HOP_LIMIT: u32 = 0x22;
    pub const APPLICATION_PARAMETERS: u32 = 0x24;
    pub const INTEREST_SIGNATURE_INFO: u32 = 0x2c;
    pub const INTEREST_SIGNATURE_VALUE: u32 = 0x2e;

    pub const SEGMENT_NAME_COMPONENT: u32 = 0x32;
    pub const BYTE_OFFSET_NAME_COMPONENT: u32 = 0x34;
    pub const VERSION_NAME_COMPONENT: u32 = 0x36;
    pub const TIMESTAMP_NAME_COMPONENT: u32 = 0x38;
    pub const SEQUENCE_NUM_NAME_COMPONENT: u32 = 0x3a;

    // NDNLPv2
    pub const LP_FRAGMENT: u32 = 0x50;
    pub const LP_SEQUENCE: u32 = 0x51;
    pub const FRAG_INDEX: u32 = 0x52;
    pub const FRAG_COUNT: u32 = 0x53;
    pub const LP_PACKET: u32 = 0x64;
    pub const NACK: u32 = 0x0320;
    pub const NACK_REASON: u32 = 0x0321;
}

/// Nack reason codes.
pub mod nack {
    pub const NONE: u8 = 0;
    pub const CONGESTION: u8 = 50;
    pub const DUPLICATE: u8 = 100;
    pub const NO_ROUTE: u8 = 150;
    /// A Nack header without a NackReason field.
    pub const UNSPECIFIED: u8 = 255;
}
