use super::header::{HEADER_SIZE, Header, MAGIC, VERSION};

#[test]
fn round_trip() {
    let header = Header::for_payload(b"hello");
    let bytes = header.to_bytes();

    assert_eq!(&bytes[0..4], b"QZBC");
    assert_eq!(Header::from_bytes(&bytes), header);
    assert_eq!(header.payload_size, 5);
    assert_eq!(header.checksum, crc32fast::hash(b"hello"));
}

#[test]
fn validation() {
    let mut header = Header::default();
    assert!(header.validate_magic());
    assert!(header.validate_version());

    header.magic = *b"NOPE";
    header.version = VERSION + 1;
    assert!(!header.validate_magic());
    assert!(!header.validate_version());
}

#[test]
#[should_panic(expected = "header too short")]
fn short_buffer() {
    Header::from_bytes(&MAGIC);
}

#[test]
fn layout_is_little_endian() {
    let header = Header {
        checksum: 0x0403_0201,
        payload_size: 0x10,
        ..Header::default()
    };
    let bytes = header.to_bytes();
    assert_eq!(bytes.len(), HEADER_SIZE);
    assert_eq!(&bytes[4..8], &[1, 0, 0, 0]);
    assert_eq!(&bytes[8..12], &[1, 2, 3, 4]);
    assert_eq!(&bytes[12..16], &[0x10, 0, 0, 0]);
}
