use uuid::Uuid;
use veles::protocol::entity::{Color, EntityProperties, EntityType};
use veles::protocol::entity_edit::{decode_entity_edit, encode_entity_edit};
use veles::protocol::properties::common_props;
use veles::protocol::AppendState;

const LAST_EDITED: u64 = 1_688_896_885_851_574;
const MAX_PACKET_SIZE: usize = 1492;

fn entity_id() -> Uuid {
    "b71d5380-2fcc-4833-93a7-9a4967017587".parse().unwrap()
}

fn edit_properties() -> EntityProperties {
    let mut props = EntityProperties::new(EntityType::Box);
    props.color = Some(Color::new(240, 37, 148));
    props.last_edited_by = Some("a82f40b6-ee89-46cc-b504-02b88d72a546".parse().unwrap());
    props
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[test]
fn edit_with_room_for_everything() {
    let mut buffer = vec![0u8; MAX_PACKET_SIZE];
    let result = encode_entity_edit(&mut buffer, entity_id(), LAST_EDITED, &edit_properties());

    assert_eq!(result.append_state, AppendState::Completed);
    assert!(result.didnt_fit.is_empty());
    assert_eq!(
        hex(&buffer[..result.bytes_written]),
        "00b685f1f20a000600b71d53802fcc483393a79a49670175874000fff000020000000000000000401000a82f40b6ee8946ccb50402b88d72a546f02594"
    );
}

#[test]
fn edit_with_room_for_flags_and_color_only() {
    // 27 bytes of preamble, 13 of flags, 3 of color: the 18-byte editor
    // UUID cannot fit, the color still can.
    let mut buffer = vec![0u8; 43];
    let result = encode_entity_edit(&mut buffer, entity_id(), LAST_EDITED, &edit_properties());

    assert_eq!(result.append_state, AppendState::Partial);
    assert!(result
        .didnt_fit
        .get_has_property(common_props::LAST_EDITED_BY));
    assert!(!result.didnt_fit.get_has_property(common_props::COLOR));
    assert_eq!(
        hex(&buffer[..result.bytes_written]),
        "00b685f1f20a000600b71d53802fcc483393a79a49670175874000fff00000000000000000000040f02594"
    );
}

#[test]
fn edit_with_two_free_bytes_after_flags() {
    let mut buffer = vec![0u8; 42];
    let result = encode_entity_edit(&mut buffer, entity_id(), LAST_EDITED, &edit_properties());

    assert_eq!(result.append_state, AppendState::None);
    assert!(result
        .didnt_fit
        .get_has_property(common_props::LAST_EDITED_BY));
    assert!(result.didnt_fit.get_has_property(common_props::COLOR));
    // Position rolled back to the end of the flag block.
    assert_eq!(result.bytes_written, 40);
    // The wire image claims no properties at all.
    assert_eq!(
        hex(&buffer[..result.bytes_written]),
        "00b685f1f20a000600b71d53802fcc483393a79a49670175874000fff00000000000000000000000"
    );
}

#[test]
fn encoding_twice_is_byte_identical() {
    let props = edit_properties();
    let mut first = vec![0u8; MAX_PACKET_SIZE];
    let mut second = vec![0u8; MAX_PACKET_SIZE];
    let a = encode_entity_edit(&mut first, entity_id(), LAST_EDITED, &props);
    let b = encode_entity_edit(&mut second, entity_id(), LAST_EDITED, &props);
    assert_eq!(a.bytes_written, b.bytes_written);
    assert_eq!(first[..a.bytes_written], second[..b.bytes_written]);
}

#[test]
fn tight_buffers_never_overflow() {
    let props = edit_properties();
    for size in 0..=64usize {
        let mut buffer = vec![0u8; size];
        let result = encode_entity_edit(&mut buffer, entity_id(), LAST_EDITED, &props);
        assert!(
            result.bytes_written <= size,
            "wrote {} into {}",
            result.bytes_written,
            size
        );
    }
}

#[test]
fn decoded_edit_matches_what_was_encoded() {
    let props = edit_properties();
    let mut buffer = vec![0u8; MAX_PACKET_SIZE];
    let result = encode_entity_edit(&mut buffer, entity_id(), LAST_EDITED, &props);

    let message = decode_entity_edit(&buffer[..result.bytes_written]).unwrap();
    assert_eq!(message.entity_id, entity_id());
    assert_eq!(message.last_edited, LAST_EDITED);
    assert_eq!(message.update_delta, 0);
    assert_eq!(message.properties, props);
}
