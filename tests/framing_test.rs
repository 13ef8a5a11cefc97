use bytes::BytesMut;
use glam::Quat;
use uuid::Uuid;
use veles::protocol::domain::{ConnectRequest, DomainList, NodeEntry};
use veles::protocol::entity_data::{pack_quat, unpack_quat};
use veles::protocol::packet::{get_u128_be, get_u128_le, put_u128_be, put_u128_le};
use veles::protocol::property_flags::PropertyFlags;
use veles::protocol::{NodeType, Packet, PacketFlags, PacketType};

#[test]
fn packet_headers_survive_the_wire() {
    let sender = Uuid::new_v4();
    for (packet_type, payload) in [
        (PacketType::Ping, &b"ping-body"[..]),
        (PacketType::EntityEdit, &b"edit-body"[..]),
        (PacketType::DomainListRequest, &[][..]),
    ] {
        let mut packet = Packet::with_payload(packet_type, payload);
        packet.set_sequence(777);
        packet.set_sender(sender);
        packet.set_flags(PacketFlags::RELIABLE);

        let parsed = Packet::from_bytes(packet.to_bytes()).unwrap();
        assert_eq!(parsed.packet_type(), packet_type);
        assert_eq!(parsed.sequence(), 777);
        assert_eq!(parsed.sender(), sender);
        assert_eq!(parsed.payload(), payload);
    }
}

#[test]
fn unsourced_types_do_not_carry_a_sender() {
    let mut packet = Packet::new(PacketType::DomainConnectRequest);
    packet.set_sender(Uuid::new_v4());
    let parsed = Packet::from_bytes(packet.to_bytes()).unwrap();
    assert_eq!(parsed.sender(), Uuid::nil());
}

#[test]
fn u128_io_is_exact_in_both_endiannesses() {
    for value in [
        0u128,
        1,
        u64::MAX as u128,
        u128::MAX,
        0x0123_4567_89AB_CDEF_0011_2233_4455_6677,
        Uuid::new_v4().as_u128(),
    ] {
        let mut be = BytesMut::new();
        put_u128_be(&mut be, value);
        assert_eq!(get_u128_be(&mut be.freeze()), value);

        let mut le = BytesMut::new();
        put_u128_le(&mut le, value);
        assert_eq!(get_u128_le(&mut le.freeze()), value);
    }
}

#[test]
fn uuid_byte_order_is_big_endian() {
    let uuid: Uuid = "b71d5380-2fcc-4833-93a7-9a4967017587".parse().unwrap();
    let mut buf = BytesMut::new();
    put_u128_be(&mut buf, uuid.as_u128());
    assert_eq!(&buf[..], uuid.as_bytes());
}

#[test]
fn property_flags_decode_encode_identity() {
    for set in [
        vec![],
        vec![0u16],
        vec![17, 84],
        vec![126],
        (0..127).step_by(3).collect::<Vec<u16>>(),
    ] {
        let flags: PropertyFlags = set.into_iter().collect();
        let encoded = flags.encode();
        let (decoded, read) = PropertyFlags::decode(&encoded).unwrap();
        assert_eq!(decoded, flags);
        assert_eq!(read, encoded.len());
    }
}

#[test]
fn packed_quaternions_stay_within_precision() {
    let samples = [
        Quat::IDENTITY,
        Quat::from_rotation_y(1.0),
        Quat::from_rotation_x(-2.5),
        Quat::from_euler(glam::EulerRot::XYZ, 0.3, -1.2, 2.8),
        Quat::from_xyzw(-0.5, 0.5, -0.5, 0.5),
    ];
    for quat in samples {
        let unpacked = unpack_quat(pack_quat(quat));
        // Either representation of the rotation is acceptable.
        let sign = if quat.dot(unpacked) < 0.0 { -1.0 } else { 1.0 };
        for (a, b) in [
            (quat.x, sign * unpacked.x),
            (quat.y, sign * unpacked.y),
            (quat.z, sign * unpacked.z),
            (quat.w, sign * unpacked.w),
        ] {
            assert!(
                (a - b).abs() <= 1.0 / 16384.0,
                "component drift: {quat:?} vs {unpacked:?}"
            );
        }
    }
}

#[test]
fn domain_payloads_round_trip_through_packets() {
    let list = DomainList {
        domain_uuid: Uuid::new_v4(),
        domain_local_id: 3,
        session_uuid: Uuid::new_v4(),
        local_id: 9,
        nodes: vec![NodeEntry {
            node_type: NodeType::EntityServer,
            uuid: Uuid::new_v4(),
            public_addr: "203.0.113.10:40104".parse().unwrap(),
            local_addr: "10.0.0.4:40104".parse().unwrap(),
        }],
    };

    let packet = Packet::with_payload(PacketType::DomainList, &list.to_bytes()[..]);
    let parsed = Packet::from_bytes(packet.to_bytes()).unwrap();
    let reparsed = DomainList::from_bytes(bytes::Bytes::copy_from_slice(parsed.payload())).unwrap();
    assert_eq!(reparsed, list);

    let request = ConnectRequest::new(Uuid::nil(), NodeType::ASSIGNMENT_CLIENTS.to_vec());
    let packet = Packet::with_payload(PacketType::DomainConnectRequest, &request.to_bytes()[..]);
    let parsed = Packet::from_bytes(packet.to_bytes()).unwrap();
    let reparsed =
        ConnectRequest::from_bytes(bytes::Bytes::copy_from_slice(parsed.payload())).unwrap();
    assert_eq!(reparsed, request);
}
