//! Entity edit body encoding and decoding.
//!
//! Body layout:
//! ```text
//! octal code        u8    always 0 (root)
//! last edited       u64   microseconds, little-endian
//! entity UUID       [16]  big-endian
//! entity type       byte-count-coded
//! update delta      byte-count-coded, 0 for edits
//! property flags    variable length, reserved at the requested set's size
//! property fields   ascending flag order
//! ```
//!
//! The flag block is written up front for the full requested set and patched
//! in place afterward to reflect only the properties that actually fit; its
//! length never changes, so the field stream never shifts.

use tracing::warn;
use uuid::Uuid;

use crate::coded_int;
use crate::entity::{EntityProperties, EntityType, TypedProperties};
use crate::entity_data::{
    AppendState, EntityDataReader, EntityDataWriter, PacketContext,
};
use crate::error::{EntityDataError, EntityDataResult};
use crate::properties::{
    common_props, gizmo_props, grid_props, image_props, light_props, material_props, model_props,
    particle_props, polyline_props, polyvox_props, shape_props, text_props, web_props, zone_props,
};
use crate::property_flags::PropertyFlags;

/// Octal code for the octree root; edits always address the root.
const ROOT_OCTAL_CODE: u8 = 0;

/// Outcome of encoding one entity edit into a bounded buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityEditResult {
    pub append_state: AppendState,
    /// Requested properties that were not written.
    pub didnt_fit: PropertyFlags,
    /// Valid bytes in the buffer, including header and flag block.
    pub bytes_written: usize,
}

/// A decoded entity edit.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityEditMessage {
    pub entity_id: Uuid,
    pub last_edited: u64,
    pub update_delta: u64,
    pub properties: EntityProperties,
}

/// Serializes an entity edit into `buf`.
///
/// Returns `Completed` when every supplied property fit, `Partial` when at
/// least one was written and at least one was not, and `None` when no
/// property fit at all; in the `None` case the buffer position is rolled
/// back to the end of the flag block so the caller can abandon the packet.
pub fn encode_entity_edit(
    buf: &mut [u8],
    entity_id: Uuid,
    last_edited: u64,
    properties: &EntityProperties,
) -> EntityEditResult {
    let requested = properties.changed_properties();
    let mut writer = EntityDataWriter::new(buf);

    let (coded_type, type_len) = coded_int::encode(properties.entity_type as u64);
    let (coded_delta, delta_len) = coded_int::encode(0);

    let preamble_fits = writer.put_raw(&[ROOT_OCTAL_CODE])
        && writer.put_u64_le_raw(last_edited)
        && writer.put_raw(entity_id.as_bytes())
        && writer.put_raw(&coded_type[..type_len])
        && writer.put_raw(&coded_delta[..delta_len]);

    let flags_len = requested.encoded_size();
    let flags_offset = writer.offset();
    if !preamble_fits || writer.remaining() < flags_len {
        warn!("Entity edit buffer cannot hold the header and property flags");
        return EntityEditResult {
            append_state: AppendState::None,
            didnt_fit: requested,
            bytes_written: 0,
        };
    }
    writer.put_raw(&vec![0u8; flags_len]);
    requested.write_encoded(writer.written_mut(flags_offset, flags_len));

    let checkpoint = writer.offset();
    let mut ctx = PacketContext::new(requested.clone());

    for flag in requested.iter() {
        append_property(flag, properties, &mut writer, &mut ctx);
    }

    let mut didnt_fit = requested.clone();
    didnt_fit.difference_with(&ctx.properties_written);

    let append_state = if ctx.property_count == 0 {
        writer.rewind_to(checkpoint);
        AppendState::None
    } else if didnt_fit.is_empty() {
        AppendState::Completed
    } else {
        AppendState::Partial
    };

    // Patch the wire image so its flags cover exactly what was written.
    ctx.properties_written
        .write_encoded(writer.written_mut(flags_offset, flags_len));

    EntityEditResult {
        append_state,
        didnt_fit,
        bytes_written: writer.offset(),
    }
}

/// Parses an entity edit body produced by [`encode_entity_edit`].
pub fn decode_entity_edit(bytes: &[u8]) -> EntityDataResult<EntityEditMessage> {
    let mut reader = EntityDataReader::new(bytes);

    let octal_code = reader.read_u8()?;
    if octal_code != ROOT_OCTAL_CODE {
        return Err(EntityDataError::InvalidValue(format!(
            "unsupported octal code {}",
            octal_code
        )));
    }

    let last_edited = reader.read_u64()?;

    let mut id_bytes = [0u8; 16];
    for byte in &mut id_bytes {
        *byte = reader.read_u8()?;
    }
    let entity_id = Uuid::from_bytes(id_bytes);

    let (raw_type, read) = coded_int::decode(reader.remaining())?;
    reader.advance(read);
    let entity_type = u8::try_from(raw_type)
        .ok()
        .and_then(EntityType::from_u8)
        .ok_or(EntityDataError::UnknownEntityType(raw_type))?;

    let (update_delta, read) = coded_int::decode(reader.remaining())?;
    reader.advance(read);

    let (flags, read) = PropertyFlags::decode(reader.remaining())?;
    reader.advance(read);

    let mut properties = EntityProperties::new(entity_type);
    for flag in flags.iter() {
        read_property(flag, &mut properties, &mut reader)?;
    }

    Ok(EntityEditMessage {
        entity_id,
        last_edited,
        update_delta,
        properties,
    })
}

/// Serializes a batch of entity records as sent in entity-data packets:
/// a u16 record count, then length-prefixed edit bodies.
pub fn encode_entity_stream(records: &[(Uuid, u64, EntityProperties)], max_record_size: usize) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(records.len() as u16).to_le_bytes());
    let mut scratch = vec![0u8; max_record_size];
    for (entity_id, last_edited, properties) in records {
        let result = encode_entity_edit(&mut scratch, *entity_id, *last_edited, properties);
        out.extend_from_slice(&(result.bytes_written as u16).to_le_bytes());
        out.extend_from_slice(&scratch[..result.bytes_written]);
    }
    out
}

/// Parses a batch of entity records.
pub fn decode_entity_stream(bytes: &[u8]) -> EntityDataResult<Vec<EntityEditMessage>> {
    let mut reader = EntityDataReader::new(bytes);
    let count = reader.read_u16()? as usize;
    let mut records = Vec::with_capacity(count);
    for _ in 0..count {
        let len = reader.read_u16()? as usize;
        let body = reader.remaining();
        if body.len() < len {
            return Err(EntityDataError::Truncated {
                need: len,
                offset: reader.offset(),
                have: body.len(),
            });
        }
        records.push(decode_entity_edit(&body[..len])?);
        reader.advance(len);
    }
    Ok(records)
}

fn append_property(
    flag: u16,
    props: &EntityProperties,
    writer: &mut EntityDataWriter<'_>,
    ctx: &mut PacketContext,
) -> usize {
    use common_props::*;
    match flag {
        SIMULATION_OWNER => props
            .simulation_owner
            .as_deref()
            .map_or(0, |v| writer.append_byte_array(flag, v, ctx)),
        PARENT_ID => props.parent_id.map_or(0, |v| writer.append_uuid(flag, v, ctx)),
        PARENT_JOINT_INDEX => props
            .parent_joint_index
            .map_or(0, |v| writer.append_u16(flag, v, ctx)),
        VISIBLE => props.visible.map_or(0, |v| writer.append_bool(flag, v, ctx)),
        NAME => props.name.as_deref().map_or(0, |v| writer.append_string(flag, v, ctx)),
        LOCKED => props.locked.map_or(0, |v| writer.append_bool(flag, v, ctx)),
        USER_DATA => props
            .user_data
            .as_deref()
            .map_or(0, |v| writer.append_string(flag, v, ctx)),
        PRIVATE_USER_DATA => props
            .private_user_data
            .as_deref()
            .map_or(0, |v| writer.append_string(flag, v, ctx)),
        HREF => props.href.as_deref().map_or(0, |v| writer.append_string(flag, v, ctx)),
        DESCRIPTION => props
            .description
            .as_deref()
            .map_or(0, |v| writer.append_string(flag, v, ctx)),
        POSITION => props.position.map_or(0, |v| writer.append_vec3(flag, v, ctx)),
        DIMENSIONS => props.dimensions.map_or(0, |v| writer.append_vec3(flag, v, ctx)),
        ROTATION => props.rotation.map_or(0, |v| writer.append_quat(flag, v, ctx)),
        REGISTRATION_POINT => props
            .registration_point
            .map_or(0, |v| writer.append_vec3(flag, v, ctx)),
        CREATED => props.created.map_or(0, |v| writer.append_u64(flag, v, ctx)),
        LAST_EDITED_BY => props
            .last_edited_by
            .map_or(0, |v| writer.append_uuid(flag, v, ctx)),
        QUERY_AA_CUBE => props
            .query_aa_cube
            .map_or(0, |v| writer.append_aa_cube(flag, v, ctx)),
        CAN_CAST_SHADOW => props
            .can_cast_shadow
            .map_or(0, |v| writer.append_bool(flag, v, ctx)),
        RENDER_LAYER => props.render_layer.map_or(0, |v| writer.append_u32(flag, v, ctx)),
        PRIMITIVE_MODE => props
            .primitive_mode
            .map_or(0, |v| writer.append_u32(flag, v, ctx)),
        IGNORE_PICK_INTERSECTION => props
            .ignore_pick_intersection
            .map_or(0, |v| writer.append_bool(flag, v, ctx)),
        RENDER_WITH_ZONES => props
            .render_with_zones
            .as_deref()
            .map_or(0, |v| writer.append_uuid_array(flag, v, ctx)),
        BILLBOARD_MODE => props
            .billboard_mode
            .map_or(0, |v| writer.append_u32(flag, v, ctx)),

        GRAB_GRABBABLE => props.grab.grabbable.map_or(0, |v| writer.append_bool(flag, v, ctx)),
        GRAB_KINEMATIC => props.grab.kinematic.map_or(0, |v| writer.append_bool(flag, v, ctx)),
        GRAB_FOLLOWS_CONTROLLER => props
            .grab
            .follows_controller
            .map_or(0, |v| writer.append_bool(flag, v, ctx)),
        GRAB_TRIGGERABLE => props
            .grab
            .triggerable
            .map_or(0, |v| writer.append_bool(flag, v, ctx)),
        GRAB_EQUIPPABLE => props
            .grab
            .equippable
            .map_or(0, |v| writer.append_bool(flag, v, ctx)),
        GRAB_DELEGATE_TO_PARENT => props
            .grab
            .delegate_to_parent
            .map_or(0, |v| writer.append_bool(flag, v, ctx)),
        GRAB_LEFT_EQUIPPABLE_POSITION_OFFSET => props
            .grab
            .left_equippable_position_offset
            .map_or(0, |v| writer.append_vec3(flag, v, ctx)),
        GRAB_LEFT_EQUIPPABLE_ROTATION_OFFSET => props
            .grab
            .left_equippable_rotation_offset
            .map_or(0, |v| writer.append_quat(flag, v, ctx)),
        GRAB_RIGHT_EQUIPPABLE_POSITION_OFFSET => props
            .grab
            .right_equippable_position_offset
            .map_or(0, |v| writer.append_vec3(flag, v, ctx)),
        GRAB_RIGHT_EQUIPPABLE_ROTATION_OFFSET => props
            .grab
            .right_equippable_rotation_offset
            .map_or(0, |v| writer.append_quat(flag, v, ctx)),
        GRAB_EQUIPPABLE_INDICATOR_URL => props
            .grab
            .equippable_indicator_url
            .as_deref()
            .map_or(0, |v| writer.append_string(flag, v, ctx)),
        GRAB_EQUIPPABLE_INDICATOR_SCALE => props
            .grab
            .equippable_indicator_scale
            .map_or(0, |v| writer.append_vec3(flag, v, ctx)),
        GRAB_EQUIPPABLE_INDICATOR_OFFSET => props
            .grab
            .equippable_indicator_offset
            .map_or(0, |v| writer.append_vec3(flag, v, ctx)),

        DENSITY => props.density.map_or(0, |v| writer.append_f32(flag, v, ctx)),
        VELOCITY => props.velocity.map_or(0, |v| writer.append_vec3(flag, v, ctx)),
        ANGULAR_VELOCITY => props
            .angular_velocity
            .map_or(0, |v| writer.append_vec3(flag, v, ctx)),
        GRAVITY => props.gravity.map_or(0, |v| writer.append_vec3(flag, v, ctx)),
        ACCELERATION => props.acceleration.map_or(0, |v| writer.append_vec3(flag, v, ctx)),
        DAMPING => props.damping.map_or(0, |v| writer.append_f32(flag, v, ctx)),
        ANGULAR_DAMPING => props
            .angular_damping
            .map_or(0, |v| writer.append_f32(flag, v, ctx)),
        RESTITUTION => props.restitution.map_or(0, |v| writer.append_f32(flag, v, ctx)),
        FRICTION => props.friction.map_or(0, |v| writer.append_f32(flag, v, ctx)),
        LIFETIME => props.lifetime.map_or(0, |v| writer.append_f32(flag, v, ctx)),
        COLLISIONLESS => props
            .collisionless
            .map_or(0, |v| writer.append_bool(flag, v, ctx)),
        COLLISION_MASK => props
            .collision_mask
            .map_or(0, |v| writer.append_u16(flag, v, ctx)),
        DYNAMIC => props.dynamic.map_or(0, |v| writer.append_bool(flag, v, ctx)),
        COLLISION_SOUND_URL => props
            .collision_sound_url
            .as_deref()
            .map_or(0, |v| writer.append_string(flag, v, ctx)),
        ACTION_DATA => props
            .action_data
            .as_deref()
            .map_or(0, |v| writer.append_byte_array(flag, v, ctx)),

        CLONEABLE => props.cloneable.map_or(0, |v| writer.append_bool(flag, v, ctx)),
        CLONE_LIFETIME => props
            .clone_lifetime
            .map_or(0, |v| writer.append_f32(flag, v, ctx)),
        CLONE_LIMIT => props.clone_limit.map_or(0, |v| writer.append_f32(flag, v, ctx)),
        CLONE_DYNAMIC => props
            .clone_dynamic
            .map_or(0, |v| writer.append_bool(flag, v, ctx)),
        CLONE_AVATAR_ENTITY => props
            .clone_avatar_entity
            .map_or(0, |v| writer.append_bool(flag, v, ctx)),
        CLONE_ORIGIN_ID => props
            .clone_origin_id
            .map_or(0, |v| writer.append_uuid(flag, v, ctx)),

        SCRIPT => props.script.as_deref().map_or(0, |v| writer.append_string(flag, v, ctx)),
        SCRIPT_TIMESTAMP => props
            .script_timestamp
            .map_or(0, |v| writer.append_u64(flag, v, ctx)),
        SERVER_SCRIPTS => props
            .server_scripts
            .as_deref()
            .map_or(0, |v| writer.append_string(flag, v, ctx)),

        SHAPE_TYPE => props.shape_type.map_or(0, |v| writer.append_u32(flag, v, ctx)),
        COMPOUND_SHAPE_URL => props
            .compound_shape_url
            .as_deref()
            .map_or(0, |v| writer.append_string(flag, v, ctx)),
        COLOR => props.color.map_or(0, |v| writer.append_color(flag, v, ctx)),
        ALPHA => props.alpha.map_or(0, |v| writer.append_f32(flag, v, ctx)),
        PULSE_MIN => props.pulse.min.map_or(0, |v| writer.append_f32(flag, v, ctx)),
        PULSE_MAX => props.pulse.max.map_or(0, |v| writer.append_f32(flag, v, ctx)),
        PULSE_PERIOD => props.pulse.period.map_or(0, |v| writer.append_f32(flag, v, ctx)),
        PULSE_COLOR_MODE => props
            .pulse
            .color_mode
            .map_or(0, |v| writer.append_u32(flag, v, ctx)),
        PULSE_ALPHA_MODE => props
            .pulse
            .alpha_mode
            .map_or(0, |v| writer.append_u32(flag, v, ctx)),
        TEXTURES => props
            .textures
            .as_deref()
            .map_or(0, |v| writer.append_string(flag, v, ctx)),

        _ => append_typed_property(flag, &props.typed, writer, ctx),
    }
}

fn append_typed_property(
    flag: u16,
    typed: &TypedProperties,
    writer: &mut EntityDataWriter<'_>,
    ctx: &mut PacketContext,
) -> usize {
    match typed {
        TypedProperties::None => 0,
        TypedProperties::Shape(shape) => match flag {
            shape_props::SHAPE => shape
                .shape
                .as_deref()
                .map_or(0, |v| writer.append_string(flag, v, ctx)),
            _ => 0,
        },
        TypedProperties::Model(model) => match flag {
            model_props::MODEL_URL => model
                .model_url
                .as_deref()
                .map_or(0, |v| writer.append_string(flag, v, ctx)),
            model_props::MODEL_SCALE => model
                .model_scale
                .map_or(0, |v| writer.append_vec3(flag, v, ctx)),
            model_props::GROUP_CULLED => model
                .group_culled
                .map_or(0, |v| writer.append_bool(flag, v, ctx)),
            model_props::ANIMATION_URL => model
                .animation
                .url
                .as_deref()
                .map_or(0, |v| writer.append_string(flag, v, ctx)),
            model_props::ANIMATION_ALLOW_TRANSLATION => model
                .animation
                .allow_translation
                .map_or(0, |v| writer.append_bool(flag, v, ctx)),
            model_props::ANIMATION_FPS => model
                .animation
                .fps
                .map_or(0, |v| writer.append_f32(flag, v, ctx)),
            model_props::ANIMATION_FRAME_INDEX => model
                .animation
                .frame_index
                .map_or(0, |v| writer.append_f32(flag, v, ctx)),
            model_props::ANIMATION_PLAYING => model
                .animation
                .playing
                .map_or(0, |v| writer.append_bool(flag, v, ctx)),
            model_props::ANIMATION_LOOP => model
                .animation
                .looping
                .map_or(0, |v| writer.append_bool(flag, v, ctx)),
            model_props::ANIMATION_FIRST_FRAME => model
                .animation
                .first_frame
                .map_or(0, |v| writer.append_f32(flag, v, ctx)),
            model_props::ANIMATION_LAST_FRAME => model
                .animation
                .last_frame
                .map_or(0, |v| writer.append_f32(flag, v, ctx)),
            model_props::ANIMATION_HOLD => model
                .animation
                .hold
                .map_or(0, |v| writer.append_bool(flag, v, ctx)),
            _ => 0,
        },
        TypedProperties::Light(light) => match flag {
            light_props::IS_SPOTLIGHT => light
                .is_spotlight
                .map_or(0, |v| writer.append_bool(flag, v, ctx)),
            light_props::INTENSITY => light.intensity.map_or(0, |v| writer.append_f32(flag, v, ctx)),
            light_props::EXPONENT => light.exponent.map_or(0, |v| writer.append_f32(flag, v, ctx)),
            light_props::CUTOFF => light.cutoff.map_or(0, |v| writer.append_f32(flag, v, ctx)),
            light_props::FALLOFF_RADIUS => light
                .falloff_radius
                .map_or(0, |v| writer.append_f32(flag, v, ctx)),
            _ => 0,
        },
        TypedProperties::Text(text) => match flag {
            text_props::TEXT => text.text.as_deref().map_or(0, |v| writer.append_string(flag, v, ctx)),
            text_props::LINE_HEIGHT => text
                .line_height
                .map_or(0, |v| writer.append_f32(flag, v, ctx)),
            text_props::TEXT_COLOR => text
                .text_color
                .map_or(0, |v| writer.append_color(flag, v, ctx)),
            text_props::TEXT_ALPHA => text
                .text_alpha
                .map_or(0, |v| writer.append_f32(flag, v, ctx)),
            text_props::BACKGROUND_COLOR => text
                .background_color
                .map_or(0, |v| writer.append_color(flag, v, ctx)),
            text_props::BACKGROUND_ALPHA => text
                .background_alpha
                .map_or(0, |v| writer.append_f32(flag, v, ctx)),
            text_props::UNLIT => text.unlit.map_or(0, |v| writer.append_bool(flag, v, ctx)),
            text_props::FONT => text.font.as_deref().map_or(0, |v| writer.append_string(flag, v, ctx)),
            _ => 0,
        },
        TypedProperties::Zone(zone) => match flag {
            zone_props::KEYLIGHT_COLOR => zone
                .keylight
                .color
                .map_or(0, |v| writer.append_color(flag, v, ctx)),
            zone_props::KEYLIGHT_INTENSITY => zone
                .keylight
                .intensity
                .map_or(0, |v| writer.append_f32(flag, v, ctx)),
            zone_props::KEYLIGHT_DIRECTION => zone
                .keylight
                .direction
                .map_or(0, |v| writer.append_vec3(flag, v, ctx)),
            zone_props::KEYLIGHT_CAST_SHADOWS => zone
                .keylight
                .cast_shadows
                .map_or(0, |v| writer.append_bool(flag, v, ctx)),
            zone_props::AMBIENT_LIGHT_INTENSITY => zone
                .ambient_light
                .intensity
                .map_or(0, |v| writer.append_f32(flag, v, ctx)),
            zone_props::AMBIENT_LIGHT_URL => zone
                .ambient_light
                .url
                .as_deref()
                .map_or(0, |v| writer.append_string(flag, v, ctx)),
            zone_props::SKYBOX_COLOR => zone
                .skybox
                .color
                .map_or(0, |v| writer.append_color(flag, v, ctx)),
            zone_props::SKYBOX_URL => zone
                .skybox
                .url
                .as_deref()
                .map_or(0, |v| writer.append_string(flag, v, ctx)),
            zone_props::HAZE_RANGE => zone.haze.range.map_or(0, |v| writer.append_f32(flag, v, ctx)),
            zone_props::HAZE_COLOR => zone.haze.color.map_or(0, |v| writer.append_color(flag, v, ctx)),
            zone_props::HAZE_GLARE_COLOR => zone
                .haze
                .glare_color
                .map_or(0, |v| writer.append_color(flag, v, ctx)),
            zone_props::HAZE_BACKGROUND_BLEND => zone
                .haze
                .background_blend
                .map_or(0, |v| writer.append_f32(flag, v, ctx)),
            zone_props::BLOOM_INTENSITY => zone
                .bloom
                .intensity
                .map_or(0, |v| writer.append_f32(flag, v, ctx)),
            zone_props::BLOOM_THRESHOLD => zone
                .bloom
                .threshold
                .map_or(0, |v| writer.append_f32(flag, v, ctx)),
            zone_props::BLOOM_SIZE => zone.bloom.size.map_or(0, |v| writer.append_f32(flag, v, ctx)),
            zone_props::TONEMAPPING_CURVE => zone
                .tonemapping
                .curve
                .map_or(0, |v| writer.append_u32(flag, v, ctx)),
            zone_props::TONEMAPPING_EXPOSURE => zone
                .tonemapping
                .exposure
                .map_or(0, |v| writer.append_f32(flag, v, ctx)),
            zone_props::FLYING_ALLOWED => zone
                .flying_allowed
                .map_or(0, |v| writer.append_bool(flag, v, ctx)),
            zone_props::GHOSTING_ALLOWED => zone
                .ghosting_allowed
                .map_or(0, |v| writer.append_bool(flag, v, ctx)),
            _ => 0,
        },
        TypedProperties::Web(web) => match flag {
            web_props::SOURCE_URL => web
                .source_url
                .as_deref()
                .map_or(0, |v| writer.append_string(flag, v, ctx)),
            web_props::DPI => web.dpi.map_or(0, |v| writer.append_u16(flag, v, ctx)),
            web_props::SCRIPT_URL => web
                .script_url
                .as_deref()
                .map_or(0, |v| writer.append_string(flag, v, ctx)),
            web_props::MAX_FPS => web.max_fps.map_or(0, |v| writer.append_u8(flag, v, ctx)),
            web_props::INPUT_MODE => web.input_mode.map_or(0, |v| writer.append_u32(flag, v, ctx)),
            _ => 0,
        },
        TypedProperties::Image(image) => match flag {
            image_props::IMAGE_URL => image
                .image_url
                .as_deref()
                .map_or(0, |v| writer.append_string(flag, v, ctx)),
            image_props::EMISSIVE => image.emissive.map_or(0, |v| writer.append_bool(flag, v, ctx)),
            image_props::KEEP_ASPECT_RATIO => image
                .keep_aspect_ratio
                .map_or(0, |v| writer.append_bool(flag, v, ctx)),
            image_props::SUB_IMAGE => image.sub_image.map_or(0, |v| writer.append_rect(flag, v, ctx)),
            _ => 0,
        },
        TypedProperties::Grid(grid) => match flag {
            grid_props::FOLLOW_CAMERA => grid
                .follow_camera
                .map_or(0, |v| writer.append_bool(flag, v, ctx)),
            grid_props::MAJOR_GRID_EVERY => grid
                .major_grid_every
                .map_or(0, |v| writer.append_u32(flag, v, ctx)),
            grid_props::MINOR_GRID_EVERY => grid
                .minor_grid_every
                .map_or(0, |v| writer.append_f32(flag, v, ctx)),
            _ => 0,
        },
        TypedProperties::Gizmo(gizmo) => match flag {
            gizmo_props::GIZMO_TYPE => gizmo
                .gizmo_type
                .map_or(0, |v| writer.append_u32(flag, v, ctx)),
            gizmo_props::RING_START_ANGLE => gizmo
                .ring
                .start_angle
                .map_or(0, |v| writer.append_f32(flag, v, ctx)),
            gizmo_props::RING_END_ANGLE => gizmo
                .ring
                .end_angle
                .map_or(0, |v| writer.append_f32(flag, v, ctx)),
            gizmo_props::RING_INNER_RADIUS => gizmo
                .ring
                .inner_radius
                .map_or(0, |v| writer.append_f32(flag, v, ctx)),
            gizmo_props::RING_INNER_START_COLOR => gizmo
                .ring
                .inner_start_color
                .map_or(0, |v| writer.append_color(flag, v, ctx)),
            gizmo_props::RING_INNER_END_COLOR => gizmo
                .ring
                .inner_end_color
                .map_or(0, |v| writer.append_color(flag, v, ctx)),
            gizmo_props::RING_OUTER_START_COLOR => gizmo
                .ring
                .outer_start_color
                .map_or(0, |v| writer.append_color(flag, v, ctx)),
            gizmo_props::RING_OUTER_END_COLOR => gizmo
                .ring
                .outer_end_color
                .map_or(0, |v| writer.append_color(flag, v, ctx)),
            gizmo_props::RING_HAS_TICK_MARKS => gizmo
                .ring
                .has_tick_marks
                .map_or(0, |v| writer.append_bool(flag, v, ctx)),
            _ => 0,
        },
        TypedProperties::Material(material) => match flag {
            material_props::MATERIAL_URL => material
                .material_url
                .as_deref()
                .map_or(0, |v| writer.append_string(flag, v, ctx)),
            material_props::MATERIAL_MAPPING_MODE => material
                .material_mapping_mode
                .map_or(0, |v| writer.append_u32(flag, v, ctx)),
            material_props::PRIORITY => material
                .priority
                .map_or(0, |v| writer.append_u16(flag, v, ctx)),
            material_props::PARENT_MATERIAL_NAME => material
                .parent_material_name
                .as_deref()
                .map_or(0, |v| writer.append_string(flag, v, ctx)),
            material_props::MATERIAL_MAPPING_POS => material
                .material_mapping_pos
                .map_or(0, |v| writer.append_vec2(flag, v, ctx)),
            material_props::MATERIAL_MAPPING_SCALE => material
                .material_mapping_scale
                .map_or(0, |v| writer.append_vec2(flag, v, ctx)),
            material_props::MATERIAL_MAPPING_ROT => material
                .material_mapping_rot
                .map_or(0, |v| writer.append_f32(flag, v, ctx)),
            material_props::MATERIAL_DATA => material
                .material_data
                .as_deref()
                .map_or(0, |v| writer.append_string(flag, v, ctx)),
            material_props::MATERIAL_REPEAT => material
                .material_repeat
                .map_or(0, |v| writer.append_bool(flag, v, ctx)),
            _ => 0,
        },
        TypedProperties::ParticleEffect(particles) => match flag {
            particle_props::MAX_PARTICLES => particles
                .max_particles
                .map_or(0, |v| writer.append_u32(flag, v, ctx)),
            particle_props::LIFESPAN => particles
                .lifespan
                .map_or(0, |v| writer.append_f32(flag, v, ctx)),
            particle_props::EMITTING_PARTICLES => particles
                .emitting_particles
                .map_or(0, |v| writer.append_bool(flag, v, ctx)),
            particle_props::EMIT_RATE => particles
                .emit_rate
                .map_or(0, |v| writer.append_f32(flag, v, ctx)),
            particle_props::EMIT_SPEED => particles
                .emit_speed
                .map_or(0, |v| writer.append_f32(flag, v, ctx)),
            particle_props::SPEED_SPREAD => particles
                .speed_spread
                .map_or(0, |v| writer.append_f32(flag, v, ctx)),
            particle_props::EMIT_ORIENTATION => particles
                .emit_orientation
                .map_or(0, |v| writer.append_quat(flag, v, ctx)),
            particle_props::EMIT_DIMENSIONS => particles
                .emit_dimensions
                .map_or(0, |v| writer.append_vec3(flag, v, ctx)),
            particle_props::EMIT_RADIUS_START => particles
                .emit_radius_start
                .map_or(0, |v| writer.append_f32(flag, v, ctx)),
            particle_props::EMIT_ACCELERATION => particles
                .emit_acceleration
                .map_or(0, |v| writer.append_vec3(flag, v, ctx)),
            particle_props::ACCELERATION_SPREAD => particles
                .acceleration_spread
                .map_or(0, |v| writer.append_vec3(flag, v, ctx)),
            particle_props::PARTICLE_RADIUS => particles
                .particle_radius
                .map_or(0, |v| writer.append_f32(flag, v, ctx)),
            particle_props::RADIUS_SPREAD => particles
                .radius_spread
                .map_or(0, |v| writer.append_f32(flag, v, ctx)),
            particle_props::RADIUS_START => particles
                .radius_start
                .map_or(0, |v| writer.append_f32(flag, v, ctx)),
            particle_props::RADIUS_FINISH => particles
                .radius_finish
                .map_or(0, |v| writer.append_f32(flag, v, ctx)),
            particle_props::COLOR_START => particles
                .color_start
                .map_or(0, |v| writer.append_color(flag, v, ctx)),
            particle_props::COLOR_FINISH => particles
                .color_finish
                .map_or(0, |v| writer.append_color(flag, v, ctx)),
            particle_props::ALPHA_START => particles
                .alpha_start
                .map_or(0, |v| writer.append_f32(flag, v, ctx)),
            particle_props::ALPHA_FINISH => particles
                .alpha_finish
                .map_or(0, |v| writer.append_f32(flag, v, ctx)),
            particle_props::EMITTER_SHOULD_TRAIL => particles
                .emitter_should_trail
                .map_or(0, |v| writer.append_bool(flag, v, ctx)),
            particle_props::ANIMATION_URL => particles
                .animation
                .url
                .as_deref()
                .map_or(0, |v| writer.append_string(flag, v, ctx)),
            particle_props::ANIMATION_ALLOW_TRANSLATION => particles
                .animation
                .allow_translation
                .map_or(0, |v| writer.append_bool(flag, v, ctx)),
            particle_props::ANIMATION_FPS => particles
                .animation
                .fps
                .map_or(0, |v| writer.append_f32(flag, v, ctx)),
            particle_props::ANIMATION_FRAME_INDEX => particles
                .animation
                .frame_index
                .map_or(0, |v| writer.append_f32(flag, v, ctx)),
            particle_props::ANIMATION_PLAYING => particles
                .animation
                .playing
                .map_or(0, |v| writer.append_bool(flag, v, ctx)),
            particle_props::ANIMATION_LOOP => particles
                .animation
                .looping
                .map_or(0, |v| writer.append_bool(flag, v, ctx)),
            particle_props::ANIMATION_FIRST_FRAME => particles
                .animation
                .first_frame
                .map_or(0, |v| writer.append_f32(flag, v, ctx)),
            particle_props::ANIMATION_LAST_FRAME => particles
                .animation
                .last_frame
                .map_or(0, |v| writer.append_f32(flag, v, ctx)),
            particle_props::ANIMATION_HOLD => particles
                .animation
                .hold
                .map_or(0, |v| writer.append_bool(flag, v, ctx)),
            _ => 0,
        },
        TypedProperties::PolyLine(polyline) => match flag {
            polyline_props::LINE_POINTS => polyline
                .line_points
                .as_deref()
                .map_or(0, |v| writer.append_vec3_array(flag, v, ctx)),
            polyline_props::STROKE_NORMALS => polyline
                .stroke_normals
                .as_deref()
                .map_or(0, |v| writer.append_vec3_array(flag, v, ctx)),
            polyline_props::STROKE_COLORS => polyline
                .stroke_colors
                .as_deref()
                .map_or(0, |v| writer.append_vec3_array(flag, v, ctx)),
            polyline_props::IS_UV_MODE_STRETCH => polyline
                .is_uv_mode_stretch
                .map_or(0, |v| writer.append_bool(flag, v, ctx)),
            polyline_props::GLOW => polyline.glow.map_or(0, |v| writer.append_bool(flag, v, ctx)),
            polyline_props::FACE_CAMERA => polyline
                .face_camera
                .map_or(0, |v| writer.append_bool(flag, v, ctx)),
            _ => 0,
        },
        TypedProperties::PolyVox(polyvox) => match flag {
            polyvox_props::VOXEL_VOLUME_SIZE => polyvox
                .voxel_volume_size
                .map_or(0, |v| writer.append_vec3(flag, v, ctx)),
            polyvox_props::VOXEL_DATA => polyvox
                .voxel_data
                .as_deref()
                .map_or(0, |v| writer.append_byte_array(flag, v, ctx)),
            polyvox_props::VOXEL_SURFACE_STYLE => polyvox
                .voxel_surface_style
                .map_or(0, |v| writer.append_u16(flag, v, ctx)),
            polyvox_props::X_TEXTURE_URL => polyvox
                .x_texture_url
                .as_deref()
                .map_or(0, |v| writer.append_string(flag, v, ctx)),
            polyvox_props::Y_TEXTURE_URL => polyvox
                .y_texture_url
                .as_deref()
                .map_or(0, |v| writer.append_string(flag, v, ctx)),
            polyvox_props::Z_TEXTURE_URL => polyvox
                .z_texture_url
                .as_deref()
                .map_or(0, |v| writer.append_string(flag, v, ctx)),
            _ => 0,
        },
    }
}

fn read_property(
    flag: u16,
    props: &mut EntityProperties,
    reader: &mut EntityDataReader<'_>,
) -> EntityDataResult<()> {
    use common_props::*;
    match flag {
        SIMULATION_OWNER => props.simulation_owner = Some(reader.read_byte_array()?),
        PARENT_ID => props.parent_id = Some(reader.read_uuid()?),
        PARENT_JOINT_INDEX => props.parent_joint_index = Some(reader.read_u16()?),
        VISIBLE => props.visible = Some(reader.read_bool()?),
        NAME => props.name = Some(reader.read_string()?),
        LOCKED => props.locked = Some(reader.read_bool()?),
        USER_DATA => props.user_data = Some(reader.read_string()?),
        PRIVATE_USER_DATA => props.private_user_data = Some(reader.read_string()?),
        HREF => props.href = Some(reader.read_string()?),
        DESCRIPTION => props.description = Some(reader.read_string()?),
        POSITION => props.position = Some(reader.read_vec3()?),
        DIMENSIONS => props.dimensions = Some(reader.read_vec3()?),
        ROTATION => props.rotation = Some(reader.read_quat()?),
        REGISTRATION_POINT => props.registration_point = Some(reader.read_vec3()?),
        CREATED => props.created = Some(reader.read_u64()?),
        LAST_EDITED_BY => props.last_edited_by = Some(reader.read_uuid()?),
        QUERY_AA_CUBE => props.query_aa_cube = Some(reader.read_aa_cube()?),
        CAN_CAST_SHADOW => props.can_cast_shadow = Some(reader.read_bool()?),
        RENDER_LAYER => props.render_layer = Some(reader.read_u32()?),
        PRIMITIVE_MODE => props.primitive_mode = Some(reader.read_u32()?),
        IGNORE_PICK_INTERSECTION => props.ignore_pick_intersection = Some(reader.read_bool()?),
        RENDER_WITH_ZONES => props.render_with_zones = Some(reader.read_uuid_array()?),
        BILLBOARD_MODE => props.billboard_mode = Some(reader.read_u32()?),

        GRAB_GRABBABLE => props.grab.grabbable = Some(reader.read_bool()?),
        GRAB_KINEMATIC => props.grab.kinematic = Some(reader.read_bool()?),
        GRAB_FOLLOWS_CONTROLLER => props.grab.follows_controller = Some(reader.read_bool()?),
        GRAB_TRIGGERABLE => props.grab.triggerable = Some(reader.read_bool()?),
        GRAB_EQUIPPABLE => props.grab.equippable = Some(reader.read_bool()?),
        GRAB_DELEGATE_TO_PARENT => props.grab.delegate_to_parent = Some(reader.read_bool()?),
        GRAB_LEFT_EQUIPPABLE_POSITION_OFFSET => {
            props.grab.left_equippable_position_offset = Some(reader.read_vec3()?)
        }
        GRAB_LEFT_EQUIPPABLE_ROTATION_OFFSET => {
            props.grab.left_equippable_rotation_offset = Some(reader.read_quat()?)
        }
        GRAB_RIGHT_EQUIPPABLE_POSITION_OFFSET => {
            props.grab.right_equippable_position_offset = Some(reader.read_vec3()?)
        }
        GRAB_RIGHT_EQUIPPABLE_ROTATION_OFFSET => {
            props.grab.right_equippable_rotation_offset = Some(reader.read_quat()?)
        }
        GRAB_EQUIPPABLE_INDICATOR_URL => {
            props.grab.equippable_indicator_url = Some(reader.read_string()?)
        }
        GRAB_EQUIPPABLE_INDICATOR_SCALE => {
            props.grab.equippable_indicator_scale = Some(reader.read_vec3()?)
        }
        GRAB_EQUIPPABLE_INDICATOR_OFFSET => {
            props.grab.equippable_indicator_offset = Some(reader.read_vec3()?)
        }

        DENSITY => props.density = Some(reader.read_f32()?),
        VELOCITY => props.velocity = Some(reader.read_vec3()?),
        ANGULAR_VELOCITY => props.angular_velocity = Some(reader.read_vec3()?),
        GRAVITY => props.gravity = Some(reader.read_vec3()?),
        ACCELERATION => props.acceleration = Some(reader.read_vec3()?),
        DAMPING => props.damping = Some(reader.read_f32()?),
        ANGULAR_DAMPING => props.angular_damping = Some(reader.read_f32()?),
        RESTITUTION => props.restitution = Some(reader.read_f32()?),
        FRICTION => props.friction = Some(reader.read_f32()?),
        LIFETIME => props.lifetime = Some(reader.read_f32()?),
        COLLISIONLESS => props.collisionless = Some(reader.read_bool()?),
        COLLISION_MASK => props.collision_mask = Some(reader.read_u16()?),
        DYNAMIC => props.dynamic = Some(reader.read_bool()?),
        COLLISION_SOUND_URL => props.collision_sound_url = Some(reader.read_string()?),
        ACTION_DATA => props.action_data = Some(reader.read_byte_array()?),

        CLONEABLE => props.cloneable = Some(reader.read_bool()?),
        CLONE_LIFETIME => props.clone_lifetime = Some(reader.read_f32()?),
        CLONE_LIMIT => props.clone_limit = Some(reader.read_f32()?),
        CLONE_DYNAMIC => props.clone_dynamic = Some(reader.read_bool()?),
        CLONE_AVATAR_ENTITY => props.clone_avatar_entity = Some(reader.read_bool()?),
        CLONE_ORIGIN_ID => props.clone_origin_id = Some(reader.read_uuid()?),

        SCRIPT => props.script = Some(reader.read_string()?),
        SCRIPT_TIMESTAMP => props.script_timestamp = Some(reader.read_u64()?),
        SERVER_SCRIPTS => props.server_scripts = Some(reader.read_string()?),

        SHAPE_TYPE => props.shape_type = Some(reader.read_u32()?),
        COMPOUND_SHAPE_URL => props.compound_shape_url = Some(reader.read_string()?),
        COLOR => props.color = Some(reader.read_color()?),
        ALPHA => props.alpha = Some(reader.read_f32()?),
        PULSE_MIN => props.pulse.min = Some(reader.read_f32()?),
        PULSE_MAX => props.pulse.max = Some(reader.read_f32()?),
        PULSE_PERIOD => props.pulse.period = Some(reader.read_f32()?),
        PULSE_COLOR_MODE => props.pulse.color_mode = Some(reader.read_u32()?),
        PULSE_ALPHA_MODE => props.pulse.alpha_mode = Some(reader.read_u32()?),
        TEXTURES => props.textures = Some(reader.read_string()?),

        _ => read_typed_property(flag, &mut props.typed, reader)?,
    }
    Ok(())
}

fn read_typed_property(
    flag: u16,
    typed: &mut TypedProperties,
    reader: &mut EntityDataReader<'_>,
) -> EntityDataResult<()> {
    match typed {
        TypedProperties::None => return Err(EntityDataError::UnknownProperty(flag)),
        TypedProperties::Shape(shape) => match flag {
            shape_props::SHAPE => shape.shape = Some(reader.read_string()?),
            _ => return Err(EntityDataError::UnknownProperty(flag)),
        },
        TypedProperties::Model(model) => match flag {
            model_props::MODEL_URL => model.model_url = Some(reader.read_string()?),
            model_props::MODEL_SCALE => model.model_scale = Some(reader.read_vec3()?),
            model_props::GROUP_CULLED => model.group_culled = Some(reader.read_bool()?),
            model_props::ANIMATION_URL => model.animation.url = Some(reader.read_string()?),
            model_props::ANIMATION_ALLOW_TRANSLATION => {
                model.animation.allow_translation = Some(reader.read_bool()?)
            }
            model_props::ANIMATION_FPS => model.animation.fps = Some(reader.read_f32()?),
            model_props::ANIMATION_FRAME_INDEX => {
                model.animation.frame_index = Some(reader.read_f32()?)
            }
            model_props::ANIMATION_PLAYING => model.animation.playing = Some(reader.read_bool()?),
            model_props::ANIMATION_LOOP => model.animation.looping = Some(reader.read_bool()?),
            model_props::ANIMATION_FIRST_FRAME => {
                model.animation.first_frame = Some(reader.read_f32()?)
            }
            model_props::ANIMATION_LAST_FRAME => {
                model.animation.last_frame = Some(reader.read_f32()?)
            }
            model_props::ANIMATION_HOLD => model.animation.hold = Some(reader.read_bool()?),
            _ => return Err(EntityDataError::UnknownProperty(flag)),
        },
        TypedProperties::Light(light) => match flag {
            light_props::IS_SPOTLIGHT => light.is_spotlight = Some(reader.read_bool()?),
            light_props::INTENSITY => light.intensity = Some(reader.read_f32()?),
            light_props::EXPONENT => light.exponent = Some(reader.read_f32()?),
            light_props::CUTOFF => light.cutoff = Some(reader.read_f32()?),
            light_props::FALLOFF_RADIUS => light.falloff_radius = Some(reader.read_f32()?),
            _ => return Err(EntityDataError::UnknownProperty(flag)),
        },
        TypedProperties::Text(text) => match flag {
            text_props::TEXT => text.text = Some(reader.read_string()?),
            text_props::LINE_HEIGHT => text.line_height = Some(reader.read_f32()?),
            text_props::TEXT_COLOR => text.text_color = Some(reader.read_color()?),
            text_props::TEXT_ALPHA => text.text_alpha = Some(reader.read_f32()?),
            text_props::BACKGROUND_COLOR => text.background_color = Some(reader.read_color()?),
            text_props::BACKGROUND_ALPHA => text.background_alpha = Some(reader.read_f32()?),
            text_props::UNLIT => text.unlit = Some(reader.read_bool()?),
            text_props::FONT => text.font = Some(reader.read_string()?),
            _ => return Err(EntityDataError::UnknownProperty(flag)),
        },
        TypedProperties::Zone(zone) => match flag {
            zone_props::KEYLIGHT_COLOR => zone.keylight.color = Some(reader.read_color()?),
            zone_props::KEYLIGHT_INTENSITY => zone.keylight.intensity = Some(reader.read_f32()?),
            zone_props::KEYLIGHT_DIRECTION => zone.keylight.direction = Some(reader.read_vec3()?),
            zone_props::KEYLIGHT_CAST_SHADOWS => {
                zone.keylight.cast_shadows = Some(reader.read_bool()?)
            }
            zone_props::AMBIENT_LIGHT_INTENSITY => {
                zone.ambient_light.intensity = Some(reader.read_f32()?)
            }
            zone_props::AMBIENT_LIGHT_URL => zone.ambient_light.url = Some(reader.read_string()?),
            zone_props::SKYBOX_COLOR => zone.skybox.color = Some(reader.read_color()?),
            zone_props::SKYBOX_URL => zone.skybox.url = Some(reader.read_string()?),
            zone_props::HAZE_RANGE => zone.haze.range = Some(reader.read_f32()?),
            zone_props::HAZE_COLOR => zone.haze.color = Some(reader.read_color()?),
            zone_props::HAZE_GLARE_COLOR => zone.haze.glare_color = Some(reader.read_color()?),
            zone_props::HAZE_BACKGROUND_BLEND => {
                zone.haze.background_blend = Some(reader.read_f32()?)
            }
            zone_props::BLOOM_INTENSITY => zone.bloom.intensity = Some(reader.read_f32()?),
            zone_props::BLOOM_THRESHOLD => zone.bloom.threshold = Some(reader.read_f32()?),
            zone_props::BLOOM_SIZE => zone.bloom.size = Some(reader.read_f32()?),
            zone_props::TONEMAPPING_CURVE => zone.tonemapping.curve = Some(reader.read_u32()?),
            zone_props::TONEMAPPING_EXPOSURE => {
                zone.tonemapping.exposure = Some(reader.read_f32()?)
            }
            zone_props::FLYING_ALLOWED => zone.flying_allowed = Some(reader.read_bool()?),
            zone_props::GHOSTING_ALLOWED => zone.ghosting_allowed = Some(reader.read_bool()?),
            _ => return Err(EntityDataError::UnknownProperty(flag)),
        },
        TypedProperties::Web(web) => match flag {
            web_props::SOURCE_URL => web.source_url = Some(reader.read_string()?),
            web_props::DPI => web.dpi = Some(reader.read_u16()?),
            web_props::SCRIPT_URL => web.script_url = Some(reader.read_string()?),
            web_props::MAX_FPS => web.max_fps = Some(reader.read_u8()?),
            web_props::INPUT_MODE => web.input_mode = Some(reader.read_u32()?),
            _ => return Err(EntityDataError::UnknownProperty(flag)),
        },
        TypedProperties::Image(image) => match flag {
            image_props::IMAGE_URL => image.image_url = Some(reader.read_string()?),
            image_props::EMISSIVE => image.emissive = Some(reader.read_bool()?),
            image_props::KEEP_ASPECT_RATIO => image.keep_aspect_ratio = Some(reader.read_bool()?),
            image_props::SUB_IMAGE => image.sub_image = Some(reader.read_rect()?),
            _ => return Err(EntityDataError::UnknownProperty(flag)),
        },
        TypedProperties::Grid(grid) => match flag {
            grid_props::FOLLOW_CAMERA => grid.follow_camera = Some(reader.read_bool()?),
            grid_props::MAJOR_GRID_EVERY => grid.major_grid_every = Some(reader.read_u32()?),
            grid_props::MINOR_GRID_EVERY => grid.minor_grid_every = Some(reader.read_f32()?),
            _ => return Err(EntityDataError::UnknownProperty(flag)),
        },
        TypedProperties::Gizmo(gizmo) => match flag {
            gizmo_props::GIZMO_TYPE => gizmo.gizmo_type = Some(reader.read_u32()?),
            gizmo_props::RING_START_ANGLE => gizmo.ring.start_angle = Some(reader.read_f32()?),
            gizmo_props::RING_END_ANGLE => gizmo.ring.end_angle = Some(reader.read_f32()?),
            gizmo_props::RING_INNER_RADIUS => gizmo.ring.inner_radius = Some(reader.read_f32()?),
            gizmo_props::RING_INNER_START_COLOR => {
                gizmo.ring.inner_start_color = Some(reader.read_color()?)
            }
            gizmo_props::RING_INNER_END_COLOR => {
                gizmo.ring.inner_end_color = Some(reader.read_color()?)
            }
            gizmo_props::RING_OUTER_START_COLOR => {
                gizmo.ring.outer_start_color = Some(reader.read_color()?)
            }
            gizmo_props::RING_OUTER_END_COLOR => {
                gizmo.ring.outer_end_color = Some(reader.read_color()?)
            }
            gizmo_props::RING_HAS_TICK_MARKS => {
                gizmo.ring.has_tick_marks = Some(reader.read_bool()?)
            }
            _ => return Err(EntityDataError::UnknownProperty(flag)),
        },
        TypedProperties::Material(material) => match flag {
            material_props::MATERIAL_URL => material.material_url = Some(reader.read_string()?),
            material_props::MATERIAL_MAPPING_MODE => {
                material.material_mapping_mode = Some(reader.read_u32()?)
            }
            material_props::PRIORITY => material.priority = Some(reader.read_u16()?),
            material_props::PARENT_MATERIAL_NAME => {
                material.parent_material_name = Some(reader.read_string()?)
            }
            material_props::MATERIAL_MAPPING_POS => {
                material.material_mapping_pos = Some(reader.read_vec2()?)
            }
            material_props::MATERIAL_MAPPING_SCALE => {
                material.material_mapping_scale = Some(reader.read_vec2()?)
            }
            material_props::MATERIAL_MAPPING_ROT => {
                material.material_mapping_rot = Some(reader.read_f32()?)
            }
            material_props::MATERIAL_DATA => material.material_data = Some(reader.read_string()?),
            material_props::MATERIAL_REPEAT => material.material_repeat = Some(reader.read_bool()?),
            _ => return Err(EntityDataError::UnknownProperty(flag)),
        },
        TypedProperties::ParticleEffect(particles) => match flag {
            particle_props::MAX_PARTICLES => particles.max_particles = Some(reader.read_u32()?),
            particle_props::LIFESPAN => particles.lifespan = Some(reader.read_f32()?),
            particle_props::EMITTING_PARTICLES => {
                particles.emitting_particles = Some(reader.read_bool()?)
            }
            particle_props::EMIT_RATE => particles.emit_rate = Some(reader.read_f32()?),
            particle_props::EMIT_SPEED => particles.emit_speed = Some(reader.read_f32()?),
            particle_props::SPEED_SPREAD => particles.speed_spread = Some(reader.read_f32()?),
            particle_props::EMIT_ORIENTATION => {
                particles.emit_orientation = Some(reader.read_quat()?)
            }
            particle_props::EMIT_DIMENSIONS => {
                particles.emit_dimensions = Some(reader.read_vec3()?)
            }
            particle_props::EMIT_RADIUS_START => {
                particles.emit_radius_start = Some(reader.read_f32()?)
            }
            particle_props::EMIT_ACCELERATION => {
                particles.emit_acceleration = Some(reader.read_vec3()?)
            }
            particle_props::ACCELERATION_SPREAD => {
                particles.acceleration_spread = Some(reader.read_vec3()?)
            }
            particle_props::PARTICLE_RADIUS => particles.particle_radius = Some(reader.read_f32()?),
            particle_props::RADIUS_SPREAD => particles.radius_spread = Some(reader.read_f32()?),
            particle_props::RADIUS_START => particles.radius_start = Some(reader.read_f32()?),
            particle_props::RADIUS_FINISH => particles.radius_finish = Some(reader.read_f32()?),
            particle_props::COLOR_START => particles.color_start = Some(reader.read_color()?),
            particle_props::COLOR_FINISH => particles.color_finish = Some(reader.read_color()?),
            particle_props::ALPHA_START => particles.alpha_start = Some(reader.read_f32()?),
            particle_props::ALPHA_FINISH => particles.alpha_finish = Some(reader.read_f32()?),
            particle_props::EMITTER_SHOULD_TRAIL => {
                particles.emitter_should_trail = Some(reader.read_bool()?)
            }
            particle_props::ANIMATION_URL => particles.animation.url = Some(reader.read_string()?),
            particle_props::ANIMATION_ALLOW_TRANSLATION => {
                particles.animation.allow_translation = Some(reader.read_bool()?)
            }
            particle_props::ANIMATION_FPS => particles.animation.fps = Some(reader.read_f32()?),
            particle_props::ANIMATION_FRAME_INDEX => {
                particles.animation.frame_index = Some(reader.read_f32()?)
            }
            particle_props::ANIMATION_PLAYING => {
                particles.animation.playing = Some(reader.read_bool()?)
            }
            particle_props::ANIMATION_LOOP => {
                particles.animation.looping = Some(reader.read_bool()?)
            }
            particle_props::ANIMATION_FIRST_FRAME => {
                particles.animation.first_frame = Some(reader.read_f32()?)
            }
            particle_props::ANIMATION_LAST_FRAME => {
                particles.animation.last_frame = Some(reader.read_f32()?)
            }
            particle_props::ANIMATION_HOLD => particles.animation.hold = Some(reader.read_bool()?),
            _ => return Err(EntityDataError::UnknownProperty(flag)),
        },
        TypedProperties::PolyLine(polyline) => match flag {
            polyline_props::LINE_POINTS => polyline.line_points = Some(reader.read_vec3_array()?),
            polyline_props::STROKE_NORMALS => {
                polyline.stroke_normals = Some(reader.read_vec3_array()?)
            }
            polyline_props::STROKE_COLORS => {
                polyline.stroke_colors = Some(reader.read_vec3_array()?)
            }
            polyline_props::IS_UV_MODE_STRETCH => {
                polyline.is_uv_mode_stretch = Some(reader.read_bool()?)
            }
            polyline_props::GLOW => polyline.glow = Some(reader.read_bool()?),
            polyline_props::FACE_CAMERA => polyline.face_camera = Some(reader.read_bool()?),
            _ => return Err(EntityDataError::UnknownProperty(flag)),
        },
        TypedProperties::PolyVox(polyvox) => match flag {
            polyvox_props::VOXEL_VOLUME_SIZE => {
                polyvox.voxel_volume_size = Some(reader.read_vec3()?)
            }
            polyvox_props::VOXEL_DATA => polyvox.voxel_data = Some(reader.read_byte_array()?),
            polyvox_props::VOXEL_SURFACE_STYLE => {
                polyvox.voxel_surface_style = Some(reader.read_u16()?)
            }
            polyvox_props::X_TEXTURE_URL => polyvox.x_texture_url = Some(reader.read_string()?),
            polyvox_props::Y_TEXTURE_URL => polyvox.y_texture_url = Some(reader.read_string()?),
            polyvox_props::Z_TEXTURE_URL => polyvox.z_texture_url = Some(reader.read_string()?),
            _ => return Err(EntityDataError::UnknownProperty(flag)),
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Color;
    use glam::Vec3;

    fn box_edit_properties() -> EntityProperties {
        let mut props = EntityProperties::new(EntityType::Box);
        props.color = Some(Color::new(240, 37, 148));
        props.last_edited_by = Some("a82f40b6-ee89-46cc-b504-02b88d72a546".parse().unwrap());
        props
    }

    #[test]
    fn full_fit_round_trip() {
        let entity_id: Uuid = "b71d5380-2fcc-4833-93a7-9a4967017587".parse().unwrap();
        let props = box_edit_properties();
        let mut buf = [0u8; 1024];

        let result = encode_entity_edit(&mut buf, entity_id, 1_688_896_885_851_574, &props);
        assert_eq!(result.append_state, AppendState::Completed);
        assert!(result.didnt_fit.is_empty());

        let message = decode_entity_edit(&buf[..result.bytes_written]).unwrap();
        assert_eq!(message.entity_id, entity_id);
        assert_eq!(message.last_edited, 1_688_896_885_851_574);
        assert_eq!(message.properties, props);
    }

    #[test]
    fn typed_properties_round_trip() {
        let mut props = EntityProperties::new(EntityType::Model);
        props.position = Some(Vec3::new(1.0, 2.0, 3.0));
        if let TypedProperties::Model(model) = &mut props.typed {
            model.model_url = Some("https://assets.example/tree.glb".into());
            model.animation.playing = Some(true);
            model.animation.fps = Some(30.0);
        }

        let entity_id = Uuid::new_v4();
        let mut buf = [0u8; 1024];
        let result = encode_entity_edit(&mut buf, entity_id, 7, &props);
        assert_eq!(result.append_state, AppendState::Completed);

        let message = decode_entity_edit(&buf[..result.bytes_written]).unwrap();
        assert_eq!(message.properties, props);
    }

    #[test]
    fn entity_stream_round_trip() {
        let mut zone = EntityProperties::new(EntityType::Zone);
        if let TypedProperties::Zone(props) = &mut zone.typed {
            props.skybox.url = Some("https://assets.example/sky.jpg".into());
            props.flying_allowed = Some(true);
        }
        let records = vec![
            (Uuid::new_v4(), 10, box_edit_properties()),
            (Uuid::new_v4(), 20, zone),
        ];

        let bytes = encode_entity_stream(&records, 1024);
        let decoded = decode_entity_stream(&bytes).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].properties, records[0].2);
        assert_eq!(decoded[1].properties, records[1].2);
        assert_eq!(decoded[1].last_edited, 20);
    }

    #[test]
    fn flags_for_unknown_slots_fail_decode() {
        let mut props = EntityProperties::new(EntityType::Box);
        props.color = Some(Color::new(1, 2, 3));
        props.last_edited_by = Some(Uuid::new_v4());
        let mut buf = [0u8; 256];
        let result = encode_entity_edit(&mut buf, Uuid::new_v4(), 1, &props);

        // Corrupt the flag block: claim a reserved local-only slot (77),
        // which no entity block serializes. It sits at bit header+77 of the
        // 13-byte block.
        let flags_offset = 1 + 8 + 16 + 1 + 1;
        let bit = 13 + 77;
        buf[flags_offset + bit / 8] |= 0x80 >> (bit % 8);
        let err = decode_entity_edit(&buf[..result.bytes_written]).unwrap_err();
        assert_eq!(err, EntityDataError::UnknownProperty(77));
    }
}
