//! Entity types and the property bag an edit is described with.
//!
//! A property bag carries only the fields the caller supplied; everything is
//! optional and only supplied fields are flagged and serialized. Property
//! groups (grab, pulse, animation, the zone lighting groups, the gizmo ring)
//! are nested sub-records whose fields occupy their own flag positions.

use glam::{Quat, Vec2, Vec3};
use uuid::Uuid;

use crate::properties::{
    common_props, gizmo_props, grid_props, image_props, light_props, material_props, model_props,
    particle_props, polyline_props, polyvox_props, shape_props, text_props, web_props,
    zone_props,
};
use crate::property_flags::PropertyFlags;

/// Entity type discriminants, byte-count-coded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EntityType {
    Unknown = 0,
    Box = 1,
    Sphere = 2,
    Shape = 3,
    Model = 4,
    Text = 5,
    Image = 6,
    Web = 7,
    ParticleEffect = 8,
    Line = 9,
    PolyLine = 10,
    PolyVox = 11,
    Grid = 12,
    Gizmo = 13,
    Light = 14,
    Zone = 15,
    Material = 16,
}

impl EntityType {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => EntityType::Unknown,
            1 => EntityType::Box,
            2 => EntityType::Sphere,
            3 => EntityType::Shape,
            4 => EntityType::Model,
            5 => EntityType::Text,
            6 => EntityType::Image,
            7 => EntityType::Web,
            8 => EntityType::ParticleEffect,
            9 => EntityType::Line,
            10 => EntityType::PolyLine,
            11 => EntityType::PolyVox,
            12 => EntityType::Grid,
            13 => EntityType::Gizmo,
            14 => EntityType::Light,
            15 => EntityType::Zone,
            16 => EntityType::Material,
            _ => return None,
        })
    }
}

/// An RGB color, three bytes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Color {
    pub fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }
}

/// An integer rectangle, four i32s on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// An axis-aligned cube: corner plus edge length.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AaCube {
    pub corner: Vec3,
    pub scale: f32,
}

/// Grab behavior, shared-block flag positions 28..=40.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GrabProperties {
    pub grabbable: Option<bool>,
    pub kinematic: Option<bool>,
    pub follows_controller: Option<bool>,
    pub triggerable: Option<bool>,
    pub equippable: Option<bool>,
    pub delegate_to_parent: Option<bool>,
    pub left_equippable_position_offset: Option<Vec3>,
    pub left_equippable_rotation_offset: Option<Quat>,
    pub right_equippable_position_offset: Option<Vec3>,
    pub right_equippable_rotation_offset: Option<Quat>,
    pub equippable_indicator_url: Option<String>,
    pub equippable_indicator_scale: Option<Vec3>,
    pub equippable_indicator_offset: Option<Vec3>,
}

impl GrabProperties {
    fn changed_properties(&self, flags: &mut PropertyFlags) {
        use common_props::*;
        set_if(flags, GRAB_GRABBABLE, self.grabbable.is_some());
        set_if(flags, GRAB_KINEMATIC, self.kinematic.is_some());
        set_if(flags, GRAB_FOLLOWS_CONTROLLER, self.follows_controller.is_some());
        set_if(flags, GRAB_TRIGGERABLE, self.triggerable.is_some());
        set_if(flags, GRAB_EQUIPPABLE, self.equippable.is_some());
        set_if(flags, GRAB_DELEGATE_TO_PARENT, self.delegate_to_parent.is_some());
        set_if(
            flags,
            GRAB_LEFT_EQUIPPABLE_POSITION_OFFSET,
            self.left_equippable_position_offset.is_some(),
        );
        set_if(
            flags,
            GRAB_LEFT_EQUIPPABLE_ROTATION_OFFSET,
            self.left_equippable_rotation_offset.is_some(),
        );
        set_if(
            flags,
            GRAB_RIGHT_EQUIPPABLE_POSITION_OFFSET,
            self.right_equippable_position_offset.is_some(),
        );
        set_if(
            flags,
            GRAB_RIGHT_EQUIPPABLE_ROTATION_OFFSET,
            self.right_equippable_rotation_offset.is_some(),
        );
        set_if(
            flags,
            GRAB_EQUIPPABLE_INDICATOR_URL,
            self.equippable_indicator_url.is_some(),
        );
        set_if(
            flags,
            GRAB_EQUIPPABLE_INDICATOR_SCALE,
            self.equippable_indicator_scale.is_some(),
        );
        set_if(
            flags,
            GRAB_EQUIPPABLE_INDICATOR_OFFSET,
            self.equippable_indicator_offset.is_some(),
        );
    }
}

/// Color/alpha pulsing, shared-block flag positions 86..=90.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PulseProperties {
    pub min: Option<f32>,
    pub max: Option<f32>,
    pub period: Option<f32>,
    pub color_mode: Option<u32>,
    pub alpha_mode: Option<u32>,
}

impl PulseProperties {
    fn changed_properties(&self, flags: &mut PropertyFlags) {
        use common_props::*;
        set_if(flags, PULSE_MIN, self.min.is_some());
        set_if(flags, PULSE_MAX, self.max.is_some());
        set_if(flags, PULSE_PERIOD, self.period.is_some());
        set_if(flags, PULSE_COLOR_MODE, self.color_mode.is_some());
        set_if(flags, PULSE_ALPHA_MODE, self.alpha_mode.is_some());
    }
}

/// Keyframe animation, used by Model and ParticleEffect entities. The flag
/// positions differ per host type, so the base slot is a parameter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnimationProperties {
    pub url: Option<String>,
    pub allow_translation: Option<bool>,
    pub fps: Option<f32>,
    pub frame_index: Option<f32>,
    pub playing: Option<bool>,
    pub looping: Option<bool>,
    pub first_frame: Option<f32>,
    pub last_frame: Option<f32>,
    pub hold: Option<bool>,
}

impl AnimationProperties {
    fn changed_properties(&self, flags: &mut PropertyFlags, base: u16) {
        set_if(flags, base, self.url.is_some());
        set_if(flags, base + 1, self.allow_translation.is_some());
        set_if(flags, base + 2, self.fps.is_some());
        set_if(flags, base + 3, self.frame_index.is_some());
        set_if(flags, base + 4, self.playing.is_some());
        set_if(flags, base + 5, self.looping.is_some());
        set_if(flags, base + 6, self.first_frame.is_some());
        set_if(flags, base + 7, self.last_frame.is_some());
        set_if(flags, base + 8, self.hold.is_some());
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeylightProperties {
    pub color: Option<Color>,
    pub intensity: Option<f32>,
    pub direction: Option<Vec3>,
    pub cast_shadows: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AmbientLightProperties {
    pub intensity: Option<f32>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkyboxProperties {
    pub color: Option<Color>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HazeProperties {
    pub range: Option<f32>,
    pub color: Option<Color>,
    pub glare_color: Option<Color>,
    pub background_blend: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BloomProperties {
    pub intensity: Option<f32>,
    pub threshold: Option<f32>,
    pub size: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TonemappingProperties {
    pub curve: Option<u32>,
    pub exposure: Option<f32>,
}

/// Ring geometry of a Gizmo entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RingProperties {
    pub start_angle: Option<f32>,
    pub end_angle: Option<f32>,
    pub inner_radius: Option<f32>,
    pub inner_start_color: Option<Color>,
    pub inner_end_color: Option<Color>,
    pub outer_start_color: Option<Color>,
    pub outer_end_color: Option<Color>,
    pub has_tick_marks: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapeProperties {
    pub shape: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelProperties {
    pub model_url: Option<String>,
    pub model_scale: Option<Vec3>,
    pub group_culled: Option<bool>,
    pub animation: AnimationProperties,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LightProperties {
    pub is_spotlight: Option<bool>,
    pub intensity: Option<f32>,
    pub exponent: Option<f32>,
    pub cutoff: Option<f32>,
    pub falloff_radius: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextProperties {
    pub text: Option<String>,
    pub line_height: Option<f32>,
    pub text_color: Option<Color>,
    pub text_alpha: Option<f32>,
    pub background_color: Option<Color>,
    pub background_alpha: Option<f32>,
    pub unlit: Option<bool>,
    pub font: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZoneProperties {
    pub keylight: KeylightProperties,
    pub ambient_light: AmbientLightProperties,
    pub skybox: SkyboxProperties,
    pub haze: HazeProperties,
    pub bloom: BloomProperties,
    pub tonemapping: TonemappingProperties,
    pub flying_allowed: Option<bool>,
    pub ghosting_allowed: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WebProperties {
    pub source_url: Option<String>,
    pub dpi: Option<u16>,
    pub script_url: Option<String>,
    pub max_fps: Option<u8>,
    pub input_mode: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageProperties {
    pub image_url: Option<String>,
    pub emissive: Option<bool>,
    pub keep_aspect_ratio: Option<bool>,
    pub sub_image: Option<Rect>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridProperties {
    pub follow_camera: Option<bool>,
    pub major_grid_every: Option<u32>,
    pub minor_grid_every: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GizmoProperties {
    pub gizmo_type: Option<u32>,
    pub ring: RingProperties,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialProperties {
    pub material_url: Option<String>,
    pub material_mapping_mode: Option<u32>,
    pub priority: Option<u16>,
    pub parent_material_name: Option<String>,
    pub material_mapping_pos: Option<Vec2>,
    pub material_mapping_scale: Option<Vec2>,
    pub material_mapping_rot: Option<f32>,
    pub material_data: Option<String>,
    pub material_repeat: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParticleEffectProperties {
    pub max_particles: Option<u32>,
    pub lifespan: Option<f32>,
    pub emitting_particles: Option<bool>,
    pub emit_rate: Option<f32>,
    pub emit_speed: Option<f32>,
    pub speed_spread: Option<f32>,
    pub emit_orientation: Option<Quat>,
    pub emit_dimensions: Option<Vec3>,
    pub emit_radius_start: Option<f32>,
    pub emit_acceleration: Option<Vec3>,
    pub acceleration_spread: Option<Vec3>,
    pub particle_radius: Option<f32>,
    pub radius_spread: Option<f32>,
    pub radius_start: Option<f32>,
    pub radius_finish: Option<f32>,
    pub color_start: Option<Color>,
    pub color_finish: Option<Color>,
    pub alpha_start: Option<f32>,
    pub alpha_finish: Option<f32>,
    pub emitter_should_trail: Option<bool>,
    pub animation: AnimationProperties,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolyLineProperties {
    pub line_points: Option<Vec<Vec3>>,
    pub stroke_normals: Option<Vec<Vec3>>,
    pub stroke_colors: Option<Vec<Vec3>>,
    pub is_uv_mode_stretch: Option<bool>,
    pub glow: Option<bool>,
    pub face_camera: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolyVoxProperties {
    pub voxel_volume_size: Option<Vec3>,
    pub voxel_data: Option<Vec<u8>>,
    pub voxel_surface_style: Option<u16>,
    pub x_texture_url: Option<String>,
    pub y_texture_url: Option<String>,
    pub z_texture_url: Option<String>,
}

/// Per-entity-type sub-record. Box, Sphere, Shape and Line all use the
/// Shape record; Unknown has no typed block.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedProperties {
    None,
    Shape(ShapeProperties),
    Model(ModelProperties),
    Light(LightProperties),
    Text(TextProperties),
    Zone(ZoneProperties),
    Web(WebProperties),
    Image(ImageProperties),
    Grid(GridProperties),
    Gizmo(GizmoProperties),
    Material(MaterialProperties),
    ParticleEffect(ParticleEffectProperties),
    PolyLine(PolyLineProperties),
    PolyVox(PolyVoxProperties),
}

impl TypedProperties {
    pub fn for_type(entity_type: EntityType) -> Self {
        match entity_type {
            EntityType::Unknown => TypedProperties::None,
            EntityType::Box | EntityType::Sphere | EntityType::Shape | EntityType::Line => {
                TypedProperties::Shape(ShapeProperties::default())
            }
            EntityType::Model => TypedProperties::Model(ModelProperties::default()),
            EntityType::Light => TypedProperties::Light(LightProperties::default()),
            EntityType::Text => TypedProperties::Text(TextProperties::default()),
            EntityType::Zone => TypedProperties::Zone(ZoneProperties::default()),
            EntityType::Web => TypedProperties::Web(WebProperties::default()),
            EntityType::Image => TypedProperties::Image(ImageProperties::default()),
            EntityType::Grid => TypedProperties::Grid(GridProperties::default()),
            EntityType::Gizmo => TypedProperties::Gizmo(GizmoProperties::default()),
            EntityType::Material => TypedProperties::Material(MaterialProperties::default()),
            EntityType::ParticleEffect => {
                TypedProperties::ParticleEffect(ParticleEffectProperties::default())
            }
            EntityType::PolyLine => TypedProperties::PolyLine(PolyLineProperties::default()),
            EntityType::PolyVox => TypedProperties::PolyVox(PolyVoxProperties::default()),
        }
    }

    fn changed_properties(&self, flags: &mut PropertyFlags) {
        match self {
            TypedProperties::None => {}
            TypedProperties::Shape(shape) => {
                set_if(flags, shape_props::SHAPE, shape.shape.is_some());
            }
            TypedProperties::Model(model) => {
                use model_props::*;
                set_if(flags, MODEL_URL, model.model_url.is_some());
                set_if(flags, MODEL_SCALE, model.model_scale.is_some());
                set_if(flags, GROUP_CULLED, model.group_culled.is_some());
                model.animation.changed_properties(flags, ANIMATION_URL);
            }
            TypedProperties::Light(light) => {
                use light_props::*;
                set_if(flags, IS_SPOTLIGHT, light.is_spotlight.is_some());
                set_if(flags, INTENSITY, light.intensity.is_some());
                set_if(flags, EXPONENT, light.exponent.is_some());
                set_if(flags, CUTOFF, light.cutoff.is_some());
                set_if(flags, FALLOFF_RADIUS, light.falloff_radius.is_some());
            }
            TypedProperties::Text(text) => {
                use text_props::*;
                set_if(flags, TEXT, text.text.is_some());
                set_if(flags, LINE_HEIGHT, text.line_height.is_some());
                set_if(flags, TEXT_COLOR, text.text_color.is_some());
                set_if(flags, TEXT_ALPHA, text.text_alpha.is_some());
                set_if(flags, BACKGROUND_COLOR, text.background_color.is_some());
                set_if(flags, BACKGROUND_ALPHA, text.background_alpha.is_some());
                set_if(flags, UNLIT, text.unlit.is_some());
                set_if(flags, FONT, text.font.is_some());
            }
            TypedProperties::Zone(zone) => {
                use zone_props::*;
                set_if(flags, KEYLIGHT_COLOR, zone.keylight.color.is_some());
                set_if(flags, KEYLIGHT_INTENSITY, zone.keylight.intensity.is_some());
                set_if(flags, KEYLIGHT_DIRECTION, zone.keylight.direction.is_some());
                set_if(flags, KEYLIGHT_CAST_SHADOWS, zone.keylight.cast_shadows.is_some());
                set_if(flags, AMBIENT_LIGHT_INTENSITY, zone.ambient_light.intensity.is_some());
                set_if(flags, AMBIENT_LIGHT_URL, zone.ambient_light.url.is_some());
                set_if(flags, SKYBOX_COLOR, zone.skybox.color.is_some());
                set_if(flags, SKYBOX_URL, zone.skybox.url.is_some());
                set_if(flags, HAZE_RANGE, zone.haze.range.is_some());
                set_if(flags, HAZE_COLOR, zone.haze.color.is_some());
                set_if(flags, HAZE_GLARE_COLOR, zone.haze.glare_color.is_some());
                set_if(flags, HAZE_BACKGROUND_BLEND, zone.haze.background_blend.is_some());
                set_if(flags, BLOOM_INTENSITY, zone.bloom.intensity.is_some());
                set_if(flags, BLOOM_THRESHOLD, zone.bloom.threshold.is_some());
                set_if(flags, BLOOM_SIZE, zone.bloom.size.is_some());
                set_if(flags, TONEMAPPING_CURVE, zone.tonemapping.curve.is_some());
                set_if(flags, TONEMAPPING_EXPOSURE, zone.tonemapping.exposure.is_some());
                set_if(flags, FLYING_ALLOWED, zone.flying_allowed.is_some());
                set_if(flags, GHOSTING_ALLOWED, zone.ghosting_allowed.is_some());
            }
            TypedProperties::Web(web) => {
                use web_props::*;
                set_if(flags, SOURCE_URL, web.source_url.is_some());
                set_if(flags, DPI, web.dpi.is_some());
                set_if(flags, SCRIPT_URL, web.script_url.is_some());
                set_if(flags, MAX_FPS, web.max_fps.is_some());
                set_if(flags, INPUT_MODE, web.input_mode.is_some());
            }
            TypedProperties::Image(image) => {
                use image_props::*;
                set_if(flags, IMAGE_URL, image.image_url.is_some());
                set_if(flags, EMISSIVE, image.emissive.is_some());
                set_if(flags, KEEP_ASPECT_RATIO, image.keep_aspect_ratio.is_some());
                set_if(flags, SUB_IMAGE, image.sub_image.is_some());
            }
            TypedProperties::Grid(grid) => {
                use grid_props::*;
                set_if(flags, FOLLOW_CAMERA, grid.follow_camera.is_some());
                set_if(flags, MAJOR_GRID_EVERY, grid.major_grid_every.is_some());
                set_if(flags, MINOR_GRID_EVERY, grid.minor_grid_every.is_some());
            }
            TypedProperties::Gizmo(gizmo) => {
                use gizmo_props::*;
                set_if(flags, GIZMO_TYPE, gizmo.gizmo_type.is_some());
                set_if(flags, RING_START_ANGLE, gizmo.ring.start_angle.is_some());
                set_if(flags, RING_END_ANGLE, gizmo.ring.end_angle.is_some());
                set_if(flags, RING_INNER_RADIUS, gizmo.ring.inner_radius.is_some());
                set_if(flags, RING_INNER_START_COLOR, gizmo.ring.inner_start_color.is_some());
                set_if(flags, RING_INNER_END_COLOR, gizmo.ring.inner_end_color.is_some());
                set_if(flags, RING_OUTER_START_COLOR, gizmo.ring.outer_start_color.is_some());
                set_if(flags, RING_OUTER_END_COLOR, gizmo.ring.outer_end_color.is_some());
                set_if(flags, RING_HAS_TICK_MARKS, gizmo.ring.has_tick_marks.is_some());
            }
            TypedProperties::Material(material) => {
                use material_props::*;
                set_if(flags, MATERIAL_URL, material.material_url.is_some());
                set_if(flags, MATERIAL_MAPPING_MODE, material.material_mapping_mode.is_some());
                set_if(flags, PRIORITY, material.priority.is_some());
                set_if(flags, PARENT_MATERIAL_NAME, material.parent_material_name.is_some());
                set_if(flags, MATERIAL_MAPPING_POS, material.material_mapping_pos.is_some());
                set_if(flags, MATERIAL_MAPPING_SCALE, material.material_mapping_scale.is_some());
                set_if(flags, MATERIAL_MAPPING_ROT, material.material_mapping_rot.is_some());
                set_if(flags, MATERIAL_DATA, material.material_data.is_some());
                set_if(flags, MATERIAL_REPEAT, material.material_repeat.is_some());
            }
            TypedProperties::ParticleEffect(particles) => {
                use particle_props::*;
                set_if(flags, MAX_PARTICLES, particles.max_particles.is_some());
                set_if(flags, LIFESPAN, particles.lifespan.is_some());
                set_if(flags, EMITTING_PARTICLES, particles.emitting_particles.is_some());
                set_if(flags, EMIT_RATE, particles.emit_rate.is_some());
                set_if(flags, EMIT_SPEED, particles.emit_speed.is_some());
                set_if(flags, SPEED_SPREAD, particles.speed_spread.is_some());
                set_if(flags, EMIT_ORIENTATION, particles.emit_orientation.is_some());
                set_if(flags, EMIT_DIMENSIONS, particles.emit_dimensions.is_some());
                set_if(flags, EMIT_RADIUS_START, particles.emit_radius_start.is_some());
                set_if(flags, EMIT_ACCELERATION, particles.emit_acceleration.is_some());
                set_if(flags, ACCELERATION_SPREAD, particles.acceleration_spread.is_some());
                set_if(flags, PARTICLE_RADIUS, particles.particle_radius.is_some());
                set_if(flags, RADIUS_SPREAD, particles.radius_spread.is_some());
                set_if(flags, RADIUS_START, particles.radius_start.is_some());
                set_if(flags, RADIUS_FINISH, particles.radius_finish.is_some());
                set_if(flags, COLOR_START, particles.color_start.is_some());
                set_if(flags, COLOR_FINISH, particles.color_finish.is_some());
                set_if(flags, ALPHA_START, particles.alpha_start.is_some());
                set_if(flags, ALPHA_FINISH, particles.alpha_finish.is_some());
                set_if(flags, EMITTER_SHOULD_TRAIL, particles.emitter_should_trail.is_some());
                particles.animation.changed_properties(flags, ANIMATION_URL);
            }
            TypedProperties::PolyLine(polyline) => {
                use polyline_props::*;
                set_if(flags, LINE_POINTS, polyline.line_points.is_some());
                set_if(flags, STROKE_NORMALS, polyline.stroke_normals.is_some());
                set_if(flags, STROKE_COLORS, polyline.stroke_colors.is_some());
                set_if(flags, IS_UV_MODE_STRETCH, polyline.is_uv_mode_stretch.is_some());
                set_if(flags, GLOW, polyline.glow.is_some());
                set_if(flags, FACE_CAMERA, polyline.face_camera.is_some());
            }
            TypedProperties::PolyVox(polyvox) => {
                use polyvox_props::*;
                set_if(flags, VOXEL_VOLUME_SIZE, polyvox.voxel_volume_size.is_some());
                set_if(flags, VOXEL_DATA, polyvox.voxel_data.is_some());
                set_if(flags, VOXEL_SURFACE_STYLE, polyvox.voxel_surface_style.is_some());
                set_if(flags, X_TEXTURE_URL, polyvox.x_texture_url.is_some());
                set_if(flags, Y_TEXTURE_URL, polyvox.y_texture_url.is_some());
                set_if(flags, Z_TEXTURE_URL, polyvox.z_texture_url.is_some());
            }
        }
    }
}

/// The full candidate property bag for one entity edit.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityProperties {
    pub entity_type: EntityType,

    pub simulation_owner: Option<Vec<u8>>,
    pub parent_id: Option<Uuid>,
    pub parent_joint_index: Option<u16>,
    pub visible: Option<bool>,
    pub name: Option<String>,
    pub locked: Option<bool>,
    pub user_data: Option<String>,
    pub private_user_data: Option<String>,
    pub href: Option<String>,
    pub description: Option<String>,
    pub position: Option<Vec3>,
    pub dimensions: Option<Vec3>,
    pub rotation: Option<Quat>,
    pub registration_point: Option<Vec3>,
    pub created: Option<u64>,
    pub last_edited_by: Option<Uuid>,
    pub query_aa_cube: Option<AaCube>,
    pub can_cast_shadow: Option<bool>,
    pub render_layer: Option<u32>,
    pub primitive_mode: Option<u32>,
    pub ignore_pick_intersection: Option<bool>,
    pub render_with_zones: Option<Vec<Uuid>>,
    pub billboard_mode: Option<u32>,
    pub grab: GrabProperties,

    pub density: Option<f32>,
    pub velocity: Option<Vec3>,
    pub angular_velocity: Option<Vec3>,
    pub gravity: Option<Vec3>,
    pub acceleration: Option<Vec3>,
    pub damping: Option<f32>,
    pub angular_damping: Option<f32>,
    pub restitution: Option<f32>,
    pub friction: Option<f32>,
    pub lifetime: Option<f32>,
    pub collisionless: Option<bool>,
    pub collision_mask: Option<u16>,
    pub dynamic: Option<bool>,
    pub collision_sound_url: Option<String>,
    pub action_data: Option<Vec<u8>>,

    pub cloneable: Option<bool>,
    pub clone_lifetime: Option<f32>,
    pub clone_limit: Option<f32>,
    pub clone_dynamic: Option<bool>,
    pub clone_avatar_entity: Option<bool>,
    pub clone_origin_id: Option<Uuid>,

    pub script: Option<String>,
    pub script_timestamp: Option<u64>,
    pub server_scripts: Option<String>,

    pub shape_type: Option<u32>,
    pub compound_shape_url: Option<String>,
    pub color: Option<Color>,
    pub alpha: Option<f32>,
    pub pulse: PulseProperties,
    pub textures: Option<String>,

    pub typed: TypedProperties,
}

impl EntityProperties {
    /// An empty bag for the given entity type.
    pub fn new(entity_type: EntityType) -> Self {
        Self {
            entity_type,
            simulation_owner: None,
            parent_id: None,
            parent_joint_index: None,
            visible: None,
            name: None,
            locked: None,
            user_data: None,
            private_user_data: None,
            href: None,
            description: None,
            position: None,
            dimensions: None,
            rotation: None,
            registration_point: None,
            created: None,
            last_edited_by: None,
            query_aa_cube: None,
            can_cast_shadow: None,
            render_layer: None,
            primitive_mode: None,
            ignore_pick_intersection: None,
            render_with_zones: None,
            billboard_mode: None,
            grab: GrabProperties::default(),
            density: None,
            velocity: None,
            angular_velocity: None,
            gravity: None,
            acceleration: None,
            damping: None,
            angular_damping: None,
            restitution: None,
            friction: None,
            lifetime: None,
            collisionless: None,
            collision_mask: None,
            dynamic: None,
            collision_sound_url: None,
            action_data: None,
            cloneable: None,
            clone_lifetime: None,
            clone_limit: None,
            clone_dynamic: None,
            clone_avatar_entity: None,
            clone_origin_id: None,
            script: None,
            script_timestamp: None,
            server_scripts: None,
            shape_type: None,
            compound_shape_url: None,
            color: None,
            alpha: None,
            pulse: PulseProperties::default(),
            textures: None,
            typed: TypedProperties::for_type(entity_type),
        }
    }

    /// Flags every property the caller supplied, deep-walking the groups and
    /// the per-type sub-record.
    pub fn changed_properties(&self) -> PropertyFlags {
        use common_props::*;
        let mut flags = PropertyFlags::new();

        set_if(&mut flags, SIMULATION_OWNER, self.simulation_owner.is_some());
        set_if(&mut flags, PARENT_ID, self.parent_id.is_some());
        set_if(&mut flags, PARENT_JOINT_INDEX, self.parent_joint_index.is_some());
        set_if(&mut flags, VISIBLE, self.visible.is_some());
        set_if(&mut flags, NAME, self.name.is_some());
        set_if(&mut flags, LOCKED, self.locked.is_some());
        set_if(&mut flags, USER_DATA, self.user_data.is_some());
        set_if(&mut flags, PRIVATE_USER_DATA, self.private_user_data.is_some());
        set_if(&mut flags, HREF, self.href.is_some());
        set_if(&mut flags, DESCRIPTION, self.description.is_some());
        set_if(&mut flags, POSITION, self.position.is_some());
        set_if(&mut flags, DIMENSIONS, self.dimensions.is_some());
        set_if(&mut flags, ROTATION, self.rotation.is_some());
        set_if(&mut flags, REGISTRATION_POINT, self.registration_point.is_some());
        set_if(&mut flags, CREATED, self.created.is_some());
        set_if(&mut flags, LAST_EDITED_BY, self.last_edited_by.is_some());
        set_if(&mut flags, QUERY_AA_CUBE, self.query_aa_cube.is_some());
        set_if(&mut flags, CAN_CAST_SHADOW, self.can_cast_shadow.is_some());
        set_if(&mut flags, RENDER_LAYER, self.render_layer.is_some());
        set_if(&mut flags, PRIMITIVE_MODE, self.primitive_mode.is_some());
        set_if(&mut flags, IGNORE_PICK_INTERSECTION, self.ignore_pick_intersection.is_some());
        set_if(&mut flags, RENDER_WITH_ZONES, self.render_with_zones.is_some());
        set_if(&mut flags, BILLBOARD_MODE, self.billboard_mode.is_some());
        self.grab.changed_properties(&mut flags);

        set_if(&mut flags, DENSITY, self.density.is_some());
        set_if(&mut flags, VELOCITY, self.velocity.is_some());
        set_if(&mut flags, ANGULAR_VELOCITY, self.angular_velocity.is_some());
        set_if(&mut flags, GRAVITY, self.gravity.is_some());
        set_if(&mut flags, ACCELERATION, self.acceleration.is_some());
        set_if(&mut flags, DAMPING, self.damping.is_some());
        set_if(&mut flags, ANGULAR_DAMPING, self.angular_damping.is_some());
        set_if(&mut flags, RESTITUTION, self.restitution.is_some());
        set_if(&mut flags, FRICTION, self.friction.is_some());
        set_if(&mut flags, LIFETIME, self.lifetime.is_some());
        set_if(&mut flags, COLLISIONLESS, self.collisionless.is_some());
        set_if(&mut flags, COLLISION_MASK, self.collision_mask.is_some());
        set_if(&mut flags, DYNAMIC, self.dynamic.is_some());
        set_if(&mut flags, COLLISION_SOUND_URL, self.collision_sound_url.is_some());
        set_if(&mut flags, ACTION_DATA, self.action_data.is_some());

        set_if(&mut flags, CLONEABLE, self.cloneable.is_some());
        set_if(&mut flags, CLONE_LIFETIME, self.clone_lifetime.is_some());
        set_if(&mut flags, CLONE_LIMIT, self.clone_limit.is_some());
        set_if(&mut flags, CLONE_DYNAMIC, self.clone_dynamic.is_some());
        set_if(&mut flags, CLONE_AVATAR_ENTITY, self.clone_avatar_entity.is_some());
        set_if(&mut flags, CLONE_ORIGIN_ID, self.clone_origin_id.is_some());

        set_if(&mut flags, SCRIPT, self.script.is_some());
        set_if(&mut flags, SCRIPT_TIMESTAMP, self.script_timestamp.is_some());
        set_if(&mut flags, SERVER_SCRIPTS, self.server_scripts.is_some());

        set_if(&mut flags, SHAPE_TYPE, self.shape_type.is_some());
        set_if(&mut flags, COMPOUND_SHAPE_URL, self.compound_shape_url.is_some());
        set_if(&mut flags, COLOR, self.color.is_some());
        set_if(&mut flags, ALPHA, self.alpha.is_some());
        self.pulse.changed_properties(&mut flags);
        set_if(&mut flags, TEXTURES, self.textures.is_some());

        self.typed.changed_properties(&mut flags);
        flags
    }
}

fn set_if(flags: &mut PropertyFlags, id: u16, supplied: bool) {
    if supplied {
        flags.set_has_property(id, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_bag_has_no_changed_properties() {
        let props = EntityProperties::new(EntityType::Box);
        assert!(props.changed_properties().is_empty());
    }

    #[test]
    fn supplied_fields_are_flagged() {
        let mut props = EntityProperties::new(EntityType::Box);
        props.color = Some(Color::new(240, 37, 148));
        props.last_edited_by = Some(Uuid::new_v4());

        let flags = props.changed_properties();
        assert!(flags.get_has_property(common_props::COLOR));
        assert!(flags.get_has_property(common_props::LAST_EDITED_BY));
        assert_eq!(flags.iter().count(), 2);
    }

    #[test]
    fn group_fields_occupy_their_own_slots() {
        let mut props = EntityProperties::new(EntityType::Model);
        if let TypedProperties::Model(model) = &mut props.typed {
            model.animation.fps = Some(30.0);
        }
        let flags = props.changed_properties();
        assert!(flags.get_has_property(model_props::ANIMATION_FPS));
        assert_eq!(flags.iter().count(), 1);
    }
}
