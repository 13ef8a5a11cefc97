//! The closed enumeration of entity property codes.
//!
//! Indices 0..=91 form the shared block every entity type understands;
//! 92..=126 are thirty-five derived slots that each entity type overlays
//! with its own meanings (see the per-type alias modules below). A flag
//! block on the wire is therefore only interpretable next to the entity
//! type it was encoded for.

/// Property codes for the shared block plus the derived slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum EntityPropertyId {
    PagedProperties = 0,
    CustomPropertiesIncluded = 1,
    SimulationOwner = 2,
    ParentId = 3,
    ParentJointIndex = 4,
    Visible = 5,
    Name = 6,
    Locked = 7,
    UserData = 8,
    PrivateUserData = 9,
    Href = 10,
    Description = 11,
    Position = 12,
    Dimensions = 13,
    Rotation = 14,
    RegistrationPoint = 15,
    Created = 16,
    LastEditedBy = 17,
    EntityHostType = 18,
    OwningAvatarId = 19,
    QueryAaCube = 20,
    CanCastShadow = 21,
    VisibleInSecondaryCamera = 22,
    RenderLayer = 23,
    PrimitiveMode = 24,
    IgnorePickIntersection = 25,
    RenderWithZones = 26,
    BillboardMode = 27,

    // Grab group
    GrabGrabbable = 28,
    GrabKinematic = 29,
    GrabFollowsController = 30,
    GrabTriggerable = 31,
    GrabEquippable = 32,
    GrabDelegateToParent = 33,
    GrabLeftEquippablePositionOffset = 34,
    GrabLeftEquippableRotationOffset = 35,
    GrabRightEquippablePositionOffset = 36,
    GrabRightEquippableRotationOffset = 37,
    GrabEquippableIndicatorUrl = 38,
    GrabEquippableIndicatorScale = 39,
    GrabEquippableIndicatorOffset = 40,

    // Physics
    Density = 41,
    Velocity = 42,
    AngularVelocity = 43,
    Gravity = 44,
    Acceleration = 45,
    Damping = 46,
    AngularDamping = 47,
    Restitution = 48,
    Friction = 49,
    Lifetime = 50,
    Collisionless = 51,
    CollisionMask = 52,
    Dynamic = 53,
    CollisionSoundUrl = 54,
    ActionData = 55,

    // Cloning
    Cloneable = 56,
    CloneLifetime = 57,
    CloneLimit = 58,
    CloneDynamic = 59,
    CloneAvatarEntity = 60,
    CloneOriginId = 61,

    // Scripts
    Script = 62,
    ScriptTimestamp = 63,
    ServerScripts = 64,

    // Certified items
    ItemName = 65,
    ItemDescription = 66,
    ItemCategories = 67,
    ItemArtist = 68,
    ItemLicense = 69,
    LimitedRun = 70,
    MarketplaceId = 71,
    EditionNumber = 72,
    EntityInstanceNumber = 73,
    CertificateId = 74,
    CertificateType = 75,
    StaticCertificateVersion = 76,

    // Local-only slots (reserved, never sent)
    LocalPosition = 77,
    LocalRotation = 78,
    LocalVelocity = 79,
    LocalAngularVelocity = 80,
    LocalDimensions = 81,

    // Shared appearance
    ShapeType = 82,
    CompoundShapeUrl = 83,
    Color = 84,
    Alpha = 85,

    // Pulse group
    PulseMin = 86,
    PulseMax = 87,
    PulsePeriod = 88,
    PulseColorMode = 89,
    PulseAlphaMode = 90,

    Textures = 91,

    // Derived slots, overlaid per entity type
    Derived0 = 92,
    Derived1 = 93,
    Derived2 = 94,
    Derived3 = 95,
    Derived4 = 96,
    Derived5 = 97,
    Derived6 = 98,
    Derived7 = 99,
    Derived8 = 100,
    Derived9 = 101,
    Derived10 = 102,
    Derived11 = 103,
    Derived12 = 104,
    Derived13 = 105,
    Derived14 = 106,
    Derived15 = 107,
    Derived16 = 108,
    Derived17 = 109,
    Derived18 = 110,
    Derived19 = 111,
    Derived20 = 112,
    Derived21 = 113,
    Derived22 = 114,
    Derived23 = 115,
    Derived24 = 116,
    Derived25 = 117,
    Derived26 = 118,
    Derived27 = 119,
    Derived28 = 120,
    Derived29 = 121,
    Derived30 = 122,
    Derived31 = 123,
    Derived32 = 124,
    Derived33 = 125,
    Derived34 = 126,
}

/// One past the highest property code.
pub const PROPERTY_COUNT: u16 = 127;

impl From<EntityPropertyId> for u16 {
    fn from(id: EntityPropertyId) -> u16 {
        id as u16
    }
}

/// Shared-block property codes as plain indices, for wire-level dispatch.
pub mod common_props {
    use super::EntityPropertyId as P;
    pub const SIMULATION_OWNER: u16 = P::SimulationOwner as u16;
    pub const PARENT_ID: u16 = P::ParentId as u16;
    pub const PARENT_JOINT_INDEX: u16 = P::ParentJointIndex as u16;
    pub const VISIBLE: u16 = P::Visible as u16;
    pub const NAME: u16 = P::Name as u16;
    pub const LOCKED: u16 = P::Locked as u16;
    pub const USER_DATA: u16 = P::UserData as u16;
    pub const PRIVATE_USER_DATA: u16 = P::PrivateUserData as u16;
    pub const HREF: u16 = P::Href as u16;
    pub const DESCRIPTION: u16 = P::Description as u16;
    pub const POSITION: u16 = P::Position as u16;
    pub const DIMENSIONS: u16 = P::Dimensions as u16;
    pub const ROTATION: u16 = P::Rotation as u16;
    pub const REGISTRATION_POINT: u16 = P::RegistrationPoint as u16;
    pub const CREATED: u16 = P::Created as u16;
    pub const LAST_EDITED_BY: u16 = P::LastEditedBy as u16;
    pub const QUERY_AA_CUBE: u16 = P::QueryAaCube as u16;
    pub const CAN_CAST_SHADOW: u16 = P::CanCastShadow as u16;
    pub const RENDER_LAYER: u16 = P::RenderLayer as u16;
    pub const PRIMITIVE_MODE: u16 = P::PrimitiveMode as u16;
    pub const IGNORE_PICK_INTERSECTION: u16 = P::IgnorePickIntersection as u16;
    pub const RENDER_WITH_ZONES: u16 = P::RenderWithZones as u16;
    pub const BILLBOARD_MODE: u16 = P::BillboardMode as u16;
    pub const GRAB_GRABBABLE: u16 = P::GrabGrabbable as u16;
    pub const GRAB_KINEMATIC: u16 = P::GrabKinematic as u16;
    pub const GRAB_FOLLOWS_CONTROLLER: u16 = P::GrabFollowsController as u16;
    pub const GRAB_TRIGGERABLE: u16 = P::GrabTriggerable as u16;
    pub const GRAB_EQUIPPABLE: u16 = P::GrabEquippable as u16;
    pub const GRAB_DELEGATE_TO_PARENT: u16 = P::GrabDelegateToParent as u16;
    pub const GRAB_LEFT_EQUIPPABLE_POSITION_OFFSET: u16 = P::GrabLeftEquippablePositionOffset as u16;
    pub const GRAB_LEFT_EQUIPPABLE_ROTATION_OFFSET: u16 = P::GrabLeftEquippableRotationOffset as u16;
    pub const GRAB_RIGHT_EQUIPPABLE_POSITION_OFFSET: u16 = P::GrabRightEquippablePositionOffset as u16;
    pub const GRAB_RIGHT_EQUIPPABLE_ROTATION_OFFSET: u16 = P::GrabRightEquippableRotationOffset as u16;
    pub const GRAB_EQUIPPABLE_INDICATOR_URL: u16 = P::GrabEquippableIndicatorUrl as u16;
    pub const GRAB_EQUIPPABLE_INDICATOR_SCALE: u16 = P::GrabEquippableIndicatorScale as u16;
    pub const GRAB_EQUIPPABLE_INDICATOR_OFFSET: u16 = P::GrabEquippableIndicatorOffset as u16;
    pub const DENSITY: u16 = P::Density as u16;
    pub const VELOCITY: u16 = P::Velocity as u16;
    pub const ANGULAR_VELOCITY: u16 = P::AngularVelocity as u16;
    pub const GRAVITY: u16 = P::Gravity as u16;
    pub const ACCELERATION: u16 = P::Acceleration as u16;
    pub const DAMPING: u16 = P::Damping as u16;
    pub const ANGULAR_DAMPING: u16 = P::AngularDamping as u16;
    pub const RESTITUTION: u16 = P::Restitution as u16;
    pub const FRICTION: u16 = P::Friction as u16;
    pub const LIFETIME: u16 = P::Lifetime as u16;
    pub const COLLISIONLESS: u16 = P::Collisionless as u16;
    pub const COLLISION_MASK: u16 = P::CollisionMask as u16;
    pub const DYNAMIC: u16 = P::Dynamic as u16;
    pub const COLLISION_SOUND_URL: u16 = P::CollisionSoundUrl as u16;
    pub const ACTION_DATA: u16 = P::ActionData as u16;
    pub const CLONEABLE: u16 = P::Cloneable as u16;
    pub const CLONE_LIFETIME: u16 = P::CloneLifetime as u16;
    pub const CLONE_LIMIT: u16 = P::CloneLimit as u16;
    pub const CLONE_DYNAMIC: u16 = P::CloneDynamic as u16;
    pub const CLONE_AVATAR_ENTITY: u16 = P::CloneAvatarEntity as u16;
    pub const CLONE_ORIGIN_ID: u16 = P::CloneOriginId as u16;
    pub const SCRIPT: u16 = P::Script as u16;
    pub const SCRIPT_TIMESTAMP: u16 = P::ScriptTimestamp as u16;
    pub const SERVER_SCRIPTS: u16 = P::ServerScripts as u16;
    pub const SHAPE_TYPE: u16 = P::ShapeType as u16;
    pub const COMPOUND_SHAPE_URL: u16 = P::CompoundShapeUrl as u16;
    pub const COLOR: u16 = P::Color as u16;
    pub const ALPHA: u16 = P::Alpha as u16;
    pub const PULSE_MIN: u16 = P::PulseMin as u16;
    pub const PULSE_MAX: u16 = P::PulseMax as u16;
    pub const PULSE_PERIOD: u16 = P::PulsePeriod as u16;
    pub const PULSE_COLOR_MODE: u16 = P::PulseColorMode as u16;
    pub const PULSE_ALPHA_MODE: u16 = P::PulseAlphaMode as u16;
    pub const TEXTURES: u16 = P::Textures as u16;
}

/// Shape entities: Box, Sphere and the general Shape type.
pub mod shape_props {
    use super::EntityPropertyId as P;
    pub const SHAPE: u16 = P::Derived0 as u16;
}

/// Model entities. The animation group occupies Derived3..=Derived11.
pub mod model_props {
    use super::EntityPropertyId as P;
    pub const MODEL_URL: u16 = P::Derived0 as u16;
    pub const MODEL_SCALE: u16 = P::Derived1 as u16;
    pub const GROUP_CULLED: u16 = P::Derived2 as u16;
    pub const ANIMATION_URL: u16 = P::Derived3 as u16;
    pub const ANIMATION_ALLOW_TRANSLATION: u16 = P::Derived4 as u16;
    pub const ANIMATION_FPS: u16 = P::Derived5 as u16;
    pub const ANIMATION_FRAME_INDEX: u16 = P::Derived6 as u16;
    pub const ANIMATION_PLAYING: u16 = P::Derived7 as u16;
    pub const ANIMATION_LOOP: u16 = P::Derived8 as u16;
    pub const ANIMATION_FIRST_FRAME: u16 = P::Derived9 as u16;
    pub const ANIMATION_LAST_FRAME: u16 = P::Derived10 as u16;
    pub const ANIMATION_HOLD: u16 = P::Derived11 as u16;
}

/// Light entities.
pub mod light_props {
    use super::EntityPropertyId as P;
    pub const IS_SPOTLIGHT: u16 = P::Derived0 as u16;
    pub const INTENSITY: u16 = P::Derived1 as u16;
    pub const EXPONENT: u16 = P::Derived2 as u16;
    pub const CUTOFF: u16 = P::Derived3 as u16;
    pub const FALLOFF_RADIUS: u16 = P::Derived4 as u16;
}

/// Text entities.
pub mod text_props {
    use super::EntityPropertyId as P;
    pub const TEXT: u16 = P::Derived0 as u16;
    pub const LINE_HEIGHT: u16 = P::Derived1 as u16;
    pub const TEXT_COLOR: u16 = P::Derived2 as u16;
    pub const TEXT_ALPHA: u16 = P::Derived3 as u16;
    pub const BACKGROUND_COLOR: u16 = P::Derived4 as u16;
    pub const BACKGROUND_ALPHA: u16 = P::Derived5 as u16;
    pub const UNLIT: u16 = P::Derived6 as u16;
    pub const FONT: u16 = P::Derived7 as u16;
}

/// Zone entities: lighting environment groups.
pub mod zone_props {
    use super::EntityPropertyId as P;
    pub const KEYLIGHT_COLOR: u16 = P::Derived0 as u16;
    pub const KEYLIGHT_INTENSITY: u16 = P::Derived1 as u16;
    pub const KEYLIGHT_DIRECTION: u16 = P::Derived2 as u16;
    pub const KEYLIGHT_CAST_SHADOWS: u16 = P::Derived3 as u16;
    pub const AMBIENT_LIGHT_INTENSITY: u16 = P::Derived4 as u16;
    pub const AMBIENT_LIGHT_URL: u16 = P::Derived5 as u16;
    pub const SKYBOX_COLOR: u16 = P::Derived6 as u16;
    pub const SKYBOX_URL: u16 = P::Derived7 as u16;
    pub const HAZE_RANGE: u16 = P::Derived8 as u16;
    pub const HAZE_COLOR: u16 = P::Derived9 as u16;
    pub const HAZE_GLARE_COLOR: u16 = P::Derived10 as u16;
    pub const HAZE_BACKGROUND_BLEND: u16 = P::Derived11 as u16;
    pub const BLOOM_INTENSITY: u16 = P::Derived12 as u16;
    pub const BLOOM_THRESHOLD: u16 = P::Derived13 as u16;
    pub const BLOOM_SIZE: u16 = P::Derived14 as u16;
    pub const TONEMAPPING_CURVE: u16 = P::Derived15 as u16;
    pub const TONEMAPPING_EXPOSURE: u16 = P::Derived16 as u16;
    pub const FLYING_ALLOWED: u16 = P::Derived17 as u16;
    pub const GHOSTING_ALLOWED: u16 = P::Derived18 as u16;
}

/// Web entities.
pub mod web_props {
    use super::EntityPropertyId as P;
    pub const SOURCE_URL: u16 = P::Derived0 as u16;
    pub const DPI: u16 = P::Derived1 as u16;
    pub const SCRIPT_URL: u16 = P::Derived2 as u16;
    pub const MAX_FPS: u16 = P::Derived3 as u16;
    pub const INPUT_MODE: u16 = P::Derived4 as u16;
}

/// Image entities.
pub mod image_props {
    use super::EntityPropertyId as P;
    pub const IMAGE_URL: u16 = P::Derived0 as u16;
    pub const EMISSIVE: u16 = P::Derived1 as u16;
    pub const KEEP_ASPECT_RATIO: u16 = P::Derived2 as u16;
    pub const SUB_IMAGE: u16 = P::Derived3 as u16;
}

/// Grid entities.
pub mod grid_props {
    use super::EntityPropertyId as P;
    pub const FOLLOW_CAMERA: u16 = P::Derived0 as u16;
    pub const MAJOR_GRID_EVERY: u16 = P::Derived1 as u16;
    pub const MINOR_GRID_EVERY: u16 = P::Derived2 as u16;
}

/// Gizmo entities. The ring group occupies Derived1..=Derived8.
pub mod gizmo_props {
    use super::EntityPropertyId as P;
    pub const GIZMO_TYPE: u16 = P::Derived0 as u16;
    pub const RING_START_ANGLE: u16 = P::Derived1 as u16;
    pub const RING_END_ANGLE: u16 = P::Derived2 as u16;
    pub const RING_INNER_RADIUS: u16 = P::Derived3 as u16;
    pub const RING_INNER_START_COLOR: u16 = P::Derived4 as u16;
    pub const RING_INNER_END_COLOR: u16 = P::Derived5 as u16;
    pub const RING_OUTER_START_COLOR: u16 = P::Derived6 as u16;
    pub const RING_OUTER_END_COLOR: u16 = P::Derived7 as u16;
    pub const RING_HAS_TICK_MARKS: u16 = P::Derived8 as u16;
}

/// Material entities.
pub mod material_props {
    use super::EntityPropertyId as P;
    pub const MATERIAL_URL: u16 = P::Derived0 as u16;
    pub const MATERIAL_MAPPING_MODE: u16 = P::Derived1 as u16;
    pub const PRIORITY: u16 = P::Derived2 as u16;
    pub const PARENT_MATERIAL_NAME: u16 = P::Derived3 as u16;
    pub const MATERIAL_MAPPING_POS: u16 = P::Derived4 as u16;
    pub const MATERIAL_MAPPING_SCALE: u16 = P::Derived5 as u16;
    pub const MATERIAL_MAPPING_ROT: u16 = P::Derived6 as u16;
    pub const MATERIAL_DATA: u16 = P::Derived7 as u16;
    pub const MATERIAL_REPEAT: u16 = P::Derived8 as u16;
}

/// Particle-effect entities. The animation group occupies
/// Derived20..=Derived28.
pub mod particle_props {
    use super::EntityPropertyId as P;
    pub const MAX_PARTICLES: u16 = P::Derived0 as u16;
    pub const LIFESPAN: u16 = P::Derived1 as u16;
    pub const EMITTING_PARTICLES: u16 = P::Derived2 as u16;
    pub const EMIT_RATE: u16 = P::Derived3 as u16;
    pub const EMIT_SPEED: u16 = P::Derived4 as u16;
    pub const SPEED_SPREAD: u16 = P::Derived5 as u16;
    pub const EMIT_ORIENTATION: u16 = P::Derived6 as u16;
    pub const EMIT_DIMENSIONS: u16 = P::Derived7 as u16;
    pub const EMIT_RADIUS_START: u16 = P::Derived8 as u16;
    pub const EMIT_ACCELERATION: u16 = P::Derived9 as u16;
    pub const ACCELERATION_SPREAD: u16 = P::Derived10 as u16;
    pub const PARTICLE_RADIUS: u16 = P::Derived11 as u16;
    pub const RADIUS_SPREAD: u16 = P::Derived12 as u16;
    pub const RADIUS_START: u16 = P::Derived13 as u16;
    pub const RADIUS_FINISH: u16 = P::Derived14 as u16;
    pub const COLOR_START: u16 = P::Derived15 as u16;
    pub const COLOR_FINISH: u16 = P::Derived16 as u16;
    pub const ALPHA_START: u16 = P::Derived17 as u16;
    pub const ALPHA_FINISH: u16 = P::Derived18 as u16;
    pub const EMITTER_SHOULD_TRAIL: u16 = P::Derived19 as u16;
    pub const ANIMATION_URL: u16 = P::Derived20 as u16;
    pub const ANIMATION_ALLOW_TRANSLATION: u16 = P::Derived21 as u16;
    pub const ANIMATION_FPS: u16 = P::Derived22 as u16;
    pub const ANIMATION_FRAME_INDEX: u16 = P::Derived23 as u16;
    pub const ANIMATION_PLAYING: u16 = P::Derived24 as u16;
    pub const ANIMATION_LOOP: u16 = P::Derived25 as u16;
    pub const ANIMATION_FIRST_FRAME: u16 = P::Derived26 as u16;
    pub const ANIMATION_LAST_FRAME: u16 = P::Derived27 as u16;
    pub const ANIMATION_HOLD: u16 = P::Derived28 as u16;
}

/// Poly-line entities.
pub mod polyline_props {
    use super::EntityPropertyId as P;
    pub const LINE_POINTS: u16 = P::Derived0 as u16;
    pub const STROKE_NORMALS: u16 = P::Derived1 as u16;
    pub const STROKE_COLORS: u16 = P::Derived2 as u16;
    pub const IS_UV_MODE_STRETCH: u16 = P::Derived3 as u16;
    pub const GLOW: u16 = P::Derived4 as u16;
    pub const FACE_CAMERA: u16 = P::Derived5 as u16;
}

/// Poly-vox entities.
pub mod polyvox_props {
    use super::EntityPropertyId as P;
    pub const VOXEL_VOLUME_SIZE: u16 = P::Derived0 as u16;
    pub const VOXEL_DATA: u16 = P::Derived1 as u16;
    pub const VOXEL_SURFACE_STYLE: u16 = P::Derived2 as u16;
    pub const X_TEXTURE_URL: u16 = P::Derived3 as u16;
    pub const Y_TEXTURE_URL: u16 = P::Derived4 as u16;
    pub const Z_TEXTURE_URL: u16 = P::Derived5 as u16;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pinned_wire_indices() {
        assert_eq!(EntityPropertyId::LastEditedBy as u16, 17);
        assert_eq!(EntityPropertyId::Color as u16, 84);
        assert_eq!(EntityPropertyId::Textures as u16, 91);
        assert_eq!(EntityPropertyId::Derived0 as u16, 92);
        assert_eq!(EntityPropertyId::Derived34 as u16, PROPERTY_COUNT - 1);
    }
}
