//! Typed serializers for the entity stream, with partial-fit bookkeeping.
//!
//! Every `append_*` call follows the same contract:
//! 1. An invalid value is logged and nothing happens: the context is left
//!    untouched and 0 is returned.
//! 2. If the value does not fit the remaining buffer, the context's append
//!    state flips to `Partial` and 0 is returned. The caller may keep trying
//!    smaller fields.
//! 3. Otherwise the bytes are written, the flag moves from
//!    `properties_to_write` to `properties_written`, the property count is
//!    bumped and the serialized size is returned.
//!
//! Scalars are little-endian; UUIDs are 16 bytes big-endian behind a
//! little-endian u16 length; array length fields are u16.

use bytes::Buf;
use glam::{Quat, Vec2, Vec3};
use tracing::error;
use uuid::Uuid;

use crate::entity::{AaCube, Color, Rect};
use crate::error::{EntityDataError, EntityDataResult};
use crate::property_flags::PropertyFlags;

/// Outcome of serializing a set of properties into a bounded buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppendState {
    /// Everything requested fit
    #[default]
    Completed,
    /// Something fit, something did not
    Partial,
    /// Nothing fit
    None,
}

/// Scratch state threaded through the serialization of one packet.
#[derive(Debug, Clone, Default)]
pub struct PacketContext {
    pub properties_to_write: PropertyFlags,
    pub properties_written: PropertyFlags,
    pub property_count: u32,
    pub append_state: AppendState,
}

impl PacketContext {
    pub fn new(properties_to_write: PropertyFlags) -> Self {
        Self {
            properties_to_write,
            ..Default::default()
        }
    }
}

const QUAT_SCALE: f32 = (1 << 14) as f32;
const QUAT_BIAS: i32 = 1 << 14;
const QUAT_COMPONENT_MASK: u64 = 0x7FFF;

/// Packs a unit quaternion into 47 bits of a u64: a 2-bit index of the
/// largest-magnitude component followed by the other three components
/// quantized to 15 bits each, in x,y,z,w order. The largest component is
/// dropped and recovered from the unit norm; its sign is folded into the
/// stored components.
pub fn pack_quat(quat: Quat) -> u64 {
    let q = quat.normalize();
    let components = [q.x, q.y, q.z, q.w];

    let mut largest = 0;
    for (i, component) in components.iter().enumerate() {
        if component.abs() > components[largest].abs() {
            largest = i;
        }
    }
    let flip = components[largest] < 0.0;

    let mut packed = (largest as u64) << 45;
    let mut shift = 30;
    for (i, component) in components.iter().enumerate() {
        if i == largest {
            continue;
        }
        let value = if flip { -component } else { *component };
        let quantized = ((value * QUAT_SCALE).round() as i32 + QUAT_BIAS).clamp(0, 0x7FFF);
        packed |= (quantized as u64 & QUAT_COMPONENT_MASK) << shift;
        shift -= 15;
    }
    packed
}

/// Inverse of [`pack_quat`].
pub fn unpack_quat(packed: u64) -> Quat {
    let largest = (packed >> 45 & 0x3) as usize;

    let mut components = [0.0f32; 4];
    let mut shift = 30;
    let mut sum = 0.0f32;
    for (i, component) in components.iter_mut().enumerate() {
        if i == largest {
            continue;
        }
        let quantized = (packed >> shift & QUAT_COMPONENT_MASK) as i32 - QUAT_BIAS;
        *component = quantized as f32 / QUAT_SCALE;
        sum += *component * *component;
        shift -= 15;
    }
    components[largest] = (1.0 - sum).max(0.0).sqrt();

    Quat::from_xyzw(components[0], components[1], components[2], components[3])
}

fn finite(values: &[f32]) -> bool {
    values.iter().all(|v| v.is_finite())
}

/// Serializer over a caller-provided buffer.
pub struct EntityDataWriter<'a> {
    buf: &'a mut [u8],
    offset: usize,
}

impl<'a> EntityDataWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Rewinds to an earlier checkpoint.
    pub fn rewind_to(&mut self, offset: usize) {
        debug_assert!(offset <= self.offset);
        self.offset = offset;
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.offset
    }

    /// Already-written bytes, for in-place patching of a reserved block.
    pub fn written_mut(&mut self, offset: usize, len: usize) -> &mut [u8] {
        debug_assert!(offset + len <= self.offset);
        &mut self.buf[offset..offset + len]
    }

    /// Writes preamble bytes outside the property-flag bookkeeping.
    /// Returns false without writing when there is no room.
    pub fn put_raw(&mut self, bytes: &[u8]) -> bool {
        if self.remaining() < bytes.len() {
            return false;
        }
        self.buf[self.offset..self.offset + bytes.len()].copy_from_slice(bytes);
        self.offset += bytes.len();
        true
    }

    pub fn put_u64_le_raw(&mut self, value: u64) -> bool {
        self.put_raw(&value.to_le_bytes())
    }

    fn reserve(&mut self, size: usize, ctx: &mut PacketContext) -> bool {
        if self.remaining() < size {
            ctx.append_state = AppendState::Partial;
            false
        } else {
            true
        }
    }

    fn commit(&mut self, flag: u16, ctx: &mut PacketContext) {
        ctx.properties_to_write.set_has_property(flag, false);
        ctx.properties_written.set_has_property(flag, true);
        ctx.property_count += 1;
    }

    fn write(&mut self, bytes: &[u8]) {
        self.buf[self.offset..self.offset + bytes.len()].copy_from_slice(bytes);
        self.offset += bytes.len();
    }

    pub fn append_bool(&mut self, flag: u16, value: bool, ctx: &mut PacketContext) -> usize {
        if !self.reserve(1, ctx) {
            return 0;
        }
        self.write(&[value as u8]);
        self.commit(flag, ctx);
        1
    }

    pub fn append_u8(&mut self, flag: u16, value: u8, ctx: &mut PacketContext) -> usize {
        if !self.reserve(1, ctx) {
            return 0;
        }
        self.write(&[value]);
        self.commit(flag, ctx);
        1
    }

    pub fn append_u16(&mut self, flag: u16, value: u16, ctx: &mut PacketContext) -> usize {
        if !self.reserve(2, ctx) {
            return 0;
        }
        self.write(&value.to_le_bytes());
        self.commit(flag, ctx);
        2
    }

    pub fn append_u32(&mut self, flag: u16, value: u32, ctx: &mut PacketContext) -> usize {
        if !self.reserve(4, ctx) {
            return 0;
        }
        self.write(&value.to_le_bytes());
        self.commit(flag, ctx);
        4
    }

    pub fn append_u64(&mut self, flag: u16, value: u64, ctx: &mut PacketContext) -> usize {
        if !self.reserve(8, ctx) {
            return 0;
        }
        self.write(&value.to_le_bytes());
        self.commit(flag, ctx);
        8
    }

    pub fn append_f32(&mut self, flag: u16, value: f32, ctx: &mut PacketContext) -> usize {
        if !value.is_finite() {
            error!("Cannot write invalid float value");
            return 0;
        }
        if !self.reserve(4, ctx) {
            return 0;
        }
        self.write(&value.to_le_bytes());
        self.commit(flag, ctx);
        4
    }

    pub fn append_color(&mut self, flag: u16, value: Color, ctx: &mut PacketContext) -> usize {
        if !self.reserve(3, ctx) {
            return 0;
        }
        self.write(&[value.red, value.green, value.blue]);
        self.commit(flag, ctx);
        3
    }

    pub fn append_vec2(&mut self, flag: u16, value: Vec2, ctx: &mut PacketContext) -> usize {
        if !finite(&[value.x, value.y]) {
            error!("Cannot write invalid vec2 value");
            return 0;
        }
        if !self.reserve(8, ctx) {
            return 0;
        }
        self.write(&value.x.to_le_bytes());
        self.write(&value.y.to_le_bytes());
        self.commit(flag, ctx);
        8
    }

    pub fn append_vec3(&mut self, flag: u16, value: Vec3, ctx: &mut PacketContext) -> usize {
        if !finite(&[value.x, value.y, value.z]) {
            error!("Cannot write invalid vec3 value");
            return 0;
        }
        if !self.reserve(12, ctx) {
            return 0;
        }
        self.write_vec3(value);
        self.commit(flag, ctx);
        12
    }

    pub fn append_quat(&mut self, flag: u16, value: Quat, ctx: &mut PacketContext) -> usize {
        if !finite(&[value.x, value.y, value.z, value.w]) || value.length_squared() == 0.0 {
            error!("Cannot write invalid quat value");
            return 0;
        }
        if !self.reserve(8, ctx) {
            return 0;
        }
        self.write(&pack_quat(value).to_le_bytes());
        self.commit(flag, ctx);
        8
    }

    pub fn append_rect(&mut self, flag: u16, value: Rect, ctx: &mut PacketContext) -> usize {
        if !self.reserve(16, ctx) {
            return 0;
        }
        self.write(&value.x.to_le_bytes());
        self.write(&value.y.to_le_bytes());
        self.write(&value.width.to_le_bytes());
        self.write(&value.height.to_le_bytes());
        self.commit(flag, ctx);
        16
    }

    pub fn append_aa_cube(&mut self, flag: u16, value: AaCube, ctx: &mut PacketContext) -> usize {
        if !finite(&[value.corner.x, value.corner.y, value.corner.z, value.scale])
            || value.scale < 0.0
        {
            error!("Cannot write invalid AACube value");
            return 0;
        }
        if !self.reserve(16, ctx) {
            return 0;
        }
        self.write_vec3(value.corner);
        self.write(&value.scale.to_le_bytes());
        self.commit(flag, ctx);
        16
    }

    pub fn append_string(&mut self, flag: u16, value: &str, ctx: &mut PacketContext) -> usize {
        if value.len() > u16::MAX as usize {
            error!("Cannot write invalid string value");
            return 0;
        }
        let size = 2 + value.len();
        if !self.reserve(size, ctx) {
            return 0;
        }
        self.write(&(value.len() as u16).to_le_bytes());
        self.write(value.as_bytes());
        self.commit(flag, ctx);
        size
    }

    pub fn append_byte_array(&mut self, flag: u16, value: &[u8], ctx: &mut PacketContext) -> usize {
        if value.len() > u16::MAX as usize {
            error!("Cannot write invalid byte array value");
            return 0;
        }
        let size = 2 + value.len();
        if !self.reserve(size, ctx) {
            return 0;
        }
        self.write(&(value.len() as u16).to_le_bytes());
        self.write(value);
        self.commit(flag, ctx);
        size
    }

    pub fn append_quat_array(&mut self, flag: u16, value: &[Quat], ctx: &mut PacketContext) -> usize {
        if value.len() > u16::MAX as usize
            || value.iter().any(|q| !finite(&[q.x, q.y, q.z, q.w]) || q.length_squared() == 0.0)
        {
            error!("Cannot write invalid quat array value");
            return 0;
        }
        let size = 2 + 8 * value.len();
        if !self.reserve(size, ctx) {
            return 0;
        }
        self.write(&(value.len() as u16).to_le_bytes());
        for quat in value {
            self.write(&pack_quat(*quat).to_le_bytes());
        }
        self.commit(flag, ctx);
        size
    }

    pub fn append_vec3_array(&mut self, flag: u16, value: &[Vec3], ctx: &mut PacketContext) -> usize {
        if value.len() > u16::MAX as usize
            || value.iter().any(|v| !finite(&[v.x, v.y, v.z]))
        {
            error!("Cannot write invalid vec3 array value");
            return 0;
        }
        let size = 2 + 12 * value.len();
        if !self.reserve(size, ctx) {
            return 0;
        }
        self.write(&(value.len() as u16).to_le_bytes());
        for vec in value {
            self.write_vec3(*vec);
        }
        self.commit(flag, ctx);
        size
    }

    /// A nil UUID costs 2 bytes (length 0); anything else 18.
    pub fn append_uuid(&mut self, flag: u16, value: Uuid, ctx: &mut PacketContext) -> usize {
        let size = if value.is_nil() { 2 } else { 18 };
        if !self.reserve(size, ctx) {
            return 0;
        }
        if value.is_nil() {
            self.write(&0u16.to_le_bytes());
        } else {
            self.write(&16u16.to_le_bytes());
            self.write(value.as_bytes());
        }
        self.commit(flag, ctx);
        size
    }

    pub fn append_uuid_array(&mut self, flag: u16, value: &[Uuid], ctx: &mut PacketContext) -> usize {
        if value.len() > u16::MAX as usize {
            error!("Cannot write invalid UUID array value");
            return 0;
        }
        let size = 2 + 16 * value.len();
        if !self.reserve(size, ctx) {
            return 0;
        }
        self.write(&(value.len() as u16).to_le_bytes());
        for uuid in value {
            self.write(uuid.as_bytes());
        }
        self.commit(flag, ctx);
        size
    }

    fn write_vec3(&mut self, value: Vec3) {
        self.write(&value.x.to_le_bytes());
        self.write(&value.y.to_le_bytes());
        self.write(&value.z.to_le_bytes());
    }
}

/// Deserializer mirroring [`EntityDataWriter`].
pub struct EntityDataReader<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> EntityDataReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> &'a [u8] {
        &self.buf[self.offset..]
    }

    pub fn advance(&mut self, count: usize) {
        self.offset += count;
    }

    fn take(&mut self, size: usize) -> EntityDataResult<&'a [u8]> {
        if self.buf.len() - self.offset < size {
            return Err(EntityDataError::Truncated {
                need: size,
                offset: self.offset,
                have: self.buf.len() - self.offset,
            });
        }
        let slice = &self.buf[self.offset..self.offset + size];
        self.offset += size;
        Ok(slice)
    }

    pub fn read_bool(&mut self) -> EntityDataResult<bool> {
        Ok(self.take(1)?[0] != 0)
    }

    pub fn read_u8(&mut self) -> EntityDataResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> EntityDataResult<u16> {
        Ok(self.take(2)?.get_u16_le())
    }

    pub fn read_u32(&mut self) -> EntityDataResult<u32> {
        Ok(self.take(4)?.get_u32_le())
    }

    pub fn read_u64(&mut self) -> EntityDataResult<u64> {
        Ok(self.take(8)?.get_u64_le())
    }

    pub fn read_i32(&mut self) -> EntityDataResult<i32> {
        Ok(self.take(4)?.get_i32_le())
    }

    pub fn read_f32(&mut self) -> EntityDataResult<f32> {
        Ok(self.take(4)?.get_f32_le())
    }

    pub fn read_color(&mut self) -> EntityDataResult<Color> {
        let bytes = self.take(3)?;
        Ok(Color::new(bytes[0], bytes[1], bytes[2]))
    }

    pub fn read_vec2(&mut self) -> EntityDataResult<Vec2> {
        Ok(Vec2::new(self.read_f32()?, self.read_f32()?))
    }

    pub fn read_vec3(&mut self) -> EntityDataResult<Vec3> {
        Ok(Vec3::new(self.read_f32()?, self.read_f32()?, self.read_f32()?))
    }

    pub fn read_quat(&mut self) -> EntityDataResult<Quat> {
        Ok(unpack_quat(self.read_u64()?))
    }

    pub fn read_rect(&mut self) -> EntityDataResult<Rect> {
        Ok(Rect {
            x: self.read_i32()?,
            y: self.read_i32()?,
            width: self.read_i32()?,
            height: self.read_i32()?,
        })
    }

    pub fn read_aa_cube(&mut self) -> EntityDataResult<AaCube> {
        Ok(AaCube {
            corner: self.read_vec3()?,
            scale: self.read_f32()?,
        })
    }

    pub fn read_string(&mut self) -> EntityDataResult<String> {
        let len = self.read_u16()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| EntityDataError::InvalidValue("string is not valid UTF-8".into()))
    }

    pub fn read_byte_array(&mut self) -> EntityDataResult<Vec<u8>> {
        let len = self.read_u16()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    pub fn read_quat_array(&mut self) -> EntityDataResult<Vec<Quat>> {
        let len = self.read_u16()? as usize;
        (0..len).map(|_| self.read_quat()).collect()
    }

    pub fn read_vec3_array(&mut self) -> EntityDataResult<Vec<Vec3>> {
        let len = self.read_u16()? as usize;
        (0..len).map(|_| self.read_vec3()).collect()
    }

    pub fn read_uuid(&mut self) -> EntityDataResult<Uuid> {
        let len = self.read_u16()? as usize;
        match len {
            0 => Ok(Uuid::nil()),
            16 => {
                let mut bytes = [0u8; 16];
                bytes.copy_from_slice(self.take(16)?);
                Ok(Uuid::from_bytes(bytes))
            }
            other => Err(EntityDataError::InvalidValue(format!(
                "UUID field with length {}",
                other
            ))),
        }
    }

    pub fn read_uuid_array(&mut self) -> EntityDataResult<Vec<Uuid>> {
        let len = self.read_u16()? as usize;
        (0..len)
            .map(|_| {
                let mut bytes = [0u8; 16];
                bytes.copy_from_slice(self.take(16)?);
                Ok(Uuid::from_bytes(bytes))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> PacketContext {
        PacketContext::default()
    }

    #[test]
    fn scalar_appends_move_flags_and_count() {
        let mut buf = [0u8; 32];
        let mut writer = EntityDataWriter::new(&mut buf);
        let mut ctx = PacketContext::new([5u16, 6].into_iter().collect());

        assert_eq!(writer.append_bool(5, true, &mut ctx), 1);
        assert_eq!(writer.append_u32(6, 0xDEAD_BEEF, &mut ctx), 4);

        assert!(ctx.properties_to_write.is_empty());
        assert!(ctx.properties_written.get_has_property(5u16));
        assert!(ctx.properties_written.get_has_property(6u16));
        assert_eq!(ctx.property_count, 2);
        assert_eq!(ctx.append_state, AppendState::Completed);
        assert_eq!(&buf[..5], &[1, 0xEF, 0xBE, 0xAD, 0xDE]);
    }

    #[test]
    fn overflow_marks_partial_without_writing() {
        let mut buf = [0u8; 3];
        let mut writer = EntityDataWriter::new(&mut buf);
        let mut ctx = ctx();

        assert_eq!(writer.append_u32(1, 42, &mut ctx), 0);
        assert_eq!(ctx.append_state, AppendState::Partial);
        assert_eq!(ctx.property_count, 0);
        assert_eq!(writer.offset(), 0);

        // A smaller field can still land afterward.
        assert_eq!(writer.append_u16(2, 7, &mut ctx), 2);
        assert_eq!(ctx.property_count, 1);
    }

    #[test]
    fn invalid_float_leaves_context_untouched() {
        let mut buf = [0u8; 16];
        let mut writer = EntityDataWriter::new(&mut buf);
        let mut ctx = ctx();

        assert_eq!(writer.append_f32(1, f32::NAN, &mut ctx), 0);
        assert_eq!(writer.append_f32(1, f32::INFINITY, &mut ctx), 0);
        assert_eq!(ctx.append_state, AppendState::Completed);
        assert_eq!(ctx.property_count, 0);
        assert_eq!(writer.offset(), 0);
    }

    #[test]
    fn nil_uuid_is_two_bytes() {
        let mut buf = [0u8; 32];
        let mut writer = EntityDataWriter::new(&mut buf);
        let mut ctx = ctx();

        assert_eq!(writer.append_uuid(1, Uuid::nil(), &mut ctx), 2);
        assert_eq!(&buf[..2], &[0, 0]);
    }

    #[test]
    fn uuid_round_trip_preserves_byte_order() {
        let uuid: Uuid = "a82f40b6-ee89-46cc-b504-02b88d72a546".parse().unwrap();
        let mut buf = [0u8; 18];
        let mut writer = EntityDataWriter::new(&mut buf);
        let mut ctx = ctx();
        assert_eq!(writer.append_uuid(1, uuid, &mut ctx), 18);
        assert_eq!(&buf[..2], &[16, 0]);

        let mut reader = EntityDataReader::new(&buf);
        assert_eq!(reader.read_uuid().unwrap(), uuid);
    }

    #[test]
    fn strings_and_arrays_round_trip() {
        let mut buf = [0u8; 128];
        let mut writer = EntityDataWriter::new(&mut buf);
        let mut ctx = ctx();

        writer.append_string(1, "entity", &mut ctx);
        writer.append_byte_array(2, &[1, 2, 3], &mut ctx);
        writer.append_vec3_array(3, &[Vec3::ONE, Vec3::ZERO], &mut ctx);

        let mut reader = EntityDataReader::new(&buf);
        assert_eq!(reader.read_string().unwrap(), "entity");
        assert_eq!(reader.read_byte_array().unwrap(), vec![1, 2, 3]);
        assert_eq!(reader.read_vec3_array().unwrap(), vec![Vec3::ONE, Vec3::ZERO]);
    }

    #[test]
    fn quat_pack_round_trip_is_precise() {
        let samples = [
            Quat::IDENTITY,
            Quat::from_xyzw(0.5, 0.5, 0.5, 0.5),
            Quat::from_xyzw(-0.5, 0.5, -0.5, 0.5),
            Quat::from_xyzw(0.1, 0.2, 0.3, 0.927).normalize(),
            Quat::from_xyzw(-0.7, 0.1, 0.1, 0.7).normalize(),
        ];
        for quat in samples {
            let unpacked = unpack_quat(pack_quat(quat));
            // A quaternion and its negation represent the same rotation.
            let sign = if quat.dot(unpacked) < 0.0 { -1.0 } else { 1.0 };
            for (a, b) in [
                (quat.x, sign * unpacked.x),
                (quat.y, sign * unpacked.y),
                (quat.z, sign * unpacked.z),
                (quat.w, sign * unpacked.w),
            ] {
                assert!((a - b).abs() <= 1.0 / 16384.0, "{:?} vs {:?}", quat, unpacked);
            }
        }
    }

    #[test]
    fn appenders_never_write_past_the_buffer() {
        // Sweep tight buffers and confirm offset stays in bounds.
        for size in 0..24usize {
            let mut buf = vec![0u8; size];
            let mut writer = EntityDataWriter::new(&mut buf);
            let mut ctx = ctx();
            writer.append_u64(1, u64::MAX, &mut ctx);
            writer.append_vec3(2, Vec3::ONE, &mut ctx);
            writer.append_string(3, "overflow", &mut ctx);
            assert!(writer.offset() <= size);
        }
    }

    #[test]
    fn oversized_array_is_invalid_not_partial() {
        let mut buf = [0u8; 8];
        let mut writer = EntityDataWriter::new(&mut buf);
        let mut ctx = ctx();
        let huge = vec![0u8; u16::MAX as usize + 1];
        assert_eq!(writer.append_byte_array(1, &huge, &mut ctx), 0);
        assert_eq!(ctx.append_state, AppendState::Completed);
    }
}
