// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Binary pack format
//!
//! A packed model is a header `[version, int count, float count]` of
//! little-endian `i32`, followed by the `i32` stream and the `f32` stream.
//!
//! Int stream layout:
//!
//! ```text
//! part type count
//! per part type (main model first, then sub-assemblies by discovery order):
//!     step count
//!     per step, either
//!         PACK_TAG, vertex count,
//!         per category (lines, conditional lines, triangles,
//!         double-sided triangles, quads, double-sided quads):
//!             color count, per color: color, primitive count, indices...
//!     or
//!         sub-model count, per sub-model: color, name index * 4 + invert * 2 + cull
//!     rotation kind (0 none, 1 ABS, 2 REL)
//! ```
//!
//! Floats hold vertex coordinates, sub-model positions and row-major
//! rotations, and step rotation angles, in the same order.
//!
//! Steps placing parts are flattened into one geometry through the
//! [`GeometryBuilder`]. Names are not stored: unpacked part types are called
//! `p{index}.ldr`.
//!
//! Single parts for the shared part cache use the same streams inside a
//! serde [`PackedPart`] record.

use crate::builder::GeometryBuilder;
use crate::error::{Error, Result};
use crate::geometry::{ColorMap, LdrGeometry};
use ldraw_model::{
    ColorId, Inlined, Mat3, PartType, PartTypeMap, RotationType, Step, StepRotation,
    SubModelPlacement, Vec3,
};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

/// Format version written into the header
pub const PACK_VERSION: i32 = 1;

/// Marks a geometry-packed step in the int stream
pub const PACK_TAG: i32 = -373035547;

const HEADER_LEN: usize = 3;

/// The two streams of a packed model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackedArrays {
    pub ints: Vec<i32>,
    pub floats: Vec<f32>,
}

impl PackedArrays {
    pub fn header(&self) -> [i32; HEADER_LEN] {
        [PACK_VERSION, self.ints.len() as i32, self.floats.len() as i32]
    }

    /// Header, ints and floats as little-endian bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 * (HEADER_LEN + self.ints.len() + self.floats.len()));
        buf.extend_from_slice(bytemuck::cast_slice(&self.header().map(i32::to_le)));
        let ints: Vec<i32> = self.ints.iter().map(|i| i.to_le()).collect();
        buf.extend_from_slice(bytemuck::cast_slice(&ints));
        let floats: Vec<u32> = self.floats.iter().map(|f| f.to_bits().to_le()).collect();
        buf.extend_from_slice(bytemuck::cast_slice(&floats));
        buf
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut cursor = 0;

        macro_rules! read_word {
            () => {{
                if cursor + 4 > data.len() {
                    return Err(Error::truncated(format!(
                        "expected {} bytes, found {}",
                        cursor + 4,
                        data.len()
                    )));
                }
                let word = [data[cursor], data[cursor + 1], data[cursor + 2], data[cursor + 3]];
                cursor += 4;
                word
            }};
        }

        let version = i32::from_le_bytes(read_word!());
        let ints = i32::from_le_bytes(read_word!());
        let floats = i32::from_le_bytes(read_word!());
        if version != PACK_VERSION {
            return Err(Error::UnsupportedPackVersion { version, ints, floats });
        }
        if ints < 0 || floats < 0 {
            return Err(Error::invalid_pack(format!(
                "negative array lengths {} and {}",
                ints, floats
            )));
        }

        let mut ret = PackedArrays {
            ints: Vec::with_capacity(ints as usize),
            floats: Vec::with_capacity(floats as usize),
        };
        for _ in 0..ints {
            ret.ints.push(i32::from_le_bytes(read_word!()));
        }
        for _ in 0..floats {
            ret.floats.push(f32::from_le_bytes(read_word!()));
        }
        if cursor != data.len() {
            log::warn!("Ignoring {} trailing bytes after packed model", data.len() - cursor);
        }
        Ok(ret)
    }
}

// ============================================================================
// Writing
// ============================================================================

#[derive(Default)]
struct Writer {
    ints: Vec<i32>,
    floats: Vec<f32>,
}

impl Writer {
    fn int(&mut self, i: i32) {
        self.ints.push(i);
    }

    fn count(&mut self, n: usize) {
        self.ints.push(n as i32);
    }

    fn vec3(&mut self, v: &Vec3) {
        self.floats.extend([v.x as f32, v.y as f32, v.z as f32]);
    }

    fn mat3(&mut self, m: &Mat3) {
        for r in 0..3 {
            for c in 0..3 {
                self.floats.push(m[(r, c)] as f32);
            }
        }
    }

    fn color_map<const N: usize>(&mut self, map: &ColorMap<N>) {
        self.count(map.len());
        for (&color, primitives) in map {
            self.int(color);
            self.count(primitives.len());
            for p in primitives {
                self.ints.extend(p.iter().map(|&i| i as i32));
            }
        }
    }

    fn geometry(&mut self, g: &LdrGeometry) {
        self.int(PACK_TAG);
        self.count(g.vertices.len());
        for v in &g.vertices {
            self.vec3(v);
        }
        self.color_map(&g.lines);
        self.color_map(&g.conditional_lines);
        self.color_map(&g.triangles);
        self.color_map(&g.double_sided_triangles);
        self.color_map(&g.quads);
        self.color_map(&g.double_sided_quads);
    }

    fn sub_model(&mut self, sm: &SubModelPlacement, name_index: usize) {
        self.int(sm.color);
        self.count(name_index * 4 + usize::from(sm.invert_ccw) * 2 + usize::from(sm.cull));
        self.vec3(&sm.position);
        self.mat3(&sm.rotation);
    }

    fn rotation(&mut self, rotation: Option<&StepRotation>) -> Result<()> {
        let Some(r) = rotation else {
            self.int(0);
            return Ok(());
        };
        match r.kind {
            RotationType::Abs => self.int(1),
            RotationType::Rel => self.int(2),
            RotationType::Add => {
                return Err(Error::invalid_pack("ADD rotations must be resolved before packing"))
            }
        }
        self.floats.extend([r.x as f32, r.y as f32, r.z as f32]);
        Ok(())
    }

    fn finish(self) -> PackedArrays {
        PackedArrays {
            ints: self.ints,
            floats: self.floats,
        }
    }
}

/// Main model and the sub-assemblies it reaches, in discovery order
fn name_table<'a>(builder: &GeometryBuilder<'a>) -> Result<Vec<&'a PartType>> {
    let main = builder.part_types().main_model()?;
    let mut table: Vec<&PartType> = vec![main];
    let mut seen: FxHashSet<&str> = FxHashSet::default();
    seen.insert(main.id.as_str());

    let mut i = 0;
    while i < table.len() {
        let current = table[i];
        for step in &current.steps {
            for sm in &step.sub_models {
                let pt = builder.resolve(&sm.id)?;
                if !pt.is_part && seen.insert(pt.id.as_str()) {
                    table.push(pt);
                }
            }
        }
        i += 1;
    }
    Ok(table)
}

/// Pack the main model of the builder's graph
pub fn pack(builder: &GeometryBuilder<'_>) -> Result<PackedArrays> {
    let table = name_table(builder)?;
    let index: FxHashMap<&str, usize> = table
        .iter()
        .enumerate()
        .map(|(i, pt)| (pt.id.as_str(), i))
        .collect();

    let mut w = Writer::default();
    w.count(table.len());
    for pt in &table {
        w.count(pt.steps.len());
        for step in &pt.steps {
            let mut assemblies = Vec::new();
            let mut has_parts = false;
            for sm in &step.sub_models {
                let sub = builder.resolve(&sm.id)?;
                if sub.is_part {
                    has_parts = true;
                } else {
                    assemblies.push((sm, index[sub.id.as_str()]));
                }
            }

            if assemblies.is_empty() {
                builder.build_step(step)?;
                w.geometry(&builder.step_geometry(step)?);
            } else if has_parts || step.has_primitives() {
                return Err(Error::invalid_pack(format!(
                    "step of {} mixes sub-assemblies with parts or primitives",
                    pt.id
                )));
            } else {
                w.count(assemblies.len());
                for (sm, name_index) in assemblies {
                    w.sub_model(sm, name_index);
                }
            }
            w.rotation(step.rotation.as_ref())?;
        }
    }

    let ret = w.finish();
    log::debug!(
        "Packed {} part types into {} ints and {} floats",
        table.len(),
        ret.ints.len(),
        ret.floats.len()
    );
    Ok(ret)
}

/// Pack the main model of the builder's graph into bytes
pub fn pack_to_bytes(builder: &GeometryBuilder<'_>) -> Result<Vec<u8>> {
    Ok(pack(builder)?.to_bytes())
}

// ============================================================================
// Reading
// ============================================================================

struct Reader<'a> {
    ints: &'a [i32],
    floats: &'a [f32],
    i: usize,
    f: usize,
}

impl<'a> Reader<'a> {
    fn new(ints: &'a [i32], floats: &'a [f32]) -> Self {
        Self {
            ints,
            floats,
            i: 0,
            f: 0,
        }
    }

    fn int(&mut self, what: &str) -> Result<i32> {
        let ret = self.ints.get(self.i).copied().ok_or_else(|| {
            Error::truncated(format!("int stream ended at {} reading {}", self.i, what))
        })?;
        self.i += 1;
        Ok(ret)
    }

    fn count(&mut self, what: &str) -> Result<usize> {
        let n = self.int(what)?;
        usize::try_from(n).map_err(|_| Error::invalid_pack(format!("negative {}: {}", what, n)))
    }

    fn float(&mut self, what: &str) -> Result<f64> {
        let ret = self.floats.get(self.f).copied().ok_or_else(|| {
            Error::truncated(format!("float stream ended at {} reading {}", self.f, what))
        })?;
        self.f += 1;
        Ok(f64::from(ret))
    }

    fn vec3(&mut self, what: &str) -> Result<Vec3> {
        Ok(Vec3::new(self.float(what)?, self.float(what)?, self.float(what)?))
    }

    fn mat3(&mut self) -> Result<Mat3> {
        let mut m = Mat3::zeros();
        for r in 0..3 {
            for c in 0..3 {
                m[(r, c)] = self.float("rotation")?;
            }
        }
        Ok(m)
    }

    fn color_map<const N: usize>(&mut self, vertex_count: usize) -> Result<ColorMap<N>> {
        let mut ret = ColorMap::new();
        for _ in 0..self.count("color count")? {
            let color: ColorId = self.int("color")?;
            let n = self.count("primitive count")?;
            let mut primitives = Vec::with_capacity(n);
            for _ in 0..n {
                let mut p = [0u32; N];
                for idx in &mut p {
                    let i = self.count("vertex index")?;
                    if i >= vertex_count {
                        return Err(Error::invalid_pack(format!(
                            "vertex index {} out of {}",
                            i, vertex_count
                        )));
                    }
                    *idx = i as u32;
                }
                primitives.push(p);
            }
            ret.insert(color, primitives);
        }
        Ok(ret)
    }

    /// Geometry block after its tag
    fn geometry(&mut self) -> Result<LdrGeometry> {
        let n = self.count("vertex count")?;
        let mut vertices = Vec::with_capacity(n);
        for _ in 0..n {
            vertices.push(self.vec3("vertex")?);
        }
        Ok(LdrGeometry {
            lines: self.color_map(n)?,
            conditional_lines: self.color_map(n)?,
            triangles: self.color_map(n)?,
            double_sided_triangles: self.color_map(n)?,
            quads: self.color_map(n)?,
            double_sided_quads: self.color_map(n)?,
            vertices,
            ..Default::default()
        })
    }

    /// Sub-model placement, with the target ID looked up in `names`
    fn sub_model(&mut self, names: &[String]) -> Result<SubModelPlacement> {
        let color = self.int("sub-model color")?;
        let reference = self.count("sub-model reference")?;
        let name = names.get(reference / 4).ok_or_else(|| {
            Error::invalid_pack(format!("name index {} out of {}", reference / 4, names.len()))
        })?;
        let position = self.vec3("position")?;
        let rotation = self.mat3()?;
        Ok(SubModelPlacement::new(
            color,
            position,
            rotation,
            name.as_str(),
            reference & 1 == 1,
            reference & 2 == 2,
        ))
    }

    fn rotation(&mut self) -> Result<Option<StepRotation>> {
        let kind = match self.int("rotation kind")? {
            0 => return Ok(None),
            1 => RotationType::Abs,
            2 => RotationType::Rel,
            other => return Err(Error::invalid_pack(format!("rotation kind {}", other))),
        };
        let angles = self.vec3("rotation angles")?;
        Ok(Some(StepRotation::new(angles.x, angles.y, angles.z, kind)))
    }

    fn is_done(&self) -> bool {
        self.i == self.ints.len() && self.f == self.floats.len()
    }
}

/// Rebuild a part type graph from packed streams
///
/// The main model is `p0.ldr`.
pub fn unpack(arrays: &PackedArrays) -> Result<PartTypeMap> {
    let mut r = Reader::new(&arrays.ints, &arrays.floats);
    let n = r.count("part type count")?;
    if n == 0 {
        return Err(Error::invalid_pack("no part types"));
    }
    let names: Vec<String> = (0..n).map(|i| format!("p{}.ldr", i)).collect();

    let mut map = PartTypeMap::new();
    for name in &names {
        let mut pt = PartType::new(name.as_str());
        pt.cleaned = true;
        for _ in 0..r.count("step count")? {
            let mut step = match r.int("step kind")? {
                PACK_TAG => r.geometry()?.to_step(),
                sub_models => {
                    let sub_models = usize::try_from(sub_models).map_err(|_| {
                        Error::invalid_pack(format!("step kind {}", sub_models))
                    })?;
                    let mut step = Step::new();
                    for _ in 0..sub_models {
                        step.add_sub_model(r.sub_model(&names)?);
                    }
                    step
                }
            };
            step.rotation = r.rotation()?;
            pt.last_rotation = step.rotation;
            pt.steps.push(step);
        }
        map.insert(pt);
    }
    if !r.is_done() {
        log::warn!("Packed model has unread data after {} part types", n);
    }
    map.set_main_model(names[0].as_str());
    Ok(map)
}

/// Rebuild a part type graph from packed bytes
pub fn unpack_bytes(data: &[u8]) -> Result<PartTypeMap> {
    unpack(&PackedArrays::from_bytes(data)?)
}

// ============================================================================
// Single parts
// ============================================================================

/// A part packed for the shared part cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackedPart {
    /// Part ID without the `.dat` suffix
    pub id: String,
    pub description: Option<String>,
    /// BFC state from [`PartType::encode_header`]
    pub header: i32,
    pub ldraw_org: Option<String>,
    pub license: Option<String>,
    /// IDs of the part types placed by the steps
    pub names: Vec<String>,
    pub ints: Vec<i32>,
    pub floats: Vec<f32>,
}

/// Storage key of a part: its ID without the `.dat` suffix
pub fn shorten_id(id: &str) -> &str {
    id.strip_suffix(".dat").unwrap_or(id)
}

/// Pack one part for storage
///
/// Returns `None` for parts that do not qualify or carry texture mapping.
pub fn pack_part(pt: &PartType) -> Option<PackedPart> {
    if !pt.can_be_packed() || pt.steps.iter().any(|s| !s.texmap_ids().is_empty()) {
        return None;
    }

    let mut names: Vec<String> = Vec::new();
    let mut w = Writer::default();
    w.count(pt.steps.len());
    for step in &pt.steps {
        w.count(step.sub_models.len());
        for sm in &step.sub_models {
            let idx = match names.iter().position(|n| *n == sm.id) {
                Some(idx) => idx,
                None => {
                    names.push(sm.id.clone());
                    names.len() - 1
                }
            };
            w.sub_model(sm, idx);
        }
        w.geometry(&LdrGeometry::from_primitives(step));
        if w.rotation(step.rotation.as_ref()).is_err() {
            return None;
        }
    }

    let arrays = w.finish();
    Some(PackedPart {
        id: shorten_id(&pt.id).to_string(),
        description: pt.model_description.clone(),
        header: pt.encode_header(),
        ldraw_org: pt.ldraw_org.clone(),
        license: pt.license.clone(),
        names,
        ints: arrays.ints,
        floats: arrays.floats,
    })
}

/// Rebuild a part from storage
pub fn unpack_part(packed: &PackedPart) -> Result<PartType> {
    let mut pt = PartType::new(format!("{}.dat", packed.id));
    pt.decode_header(packed.header);
    pt.model_description = packed.description.clone();
    pt.ldraw_org = packed.ldraw_org.clone();
    pt.license = packed.license.clone();
    pt.inlined = Some(Inlined::Storage);
    pt.is_part = true;
    pt.cleaned = true;

    let mut r = Reader::new(&packed.ints, &packed.floats);
    for _ in 0..r.count("step count")? {
        let mut sub_models = Vec::new();
        for _ in 0..r.count("sub-model count")? {
            sub_models.push(r.sub_model(&packed.names)?);
        }
        let tag = r.int("geometry tag")?;
        if tag != PACK_TAG {
            return Err(Error::invalid_pack(format!("expected geometry tag, found {}", tag)));
        }
        let mut step = r.geometry()?.to_step();
        step.sub_models = sub_models;
        step.rotation = r.rotation()?;
        pt.steps.push(step);
    }
    Ok(pt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ldraw_model::{Line, Triangle, OFFICIAL_LICENSE};

    fn v(x: f64, y: f64, z: f64) -> Vec3 {
        Vec3::new(x, y, z)
    }

    /// Part with triangles in three colors and a few lines
    fn part() -> PartType {
        let mut pt = PartType::new("3001.dat");
        pt.is_part = true;
        pt.certified_bfc = true;
        pt.license = Some(OFFICIAL_LICENSE.to_string());
        pt.ldraw_org = Some("Part UPDATE 2004-01".to_string());
        pt.model_description = Some("Brick 2 x 4".to_string());
        let mut step = Step::new();
        for (i, color) in [4, 14, 16, 4, 14].into_iter().enumerate() {
            let x = i as f64 * 10.0;
            step.add_triangle(Triangle::new(color, v(x, 0.0, 0.0), v(x + 10.0, 0.0, 0.0), v(x, 24.0, 0.5), i != 2, false));
        }
        step.add_line(Line::new(24, v(0.0, 0.0, 0.0), v(50.0, 0.0, 0.0)));
        step.add_line(Line::new(24, v(0.0, 24.0, 0.5), v(50.0, 0.0, 0.0)));
        pt.add_step(step);
        pt
    }

    fn model() -> PartTypeMap {
        let mut map = PartTypeMap::new();
        map.insert(part());

        let mut sub = PartType::new("sub.ldr");
        let mut step = Step::new();
        step.add_sub_model(SubModelPlacement::new(1, v(0.0, -24.0, 0.0), Mat3::identity(), "3001.dat", true, false));
        sub.add_step(step);
        map.insert(sub);

        let mut main = PartType::new("main.ldr");
        let mut step = Step::new();
        step.add_sub_model(SubModelPlacement::at_origin(16, "3001.dat"));
        main.add_step(step);
        let mut step = Step::with_rotation(Some(StepRotation::new(30.0, 45.0, 0.0, RotationType::Rel)));
        let flip = Mat3::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, -1.0);
        step.add_sub_model(SubModelPlacement::new(2, v(40.0, 0.0, 20.0), flip, "sub.ldr", true, true));
        main.add_step(step);
        map.insert(main);
        map.set_main_model("main.ldr");
        map
    }

    #[test]
    fn test_round_trip() {
        let map = model();
        let builder = GeometryBuilder::new(&map);
        let bytes = pack_to_bytes(&builder).unwrap();
        let unpacked = unpack_bytes(&bytes).unwrap();

        assert_eq!(unpacked.main_model_id(), Some("p0.ldr"));
        let main = unpacked.main_model().unwrap();
        assert!(main.cleaned);
        assert_eq!(main.steps.len(), 2);

        let original = builder.step_geometry(&map.get("main.ldr").unwrap().steps[0]).unwrap();
        let restored = LdrGeometry::from_primitives(&main.steps[0]);
        assert_eq!(restored.vertex_count(), original.vertex_count());
        for color in [4, 14, 16] {
            assert_eq!(restored.triangles.get(&color), original.triangles.get(&color));
        }
        assert_eq!(restored.double_sided_triangles, original.double_sided_triangles);
        assert_eq!(restored.lines, original.lines);
        assert_relative_eq!(restored.bounds.min, original.bounds.min, epsilon = 1e-5);
        assert_relative_eq!(restored.bounds.max, original.bounds.max, epsilon = 1e-5);

        let sm = &main.steps[1].sub_models[0];
        assert_eq!(sm.id, "p1.ldr");
        assert_eq!(sm.color, 2);
        assert!(sm.cull && sm.invert_ccw);
        assert_relative_eq!(sm.position, v(40.0, 0.0, 20.0));
        assert_eq!(sm.rotation[(2, 2)], -1.0);
        let rotation = main.steps[1].rotation.unwrap();
        assert_eq!(rotation.kind, RotationType::Rel);
        assert_relative_eq!(rotation.y, 45.0);

        let sub = unpacked.get("p1.ldr").unwrap();
        assert_eq!(sub.steps.len(), 1);
        assert_eq!(sub.steps[0].triangles.len(), 5);
    }

    #[test]
    fn test_unsupported_version() {
        let map = model();
        let mut bytes = pack_to_bytes(&GeometryBuilder::new(&map)).unwrap();
        bytes[0] = 2;
        assert!(matches!(
            unpack_bytes(&bytes),
            Err(Error::UnsupportedPackVersion { version: 2, .. })
        ));
    }

    #[test]
    fn test_truncated() {
        let map = model();
        let bytes = pack_to_bytes(&GeometryBuilder::new(&map)).unwrap();
        assert!(matches!(
            unpack_bytes(&bytes[..bytes.len() - 4]),
            Err(Error::Truncated(_))
        ));
        let arrays = PackedArrays::from_bytes(&bytes).unwrap();
        let short = PackedArrays {
            ints: arrays.ints[..arrays.ints.len() - 1].to_vec(),
            floats: arrays.floats.clone(),
        };
        assert!(matches!(unpack(&short), Err(Error::Truncated(_))));
    }

    #[test]
    fn test_mixed_step_is_rejected() {
        let mut map = model();
        let mut main = map.remove("main.ldr").unwrap();
        main.steps[1].add_sub_model(SubModelPlacement::at_origin(16, "3001.dat"));
        map.insert(main);
        let builder = GeometryBuilder::new(&map);
        assert!(matches!(pack(&builder), Err(Error::InvalidPack(_))));
    }

    #[test]
    fn test_pack_part() {
        let pt = part();
        let packed = pack_part(&pt).unwrap();
        assert_eq!(packed.id, "3001");
        let restored = unpack_part(&packed).unwrap();
        assert_eq!(restored.id, "3001.dat");
        assert_eq!(restored.inlined, Some(Inlined::Storage));
        assert!(restored.is_part && restored.certified_bfc && restored.ccw);
        assert_eq!(restored.model_description.as_deref(), Some("Brick 2 x 4"));

        let a = LdrGeometry::from_primitives(&pt.steps[0]);
        let b = LdrGeometry::from_primitives(&restored.steps[0]);
        assert_eq!(a, b);

        let mut unofficial = part();
        unofficial.ldraw_org = Some("Unofficial_Part".to_string());
        assert!(pack_part(&unofficial).is_none());
    }
}
