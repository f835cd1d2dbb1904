// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Multi-part assemblies
//!
//! Some parts are sold as assemblies of several parts, such as minifig hips
//! with both legs attached. When all members of an assembly are placed in
//! the same step as its main part, they are collapsed into one placement of a
//! generated assembly part.
//!
//! Colors must match: a member with a fixed color matches exactly, and a
//! member of color 16 must have the color of the main part.

use ldraw_model::{
    ColorId, Inlined, Mat3, PartType, PartTypeMap, Step, SubModelPlacement, Vec3, MAIN_COLOR,
};
use rustc_hash::FxHashMap;

/// A known assembly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssemblyDefinition {
    pub id: &'static str,
    pub description: &'static str,
    pub main_part: &'static str,
    /// Color of the main part, 16 for any color
    pub main_color: ColorId,
    /// Other members with their colors, 16 for the color of the main part
    pub members: &'static [(&'static str, ColorId)],
}

/// Built-in assembly table
pub const ASSEMBLIES: &[AssemblyDefinition] = &[
    AssemblyDefinition {
        id: "970c00.dat",
        description: "Minifig Hips and Legs",
        main_part: "3815.dat",
        main_color: MAIN_COLOR,
        members: &[("3816.dat", MAIN_COLOR), ("3817.dat", MAIN_COLOR)],
    },
    AssemblyDefinition {
        id: "973c00.dat",
        description: "Minifig Torso with Arms and Yellow Hands",
        main_part: "973.dat",
        main_color: MAIN_COLOR,
        members: &[
            ("3818.dat", MAIN_COLOR),
            ("3819.dat", MAIN_COLOR),
            ("3820.dat", 14),
            ("3820.dat", 14),
        ],
    },
    AssemblyDefinition {
        id: "76382.dat",
        description: "Minifig Torso with Red Arms and Yellow Hands",
        main_part: "973.dat",
        main_color: MAIN_COLOR,
        members: &[("3818.dat", 4), ("3819.dat", 4), ("3820.dat", 14), ("3820.dat", 14)],
    },
];

/// Finds and collapses assemblies in steps
#[derive(Debug, Clone)]
pub struct AssemblyManager {
    by_main_part: FxHashMap<&'static str, Vec<&'static AssemblyDefinition>>,
}

impl Default for AssemblyManager {
    fn default() -> Self {
        Self::new(ASSEMBLIES)
    }
}

impl AssemblyManager {
    pub fn new(definitions: &'static [AssemblyDefinition]) -> Self {
        let mut by_main_part: FxHashMap<&'static str, Vec<&'static AssemblyDefinition>> =
            FxHashMap::default();
        for def in definitions {
            by_main_part.entry(def.main_part).or_default().push(def);
        }
        log::debug!("Assembly table built for {} main parts", by_main_part.len());
        Self { by_main_part }
    }

    /// Collapse the assemblies found in `step`
    ///
    /// Generated assembly part types are inserted into `part_types` unless
    /// already present. Returns the IDs of the assemblies placed.
    pub fn handle_step(&self, step: &mut Step, part_types: &mut PartTypeMap) -> Vec<String> {
        let mut removed = vec![false; step.sub_models.len()];
        let mut placed = Vec::new();

        for idx in 0..step.sub_models.len() {
            if removed[idx] {
                continue;
            }
            let Some(definitions) = self.by_main_part.get(step.sub_models[idx].id.as_str()) else {
                continue;
            };
            for def in definitions {
                let main = &step.sub_models[idx];
                if def.main_color != MAIN_COLOR && def.main_color != main.color {
                    continue;
                }
                let Some(found) = find_members(def, step, idx, &removed) else {
                    continue;
                };

                log::debug!("Replacing {} with assembly {}", main.id, def.id);
                for &(i, _) in &found {
                    removed[i] = true;
                }
                if !part_types.contains(def.id) {
                    part_types.insert(build_assembly(def, step, idx, &found));
                }
                step.sub_models[idx].id = def.id.to_string();
                placed.push(def.id.to_string());
                break;
            }
        }

        let mut i = 0;
        step.sub_models.retain(|_| {
            let keep = !removed[i];
            i += 1;
            keep
        });
        placed
    }
}

/// Indices of the placements completing `def` around the main part at
/// `main_idx`, with the member color they matched
fn find_members(
    def: &AssemblyDefinition,
    step: &Step,
    main_idx: usize,
    removed: &[bool],
) -> Option<Vec<(usize, ColorId)>> {
    let main_color = step.sub_models[main_idx].color;
    let mut remaining: FxHashMap<(String, ColorId), usize> = FxHashMap::default();
    for &(id, color) in def.members {
        *remaining.entry((id.to_string(), color)).or_default() += 1;
    }

    let mut found = Vec::new();
    for (i, sm) in step.sub_models.iter().enumerate() {
        if i == main_idx || removed[i] {
            continue;
        }
        if sm.color != MAIN_COLOR && take_one(&mut remaining, &sm.id, sm.color) {
            found.push((i, sm.color));
            continue;
        }
        if sm.color == main_color && take_one(&mut remaining, &sm.id, MAIN_COLOR) {
            found.push((i, MAIN_COLOR));
        }
    }
    (found.len() == def.members.len()).then_some(found)
}

fn take_one(remaining: &mut FxHashMap<(String, ColorId), usize>, id: &str, color: ColorId) -> bool {
    match remaining.get_mut(&(id.to_string(), color)) {
        Some(cnt) if *cnt > 0 => {
            *cnt -= 1;
            true
        }
        _ => false,
    }
}

/// Assembly part type with members placed relative to the main part
fn build_assembly(
    def: &AssemblyDefinition,
    step: &Step,
    main_idx: usize,
    found: &[(usize, ColorId)],
) -> PartType {
    let main = &step.sub_models[main_idx];
    let inverse = main
        .rotation
        .try_inverse()
        .unwrap_or_else(|| main.rotation.transpose());

    let mut assembly_step = Step::new();
    assembly_step.add_sub_model(SubModelPlacement::new(
        def.main_color,
        Vec3::zeros(),
        Mat3::identity(),
        def.main_part,
        true,
        false,
    ));
    for &(i, color) in found {
        let member = &step.sub_models[i];
        let mut placement = member.clone_colored(color);
        placement.position = inverse * (member.position - main.position);
        placement.rotation = inverse * member.rotation;
        placement.comment_lines.clear();
        assembly_step.add_sub_model(placement);
    }

    let mut pt = PartType::new(def.id);
    pt.model_description = Some(def.description.to_string());
    pt.author = Some("ldraw-lite assemblies".to_string());
    pt.license = Some("Redistributable under CCAL version 2.0 : see CAreadme.txt".to_string());
    pt.inlined = Some(Inlined::Generated);
    pt.ldraw_org = Some("Part".to_string());
    pt.certified_bfc = true;
    pt.ccw = true;
    pt.cleaned = true;
    pt.is_part = true;
    pt.steps.push(assembly_step);
    pt
}
