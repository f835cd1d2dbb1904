// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Primitive generator
//!
//! The most common circular primitives are generated in code instead of
//! being fetched. Each generated part type is a pure function of its ID.
//! Circles are divided into 16 segments, so `n-4` primitives cover `n`
//! quarters.

use ldraw_model::{
    ConditionalLine, Inlined, Line, Mat3, PartType, Quad, Step, SubModelPlacement, Triangle, Vec3,
    EDGE_COLOR, MAIN_COLOR,
};
use std::f64::consts::PI;

const GENERATED_LICENSE: &str = "Redistributable under CCAL version 2.0 : see CAreadme.txt";
const AUTHOR: &str = "ldraw-lite generator";

/// Generate the primitive `id`, if it is one the generator knows
pub fn generate(id: &str) -> Option<PartType> {
    let stem = id.strip_suffix(".dat")?;
    let (sections, kind) = stem.split_once("-4")?;
    let sections: u32 = match sections {
        "1" => 1,
        "2" => 2,
        "4" => 4,
        _ => return None,
    };

    match kind {
        "edge" => Some(circle(sections)),
        "cyli" => Some(cylinder(sections, true)),
        "cyli2" => Some(cylinder(sections, false)),
        "cylc" => Some(cylinder_closed(sections)),
        "cyls" => Some(cylinder_sloped(sections)),
        "disc" => Some(disc(sections)),
        "ring1" if sections == 2 => Some(ring(sections, 1)),
        "ring2" | "ring3" | "ring5" | "ring6" if sections == 4 => {
            let size = kind[4..].parse().ok()?;
            Some(ring(sections, size))
        }
        _ => None,
    }
}

/// Whether `id` can be generated
pub fn can_generate(id: &str) -> bool {
    generate(id).is_some()
}

/// Box shown in place of a part that could not be fetched
pub fn make_box(id: &str) -> PartType {
    let mut pt = PartType::new(id);
    pt.model_description = Some(format!("Showing a box in the absence of part {}", id));
    pt.author = Some(AUTHOR.to_string());
    pt.license = Some(GENERATED_LICENSE.to_string());
    pt.inlined = Some(Inlined::Generated);
    pt.ldraw_org = Some("Part".to_string());
    pt.certified_bfc = true;
    pt.ccw = true;
    pt.cleaned = true;
    pt.is_part = true;

    let (x0, x1, y0, y1, z0, z1) = (-10.0, 10.0, 0.0, 24.0, -10.0, 10.0);
    let corner = |i: usize| {
        Vec3::new(
            if i & 1 == 0 { x0 } else { x1 },
            if i & 2 == 0 { y0 } else { y1 },
            if i & 4 == 0 { z0 } else { z1 },
        )
    };

    let mut step = Step::new();
    // Faces wound counter-clockwise seen from outside.
    const FACES: [[usize; 4]; 6] = [
        [0, 1, 5, 4],
        [2, 6, 7, 3],
        [0, 4, 6, 2],
        [1, 3, 7, 5],
        [0, 2, 3, 1],
        [4, 5, 7, 6],
    ];
    for [a, b, c, d] in FACES {
        step.add_quad(Quad::new(
            MAIN_COLOR,
            corner(a),
            corner(b),
            corner(c),
            corner(d),
            true,
            false,
        ));
    }
    for i in 0..8usize {
        for bit in [1, 2, 4] {
            if i & bit == 0 {
                step.add_line(Line::new(EDGE_COLOR, corner(i), corner(i | bit)));
            }
        }
    }
    pt.steps.push(step);
    pt
}

fn primitive(description: String, id: String) -> PartType {
    let mut pt = PartType::new(id);
    pt.model_description = Some(description);
    pt.author = Some(AUTHOR.to_string());
    pt.license = Some(GENERATED_LICENSE.to_string());
    pt.inlined = Some(Inlined::Generated);
    pt.ldraw_org = Some("Primitive".to_string());
    pt.certified_bfc = true;
    pt.ccw = true;
    pt.cleaned = true;
    pt.is_part = true;
    pt
}

fn fraction(sections: u32) -> f64 {
    f64::from(sections) * 0.25
}

/// Point on the unit circle in the XZ plane at segment `i`
fn on_circle(i: u32, y: f64) -> Vec3 {
    let angle = f64::from(i) * PI / 8.0;
    Vec3::new(angle.cos(), y, angle.sin())
}

fn circle(sections: u32) -> PartType {
    let mut pt = primitive(format!("Circle {}", fraction(sections)), format!("{}-4edge.dat", sections));
    let mut step = Step::new();
    let mut prev = Vec3::x();
    for i in 1..=4 * sections {
        let p = on_circle(i, 0.0);
        step.add_line(Line::new(EDGE_COLOR, prev, p));
        prev = p;
    }
    pt.steps.push(step);
    pt
}

fn cylinder(sections: u32, conditional_lines: bool) -> PartType {
    let mut description = format!("Cylinder {}", fraction(sections));
    if !conditional_lines {
        description.push_str(" without Conditional Lines");
    }
    let suffix = if conditional_lines { "cyli" } else { "cyli2" };
    let mut pt = primitive(description, format!("{}-4{}.dat", sections, suffix));

    let mut step = Step::new();
    let mut p0 = Vec3::new(1.0, 0.0, 0.0);
    let mut p1 = Vec3::new(1.0, 1.0, 0.0);
    let mut next0 = on_circle(1, 0.0);
    let mut next1 = on_circle(1, 1.0);
    for i in 2..4 * sections + 2 {
        let (prev0, prev1) = (p0, p1);
        p0 = next0;
        p1 = next1;
        next0 = on_circle(i, 0.0);
        next1 = on_circle(i, 1.0);

        step.add_quad(Quad::new(MAIN_COLOR, prev1, p1, p0, prev0, true, false));
        if conditional_lines {
            step.add_conditional_line(ConditionalLine::new(EDGE_COLOR, p0, p1, prev0, next0));
        }
    }
    pt.steps.push(step);
    pt
}

fn cylinder_closed(sections: u32) -> PartType {
    let mut pt = primitive(
        format!("Cylinder Closed {}", fraction(sections)),
        format!("{}-4cylc.dat", sections),
    );
    let mut step = Step::new();
    let place = |position: Vec3, kind: &str| {
        SubModelPlacement::new(
            MAIN_COLOR,
            position,
            Mat3::identity(),
            format!("{}-4{}.dat", sections, kind),
            true,
            false,
        )
    };
    step.add_sub_model(place(Vec3::zeros(), "edge"));
    step.add_sub_model(place(Vec3::y(), "edge"));
    step.add_sub_model(place(Vec3::zeros(), "disc"));
    step.add_sub_model(place(Vec3::zeros(), "cyli"));
    pt.steps.push(step);
    pt
}

fn cylinder_sloped(sections: u32) -> PartType {
    let mut pt = primitive(
        format!("Cylinder Sloped {}", fraction(sections)),
        format!("{}-4cyls.dat", sections),
    );
    let sloped = |i: u32| {
        let p = on_circle(i, 0.0);
        Vec3::new(p.x, 1.0 - p.x, p.z)
    };

    let mut step = Step::new();
    let mut p0 = Vec3::new(1.0, 0.0, 0.0);
    let mut p1 = Vec3::new(1.0, 0.0, 0.0);
    let mut next0 = on_circle(1, 0.0);
    let mut next1 = sloped(1);
    for i in 2..4 * sections + 2 {
        let (prev0, prev1) = (p0, p1);
        p0 = next0;
        p1 = next1;
        next0 = on_circle(i, 0.0);
        next1 = sloped(i);

        // The slope reaches zero height at both ends of a half circle.
        match i {
            2 => step.add_triangle(Triangle::new(MAIN_COLOR, prev1, p1, p0, true, false)),
            17 => step.add_triangle(Triangle::new(MAIN_COLOR, prev1, p1, prev0, true, false)),
            _ => step.add_quad(Quad::new(MAIN_COLOR, prev1, p1, p0, prev0, true, false)),
        }
        step.add_conditional_line(ConditionalLine::new(EDGE_COLOR, p0, p1, prev0, next0));
    }
    pt.steps.push(step);
    pt
}

fn disc(sections: u32) -> PartType {
    let mut pt = primitive(format!("Disc {}", fraction(sections)), format!("{}-4disc.dat", sections));
    let mut step = Step::new();
    let mut prev = Vec3::x();
    for i in 1..=4 * sections {
        let p = on_circle(i, 0.0);
        step.add_triangle(Triangle::new(MAIN_COLOR, Vec3::zeros(), prev, p, true, false));
        prev = p;
    }
    pt.steps.push(step);
    pt
}

fn ring(sections: u32, size: u32) -> PartType {
    let mut pt = primitive(
        format!("Ring {} x {}", size, fraction(sections)),
        format!("{}-4ring{}.dat", sections, size),
    );
    let inner = f64::from(size);
    let outer = inner + 1.0;

    let mut step = Step::new();
    let mut prev_inner = Vec3::new(inner, 0.0, 0.0);
    let mut prev_outer = Vec3::new(outer, 0.0, 0.0);
    for i in 1..=4 * sections {
        let p = on_circle(i, 0.0);
        let p_outer = p * outer;
        let p_inner = p * inner;
        step.add_quad(Quad::new(MAIN_COLOR, p_outer, p_inner, prev_inner, prev_outer, true, false));
        prev_inner = p_inner;
        prev_outer = p_outer;
    }
    pt.steps.push(step);
    pt
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_known_ids() {
        for id in [
            "1-4edge.dat",
            "4-4cyli.dat",
            "2-4cyli2.dat",
            "4-4cylc.dat",
            "1-4cyls.dat",
            "2-4disc.dat",
            "2-4ring1.dat",
            "4-4ring6.dat",
        ] {
            let pt = generate(id).unwrap();
            assert_eq!(pt.id, id);
            assert!(pt.is_part);
            assert!(pt.is_official_ldraw());
            assert_eq!(pt.steps.len(), 1);
        }
        assert!(generate("3-4edge.dat").is_none());
        assert!(generate("4-4ring1.dat").is_none());
        assert!(generate("3001.dat").is_none());
        assert!(!can_generate("4-4edge.ldr"));
    }

    #[test]
    fn test_circle() {
        let pt = generate("4-4edge.dat").unwrap();
        let lines = &pt.steps[0].lines;
        assert_eq!(lines.len(), 16);
        assert_eq!(lines[0].p1, Vec3::x());
        assert_relative_eq!(lines[15].p2, Vec3::x(), epsilon = 1e-12);
        for line in lines {
            assert_relative_eq!(line.p2.norm(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_cylinder() {
        let with = generate("1-4cyli.dat").unwrap();
        assert_eq!(with.steps[0].quads.len(), 4);
        assert_eq!(with.steps[0].conditional_lines.len(), 4);
        let without = generate("1-4cyli2.dat").unwrap();
        assert!(without.steps[0].conditional_lines.is_empty());
        assert_eq!(
            without.model_description.as_deref(),
            Some("Cylinder 0.25 without Conditional Lines")
        );
    }

    #[test]
    fn test_sloped_cylinder_ends_in_triangles() {
        let pt = generate("2-4cyls.dat").unwrap();
        assert_eq!(pt.steps[0].triangles.len(), 1);
        assert_eq!(pt.steps[0].quads.len(), 7);
    }

    #[test]
    fn test_closed_cylinder_references() {
        let pt = generate("2-4cylc.dat").unwrap();
        let ids: Vec<&str> = pt.steps[0].sub_models.iter().map(|sm| sm.id.as_str()).collect();
        assert_eq!(ids, vec!["2-4edge.dat", "2-4edge.dat", "2-4disc.dat", "2-4cyli.dat"]);
    }

    #[test]
    fn test_box() {
        let pt = make_box("missing.dat");
        assert_eq!(pt.id, "missing.dat");
        assert_eq!(pt.steps[0].quads.len(), 6);
        assert_eq!(pt.steps[0].lines.len(), 12);
        for q in &pt.steps[0].quads {
            let n = (q.p2 - q.p1).cross(&(q.p3 - q.p1));
            let center = (q.p1 + q.p2 + q.p3 + q.p4) / 4.0 - Vec3::new(0.0, 12.0, 0.0);
            assert!(n.dot(&center) > 0.0);
        }
    }
}
