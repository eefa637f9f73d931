//! Force-directed layout with an SVG renderer.
//!
//! Backs the knowledge-graph browser when no canvas renderer is available and
//! the "auto arrange" action of both designers.

use std::collections::HashMap;
use std::f64::consts::PI;
use std::fmt::Write as _;

use crate::models::Position;

const COLORS: &[&str] = &[
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#7f7f7f",
    "#bcbd22", "#17becf",
];

pub const NODE_RADIUS: f64 = 8.0;

#[derive(Clone, Debug)]
pub struct LayoutParams {
    pub force_charge: f64,
    pub force_spring: f64,
    pub spring_length: f64,
    pub gravity: f64,
    pub damping_factor: f64,
    pub max_displacement: f64,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            force_charge: 4000.0,
            force_spring: 0.05,
            spring_length: 180.0,
            gravity: 0.01,
            damping_factor: 0.85,
            max_displacement: 50.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GraphNode {
    pub id: String,
    pub label: Option<String>,
    pub group: Option<u32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GraphLink {
    pub source: String,
    pub target: String,
}

#[derive(Clone, Debug)]
struct Body {
    id: String,
    label: String,
    color: &'static str,
    x: f64,
    y: f64,
    vx: f64,
    vy: f64,
}

pub struct ForceLayout {
    params: LayoutParams,
    bodies: Vec<Body>,
    links: Vec<(usize, usize)>,
    center: (f64, f64),
}

impl ForceLayout {
    /// Seed nodes on a circle around `center`; links to unknown ids are
    /// dropped.
    pub fn new(nodes: &[GraphNode], links: &[GraphLink], center: (f64, f64)) -> Self {
        Self::with_params(nodes, links, center, LayoutParams::default())
    }

    pub fn with_params(
        nodes: &[GraphNode],
        links: &[GraphLink],
        center: (f64, f64),
        params: LayoutParams,
    ) -> Self {
        let count = nodes.len().max(1) as f64;
        let radius = 60.0 + 20.0 * count.sqrt();
        let mut index = HashMap::new();

        let bodies = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| {
                index.insert(node.id.clone(), i);
                let angle = (i as f64) * 2.0 * PI / count;
                Body {
                    id: node.id.clone(),
                    label: node.label.clone().unwrap_or_else(|| node.id.clone()),
                    color: COLORS[node.group.unwrap_or(0) as usize % COLORS.len()],
                    x: center.0 + radius * angle.cos(),
                    y: center.1 + radius * angle.sin(),
                    vx: 0.0,
                    vy: 0.0,
                }
            })
            .collect();

        let links = links
            .iter()
            .filter_map(|l| Some((*index.get(&l.source)?, *index.get(&l.target)?)))
            .collect();

        Self {
            params,
            bodies,
            links,
            center,
        }
    }

    /// Seed from existing positions instead of a circle.
    pub fn from_positions(
        nodes: &[(String, Position)],
        links: &[GraphLink],
        center: (f64, f64),
    ) -> Self {
        let graph_nodes: Vec<GraphNode> = nodes
            .iter()
            .map(|(id, _)| GraphNode { id: id.clone(), label: None, group: None })
            .collect();
        let mut layout = Self::new(&graph_nodes, links, center);
        for (body, (_, pos)) in layout.bodies.iter_mut().zip(nodes) {
            if pos.x.is_finite() && pos.y.is_finite() {
                body.x = pos.x;
                body.y = pos.y;
            }
        }
        layout
    }

    pub fn step(&mut self) {
        let n = self.bodies.len();
        let mut forces = vec![(0.0_f64, 0.0_f64); n];
        let p = &self.params;

        for i in 0..n {
            for j in (i + 1)..n {
                let (mut dx, mut dy) = (
                    self.bodies[j].x - self.bodies[i].x,
                    self.bodies[j].y - self.bodies[i].y,
                );
                let mut dist_sq = dx * dx + dy * dy;
                if dist_sq < 1e-6 {
                    // Coincident: separate along a fixed per-pair direction.
                    let angle = ((i * 31 + j * 17) % 360) as f64 * PI / 180.0;
                    dx = angle.cos();
                    dy = angle.sin();
                    dist_sq = 1.0;
                }
                let dist = dist_sq.sqrt();
                let f = p.force_charge / dist_sq;
                let (fx, fy) = (f * dx / dist, f * dy / dist);
                forces[i].0 -= fx;
                forces[i].1 -= fy;
                forces[j].0 += fx;
                forces[j].1 += fy;
            }
        }

        for &(a, b) in &self.links {
            if a == b {
                continue;
            }
            let dx = self.bodies[b].x - self.bodies[a].x;
            let dy = self.bodies[b].y - self.bodies[a].y;
            let dist = (dx * dx + dy * dy).sqrt().max(1e-3);
            let f = p.force_spring * (dist - p.spring_length);
            let (fx, fy) = (f * dx / dist, f * dy / dist);
            forces[a].0 += fx;
            forces[a].1 += fy;
            forces[b].0 -= fx;
            forces[b].1 -= fy;
        }

        for (body, (fx, fy)) in self.bodies.iter_mut().zip(forces) {
            let gx = (self.center.0 - body.x) * p.gravity;
            let gy = (self.center.1 - body.y) * p.gravity;
            body.vx = (body.vx + fx + gx) * p.damping_factor;
            body.vy = (body.vy + fy + gy) * p.damping_factor;

            let speed = (body.vx * body.vx + body.vy * body.vy).sqrt();
            if speed > p.max_displacement {
                body.vx *= p.max_displacement / speed;
                body.vy *= p.max_displacement / speed;
            }
            body.x += body.vx;
            body.y += body.vy;
        }
    }

    pub fn run(&mut self, iterations: usize) {
        for _ in 0..iterations {
            self.step();
        }
    }

    pub fn positions(&self) -> Vec<(String, Position)> {
        self.bodies
            .iter()
            .map(|b| (b.id.clone(), Position::new(b.x, b.y)))
            .collect()
    }

    /// Standalone SVG document, translated so the drawing's bounding box sits
    /// inside `width` x `height`.
    pub fn render_svg(&self, width: f64, height: f64) -> String {
        let (min_x, min_y, max_x, max_y) = self.bodies.iter().fold(
            (f64::MAX, f64::MAX, f64::MIN, f64::MIN),
            |(a, b, c, d), body| (a.min(body.x), b.min(body.y), c.max(body.x), d.max(body.y)),
        );
        let margin = NODE_RADIUS * 4.0;
        let (span_x, span_y) = if self.bodies.is_empty() {
            (1.0, 1.0)
        } else {
            ((max_x - min_x).max(1.0), (max_y - min_y).max(1.0))
        };
        let scale = ((width - 2.0 * margin) / span_x)
            .min((height - 2.0 * margin) / span_y)
            .clamp(0.1, 1.0);
        let project = |b: &Body| {
            (
                margin + (b.x - min_x) * scale,
                margin + (b.y - min_y) * scale,
            )
        };

        let mut svg = String::new();
        let _ = write!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = width,
            h = height
        );
        svg.push_str(r##"<g class="links" stroke="#64b4ff" stroke-width="1.5">"##);
        for &(a, b) in &self.links {
            let (x1, y1) = project(&self.bodies[a]);
            let (x2, y2) = project(&self.bodies[b]);
            let _ = write!(
                svg,
                r#"<line x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}"/>"#,
                x1, y1, x2, y2
            );
        }
        svg.push_str("</g><g class=\"nodes\">");
        for body in &self.bodies {
            let (x, y) = project(body);
            let _ = write!(
                svg,
                r#"<circle cx="{:.1}" cy="{:.1}" r="{}" fill="{}"/><text x="{:.1}" y="{:.1}" font-size="10">{}</text>"#,
                x,
                y,
                NODE_RADIUS,
                body.color,
                x + NODE_RADIUS + 3.0,
                y + 3.0,
                escape_xml(&body.label)
            );
        }
        svg.push_str("</g></svg>");
        svg
    }
}

fn escape_xml(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str) -> GraphNode {
        GraphNode { id: id.into(), label: None, group: None }
    }

    fn link(s: &str, t: &str) -> GraphLink {
        GraphLink { source: s.into(), target: t.into() }
    }

    #[test]
    fn positions_stay_finite() {
        let nodes: Vec<_> = (0..12).map(|i| node(&format!("n{}", i))).collect();
        let links: Vec<_> = (1..12).map(|i| link("n0", &format!("n{}", i))).collect();
        let mut layout = ForceLayout::new(&nodes, &links, (400.0, 300.0));
        layout.run(300);
        assert!(layout
            .positions()
            .iter()
            .all(|(_, p)| p.x.is_finite() && p.y.is_finite()));
    }

    #[test]
    fn coincident_nodes_are_pushed_apart() {
        let seed = vec![
            ("a".to_string(), Position::new(10.0, 10.0)),
            ("b".to_string(), Position::new(10.0, 10.0)),
        ];
        let mut layout = ForceLayout::from_positions(&seed, &[], (10.0, 10.0));
        layout.run(20);
        let pos = layout.positions();
        let (a, b) = (pos[0].1, pos[1].1);
        assert!(((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt() > 1.0);
    }

    #[test]
    fn linked_pair_settles_near_spring_length() {
        let seed = vec![
            ("a".to_string(), Position::new(-1500.0, 0.0)),
            ("b".to_string(), Position::new(1500.0, 0.0)),
        ];
        let mut layout = ForceLayout::from_positions(&seed, &[link("a", "b")], (0.0, 0.0));
        layout.run(600);
        let pos: HashMap<_, _> = layout.positions().into_iter().collect();
        let (p, q) = (pos["a"], pos["b"]);
        let d = ((p.x - q.x).powi(2) + (p.y - q.y).powi(2)).sqrt();
        assert!(d > 120.0 && d < 240.0, "distance {}", d);
    }

    #[test]
    fn svg_has_one_shape_per_element_and_escapes_labels() {
        let nodes = vec![
            GraphNode { id: "a".into(), label: Some("R&D <core>".into()), group: Some(3) },
            node("b"),
        ];
        let layout = ForceLayout::new(&nodes, &[link("a", "b"), link("a", "ghost")], (0.0, 0.0));
        let svg = layout.render_svg(640.0, 480.0);
        assert_eq!(svg.matches("<circle").count(), 2);
        assert_eq!(svg.matches("<line").count(), 1);
        assert!(svg.contains("R&amp;D &lt;core&gt;"));
        assert!(svg.starts_with("<svg"));
    }
}
