use std::path::Path;

use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::transition_graph::TransitionGraph;

const NODE_RADIUS: i32 = 55;
const NODE_COLOR: RGBColor = RGBColor(173, 216, 230);
const EDGE_COLOR: RGBColor = RGBColor(128, 128, 128);
const ARROW_LENGTH: f64 = 16.0;
const EDGE_OFFSET: f64 = 8.0; // Keeps i -> j and j -> i apart

/// Evenly spaced points on a circle, starting at the top and going clockwise
pub fn circular_layout(num_nodes: usize, center: (i32, i32), radius: f64) -> Vec<(i32, i32)> {
    if num_nodes == 1 {
        return vec![center];
    }

    (0..num_nodes)
        .map(|node| {
            let angle = -std::f64::consts::FRAC_PI_2 + 2.0 * std::f64::consts::PI * node as f64 / num_nodes as f64;
            (
                center.0 + (radius * angle.cos()).round() as i32,
                center.1 + (radius * angle.sin()).round() as i32,
            )
        })
        .collect()
}

// Segment between two node borders, shifted sideways by EDGE_OFFSET
fn edge_segment(from: (i32, i32), to: (i32, i32)) -> ((f64, f64), (f64, f64)) {
    let (dx, dy) = ((to.0 - from.0) as f64, (to.1 - from.1) as f64);
    let length = (dx * dx + dy * dy).sqrt().max(1.0);
    let (ux, uy) = (dx / length, dy / length);
    let (nx, ny) = (-uy * EDGE_OFFSET, ux * EDGE_OFFSET);
    let radius = NODE_RADIUS as f64;

    (
        (from.0 as f64 + ux * radius + nx, from.1 as f64 + uy * radius + ny),
        (to.0 as f64 - ux * radius + nx, to.1 as f64 - uy * radius + ny),
    )
}

fn to_pixel(point: (f64, f64)) -> (i32, i32) {
    (point.0.round() as i32, point.1.round() as i32)
}

/// Bar chart of how many time steps carry each label
pub fn plot_state_counts(path: &Path, counts: &[(String, usize)]) -> Result<(), Box<dyn std::error::Error>> {
    let root_area = BitMapBackend::new(path, (800, 600)).into_drawing_area();
    root_area.fill(&WHITE)?;

    let y_max = counts.iter().map(|(_, count)| *count).max().unwrap_or(0) + 1;

    let mut chart = ChartBuilder::on(&root_area)
        .caption("Predicted Migration Patterns", ("sans-serif", 30).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d((0..counts.len()).into_segmented(), 0..y_max)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .y_desc("Time steps")
        .x_labels(counts.len().max(1))
        .x_label_formatter(&|value| match value {
            SegmentValue::CenterOf(index) => counts.get(*index).map(|(label, _)| label.clone()).unwrap_or_default(),
            _ => String::new(),
        })
        .draw()?;

    chart.draw_series(
        Histogram::vertical(&chart)
            .style(BLUE.mix(0.7).filled())
            .margin(30)
            .data(counts.iter().enumerate().map(|(index, (_, count))| (index, *count))),
    )?;

    root_area.present()?;

    Ok(())
}

/// Nodes on a circle, one arrow per edge labeled with its probability
pub fn plot_transition_diagram(path: &Path, graph: &TransitionGraph<String>) -> Result<(), Box<dyn std::error::Error>> {
    let root_area = BitMapBackend::new(path, (800, 600)).into_drawing_area();
    root_area.fill(&WHITE)?;
    let root_area = root_area.titled("Finite State Machine Representation", ("sans-serif", 28))?;

    let (width, height) = root_area.dim_in_pixel();
    let center = (width as i32 / 2, height as i32 / 2);
    let radius = (width.min(height) as f64 / 2.0 - NODE_RADIUS as f64 * 1.8).max(NODE_RADIUS as f64);
    let positions = circular_layout(graph.node_count(), center, radius);

    let centered = Pos::new(HPos::Center, VPos::Center);
    let edge_label_style = ("sans-serif", 14).into_font().color(&BLACK).pos(centered);
    let node_label_style = ("sans-serif", 13).into_font().color(&BLACK).pos(centered);
    let edge_style = EDGE_COLOR.stroke_width(2);

    for edge in graph.edges() {
        let from = positions[edge.from];
        let to = positions[edge.to];

        if edge.is_self_loop() {
            // Small circle sitting on top of the node, pointing away from the diagram center
            let (dx, dy) = ((from.0 - center.0) as f64, (from.1 - center.1) as f64);
            let length = (dx * dx + dy * dy).sqrt();
            let (ux, uy) = if length < 1.0 { (0.0, -1.0) } else { (dx / length, dy / length) };
            let loop_radius = NODE_RADIUS as f64 * 0.45;
            let loop_center = (
                from.0 as f64 + ux * (NODE_RADIUS as f64 + loop_radius * 0.6),
                from.1 as f64 + uy * (NODE_RADIUS as f64 + loop_radius * 0.6),
            );

            root_area.draw(&Circle::new(to_pixel(loop_center), loop_radius.round() as i32, edge_style))?;

            let label_point = (loop_center.0 + ux * (loop_radius + 12.0), loop_center.1 + uy * (loop_radius + 12.0));
            root_area.draw(&Text::new(edge.formatted_weight(), to_pixel(label_point), edge_label_style.clone()))?;
            continue;
        }

        let (start, end) = edge_segment(from, to);
        root_area.draw(&PathElement::new(vec![to_pixel(start), to_pixel(end)], edge_style))?;

        // Arrow head
        let (dx, dy) = (end.0 - start.0, end.1 - start.1);
        let length = (dx * dx + dy * dy).sqrt().max(1.0);
        let (ux, uy) = (dx / length, dy / length);
        for side in [-1.0, 1.0] {
            let wing = (
                end.0 - ARROW_LENGTH * ux + side * ARROW_LENGTH * 0.5 * uy,
                end.1 - ARROW_LENGTH * uy - side * ARROW_LENGTH * 0.5 * ux,
            );
            root_area.draw(&PathElement::new(vec![to_pixel(end), to_pixel(wing)], edge_style))?;
        }

        let middle = ((start.0 + end.0) / 2.0 - uy * 12.0, (start.1 + end.1) / 2.0 + ux * 12.0);
        root_area.draw(&Text::new(edge.formatted_weight(), to_pixel(middle), edge_label_style.clone()))?;
    }

    for (node, &position) in graph.nodes().iter().zip(&positions) {
        root_area.draw(&Circle::new(position, NODE_RADIUS, NODE_COLOR.filled()))?;
        root_area.draw(&Text::new(node.label.clone(), position, node_label_style.clone()))?;
    }

    root_area.present()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circular_layout_points_on_circle() {
        let positions = circular_layout(3, (400, 300), 100.0);

        assert_eq!(positions.len(), 3);
        assert_eq!(positions[0], (400, 200)); // First node at the top
        for &(x, y) in &positions {
            let distance = (((x - 400).pow(2) + (y - 300).pow(2)) as f64).sqrt();
            assert!((distance - 100.0).abs() < 1.0);
        }
    }

    #[test]
    fn test_single_node_is_centered() {
        assert_eq!(circular_layout(1, (10, 20), 50.0), vec![(10, 20)]);
        assert!(circular_layout(0, (10, 20), 50.0).is_empty());
    }

    // Opposite edges between the same pair of nodes do not overlap
    #[test]
    fn test_opposite_edges_are_separated() {
        let (forward_start, _) = edge_segment((0, 0), (300, 0));
        let (_, backward_end) = edge_segment((300, 0), (0, 0));

        assert!((forward_start.1 - backward_end.1).abs() > EDGE_OFFSET);
    }
}
