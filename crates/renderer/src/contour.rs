//! Contour line (isoline) extraction using the marching squares algorithm.
//!
//! Coordinates produced here are fractional grid indices (x = column,
//! y = row). Callers map them to pixels or geographic positions.

/// A point in grid-index space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn distance(&self, other: &Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// A line segment between two points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: Point,
    pub end: Point,
}

/// A connected contour line (polyline)
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    pub level: f32,
    pub points: Vec<Point>,
    pub closed: bool,
}

impl Contour {
    /// Polyline length in grid units.
    pub fn length(&self) -> f32 {
        self.points.windows(2).map(|w| w[0].distance(&w[1])).sum()
    }

    /// Point halfway along the polyline, used to anchor a label.
    pub fn midpoint(&self) -> Option<Point> {
        let half = self.length() / 2.0;
        let mut walked = 0.0;
        for w in self.points.windows(2) {
            let step = w[0].distance(&w[1]);
            if walked + step >= half && step > 0.0 {
                let t = (half - walked) / step;
                return Some(Point::new(
                    w[0].x + t * (w[1].x - w[0].x),
                    w[0].y + t * (w[1].y - w[0].y),
                ));
            }
            walked += step;
        }
        self.points.first().copied()
    }
}

/// `count` evenly spaced levels from `min` to `max` inclusive.
pub fn contour_levels(min: f32, max: f32, count: usize) -> Vec<f32> {
    match count {
        0 => vec![],
        1 => vec![min],
        n => {
            let step = (max - min) / (n - 1) as f32;
            (0..n).map(|i| min + step * i as f32).collect()
        }
    }
}

/// Marching squares over a row-major grid for a single level.
pub fn march_squares(data: &[f32], width: usize, height: usize, level: f32) -> Vec<Segment> {
    if width < 2 || height < 2 || data.len() != width * height {
        return vec![];
    }

    let mut segments = Vec::new();

    for y in 0..(height - 1) {
        for x in 0..(width - 1) {
            let tl = data[y * width + x];
            let tr = data[y * width + x + 1];
            let bl = data[(y + 1) * width + x];
            let br = data[(y + 1) * width + x + 1];

            if tl.is_nan() || tr.is_nan() || bl.is_nan() || br.is_nan() {
                continue;
            }

            let mut case = 0u8;
            if tl >= level {
                case |= 1;
            }
            if tr >= level {
                case |= 2;
            }
            if br >= level {
                case |= 4;
            }
            if bl >= level {
                case |= 8;
            }

            cell_segments(case, x as f32, y as f32, [tl, tr, br, bl], level, &mut segments);
        }
    }

    segments
}

fn cell_segments(
    case: u8,
    x: f32,
    y: f32,
    [tl, tr, br, bl]: [f32; 4],
    level: f32,
    out: &mut Vec<Segment>,
) {
    let top = || interpolate_edge((x, y), (x + 1.0, y), tl, tr, level);
    let right = || interpolate_edge((x + 1.0, y), (x + 1.0, y + 1.0), tr, br, level);
    let bottom = || interpolate_edge((x, y + 1.0), (x + 1.0, y + 1.0), bl, br, level);
    let left = || interpolate_edge((x, y), (x, y + 1.0), tl, bl, level);

    let mut push = |start: Point, end: Point| out.push(Segment { start, end });

    match case {
        0 | 15 => {}
        1 | 14 => push(left(), top()),
        2 | 13 => push(top(), right()),
        3 | 12 => push(left(), right()),
        4 | 11 => push(right(), bottom()),
        6 | 9 => push(top(), bottom()),
        7 | 8 => push(left(), bottom()),
        // saddles
        5 => {
            push(left(), top());
            push(right(), bottom());
        }
        10 => {
            push(top(), right());
            push(left(), bottom());
        }
        _ => {}
    }
}

/// Where `level` crosses the edge between two corners.
fn interpolate_edge(p1: (f32, f32), p2: (f32, f32), val1: f32, val2: f32, level: f32) -> Point {
    if (val2 - val1).abs() < 1e-6 {
        return Point::new((p1.0 + p2.0) / 2.0, (p1.1 + p2.1) / 2.0);
    }

    let t = ((level - val1) / (val2 - val1)).clamp(0.0, 1.0);
    Point::new(p1.0 + t * (p2.0 - p1.0), p1.1 + t * (p2.1 - p1.1))
}

/// Join unordered segments into polylines by matching endpoints.
pub fn connect_segments(segments: &[Segment], level: f32) -> Vec<Contour> {
    const EPSILON: f32 = 0.001;

    let mut contours = Vec::new();
    let mut used = vec![false; segments.len()];

    for start_idx in 0..segments.len() {
        if used[start_idx] {
            continue;
        }
        used[start_idx] = true;

        let mut points = vec![segments[start_idx].start, segments[start_idx].end];

        loop {
            let Some(&tail) = points.last() else { break };
            let next = segments.iter().enumerate().find_map(|(i, seg)| {
                if used[i] {
                    None
                } else if seg.start.distance(&tail) < EPSILON {
                    Some((i, seg.end))
                } else if seg.end.distance(&tail) < EPSILON {
                    Some((i, seg.start))
                } else {
                    None
                }
            });

            match next {
                Some((i, point)) => {
                    used[i] = true;
                    points.push(point);
                }
                None => break,
            }
        }

        let closed = points.len() > 2 && points[0].distance(&points[points.len() - 1]) < EPSILON;
        contours.push(Contour {
            level,
            points,
            closed,
        });
    }

    contours
}

/// Contours for every level, skipping levels that never cross the grid.
pub fn generate_contours(data: &[f32], width: usize, height: usize, levels: &[f32]) -> Vec<Contour> {
    levels
        .iter()
        .flat_map(|&level| connect_segments(&march_squares(data, width, height, level), level))
        .collect()
}
