//! Changeset bounds accumulation.
//!
//! A changeset's geographic extent is kept as at most `changeset_bbox_limit`
//! disjoint rectangles. Each contributed point either grows a rectangle
//! whose buffered extent covers it, opens a new rectangle while below the
//! limit, or merges into the nearest rectangle (Chebyshev) at the limit.
//! A final sweep merges rectangles whose buffered extents overlap.

use smallvec::SmallVec;

use crate::config::Limits;
use crate::model::{Point, Rect};

pub(crate) fn change_bounds(
    existing: &[Rect],
    points: &[Point],
    limits: &Limits,
) -> SmallVec<[Rect; 10]> {
    let mut rects: Vec<Rect> = existing.to_vec();

    for &point in points {
        if let Some(i) = rects
            .iter()
            .position(|r| r.buffered(limits).contains(point))
        {
            rects[i].expand_to(point);
            continue;
        }
        if rects.len() < limits.changeset_bbox_limit || rects.is_empty() {
            rects.push(Rect::from_point(point));
            continue;
        }
        let nearest = rects
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.chebyshev_to(point).total_cmp(&b.chebyshev_to(point)))
            .map(|(i, _)| i);
        if let Some(i) = nearest {
            rects[i].expand_to(point);
        }
    }

    // merge rectangles whose buffered extents now overlap, to a fixpoint
    'sweep: loop {
        for a in 0..rects.len() {
            for b in (a + 1)..rects.len() {
                if rects[a].buffered(limits).intersects(&rects[b]) {
                    let merged = rects[a].union(&rects[b]);
                    rects[a] = merged;
                    rects.remove(b);
                    continue 'sweep;
                }
            }
        }
        break;
    }

    rects.into_iter().collect()
}
