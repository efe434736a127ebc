use crate::plane::{FRONT, Plane};
use crate::polygon::Polygon;
use std::fmt::Debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[cfg(feature = "parallel")]
use rayon::join;

/// A BSP tree node, containing polygons plus optional front/back subtrees
#[derive(Debug, Clone)]
pub struct Node<S: Clone> {
    pub plane: Option<Plane>,
    pub front: Option<Box<Node<S>>>,
    pub back: Option<Box<Node<S>>>,
    pub polygons: Vec<Polygon<S>>,
}

type Split<S> = (Vec<Polygon<S>>, Vec<Polygon<S>>, Vec<Polygon<S>>, Vec<Polygon<S>>);

impl<S: Clone + Send + Sync + Debug> Node<S> {
    pub fn new(polygons: &[Polygon<S>]) -> Self {
        let mut node = Node {
            plane: None,
            front: None,
            back: None,
            polygons: Vec::new(),
        };
        if !polygons.is_empty() {
            node.build(polygons);
        }
        node
    }

    /// Invert all polygons in the BSP tree
    pub fn invert(&mut self) {
        for p in &mut self.polygons {
            p.flip();
        }
        if let Some(ref mut plane) = self.plane {
            plane.flip();
        }

        #[cfg(feature = "parallel")]
        match (&mut self.front, &mut self.back) {
            (Some(front_node), Some(back_node)) => {
                join(|| front_node.invert(), || back_node.invert());
            }
            (Some(front_node), None) => front_node.invert(),
            (None, Some(back_node)) => back_node.invert(),
            (None, None) => {}
        }

        #[cfg(not(feature = "parallel"))]
        {
            if let Some(ref mut front) = self.front {
                front.invert();
            }
            if let Some(ref mut back) = self.back {
                back.invert();
            }
        }
        std::mem::swap(&mut self.front, &mut self.back);
    }

    #[cfg(not(feature = "parallel"))]
    fn split_all(plane: &Plane, polygons: &[Polygon<S>]) -> Split<S> {
        let mut out: Split<S> = (Vec::new(), Vec::new(), Vec::new(), Vec::new());
        for poly in polygons {
            let (cf, cb, f, b) = plane.split_polygon(poly);
            out.0.extend(cf);
            out.1.extend(cb);
            out.2.extend(f);
            out.3.extend(b);
        }
        out
    }

    #[cfg(feature = "parallel")]
    fn split_all(plane: &Plane, polygons: &[Polygon<S>]) -> Split<S> {
        polygons
            .par_iter()
            .map(|poly| plane.split_polygon(poly))
            .reduce(
                || (Vec::new(), Vec::new(), Vec::new(), Vec::new()),
                |mut acc, x| {
                    acc.0.extend(x.0);
                    acc.1.extend(x.1);
                    acc.2.extend(x.2);
                    acc.3.extend(x.3);
                    acc
                },
            )
    }

    /// Recursively remove all polygons in `polygons` that are inside this BSP tree
    pub fn clip_polygons(&self, polygons: &[Polygon<S>]) -> Vec<Polygon<S>> {
        let Some(plane) = self.plane.as_ref() else {
            return polygons.to_vec();
        };

        let (coplanar_front, coplanar_back, mut front, mut back) = Self::split_all(plane, polygons);

        // coplanar polygons follow their own orientation
        for cp in coplanar_front.into_iter().chain(coplanar_back) {
            if plane.normal.dot(&cp.plane.normal) > 0.0 {
                front.push(cp);
            } else {
                back.push(cp);
            }
        }

        if let Some(ref f) = self.front {
            front = f.clip_polygons(&front);
        }
        match self.back {
            Some(ref b) => back = b.clip_polygons(&back),
            None => back.clear(),
        }

        front.extend(back);
        front
    }

    /// Remove all polygons in this BSP tree that are inside the other BSP tree
    pub fn clip_to(&mut self, bsp: &Node<S>) {
        self.polygons = bsp.clip_polygons(&self.polygons);

        #[cfg(feature = "parallel")]
        match (&mut self.front, &mut self.back) {
            (Some(front_node), Some(back_node)) => {
                join(|| front_node.clip_to(bsp), || back_node.clip_to(bsp));
            }
            (Some(front_node), None) => front_node.clip_to(bsp),
            (None, Some(back_node)) => back_node.clip_to(bsp),
            (None, None) => {}
        }

        #[cfg(not(feature = "parallel"))]
        {
            if let Some(ref mut front) = self.front {
                front.clip_to(bsp);
            }
            if let Some(ref mut back) = self.back {
                back.clip_to(bsp);
            }
        }
    }

    /// Return all polygons in this BSP tree
    pub fn all_polygons(&self) -> Vec<Polygon<S>> {
        let mut result = self.polygons.clone();
        if let Some(ref front) = self.front {
            result.extend(front.all_polygons());
        }
        if let Some(ref back) = self.back {
            result.extend(back.all_polygons());
        }
        result
    }

    /// Build a BSP tree from the given polygons
    pub fn build(&mut self, polygons: &[Polygon<S>]) {
        let Some(first) = polygons.first() else {
            return;
        };
        let plane = self.plane.get_or_insert_with(|| first.plane.clone()).clone();

        let (coplanar_front, coplanar_back, front, back) = Self::split_all(&plane, polygons);
        self.polygons.extend(coplanar_front);
        self.polygons.extend(coplanar_back);

        if !front.is_empty() {
            self.front
                .get_or_insert_with(|| Box::new(Node::new(&[])))
                .build(&front);
        }
        if !back.is_empty() {
            self.back
                .get_or_insert_with(|| Box::new(Node::new(&[])))
                .build(&back);
        }
    }

    /// Whether `p` lies inside the solid bounded by this tree's polygons.
    pub fn contains_point(&self, p: &nalgebra::Point3<crate::float_types::Real>) -> bool {
        let Some(plane) = self.plane.as_ref() else {
            return false;
        };
        if plane.orient_point(p) == FRONT {
            self.front.as_ref().is_some_and(|f| f.contains_point(p))
        } else {
            match self.back {
                Some(ref b) => b.contains_point(p),
                None => true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vertex::Vertex;
    use nalgebra::{Point3, Vector3};

    fn unit_cube() -> Vec<Polygon<usize>> {
        let faces: [([usize; 4], [Real3; 1]); 6] = [
            ([0, 4, 6, 2], [[-1.0, 0.0, 0.0]]),
            ([1, 3, 7, 5], [[1.0, 0.0, 0.0]]),
            ([0, 1, 5, 4], [[0.0, -1.0, 0.0]]),
            ([2, 6, 7, 3], [[0.0, 1.0, 0.0]]),
            ([0, 2, 3, 1], [[0.0, 0.0, -1.0]]),
            ([4, 5, 7, 6], [[0.0, 0.0, 1.0]]),
        ];
        faces
            .iter()
            .enumerate()
            .map(|(tag, (idx, [n]))| {
                let verts = idx
                    .iter()
                    .map(|&i| {
                        let p = Point3::new(
                            (i & 1) as f64 - 0.5,
                            ((i >> 1) & 1) as f64 - 0.5,
                            ((i >> 2) & 1) as f64 - 0.5,
                        );
                        Vertex::new(p, Vector3::new(n[0], n[1], n[2]))
                    })
                    .collect();
                Polygon::new(verts, Some(tag))
            })
            .collect()
    }

    type Real3 = [f64; 3];

    #[test]
    fn cube_tree_classifies_points() {
        let polys = unit_cube();
        for p in &polys {
            assert!(p.plane.normal.dot(&p.vertices[0].normal) > 0.99);
        }
        let tree = Node::new(&polys);
        assert!(tree.contains_point(&Point3::origin()));
        assert!(!tree.contains_point(&Point3::new(1.0, 0.0, 0.0)));
        assert_eq!(tree.all_polygons().len(), 6);
    }

    #[test]
    fn inversion_swaps_inside_and_outside() {
        let mut tree = Node::new(&unit_cube());
        tree.invert();
        assert!(!tree.contains_point(&Point3::origin()));
        assert!(tree.contains_point(&Point3::new(1.0, 0.0, 0.0)));
    }
}
