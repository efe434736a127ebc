//! A minimal document host: an object store of features, a selection list,
//! and a command dispatcher that honors [`Preferences`].

use hashbrown::HashMap;
use nalgebra::Point3;

use crate::backend::{Backend, realize};
use crate::config::{Preferences, Representation};
use crate::errors::CsgError;
use crate::float_types::Real;
use crate::float_types::parry3d::bounding_volume::Aabb;
use crate::primitive::Primitive;
use crate::set::Set;
use crate::trace::{FaceLink, trace};
use crate::transform::Transformation;

pub type ObjectId = usize;

/// Tessellation precision used for mesh representations.
const MESH_PRECISION: Real = 0.01;

/// A dependency of one feature on another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Link {
    /// Operands of an intersection or union.
    Sources(Vec<ObjectId>),
    /// Operand of a complement, or the kept side of a difference.
    Source(ObjectId),
    /// The removed side of a difference.
    Masker(ObjectId),
    /// The feature an image places.
    Origin(ObjectId),
}

impl Link {
    fn ids(&self) -> Vec<ObjectId> {
        match self {
            Link::Sources(ids) => ids.clone(),
            Link::Source(id) | Link::Masker(id) | Link::Origin(id) => vec![*id],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeatureKind {
    Primitive(Primitive),
    Intersection,
    Union,
    Complement,
    Difference,
    Image(Transformation),
}

/// What a computed feature holds, per [`Representation`].
#[derive(Debug, Clone)]
pub enum Computed<S> {
    Shape(S),
    Mesh(Vec<[Point3<Real>; 3]>),
}

#[derive(Debug, Clone)]
pub struct Feature<S> {
    pub name: String,
    pub kind: FeatureKind,
    pub links: Vec<Link>,
    /// Emitted as a backend boolean rather than a symbolic feature.
    pub native: bool,
    pub computed: Option<Computed<S>>,
    /// Per result face, the source face it came from.
    pub trace: Option<Vec<Option<FaceLink>>>,
    /// Needs recomputing.
    pub touched: bool,
}

impl<S> Feature<S> {
    /// Feature type name; native features use the backend's boolean names.
    pub fn class_name(&self) -> &'static str {
        match (&self.kind, self.native) {
            (FeatureKind::Primitive(p), _) => p.kind_name(),
            (FeatureKind::Intersection, false) => "Intersection",
            (FeatureKind::Union, false) => "Union",
            (FeatureKind::Complement, false) => "Complement",
            (FeatureKind::Difference, false) => "Difference",
            (FeatureKind::Image(_), false) => "Image",
            (FeatureKind::Intersection, true) => "Common",
            (FeatureKind::Union, true) => "Fuse",
            (FeatureKind::Complement | FeatureKind::Difference, true) => "Cut",
            (FeatureKind::Image(_), true) => "Placement",
        }
    }

    /// Stored parameters, grouped under the class name.
    pub fn properties(&self) -> (&'static str, Vec<(&'static str, String)>) {
        let props = match &self.kind {
            FeatureKind::Primitive(p) => p.properties(),
            FeatureKind::Image(t) => vec![("Placement", t.to_string())],
            _ => Vec::new(),
        };
        (self.class_name(), props)
    }

    fn depends_on(&self, id: ObjectId) -> bool {
        self.links.iter().any(|l| l.ids().contains(&id))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    AddPrimitive(Primitive),
    /// Intersection of the given features, or of the selection when empty.
    Intersection(Vec<ObjectId>),
    /// Union of the given features, or of the selection when empty.
    Union(Vec<ObjectId>),
    Complement(ObjectId),
    Difference { source: ObjectId, masker: ObjectId },
    Image(Transformation, ObjectId),
    Remove(ObjectId),
    /// Recompute every touched feature.
    Recompute,
}

pub struct Document<B: Backend> {
    backend: B,
    pub preferences: Preferences,
    /// Region realized for unbounded sets.
    pub region: Aabb,
    objects: HashMap<ObjectId, Feature<B::Shape>>,
    next_id: ObjectId,
    selection: Vec<ObjectId>,
}

impl<B: Backend> Document<B> {
    pub fn new(backend: B, preferences: Preferences) -> Self {
        Document {
            backend,
            preferences,
            region: Aabb::new(Point3::new(-10.0, -10.0, -10.0), Point3::new(10.0, 10.0, 10.0)),
            objects: HashMap::new(),
            next_id: 0,
            selection: Vec::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    // ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
    // Object store
    // ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

    pub fn add(&mut self, kind: FeatureKind, links: Vec<Link>) -> Result<ObjectId, CsgError> {
        for id in links.iter().flat_map(Link::ids) {
            self.require(id)?;
        }
        let id = self.next_id;
        self.next_id += 1;
        let native = self.preferences.originop && !matches!(kind, FeatureKind::Primitive(_));
        let mut feature = Feature {
            name: String::new(),
            kind,
            links,
            native,
            computed: None,
            trace: None,
            touched: true,
        };
        feature.name = format!("{}{id:03}", feature.class_name());
        log::debug!("added {}", feature.name);
        self.objects.insert(id, feature);
        Ok(id)
    }

    pub fn get(&self, id: ObjectId) -> Option<&Feature<B::Shape>> {
        self.objects.get(&id)
    }

    /// Remove a feature nothing else depends on.
    pub fn remove(&mut self, id: ObjectId) -> Result<Feature<B::Shape>, CsgError> {
        self.require(id)?;
        if let Some((_, user)) = self.objects.iter().find(|(_, f)| f.depends_on(id)) {
            return Err(CsgError::InvalidParameter(format!(
                "object {id} is still used by {}",
                user.name
            )));
        }
        self.selection.retain(|s| *s != id);
        self.objects
            .remove(&id)
            .ok_or_else(|| CsgError::InvalidParameter(format!("no object {id}")))
    }

    /// Ids in creation order.
    pub fn ids(&self) -> Vec<ObjectId> {
        let mut ids: Vec<ObjectId> = self.objects.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn require(&self, id: ObjectId) -> Result<&Feature<B::Shape>, CsgError> {
        self.objects
            .get(&id)
            .ok_or_else(|| CsgError::InvalidParameter(format!("no object {id}")))
    }

    // ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
    // Selection
    // ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

    pub fn selection(&self) -> &[ObjectId] {
        &self.selection
    }

    pub fn select(&mut self, ids: &[ObjectId]) -> Result<(), CsgError> {
        for id in ids {
            self.require(*id)?;
        }
        self.selection = ids.to_vec();
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    // ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
    // Commands
    // ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

    /// Run a command. Returns the feature it created or reused, if any.
    pub fn execute(&mut self, command: Command) -> Result<Option<ObjectId>, CsgError> {
        let (kind, links) = match command {
            Command::Remove(id) => {
                self.remove(id)?;
                return Ok(None);
            }
            Command::Recompute => {
                self.recompute_all()?;
                return Ok(None);
            }
            Command::AddPrimitive(p) => (FeatureKind::Primitive(p), Vec::new()),
            Command::Intersection(ids) => (FeatureKind::Intersection, vec![Link::Sources(self.operands(ids)?)]),
            Command::Union(ids) => (FeatureKind::Union, vec![Link::Sources(self.operands(ids)?)]),
            Command::Complement(id) => (FeatureKind::Complement, vec![Link::Source(id)]),
            Command::Difference { source, masker } => {
                (FeatureKind::Difference, vec![Link::Source(source), Link::Masker(masker)])
            }
            Command::Image(t, id) => (FeatureKind::Image(t), vec![Link::Origin(id)]),
        };

        let reused = if self.preferences.cached {
            self.ids()
                .into_iter()
                .find(|id| self.objects.get(id).is_some_and(|f| f.kind == kind && f.links == links))
        } else {
            None
        };
        let id = match reused {
            Some(id) => {
                log::debug!("reusing object {id}");
                id
            }
            None => self.add(kind, links)?,
        };
        if self.preferences.autosel {
            self.selection = vec![id];
        }
        if self.preferences.autorecomp {
            self.recompute(id)?;
        }
        Ok(Some(id))
    }

    fn operands(&self, ids: Vec<ObjectId>) -> Result<Vec<ObjectId>, CsgError> {
        let ids = if ids.is_empty() { self.selection.clone() } else { ids };
        if ids.is_empty() {
            return Err(CsgError::InvalidParameter("nothing selected".into()));
        }
        Ok(ids)
    }

    // ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~
    // Evaluation
    // ~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~~

    /// The symbolic set a feature stands for.
    pub fn set_of(&self, id: ObjectId) -> Result<Set, CsgError> {
        let feature = self.require(id)?;
        let sources = self.source_ids(feature);
        let sets = sources
            .iter()
            .map(|s| self.set_of(*s))
            .collect::<Result<Vec<_>, _>>()?;
        let missing = || CsgError::InvalidParameter(format!("{} is missing an operand", feature.name));
        let mut sets = sets.into_iter();
        Ok(match &feature.kind {
            FeatureKind::Primitive(p) => Set::Primitive(p.clone()),
            FeatureKind::Intersection => Set::intersection(sets),
            FeatureKind::Union => Set::union(sets),
            FeatureKind::Complement => sets.next().ok_or_else(missing)?.complement(),
            FeatureKind::Difference => {
                let source = sets.next().ok_or_else(missing)?;
                source.difference(sets.next().ok_or_else(missing)?)
            }
            FeatureKind::Image(t) => Set::image(t, sets.next().ok_or_else(missing)?),
        })
    }

    fn source_ids(&self, feature: &Feature<B::Shape>) -> Vec<ObjectId> {
        feature.links.iter().flat_map(Link::ids).collect()
    }

    /// Exact backend shape of a feature, from its fresh stored shape when possible.
    fn exact_shape(&self, id: ObjectId) -> Result<B::Shape, CsgError> {
        let feature = self.require(id)?;
        if let (Some(Computed::Shape(s)), false) = (&feature.computed, feature.touched) {
            return Ok(s.clone());
        }
        let sources = self
            .source_ids(feature)
            .into_iter()
            .map(|s| self.exact_shape(s))
            .collect::<Result<Vec<_>, _>>()?;
        let b = &self.backend;
        let missing = || CsgError::InvalidParameter(format!("{} is missing an operand", feature.name));
        Ok(match &feature.kind {
            FeatureKind::Primitive(p) => realize(b, &Set::Primitive(p.clone()), &self.region)?,
            FeatureKind::Intersection => b.intersection(&sources),
            FeatureKind::Union => b.union(&sources),
            FeatureKind::Complement => {
                let inner = sources.first().ok_or_else(missing)?;
                b.intersection(&[b.make_whole_space(&self.region), b.complement(inner)])
            }
            FeatureKind::Difference => match sources.as_slice() {
                [source, masker] => b.intersection(&[source.clone(), b.complement(masker)]),
                _ => return Err(missing()),
            },
            FeatureKind::Image(t) => b.transform(sources.first().ok_or_else(missing)?, &t.to_matrix4())?,
        })
    }

    /// Compute one feature, tracing its faces when `autotrace` is on.
    pub fn recompute(&mut self, id: ObjectId) -> Result<(), CsgError> {
        let shape = self.exact_shape(id)?;
        let feature = self.require(id)?;
        let traced = if self.preferences.autotrace && !matches!(feature.kind, FeatureKind::Primitive(_)) {
            let sources = self
                .source_ids(feature)
                .into_iter()
                .map(|s| self.exact_shape(s))
                .collect::<Result<Vec<_>, _>>()?;
            Some(trace(&self.backend, &shape, &sources))
        } else {
            None
        };
        let computed = match self.preferences.rep {
            Representation::Shape => Computed::Shape(shape),
            Representation::Mesh => Computed::Mesh(self.backend.tessellate(&shape, MESH_PRECISION)),
        };
        if let Some(feature) = self.objects.get_mut(&id) {
            log::debug!("recomputed {}", feature.name);
            feature.computed = Some(computed);
            feature.trace = traced;
            feature.touched = false;
        }
        Ok(())
    }

    /// Recompute every touched feature in creation order.
    pub fn recompute_all(&mut self) -> Result<(), CsgError> {
        for id in self.ids() {
            if self.objects.get(&id).is_some_and(|f| f.touched) {
                self.recompute(id)?;
            }
        }
        Ok(())
    }
}
