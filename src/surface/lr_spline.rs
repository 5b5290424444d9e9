use indexmap::IndexMap;
use log::trace;
use rustc_hash::{FxBuildHasher, FxHashMap};

use crate::errors::{LRError, Result};
use crate::surface::basis_function::{BasisFunction, BasisKey};
use crate::surface::mesh::{Element, MeshLine};
use crate::surface::tensor::{SplineBasis, SplineSurface};
use crate::surface::traits::{BasisSupport, BasisValue, Direction, Domain, LRSurface, RefinementMap};

///
/// Locally refined B-spline surface.
///
/// The mesh is a set of mesh line segments with multiplicities; its faces are
/// the elements. Every basis function has local knot vectors whose knots are
/// mesh lines traversing its support. Inserting a mesh line splits every basis
/// function it traverses; children with equal knots are merged so the basis
/// stays free of duplicates. Basis functions keep their insertion order, which
/// is also the coefficient order.
///
#[derive(Clone, Debug)]
pub struct LRSplineSurface
{
    dim: usize,
    order_u: usize,
    order_v: usize,
    domain: Domain,
    basis: IndexMap<BasisKey, BasisFunction, FxBuildHasher>,
    meshlines: Vec<MeshLine>,
    elements: Vec<Element>,
}

/// Distinct knot values of a knot vector with their multiplicities.
fn distinct_knots(knots: &[f64]) -> Vec<(f64, usize)>
{
    let mut distinct: Vec<(f64, usize)> = Vec::new();
    for &t in knots
    {
        match distinct.last_mut()
        {
            Some((value, mult)) if *value == t => *mult += 1,
            _ => distinct.push((t, 1)),
        }
    }
    distinct
}

impl LRSplineSurface
{
    /// Wrap a tensor-product surface as a single-patch LR mesh.
    pub fn from_tensor(surface: &SplineSurface) -> Self
    {
        let basis_u = surface.basis(Direction::U);
        let basis_v = surface.basis(Direction::V);
        let domain = surface.domain();

        let mut basis = IndexMap::with_capacity_and_hasher(basis_u.ncoef * basis_v.ncoef, FxBuildHasher);
        for j in 0..basis_v.ncoef
        {
            for i in 0..basis_u.ncoef
            {
                let bf = BasisFunction::new(basis_u.local_knots(i).to_vec(), basis_v.local_knots(j).to_vec(), 1.0, surface.coef(i, j).to_vec());
                basis.insert(bf.key(), bf);
            }
        }

        let knots_u = distinct_knots(&basis_u.knots);
        let knots_v = distinct_knots(&basis_v.knots);
        let mut meshlines = Vec::with_capacity(knots_u.len() + knots_v.len());
        meshlines.extend(knots_u.iter().map(|&(u, mult)| MeshLine::new(Direction::U, u, domain.vmin, domain.vmax, mult)));
        meshlines.extend(knots_v.iter().map(|&(v, mult)| MeshLine::new(Direction::V, v, domain.umin, domain.umax, mult)));

        let mut elements = Vec::with_capacity((knots_u.len() - 1) * (knots_v.len() - 1));
        for wv in knots_v.windows(2)
        {
            for wu in knots_u.windows(2)
            {
                elements.push(Element::new(wu[0].0, wu[1].0, wv[0].0, wv[1].0));
            }
        }

        let mut surface = Self { dim: surface.dim(), order_u: basis_u.order, order_v: basis_v.order, domain, basis, meshlines, elements };
        surface.rebuild_element_support();
        surface
    }

    /// Tensor-product LR surface from explicit knot vectors and coefficients.
    pub fn new(basis_u: SplineBasis, basis_v: SplineBasis, coefs: Vec<f64>, dim: usize) -> Result<Self>
    {
        Ok(Self::from_tensor(&SplineSurface::new(basis_u, basis_v, coefs, dim)?))
    }

    /// Number of basis functions.
    pub fn len(&self) -> usize
    {
        self.basis.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.basis.is_empty()
    }

    pub fn basis_function(&self, index: usize) -> Option<&BasisFunction>
    {
        self.basis.get_index(index).map(|(_, bf)| bf)
    }

    fn rebuild_element_support(&mut self)
    {
        for element in self.elements.iter_mut()
        {
            element.support = self.basis.values().enumerate().filter(|(_, bf)| bf.covers(element)).map(|(i, _)| i).collect();
        }
    }

    /// First mesh line splitting `bf`, if any.
    fn find_split(&self, bf: &BasisFunction) -> Option<(Direction, f64)>
    {
        self.meshlines.iter().find(|line| line.splits(bf)).map(|line| (line.dir, line.value))
    }

    ///
    /// Mesh line refining `element` in direction `dir`: through the element
    /// midpoint, spanning the support of the covering basis function with the
    /// smallest extent across `dir`. That function is always split by it.
    ///
    fn line_for_element(&self, element: &Element, dir: Direction) -> Option<MeshLine>
    {
        let across = dir.other();
        let narrowest = element.support.iter()
            .filter_map(|&i| self.basis_function(i))
            .min_by(|a, b| a.extent(across).total_cmp(&b.extent(across)))?;
        Some(MeshLine::new(dir, element.midpoint(dir), narrowest.support_start(across), narrowest.support_end(across), 1))
    }

    ///
    /// Insert one mesh line and split the basis functions it traverses.
    /// `lineage` maps functions created in this batch to the pre-batch
    /// functions they descend from. Returns false if the line was already
    /// present.
    ///
    fn insert_line(&mut self, mut line: MeshLine, lineage: &mut FxHashMap<BasisKey, Vec<BasisKey>>) -> bool
    {
        if self.meshlines.iter().any(|m| m.covers(&line))
        {
            return false;
        }

        let mut i = 0;
        while i < self.meshlines.len()
        {
            if self.meshlines[i].can_merge(&line)
            {
                let merged = self.meshlines.remove(i);
                line.start = line.start.min(merged.start);
                line.stop = line.stop.max(merged.stop);
            }
            else
            {
                i += 1;
            }
        }

        let mut elements = Vec::with_capacity(self.elements.len() + 4);
        for element in self.elements.drain(..)
        {
            if element.is_cut_by(&line)
            {
                elements.extend(element.split(&line));
            }
            else
            {
                elements.push(element);
            }
        }
        self.elements = elements;

        let mut queue: Vec<BasisKey> = self.basis.iter().filter(|(_, bf)| line.splits(bf)).map(|(key, _)| key.clone()).collect();
        self.meshlines.push(line);
        queue.reverse();

        while let Some(key) = queue.pop()
        {
            let Some(split) = self.basis.get(&key).and_then(|bf| self.find_split(bf)) else { continue };
            let Some(parent) = self.basis.shift_remove(&key) else { continue };
            let origins = lineage.remove(&key).unwrap_or_else(|| vec![key.clone()]);
            for child in parent.split(split.0, split.1)
            {
                let child_key = child.key();
                let existed = self.basis.contains_key(&child_key);
                if existed
                {
                    if let Some(existing) = self.basis.get_mut(&child_key)
                    {
                        existing.absorb(child);
                    }
                }
                else
                {
                    self.basis.insert(child_key.clone(), child);
                }
                let entry = lineage.entry(child_key.clone()).or_insert_with(|| if existed { vec![child_key.clone()] } else { Vec::new() });
                for origin in &origins
                {
                    if !entry.contains(origin)
                    {
                        entry.push(origin.clone());
                    }
                }
                queue.push(child_key);
            }
        }
        true
    }
}

impl LRSurface for LRSplineSurface
{
    fn dim(&self) -> usize
    {
        self.dim
    }

    fn domain(&self) -> Domain
    {
        self.domain
    }

    fn orders(&self) -> (usize, usize)
    {
        (self.order_u, self.order_v)
    }

    fn num_coefs(&self) -> usize
    {
        self.basis.len()
    }

    fn coef(&self, index: usize) -> &[f64]
    {
        self.basis_function(index).map(|bf| bf.coef()).unwrap_or(&[])
    }

    fn set_coefs(&mut self, coefs: &[f64]) -> Result<()>
    {
        if coefs.len() != self.basis.len() * self.dim
        {
            return Err(LRError::invalid(format!("expected {} coefficient values, got {}", self.basis.len() * self.dim, coefs.len())));
        }
        for (bf, c) in self.basis.values_mut().zip(coefs.chunks_exact(self.dim))
        {
            bf.coef.copy_from_slice(c);
        }
        Ok(())
    }

    fn basis_functions(&self) -> Vec<BasisSupport>
    {
        self.basis.iter().map(|(key, bf)| BasisSupport { key: key.clone(), knots_u: bf.knots_u.clone(), knots_v: bf.knots_v.clone() }).collect()
    }

    fn basis_values(&self, u: f64, v: f64, nderiv: usize) -> Vec<BasisValue>
    {
        let Some(element) = self.locate_element(u, v).map(|e| &self.elements[e]) else { return Vec::new() };
        element.support.iter()
            .filter_map(|&index| self.basis_function(index).map(|bf| BasisValue { index, values: bf.evaluate(u, v, &self.domain, nderiv) }))
            .collect()
    }

    fn elements(&self) -> &[Element]
    {
        &self.elements
    }

    fn locate_element(&self, u: f64, v: f64) -> Option<usize>
    {
        self.elements.iter().position(|e| e.contains(u, v, &self.domain))
    }

    fn refine_elements(&mut self, requests: &[(usize, Direction)]) -> Result<RefinementMap>
    {
        let mut lines = Vec::with_capacity(requests.len());
        for &(index, dir) in requests
        {
            let element = self.elements.get(index)
                .ok_or_else(|| LRError::invalid(format!("element {index} does not exist, mesh has {} elements", self.elements.len())))?;
            if let Some(line) = self.line_for_element(element, dir)
            {
                if !lines.contains(&line)
                {
                    lines.push(line);
                }
            }
        }

        let originals: Vec<BasisKey> = self.basis.keys().cloned().collect();
        let mut lineage = FxHashMap::default();
        let mut inserted = 0;
        for line in lines
        {
            if self.insert_line(line, &mut lineage)
            {
                inserted += 1;
            }
        }
        self.rebuild_element_support();
        trace!("inserted {inserted} mesh lines, {} -> {} basis functions, {} elements", originals.len(), self.basis.len(), self.elements.len());

        let mut expansions: FxHashMap<BasisKey, Vec<BasisKey>> = originals.into_iter().map(|key| (key, Vec::new())).collect();
        for key in self.basis.keys()
        {
            match lineage.get(key)
            {
                Some(origins) =>
                {
                    for origin in origins
                    {
                        if let Some(children) = expansions.get_mut(origin)
                        {
                            children.push(key.clone());
                        }
                    }
                }
                None =>
                {
                    if let Some(children) = expansions.get_mut(key)
                    {
                        children.push(key.clone());
                    }
                }
            }
        }
        Ok(RefinementMap { expansions })
    }
}
