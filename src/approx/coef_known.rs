use log::warn;
use rustc_hash::FxHashMap;

use crate::surface::basis_function::BasisKey;
use crate::surface::traits::{BasisSupport, Direction, Domain, Edge, LRSurface, RefinementMap};

/// Highest supported fixation level.
pub const MAX_FIX_LEVEL: i32 = 1;

/// Clamp a requested fixation level to the supported range.
pub fn clamp_fix_level(level: i32) -> i32
{
    let clamped = level.clamp(0, MAX_FIX_LEVEL);
    if clamped != level
    {
        warn!("fixation level {level} clamped to {clamped}");
    }
    clamped
}

///
/// Returns true if a basis function does not vanish to order `level` on
/// `edge`: at least `order - level + 1` of its knots across the edge equal
/// the edge value.
///
fn touches_edge(basis: &BasisSupport, edge: Edge, level: i32, orders: (usize, usize), domain: &Domain) -> bool
{
    if level <= 0
    {
        return false;
    }
    let order = match edge.across()
    {
        Direction::U => orders.0,
        Direction::V => orders.1,
    };
    let required = (order + 1).saturating_sub(level as usize).max(1);
    basis.edge_multiplicity(edge, domain) >= required
}

///
/// Per coefficient fixation flags. A flag of `0` marks a coefficient free to
/// change in a fit, a positive flag fixes it with that level.
///
/// The flags follow the coefficient order of the surface they were computed
/// for. The basis keys of that surface are kept so flags can be carried over
/// a refinement.
///
#[derive(Clone, Debug, Default)]
pub struct CoefKnown
{
    flags: Vec<i32>,
    keys: Vec<BasisKey>,
}

impl CoefKnown
{
    /// All coefficients of `surface` free.
    pub fn new<S: LRSurface + ?Sized>(surface: &S) -> Self
    {
        let keys: Vec<BasisKey> = surface.basis_functions().into_iter().map(|b| b.key).collect();
        Self { flags: vec![0; keys.len()], keys }
    }

    pub fn flags(&self) -> &[i32]
    {
        &self.flags
    }

    pub fn len(&self) -> usize
    {
        self.flags.len()
    }

    pub fn is_fixed(&self, index: usize) -> bool
    {
        self.flags.get(index).is_some_and(|&f| f > 0)
    }

    pub fn num_fixed(&self) -> usize
    {
        self.flags.iter().filter(|&&f| f > 0).count()
    }

    ///
    /// Recompute all flags from the per edge fixation levels, ordered
    /// `[v = vmin, u = umax, v = vmax, u = umin]`. A function touching
    /// several fixed edges gets the highest level.
    ///
    pub fn set_coef_known<S: LRSurface + ?Sized>(&mut self, surface: &S, edge_fix: &[i32; 4])
    {
        let levels = edge_fix.map(clamp_fix_level);
        let domain = surface.domain();
        let orders = surface.orders();
        let basis = surface.basis_functions();
        self.flags = basis.iter()
            .map(|b| Edge::ALL.iter().filter(|&&e| touches_edge(b, e, levels[e as usize], orders, &domain)).map(|&e| levels[e as usize]).max().unwrap_or(0))
            .collect();
        self.keys = basis.into_iter().map(|b| b.key).collect();
    }

    ///
    /// Fix the coefficients along one edge to `level`. Existing flags are
    /// only ever raised.
    ///
    pub fn set_coef_known_edge<S: LRSurface + ?Sized>(&mut self, surface: &S, edge: Edge, level: i32)
    {
        let level = clamp_fix_level(level);
        let domain = surface.domain();
        let orders = surface.orders();
        let basis = surface.basis_functions();
        if basis.len() != self.flags.len()
        {
            warn!("coefficient flags out of date ({} flags, {} coefficients), resetting", self.flags.len(), basis.len());
            self.flags = vec![0; basis.len()];
        }
        for (flag, b) in self.flags.iter_mut().zip(&basis)
        {
            if touches_edge(b, edge, level, orders, &domain)
            {
                *flag = (*flag).max(level);
            }
        }
        self.keys = basis.into_iter().map(|b| b.key).collect();
    }

    ///
    /// Carry the flags over a refinement. Every basis function of the refined
    /// surface gets the highest flag among the functions it descends from;
    /// functions with only free parents stay free.
    ///
    pub fn update_coef_known<S: LRSurface + ?Sized>(&mut self, surface: &S, map: &RefinementMap)
    {
        let keys: Vec<BasisKey> = surface.basis_functions().into_iter().map(|b| b.key).collect();
        let index: FxHashMap<&BasisKey, usize> = keys.iter().enumerate().map(|(i, k)| (k, i)).collect();
        let mut flags = vec![0; keys.len()];
        for (parent, &flag) in self.keys.iter().zip(&self.flags)
        {
            let children = map.children(parent);
            if children.is_empty()
            {
                if let Some(&i) = index.get(parent)
                {
                    flags[i] = flags[i].max(flag);
                }
                continue;
            }
            for child in children
            {
                if let Some(&i) = index.get(child)
                {
                    flags[i] = flags[i].max(flag);
                }
            }
        }
        self.flags = flags;
        self.keys = keys;
    }
}
