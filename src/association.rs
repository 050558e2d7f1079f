// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Links between subpictures and the surfaces they are blended onto.
//!
//! An association is shared by exactly two lists: the `associations` of its subpicture and the
//! `associations` of its surface. Both lists hold the same `Rc`, so an association is freed once
//! the second list lets go of it. Lists grow by the minimum needed plus a small constant and
//! entries are removed by swapping with the last one, so order is not preserved.

use std::rc::Rc;

use log::error;
use log::warn;

use crate::error::Error;
use crate::error::Result;
use crate::registry::Registry;
use crate::va::SubpictureId;
use crate::va::SurfaceId;
use crate::va::VaRect;
use crate::va::VA_SUBPICTURE_GLOBAL_ALPHA;

/// Extra entries reserved whenever an association list has to grow.
const GROWTH: usize = 4;

#[derive(Debug, PartialEq, Eq)]
pub struct Association {
    pub subpicture: SubpictureId,
    pub surface: SurfaceId,
    /// Part of the subpicture image to blend.
    pub src_rect: VaRect,
    /// Where to blend it, in surface coordinates.
    pub dst_rect: VaRect,
    pub flags: u32,
}

pub type AssociationList = Vec<Rc<Association>>;

fn push(list: &mut AssociationList, association: Rc<Association>) -> Result<()> {
    if list.len() == list.capacity() {
        list.try_reserve_exact(1 + GROWTH)
            .map_err(|_| slot_heap::Error::OutOfMemory)?;
    }
    list.push(association);
    Ok(())
}

/// Removes the first entry matching `pred`, swapping the last entry into its place.
fn remove<P>(list: &mut AssociationList, pred: P) -> Option<Rc<Association>>
where
    P: Fn(&Association) -> bool,
{
    let index = list.iter().position(|a| pred(a))?;
    Some(list.swap_remove(index))
}

/// Flags an association may carry.
pub fn allowed_flags(global_alpha: bool) -> u32 {
    if global_alpha {
        VA_SUBPICTURE_GLOBAL_ALPHA
    } else {
        0
    }
}

/// Links `subpicture` to `surface`, replacing an existing link between the two.
///
/// On failure neither list is modified.
pub fn associate(
    registry: &mut Registry,
    subpicture: SubpictureId,
    surface: SurfaceId,
    src_rect: VaRect,
    dst_rect: VaRect,
    flags: u32,
    allowed_flags: u32,
) -> Result<()> {
    if flags & !allowed_flags != 0 {
        return Err(Error::FlagNotSupported(flags & !allowed_flags));
    }
    registry.subpicture(subpicture)?;
    registry.surface(surface)?;
    if src_rect.is_empty() || dst_rect.is_empty() {
        return Err(Error::InvalidParameter("empty association rectangle"));
    }
    let association = Rc::new(Association {
        subpicture,
        surface,
        src_rect,
        dst_rect,
        flags,
    });
    link(registry, association, push)
}

/// Adds `association` to the lists of both of its ends, appending with `push`.
///
/// A previous link between the same pair is dropped once the new one is in place. On failure
/// both lists are left as they were.
fn link<P>(registry: &mut Registry, association: Rc<Association>, mut push: P) -> Result<()>
where
    P: FnMut(&mut AssociationList, Rc<Association>) -> Result<()>,
{
    let (subpicture, surface) = (association.subpicture, association.surface);
    let previous = find(registry, subpicture, surface);
    push(
        &mut registry.surface_mut(surface)?.associations,
        association.clone(),
    )?;
    let linked = registry
        .subpicture_mut(subpicture)
        .and_then(|s| push(&mut s.associations, association.clone()));
    if let Err(e) = linked {
        if let Some(s) = registry.surfaces.get_mut(surface) {
            remove(&mut s.associations, |a| std::ptr::eq(a, &*association));
        }
        return Err(e);
    }
    if let Some(previous) = previous {
        let is_previous = |a: &Association| std::ptr::eq(a, &*previous);
        if let Some(s) = registry.surfaces.get_mut(surface) {
            remove(&mut s.associations, is_previous);
        }
        if let Some(s) = registry.subpictures.get_mut(subpicture) {
            remove(&mut s.associations, is_previous);
        }
    }
    Ok(())
}

/// Links `subpicture` to each of `surfaces`.
///
/// On a failure midway the links made by this call are undone and the links they replaced are
/// restored.
pub fn associate_all(
    registry: &mut Registry,
    subpicture: SubpictureId,
    surfaces: &[SurfaceId],
    src_rect: VaRect,
    dst_rect: VaRect,
    flags: u32,
    allowed_flags: u32,
) -> Result<()> {
    link_all(registry, subpicture, surfaces, |registry, surface| {
        associate(
            registry,
            subpicture,
            surface,
            src_rect,
            dst_rect,
            flags,
            allowed_flags,
        )
    })
}

fn link_all<L>(
    registry: &mut Registry,
    subpicture: SubpictureId,
    surfaces: &[SurfaceId],
    mut link_one: L,
) -> Result<()>
where
    L: FnMut(&mut Registry, SurfaceId) -> Result<()>,
{
    let previous: Vec<Option<Rc<Association>>> = surfaces
        .iter()
        .map(|&s| find(registry, subpicture, s))
        .collect();
    for (i, &surface) in surfaces.iter().enumerate() {
        if let Err(e) = link_one(registry, surface) {
            let mut undone = Vec::with_capacity(i);
            for (j, &done) in surfaces[..i].iter().enumerate().rev() {
                if undone.contains(&done) {
                    continue;
                }
                undone.push(done);
                if let Err(e) = deassociate(registry, subpicture, done) {
                    warn!("failed to undo association: {}", e);
                }
                if let Some(old) = previous[j].clone() {
                    if let Err(e) = link(registry, old, push) {
                        warn!("failed to restore association: {}", e);
                    }
                }
            }
            return Err(e);
        }
    }
    Ok(())
}

fn find(
    registry: &Registry,
    subpicture: SubpictureId,
    surface: SurfaceId,
) -> Option<Rc<Association>> {
    registry
        .surfaces
        .get(surface)?
        .associations
        .iter()
        .find(|a| a.subpicture == subpicture)
        .cloned()
}

/// Removes the link between `subpicture` and `surface` from both sides.
pub fn deassociate(
    registry: &mut Registry,
    subpicture: SubpictureId,
    surface: SurfaceId,
) -> Result<()> {
    let from_surface = remove(
        &mut registry.surface_mut(surface)?.associations,
        |a| a.subpicture == subpicture,
    );
    let from_subpicture = remove(
        &mut registry.subpicture_mut(subpicture)?.associations,
        |a| a.surface == surface,
    );
    match (from_surface, from_subpicture) {
        (Some(_), Some(_)) => Ok(()),
        (None, None) => Err(Error::NotAssociated {
            subpicture,
            surface,
        }),
        _ => {
            error!(
                "association of subpicture {:#010x} and surface {:#010x} was one-sided",
                subpicture, surface
            );
            debug_assert!(false, "one-sided association");
            Ok(())
        }
    }
}

/// Removes every link of `subpicture` and returns how many surfaces were detached.
///
/// Surfaces that did not hold the reciprocal entry are reported.
pub fn deassociate_all(registry: &mut Registry, subpicture: SubpictureId) -> Result<usize> {
    let associations = std::mem::take(&mut registry.subpicture_mut(subpicture)?.associations);
    let attempted = associations.len();
    let mut detached = 0;
    for association in associations {
        let removed = registry
            .surfaces
            .get_mut(association.surface)
            .and_then(|s| remove(&mut s.associations, |a| a.subpicture == subpicture));
        if removed.is_some() {
            detached += 1;
        }
    }
    if detached != attempted {
        error!(
            "subpicture {:#010x}: detached {} of {} surfaces",
            subpicture, detached, attempted
        );
        debug_assert!(false, "subpicture associations out of sync");
    }
    Ok(detached)
}

/// Removes every link of `surface`, mirror of `deassociate_all` for surface teardown.
pub fn detach_surface(registry: &mut Registry, surface: SurfaceId) -> Result<usize> {
    let associations = std::mem::take(&mut registry.surface_mut(surface)?.associations);
    let mut detached = 0;
    for association in associations {
        let removed = registry
            .subpictures
            .get_mut(association.subpicture)
            .and_then(|s| remove(&mut s.associations, |a| a.surface == surface));
        match removed {
            Some(_) => detached += 1,
            None => warn!(
                "surface {:#010x}: subpicture {:#010x} did not hold the association",
                surface, association.subpicture
            ),
        }
    }
    Ok(detached)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::tests::add_subpicture;
    use crate::registry::tests::add_surface;

    fn rect() -> VaRect {
        VaRect::new(0, 0, 16, 16)
    }

    fn counts(registry: &Registry, subpicture: SubpictureId, surface: SurfaceId) -> (usize, usize) {
        (
            registry.subpictures.get(subpicture).unwrap().associations.len(),
            registry.surfaces.get(surface).unwrap().associations.len(),
        )
    }

    #[test]
    fn associate_then_deassociate_round_trip() {
        let mut registry = Registry::new(16).unwrap();
        let s = add_subpicture(&mut registry);
        let x = add_surface(&mut registry, 640, 480);
        let before = counts(&registry, s, x);
        associate(&mut registry, s, x, rect(), rect(), 0, 0).unwrap();
        assert_eq!(counts(&registry, s, x), (1, 1));
        deassociate(&mut registry, s, x).unwrap();
        assert_eq!(counts(&registry, s, x), before);
    }

    #[test]
    fn shared_association() {
        let mut registry = Registry::new(16).unwrap();
        let s = add_subpicture(&mut registry);
        let x = add_surface(&mut registry, 640, 480);
        associate(&mut registry, s, x, rect(), rect(), 0, 0).unwrap();
        let a = &registry.subpictures.get(s).unwrap().associations[0];
        let b = &registry.surfaces.get(x).unwrap().associations[0];
        assert!(Rc::ptr_eq(a, b));
        assert_eq!(Rc::strong_count(a), 2);
    }

    #[test]
    fn reassociating_replaces() {
        let mut registry = Registry::new(16).unwrap();
        let s = add_subpicture(&mut registry);
        let x = add_surface(&mut registry, 640, 480);
        associate(&mut registry, s, x, rect(), rect(), 0, 0).unwrap();
        let moved = VaRect::new(8, 8, 16, 16);
        associate(&mut registry, s, x, rect(), moved, 0, 0).unwrap();
        assert_eq!(counts(&registry, s, x), (1, 1));
        assert_eq!(
            registry.surfaces.get(x).unwrap().associations[0].dst_rect,
            moved
        );
    }

    fn new_link(subpicture: SubpictureId, surface: SurfaceId, dst_rect: VaRect) -> Rc<Association> {
        Rc::new(Association {
            subpicture,
            surface,
            src_rect: rect(),
            dst_rect,
            flags: 0,
        })
    }

    #[test]
    fn failed_subpicture_append_rolls_back_surface() {
        let mut registry = Registry::new(16).unwrap();
        let s = add_subpicture(&mut registry);
        let x = add_surface(&mut registry, 640, 480);

        let mut calls = 0;
        let failing_second = |list: &mut AssociationList, a: Rc<Association>| {
            calls += 1;
            if calls == 2 {
                return Err(Error::Heap(slot_heap::Error::OutOfMemory));
            }
            push(list, a)
        };
        let err = link(&mut registry, new_link(s, x, rect()), failing_second).unwrap_err();
        assert!(matches!(err, Error::Heap(slot_heap::Error::OutOfMemory)));
        assert_eq!(counts(&registry, s, x), (0, 0));

        // An existing link survives a failed replacement.
        associate(&mut registry, s, x, rect(), rect(), 0, 0).unwrap();
        let mut calls = 0;
        let failing_second = |list: &mut AssociationList, a: Rc<Association>| {
            calls += 1;
            if calls == 2 {
                return Err(Error::Heap(slot_heap::Error::OutOfMemory));
            }
            push(list, a)
        };
        let moved = VaRect::new(8, 8, 16, 16);
        assert!(link(&mut registry, new_link(s, x, moved), failing_second).is_err());
        assert_eq!(counts(&registry, s, x), (1, 1));
        assert_eq!(registry.surfaces.get(x).unwrap().associations[0].dst_rect, rect());
        assert_eq!(registry.subpictures.get(s).unwrap().associations[0].dst_rect, rect());
    }

    #[test]
    fn failure_midway_undoes_the_whole_call() {
        let mut registry = Registry::new(16).unwrap();
        let s = add_subpicture(&mut registry);
        let surfaces: Vec<_> = (0..3).map(|_| add_surface(&mut registry, 64, 64)).collect();
        associate(&mut registry, s, surfaces[0], rect(), rect(), 0, 0).unwrap();
        let old = registry.surfaces.get(surfaces[0]).unwrap().associations[0].clone();

        let moved = VaRect::new(8, 8, 16, 16);
        let last = surfaces[2];
        let err = link_all(&mut registry, s, &surfaces, |registry, surface| {
            if surface == last {
                return Err(Error::Heap(slot_heap::Error::OutOfMemory));
            }
            associate(registry, s, surface, rect(), moved, 0, 0)
        })
        .unwrap_err();
        assert!(matches!(err, Error::Heap(_)));

        assert_eq!(counts(&registry, s, surfaces[0]), (1, 1));
        assert!(Rc::ptr_eq(
            &registry.surfaces.get(surfaces[0]).unwrap().associations[0],
            &old
        ));
        assert!(Rc::ptr_eq(
            &registry.subpictures.get(s).unwrap().associations[0],
            &old
        ));
        for &x in &surfaces[1..] {
            assert!(registry.surfaces.get(x).unwrap().associations.is_empty());
        }
    }

    #[test]
    fn disallowed_flags() {
        let mut registry = Registry::new(16).unwrap();
        let s = add_subpicture(&mut registry);
        let x = add_surface(&mut registry, 640, 480);
        let err = associate(
            &mut registry,
            s,
            x,
            rect(),
            rect(),
            VA_SUBPICTURE_GLOBAL_ALPHA,
            allowed_flags(false),
        )
        .unwrap_err();
        assert!(matches!(err, Error::FlagNotSupported(VA_SUBPICTURE_GLOBAL_ALPHA)));
        assert_eq!(counts(&registry, s, x), (0, 0));
        associate(
            &mut registry,
            s,
            x,
            rect(),
            rect(),
            VA_SUBPICTURE_GLOBAL_ALPHA,
            allowed_flags(true),
        )
        .unwrap();
    }

    #[test]
    fn deassociate_unknown_pair() {
        let mut registry = Registry::new(16).unwrap();
        let s = add_subpicture(&mut registry);
        let x = add_surface(&mut registry, 640, 480);
        assert!(matches!(
            deassociate(&mut registry, s, x),
            Err(Error::NotAssociated { .. })
        ));
        assert!(matches!(
            deassociate(&mut registry, s, 0x0400_00ff),
            Err(Error::InvalidSurface(0x0400_00ff))
        ));
    }

    #[test]
    fn deassociate_all_detaches_every_surface() {
        let mut registry = Registry::new(16).unwrap();
        let s = add_subpicture(&mut registry);
        assert_eq!(deassociate_all(&mut registry, s).unwrap(), 0);

        let surfaces: Vec<_> = (0..5).map(|_| add_surface(&mut registry, 64, 64)).collect();
        for &x in &surfaces {
            associate(&mut registry, s, x, rect(), rect(), 0, 0).unwrap();
        }
        // A second subpicture on one of the surfaces must stay.
        let other = add_subpicture(&mut registry);
        associate(&mut registry, other, surfaces[2], rect(), rect(), 0, 0).unwrap();

        assert_eq!(deassociate_all(&mut registry, s).unwrap(), 5);
        assert!(registry.subpictures.get(s).unwrap().associations.is_empty());
        for &x in &surfaces {
            let expected = if x == surfaces[2] { 1 } else { 0 };
            assert_eq!(registry.surfaces.get(x).unwrap().associations.len(), expected);
        }
    }

    #[test]
    fn swap_remove_keeps_the_others() {
        let mut registry = Registry::new(16).unwrap();
        let x = add_surface(&mut registry, 64, 64);
        let subpictures: Vec<_> = (0..4).map(|_| add_subpicture(&mut registry)).collect();
        for &s in &subpictures {
            associate(&mut registry, s, x, rect(), rect(), 0, 0).unwrap();
        }
        deassociate(&mut registry, subpictures[0], x).unwrap();
        let mut left: Vec<_> = registry
            .surfaces
            .get(x)
            .unwrap()
            .associations
            .iter()
            .map(|a| a.subpicture)
            .collect();
        left.sort_unstable();
        assert_eq!(left, subpictures[1..].to_vec());
    }

    #[test]
    fn detach_surface_clears_subpicture_side() {
        let mut registry = Registry::new(16).unwrap();
        let s = add_subpicture(&mut registry);
        let x = add_surface(&mut registry, 64, 64);
        let y = add_surface(&mut registry, 64, 64);
        associate(&mut registry, s, x, rect(), rect(), 0, 0).unwrap();
        associate(&mut registry, s, y, rect(), rect(), 0, 0).unwrap();
        assert_eq!(detach_surface(&mut registry, x).unwrap(), 1);
        let left = &registry.subpictures.get(s).unwrap().associations;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].surface, y);
    }
}
