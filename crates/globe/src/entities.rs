use foundation::handles::Handle;
use foundation::math::Ecef;

use crate::entity::EntityId;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const YELLOW: Color = Color::rgb(1.0, 1.0, 0.0);
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const BLUE: Color = Color::rgb(0.0, 0.0, 1.0);
    pub const DARK_BLUE: Color = Color::rgb(0.0, 0.0, 0.545);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MarkerStyle {
    pub pixel_size: f32,
    pub color: Color,
    pub outline_color: Color,
    pub outline_width: f32,
}

impl Default for MarkerStyle {
    fn default() -> Self {
        Self {
            pixel_size: 8.0,
            color: Color::YELLOW,
            outline_color: Color::BLACK,
            outline_width: 2.0,
        }
    }
}

/// Flat, clamped-to-ground fill with an outline. No extrusion.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PolygonStyle {
    pub fill: Color,
    pub outline_color: Color,
    pub outline_width: f32,
}

impl Default for PolygonStyle {
    fn default() -> Self {
        Self {
            fill: Color::BLUE.with_alpha(0.4),
            outline_color: Color::DARK_BLUE,
            outline_width: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Marker { position: Ecef, style: MarkerStyle },
    Polygon { ring: Vec<Ecef>, style: PolygonStyle },
}

impl Entity {
    pub fn is_marker(&self) -> bool {
        matches!(self, Entity::Marker { .. })
    }

    pub fn is_polygon(&self) -> bool {
        matches!(self, Entity::Polygon { .. })
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    entity: Option<Entity>,
}

/// Entities rendered on the globe.
///
/// Slots are reused after removal; ids carry a generation so a stale id never
/// resolves to (or removes) the slot's new occupant.
///
/// Ordering contract: iteration yields live entities in ascending slot index.
#[derive(Debug, Default)]
pub struct EntityCollection {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl EntityCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, entity: Entity) -> EntityId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.entity = Some(entity);
            return EntityId(Handle::new(index, slot.generation));
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            entity: Some(entity),
        });
        EntityId(Handle::new(index, 0))
    }

    /// Removes `id`. Returns `false` for unknown or stale ids.
    pub fn remove(&mut self, id: EntityId) -> bool {
        let Some(slot) = self.slots.get_mut(id.index() as usize) else {
            return false;
        };
        if slot.generation != id.generation() || slot.entity.is_none() {
            return false;
        }
        slot.entity = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index());
        self.live -= 1;
        true
    }

    pub fn remove_all(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.entity.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
            }
        }
        self.live = 0;
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.slots
            .get(id.index() as usize)
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.entity.as_ref())
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.entity
                .as_ref()
                .map(|e| (EntityId(Handle::new(index as u32, slot.generation)), e))
        })
    }

    pub fn marker_count(&self) -> usize {
        self.iter().filter(|(_, e)| e.is_marker()).count()
    }

    pub fn polygon_count(&self) -> usize {
        self.iter().filter(|(_, e)| e.is_polygon()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::{Entity, EntityCollection, MarkerStyle, PolygonStyle};
    use foundation::math::Ecef;

    fn marker(x: f64) -> Entity {
        Entity::Marker {
            position: Ecef::new(x, 0.0, 0.0),
            style: MarkerStyle::default(),
        }
    }

    #[test]
    fn add_and_remove_tracks_counts() {
        let mut entities = EntityCollection::new();
        let a = entities.add(marker(1.0));
        let b = entities.add(Entity::Polygon {
            ring: vec![Ecef::new(0.0, 0.0, 0.0); 3],
            style: PolygonStyle::default(),
        });
        assert_eq!(entities.len(), 2);
        assert_eq!(entities.marker_count(), 1);
        assert_eq!(entities.polygon_count(), 1);

        assert!(entities.remove(a));
        assert!(!entities.remove(a));
        assert_eq!(entities.len(), 1);
        assert!(entities.contains(b));
    }

    #[test]
    fn stale_id_does_not_touch_reused_slot() {
        let mut entities = EntityCollection::new();
        let old = entities.add(marker(1.0));
        assert!(entities.remove(old));
        let new = entities.add(marker(2.0));
        assert_eq!(old.index(), new.index());

        assert!(entities.get(old).is_none());
        assert!(!entities.remove(old));
        assert!(entities.contains(new));
    }

    #[test]
    fn remove_all_invalidates_every_id() {
        let mut entities = EntityCollection::new();
        let ids: Vec<_> = (0..4).map(|i| entities.add(marker(i as f64))).collect();
        entities.remove_all();
        assert!(entities.is_empty());
        assert!(ids.iter().all(|id| !entities.contains(*id)));
        assert_eq!(entities.iter().count(), 0);
    }

    #[test]
    fn iteration_is_in_slot_order() {
        let mut entities = EntityCollection::new();
        let a = entities.add(marker(1.0));
        let b = entities.add(marker(2.0));
        let order: Vec<_> = entities.iter().map(|(id, _)| id).collect();
        assert_eq!(order, vec![a, b]);
    }
}
