//! Ordered layer collection for one canvas.
//!
//! All mutations go through the manager, which owns identity allocation and
//! z-order bookkeeping. Designed single-writer: no internal locking, and
//! renderers consume [`LayerManager::snapshot`] copies rather than reading a
//! live manager from another thread.

use hashbrown::HashSet;

use super::{Capabilities, Layer, LayerId, LayerKind, BACKGROUND_Z};
use crate::color::Color;

/// Gap left between consecutive z values when reindexing, so future inserts
/// between neighbors have room.
const Z_STRIDE: i32 = 10;

/// Tagged change notifications, delivered synchronously after each
/// committed mutation.
#[derive(Clone, Debug)]
pub enum LayerEvent {
    Added(LayerId),
    Removed(LayerId),
    Updated { old: Box<Layer>, new: Box<Layer> },
    Reordered,
    SelectionChanged,
    Cleared,
}

/// Handle returned by [`LayerManager::add_change_listener`].
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct ListenerHandle(usize);

#[derive(thiserror::Error, Debug)]
pub enum RestoreError {
    #[error("canvas has no background layer")]
    MissingBackground,
    #[error("canvas has more than one background layer")]
    DuplicateBackground,
}

type Listener = Box<dyn Fn(&LayerEvent)>;

/// The ordered collection of layers for one canvas, plus active/selection
/// tracking and change notification.
pub struct LayerManager {
    /// Ascending paint order; the background is always index 0.
    layers: Vec<Layer>,
    active: Option<LayerId>,
    selection: HashSet<LayerId>,
    listeners: Vec<(usize, Listener)>,
    next_listener: usize,
}

impl LayerManager {
    /// Fresh canvas: exactly one implicit background layer, which starts
    /// active.
    #[must_use]
    pub fn new() -> Self {
        Self::with_background(Color::WHITE)
    }

    #[must_use]
    pub fn with_background(color: Color) -> Self {
        let background = Layer::background(color);
        let active = Some(background.id());
        Self {
            layers: vec![background],
            active,
            selection: HashSet::new(),
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    /// Rebuild a manager from persisted layers. Validates the single-
    /// background invariant and re-sorts by z; active/selection start empty.
    pub fn from_layers(mut layers: Vec<Layer>) -> Result<Self, RestoreError> {
        let backgrounds = layers
            .iter()
            .filter(|l| l.kind() == LayerKind::Background)
            .count();
        match backgrounds {
            0 => return Err(RestoreError::MissingBackground),
            1 => {}
            _ => return Err(RestoreError::DuplicateBackground),
        }
        layers.sort_by_key(Layer::z_order);
        Ok(Self {
            layers,
            active: None,
            selection: HashSet::new(),
            listeners: Vec::new(),
            next_listener: 0,
        })
    }

    // ---- reads -----------------------------------------------------------

    /// Layers in ascending paint order. Immutable view only; mutations go
    /// through the manager.
    #[must_use]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Deep copy for cross-thread rendering.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Layer> {
        self.layers.clone()
    }

    #[must_use]
    pub fn get(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id() == id)
    }

    #[must_use]
    pub fn active_layer(&self) -> Option<LayerId> {
        self.active
    }

    #[must_use]
    pub fn selection(&self) -> &HashSet<LayerId> {
        &self.selection
    }

    #[must_use]
    pub fn background(&self) -> &Layer {
        // Invariant: index 0 is always the background.
        &self.layers[0]
    }

    fn index_of(&self, id: LayerId) -> Option<usize> {
        self.layers.iter().position(|l| l.id() == id)
    }

    // ---- creation --------------------------------------------------------

    /// Append a layer at the top of the stack. It becomes the active layer.
    ///
    /// Background layers are created implicitly with the canvas and only
    /// then; passing one here fails.
    pub fn add_layer(&mut self, mut layer: Layer) -> Option<LayerId> {
        if layer.kind() == LayerKind::Background {
            log::warn!("refusing second background layer");
            return None;
        }
        let z = self
            .layers
            .iter()
            .filter(|l| l.kind() != LayerKind::Background)
            .map(Layer::z_order)
            .max()
            .unwrap_or(0)
            + 1;
        layer.set_z_order(z);
        let id = layer.id();
        let editable = layer.editable();
        self.layers.push(layer);
        if editable {
            self.active = Some(id);
        }
        self.emit(&LayerEvent::Added(id));
        Some(id)
    }

    pub fn add_drawing_layer(&mut self, name: impl Into<String>) -> LayerId {
        // Unwrap OK - a drawing layer is never refused.
        self.add_layer(Layer::drawing(name)).unwrap()
    }

    pub fn add_text_layer(
        &mut self,
        name: impl Into<String>,
        text: impl Into<String>,
        px_per_em: f32,
        color: Color,
    ) -> LayerId {
        self.add_layer(Layer::text(name, text, px_per_em, color)).unwrap()
    }

    // ---- deletion --------------------------------------------------------

    /// Remove a layer. Fails (state unchanged) for the background or an
    /// unknown id.
    pub fn remove_layer(&mut self, id: LayerId) -> bool {
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        if !self.layers[idx]
            .kind()
            .capabilities()
            .contains(Capabilities::DELETE)
        {
            log::warn!("refusing to delete {} layer", self.layers[idx].kind().as_ref());
            return false;
        }
        self.layers.remove(idx);
        let selection_changed = self.selection.remove(&id);
        if self.active == Some(id) {
            self.active = self.nearest_editable(idx);
        }
        self.emit(&LayerEvent::Removed(id));
        if selection_changed {
            self.emit(&LayerEvent::SelectionChanged);
        }
        true
    }

    /// Nearest editable non-background layer to a stack position, looking
    /// above first.
    fn nearest_editable(&self, idx: usize) -> Option<LayerId> {
        let above = self.layers[idx..].iter();
        let below = self.layers[..idx].iter().rev();
        above
            .chain(below)
            .find(|l| l.kind() != LayerKind::Background && l.editable())
            .map(Layer::id)
    }

    // ---- update ----------------------------------------------------------

    /// Apply an updater to a layer's current value, committing only when the
    /// result differs. Kind changes are rejected; id/z bookkeeping cannot be
    /// touched by the updater.
    pub fn update_layer(&mut self, id: LayerId, updater: impl FnOnce(&mut Layer)) -> bool {
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        let old = self.layers[idx].clone();
        let mut new = old.clone();
        updater(&mut new);
        if new.kind() != old.kind() {
            log::warn!(
                "layer update changed kind {} -> {}, rejected",
                old.kind().as_ref(),
                new.kind().as_ref()
            );
            return false;
        }
        if new == old {
            return true;
        }
        new.touch();
        self.layers[idx] = new.clone();
        // The updater may have made the active layer uneditable.
        if self.active == Some(id) && !new.editable() {
            self.active = None;
        }
        self.emit(&LayerEvent::Updated {
            old: Box::new(old),
            new: Box::new(new),
        });
        true
    }

    // ---- reorder ---------------------------------------------------------

    /// Move a layer to a stack position (`1..len`, the background holds 0).
    /// Out-of-range targets fail with no state change.
    pub fn move_layer(&mut self, id: LayerId, index: usize) -> bool {
        let Some(cur) = self.index_of(id) else {
            return false;
        };
        if !self.layers[cur]
            .kind()
            .capabilities()
            .contains(Capabilities::REORDER)
        {
            return false;
        }
        if index == 0 || index >= self.layers.len() {
            return false;
        }
        if index != cur {
            let layer = self.layers.remove(cur);
            self.layers.insert(index, layer);
        }
        self.reindex_z();
        self.emit(&LayerEvent::Reordered);
        true
    }

    pub fn move_up(&mut self, id: LayerId) -> bool {
        match self.index_of(id) {
            Some(cur) => self.move_layer(id, cur + 1),
            None => false,
        }
    }

    pub fn move_down(&mut self, id: LayerId) -> bool {
        match self.index_of(id) {
            Some(cur) if cur > 0 => self.move_layer(id, cur - 1),
            _ => false,
        }
    }

    pub fn move_to_top(&mut self, id: LayerId) -> bool {
        self.move_layer(id, self.layers.len().saturating_sub(1))
    }

    pub fn move_to_bottom(&mut self, id: LayerId) -> bool {
        self.move_layer(id, 1)
    }

    /// Reassign every z from stack position: background pinned to its
    /// sentinel, the rest spaced by a constant stride.
    fn reindex_z(&mut self) {
        let mut rank = 0;
        for layer in &mut self.layers {
            if layer.kind() == LayerKind::Background {
                layer.set_z_order(BACKGROUND_Z);
            } else {
                rank += 1;
                layer.set_z_order(rank * Z_STRIDE);
            }
        }
    }

    // ---- selection / active ---------------------------------------------

    /// Replace the selection. Unknown ids are silently filtered.
    pub fn select_layers(&mut self, ids: &[LayerId]) {
        let filtered: HashSet<LayerId> = ids
            .iter()
            .copied()
            .filter(|id| self.get(*id).is_some())
            .collect();
        if filtered != self.selection {
            self.selection = filtered;
            self.emit(&LayerEvent::SelectionChanged);
        }
    }

    pub fn add_to_selection(&mut self, id: LayerId) {
        if self.get(id).is_some() && self.selection.insert(id) {
            self.emit(&LayerEvent::SelectionChanged);
        }
    }

    pub fn remove_from_selection(&mut self, id: LayerId) {
        if self.selection.remove(&id) {
            self.emit(&LayerEvent::SelectionChanged);
        }
    }

    pub fn clear_selection(&mut self) {
        if !self.selection.is_empty() {
            self.selection.clear();
            self.emit(&LayerEvent::SelectionChanged);
        }
    }

    /// Retarget the active layer. Accepted only when the target is absent
    /// or editable; otherwise the call is a no-op.
    pub fn set_active_layer(&mut self, id: Option<LayerId>) {
        match id {
            None => self.active = None,
            Some(id) => {
                if self.get(id).is_some_and(Layer::editable) {
                    self.active = Some(id);
                }
            }
        }
    }

    // ---- merge / clear ---------------------------------------------------

    /// Consolidate two or more drawing layers into one new drawing layer,
    /// deleting the sources. `None` (state unchanged) when fewer than two
    /// of the given ids name drawing layers.
    ///
    /// The receiver takes the sources' strokes in paint order; it lands at
    /// the topmost source's stack position and becomes active.
    pub fn merge_layers(&mut self, ids: &[LayerId]) -> Option<LayerId> {
        let requested: HashSet<LayerId> = ids.iter().copied().collect();
        let source_indices: Vec<usize> = self
            .layers
            .iter()
            .enumerate()
            .filter(|(_, l)| requested.contains(&l.id()) && l.kind() == LayerKind::Drawing)
            .map(|(i, _)| i)
            .collect();
        if source_indices.len() < 2 {
            log::warn!(
                "merge needs at least 2 drawing layers, got {}",
                source_indices.len()
            );
            return None;
        }

        let mut merged = Layer::drawing("Merged");
        let merged_strokes = merged
            .content
            .strokes_mut()
            .expect("drawing layer has strokes");
        for &i in &source_indices {
            if let Some(strokes) = self.layers[i].content.strokes() {
                merged_strokes.extend_from_slice(strokes);
            }
        }
        let merged_id = merged.id();

        // Replace the topmost source in place, drop the rest.
        let top = *source_indices.last().expect("at least two sources");
        let insert_at = top - (source_indices.len() - 1);
        let mut removed = Vec::with_capacity(source_indices.len());
        for &i in source_indices.iter().rev() {
            removed.push(self.layers.remove(i).id());
        }
        self.layers.insert(insert_at, merged);
        self.reindex_z();

        let selection_changed = removed.iter().any(|id| self.selection.remove(id));
        if self.active.is_some_and(|a| removed.contains(&a)) || self.active.is_none() {
            self.active = Some(merged_id);
        }

        self.emit(&LayerEvent::Added(merged_id));
        for id in removed {
            self.emit(&LayerEvent::Removed(id));
        }
        if selection_changed {
            self.emit(&LayerEvent::SelectionChanged);
        }
        Some(merged_id)
    }

    /// Remove every layer except the background; active and selection reset
    /// to empty.
    pub fn clear_all(&mut self) {
        self.layers.retain(|l| l.kind() == LayerKind::Background);
        self.active = None;
        self.selection.clear();
        self.emit(&LayerEvent::Cleared);
    }

    // ---- notification ----------------------------------------------------

    pub fn add_change_listener(&mut self, listener: impl Fn(&LayerEvent) + 'static) -> ListenerHandle {
        let handle = ListenerHandle(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((handle.0, Box::new(listener)));
        handle
    }

    pub fn remove_change_listener(&mut self, handle: ListenerHandle) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(id, _)| *id != handle.0);
        self.listeners.len() != before
    }

    fn emit(&self, event: &LayerEvent) {
        for (_, listener) in &self.listeners {
            listener(event);
        }
    }
}

impl Default for LayerManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::geometry::Point;
    use crate::layer::LayerContent;
    use crate::stroke::{Stroke, StrokeOptions};

    fn stroke() -> Stroke {
        Stroke::from_raw_points(
            vec![Point::new(0.0, 0.0, 1.0, 0), Point::new(5.0, 5.0, 1.0, 16)],
            StrokeOptions::default(),
        )
    }

    #[test]
    fn fresh_canvas_has_one_background() {
        let mgr = LayerManager::new();
        assert_eq!(mgr.layers().len(), 1);
        assert_eq!(mgr.layers()[0].kind(), LayerKind::Background);
        assert_eq!(mgr.layers()[0].z_order(), BACKGROUND_Z);
        assert_eq!(mgr.active_layer(), Some(mgr.layers()[0].id()));
    }

    #[test]
    fn creation_assigns_ascending_z_and_active() {
        let mut mgr = LayerManager::new();
        let ink = mgr.add_drawing_layer("ink");
        let notes = mgr.add_text_layer("notes", "hi", 16.0, Color::BLACK);
        assert_eq!(mgr.get(ink).unwrap().z_order(), 1);
        assert_eq!(mgr.get(notes).unwrap().z_order(), 2);
        assert!(BACKGROUND_Z < 1);
        assert_eq!(mgr.active_layer(), Some(notes));
    }

    #[test]
    fn second_background_refused() {
        let mut mgr = LayerManager::new();
        assert!(mgr.add_layer(Layer::background(Color::BLACK)).is_none());
        assert_eq!(mgr.layers().len(), 1);
    }

    #[test]
    fn background_delete_fails_cleanly() {
        let mut mgr = LayerManager::new();
        let bg = mgr.layers()[0].id();
        let before = mgr.snapshot();
        assert!(!mgr.remove_layer(bg));
        assert_eq!(mgr.snapshot(), before);
    }

    #[test]
    fn delete_retargets_active() {
        let mut mgr = LayerManager::new();
        let a = mgr.add_drawing_layer("a");
        let b = mgr.add_drawing_layer("b");
        assert_eq!(mgr.active_layer(), Some(b));
        assert!(mgr.remove_layer(b));
        assert_eq!(mgr.active_layer(), Some(a));
        assert!(mgr.remove_layer(a));
        // Only the background remains; it is not an auto-retarget candidate.
        assert_eq!(mgr.active_layer(), None);
    }

    #[test]
    fn active_only_when_editable() {
        let mut mgr = LayerManager::new();
        let a = mgr.add_drawing_layer("a");
        let b = mgr.add_drawing_layer("b");
        mgr.update_layer(a, |l| l.locked = true);
        mgr.set_active_layer(Some(a));
        // Locked target: call is a no-op.
        assert_eq!(mgr.active_layer(), Some(b));
        mgr.set_active_layer(None);
        assert_eq!(mgr.active_layer(), None);
    }

    #[test]
    fn locking_active_layer_clears_active() {
        let mut mgr = LayerManager::new();
        let a = mgr.add_drawing_layer("a");
        assert_eq!(mgr.active_layer(), Some(a));
        mgr.update_layer(a, |l| l.locked = true);
        assert_eq!(mgr.active_layer(), None);
    }

    #[test]
    fn update_commits_only_on_change() {
        let mut mgr = LayerManager::new();
        let a = mgr.add_drawing_layer("a");
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        mgr.add_change_listener(move |e| sink.borrow_mut().push(format!("{e:?}")));

        assert!(mgr.update_layer(a, |_| {}));
        assert!(events.borrow().is_empty(), "no-change update must not emit");

        assert!(mgr.update_layer(a, |l| l.name = "renamed".into()));
        assert_eq!(events.borrow().len(), 1);
        assert!(events.borrow()[0].starts_with("Updated"));
        assert_eq!(mgr.get(a).unwrap().name, "renamed");
    }

    #[test]
    fn update_rejects_kind_change() {
        let mut mgr = LayerManager::new();
        let a = mgr.add_drawing_layer("a");
        let ok = mgr.update_layer(a, |l| {
            l.content = LayerContent::Text {
                text: "oops".into(),
                px_per_em: 16.0,
                color: Color::BLACK,
            };
        });
        assert!(!ok);
        assert_eq!(mgr.get(a).unwrap().kind(), LayerKind::Drawing);
    }

    #[test]
    fn reorder_reindexes_with_stride() {
        let mut mgr = LayerManager::new();
        let a = mgr.add_drawing_layer("a");
        let b = mgr.add_drawing_layer("b");
        let c = mgr.add_drawing_layer("c");
        assert!(mgr.move_to_top(a));
        let z = |id| mgr.get(id).unwrap().z_order();
        assert_eq!(z(b), 10);
        assert_eq!(z(c), 20);
        assert_eq!(z(a), 30);
        assert_eq!(mgr.background().z_order(), BACKGROUND_Z);
    }

    #[test]
    fn reorder_out_of_range_fails() {
        let mut mgr = LayerManager::new();
        let a = mgr.add_drawing_layer("a");
        let before = mgr.snapshot();
        assert!(!mgr.move_layer(a, 0), "cannot move below background");
        assert!(!mgr.move_layer(a, 5));
        assert!(!mgr.move_up(a), "already at top");
        assert!(!mgr.move_down(a), "already at bottom");
        assert_eq!(mgr.snapshot(), before);
    }

    #[test]
    fn selection_filters_unknown_ids() {
        let mut mgr = LayerManager::new();
        let a = mgr.add_drawing_layer("a");
        let ghost = uuid::Uuid::new_v4();
        mgr.select_layers(&[a, ghost]);
        assert_eq!(mgr.selection().len(), 1);
        assert!(mgr.selection().contains(&a));
        mgr.add_to_selection(ghost);
        assert_eq!(mgr.selection().len(), 1);
    }

    #[test]
    fn merge_requires_two_drawing_layers() {
        let mut mgr = LayerManager::new();
        let a = mgr.add_drawing_layer("a");
        let t = mgr.add_text_layer("t", "x", 16.0, Color::BLACK);
        let before = mgr.snapshot();
        assert!(mgr.merge_layers(&[a]).is_none());
        assert!(mgr.merge_layers(&[a, t]).is_none(), "text layer does not qualify");
        assert_eq!(mgr.snapshot(), before);
    }

    #[test]
    fn merge_consolidates_strokes_in_paint_order() {
        let mut mgr = LayerManager::new();
        let a = mgr.add_drawing_layer("a");
        let b = mgr.add_drawing_layer("b");
        let s1 = stroke();
        let s2 = stroke();
        mgr.update_layer(a, |l| l.content.strokes_mut().unwrap().push(s1.clone()));
        mgr.update_layer(b, |l| l.content.strokes_mut().unwrap().push(s2.clone()));

        let merged = mgr.merge_layers(&[a, b]).unwrap();
        assert_eq!(mgr.layers().len(), 2);
        assert!(mgr.get(a).is_none());
        assert!(mgr.get(b).is_none());
        let strokes = mgr.get(merged).unwrap().content.strokes().unwrap();
        assert_eq!(strokes.len(), 2);
        assert_eq!(strokes[0].id(), s1.id());
        assert_eq!(strokes[1].id(), s2.id());
        assert_eq!(mgr.active_layer(), Some(merged));
    }

    #[test]
    fn clear_all_keeps_background_only() {
        let mut mgr = LayerManager::new();
        let a = mgr.add_drawing_layer("a");
        mgr.add_text_layer("t", "x", 16.0, Color::BLACK);
        mgr.select_layers(&[a]);
        mgr.clear_all();
        assert_eq!(mgr.layers().len(), 1);
        assert_eq!(mgr.layers()[0].kind(), LayerKind::Background);
        assert_eq!(mgr.active_layer(), None);
        assert!(mgr.selection().is_empty());
    }

    #[test]
    fn background_invariant_over_operation_sequences() {
        let mut mgr = LayerManager::new();
        let count_backgrounds = |mgr: &LayerManager| {
            mgr.layers()
                .iter()
                .filter(|l| l.kind() == LayerKind::Background)
                .count()
        };
        let a = mgr.add_drawing_layer("a");
        let b = mgr.add_drawing_layer("b");
        mgr.move_to_top(a);
        mgr.merge_layers(&[a, b]);
        mgr.clear_all();
        mgr.add_drawing_layer("c");
        assert_eq!(count_backgrounds(&mgr), 1);
        // Active, when present, is always editable.
        if let Some(active) = mgr.active_layer() {
            assert!(mgr.get(active).unwrap().editable());
        }
    }

    #[test]
    fn listener_lifecycle_and_event_order() {
        let mut mgr = LayerManager::new();
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        let handle = mgr.add_change_listener(move |e| {
            sink.borrow_mut().push(match e {
                LayerEvent::Added(_) => "added",
                LayerEvent::Removed(_) => "removed",
                LayerEvent::Updated { .. } => "updated",
                LayerEvent::Reordered => "reordered",
                LayerEvent::SelectionChanged => "selection",
                LayerEvent::Cleared => "cleared",
            });
        });

        let a = mgr.add_drawing_layer("a");
        let b = mgr.add_drawing_layer("b");
        mgr.select_layers(&[a]);
        mgr.move_to_top(a);
        mgr.remove_layer(a);
        mgr.clear_all();
        assert_eq!(
            *events.borrow(),
            vec!["added", "added", "selection", "reordered", "removed", "selection", "cleared"]
        );

        assert!(mgr.remove_change_listener(handle));
        assert!(!mgr.remove_change_listener(handle));
        let len = events.borrow().len();
        mgr.add_drawing_layer("after");
        assert_eq!(events.borrow().len(), len, "removed listener must not fire");
        let _ = b;
    }
}
