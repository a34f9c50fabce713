//! Interactive placement of text elements and corner logos.
//!
//! A small explicit state machine: `Idle` until a drag starts, `Dragging`
//! while pointer deltas accumulate, back to `Idle` on commit or cancel.
//! Deltas accumulate in pixel space and convert to virtual units with the
//! scale captured when the gesture began, so a container resize mid-drag
//! cannot skew the drop position. Rotation is a separate sub-gesture that
//! commits continuously; text-edit mode suspends drag capture entirely.

use kurbo::Vec2;

use crate::{
    core::{Scale, ScaleTracker},
    error::{CourtsideError, CourtsideResult},
    store::StyleStore,
};

/// What a gesture or selection points at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlacementTarget {
    Text(String),
    Logo(String),
}

impl PlacementTarget {
    fn id(&self) -> &str {
        match self {
            PlacementTarget::Text(id) | PlacementTarget::Logo(id) => id,
        }
    }
}

#[derive(Clone, Debug)]
enum GestureState {
    Idle,
    Dragging {
        target: PlacementTarget,
        scale: Scale,
        origin: Vec2,
        accumulated_px: Vec2,
    },
    Rotating {
        id: String,
        center_px: Vec2,
    },
    Editing {
        id: String,
    },
}

pub struct PlacementController {
    state: GestureState,
    selection: Option<PlacementTarget>,
    tracker: ScaleTracker,
}

impl Default for PlacementController {
    fn default() -> Self {
        Self::new()
    }
}

impl PlacementController {
    pub fn new() -> Self {
        Self {
            state: GestureState::Idle,
            selection: None,
            tracker: ScaleTracker::new(),
        }
    }

    /// The view layer reports container resizes here. Ignored while a drag
    /// has the scale frozen.
    pub fn observe_container_width(&mut self, width_px: f64) {
        self.tracker.observe_container_width(width_px);
    }

    pub fn scale(&self) -> Scale {
        self.tracker.scale()
    }

    /// Current controls target, if any.
    pub fn selection(&self) -> Option<&PlacementTarget> {
        self.selection.as_ref()
    }

    pub fn select(&mut self, target: PlacementTarget) {
        self.selection = Some(target);
    }

    /// An outside click clears the selection and finishes a pending edit.
    pub fn clear_selection(&mut self) {
        self.selection = None;
        if matches!(self.state, GestureState::Editing { .. }) {
            self.state = GestureState::Idle;
        }
    }

    // ---- dragging ----

    /// Start dragging. Selects the target and freezes the current scale for
    /// the lifetime of the gesture. Rejected while text editing is active or
    /// another gesture is running.
    pub fn begin_drag(
        &mut self,
        store: &StyleStore,
        target: PlacementTarget,
    ) -> CourtsideResult<()> {
        match &self.state {
            GestureState::Idle => {}
            GestureState::Editing { .. } => {
                return Err(CourtsideError::validation(
                    "drag capture is suspended while editing text",
                ));
            }
            _ => {
                return Err(CourtsideError::validation("another gesture is in progress"));
            }
        }

        let origin = match &target {
            PlacementTarget::Text(id) => store
                .text_element(id)
                .map(|e| e.position)
                .ok_or_else(|| CourtsideError::validation(format!("no text element '{id}'")))?,
            PlacementTarget::Logo(id) => store
                .logo(id)
                .map(|l| l.position)
                .ok_or_else(|| CourtsideError::validation(format!("no logo '{id}'")))?,
        };

        self.tracker.freeze();
        self.selection = Some(target.clone());
        self.state = GestureState::Dragging {
            target,
            scale: self.tracker.scale(),
            origin,
            accumulated_px: Vec2::ZERO,
        };
        Ok(())
    }

    /// Accumulate a pointer delta in pixels. No-op outside a drag.
    pub fn drag_by(&mut self, delta_px: Vec2) {
        if let GestureState::Dragging { accumulated_px, .. } = &mut self.state {
            *accumulated_px += delta_px;
        }
    }

    /// Commit the drag: convert the accumulated pixel delta with the frozen
    /// scale and write the clamped position through the store.
    pub fn commit_drag(&mut self, store: &mut StyleStore) -> CourtsideResult<()> {
        let GestureState::Dragging {
            target,
            scale,
            origin,
            accumulated_px,
        } = std::mem::replace(&mut self.state, GestureState::Idle)
        else {
            return Err(CourtsideError::validation("no drag in progress"));
        };
        self.tracker.thaw();

        let position = origin + scale.vec_to_virtual(accumulated_px);
        match &target {
            PlacementTarget::Text(id) => store.set_text_position(id, position)?,
            PlacementTarget::Logo(id) => store.set_logo_position(id, position)?,
        }
        Ok(())
    }

    /// Abandon the drag without moving anything.
    pub fn cancel_drag(&mut self) {
        if matches!(self.state, GestureState::Dragging { .. }) {
            self.state = GestureState::Idle;
            self.tracker.thaw();
        }
    }

    // ---- rotation ----

    /// Start rotating a text element from its handle. `center_px` is the
    /// element's center in pixel space.
    pub fn begin_rotate(
        &mut self,
        store: &StyleStore,
        id: &str,
        center_px: Vec2,
    ) -> CourtsideResult<()> {
        if !matches!(self.state, GestureState::Idle) {
            return Err(CourtsideError::validation("another gesture is in progress"));
        }
        if store.text_element(id).is_none() {
            return Err(CourtsideError::validation(format!("no text element '{id}'")));
        }
        self.selection = Some(PlacementTarget::Text(id.to_string()));
        self.state = GestureState::Rotating {
            id: id.to_string(),
            center_px,
        };
        Ok(())
    }

    /// Rotate toward the pointer and commit immediately. The handle hangs
    /// below the element, so pointing straight down is zero rotation.
    pub fn update_rotate(
        &mut self,
        store: &mut StyleStore,
        pointer_px: Vec2,
    ) -> CourtsideResult<()> {
        let GestureState::Rotating { id, center_px } = &self.state else {
            return Err(CourtsideError::validation("no rotation in progress"));
        };
        let v = pointer_px - *center_px;
        if v.hypot() < 1e-9 {
            return Ok(());
        }
        let degrees = v.x.atan2(v.y).to_degrees();
        store.set_text_rotation(id, -degrees)
    }

    pub fn end_rotate(&mut self) {
        if matches!(self.state, GestureState::Rotating { .. }) {
            self.state = GestureState::Idle;
        }
    }

    // ---- text editing ----

    /// Enter text-edit mode for an element. Cancels a drag in progress and
    /// suspends drag capture until the edit ends.
    pub fn begin_text_edit(&mut self, store: &StyleStore, id: &str) -> CourtsideResult<()> {
        if store.text_element(id).is_none() {
            return Err(CourtsideError::validation(format!("no text element '{id}'")));
        }
        self.cancel_drag();
        self.selection = Some(PlacementTarget::Text(id.to_string()));
        self.state = GestureState::Editing { id: id.to_string() };
        Ok(())
    }

    pub fn end_text_edit(&mut self) {
        if matches!(self.state, GestureState::Editing { .. }) {
            self.state = GestureState::Idle;
        }
    }

    pub fn is_editing(&self, id: &str) -> bool {
        matches!(&self.state, GestureState::Editing { id: editing } if editing == id)
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, GestureState::Dragging { .. })
    }

    /// Id the current gesture operates on, if any.
    pub fn gesture_target(&self) -> Option<&str> {
        match &self.state {
            GestureState::Idle => None,
            GestureState::Dragging { target, .. } => Some(target.id()),
            GestureState::Rotating { id, .. } | GestureState::Editing { id } => Some(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Logo, LogoSection, TextElement};
    use crate::store::{MemKvStore, StyleStore};

    fn store_with_text() -> StyleStore {
        let mut store = StyleStore::load(Box::new(MemKvStore::new()));
        store.upsert_text_element(TextElement::new("t1"));
        store
    }

    #[test]
    fn drag_converts_pixels_with_gesture_scale_and_clamps() {
        let mut store = store_with_text();
        let mut controller = PlacementController::new();

        controller
            .begin_drag(&store, PlacementTarget::Text("t1".to_string()))
            .unwrap();
        controller.drag_by(Vec2::new(900.0, 900.0));
        controller.commit_drag(&mut store).unwrap();

        let element = store.text_element("t1").unwrap();
        assert_eq!(element.position, Vec2::new(540.0, 540.0));
    }

    #[test]
    fn resize_during_drag_does_not_change_conversion() {
        let mut store = store_with_text();
        let mut controller = PlacementController::new();
        controller.observe_container_width(2160.0); // scale 2

        controller
            .begin_drag(&store, PlacementTarget::Text("t1".to_string()))
            .unwrap();
        controller.observe_container_width(540.0); // ignored while frozen
        controller.drag_by(Vec2::new(200.0, 0.0));
        controller.commit_drag(&mut store).unwrap();

        // 200 px at the frozen scale 2 is 100 virtual units.
        assert_eq!(
            store.text_element("t1").unwrap().position,
            Vec2::new(100.0, 0.0)
        );
        // After the gesture the tracker thaws and resizes apply again.
        controller.observe_container_width(540.0);
        assert_eq!(controller.scale().factor(), 0.5);
    }

    #[test]
    fn logo_drag_commits_with_section_asymmetric_bounds() {
        let mut store = StyleStore::load(Box::new(MemKvStore::new()));
        store.upsert_logo(Logo::empty("l1", "club", LogoSection::Top));
        let mut controller = PlacementController::new();

        controller
            .begin_drag(&store, PlacementTarget::Logo("l1".to_string()))
            .unwrap();
        controller.drag_by(Vec2::new(0.0, -500.0));
        controller.commit_drag(&mut store).unwrap();
        assert_eq!(store.logo("l1").unwrap().position, Vec2::new(0.0, -60.0));
    }

    #[test]
    fn cancel_leaves_position_untouched() {
        let mut store = store_with_text();
        let mut controller = PlacementController::new();

        controller
            .begin_drag(&store, PlacementTarget::Text("t1".to_string()))
            .unwrap();
        controller.drag_by(Vec2::new(300.0, 0.0));
        controller.cancel_drag();

        assert_eq!(store.text_element("t1").unwrap().position, Vec2::ZERO);
        assert!(!controller.is_dragging());
    }

    #[test]
    fn editing_suspends_drag_capture() {
        let store = store_with_text();
        let mut controller = PlacementController::new();

        controller.begin_text_edit(&store, "t1").unwrap();
        let result = controller.begin_drag(&store, PlacementTarget::Text("t1".to_string()));
        assert!(result.is_err());

        controller.end_text_edit();
        assert!(
            controller
                .begin_drag(&store, PlacementTarget::Text("t1".to_string()))
                .is_ok()
        );
    }

    #[test]
    fn rotation_commits_continuously() {
        let mut store = store_with_text();
        let mut controller = PlacementController::new();

        controller
            .begin_rotate(&store, "t1", Vec2::new(100.0, 100.0))
            .unwrap();

        // Pointer straight below the center: zero rotation.
        controller
            .update_rotate(&mut store, Vec2::new(100.0, 200.0))
            .unwrap();
        assert!(store.text_element("t1").unwrap().rotation.abs() < 1e-9);

        // Pointer to the right: quarter turn.
        controller
            .update_rotate(&mut store, Vec2::new(200.0, 100.0))
            .unwrap();
        assert!((store.text_element("t1").unwrap().rotation + 90.0).abs() < 1e-9);

        controller.end_rotate();
        assert!(controller.gesture_target().is_none());
    }

    #[test]
    fn drag_selects_and_outside_click_clears() {
        let mut store = store_with_text();
        let mut controller = PlacementController::new();

        controller
            .begin_drag(&store, PlacementTarget::Text("t1".to_string()))
            .unwrap();
        controller.commit_drag(&mut store).unwrap();
        assert_eq!(
            controller.selection(),
            Some(&PlacementTarget::Text("t1".to_string()))
        );

        controller.clear_selection();
        assert!(controller.selection().is_none());
    }

    #[test]
    fn unknown_target_is_rejected() {
        let store = StyleStore::load(Box::new(MemKvStore::new()));
        let mut controller = PlacementController::new();
        assert!(
            controller
                .begin_drag(&store, PlacementTarget::Text("ghost".to_string()))
                .is_err()
        );
    }
}
